//! AssemblyError: unified error type for mesh-coupling public APIs
//!
//! Every fallible operation in the crate reports through [`AssemblyError`].
//! Registration-time problems are grouped under [`ConfigurationError`] so a
//! caller can distinguish "the problem set-up is wrong" from failures raised
//! while discretizing or scattering.

use std::error::Error;
use std::sync::Arc;
use thiserror::Error;

use crate::assembler::AssemblerState;
use crate::registry::names::{CouplingName, OperatorName, VariableName};
use crate::topology::handle::{EntityId, InterfaceId, SubdomainId};
use crate::topology::parameters::Keyword;

/// Error type returned by external discretization capabilities.
pub type CapabilityError = Box<dyn Error + Send + Sync>;

/// Errors raised while populating the topology graph or the registry.
///
/// A configuration error is fatal to the call that raised it and never
/// modifies previously registered state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The entity handle does not belong to this topology graph.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    /// An interface was requested between a subdomain and itself.
    #[error("interface endpoints must be distinct, got {0} twice")]
    SelfLoopInterface(SubdomainId),
    /// A name or keyword failed validation.
    #[error("invalid {kind} `{value}`: expected a non-empty [A-Za-z0-9_] identifier")]
    InvalidName { kind: &'static str, value: String },
    /// A variable layout with no DOF on any geometric primitive.
    #[error("variable `{0}` declares no degrees of freedom")]
    EmptyDofLayout(VariableName),
    /// The variable name already exists on the entity.
    #[error("variable `{variable}` already declared on {entity}")]
    DuplicateVariable {
        entity: EntityId,
        variable: VariableName,
    },
    /// The operator name is already bound to this variable on the entity.
    #[error("operator `{operator}` already bound to `{variable}` on {entity}")]
    DuplicateOperator {
        entity: EntityId,
        variable: VariableName,
        operator: OperatorName,
    },
    /// The coupling name already exists on the interface.
    #[error("coupling `{coupling}` already registered on {interface}")]
    DuplicateCoupling {
        interface: InterfaceId,
        coupling: CouplingName,
    },
    /// A selector references a variable the entity never declared.
    #[error("variable `{variable}` is not declared on {entity}")]
    UndeclaredVariable {
        entity: EntityId,
        variable: VariableName,
    },
    /// The interface carries no coupling term of that name.
    #[error("no coupling `{coupling}` registered on {interface}")]
    UnknownCoupling {
        interface: InterfaceId,
        coupling: CouplingName,
    },
    /// A selector references an operator not bound to the variable.
    #[error("operator `{operator}` is not bound to `{variable}` on {entity}")]
    UnboundOperator {
        entity: EntityId,
        variable: VariableName,
        operator: OperatorName,
    },
    /// The coupling's subdomains are not the endpoints of its interface.
    #[error("coupling endpoints ({primary}, {secondary}) do not match {interface}")]
    EndpointMismatch {
        interface: InterfaceId,
        primary: SubdomainId,
        secondary: SubdomainId,
    },
    /// A bound capability reads a parameter set the entity does not carry.
    #[error("{entity} has no parameters under keyword `{keyword}`")]
    MissingParameters { entity: EntityId, keyword: Keyword },
}

/// Unified error type for mesh-coupling operations.
#[derive(Debug, Error, Clone)]
pub enum AssemblyError {
    /// Registration-time failure; see [`ConfigurationError`].
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    /// Block metadata requested for an (entity, variable) pair never registered.
    #[error("unknown block: `{variable}` on {entity}")]
    UnknownBlock {
        entity: EntityId,
        variable: VariableName,
    },
    /// A block index outside the current layout.
    #[error("block index {index} out of range (layout has {len} blocks)")]
    BlockIndexOutOfRange { index: usize, len: usize },
    /// A coupling selector could not be resolved at discretization time.
    ///
    /// `operator` is `None` for the interface selector, which names only a
    /// variable.
    #[error(
        "coupling `{coupling}` on {interface}: no {} for `{variable}` on {entity}",
        .operator.as_ref().map_or_else(|| "declaration".to_string(), |op| format!("binding `{op}`"))
    )]
    MissingBinding {
        interface: InterfaceId,
        coupling: CouplingName,
        entity: EntityId,
        variable: VariableName,
        operator: Option<OperatorName>,
    },
    /// A local contribution disagrees with the block sizes it targets.
    #[error("shape mismatch in {term}: expected {expected_rows}x{expected_cols}, found {rows}x{cols}")]
    ShapeMismatch {
        term: String,
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },
    /// An external discretization capability reported a failure.
    #[error("discretization of {term} failed: {source}")]
    DiscretizationFailure {
        term: String,
        #[source]
        source: Arc<dyn Error + Send + Sync>,
    },
    /// Lifecycle operation invoked before its prerequisite stage.
    #[error("invalid assembler state: `{operation}` requires at least {required:?}, current state is {current:?}")]
    InvalidState {
        operation: &'static str,
        required: AssemblerState,
        current: AssemblerState,
    },
    /// A global vector of the wrong length was handed back for unpacking.
    #[error("solution vector has length {found}, expected {expected}")]
    SolutionLength { expected: usize, found: usize },
    /// An internal data structure failed invariant validation.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl AssemblyError {
    /// Wrap an external capability failure, tagging it with the term that raised it.
    pub fn discretization(term: impl Into<String>, source: CapabilityError) -> Self {
        AssemblyError::DiscretizationFailure {
            term: term.into(),
            source: Arc::from(source),
        }
    }

    /// True for errors raised at registration time.
    pub fn is_configuration(&self) -> bool {
        matches!(self, AssemblyError::Configuration(_))
    }
}
