//! Variable & discretization registry.
//!
//! Per-entity variable declarations, the operators bound to them, and the
//! coupling terms that tie two subdomains to the interface between them.

pub mod capability;
pub mod layout;
pub mod names;
#[allow(clippy::module_inception)]
pub mod registry;

pub use capability::{
    CouplingContext, CouplingContribution, CouplingDiscretization, CouplingSlot, EndpointView,
    EntityView, LocalDiscretization, NodeDiscretization,
};
pub use layout::DofLayout;
pub use names::{CouplingName, OperatorName, VariableName};
pub use registry::{
    CouplingTerm, EndpointSelector, InterfaceSelector, OperatorBinding, Registry, VariableSpec,
};
