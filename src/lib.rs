#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-coupling
//!
//! mesh-coupling turns a graph of coupled subdomains, each carrying its own
//! named variables and discretization choices, into one globally consistent
//! block-sparse linear system. It is the bookkeeping layer between
//! per-subdomain numerical kernels and a global linear solver for
//! mixed-dimensional PDE codes.
//!
//! ## Features
//! - Topology graph of subdomains (nodes) and interfaces (edges) with typed
//!   handles and per-entity parameter records
//! - Registry of variables, operators bound to them, and coupling terms that
//!   span two subdomains and the interface between them
//! - Deterministic, contiguous block numbering ([`dof::DofManager`])
//! - Two-phase discretization dispatch with a selectively invalidated cache,
//!   optionally on the rayon pool
//! - Additive scatter into a `nalgebra-sparse` CSR matrix
//!
//! ## Workflow
//!
//! ```text
//! graph + registry -> build_dofs -> discretize -> assemble -> solve (external) -> distribute_solution
//! ```
//!
//! The numerical schemes themselves are external: they implement
//! [`NodeDiscretization`](registry::NodeDiscretization) and
//! [`CouplingDiscretization`](registry::CouplingDiscretization) and are bound
//! through the [`Assembler`](assembler::Assembler).
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-coupling = "0.1"
//! # Optional features:
//! # features = ["rayon", "check-invariants"]
//! ```
//!
//! ## Determinism
//!
//! Block numbering depends only on entity creation order and variable
//! declaration order. Scatter follows the same order, so assembling twice from
//! one cache state yields bit-identical output, with or without `rayon`.

pub mod assembler;
pub mod assembly;
pub mod assembly_error;
pub mod debug_invariants;
pub mod discretize;
pub mod dof;
pub mod registry;
pub mod solution;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::assembler::{Assembler, AssemblerConfig, AssemblerState};
    pub use crate::assembly::LinearSystem;
    pub use crate::assembly_error::{AssemblyError, CapabilityError, ConfigurationError};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::discretize::{DiscretizationCache, DiscretizeReport};
    pub use crate::dof::{Block, BlockIndex, DofManager};
    pub use crate::registry::{
        CouplingContext, CouplingContribution, CouplingDiscretization, CouplingName, CouplingSlot,
        DofLayout, EndpointSelector, InterfaceSelector, LocalDiscretization, NodeDiscretization,
        OperatorName, Registry, VariableName,
    };
    pub use crate::solution::SolutionMap;
    pub use crate::topology::{
        EntityId, Geometry, InterfaceId, Keyword, ParamValue, Parameters, SubdomainId,
        TopologyGraph,
    };
}
