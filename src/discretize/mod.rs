//! Discretization dispatcher and its result cache.

pub mod cache;
pub mod dispatcher;

pub use cache::{CouplingKey, DiscretizationCache, NodeKey};
pub use dispatcher::{DiscretizeReport, DispatchOptions, check_parameters, discretize};
