//! Sparse assembly: scatter of cached local results into one global system.

pub mod scatter;
pub mod system;

pub use scatter::{Scatter, VariableFilter, assemble};
pub use system::LinearSystem;
