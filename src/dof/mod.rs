//! DOF manager: global block numbering.

pub mod block;
pub mod manager;

pub use block::{Block, BlockIndex};
pub use manager::DofManager;
