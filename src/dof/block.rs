//! Block identity and index types.

use std::fmt;

use crate::registry::names::VariableName;
use crate::topology::handle::EntityId;

/// One (entity, variable) pair: the unit of global numbering.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub entity: EntityId,
    pub variable: VariableName,
}

impl Block {
    pub fn new(entity: EntityId, variable: VariableName) -> Self {
        Self { entity, variable }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` on {}", self.variable, self.entity)
    }
}

/// Position of a block in the traversal order, in `[0, num_blocks)`.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct BlockIndex(usize);

impl BlockIndex {
    #[inline]
    pub const fn new(index: usize) -> Self {
        BlockIndex(index)
    }

    #[inline]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
