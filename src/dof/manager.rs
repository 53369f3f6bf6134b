//! DofManager: deterministic, contiguous global numbering of blocks.
//!
//! The `DofManager` holds three tables built together from a populated
//! [`Registry`]:
//! - the BlockIndex table, a bijection from [`Block`] to `[0, num_blocks)`,
//! - the BlockSize table, the number of scalar DOFs of each block,
//! - the GlobalOffset table, prefix sums of the sizes.
//!
//! Traversal order is fixed: every subdomain in creation order, then every
//! interface in creation order, and within an entity its variables in
//! declaration order. Two managers built from the same registry state are
//! therefore identical, which is what makes layouts comparable across runs.
//!
//! # Invariants
//!
//! - `offsets.len() == blocks.len() + 1` and `offsets[0] == 0`.
//! - `offsets[i + 1] == offsets[i] + sizes[i]`, so block ranges partition
//!   `[0, total_dofs())` with no gaps or overlaps.
//! - Each block appears exactly once and blocks of one entity are adjacent.
//!
//! Zero-size blocks are permitted (e.g. an interface with no cells); they
//! occupy an empty range.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use crate::assembly_error::AssemblyError;
use crate::debug_invariants::DebugInvariants;
use crate::dof::block::{Block, BlockIndex};
use crate::registry::names::VariableName;
use crate::registry::registry::Registry;
use crate::topology::graph::TopologyGraph;
use crate::topology::handle::EntityId;

/// Serialized form: the traversal-ordered blocks and their sizes.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
struct LayoutRecord {
    blocks: Vec<Block>,
    sizes: Vec<usize>,
    registry_version: u64,
}

/// Block numbering tables of one registry state.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "LayoutRecord", into = "LayoutRecord")]
pub struct DofManager {
    blocks: Vec<Block>,
    sizes: Vec<usize>,
    offsets: Vec<usize>,
    /// Block index range of each entity that declared variables.
    entity_ranges: HashMap<EntityId, Range<usize>>,
    registry_version: u64,
}

impl PartialEq for DofManager {
    fn eq(&self, other: &Self) -> bool {
        self.blocks == other.blocks && self.sizes == other.sizes
    }
}

impl DofManager {
    /// Number all blocks of `registry` over `graph`.
    ///
    /// # Complexity
    /// **O(B)** for `B` registered blocks.
    ///
    /// # Determinism
    /// Depends only on creation order of entities and declaration order of
    /// variables, never on hashing.
    pub fn build(graph: &TopologyGraph, registry: &Registry) -> Result<Self, AssemblyError> {
        let mut blocks = Vec::new();
        let mut sizes = Vec::new();
        for entity in graph.entities() {
            let variables = registry.variables(entity);
            if variables.is_empty() {
                continue;
            }
            let geometry = graph.geometry(entity)?;
            for spec in variables {
                blocks.push(Block::new(entity, spec.name.clone()));
                sizes.push(spec.layout.size_on(geometry));
            }
        }
        let manager = Self::from_tables(blocks, sizes, registry.version())?;
        manager.debug_assert_invariants();
        log::info!(
            "numbered {} blocks, {} dofs",
            manager.len(),
            manager.total_dofs()
        );
        Ok(manager)
    }

    fn from_tables(
        blocks: Vec<Block>,
        sizes: Vec<usize>,
        registry_version: u64,
    ) -> Result<Self, AssemblyError> {
        if blocks.len() != sizes.len() {
            return Err(AssemblyError::InvariantViolation(format!(
                "{} blocks but {} sizes",
                blocks.len(),
                sizes.len()
            )));
        }
        let mut offsets = Vec::with_capacity(sizes.len() + 1);
        let mut next = 0usize;
        offsets.push(next);
        for &len in &sizes {
            next = next.checked_add(len).ok_or_else(|| {
                AssemblyError::InvariantViolation("global DOF count overflows usize".into())
            })?;
            offsets.push(next);
        }
        let mut entity_ranges: HashMap<EntityId, Range<usize>> = HashMap::new();
        for (i, block) in blocks.iter().enumerate() {
            entity_ranges
                .entry(block.entity)
                .and_modify(|r| r.end = i + 1)
                .or_insert(i..i + 1);
        }
        let manager = Self {
            blocks,
            sizes,
            offsets,
            entity_ranges,
            registry_version,
        };
        Ok(manager)
    }

    /// Index of the block of `variable` on `entity`.
    ///
    /// # Errors
    /// `UnknownBlock` if the pair was never registered.
    pub fn block_of(
        &self,
        entity: EntityId,
        variable: &VariableName,
    ) -> Result<BlockIndex, AssemblyError> {
        self.entity_ranges
            .get(&entity)
            .and_then(|range| {
                range
                    .clone()
                    .find(|&i| &self.blocks[i].variable == variable)
            })
            .map(BlockIndex::new)
            .ok_or_else(|| AssemblyError::UnknownBlock {
                entity,
                variable: variable.clone(),
            })
    }

    /// `(offset, size)` of the block of `variable` on `entity`, for unpacking results.
    pub fn lookup(
        &self,
        entity: EntityId,
        variable: &VariableName,
    ) -> Result<(usize, usize), AssemblyError> {
        let b = self.block_of(entity, variable)?;
        Ok((self.offsets[b.get()], self.sizes[b.get()]))
    }

    /// Number of scalar DOFs in block `b`.
    pub fn size_of(&self, b: BlockIndex) -> Result<usize, AssemblyError> {
        self.check(b)?;
        Ok(self.sizes[b.get()])
    }

    /// First global row/column of block `b`.
    pub fn offset_of(&self, b: BlockIndex) -> Result<usize, AssemblyError> {
        self.check(b)?;
        Ok(self.offsets[b.get()])
    }

    /// Global range `[offset, offset + size)` of block `b`.
    pub fn range_of(&self, b: BlockIndex) -> Result<Range<usize>, AssemblyError> {
        self.check(b)?;
        Ok(self.offsets[b.get()]..self.offsets[b.get() + 1])
    }

    /// The (entity, variable) pair of block `b`.
    pub fn block(&self, b: BlockIndex) -> Result<&Block, AssemblyError> {
        self.check(b)?;
        Ok(&self.blocks[b.get()])
    }

    /// Total number of scalar DOFs.
    #[inline]
    pub fn total_dofs(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    /// Number of blocks.
    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks in traversal order.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockIndex, &Block)> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (BlockIndex::new(i), b))
    }

    /// Block indices of `entity` in declaration order; empty if it has none.
    pub fn blocks_of(&self, entity: EntityId) -> impl Iterator<Item = BlockIndex> + '_ {
        self.entity_ranges
            .get(&entity)
            .cloned()
            .unwrap_or(0..0)
            .map(BlockIndex::new)
    }

    /// `(offset, size)` of each block in traversal order.
    pub fn spans(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.offsets.iter().copied().zip(self.sizes.iter().copied())
    }

    /// Registry version this numbering was built from.
    #[inline]
    pub fn registry_version(&self) -> u64 {
        self.registry_version
    }

    fn check(&self, b: BlockIndex) -> Result<(), AssemblyError> {
        if b.get() < self.blocks.len() {
            Ok(())
        } else {
            Err(AssemblyError::BlockIndexOutOfRange {
                index: b.get(),
                len: self.blocks.len(),
            })
        }
    }
}

impl TryFrom<LayoutRecord> for DofManager {
    type Error = AssemblyError;

    fn try_from(record: LayoutRecord) -> Result<Self, Self::Error> {
        let manager = Self::from_tables(record.blocks, record.sizes, record.registry_version)?;
        manager.validate_invariants().inspect_err(|e| {
            log::warn!("rejected serialized layout: {e}");
        })?;
        Ok(manager)
    }
}

impl From<DofManager> for LayoutRecord {
    fn from(manager: DofManager) -> Self {
        LayoutRecord {
            blocks: manager.blocks,
            sizes: manager.sizes,
            registry_version: manager.registry_version,
        }
    }
}

impl DebugInvariants for DofManager {
    fn validate_invariants(&self) -> Result<(), AssemblyError> {
        let n = self.blocks.len();
        if self.sizes.len() != n || self.offsets.len() != n + 1 {
            return Err(AssemblyError::InvariantViolation(format!(
                "table lengths disagree: {n} blocks, {} sizes, {} offsets",
                self.sizes.len(),
                self.offsets.len()
            )));
        }
        if self.offsets[0] != 0 {
            return Err(AssemblyError::InvariantViolation(
                "first block does not start at 0".into(),
            ));
        }
        for i in 0..n {
            if self.offsets[i + 1] != self.offsets[i] + self.sizes[i] {
                return Err(AssemblyError::InvariantViolation(format!(
                    "gap or overlap after block {i} ({})",
                    self.blocks[i]
                )));
            }
        }

        let mut seen = HashSet::with_capacity(n);
        if let Some(dup) = self.blocks.iter().find(|b| !seen.insert(*b)) {
            return Err(AssemblyError::InvariantViolation(format!(
                "block {dup} numbered twice"
            )));
        }

        let mut covered = 0usize;
        for (entity, range) in &self.entity_ranges {
            if self.blocks[range.clone()].iter().any(|b| &b.entity != entity) {
                return Err(AssemblyError::InvariantViolation(format!(
                    "blocks of {entity} are not adjacent"
                )));
            }
            covered += range.len();
        }
        if covered != n {
            return Err(AssemblyError::InvariantViolation(format!(
                "entity ranges cover {covered} of {n} blocks"
            )));
        }
        Ok(())
    }
}
