//! Unpacking a global solution vector into per-block pieces.
//!
//! A [`SolutionMap`] is the inverse of the block numbering: it slices a
//! vector of length `total_dofs()` along the block ranges of a
//! [`DofManager`] and keys each slice by its (entity, variable) pair.

use nalgebra::DVector;

use crate::assembly_error::AssemblyError;
use crate::dof::block::Block;
use crate::dof::manager::DofManager;
use crate::registry::names::VariableName;
use crate::topology::handle::EntityId;

/// Per-block solution values in traversal order.
#[derive(Clone, Debug, PartialEq)]
pub struct SolutionMap {
    entries: Vec<(Block, DVector<f64>)>,
}

impl SolutionMap {
    /// Splits `x` along the block ranges of `dofs`.
    ///
    /// # Errors
    /// `SolutionLength` if `x.len() != dofs.total_dofs()`.
    pub fn distribute(dofs: &DofManager, x: &DVector<f64>) -> Result<Self, AssemblyError> {
        if x.len() != dofs.total_dofs() {
            return Err(AssemblyError::SolutionLength {
                expected: dofs.total_dofs(),
                found: x.len(),
            });
        }
        let entries = dofs
            .blocks()
            .zip(dofs.spans())
            .map(|((_, block), (offset, size))| {
                (block.clone(), x.rows(offset, size).into_owned())
            })
            .collect();
        Ok(Self { entries })
    }

    /// Values of `variable` on `entity`, if that block exists.
    pub fn get(&self, entity: EntityId, variable: &VariableName) -> Option<&DVector<f64>> {
        self.entries
            .iter()
            .find(|(b, _)| b.entity == entity && &b.variable == variable)
            .map(|(_, v)| v)
    }

    /// All blocks with their values, in traversal order.
    pub fn iter(&self) -> impl Iterator<Item = (&Block, &DVector<f64>)> {
        self.entries.iter().map(|(b, v)| (b, v))
    }

    /// Blocks of one entity, in declaration order.
    pub fn of_entity(&self, entity: EntityId) -> impl Iterator<Item = (&VariableName, &DVector<f64>)> {
        self.entries
            .iter()
            .filter(move |(b, _)| b.entity == entity)
            .map(|(b, v)| (&b.variable, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Concatenates the pieces back into one global vector.
    pub fn to_global(&self) -> DVector<f64> {
        let values: Vec<f64> = self
            .entries
            .iter()
            .flat_map(|(_, v)| v.iter().copied())
            .collect();
        DVector::from_vec(values)
    }
}
