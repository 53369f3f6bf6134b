//! Scatter cached local contributions into the global system.
//!
//! Local blocks are accumulated in coordinate (triplet) form, which tolerates
//! any number of duplicate `(row, col)` entries; finalization converts to CSR
//! and sums the duplicates. Contributions are always added, never
//! overwritten, so several operators on one variable or several coupling
//! terms touching one block simply superpose.
//!
//! Traversal follows the registry (entities in numbering order, bindings and
//! couplings in registration order), so the same cache always yields the
//! same triplet sequence and hence a bit-identical result.

use std::collections::BTreeSet;
use std::ops::Range;

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::assembly::system::LinearSystem;
use crate::assembly_error::AssemblyError;
use crate::discretize::cache::DiscretizationCache;
use crate::dof::block::BlockIndex;
use crate::dof::manager::DofManager;
use crate::registry::capability::CouplingSlot;
use crate::registry::names::VariableName;
use crate::registry::registry::{CouplingTerm, Registry};
use crate::topology::graph::TopologyGraph;
use crate::topology::handle::EntityId;

/// Triplet accumulator over a fixed block layout.
pub struct Scatter<'a> {
    dofs: &'a DofManager,
    coo: CooMatrix<f64>,
    rhs: DVector<f64>,
    drop_zeros: bool,
}

impl<'a> Scatter<'a> {
    pub fn new(dofs: &'a DofManager, drop_zeros: bool) -> Self {
        let n = dofs.total_dofs();
        Self {
            dofs,
            coo: CooMatrix::new(n, n),
            rhs: DVector::zeros(n),
            drop_zeros,
        }
    }

    /// Adds `local` into rows of block `row` and columns of block `col`.
    ///
    /// # Errors
    /// `ShapeMismatch` if `local` is not `size(row) x size(col)`.
    pub fn add_block(
        &mut self,
        term: &str,
        row: BlockIndex,
        col: BlockIndex,
        local: &DMatrix<f64>,
    ) -> Result<(), AssemblyError> {
        let rows = self.dofs.range_of(row)?;
        let cols = self.dofs.range_of(col)?;
        check_shape(term, &rows, &cols, local.nrows(), local.ncols())?;
        for j in 0..local.ncols() {
            for i in 0..local.nrows() {
                let v = local[(i, j)];
                if self.drop_zeros && v == 0.0 {
                    continue;
                }
                self.coo.push(rows.start + i, cols.start + j, v);
            }
        }
        Ok(())
    }

    /// Adds `local` into the rhs entries of block `b`.
    pub fn add_rhs(
        &mut self,
        term: &str,
        b: BlockIndex,
        local: &DVector<f64>,
    ) -> Result<(), AssemblyError> {
        let rows = self.dofs.range_of(b)?;
        check_shape(term, &rows, &(0..1), local.len(), 1)?;
        let mut target = self.rhs.rows_mut(rows.start, rows.len());
        target += local;
        Ok(())
    }

    /// Number of triplets pushed so far.
    pub fn num_triplets(&self) -> usize {
        self.coo.nnz()
    }

    /// Converts the triplets to CSR, summing duplicates.
    pub fn finish(self) -> LinearSystem {
        let matrix = CsrMatrix::from(&self.coo);
        let ranges = self
            .dofs
            .spans()
            .map(|(offset, size)| offset..offset + size)
            .collect();
        LinearSystem::new(matrix, self.rhs, ranges)
    }
}

fn check_shape(
    term: &str,
    rows: &Range<usize>,
    cols: &Range<usize>,
    nrows: usize,
    ncols: usize,
) -> Result<(), AssemblyError> {
    if nrows != rows.len() || ncols != cols.len() {
        return Err(AssemblyError::ShapeMismatch {
            term: term.to_string(),
            expected_rows: rows.len(),
            expected_cols: cols.len(),
            rows: nrows,
            cols: ncols,
        });
    }
    Ok(())
}

/// Restricts assembly to a set of variables; `None` assembles everything.
pub type VariableFilter<'f> = Option<&'f BTreeSet<VariableName>>;

fn selected(filter: VariableFilter<'_>, variable: &VariableName) -> bool {
    filter.is_none_or(|set| set.contains(variable))
}

/// Scatter every cached node and coupling contribution.
///
/// With a filter, node terms of unselected variables are skipped and
/// coupling blocks are kept only when both their row and column variables
/// are selected. Numbering is unaffected; skipped blocks stay empty.
pub fn assemble(
    graph: &TopologyGraph,
    registry: &Registry,
    dofs: &DofManager,
    cache: &DiscretizationCache,
    drop_zeros: bool,
    filter: VariableFilter<'_>,
) -> Result<LinearSystem, AssemblyError> {
    let mut scatter = Scatter::new(dofs, drop_zeros);

    for entity in graph.entities() {
        for binding in registry.bindings(entity) {
            if !selected(filter, &binding.variable) {
                continue;
            }
            let term = format!(
                "operator `{}` of `{}` on {entity}",
                binding.operator, binding.variable
            );
            let local = cache
                .node(entity, &binding.variable, &binding.operator)
                .ok_or_else(|| not_discretized(&term))?;
            let b = dofs.block_of(entity, &binding.variable)?;
            scatter.add_block(&term, b, b, &local.matrix)?;
            scatter.add_rhs(&term, b, &local.rhs)?;
        }
    }

    for term in registry.all_couplings() {
        let label = term.label();
        let contribution = cache
            .coupling(term.interface.interface, &term.name)
            .ok_or_else(|| not_discretized(&label))?;
        if contribution.blocks().next().is_none() && contribution.rhs_entries().next().is_none() {
            log::warn!("{label} contributed no blocks");
        }
        let slot_block = |slot| slot_target(dofs, term, slot);
        for ((row, col), local) in contribution.blocks() {
            let (rb, rv) = slot_block(row)?;
            let (cb, cv) = slot_block(col)?;
            if !(selected(filter, rv) && selected(filter, cv)) {
                continue;
            }
            scatter.add_block(&format!("{label} [{row:?}, {col:?}]"), rb, cb, local)?;
        }
        for (slot, local) in contribution.rhs_entries() {
            let (b, v) = slot_block(slot)?;
            if !selected(filter, v) {
                continue;
            }
            scatter.add_rhs(&format!("{label} [{slot:?}]"), b, local)?;
        }
    }

    log::debug!("scattered {} triplets", scatter.num_triplets());
    let system = scatter.finish();
    log::info!(
        "assembled {}x{} system with {} stored entries",
        system.nrows(),
        system.nrows(),
        system.nnz()
    );
    Ok(system)
}

/// Block and variable a coupling slot writes into.
fn slot_target<'t>(
    dofs: &DofManager,
    term: &'t CouplingTerm,
    slot: CouplingSlot,
) -> Result<(BlockIndex, &'t VariableName), AssemblyError> {
    let (entity, variable) = match slot {
        CouplingSlot::Primary => (
            EntityId::from(term.primary.subdomain),
            &term.primary.variable,
        ),
        CouplingSlot::Secondary => (
            EntityId::from(term.secondary.subdomain),
            &term.secondary.variable,
        ),
        CouplingSlot::Interface => (
            EntityId::from(term.interface.interface),
            &term.interface.variable,
        ),
    };
    Ok((dofs.block_of(entity, variable)?, variable))
}

fn not_discretized(term: &str) -> AssemblyError {
    AssemblyError::InvariantViolation(format!("{term} has no cached discretization"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::layout::DofLayout;
    use crate::topology::geometry::Geometry;

    fn layout() -> DofManager {
        let mut graph = TopologyGraph::new();
        let s0 = graph.add_subdomain(Geometry::new(2, 2, 7));
        let s1 = graph.add_subdomain(Geometry::new(2, 3, 10));
        let mut registry = Registry::new();
        for s in [s0, s1] {
            registry
                .register_variable(
                    &graph,
                    s.into(),
                    VariableName::new("u").unwrap(),
                    DofLayout::cells(1),
                )
                .unwrap();
        }
        DofManager::build(&graph, &registry).unwrap()
    }

    #[test]
    fn duplicates_are_summed() {
        let dofs = layout();
        let (b0, b1) = (BlockIndex::new(0), BlockIndex::new(1));
        let mut scatter = Scatter::new(&dofs, true);
        let local = DMatrix::from_element(2, 3, 1.5);
        scatter.add_block("a", b0, b1, &local).unwrap();
        scatter.add_block("b", b0, b1, &local).unwrap();
        scatter
            .add_rhs("a", b1, &DVector::from_element(3, 2.0))
            .unwrap();
        scatter
            .add_rhs("b", b1, &DVector::from_element(3, 2.0))
            .unwrap();
        assert_eq!(scatter.num_triplets(), 12);
        let system = scatter.finish();
        assert_eq!(system.nrows(), 5);
        assert_eq!(system.nnz(), 6);
        assert_eq!(system.entry(1, 4), 3.0);
        assert_eq!(system.entry(4, 1), 0.0);
        assert_eq!(system.entry(5, 0), 0.0);
        assert_eq!(system.entry(0, 5), 0.0);
        assert_eq!(system.rhs_block(b1).unwrap(), DVector::from_element(3, 4.0));
        assert_eq!(system.rhs_block(b0).unwrap(), DVector::zeros(2));
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let dofs = layout();
        let b1 = BlockIndex::new(1);
        let mut scatter = Scatter::new(&dofs, true);
        let err = scatter
            .add_block("stencil", b1, b1, &DMatrix::zeros(2, 3))
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::ShapeMismatch {
                expected_rows: 3,
                expected_cols: 3,
                rows: 2,
                cols: 3,
                ..
            }
        ));
        let err = scatter
            .add_rhs("stencil", b1, &DVector::zeros(4))
            .unwrap_err();
        assert!(matches!(err, AssemblyError::ShapeMismatch { rows: 4, .. }));
        assert!(matches!(
            scatter.add_rhs("stencil", BlockIndex::new(2), &DVector::zeros(1)),
            Err(AssemblyError::BlockIndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn explicit_zeros_are_kept_on_request() {
        let dofs = layout();
        let b0 = BlockIndex::new(0);
        let zeros = DMatrix::zeros(2, 2);

        let mut dropping = Scatter::new(&dofs, true);
        dropping.add_block("z", b0, b0, &zeros).unwrap();
        assert_eq!(dropping.finish().nnz(), 0);

        let mut keeping = Scatter::new(&dofs, false);
        keeping.add_block("z", b0, b0, &zeros).unwrap();
        let system = keeping.finish();
        assert_eq!(system.nnz(), 4);
        assert_eq!(system.block(b0, b0).unwrap(), zeros);
    }
}
