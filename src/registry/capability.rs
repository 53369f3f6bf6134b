//! Discretization capabilities: the contract external numerical schemes implement.
//!
//! The assembler never inspects which scheme is bound. It only calls
//! [`NodeDiscretization::discretize`] for each (entity, variable, operator)
//! binding and [`CouplingDiscretization::discretize_coupling`] for each
//! coupling term, then scatters whatever comes back.

use std::collections::BTreeMap;
use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::assembly_error::CapabilityError;
use crate::topology::geometry::Geometry;
use crate::topology::handle::{InterfaceId, SubdomainId};
use crate::topology::parameters::{Keyword, Parameters};

/// Output of a node discretization: a square local matrix sized to one block,
/// the matching right-hand side, and any named auxiliary operators a coupling
/// term may need later (trace, projection, ...).
#[derive(Clone, Debug, PartialEq)]
pub struct LocalDiscretization {
    pub matrix: DMatrix<f64>,
    pub rhs: DVector<f64>,
    auxiliary: BTreeMap<String, DMatrix<f64>>,
}

impl LocalDiscretization {
    /// Wraps a local matrix and right-hand side.
    pub fn new(matrix: DMatrix<f64>, rhs: DVector<f64>) -> Self {
        Self {
            matrix,
            rhs,
            auxiliary: BTreeMap::new(),
        }
    }

    /// Zero matrix and zero rhs of dimension `n`.
    pub fn zeros(n: usize) -> Self {
        Self::new(DMatrix::zeros(n, n), DVector::zeros(n))
    }

    /// Attaches a named auxiliary operator.
    pub fn with_auxiliary(mut self, name: impl Into<String>, op: DMatrix<f64>) -> Self {
        self.auxiliary.insert(name.into(), op);
        self
    }

    /// Looks up a named auxiliary operator.
    pub fn auxiliary(&self, name: &str) -> Option<&DMatrix<f64>> {
        self.auxiliary.get(name)
    }
}

/// Position of an entity within a coupling term.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CouplingSlot {
    Primary,
    Secondary,
    Interface,
}

impl CouplingSlot {
    /// All three slots in row order.
    pub const ALL: [CouplingSlot; 3] = [
        CouplingSlot::Primary,
        CouplingSlot::Secondary,
        CouplingSlot::Interface,
    ];
}

/// Output of a coupling discretization.
///
/// Matrix blocks are keyed by ordered (row slot, column slot) pairs; rhs
/// contributions by a single slot. Any subset of the nine pairs may be set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CouplingContribution {
    blocks: BTreeMap<(CouplingSlot, CouplingSlot), DMatrix<f64>>,
    rhs: BTreeMap<CouplingSlot, DVector<f64>>,
}

impl CouplingContribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the matrix block coupling `row` to `col`, returning any previous block.
    pub fn set_block(
        &mut self,
        row: CouplingSlot,
        col: CouplingSlot,
        block: DMatrix<f64>,
    ) -> Option<DMatrix<f64>> {
        self.blocks.insert((row, col), block)
    }

    /// Sets the rhs contribution of `slot`, returning any previous vector.
    pub fn set_rhs(&mut self, slot: CouplingSlot, rhs: DVector<f64>) -> Option<DVector<f64>> {
        self.rhs.insert(slot, rhs)
    }

    pub fn block(&self, row: CouplingSlot, col: CouplingSlot) -> Option<&DMatrix<f64>> {
        self.blocks.get(&(row, col))
    }

    pub fn rhs(&self, slot: CouplingSlot) -> Option<&DVector<f64>> {
        self.rhs.get(&slot)
    }

    /// Matrix blocks in (row, col) slot order.
    pub fn blocks(&self) -> impl Iterator<Item = ((CouplingSlot, CouplingSlot), &DMatrix<f64>)> {
        self.blocks.iter().map(|(&k, m)| (k, m))
    }

    /// Rhs contributions in slot order.
    pub fn rhs_entries(&self) -> impl Iterator<Item = (CouplingSlot, &DVector<f64>)> {
        self.rhs.iter().map(|(&k, v)| (k, v))
    }
}

/// Geometry and parameters of an entity, as seen by a capability.
#[derive(Clone, Copy, Debug)]
pub struct EntityView<'a> {
    pub geometry: &'a Geometry,
    pub parameters: &'a Parameters,
}

/// One endpoint of a coupling term together with its already computed
/// node discretization.
#[derive(Clone, Copy, Debug)]
pub struct EndpointView<'a> {
    pub subdomain: SubdomainId,
    pub geometry: &'a Geometry,
    pub parameters: &'a Parameters,
    pub result: &'a LocalDiscretization,
}

/// Everything a coupling capability is given.
#[derive(Clone, Copy, Debug)]
pub struct CouplingContext<'a> {
    pub interface_id: InterfaceId,
    pub interface: EntityView<'a>,
    pub primary: EndpointView<'a>,
    pub secondary: EndpointView<'a>,
}

/// Per-entity discretization scheme.
pub trait NodeDiscretization: Send + Sync {
    /// Parameter set the scheme reads, if any.
    fn keyword(&self) -> Option<&Keyword> {
        None
    }

    /// Computes the local matrix and rhs of one block.
    fn discretize(
        &self,
        geometry: &Geometry,
        parameters: &Parameters,
    ) -> Result<LocalDiscretization, CapabilityError>;
}

/// Interface coupling scheme.
pub trait CouplingDiscretization: Send + Sync {
    /// Parameter set the scheme reads on the interface, if any.
    fn keyword(&self) -> Option<&Keyword> {
        None
    }

    /// Computes the blocks among primary, secondary and interface.
    fn discretize_coupling(
        &self,
        ctx: CouplingContext<'_>,
    ) -> Result<CouplingContribution, CapabilityError>;
}

impl fmt::Debug for dyn NodeDiscretization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDiscretization")
            .field("keyword", &self.keyword())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for dyn CouplingDiscretization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CouplingDiscretization")
            .field("keyword", &self.keyword())
            .finish_non_exhaustive()
    }
}
