//! DOF multiplicities per geometric primitive.

use crate::topology::geometry::Geometry;

/// How many scalar unknowns a variable places on each kind of primitive.
///
/// The size of the resulting block on an entity is
/// `cells * num_cells + faces * num_faces + nodes * num_nodes`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct DofLayout {
    pub cells: usize,
    pub faces: usize,
    pub nodes: usize,
}

impl DofLayout {
    /// `n` DOFs per cell.
    pub const fn cells(n: usize) -> Self {
        Self {
            cells: n,
            faces: 0,
            nodes: 0,
        }
    }

    /// `n` DOFs per face.
    pub const fn faces(n: usize) -> Self {
        Self {
            cells: 0,
            faces: n,
            nodes: 0,
        }
    }

    /// `n` DOFs per node.
    pub const fn nodes(n: usize) -> Self {
        Self {
            cells: 0,
            faces: 0,
            nodes: n,
        }
    }

    /// Adds `n` DOFs per cell.
    pub const fn with_cells(mut self, n: usize) -> Self {
        self.cells = n;
        self
    }

    /// Adds `n` DOFs per face.
    pub const fn with_faces(mut self, n: usize) -> Self {
        self.faces = n;
        self
    }

    /// Adds `n` DOFs per node.
    pub const fn with_nodes(mut self, n: usize) -> Self {
        self.nodes = n;
        self
    }

    /// True if the layout places no DOF on any primitive.
    pub const fn is_empty(&self) -> bool {
        self.cells == 0 && self.faces == 0 && self.nodes == 0
    }

    /// Number of scalar DOFs this layout yields on `geometry`.
    pub fn size_on(&self, geometry: &Geometry) -> usize {
        self.cells * geometry.num_cells
            + self.faces * geometry.num_faces
            + self.nodes * geometry.nodes_or_zero()
    }
}
