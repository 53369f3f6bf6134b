//! Opaque geometric description of a subdomain or interface.
//!
//! The assembler never looks inside a grid; it only needs the primitive
//! counts that a [`DofLayout`](crate::registry::layout::DofLayout) multiplies
//! against. Discretization capabilities receive the same record and may use
//! the counts to size their local operators.

/// Primitive counts of an externally owned grid.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Geometry {
    /// Topological dimension of the grid.
    pub dimension: u8,
    /// Number of cells.
    pub num_cells: usize,
    /// Number of faces.
    pub num_faces: usize,
    /// Number of nodes, when the grid exposes them.
    pub num_nodes: Option<usize>,
}

impl Geometry {
    /// Grid with cells and faces only.
    pub fn new(dimension: u8, num_cells: usize, num_faces: usize) -> Self {
        Self {
            dimension,
            num_cells,
            num_faces,
            num_nodes: None,
        }
    }

    /// Attach a node count.
    pub fn with_nodes(mut self, num_nodes: usize) -> Self {
        self.num_nodes = Some(num_nodes);
        self
    }

    /// Geometry of an interface (mortar) grid: cells only, no faces.
    pub fn interface(dimension: u8, num_cells: usize) -> Self {
        Self::new(dimension, num_cells, 0)
    }

    /// Node count, treating an absent count as zero.
    #[inline]
    pub fn nodes_or_zero(&self) -> usize {
        self.num_nodes.unwrap_or(0)
    }
}
