//! Top-level module for the coupled-problem topology.
//!
//! This module provides the entity graph the assembler works over:
//! - Typed handles for subdomains, interfaces and either kind of entity
//! - Opaque geometric descriptions (primitive counts)
//! - Keyword-grouped parameter storage attached to each entity
//! - The `TopologyGraph` arena that owns all of the above
//!
//! Most users build a `TopologyGraph` once per problem configuration and hand
//! it to an [`Assembler`](crate::assembler::Assembler).

pub mod geometry;
pub mod graph;
pub mod handle;
pub mod parameters;

pub use geometry::Geometry;
pub use graph::{EntityData, TopologyGraph};
pub use handle::{EntityId, InterfaceId, SubdomainId};
pub use parameters::{Keyword, ParamValue, Parameters};
