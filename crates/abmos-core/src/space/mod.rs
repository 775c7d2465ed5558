//! Agent Space
//!
//! Spatial proximity for neighbour discovery and movement.

pub mod grid;

pub use grid::{
    grid_slots, BoundaryPolicy, Placement, SpaceKind, SpatialGrid, MAX_GRID_SLOTS,
    MIN_WRAP_EXTENT, NEIGHBOUR_OFFSETS,
};
