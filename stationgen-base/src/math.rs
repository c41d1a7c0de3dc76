//! Coordinate types and grid geometry.

mod face;
pub use face::*;
mod grid_aab;
pub use grid_aab::*;
mod rigid;
pub use rigid::*;
mod rotation;
pub use rotation::*;

/// Coordinates that are locked to the cube grid.
pub type GridCoordinate = i32;

/// Unit-of-measure marker for [`euclid`] types: one unit is the edge length of one grid cell.
///
/// This type has no values; it exists only to distinguish grid-space points and vectors
/// from other quantities.
#[derive(Debug)]
pub enum Cell {}

/// A point in grid space.
///
/// When a point identifies a cell, the cell is the unit cube whose lowest corner is the point.
pub type GridPoint = euclid::Point3D<GridCoordinate, Cell>;

/// A displacement in grid space.
pub type GridVector = euclid::Vector3D<GridCoordinate, Cell>;

/// Converts a plain array, as found in authoring data, to a [`GridPoint`].
#[inline]
pub const fn point(coordinates: [GridCoordinate; 3]) -> GridPoint {
    GridPoint::new(coordinates[0], coordinates[1], coordinates[2])
}
