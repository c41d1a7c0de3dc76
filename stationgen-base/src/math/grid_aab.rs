//! Axis-aligned boxes in grid space.

use core::fmt;

use crate::math::{GridCoordinate, GridPoint, GridVector, Gridgid};

/// An axis-aligned box with integer coordinates, whose volume is no less than zero.
///
/// The box is half-open: it contains the cells whose lowest corners `p` satisfy
/// `lower_bounds() <= p < upper_bounds()` componentwise.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct GridAab {
    lower_bounds: GridPoint,
    upper_bounds: GridPoint,
}

impl GridAab {
    /// Box containing the unit cube from `[0, 0, 0]` to `[1, 1, 1]`.
    pub const ORIGIN_CUBE: GridAab = GridAab {
        lower_bounds: GridPoint::new(0, 0, 0),
        upper_bounds: GridPoint::new(1, 1, 1),
    };

    /// Constructs a [`GridAab`] from inclusive lower bounds and exclusive upper bounds.
    ///
    /// Panics if any upper bound is less than its lower bound; use
    /// [`GridAab::checked_from_lower_upper()`] for input that is not trusted.
    #[track_caller]
    #[inline]
    pub fn from_lower_upper(
        lower_bounds: impl Into<GridPoint>,
        upper_bounds: impl Into<GridPoint>,
    ) -> GridAab {
        match Self::checked_from_lower_upper(lower_bounds.into(), upper_bounds.into()) {
            Ok(aab) => aab,
            Err(e) => panic!("{e}"),
        }
    }

    /// Constructs a [`GridAab`] from inclusive lower bounds and exclusive upper bounds.
    ///
    /// Returns an error if any upper bound is less than its lower bound.
    #[inline]
    pub fn checked_from_lower_upper(
        lower_bounds: GridPoint,
        upper_bounds: GridPoint,
    ) -> Result<Self, InvertedBoxError> {
        if lower_bounds.x > upper_bounds.x
            || lower_bounds.y > upper_bounds.y
            || lower_bounds.z > upper_bounds.z
        {
            return Err(InvertedBoxError {
                lower_bounds: lower_bounds.to_array(),
                upper_bounds: upper_bounds.to_array(),
            });
        }
        Ok(Self {
            lower_bounds,
            upper_bounds,
        })
    }

    /// Constructs a [`GridAab`] containing exactly the single cell at `cube`.
    #[inline]
    pub fn single_cube(cube: GridPoint) -> Self {
        Self {
            lower_bounds: cube,
            upper_bounds: cube + GridVector::new(1, 1, 1),
        }
    }

    /// Inclusive lower bounds on cube coordinates.
    #[inline]
    pub const fn lower_bounds(&self) -> GridPoint {
        self.lower_bounds
    }

    /// Exclusive upper bounds on cube coordinates.
    #[inline]
    pub const fn upper_bounds(&self) -> GridPoint {
        self.upper_bounds
    }

    /// Edge lengths of the box.
    #[inline]
    pub fn size(&self) -> GridVector {
        self.upper_bounds - self.lower_bounds
    }

    /// Number of cells in the box.
    #[inline]
    pub fn volume(&self) -> u64 {
        let size = self.size();
        size.x as u64 * size.y as u64 * size.z as u64
    }

    /// Whether the box contains no cells.
    #[inline]
    pub fn is_empty(&self) -> bool {
        let size = self.size();
        size.x == 0 || size.y == 0 || size.z == 0
    }

    /// Squared length of the box's diagonal; a measure of bounding-sphere size which does
    /// not depend on the box's position.
    #[inline]
    pub fn diagonal_squared(&self) -> i64 {
        let size = self.size().cast::<i64>();
        size.square_length()
    }

    /// Returns whether the box contains the cell whose lowest corner is `cube`.
    #[inline]
    pub fn contains_cube(&self, cube: GridPoint) -> bool {
        let l = self.lower_bounds;
        let u = self.upper_bounds;
        (l.x..u.x).contains(&cube.x) && (l.y..u.y).contains(&cube.y) && (l.z..u.z).contains(&cube.z)
    }

    /// Returns whether the two boxes share at least one cell.
    #[inline]
    pub fn intersects(&self, other: GridAab) -> bool {
        self.intersection_cubes(other).is_some()
    }

    /// Returns the box of cells in both `self` and `other`, or [`None`] if there are none.
    #[inline]
    pub fn intersection_cubes(&self, other: GridAab) -> Option<GridAab> {
        let lower_bounds = self.lower_bounds.max(other.lower_bounds);
        let upper_bounds = self.upper_bounds.min(other.upper_bounds);
        if lower_bounds.x < upper_bounds.x
            && lower_bounds.y < upper_bounds.y
            && lower_bounds.z < upper_bounds.z
        {
            Some(GridAab {
                lower_bounds,
                upper_bounds,
            })
        } else {
            None
        }
    }

    /// Returns the smallest box containing both `self` and `other`.
    ///
    /// Empty boxes still contribute their position.
    #[inline]
    #[must_use]
    pub fn union_box(self, other: GridAab) -> GridAab {
        GridAab {
            lower_bounds: self.lower_bounds.min(other.lower_bounds),
            upper_bounds: self.upper_bounds.max(other.upper_bounds),
        }
    }

    /// Returns the smallest box containing both `self` and the cell at `cube`.
    #[inline]
    #[must_use]
    pub fn union_cube(self, cube: GridPoint) -> GridAab {
        self.union_box(GridAab::single_cube(cube))
    }

    /// Returns the box which contains exactly the images of this box's cells under `transform`.
    #[inline]
    #[must_use]
    pub fn transform(self, transform: Gridgid) -> Self {
        let a = transform.transform_point(self.lower_bounds);
        let b = transform.transform_point(self.upper_bounds);
        GridAab {
            lower_bounds: a.min(b),
            upper_bounds: a.max(b),
        }
    }

    /// Iterates over the lowest corners of all cells in the box, in X-major order.
    pub fn interior_iter(self) -> impl Iterator<Item = GridPoint> {
        let GridAab {
            lower_bounds: l,
            upper_bounds: u,
        } = self;
        (l.x..u.x).flat_map(move |x| {
            (l.y..u.y).flat_map(move |y| (l.z..u.z).map(move |z| GridPoint::new(x, y, z)))
        })
    }

    /// Returns the bounds as plain arrays, `[lower, upper]`.
    #[inline]
    pub fn to_arrays(&self) -> [[GridCoordinate; 3]; 2] {
        [self.lower_bounds.to_array(), self.upper_bounds.to_array()]
    }
}

impl fmt::Debug for GridAab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let l = self.lower_bounds;
        let u = self.upper_bounds;
        write!(
            f,
            "GridAab({:?}, {:?}, {:?})",
            l.x..u.x,
            l.y..u.y,
            l.z..u.z
        )
    }
}

/// Error when a [`GridAab`] cannot be constructed from the given input.
#[derive(Clone, Debug, Eq, displaydoc::Display, PartialEq)]
#[displaydoc("box has upper bounds {upper_bounds:?} below its lower bounds {lower_bounds:?}")]
pub struct InvertedBoxError {
    lower_bounds: [GridCoordinate; 3],
    upper_bounds: [GridCoordinate; 3],
}

impl core::error::Error for InvertedBoxError {}
