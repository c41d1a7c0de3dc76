use core::cmp::Ordering;
use core::fmt;
use core::ops::Mul;

use crate::math::{GridPoint, GridRotation, GridVector};

/// A [rigid transformation] that is composed of a [`GridRotation`] followed by an
/// integer-valued translation.
///
/// Only proper rotations are representable, so this never mirrors a part.
///
/// [rigid transformation]: https://en.wikipedia.org/wiki/Rigid_transformation
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct Gridgid {
    /// Rotation component. Applied before the translation.
    pub rotation: GridRotation,
    /// Translation component. Applied after the rotation.
    pub translation: GridVector,
}

impl Gridgid {
    /// The identity transform, which leaves points unchanged.
    pub const IDENTITY: Self = Self {
        rotation: GridRotation::IDENTITY,
        translation: GridVector::new(0, 0, 0),
    };

    /// Constructs a [`Gridgid`] that only performs rotation about the origin point.
    #[inline]
    pub const fn from_rotation_about_origin(rotation: GridRotation) -> Self {
        Self {
            rotation,
            translation: GridVector::new(0, 0, 0),
        }
    }

    /// Constructs a [`Gridgid`] that only performs translation.
    #[inline]
    pub fn from_translation(translation: impl Into<GridVector>) -> Self {
        Self {
            rotation: GridRotation::IDENTITY,
            translation: translation.into(),
        }
    }

    /// Applies this transform to the given point.
    ///
    /// Note that a point is not a cell; if the point identifies a cell then use
    /// [`Gridgid::transform_cube()`] instead.
    #[inline]
    pub fn transform_point(self, point: GridPoint) -> GridPoint {
        self.rotation.transform_vector(point.to_vector()).to_point() + self.translation
    }

    /// Transforms the cell whose lowest corner is `cube`, returning the lowest corner of
    /// the image cell.
    ///
    /// This treats the cell as a solid unit cube, so the result differs from
    /// [`Gridgid::transform_point()`] whenever the rotation flips an axis.
    ///
    /// ```
    /// use stationgen_base::math::{Face6, Gridgid, GridPoint, GridRotation, GridVector};
    ///
    /// let half_turn = Gridgid {
    ///     rotation: GridRotation::from_basis(Face6::NX, Face6::NY).unwrap(),
    ///     translation: GridVector::new(10, 0, 0),
    /// };
    /// assert_eq!(half_turn.transform_point(GridPoint::new(1, 5, 5)), GridPoint::new(9, -5, 5));
    /// assert_eq!(half_turn.transform_cube(GridPoint::new(1, 5, 5)), GridPoint::new(8, -6, 5));
    /// ```
    #[inline]
    pub fn transform_cube(self, cube: GridPoint) -> GridPoint {
        self.transform_point(cube)
            .min(self.transform_point(cube + GridVector::new(1, 1, 1)))
    }

    /// Returns the transform which maps the outputs of this one to the inputs of this one.
    #[must_use]
    #[inline]
    pub fn inverse(self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            rotation,
            translation: -rotation.transform_vector(self.translation),
        }
    }

    fn sort_key(&self) -> (GridRotation, [i32; 3]) {
        (self.rotation, self.translation.to_array())
    }
}

impl Default for Gridgid {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Debug for Gridgid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            rotation,
            translation,
        } = self;
        f.debug_struct("Gridgid")
            .field("rotation", rotation)
            .field("translation", &translation.to_array())
            .finish()
    }
}

/// An arbitrary but stable total order, so transforms can key ordered maps.
impl Ord for Gridgid {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for Gridgid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Composition: `(a * b).transform_point(p) == a.transform_point(b.transform_point(p))`.
impl Mul<Self> for Gridgid {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self::Output {
        Self {
            rotation: self.rotation * rhs.rotation,
            translation: self.rotation.transform_vector(rhs.translation) + self.translation,
        }
    }
}

impl From<GridRotation> for Gridgid {
    #[inline]
    fn from(value: GridRotation) -> Self {
        Self::from_rotation_about_origin(value)
    }
}
