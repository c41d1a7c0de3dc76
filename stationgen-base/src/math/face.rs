//! Axes and axis-aligned unit directions.
//! This module is private but reexported by its parent.

use core::ops;

use crate::math::{GridCoordinate, GridVector};

/// Enumeration of the axes of three-dimensional space.
///
/// Can be used to infallibly index 3-component arrays.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, exhaust::Exhaust)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    /// All three axes in the standard order, [X, Y, Z].
    pub const ALL: [Self; 3] = [Self::X, Self::Y, Self::Z];

    /// Returns the [`Face6`] value which corresponds to the positive direction on this axis.
    #[inline]
    pub const fn positive_face(self) -> Face6 {
        match self {
            Axis::X => Face6::PX,
            Axis::Y => Face6::PY,
            Axis::Z => Face6::PZ,
        }
    }

    /// Returns the [`Face6`] value which corresponds to the negative direction on this axis.
    #[inline]
    pub const fn negative_face(self) -> Face6 {
        match self {
            Axis::X => Face6::NX,
            Axis::Y => Face6::NY,
            Axis::Z => Face6::NZ,
        }
    }
}

/// Identifies a face of a cube or an orthogonal unit vector.
///
/// Anchors use this for their outward direction and their bias directions.
#[derive(Clone, Copy, Debug, Hash, Eq, Ord, PartialEq, PartialOrd, exhaust::Exhaust)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Face6 {
    /// Negative X; the face whose normal vector is `(-1, 0, 0)`.
    NX = 1,
    /// Negative Y; the face whose normal vector is `(0, -1, 0)`.
    NY = 2,
    /// Negative Z; the face whose normal vector is `(0, 0, -1)`.
    NZ = 3,
    /// Positive X; the face whose normal vector is `(1, 0, 0)`.
    PX = 4,
    /// Positive Y; the face whose normal vector is `(0, 1, 0)`.
    PY = 5,
    /// Positive Z; the face whose normal vector is `(0, 0, 1)`.
    PZ = 6,
}

impl Face6 {
    /// All the values of [`Face6`].
    pub const ALL: [Face6; 6] = [
        Face6::NX,
        Face6::NY,
        Face6::NZ,
        Face6::PX,
        Face6::PY,
        Face6::PZ,
    ];

    /// Returns which axis this face's normal vector is parallel to.
    #[inline]
    pub const fn axis(self) -> Axis {
        match self {
            Self::NX | Self::PX => Axis::X,
            Self::NY | Self::PY => Axis::Y,
            Self::NZ | Self::PZ => Axis::Z,
        }
    }

    /// Returns whether this face is a “positive” face: one whose unit vector's nonzero
    /// coordinate is positive.
    #[inline]
    pub const fn is_positive(self) -> bool {
        matches!(self, Self::PX | Self::PY | Self::PZ)
    }

    /// Returns the sign of the nonzero coordinate of this face's normal vector.
    #[inline]
    pub const fn signum(self) -> GridCoordinate {
        if self.is_positive() { 1 } else { -1 }
    }

    /// Returns the opposite face (maps [`PX`](Self::PX) to [`NX`](Self::NX) and so on).
    #[inline]
    #[must_use]
    pub const fn opposite(self) -> Face6 {
        match self {
            Face6::NX => Face6::PX,
            Face6::NY => Face6::PY,
            Face6::NZ => Face6::PZ,
            Face6::PX => Face6::NX,
            Face6::PY => Face6::NY,
            Face6::PZ => Face6::NZ,
        }
    }

    /// Returns whether `self` and `other` lie on the same axis (are equal or opposite).
    #[inline]
    pub const fn is_parallel(self, other: Face6) -> bool {
        self.axis() as u8 == other.axis() as u8
    }

    /// Returns the unit normal vector as a plain array.
    #[inline]
    pub const fn normal_array(self) -> [GridCoordinate; 3] {
        let mut v = [0; 3];
        v[self.axis() as usize] = self.signum();
        v
    }

    /// Returns the unit normal vector of this face.
    #[inline]
    pub fn normal_vector(self) -> GridVector {
        GridVector::from(self.normal_array())
    }

    /// Inverse of [`Face6::normal_array()`]; returns [`None`] if `normal` is not an
    /// axis-aligned unit vector.
    #[inline]
    pub const fn from_normal(normal: [GridCoordinate; 3]) -> Option<Self> {
        match normal {
            [-1, 0, 0] => Some(Self::NX),
            [0, -1, 0] => Some(Self::NY),
            [0, 0, -1] => Some(Self::NZ),
            [1, 0, 0] => Some(Self::PX),
            [0, 1, 0] => Some(Self::PY),
            [0, 0, 1] => Some(Self::PZ),
            _ => None,
        }
    }

    /// Returns the cross product of the normals of `self` and `other`, or [`None`] if
    /// they are parallel (and the product is therefore zero).
    #[inline]
    pub const fn cross(self, other: Self) -> Option<Self> {
        let a = self.normal_array();
        let b = other.normal_array();
        Self::from_normal([
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ])
    }
}

impl ops::Neg for Face6 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self::Output {
        self.opposite()
    }
}
