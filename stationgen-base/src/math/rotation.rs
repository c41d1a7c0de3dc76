//! Rotations of the cube which keep it aligned with the grid.

use core::fmt;
use core::ops::Mul;

use crate::math::{Axis, Face6, GridVector};

/// Represents a proper rotation (no reflection) of a cube aligned with the grid axes.
///
/// There are exactly 24 of these, listed in [`GridRotation::ALL`]. A rotation is stored as
/// the images of the three positive axes; the image of Z is always the cross product of the
/// images of X and Y, so reflections cannot be represented.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GridRotation {
    basis: [Face6; 3],
}

impl GridRotation {
    /// The identity rotation.
    pub const IDENTITY: Self = Self {
        basis: [Face6::PX, Face6::PY, Face6::PZ],
    };

    /// All 24 rotations, in a fixed order. [`GridRotation::IDENTITY`] is not necessarily first.
    pub const ALL: [Self; 24] = {
        let mut out = [Self::IDENTITY; 24];
        let mut count = 0;
        let mut i = 0;
        while i < 6 {
            let mut j = 0;
            while j < 6 {
                if let Some(rotation) = Self::from_basis(Face6::ALL[i], Face6::ALL[j]) {
                    out[count] = rotation;
                    count += 1;
                }
                j += 1;
            }
            i += 1;
        }
        assert!(count == 24);
        out
    };

    /// Constructs the rotation which maps [`Face6::PX`] to `x` and [`Face6::PY`] to `y`.
    ///
    /// Returns [`None`] if `x` and `y` are parallel.
    #[inline]
    pub const fn from_basis(x: Face6, y: Face6) -> Option<Self> {
        match x.cross(y) {
            Some(z) => Some(Self { basis: [x, y, z] }),
            None => None,
        }
    }

    /// Returns the images of the positive X, Y, and Z directions.
    #[inline]
    pub const fn to_basis(self) -> [Face6; 3] {
        self.basis
    }

    /// A compact code which distinguishes all rotations. Stable across program runs.
    #[inline]
    pub const fn code(self) -> u8 {
        self.basis[0] as u8 * 8 + self.basis[1] as u8
    }

    /// Rotates the given face (unit vector).
    #[inline]
    pub const fn transform(self, face: Face6) -> Face6 {
        let image = self.basis[face.axis() as usize];
        if face.is_positive() {
            image
        } else {
            image.opposite()
        }
    }

    /// Rotates the given vector.
    #[inline]
    pub fn transform_vector(self, vector: GridVector) -> GridVector {
        let [x, y, z] = self.basis.map(Face6::normal_vector);
        x * vector.x + y * vector.y + z * vector.z
    }

    /// Returns the rotation which undoes this one.
    #[inline]
    #[must_use]
    pub const fn inverse(self) -> Self {
        let mut basis = [Face6::PX; 3];
        let mut i = 0;
        while i < 3 {
            let image = self.basis[i];
            let axis = Axis::ALL[i];
            basis[image.axis() as usize] = if image.is_positive() {
                axis.positive_face()
            } else {
                axis.negative_face()
            };
            i += 1;
        }
        Self { basis }
    }

    /// Returns the rotations which map `from` onto `to`. There are always exactly four.
    pub fn mapping(from: Face6, to: Face6) -> impl Iterator<Item = Self> {
        Self::ALL
            .into_iter()
            .filter(move |rotation| rotation.transform(from) == to)
    }
}

impl Default for GridRotation {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Debug for GridRotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.basis;
        write!(f, "GridRotation[{x:?}, {y:?}, {z:?}]")
    }
}

/// Composition of rotations: `(a * b).transform(f) == a.transform(b.transform(f))`.
impl Mul<Self> for GridRotation {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self::Output {
        Self {
            basis: rhs.basis.map(|face| self.transform(face)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools as _;
    use pretty_assertions::assert_eq;

    #[test]
    fn enumeration_is_distinct() {
        assert_eq!(GridRotation::ALL.iter().unique().count(), 24);
        assert_eq!(
            GridRotation::ALL.iter().map(|r| r.code()).unique().count(),
            24
        );
        assert!(GridRotation::ALL.contains(&GridRotation::IDENTITY));
    }

    #[test]
    fn identity() {
        for face in Face6::ALL {
            assert_eq!(GridRotation::IDENTITY.transform(face), face);
        }
        assert_eq!(GridRotation::IDENTITY.inverse(), GridRotation::IDENTITY);
    }

    #[test]
    fn inverse_axioms() {
        for rotation in GridRotation::ALL {
            assert_eq!(rotation * rotation.inverse(), GridRotation::IDENTITY);
            assert_eq!(rotation.inverse() * rotation, GridRotation::IDENTITY);
            for face in Face6::ALL {
                assert_eq!(rotation.inverse().transform(rotation.transform(face)), face);
            }
        }
    }

    #[test]
    fn composition_matches_sequential_application() {
        for (a, b) in GridRotation::ALL
            .into_iter()
            .cartesian_product(GridRotation::ALL)
        {
            for face in Face6::ALL {
                assert_eq!((a * b).transform(face), a.transform(b.transform(face)));
            }
        }
    }

    #[test]
    fn vector_agrees_with_face() {
        let v = GridVector::new(1, 20, 300);
        for rotation in GridRotation::ALL {
            for face in Face6::ALL {
                assert_eq!(
                    rotation.transform_vector(face.normal_vector()),
                    rotation.transform(face).normal_vector()
                );
            }
            assert_eq!(
                rotation.inverse().transform_vector(rotation.transform_vector(v)),
                v
            );
        }
    }

    #[test]
    fn four_rotations_per_mapping() {
        for from in Face6::ALL {
            for to in Face6::ALL {
                assert_eq!(GridRotation::mapping(from, to).count(), 4, "{from:?} {to:?}");
            }
        }
    }
}
