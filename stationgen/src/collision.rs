//! Intersection tests between placed templates.
//!
//! A test first compares bounding boxes, which often settles the question. If it does
//! not, either the answer is assumed to be “collides” ([`CollisionMode::quick`]) or the
//! occupied cells are compared one by one and the result is memoized in
//! [`EngineCaches`].

use crate::caches::EngineCaches;
use crate::math::{GridAab, Gridgid};
use crate::template::{PartTemplate, ReservedSpace, TemplateId};

/// How thorough an intersection test is.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct CollisionMode {
    /// Whether optional reserved volumes count.
    pub test_optional: bool,
    /// Whether to report a collision whenever bounding boxes are inconclusive, instead
    /// of testing individual cells.
    pub quick: bool,
}

impl CollisionMode {
    /// Exact test including optional reserved volumes.
    pub const STRICT: Self = Self {
        test_optional: true,
        quick: false,
    };

    /// Position of this mode's 2 flag bits within a byte.
    pub(crate) const fn flag_shift(self) -> u8 {
        (self.quick as u8 * 2 + self.test_optional as u8) * 2
    }
}

/// Key of the exact-collision cache.
///
/// The test is symmetric, so pairs are stored in a canonical order: the smaller template
/// id first, and `relative` maps the second template's frame into the first's.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct CollisionKey {
    first: TemplateId,
    second: TemplateId,
    relative: Gridgid,
    test_optional: bool,
}

impl CollisionKey {
    /// Returns the key and whether `b` is the first operand.
    fn new(
        a: &PartTemplate,
        ta: Gridgid,
        b: &PartTemplate,
        tb: Gridgid,
        test_optional: bool,
    ) -> (Self, bool) {
        let relative = ta.inverse() * tb;
        let (first, second, relative, swapped) = match a.id().cmp(&b.id()) {
            std::cmp::Ordering::Less => (a.id(), b.id(), relative, false),
            std::cmp::Ordering::Greater => (b.id(), a.id(), relative.inverse(), true),
            std::cmp::Ordering::Equal => {
                let inverse = relative.inverse();
                (a.id(), b.id(), relative.min(inverse), inverse < relative)
            }
        };
        (
            Self {
                first,
                second,
                relative,
                test_optional,
            },
            swapped,
        )
    }
}

fn honored(template: &PartTemplate, test_optional: bool) -> impl Iterator<Item = &ReservedSpace> {
    template
        .reserved()
        .iter()
        .filter(move |r| test_optional || !r.optional)
}

fn overlaps(a: Option<GridAab>, b: Option<GridAab>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a.intersects(b))
}

/// Bounding-box tier. Returns [`None`] if the boxes do not settle the question.
pub(crate) fn cheap_test(
    a: &PartTemplate,
    ta: Gridgid,
    b: &PartTemplate,
    tb: Gridgid,
    test_optional: bool,
) -> Option<bool> {
    let a_reserved = a.reserved_box().map(|r| r.transform(ta));
    let b_reserved = b.reserved_box().map(|r| r.transform(tb));

    if overlaps(a_reserved, b_reserved) {
        for ra in honored(a, test_optional).filter(|r| !r.shared) {
            let ra_world = ra.bounds.transform(ta);
            if honored(b, test_optional)
                .filter(|r| !r.shared)
                .any(|rb| rb.bounds.transform(tb).intersects(ra_world))
            {
                return Some(true);
            }
        }
    }

    let a_blocks = a.block_box().transform(ta);
    let b_blocks = b.block_box().transform(tb);
    if !a_blocks.intersects(b_blocks)
        && !overlaps(a_reserved, Some(b_blocks))
        && !overlaps(b_reserved, Some(a_blocks))
    {
        return Some(false);
    }
    None
}

/// Whether any cell of `other`, placed in `template`'s frame by `relative`, lies in `region`
/// (given in `template`'s frame).
fn cells_in_region(region: GridAab, other: &PartTemplate, relative: Gridgid) -> bool {
    let local_region = region.transform(relative.inverse());
    let Some(candidates) = local_region.intersection_cubes(other.block_box()) else {
        return false;
    };
    if candidates.volume() < other.block_count() as u64 {
        candidates.interior_iter().any(|cell| other.contains_cell(cell))
    } else {
        other
            .cells()
            .any(|cell| region.contains_cube(relative.transform_cube(cell)))
    }
}

/// Per-cell tier, in `first`'s frame; `relative` places `second` into it.
fn exact_local(first: &PartTemplate, second: &PartTemplate, relative: Gridgid, test_optional: bool) -> bool {
    let second_box = second.block_box().transform(relative);
    if first.block_box().intersects(second_box) {
        let overlap = first.block_box().intersection_cubes(second_box);
        let hit = if second.block_count() <= first.block_count() {
            second.cells().any(|cell| {
                let placed = relative.transform_cube(cell);
                overlap.is_some_and(|o| o.contains_cube(placed)) && first.contains_cell(placed)
            })
        } else {
            let inverse = relative.inverse();
            first.cells().any(|cell| {
                overlap.is_some_and(|o| o.contains_cube(cell))
                    && second.contains_cell(inverse.transform_cube(cell))
            })
        };
        if hit {
            return true;
        }
    }

    honored(first, test_optional).any(|r| cells_in_region(r.bounds, second, relative))
        || honored(second, test_optional)
            .any(|r| cells_in_region(r.bounds, first, relative.inverse()))
}

/// Tests whether two placed templates intersect, comparing individual cells when bounding
/// boxes are inconclusive. Never consults or fills a cache.
///
/// Occupied cells collide with occupied cells and with honored reserved volumes; reserved
/// volumes collide with each other unless either is shared.
pub fn exact_intersects(
    a: &PartTemplate,
    ta: Gridgid,
    b: &PartTemplate,
    tb: Gridgid,
    test_optional: bool,
) -> bool {
    cheap_test(a, ta, b, tb, test_optional)
        .unwrap_or_else(|| exact_local(a, b, ta.inverse() * tb, test_optional))
}

impl EngineCaches {
    /// Tests whether two placed templates intersect.
    ///
    /// The result is symmetric in the two operands. In quick mode, inconclusive bounding
    /// boxes count as a collision; otherwise the per-cell result is memoized.
    pub fn intersects(
        &self,
        a: &PartTemplate,
        ta: Gridgid,
        b: &PartTemplate,
        tb: Gridgid,
        mode: CollisionMode,
    ) -> bool {
        if let Some(settled) = cheap_test(a, ta, b, tb, mode.test_optional) {
            return settled;
        }
        if mode.quick {
            return true;
        }
        let (key, swapped) = CollisionKey::new(a, ta, b, tb, mode.test_optional);
        let (first, second) = if swapped { (b, a) } else { (a, b) };
        self.template_collisions.get_or_insert_with(key, || {
            exact_local(first, second, key.relative, mode.test_optional)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockDefinition, BlockRegistry};
    use crate::caches::CacheConfig;
    use crate::math::{Face6, GridRotation, GridVector};
    use crate::template::TemplateBuilder;
    use rand::{Rng as _, SeedableRng as _};
    use rand_xoshiro::Xoshiro256PlusPlus;
    use rstest::rstest;
    use std::sync::Arc;

    fn registry() -> Arc<BlockRegistry> {
        let mut registry = BlockRegistry::new();
        registry.insert_block("hull", BlockDefinition::default());
        Arc::new(registry)
    }

    /// An L shape whose bounding box is mostly empty.
    fn ell() -> PartTemplate {
        PartTemplate::new(
            TemplateBuilder::new("ell")
                .fill([0, 0, 0], [4, 1, 1], "hull")
                .fill([0, 1, 0], [1, 4, 1], "hull")
                .build(),
            registry(),
        )
        .unwrap()
    }

    fn cube() -> PartTemplate {
        PartTemplate::new(
            TemplateBuilder::new("cube").block([0, 0, 0], "hull").build(),
            registry(),
        )
        .unwrap()
    }

    fn reserving(name: &str, shared: bool, optional: bool) -> PartTemplate {
        PartTemplate::new(
            TemplateBuilder::new(name)
                .block([0, 0, 0], "hull")
                .reserve([1, 0, 0], [3, 1, 1], shared, optional)
                .build(),
            registry(),
        )
        .unwrap()
    }

    fn at(x: i32, y: i32, z: i32) -> Gridgid {
        Gridgid::from_translation([x, y, z])
    }

    #[rstest]
    #[case::far_apart(at(10, 0, 0), Some(false))]
    #[case::overlapping_boxes(at(2, 2, 0), None)]
    fn cheap_tier(#[case] placement: Gridgid, #[case] expected: Option<bool>) {
        assert_eq!(
            cheap_test(&ell(), Gridgid::IDENTITY, &cube(), placement, true),
            expected
        );
    }

    #[rstest]
    #[case::in_the_hollow(at(2, 2, 0), false)]
    #[case::on_a_cell(at(3, 0, 0), true)]
    #[case::adjacent(at(4, 0, 0), false)]
    fn exact_tier(#[case] placement: Gridgid, #[case] expected: bool) {
        let caches = EngineCaches::default();
        assert_eq!(
            caches.intersects(&ell(), Gridgid::IDENTITY, &cube(), placement, CollisionMode::STRICT),
            expected
        );
    }

    #[test]
    fn quick_mode_is_conservative() {
        let caches = EngineCaches::default();
        let quick = CollisionMode {
            test_optional: true,
            quick: true,
        };
        assert!(caches.intersects(&ell(), Gridgid::IDENTITY, &cube(), at(2, 2, 0), quick));
        assert!(!caches.intersects(&ell(), Gridgid::IDENTITY, &cube(), at(9, 9, 9), quick));
        assert_eq!(caches.collision_stats().len, 0);
    }

    #[test]
    fn reserved_volumes() {
        let caches = EngineCaches::default();
        let plain = reserving("plain", false, false);
        let shared = reserving("shared", true, false);
        let optional = reserving("optional", false, true);
        // Reserved volumes overlap, blocks far apart.
        let facing = Gridgid {
            rotation: GridRotation::from_basis(Face6::NX, Face6::PY).unwrap(),
            translation: GridVector::new(4, 0, 1),
        };
        let strict = CollisionMode::STRICT;
        let lenient = CollisionMode {
            test_optional: false,
            quick: false,
        };
        assert!(caches.intersects(&plain, Gridgid::IDENTITY, &plain, facing, strict));
        assert!(!caches.intersects(&plain, Gridgid::IDENTITY, &shared, facing, strict));
        assert!(caches.intersects(&plain, Gridgid::IDENTITY, &optional, facing, strict));
        assert!(!caches.intersects(&plain, Gridgid::IDENTITY, &optional, facing, lenient));

        // A block inside a reserved volume collides, even a shared one.
        assert!(caches.intersects(&shared, Gridgid::IDENTITY, &cube(), at(2, 0, 0), strict));
        assert!(caches.intersects(&cube(), at(2, 0, 0), &shared, Gridgid::IDENTITY, strict));
        assert!(!caches.intersects(&optional, Gridgid::IDENTITY, &cube(), at(2, 0, 0), lenient));
    }

    fn random_transform(rng: &mut Xoshiro256PlusPlus) -> Gridgid {
        Gridgid {
            rotation: GridRotation::ALL[rng.random_range(0..24)],
            translation: GridVector::new(
                rng.random_range(-4..=4),
                rng.random_range(-4..=4),
                rng.random_range(-4..=4),
            ),
        }
    }

    #[test]
    fn symmetric_and_consistent_with_uncached() {
        let templates = [ell(), cube(), reserving("r", false, true), reserving("s", true, false)];
        let caches = EngineCaches::default();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0xc0111de);
        for _ in 0..2000 {
            let a = &templates[rng.random_range(0..templates.len())];
            let b = &templates[rng.random_range(0..templates.len())];
            let ta = random_transform(&mut rng);
            let tb = random_transform(&mut rng);
            let mode = CollisionMode {
                test_optional: rng.random_bool(0.5),
                quick: false,
            };
            let expected = exact_intersects(a, ta, b, tb, mode.test_optional);
            assert_eq!(
                exact_intersects(b, tb, a, ta, mode.test_optional),
                expected,
                "{a:?} {ta:?} {b:?} {tb:?}"
            );
            assert_eq!(caches.intersects(a, ta, b, tb, mode), expected);
            assert_eq!(caches.intersects(b, tb, a, ta, mode), expected);
        }
        assert!(caches.collision_stats().hits > 0);
    }

    #[test]
    fn cached_result_survives_unrelated_insertions() {
        let caches = EngineCaches::new(&CacheConfig {
            template_collisions: 8,
            ..CacheConfig::default()
        });
        let (a, b) = (ell(), cube());
        let first = caches.intersects(&a, Gridgid::IDENTITY, &b, at(3, 0, 0), CollisionMode::STRICT);
        for x in -3..3 {
            for y in 0..3 {
                caches.intersects(&a, at(x, y, 0), &b, at(2, 2, 0), CollisionMode::STRICT);
            }
        }
        assert!(first);
        assert_eq!(
            caches.intersects(&a, Gridgid::IDENTITY, &b, at(3, 0, 0), CollisionMode::STRICT),
            first
        );
        assert!(caches.collision_stats().len <= 8);
    }
}
