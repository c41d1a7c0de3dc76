//! The demo part templates.
//!
//! Large parts join through `"corridor"` mounts and small parts through
//! `"small-corridor"` mounts. Every mount is a single anchor in the middle of a 3×3 face,
//! one cell above the floor, biased upward so that parts never roll over.

use std::fmt;

use exhaust::Exhaust;

use stationgen::math::Face6;
use stationgen::{AnchorSource, GridScale, TemplateBuilder, TemplateSource};

use crate::DemoBlocks::{self, *};

/// Mount type joining large parts.
pub const CORRIDOR: &str = "corridor";
/// Mount type joining small parts.
pub const SMALL_CORRIDOR: &str = "small-corridor";

/// The demo part templates. The template name is the kebab-case variant name.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, strum::IntoStaticStr, Exhaust)]
#[strum(serialize_all = "kebab-case")]
#[non_exhaustive]
#[allow(missing_docs)]
pub enum DemoParts {
    Corridor,
    LongCorridor,
    Corner,
    Tee,
    Cross,
    Hub,
    Habitat,
    Quarters,
    ReactorRoom,
    Storage,
    Hydroponics,
    RefineryRoom,
    DockingBay,
    EndCap,
    SmallHub,
    SmallCorridor,
    SmallCabin,
    SmallCap,
}

impl fmt::Display for DemoParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(<&str>::from(self))
    }
}

fn port(pos: [i32; 3], direction: Face6) -> AnchorSource {
    AnchorSource::new(pos, direction).with_bias(Face6::PY)
}

/// A solid box of `material`.
fn hull(name: DemoParts, size: [i32; 3], material: DemoBlocks) -> TemplateBuilder {
    TemplateBuilder::new(name.name()).fill([0, 0, 0], size, material.id())
}

trait BuilderExt: Sized {
    fn put(self, pos: [i32; 3], block: DemoBlocks) -> Self;
    fn put_all(self, cells: impl IntoIterator<Item = [i32; 3]>, block: DemoBlocks) -> Self;
    fn door(self, kind: &str, name: &str, pos: [i32; 3], direction: Face6) -> Self;
}

impl BuilderExt for TemplateBuilder {
    fn put(self, pos: [i32; 3], block: DemoBlocks) -> Self {
        self.replace(pos, block.id())
    }

    fn put_all(self, cells: impl IntoIterator<Item = [i32; 3]>, block: DemoBlocks) -> Self {
        cells.into_iter().fold(self, |b, pos| b.put(pos, block))
    }

    /// A door block which is also the mount's anchor.
    fn door(self, kind: &str, name: &str, pos: [i32; 3], direction: Face6) -> Self {
        self.put(pos, Door).mount_with(kind, name, [port(pos, direction)])
    }
}

impl DemoParts {
    /// The template name.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Authoring data of this part.
    pub fn source(self) -> TemplateSource {
        use DemoParts as P;
        let c = CORRIDOR;
        let builder = match self {
            P::Corridor => hull(self, [3, 3, 5], Armor)
                .put([1, 2, 2], Light)
                .mount_with(c, "a", [port([1, 1, 0], Face6::NZ)])
                .mount_with(c, "b", [port([1, 1, 4], Face6::PZ)]),
            P::LongCorridor => hull(self, [3, 3, 9], Armor)
                .put_all((2..7).flat_map(|z| [[0, 1, z], [2, 1, z]]), Window)
                .put_all([[1, 2, 2], [1, 2, 6]], Light)
                .mount_with(c, "a", [port([1, 1, 0], Face6::NZ)])
                .mount_with(c, "b", [port([1, 1, 8], Face6::PZ)]),
            P::Corner => hull(self, [3, 3, 3], Armor)
                .put([1, 2, 1], Light)
                .mount_with(c, "a", [port([1, 1, 0], Face6::NZ)])
                .mount_with(c, "b", [port([2, 1, 1], Face6::PX)]),
            P::Tee => hull(self, [5, 3, 3], Armor)
                .put([2, 2, 1], Light)
                .mount_with(c, "a", [port([2, 1, 0], Face6::NZ)])
                .mount_with(c, "b", [port([4, 1, 1], Face6::PX)])
                .mount_with(c, "c", [port([0, 1, 1], Face6::NX)]),
            P::Cross => hull(self, [5, 3, 5], Armor)
                .put([2, 2, 2], Light)
                .mount_with(c, "n", [port([2, 1, 4], Face6::PZ)])
                .mount_with(c, "s", [port([2, 1, 0], Face6::NZ)])
                .mount_with(c, "e", [port([4, 1, 2], Face6::PX)])
                .mount_with(c, "w", [port([0, 1, 2], Face6::NX)]),
            P::Hub => hull(self, [7, 4, 7], Armor)
                .put([3, 1, 3], MedBay)
                .put_all([[1, 3, 1], [5, 3, 1], [1, 3, 5], [5, 3, 5]], Light)
                .door(c, "n", [3, 1, 6], Face6::PZ)
                .door(c, "s", [3, 1, 0], Face6::NZ)
                .door(c, "e", [6, 1, 3], Face6::PX)
                .door(c, "w", [0, 1, 3], Face6::NX)
                // Antenna clearance; other parts may share it.
                .reserve([2, 4, 2], [5, 7, 5], true, true)
                .tag("start"),
            P::Habitat => hull(self, [7, 4, 7], Armor)
                .put_all(
                    [1, 5]
                        .into_iter()
                        .flat_map(|x| [1, 3, 5].map(|z| [x, 1, z])),
                    Bunk,
                )
                .put_all([[2, 1, 1], [4, 1, 1], [2, 1, 5], [4, 1, 5]], Locker)
                .put([3, 3, 3], Light)
                .door(c, "a", [3, 1, 0], Face6::NZ)
                .door(c, "b", [3, 1, 6], Face6::PZ),
            P::Quarters => hull(self, [5, 3, 5], Armor)
                .put_all([[1, 1, 2], [3, 1, 2]], Bunk)
                .put([2, 1, 3], Locker)
                .put([2, 2, 2], Light)
                .door(c, "door", [2, 1, 0], Face6::NZ),
            P::ReactorRoom => hull(self, [5, 5, 5], HeavyArmor)
                .put([2, 2, 2], Reactor)
                .put_all([[1, 1, 2], [3, 1, 2], [1, 1, 3], [3, 1, 3]], Battery)
                .put([2, 3, 1], Light)
                .door(c, "door", [2, 1, 0], Face6::NZ),
            P::Storage => hull(self, [5, 4, 5], Armor)
                .put_all(
                    [1, 3]
                        .into_iter()
                        .flat_map(|x| [1, 3].map(|z| [x, 1, z])),
                    Container,
                )
                .put_all([[2, 1, 1], [2, 1, 2], [2, 1, 3]], Conveyor)
                .put([1, 2, 2], OxygenTank)
                .put([3, 2, 2], HydrogenTank)
                .put([2, 2, 2], IceGenerator)
                .door(c, "door", [2, 1, 0], Face6::NZ),
            P::Hydroponics => hull(self, [5, 4, 9], Armor)
                .put_all((1..8).flat_map(|z| [1, 2, 3].map(|x| [x, 3, z])), Window)
                .put_all(
                    (1..8).step_by(2).flat_map(|z| [[1, 1, z], [3, 1, z]]),
                    OxygenFarm,
                )
                .door(c, "a", [2, 1, 0], Face6::NZ)
                .door(c, "b", [2, 1, 8], Face6::PZ),
            P::RefineryRoom => hull(self, [7, 5, 7], HeavyArmor)
                .put_all([[2, 1, 2], [4, 1, 2], [2, 1, 4], [4, 1, 4]], Refinery)
                .put([3, 1, 5], Assembler)
                .put_all([[3, 1, 1], [3, 1, 2], [3, 1, 3], [3, 1, 4]], Conveyor)
                .put([3, 3, 3], Light)
                .door(c, "door", [3, 1, 0], Face6::NZ),
            P::DockingBay => hull(self, [5, 3, 5], Armor)
                .put([2, 1, 4], Connector)
                .put([2, 2, 2], Light)
                .block([2, 3, 2], Turret.id())
                .door(c, "door", [2, 1, 0], Face6::NZ)
                // Approach path for ships.
                .reserve([0, 0, 5], [5, 5, 12], false, false),
            P::EndCap => hull(self, [3, 3, 1], Armor)
                .put([1, 1, 0], Window)
                .mount_with(c, "a", [port([1, 1, 0], Face6::NZ)]),
            P::SmallHub => hull(self, [3, 3, 3], Armor)
                .scale(GridScale::Small)
                .put([1, 2, 1], Light)
                .mount_with(SMALL_CORRIDOR, "n", [port([1, 1, 2], Face6::PZ)])
                .mount_with(SMALL_CORRIDOR, "s", [port([1, 1, 0], Face6::NZ)])
                .mount_with(SMALL_CORRIDOR, "e", [port([2, 1, 1], Face6::PX)])
                .mount_with(SMALL_CORRIDOR, "w", [port([0, 1, 1], Face6::NX)])
                .tag("start"),
            P::SmallCorridor => hull(self, [3, 3, 4], Armor)
                .scale(GridScale::Small)
                .mount_with(SMALL_CORRIDOR, "a", [port([1, 1, 0], Face6::NZ)])
                .mount_with(SMALL_CORRIDOR, "b", [port([1, 1, 3], Face6::PZ)]),
            P::SmallCabin => hull(self, [3, 3, 3], Armor)
                .scale(GridScale::Small)
                .put([1, 1, 1], Bunk)
                .door(SMALL_CORRIDOR, "door", [1, 1, 0], Face6::NZ),
            P::SmallCap => hull(self, [3, 3, 1], Armor)
                .scale(GridScale::Small)
                .mount_with(SMALL_CORRIDOR, "a", [port([1, 1, 0], Face6::NZ)]),
        };
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{demo_catalog, demo_registry};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use stationgen::{BlockCategory, EngineCaches, PartTemplate};

    #[test]
    fn every_part_is_valid() {
        let registry = Arc::new(demo_registry());
        for part in DemoParts::exhaust() {
            let template = PartTemplate::new(part.source(), registry.clone())
                .unwrap_or_else(|e| panic!("{part}: {e}"));
            assert_eq!(template.name(), part.name());
            assert!(!template.mounts().is_empty(), "{part}");
            // Every block resolved.
            assert_eq!(
                template.ledger().total_blocks(),
                template.block_count() as i64,
                "{part}"
            );
        }
    }

    #[test]
    fn ledgers_reflect_purpose() {
        let registry = Arc::new(demo_registry());
        let ledger = |part: DemoParts| {
            PartTemplate::new(part.source(), registry.clone())
                .unwrap()
                .ledger()
                .clone()
        };
        assert_eq!(ledger(DemoParts::Habitat).crew(), 12);
        assert_eq!(ledger(DemoParts::Quarters).crew(), 4);
        assert_eq!(ledger(DemoParts::ReactorRoom).category_count(BlockCategory::PowerProducer), 1);
        assert_eq!(ledger(DemoParts::DockingBay).category_count(BlockCategory::Docking), 1);
        assert!(ledger(DemoParts::Hydroponics).production("oxygen").to_f64() > 0.0);
        assert!(ledger(DemoParts::Storage).gas_storage("hydrogen").to_f64() > 0.0);
    }

    #[test]
    fn every_mount_can_be_closed() {
        let catalog = demo_catalog().unwrap();
        let caches = EngineCaches::default();
        for template in catalog.templates() {
            for mount in template.mounts() {
                let terminator = catalog.smallest_terminator(mount, &caches);
                let expected = match template.scale() {
                    GridScale::Small => DemoParts::SmallCap.name(),
                    _ => DemoParts::EndCap.name(),
                };
                assert_eq!(
                    terminator.as_ref().map(|t| t.name()),
                    Some(expected),
                    "{name} {mount:?}",
                    name = template.name()
                );
            }
        }
    }

    #[test]
    fn biased_ports_dock_one_way() {
        let catalog = demo_catalog().unwrap();
        let caches = EngineCaches::default();
        let corridor = catalog.get(DemoParts::Corridor.name()).unwrap();
        let cap = catalog.get(DemoParts::EndCap.name()).unwrap();
        for mount in corridor.mounts() {
            assert_eq!(caches.mount_transforms(mount, &cap.mounts()[0]).len(), 1);
        }
    }
}
