//! Block and component definitions used by the demo parts.

use std::collections::BTreeMap;
use std::fmt;

use exhaust::Exhaust;

use stationgen::{BlockDefinition, BlockKind, BlockRegistry, ComponentRecipe};

/// Blocks the demo parts are built from. The block id is the kebab-case variant name.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, strum::IntoStaticStr, Exhaust)]
#[strum(serialize_all = "kebab-case")]
#[non_exhaustive]
#[allow(missing_docs)]
pub enum DemoBlocks {
    Armor,
    HeavyArmor,
    Window,
    Light,
    Door,
    Bunk,
    Locker,
    MedBay,
    Reactor,
    Battery,
    Container,
    OxygenTank,
    HydrogenTank,
    OxygenFarm,
    IceGenerator,
    Refinery,
    Assembler,
    Conveyor,
    Connector,
    Turret,
}

impl fmt::Display for DemoBlocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(<&str>::from(self))
    }
}

impl DemoBlocks {
    /// The block id, as used in template sources.
    pub fn id(self) -> &'static str {
        self.into()
    }

    /// Statistics of this block.
    pub fn definition(self) -> BlockDefinition {
        use BlockKind as K;
        use DemoBlocks::*;
        let def = BlockDefinition::of_kind;
        match self {
            Armor => def(K::Armor).with_component("steel-plate", 25),
            HeavyArmor => def(K::Armor)
                .with_component("steel-plate", 150)
                .with_component("metal-grid", 50),
            Window => def(K::Window)
                .with_component("glass", 24)
                .with_component("metal-grid", 4),
            Light => def(K::Light)
                .with_component("construction", 2)
                .with_power("utility", 0.1),
            Door => def(K::Door)
                .with_component("interior-plate", 10)
                .with_component("motor", 2)
                .with_power("utility", 0.05),
            Bunk => def(K::Interior)
                .with_component("interior-plate", 20)
                .with_crew(2),
            Locker => def(K::Container)
                .with_component("interior-plate", 8)
                .with_inventory(1.0),
            MedBay => def(K::Medical)
                .with_component("interior-plate", 240)
                .with_component("computer", 6)
                .with_power("utility", 0.4),
            Reactor => def(K::Reactor)
                .with_component("reactor-part", 100)
                .with_component("steel-plate", 80)
                .with_power("default", -15.0),
            Battery => def(K::Battery)
                .with_component("power-cell", 80)
                .with_component("computer", 25)
                .with_power_storage(3.0),
            Container => def(K::Container)
                .with_component("steel-plate", 20)
                .with_inventory(15.6),
            OxygenTank => def(K::Tank)
                .with_component("steel-plate", 80)
                .with_power("utility", 0.01)
                .with_gas_storage("oxygen", 100_000.0),
            HydrogenTank => def(K::Tank)
                .with_component("steel-plate", 280)
                .with_power("utility", 0.01)
                .with_gas_storage("hydrogen", 5_000_000.0),
            OxygenFarm => def(K::Generator)
                .with_component("glass", 100)
                .with_component("computer", 20)
                .with_power("utility", 0.05)
                .with_production("oxygen", 1.8),
            IceGenerator => def(K::Generator)
                .with_component("motor", 4)
                .with_component("computer", 5)
                .with_power("production", 0.5)
                .with_production("ice", -8.0)
                .with_production("oxygen", 20.0)
                .with_production("hydrogen", 40.0),
            Refinery => def(K::Refinery)
                .with_component("motor", 16)
                .with_component("steel-plate", 1200)
                .with_power("production", 1.0)
                .with_production("ore", -10.0)
                .with_production("ingot", 7.0)
                .with_inventory(7.5),
            Assembler => def(K::Assembler)
                .with_component("motor", 8)
                .with_component("computer", 160)
                .with_power("production", 0.2)
                .with_inventory(4.0),
            Conveyor => def(K::Conveyor)
                .with_component("motor", 6)
                .with_inventory(0.4),
            Connector => def(K::Connector)
                .with_component("motor", 8)
                .with_component("computer", 20)
                .with_power("utility", 0.01)
                .with_inventory(1.15),
            Turret => def(K::Turret)
                .with_component("motor", 8)
                .with_component("metal-grid", 20)
                .with_power("defense", 0.002),
        }
    }
}

/// Raw materials for each component the demo blocks use.
const RECIPES: &[(&str, &[(&str, f64)])] = &[
    ("steel-plate", &[("iron", 21.0)]),
    ("construction", &[("iron", 8.0)]),
    ("interior-plate", &[("iron", 3.0)]),
    ("metal-grid", &[("iron", 12.0), ("nickel", 5.0), ("cobalt", 3.0)]),
    ("glass", &[("silicon", 1.0)]),
    ("motor", &[("iron", 20.0), ("nickel", 5.0)]),
    ("computer", &[("iron", 0.5), ("silicon", 0.2)]),
    ("power-cell", &[("iron", 10.0), ("nickel", 2.0), ("silicon", 1.0)]),
    ("reactor-part", &[("iron", 15.0), ("silver", 5.0)]),
];

/// A registry of all [`DemoBlocks`] and the components they are made of.
pub fn demo_registry() -> BlockRegistry {
    let mut registry = BlockRegistry::new();
    for block in DemoBlocks::exhaust() {
        registry.insert_block(block.id(), block.definition());
    }
    for &(component, materials) in RECIPES {
        let materials: BTreeMap<String, f64> = materials
            .iter()
            .map(|&(material, amount)| (material.to_owned(), amount))
            .collect();
        registry.insert_component(component, ComponentRecipe(materials));
    }
    registry
}
