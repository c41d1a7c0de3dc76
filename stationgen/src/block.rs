//! Block definitions and their classification into categories.

use std::collections::BTreeMap;
use std::sync::{Mutex, OnceLock, PoisonError};

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

/// The structural role of a block, as declared by its definition.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum BlockKind {
    /// Plain structural material.
    #[default]
    Armor,
    /// Transparent structural material.
    Window,
    /// Item transport between inventories.
    Conveyor,
    /// Item storage.
    Container,
    /// Gas storage.
    Tank,
    /// Power generation.
    Reactor,
    /// Power storage.
    Battery,
    /// Turns raw resources into refined ones.
    Refinery,
    /// Builds components.
    Assembler,
    /// Converts one resource into another, e.g. ice into oxygen.
    Generator,
    /// Crew quarters.
    Bed,
    /// Passage between rooms.
    Door,
    /// Illumination.
    Light,
    /// Defensive weaponry.
    Turret,
    /// Docking port for ships.
    Connector,
    /// Medical facilities.
    Medical,
    /// Decoration and furniture.
    Interior,
}

/// Gas storage capacity of a block.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[non_exhaustive]
pub struct GasStorage {
    /// Which gas is stored.
    pub gas: String,
    /// How much of it, in units.
    pub capacity: f64,
}

impl GasStorage {
    /// Constructs a [`GasStorage`].
    pub fn new(gas: impl Into<String>, capacity: f64) -> Self {
        Self {
            gas: gas.into(),
            capacity,
        }
    }
}

/// Statistics of one kind of block, as used to build [`Ledger`](crate::Ledger)s.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
#[non_exhaustive]
pub struct BlockDefinition {
    /// Structural role.
    pub kind: BlockKind,
    /// Components needed to build the block.
    pub components: BTreeMap<String, u32>,
    /// Group that power consumption is accounted under. [`None`] means `"default"`.
    pub power_group: Option<String>,
    /// Power drawn per second. Negative values are production.
    pub power_consumption: f64,
    /// Power storage capacity.
    pub power_storage: f64,
    /// Gas storage, if any.
    pub gas_storage: Option<GasStorage>,
    /// Resource production per second, by resource. Negative values are consumption.
    pub production: BTreeMap<String, f64>,
    /// Item inventory volume.
    pub inventory_volume: f64,
    /// Number of crew this block houses.
    pub crew: u32,
}

impl BlockDefinition {
    /// Returns a definition with the given kind and no other statistics.
    pub fn of_kind(kind: BlockKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Sets [`Self::components`] entry `component` to `count`.
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>, count: u32) -> Self {
        self.components.insert(component.into(), count);
        self
    }

    /// Sets [`Self::power_consumption`] and [`Self::power_group`].
    #[must_use]
    pub fn with_power(mut self, group: impl Into<String>, consumption: f64) -> Self {
        self.power_group = Some(group.into());
        self.power_consumption = consumption;
        self
    }

    /// Sets [`Self::power_storage`].
    #[must_use]
    pub fn with_power_storage(mut self, capacity: f64) -> Self {
        self.power_storage = capacity;
        self
    }

    /// Sets [`Self::gas_storage`].
    #[must_use]
    pub fn with_gas_storage(mut self, gas: impl Into<String>, capacity: f64) -> Self {
        self.gas_storage = Some(GasStorage::new(gas, capacity));
        self
    }

    /// Sets [`Self::production`] entry `resource` to `rate`.
    #[must_use]
    pub fn with_production(mut self, resource: impl Into<String>, rate: f64) -> Self {
        self.production.insert(resource.into(), rate);
        self
    }

    /// Sets [`Self::inventory_volume`].
    #[must_use]
    pub fn with_inventory(mut self, volume: f64) -> Self {
        self.inventory_volume = volume;
        self
    }

    /// Sets [`Self::crew`].
    #[must_use]
    pub fn with_crew(mut self, crew: u32) -> Self {
        self.crew = crew;
        self
    }

    /// Name of the group [`Self::power_consumption`] is accounted under.
    pub fn power_group(&self) -> &str {
        self.power_group.as_deref().unwrap_or("default")
    }
}

/// Categories that target profiles count blocks by.
///
/// A block may belong to any number of categories; see [`BlockCategory::matches()`].
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[non_exhaustive]
pub enum BlockCategory {
    /// Armor and windows.
    Structural,
    /// Conveyors.
    Conveyor,
    /// Anything with item inventory, except conveyors.
    Storage,
    /// Anything storing gas.
    GasStorage,
    /// Net power producers.
    PowerProducer,
    /// Anything storing power.
    PowerStorage,
    /// Net producers of some resource.
    Production,
    /// Crew housing.
    Habitat,
    /// Ship docking ports.
    Docking,
    /// Turrets.
    Defense,
    /// Doors.
    Door,
    /// Lights.
    Light,
    /// Medical facilities.
    Medical,
}

impl BlockCategory {
    /// Returns whether a block with the given definition belongs to this category.
    pub fn matches(self, def: &BlockDefinition) -> bool {
        use BlockCategory as C;
        match self {
            C::Structural => matches!(def.kind, BlockKind::Armor | BlockKind::Window),
            C::Conveyor => def.kind == BlockKind::Conveyor,
            C::Storage => def.inventory_volume > 0.0 && def.kind != BlockKind::Conveyor,
            C::GasStorage => def.gas_storage.as_ref().is_some_and(|g| g.capacity > 0.0),
            C::PowerProducer => def.power_consumption < 0.0,
            C::PowerStorage => def.power_storage > 0.0,
            C::Production => def.production.values().any(|&rate| rate > 0.0),
            C::Habitat => def.crew > 0,
            C::Docking => def.kind == BlockKind::Connector,
            C::Defense => def.kind == BlockKind::Turret,
            C::Door => def.kind == BlockKind::Door,
            C::Light => def.kind == BlockKind::Light,
            C::Medical => def.kind == BlockKind::Medical,
        }
    }

    /// Returns all categories `def` belongs to, in declaration order.
    pub fn classify(def: &BlockDefinition) -> impl Iterator<Item = BlockCategory> + '_ {
        <Self as strum::IntoEnumIterator>::iter().filter(move |category| category.matches(def))
    }
}

/// Raw resources needed to make one unit of a component.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ComponentRecipe(pub BTreeMap<String, f64>);

/// The set of known blocks and components.
///
/// Lookups of unknown block ids are not errors; they are reported by
/// [`BlockRegistry::report_unknown()`] once per id.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BlockRegistry {
    blocks: BTreeMap<String, BlockDefinition>,
    #[serde(default)]
    components: BTreeMap<String, ComponentRecipe>,

    #[serde(skip)]
    reported_unknown: Mutex<HashSet<String>>,
    #[serde(skip)]
    fingerprint: OnceLock<blake3::Hash>,
}

impl BlockRegistry {
    /// Constructs an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a block definition.
    pub fn insert_block(&mut self, id: impl Into<String>, definition: BlockDefinition) {
        self.blocks.insert(id.into(), definition);
        self.fingerprint = OnceLock::new();
    }

    /// Adds or replaces a component recipe.
    pub fn insert_component(&mut self, id: impl Into<String>, recipe: ComponentRecipe) {
        self.components.insert(id.into(), recipe);
        self.fingerprint = OnceLock::new();
    }

    /// Returns the definition of the given block, if known.
    pub fn get(&self, id: &str) -> Option<&BlockDefinition> {
        self.blocks.get(id)
    }

    /// Returns the recipe of the given component, if known.
    pub fn component(&self, id: &str) -> Option<&ComponentRecipe> {
        self.components.get(id)
    }

    /// Number of known blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether no blocks are known.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Logs that `id` could not be resolved, unless that has already been logged.
    pub fn report_unknown(&self, id: &str, context: &str) {
        let mut reported = self
            .reported_unknown
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !reported.contains(id) {
            log::warn!("unknown block {id:?} in {context}; skipping it");
            reported.insert(id.to_owned());
        }
    }

    /// Content hash of all definitions, so derived data can notice when they change.
    pub fn fingerprint(&self) -> blake3::Hash {
        *self.fingerprint.get_or_init(|| {
            let mut hasher = blake3::Hasher::new();
            // BTreeMap serialization is ordered, so this is canonical.
            match serde_json::to_vec(&(&self.blocks, &self.components)) {
                Ok(bytes) => {
                    hasher.update(&bytes);
                }
                Err(e) => log::warn!("failed to serialize block registry for hashing: {e}"),
            }
            hasher.finalize()
        })
    }
}
