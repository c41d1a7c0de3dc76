//! Additive bookkeeping of block statistics.

use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::block::{BlockCategory, BlockDefinition, BlockRegistry};

/// A fixed-point quantity with three decimal places.
///
/// Ledgers are summed and un-summed many times during generation; integer arithmetic
/// keeps `a + b - b == a` exact. Arithmetic saturates at the bounds of `i64`.
#[derive(
    Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize,
)]
#[serde(transparent)]
pub struct Quantity(i64);

impl Quantity {
    /// Zero.
    pub const ZERO: Self = Self(0);

    const SCALE: f64 = 1000.0;

    /// Converts from a floating-point value, rounding to the nearest thousandth.
    pub fn from_f64(value: f64) -> Self {
        Self((value * Self::SCALE).round() as i64)
    }

    /// Converts to a floating-point value.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE
    }

    /// Returns the raw fixed-point representation.
    pub const fn to_thousandths(self) -> i64 {
        self.0
    }

    fn scaled(self, count: i64) -> Self {
        Self(self.0.saturating_mul(count))
    }
}

impl fmt::Debug for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:03}", abs / 1000, abs % 1000)
    }
}

impl ops::Add for Quantity {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}
impl ops::Sub for Quantity {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}
impl ops::Neg for Quantity {
    type Output = Self;
    fn neg(self) -> Self {
        Self(self.0.saturating_neg())
    }
}
impl ops::AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}
impl ops::SubAssign for Quantity {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}
impl Sum for Quantity {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |a, b| a + b)
    }
}

/// Values that can be accumulated in a [`Ledger`] map.
trait Amount: Copy + Default + Eq {
    fn plus(self, other: Self) -> Self;
    fn minus(self, other: Self) -> Self;
}
impl Amount for i64 {
    fn plus(self, other: Self) -> Self {
        self.saturating_add(other)
    }
    fn minus(self, other: Self) -> Self {
        self.saturating_sub(other)
    }
}
impl Amount for Quantity {
    fn plus(self, other: Self) -> Self {
        self + other
    }
    fn minus(self, other: Self) -> Self {
        self - other
    }
}

fn merge<K: Ord + Clone, V: Amount>(into: &mut BTreeMap<K, V>, from: &BTreeMap<K, V>, add: bool) {
    for (key, &value) in from {
        let entry = into.entry(key.clone()).or_default();
        *entry = if add {
            entry.plus(value)
        } else {
            entry.minus(value)
        };
        if *entry == V::default() {
            into.remove(key);
        }
    }
}

fn bump<K: Ord, V: Amount>(map: &mut BTreeMap<K, V>, key: K, value: V) {
    if value == V::default() {
        return;
    }
    let entry = map.entry(key).or_default();
    *entry = entry.plus(value);
}

/// Aggregate statistics of a set of blocks: counts, costs, power, storage and production.
///
/// A part template has the ledger of its blocks; a [`Construction`](crate::Construction)
/// has the sum of its rooms' ledgers. Entries which are zero are not stored, so two
/// ledgers describing the same totals compare equal regardless of how they were built.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Ledger {
    blocks: BTreeMap<Arc<str>, i64>,
    categories: BTreeMap<BlockCategory, i64>,
    components: BTreeMap<Arc<str>, i64>,
    raw_cost: BTreeMap<Arc<str>, Quantity>,
    power_consumption: BTreeMap<Arc<str>, Quantity>,
    power_storage: Quantity,
    gas_storage: BTreeMap<Arc<str>, Quantity>,
    production: BTreeMap<Arc<str>, Quantity>,
    inventory_volume: Quantity,
    crew: i64,
}

impl Ledger {
    /// The empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts for one block with the given definition.
    ///
    /// `registry` resolves component recipes into raw-resource cost; unknown components
    /// count toward [`Ledger::component_count()`] but not toward raw cost.
    pub fn add_block(&mut self, id: &str, def: &BlockDefinition, registry: &BlockRegistry) {
        bump(&mut self.blocks, Arc::from(id), 1);
        for category in BlockCategory::classify(def) {
            bump(&mut self.categories, category, 1);
        }
        for (component, &count) in &def.components {
            bump(&mut self.components, Arc::from(component.as_str()), i64::from(count));
            match registry.component(component) {
                Some(recipe) => {
                    for (resource, &amount) in &recipe.0 {
                        bump(
                            &mut self.raw_cost,
                            Arc::from(resource.as_str()),
                            Quantity::from_f64(amount).scaled(i64::from(count)),
                        );
                    }
                }
                None => log::trace!("component {component:?} has no recipe"),
            }
        }
        bump(
            &mut self.power_consumption,
            Arc::from(def.power_group()),
            Quantity::from_f64(def.power_consumption),
        );
        self.power_storage += Quantity::from_f64(def.power_storage);
        if let Some(gas) = &def.gas_storage {
            bump(
                &mut self.gas_storage,
                Arc::from(gas.gas.as_str()),
                Quantity::from_f64(gas.capacity),
            );
        }
        for (resource, &rate) in &def.production {
            bump(
                &mut self.production,
                Arc::from(resource.as_str()),
                Quantity::from_f64(rate),
            );
        }
        self.inventory_volume += Quantity::from_f64(def.inventory_volume);
        self.crew = self.crew.saturating_add(i64::from(def.crew));
        self.prune();
    }

    /// Adds all of `other`'s totals to this ledger.
    pub fn add(&mut self, other: &Ledger) {
        self.combine(other, true);
    }

    /// Removes all of `other`'s totals from this ledger.
    pub fn subtract(&mut self, other: &Ledger) {
        self.combine(other, false);
    }

    fn combine(&mut self, other: &Ledger, add: bool) {
        let Self {
            blocks,
            categories,
            components,
            raw_cost,
            power_consumption,
            power_storage,
            gas_storage,
            production,
            inventory_volume,
            crew,
        } = other;
        merge(&mut self.blocks, blocks, add);
        merge(&mut self.categories, categories, add);
        merge(&mut self.components, components, add);
        merge(&mut self.raw_cost, raw_cost, add);
        merge(&mut self.power_consumption, power_consumption, add);
        merge(&mut self.gas_storage, gas_storage, add);
        merge(&mut self.production, production, add);
        if add {
            self.power_storage += *power_storage;
            self.inventory_volume += *inventory_volume;
            self.crew = self.crew.saturating_add(*crew);
        } else {
            self.power_storage -= *power_storage;
            self.inventory_volume -= *inventory_volume;
            self.crew = self.crew.saturating_sub(*crew);
        }
    }

    /// Removes entries that summed to zero within a single block's contribution.
    fn prune(&mut self) {
        self.power_consumption.retain(|_, q| *q != Quantity::ZERO);
        self.production.retain(|_, q| *q != Quantity::ZERO);
    }

    /// Whether this ledger accounts for nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Total number of blocks.
    pub fn total_blocks(&self) -> i64 {
        self.blocks.values().fold(0, |a, &b| a.saturating_add(b))
    }

    /// Number of blocks with the given id.
    pub fn block_count(&self, id: &str) -> i64 {
        self.blocks.get(id).copied().unwrap_or(0)
    }

    /// Number of blocks belonging to the given category.
    pub fn category_count(&self, category: BlockCategory) -> i64 {
        self.categories.get(&category).copied().unwrap_or(0)
    }

    /// Number of the given component needed to build all blocks.
    pub fn component_count(&self, component: &str) -> i64 {
        self.components.get(component).copied().unwrap_or(0)
    }

    /// Amount of the given raw resource needed to build all blocks.
    pub fn raw_cost(&self, resource: &str) -> Quantity {
        self.raw_cost.get(resource).copied().unwrap_or_default()
    }

    /// Power consumed by the given group. Negative values are net production.
    pub fn power_consumption(&self, group: &str) -> Quantity {
        self.power_consumption.get(group).copied().unwrap_or_default()
    }

    /// Power consumed by all groups. Negative values are net production.
    pub fn net_power_consumption(&self) -> Quantity {
        self.power_consumption.values().copied().sum()
    }

    /// Power storage capacity.
    pub fn power_storage(&self) -> Quantity {
        self.power_storage
    }

    /// Storage capacity for the given gas.
    pub fn gas_storage(&self, gas: &str) -> Quantity {
        self.gas_storage.get(gas).copied().unwrap_or_default()
    }

    /// Net production rate of the given resource. Negative values are net consumption.
    pub fn production(&self, resource: &str) -> Quantity {
        self.production.get(resource).copied().unwrap_or_default()
    }

    /// Item inventory volume.
    pub fn inventory_volume(&self) -> Quantity {
        self.inventory_volume
    }

    /// Number of crew housed.
    pub fn crew(&self) -> i64 {
        self.crew
    }

    /// Iterates over block ids and their counts.
    pub fn blocks(&self) -> impl Iterator<Item = (&str, i64)> + '_ {
        self.blocks.iter().map(|(id, &n)| (&**id, n))
    }

    /// Iterates over categories and their counts.
    pub fn categories(&self) -> impl Iterator<Item = (BlockCategory, i64)> + '_ {
        self.categories.iter().map(|(&c, &n)| (c, n))
    }

    /// Iterates over resources with nonzero net production.
    pub fn production_rates(&self) -> impl Iterator<Item = (&str, Quantity)> + '_ {
        self.production.iter().map(|(id, &q)| (&**id, q))
    }

    /// Iterates over raw resources and the amount needed.
    pub fn raw_costs(&self) -> impl Iterator<Item = (&str, Quantity)> + '_ {
        self.raw_cost.iter().map(|(id, &q)| (&**id, q))
    }
}

impl<'a> Sum<&'a Ledger> for Ledger {
    fn sum<I: Iterator<Item = &'a Ledger>>(iter: I) -> Self {
        let mut total = Ledger::new();
        for ledger in iter {
            total.add(ledger);
        }
        total
    }
}
