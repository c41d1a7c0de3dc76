//! Target profiles that generation is scored against.

use std::collections::BTreeMap;

use rand::{Rng as _, SeedableRng as _};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::block::BlockCategory;
use crate::ledger::{Ledger, Quantity};
use crate::template::GridScale;

/// A target value and how much deviating from it costs.
///
/// The error of an actual value is
/// `error_mult × (deficit_mult or surplus_mult) × ((actual − target) / max(|target|, 1))²`,
/// so the multipliers express how much worse too little is than too much (or vice versa)
/// and the normalization makes requirements of different magnitudes comparable.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
#[non_exhaustive]
pub struct Requirement {
    /// Desired value.
    pub target: f64,
    /// Overall weight.
    pub error_mult: f64,
    /// Weight of falling short.
    pub deficit_mult: f64,
    /// Weight of exceeding.
    pub surplus_mult: f64,
}

impl Default for Requirement {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Requirement {
    /// A requirement with all multipliers 1.
    pub const fn new(target: f64) -> Self {
        Self {
            target,
            error_mult: 1.0,
            deficit_mult: 1.0,
            surplus_mult: 1.0,
        }
    }

    /// Sets the deficit and surplus multipliers.
    #[must_use]
    pub const fn asymmetric(mut self, deficit_mult: f64, surplus_mult: f64) -> Self {
        self.deficit_mult = deficit_mult;
        self.surplus_mult = surplus_mult;
        self
    }

    /// Sets the overall weight.
    #[must_use]
    pub const fn weighted(mut self, error_mult: f64) -> Self {
        self.error_mult = error_mult;
        self
    }

    /// Error of `actual` against this requirement. Never negative.
    pub fn error(&self, actual: f64) -> f64 {
        let difference = actual - self.target;
        let side = if difference < 0.0 {
            self.deficit_mult
        } else {
            self.surplus_mult
        };
        let normalized = difference / self.target.abs().max(1.0);
        self.error_mult * side * normalized * normalized
    }
}

/// Requirements on one resource. Absent requirements contribute no error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
#[non_exhaustive]
pub struct ResourceRequirement {
    /// Storage capacity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<Requirement>,
    /// Net production per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput: Option<Requirement>,
}

/// A target profile: the statistics a generated structure should have, and the integer
/// seed that every noise decision of a generation run derives from.
///
/// A seed holds no mutable random state; [`Seed::noise()`] is a pure function, so equal
/// seeds reproduce equal decisions.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
#[non_exhaustive]
pub struct Seed {
    /// The noise seed.
    pub seed: i64,
    /// Grid size class of the structure.
    pub scale: GridScale,
    /// Intended population; scales how fast the structure grows.
    pub population: u32,
    /// Requirements by resource, covering gas storage and production rates.
    pub resources: BTreeMap<String, ResourceRequirement>,
    /// Requirements on power storage and net power production.
    pub power: ResourceRequirement,
    /// Requirement on item inventory volume.
    pub inventory: Option<Requirement>,
    /// Requirements on block counts by category.
    pub categories: BTreeMap<BlockCategory, Requirement>,
}

impl Default for Seed {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Seed {
    /// A profile with no requirements, population 10, and the default grid scale.
    pub fn new(seed: i64) -> Self {
        Self {
            seed,
            scale: GridScale::default(),
            population: 10,
            resources: BTreeMap::new(),
            power: ResourceRequirement::default(),
            inventory: None,
            categories: BTreeMap::new(),
        }
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn with_population(mut self, population: u32) -> Self {
        self.population = population;
        self
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn with_scale(mut self, scale: GridScale) -> Self {
        self.scale = scale;
        self
    }

    /// Requires a count of blocks in `category`.
    #[must_use]
    pub fn with_category(mut self, category: BlockCategory, requirement: Requirement) -> Self {
        self.categories.insert(category, requirement);
        self
    }

    /// Requires storage capacity for a gas.
    #[must_use]
    pub fn with_storage(mut self, resource: impl Into<String>, requirement: Requirement) -> Self {
        self.resources.entry(resource.into()).or_default().storage = Some(requirement);
        self
    }

    /// Requires net production of a resource.
    #[must_use]
    pub fn with_throughput(
        mut self,
        resource: impl Into<String>,
        requirement: Requirement,
    ) -> Self {
        self.resources.entry(resource.into()).or_default().throughput = Some(requirement);
        self
    }

    /// Requires power storage and net power production.
    #[must_use]
    pub fn with_power(mut self, power: ResourceRequirement) -> Self {
        self.power = power;
        self
    }

    /// Requires inventory volume.
    #[must_use]
    pub fn with_inventory(mut self, requirement: Requirement) -> Self {
        self.inventory = Some(requirement);
        self
    }

    /// Deterministic noise in `[0, 1)` for `key`.
    pub fn noise(&self, key: i64) -> f64 {
        let mixed = (self.seed as u64) ^ (key as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Xoshiro256PlusPlus::seed_from_u64(mixed).random::<f64>()
    }

    /// Error of the sum of `ledgers` against this profile. Zero means every requirement
    /// is met exactly.
    ///
    /// Taking several ledgers lets a caller evaluate “current structure plus one more
    /// part” without building the combined ledger.
    pub fn error(&self, ledgers: &[&Ledger]) -> f64 {
        let sum = |f: &dyn Fn(&Ledger) -> Quantity| -> f64 {
            ledgers.iter().map(|l| f(l)).sum::<Quantity>().to_f64()
        };
        let mut error = 0.0;
        for (&category, requirement) in &self.categories {
            let count: i64 = ledgers.iter().map(|l| l.category_count(category)).sum();
            error += requirement.error(count as f64);
        }
        for (resource, requirement) in &self.resources {
            if let Some(storage) = &requirement.storage {
                error += storage.error(sum(&|l| l.gas_storage(resource)));
            }
            if let Some(throughput) = &requirement.throughput {
                error += throughput.error(sum(&|l| l.production(resource)));
            }
        }
        if let Some(inventory) = &self.inventory {
            error += inventory.error(sum(&|l| l.inventory_volume()));
        }
        if let Some(storage) = &self.power.storage {
            error += storage.error(sum(&|l| l.power_storage()));
        }
        if let Some(throughput) = &self.power.throughput {
            error += throughput.error(-sum(&|l| l.net_power_consumption()));
        }
        error
    }
}
