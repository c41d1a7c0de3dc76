//! Target profiles for the demo parts.

use std::fmt;

use exhaust::Exhaust;

use stationgen::{BlockCategory as C, GridScale, Requirement, ResourceRequirement, Seed};

/// Kinds of station that the demo catalog can produce.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    Hash,
    PartialEq,
    strum::IntoStaticStr,
    strum::EnumString,
    Exhaust,
)]
#[strum(serialize_all = "kebab-case")]
#[non_exhaustive]
pub enum DemoProfile {
    /// A few crew and a docking bay.
    Outpost,
    /// Large population with oxygen production and medical facilities.
    Colony,
    /// Storage and refining with several docking bays.
    Depot,
    /// A small-grid cabin.
    Cabin,
}

impl fmt::Display for DemoProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(<&str>::from(self))
    }
}

fn power(throughput: f64, storage: Option<f64>) -> ResourceRequirement {
    let mut power = ResourceRequirement::default();
    // Running short of power is much worse than having spare.
    power.throughput = Some(Requirement::new(throughput).asymmetric(4.0, 0.5));
    power.storage = storage.map(Requirement::new);
    power
}

impl DemoProfile {
    /// The profile, with noise derived from `seed`.
    pub fn seed(self, seed: i64) -> Seed {
        let base = Seed::new(seed);
        match self {
            Self::Outpost => base
                .with_population(6)
                .with_category(C::Habitat, Requirement::new(3.0).asymmetric(2.0, 1.0))
                .with_category(C::Docking, Requirement::new(1.0).weighted(2.0))
                .with_power(power(10.0, None)),
            Self::Colony => base
                .with_population(40)
                .with_category(C::Habitat, Requirement::new(20.0).asymmetric(2.0, 1.0))
                .with_category(C::Medical, Requirement::new(2.0))
                .with_throughput("oxygen", Requirement::new(40.0).asymmetric(3.0, 0.2))
                .with_storage("oxygen", Requirement::new(200_000.0).asymmetric(1.0, 0.1))
                .with_power(power(30.0, Some(12.0))),
            Self::Depot => base
                .with_population(15)
                .with_category(C::Habitat, Requirement::new(6.0))
                .with_category(C::Docking, Requirement::new(3.0).weighted(2.0))
                .with_category(C::Production, Requirement::new(4.0))
                .with_storage("hydrogen", Requirement::new(10_000_000.0).asymmetric(1.0, 0.1))
                .with_inventory(Requirement::new(200.0).asymmetric(2.0, 0.5))
                .with_power(power(20.0, None)),
            Self::Cabin => base
                .with_scale(GridScale::Small)
                .with_population(4)
                .with_category(C::Habitat, Requirement::new(2.0)),
        }
    }
}
