//! Procedural assembly of large modular structures from prefabricated parts.
//!
//! A [`Catalog`] holds [`PartTemplate`]s: small pre-authored block structures with named
//! connectors ([`Mount`]s) and reserved volumes. A [`StationGenerator`] grows a
//! [`Construction`] by repeatedly attaching parts at compatible mounts, rejecting
//! placements that collide and scoring the rest against a target profile ([`Seed`]).
//! The output is an ordered list of placements, an aggregate [`Ledger`], and any mounts
//! which could not be closed.
//!
//! ```
//! use std::sync::Arc;
//! use stationgen::{
//!     BlockDefinition, BlockRegistry, Catalog, EngineCaches, GeneratorOptions, Seed,
//!     StationGenerator, TemplateBuilder,
//! };
//! use stationgen::math::Face6;
//!
//! let mut registry = BlockRegistry::new();
//! registry.insert_block("hull", BlockDefinition::default());
//! let registry = Arc::new(registry);
//!
//! let mut catalog = Catalog::new(registry);
//! catalog
//!     .insert(
//!         TemplateBuilder::new("cap")
//!             .block([0, 0, 0], "hull")
//!             .mount("port", "a", [([0, 0, 0], Face6::PX)])
//!             .build(),
//!     )
//!     .unwrap();
//! catalog
//!     .insert(
//!         TemplateBuilder::new("hub")
//!             .fill([0, 0, 0], [3, 3, 3], "hull")
//!             .mount("port", "east", [([2, 1, 1], Face6::PX)])
//!             .mount("port", "west", [([0, 1, 1], Face6::NX)])
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let mut generator = StationGenerator::new(
//!     Arc::new(catalog),
//!     Arc::new(EngineCaches::default()),
//!     Seed::new(7),
//!     GeneratorOptions::default(),
//! );
//! let station = generator.generate().unwrap();
//! assert!(station.placements.len() >= 3);
//! assert!(station.open_mounts.is_empty());
//! ```

mod block;
pub use block::*;
mod caches;
pub use caches::*;
mod catalog;
pub use catalog::*;
mod collision;
pub use collision::*;
mod construction;
pub use construction::*;
mod generator;
pub use generator::*;
mod ledger;
pub use ledger::*;
mod lru;
mod mount;
pub use mount::*;
mod seed;
pub use seed::*;
mod template;
pub use template::*;

/// Grid geometry types, reexported from [`stationgen_base`].
pub mod math {
    pub use stationgen_base::math::*;
}
