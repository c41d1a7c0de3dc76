//! Integer grid geometry used by [`stationgen`].
//!
//! Everything here operates on whole cells of a cubic grid: the six face directions,
//! the 24 proper rotations of a cube, rigid transforms built from those rotations plus an
//! integer translation, and half-open axis-aligned boxes.
//!
//! [`stationgen`]: https://docs.rs/stationgen/

#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), warn(clippy::std_instead_of_core))]

pub mod math;

// reexport for convenience of dependents and tests
#[doc(hidden)]
pub use euclid;
