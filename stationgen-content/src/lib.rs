//! Demo content for the `stationgen` generator: a block registry, a catalog of station
//! parts, and target profiles that exercise them.
//!
//! The main entry points are [`demo_catalog()`] and [`DemoProfile`]; other items should
//! be assumed not particularly stable.

use std::sync::Arc;

use stationgen::{Catalog, CatalogError, CatalogFile};

mod blocks;
pub use blocks::*;
mod parts;
pub use parts::*;
mod profiles;
pub use profiles::*;

/// All [`DemoParts`] with the [`demo_registry()`] blocks, in serializable form.
pub fn demo_catalog_file() -> CatalogFile {
    let mut file = CatalogFile::default();
    file.registry = demo_registry();
    file.templates = <DemoParts as exhaust::Exhaust>::exhaust()
        .map(DemoParts::source)
        .collect();
    file
}

/// A catalog of all [`DemoParts`].
pub fn demo_catalog() -> Result<Catalog, CatalogError> {
    let file = demo_catalog_file();
    let mut catalog = Catalog::new(Arc::new(file.registry));
    for source in file.templates {
        catalog.insert(source)?;
    }
    log::debug!("demo catalog has {n} templates", n = catalog.len());
    Ok(catalog)
}
