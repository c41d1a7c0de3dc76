//! Binary for generating stations from the command line.

use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser as _;

use stationgen::{
    CacheConfig, Catalog, CatalogFile, DerivedCache, DirectoryCache, EngineCaches,
    GeneratorOptions, Seed, StationRecord, generate_batch,
};
use stationgen_content::demo_catalog_file;

mod command_options;
use command_options::{Args, ProfileSource};
mod config_files;
use config_files::{read_json_file, read_json_file_or_default};
mod logging;

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    logging::install(&args.logging)?;
    run(args)
}

fn run(args: Args) -> Result<(), anyhow::Error> {
    if let Some(path) = &args.dump_catalog {
        let json = serde_json::to_string_pretty(&demo_catalog_file())?;
        fs::write(path, json)
            .with_context(|| format!("could not write catalog to {}", path.display()))?;
        return Ok(());
    }

    let cache = args
        .cache_dir
        .as_ref()
        .map(|dir| Arc::new(DirectoryCache::new(dir)));
    let catalog = load_catalog(args.catalog.as_deref(), cache.clone())?;
    catalog.precompute();
    let catalog = Arc::new(catalog);

    let profile = match &args.profile {
        ProfileSource::Demo(profile) => profile.seed(args.seed.unwrap_or(0)),
        ProfileSource::File(path) => {
            let mut seed: Seed = read_json_file("profile", path)?;
            if let Some(n) = args.seed {
                seed.seed = n;
            }
            seed
        }
    };
    let seeds: Vec<Seed> = (0..i64::from(args.count))
        .map(|i| {
            let mut seed = profile.clone();
            seed.seed = profile.seed.wrapping_add(i);
            seed
        })
        .collect();

    let options: GeneratorOptions =
        read_json_file_or_default("generator options", args.options.as_deref());
    let cache_config: CacheConfig =
        read_json_file_or_default("cache config", args.cache_config.as_deref());
    let caches = Arc::new(EngineCaches::new(&cache_config));

    let records = generate_batch(&catalog, &caches, &seeds, &options)
        .into_iter()
        .zip(&seeds)
        .map(|(result, seed)| {
            let station =
                result.with_context(|| format!("generation failed for seed {}", seed.seed))?;
            if !station.open_mounts.is_empty() {
                log::warn!(
                    "seed {seed}: {n} mounts could not be closed",
                    seed = seed.seed,
                    n = station.open_mounts.len()
                );
            }
            log::info!(
                "seed {seed}: {rooms} rooms, error {error:.4}",
                seed = seed.seed,
                rooms = station.placements.len(),
                error = station.error,
            );
            Ok(station.to_record(seed))
        })
        .collect::<Result<Vec<StationRecord>, anyhow::Error>>()?;

    if let Some(cache) = &cache {
        cache.flush();
    }
    log::debug!(
        "mount transform cache: {:?}; collision cache: {:?}",
        caches.mount_transform_stats(),
        caches.collision_stats()
    );

    let json = match records.as_slice() {
        [single] => serde_json::to_string_pretty(single)?,
        all => serde_json::to_string_pretty(all)?,
    };
    write_output(args.output.as_deref(), &json)
}

fn load_catalog(
    path: Option<&Path>,
    cache: Option<Arc<DirectoryCache>>,
) -> Result<Catalog, anyhow::Error> {
    let file: CatalogFile = match path {
        Some(path) => read_json_file("catalog", path)?,
        None => demo_catalog_file(),
    };
    let cache = cache.map(|c| c as Arc<dyn DerivedCache>);
    let catalog = Catalog::from_file(file, cache).context("invalid catalog")?;
    if catalog.is_empty() {
        log::warn!("catalog contains no templates");
    }
    Ok(catalog)
}

fn write_output(path: Option<&Path>, json: &str) -> Result<(), anyhow::Error> {
    match path {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("could not write output to {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}").context("could not write output")
        }
    }
}
