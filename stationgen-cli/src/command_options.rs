//! Command line option parsing.

use std::path::PathBuf;
use std::str::FromStr;

use stationgen_content::DemoProfile;

use crate::logging::LoggingArgs;

/// Generates modular stations from a catalog of prefabricated parts.
#[derive(Clone, Debug, clap::Parser)]
#[command(version, about)]
pub(crate) struct Args {
    /// Catalog of blocks and part templates, as JSON.
    /// If omitted, the built-in demo catalog is used.
    #[arg(long = "catalog", short = 'c', value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Target profile: the name of a demo profile, or a JSON file.
    #[arg(long = "profile", short = 'p', value_name = "NAME|FILE", default_value = "outpost")]
    pub profile: ProfileSource,

    /// Noise seed. Overrides the seed in a profile file.
    #[arg(long = "seed", short = 's')]
    pub seed: Option<i64>,

    /// Number of stations to generate, using consecutive seeds.
    #[arg(long = "count", short = 'n', default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub count: u32,

    /// Generator options, as JSON. A file that cannot be read or parsed is reported and
    /// the defaults are used instead.
    #[arg(long = "options", value_name = "FILE")]
    pub options: Option<PathBuf>,

    /// Memo table capacities, as JSON. Handled like `--options`.
    #[arg(long = "cache-config", value_name = "FILE")]
    pub cache_config: Option<PathBuf>,

    /// Directory in which to cache per-template derived data between runs.
    #[arg(long = "cache-dir", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Where to write the generated stations. Defaults to standard output.
    #[arg(long = "output", short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Write the demo catalog as JSON to this file, and exit.
    #[arg(long = "dump-catalog", value_name = "FILE", conflicts_with = "catalog")]
    pub dump_catalog: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

/// Where the target profile comes from.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ProfileSource {
    Demo(DemoProfile),
    File(PathBuf),
}

impl FromStr for ProfileSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<DemoProfile>() {
            Ok(profile) => Self::Demo(profile),
            Err(_) => Self::File(PathBuf::from(s)),
        })
    }
}
