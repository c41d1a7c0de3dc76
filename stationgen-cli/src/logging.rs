//! Logging to stderr.

use anyhow::Context as _;

/// A [`clap::Args`] struct for options controlling log output to stderr.
#[derive(Clone, Debug, clap::Args)]
pub(crate) struct LoggingArgs {
    /// Additional logging to stderr. Repeat for more.
    #[arg(long = "verbose", short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Remove timestamps from logs so that they are closer to deterministic.
    #[arg(long = "simplify-log-format", hide = true)]
    pub simplify_log_format: bool,
}

impl LoggingArgs {
    pub(crate) fn level(&self) -> log::LevelFilter {
        use log::LevelFilter::{Debug, Info, Trace, Warn};
        match self.verbose {
            0 => Warn,
            1 => Info,
            2 => Debug,
            _ => Trace,
        }
    }
}

/// Install a [`log`] global logger based on user-provided `options`.
pub(crate) fn install(options: &LoggingArgs) -> Result<(), anyhow::Error> {
    use log::LevelFilter::{Error, Off};

    let config = simplelog::ConfigBuilder::new()
        .set_target_level(Off)
        .set_location_level(Off)
        .set_time_level(if options.simplify_log_format { Off } else { Error })
        // Only our own crates; dependencies are not interesting here.
        .add_filter_allow_str("stationgen")
        .build();
    simplelog::WriteLogger::init(options.level(), config, std::io::stderr())
        .context("failed to initialize logging")
}
