//! Reading input files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context as _;
use serde::de::DeserializeOwned;

/// Reads a JSON file which must exist and be valid.
pub(crate) fn read_json_file<V: DeserializeOwned>(
    description: &str,
    path: &Path,
) -> Result<V, anyhow::Error> {
    let file = File::open(path)
        .with_context(|| format!("could not open {description} file {}", path.display()))?;
    let value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("could not parse {description} file {}", path.display()))?;
    log::trace!("Loaded {description} from {path}", path = path.display());
    Ok(value)
}

/// Reads an optional settings file, falling back to defaults with a warning if it cannot
/// be read.
pub(crate) fn read_json_file_or_default<V: DeserializeOwned + Default>(
    description: &str,
    path: Option<&Path>,
) -> V {
    let Some(path) = path else {
        return V::default();
    };
    match File::open(path) {
        Ok(file) => match serde_json::from_reader(BufReader::new(file)) {
            Ok(value) => {
                log::trace!("Loaded {description} from {path}", path = path.display());
                value
            }
            Err(e) => {
                log::warn!(
                    "Syntax error in {description} loaded from {path}; \
                    using default values. Error: {e}",
                    path = path.display(),
                );
                V::default()
            }
        },
        Err(e) => {
            log::warn!(
                "Error while reading {description} file {path}; using default values. Error: {e}",
                path = path.display(),
            );
            V::default()
        }
    }
}
