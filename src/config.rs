use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::repl::DEFAULT_PROMPT;
use crate::trace::Error;

/// Settings for the `sdb` binary, read from an optional TOML file.
///
/// ```toml
/// prompt = "(sdb) "
/// aslr = false
/// log = "sdb=debug"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub prompt: String,
    /// Leave address space randomisation enabled in launched programs.
    pub aslr: bool,
    /// Default `env_logger` filter; `RUST_LOG` takes precedence.
    pub log: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_owned(),
            aslr: true,
            log: "warn".to_owned(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::ConfigRead(path.to_owned(), e))?;
        text.parse()
            .map_err(|e| Error::ConfigParse(path.to_owned(), e))
    }
}

impl FromStr for Config {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}
