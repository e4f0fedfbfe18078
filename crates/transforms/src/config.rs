//! Transformer configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variable selecting the [`DumpMode`].
pub const ENV_DUMP: &str = "GRAFT_DUMP";
/// Environment variable enabling raw byte dumps.
pub const ENV_DUMP_RAW: &str = "GRAFT_DUMP_RAW";
/// Environment variable overriding the dump directory.
pub const ENV_DUMP_DIR: &str = "GRAFT_DUMP_DIR";

/// When transformed classes are dumped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpMode {
    /// Never.
    Off,
    /// Only when a transform fails.
    #[default]
    Failure,
    /// After every transform, successful or not.
    Always,
}

impl FromStr for DumpMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(DumpMode::Off),
            "failure" | "fail" => Ok(DumpMode::Failure),
            "always" | "all" => Ok(DumpMode::Always),
            other => Err(Error::Config(format!("unknown dump mode '{other}'"))),
        }
    }
}

/// Configuration for the patch registry.
///
/// The default dumps a class only when its transform fails, so a healthy load leaves no files
/// behind. Set `dump` to [`DumpMode::Always`] (or `GRAFT_DUMP=always`) to dump every patched class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformerConfig {
    /// Defaults to [`DumpMode::Failure`].
    pub dump: DumpMode,
    /// Directory for file dumps.
    pub dump_dir: PathBuf,
    /// Dump patched bytes instead of a disassembly after successful transforms.
    pub raw: bool,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            dump: DumpMode::Failure,
            dump_dir: PathBuf::from("asm/graft"),
            raw: false,
        }
    }
}

impl TransformerConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from defaults plus whatever `lookup` returns for the `GRAFT_*`
    /// variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(mode) = lookup(ENV_DUMP) {
            config.dump = mode.parse()?;
        }
        if let Some(raw) = lookup(ENV_DUMP_RAW) {
            config.raw = parse_flag(ENV_DUMP_RAW, &raw)?;
        }
        if let Some(dir) = lookup(ENV_DUMP_DIR)
            && !dir.is_empty()
        {
            config.dump_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    /// Parses a JSON document; missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::Config(format!("{key}: expected a boolean, got '{other}'"))),
    }
}
