//! Configuration (layered: code > env > config file).

use std::path::{Path, PathBuf};

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TurnwireError};

pub const ENV_YOLO: &str = "TURNWIRE_YOLO";
pub const ENV_WIRE_MERGE: &str = "TURNWIRE_WIRE_MERGE";
pub const ENV_RECORD_PATH: &str = "TURNWIRE_RECORD_PATH";

/// Runtime knobs for the wire and approval collaborators.
///
/// Resolution order:
/// 1. Values set in code (builder, or field assignment after loading)
/// 2. Environment variables (`TURNWIRE_*`, `.env` honored)
/// 3. The TOML config file
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TurnwireConfig {
    /// Approve every approval request without asking.
    #[builder(default)]
    pub yolo: bool,
    /// Coalesce adjacent mergeable events for the default consumer.
    #[builder(default)]
    pub wire_merge: bool,
    /// Where to record wire traffic, if anywhere.
    pub record_path: Option<PathBuf>,
}

impl TurnwireConfig {
    /// `<config dir>/turnwire/config.toml` for the current platform.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "turnwire")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw)
            .map_err(|e| TurnwireError::Configuration(format!("invalid config: {e}")))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Defaults overlaid with environment variables.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::default().apply_env()
    }

    /// Config file at [`default_path`](Self::default_path) (if present),
    /// overlaid with environment variables.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let base = match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "loading config file");
                Self::from_file(path)?
            }
            _ => Self::default(),
        };
        base.apply_env()
    }

    /// Overlay `TURNWIRE_*` environment variables.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup(ENV_YOLO) {
            self.yolo = parse_flag(ENV_YOLO, &raw)?;
        }
        if let Some(raw) = lookup(ENV_WIRE_MERGE) {
            self.wire_merge = parse_flag(ENV_WIRE_MERGE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_RECORD_PATH) {
            self.record_path = (!raw.trim().is_empty()).then(|| PathBuf::from(raw));
        }
        Ok(self)
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(TurnwireError::Configuration(format!(
            "{key} must be a boolean, got '{other}'"
        ))),
    }
}
