// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::tracking::ArenaConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub output: OutputConfig,
    /// Shared per-arena algorithm parameters.
    pub tracking: ArenaConfig,
    /// One entry per arena to process.
    pub arenas: Vec<ArenaEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            output: OutputConfig::default(),
            tracking: ArenaConfig::default(),
            arenas: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
    /// Write per-attribute raw binaries and tables.
    pub export_attributes: bool,
    /// Write per-arena behavior bout summaries as JSON.
    pub export_events: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "output".to_string(),
            export_attributes: true,
            export_events: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaEntry {
    /// Raw mask container for this arena (see io::RawMaskFile).
    pub masks_file: String,
    pub pixel_per_millimeter: f32,
    pub frame_rate: f32,
    #[serde(default = "default_fly_count")]
    pub fly_count: usize,
    /// Optional ground-truth annotation table.
    #[serde(default)]
    pub annotation_file: Option<String>,
}

fn default_fly_count() -> usize {
    2
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }
}
