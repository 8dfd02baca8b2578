// Runtime configuration, read from an optional TOML file.
//
// ```toml
// [thresholds]
// on_track = 100.0
// at_risk = 80.0
//
// [output]
// dir = "reports"
// preview_rows = 5
// ```

use crate::error::{ReportError, Result};
use crate::reports::Thresholds;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub thresholds: Thresholds,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub preview_rows: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            preview_rows: 5,
        }
    }
}

impl ReportConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: ReportConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        if !t.on_track.is_finite() || !t.at_risk.is_finite() {
            return Err(ReportError::Config("thresholds must be finite numbers".into()));
        }
        if t.at_risk > t.on_track {
            return Err(ReportError::Config(format!(
                "at_risk threshold ({}) cannot exceed on_track threshold ({})",
                t.at_risk, t.on_track
            )));
        }
        Ok(())
    }
}
