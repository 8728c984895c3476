use std::{fs::File, io::BufReader, path::Path, time::Duration};

use anyhow::Context as _;

use crate::{Canvas, ComparisonMode, ComparisonParams, NowcastError, NowcastResult, PredictMode};

/// Engine settings. Every field has a default, so a config file only needs
/// the keys it changes.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub predict_mode: PredictMode,
    pub endpoint: String,
    pub variable: String,
    pub horizon: u32,
    pub compare: ComparisonMode,
    pub opacity: f32,
    pub diff_threshold: f32,
    pub canvas: Canvas,
    pub tick_interval_ms: u64,
    pub decode_timeout_ms: u64,
    pub remote_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            predict_mode: PredictMode::Mock,
            endpoint: "http://localhost:8000".to_string(),
            variable: "radar_reflectivity".to_string(),
            horizon: 6,
            compare: ComparisonMode::Side,
            opacity: 0.6,
            diff_threshold: 0.0,
            canvas: Canvas::default(),
            tick_interval_ms: 400,
            decode_timeout_ms: 5_000,
            remote_timeout_ms: 30_000,
        }
    }
}

impl EngineConfig {
    pub fn from_json_file(path: &Path) -> NowcastResult<Self> {
        let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse config JSON '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> NowcastResult<()> {
        if self.horizon == 0 {
            return Err(NowcastError::validation("horizon must be > 0"));
        }
        self.comparison_params().validate()?;
        Canvas::new(self.canvas.width, self.canvas.height)?;
        if self.tick_interval_ms == 0 || self.decode_timeout_ms == 0 || self.remote_timeout_ms == 0
        {
            return Err(NowcastError::validation(
                "tick, decode and remote timeouts must be non-zero",
            ));
        }
        if self.predict_mode == PredictMode::Remote && self.endpoint.trim().is_empty() {
            return Err(NowcastError::validation(
                "remote prediction needs an endpoint",
            ));
        }
        Ok(())
    }

    pub fn comparison_params(&self) -> ComparisonParams {
        ComparisonParams {
            opacity: self.opacity,
            diff_threshold: self.diff_threshold,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn decode_timeout(&self) -> Duration {
        Duration::from_millis(self.decode_timeout_ms)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }
}
