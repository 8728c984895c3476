use crate::foundation::error::{NowcastError, NowcastResult};

/// Fixed display raster size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> NowcastResult<Self> {
        if width == 0 || height == 0 {
            return Err(NowcastError::validation(
                "canvas width/height must be non-zero",
            ));
        }
        Ok(Self { width, height })
    }

    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 560,
            height: 420,
        }
    }
}

/// Which compositing function produces the right-hand raster.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonMode {
    #[default]
    Side,
    Overlay,
    Diff,
}

/// Where predicted frames come from.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PredictMode {
    #[default]
    Mock,
    Remote,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ComparisonParams {
    /// Alpha of the predicted frame in overlay mode, `[0, 1]`.
    pub opacity: f32,
    /// Per-pixel mean channel difference below which diff output is zeroed.
    pub diff_threshold: f32,
}

impl ComparisonParams {
    pub fn validate(&self) -> NowcastResult<()> {
        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            return Err(NowcastError::validation("opacity must be within [0, 1]"));
        }
        if !self.diff_threshold.is_finite() || self.diff_threshold < 0.0 {
            return Err(NowcastError::validation(
                "diff threshold must be a non-negative number",
            ));
        }
        Ok(())
    }
}

impl Default for ComparisonParams {
    fn default() -> Self {
        Self {
            opacity: 0.6,
            diff_threshold: 0.0,
        }
    }
}
