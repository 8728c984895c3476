//! Top-level engine state: the three sequences, comparison settings,
//! playback, the display rasters, and the human-readable status line.
//!
//! Sequences are only ever replaced wholesale. A failed load or prediction
//! leaves every sequence and the last render untouched.

use std::{path::PathBuf, time::Instant};

use crate::{
    ComparisonMode, ComparisonParams, EngineConfig, Frame, NowcastError, NowcastResult,
    PredictMode, Sequence,
    compare::{FrameMetrics, composite, measure},
    ingest,
    playback::{PlaybackScheduler, PlaybackState},
    raster::{DrawOpts, RasterBuffer, draw_frame},
    remote::{MockPredictor, Predictor, RemotePredictor},
};

pub const STATUS_IDLE: &str = "Drop input frames to begin";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SequenceKind {
    Input,
    Truth,
}

impl SequenceKind {
    fn loading(self) -> &'static str {
        match self {
            Self::Input => "Loading input frames...",
            Self::Truth => "Loading ground truth frames...",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Truth => "truth",
        }
    }
}

pub struct Engine {
    config: EngineConfig,
    inputs: Sequence,
    truth: Sequence,
    predictions: Sequence,
    playback: PlaybackScheduler,
    status: String,
    left: RasterBuffer,
    right: RasterBuffer,
    dirty: bool,
}

impl Engine {
    pub fn new(config: EngineConfig) -> NowcastResult<Self> {
        config.validate()?;
        let playback = PlaybackScheduler::new(config.tick_interval())?;
        Ok(Self {
            left: RasterBuffer::new(config.canvas),
            right: RasterBuffer::new(config.canvas),
            config,
            inputs: Vec::new(),
            truth: Vec::new(),
            predictions: Vec::new(),
            playback,
            status: STATUS_IDLE.to_string(),
            dirty: true,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Latest activity or error, always reflecting the most recent attempt.
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn inputs(&self) -> &[Frame] {
        &self.inputs
    }

    pub fn truth(&self) -> &[Frame] {
        &self.truth
    }

    pub fn predictions(&self) -> &[Frame] {
        &self.predictions
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        tracing::info!(status = %self.status, "status");
    }

    // ---- ingestion ------------------------------------------------------

    /// Load the observed sequence from user-selected files. Non-image paths
    /// are dropped; an empty selection changes nothing.
    pub fn load_inputs(&mut self, paths: &[PathBuf]) -> NowcastResult<usize> {
        self.load_sequence(paths, SequenceKind::Input)
    }

    pub fn load_truth(&mut self, paths: &[PathBuf]) -> NowcastResult<usize> {
        self.load_sequence(paths, SequenceKind::Truth)
    }

    fn load_sequence(&mut self, paths: &[PathBuf], kind: SequenceKind) -> NowcastResult<usize> {
        let selected = ingest::select_images(paths);
        if selected.is_empty() {
            return Ok(0);
        }
        self.set_status(kind.loading());
        match ingest::read_frames(&selected) {
            Ok(frames) => Ok(self.replace_sequence(frames, kind)),
            Err(err) => {
                tracing::warn!(error = %err, kind = kind.noun(), "frame load failed");
                self.set_status(format!("Loading {} frames failed: {err}", kind.noun()));
                Err(err)
            }
        }
    }

    /// Replace the observed sequence with already-read frames.
    pub fn set_inputs(&mut self, frames: Sequence) -> usize {
        self.replace_sequence(frames, SequenceKind::Input)
    }

    pub fn set_truth(&mut self, frames: Sequence) -> usize {
        self.replace_sequence(frames, SequenceKind::Truth)
    }

    fn replace_sequence(&mut self, frames: Sequence, kind: SequenceKind) -> usize {
        let n = frames.len();
        match kind {
            SequenceKind::Input => {
                self.inputs = frames;
                self.dirty = true;
            }
            SequenceKind::Truth => self.truth = frames,
        }
        self.set_status(format!("{n} {} frame(s) loaded", kind.noun()));
        n
    }

    // ---- settings -------------------------------------------------------

    pub fn set_predict_mode(&mut self, mode: PredictMode) {
        self.config.predict_mode = mode;
    }

    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) {
        self.config.endpoint = endpoint.into();
    }

    pub fn set_variable(&mut self, variable: impl Into<String>) {
        self.config.variable = variable.into();
    }

    pub fn set_horizon(&mut self, horizon: u32) -> NowcastResult<()> {
        if horizon == 0 {
            return Err(NowcastError::validation("horizon must be > 0"));
        }
        self.config.horizon = horizon;
        Ok(())
    }

    /// Upper bound on a single frame decode, in milliseconds.
    pub fn set_decode_timeout_ms(&mut self, millis: u64) -> NowcastResult<()> {
        if millis == 0 {
            return Err(NowcastError::validation("decode timeout must be non-zero"));
        }
        self.config.decode_timeout_ms = millis;
        Ok(())
    }

    pub fn set_compare_mode(&mut self, mode: ComparisonMode) {
        if self.config.compare != mode {
            self.config.compare = mode;
            self.dirty = true;
        }
    }

    pub fn set_opacity(&mut self, opacity: f32) -> NowcastResult<()> {
        let params = ComparisonParams {
            opacity,
            ..self.config.comparison_params()
        };
        params.validate()?;
        if self.config.opacity != opacity {
            self.config.opacity = opacity;
            self.dirty = true;
        }
        Ok(())
    }

    pub fn set_diff_threshold(&mut self, threshold: f32) -> NowcastResult<()> {
        let params = ComparisonParams {
            diff_threshold: threshold,
            ..self.config.comparison_params()
        };
        params.validate()?;
        if self.config.diff_threshold != threshold {
            self.config.diff_threshold = threshold;
            self.dirty = true;
        }
        Ok(())
    }

    // ---- prediction -----------------------------------------------------

    /// Predict with the source selected by the configured mode.
    pub fn run_prediction(&mut self) -> NowcastResult<usize> {
        match self.config.predict_mode {
            PredictMode::Mock => {
                let predictor = MockPredictor {
                    decode_timeout: self.config.decode_timeout(),
                };
                self.run_prediction_with(&predictor)
            }
            PredictMode::Remote => {
                let created =
                    RemotePredictor::new(&self.config.endpoint, self.config.remote_timeout());
                let predictor = match created {
                    Ok(p) => p,
                    Err(err) => return Err(self.prediction_failed(err)),
                };
                self.run_prediction_with(&predictor)
            }
        }
    }

    /// Predict with an explicit source. On success the predictions are
    /// replaced and the cursor rewinds; on failure nothing but the status
    /// changes.
    #[tracing::instrument(skip(self, predictor), fields(mode = ?self.config.predict_mode))]
    pub fn run_prediction_with(&mut self, predictor: &dyn Predictor) -> NowcastResult<usize> {
        if self.inputs.is_empty() {
            self.set_status("Please load input frames first");
            return Err(NowcastError::EmptyInput);
        }
        self.set_status(match self.config.predict_mode {
            PredictMode::Mock => "Running mock prediction...",
            PredictMode::Remote => "Calling model API...",
        });

        match predictor.predict(&self.inputs, self.config.horizon, &self.config.variable) {
            Ok(out) => {
                let n = out.len();
                self.predictions = out;
                self.playback.rewind();
                self.dirty = true;
                self.set_status(format!("Got {n} predicted frame(s)"));
                Ok(n)
            }
            Err(err) => Err(self.prediction_failed(err)),
        }
    }

    fn prediction_failed(&mut self, err: NowcastError) -> NowcastError {
        tracing::warn!(error = %err, "prediction failed");
        self.set_status(format!("Prediction failed: {err}"));
        err
    }

    /// Drop all sequences, rewind, and stop playback.
    pub fn clear(&mut self) {
        self.inputs = Vec::new();
        self.truth = Vec::new();
        self.predictions = Vec::new();
        self.playback.reset();
        self.dirty = true;
        self.set_status("Cleared");
    }

    // ---- playback -------------------------------------------------------

    pub fn play(&mut self, now: Instant) {
        self.playback.play(now);
    }

    /// Stop advancing. The engine never owns a [`PlaybackTimer`]; whoever
    /// drives [`Engine::tick`] from one keeps it alive and stops it, and a
    /// paused engine ignores its ticks meanwhile.
    ///
    /// [`PlaybackTimer`]: crate::PlaybackTimer
    pub fn pause(&mut self) {
        self.playback.pause();
    }

    pub fn toggle_play(&mut self, now: Instant) {
        self.playback.toggle(now);
    }

    pub fn seek(&mut self, index: usize) {
        let before = self.playback.cursor();
        self.playback.seek(index, self.predictions.len());
        if self.playback.cursor() != before {
            self.dirty = true;
        }
    }

    /// Per-display-frame hook. Returns the new cursor when it advanced.
    pub fn tick(&mut self, now: Instant) -> Option<usize> {
        let advanced = self.playback.tick(now, self.predictions.len());
        if advanced.is_some() {
            self.dirty = true;
        }
        advanced
    }

    // ---- rendering ------------------------------------------------------

    /// The newest observed frame.
    pub fn left_frame(&self) -> Option<&Frame> {
        self.inputs.last()
    }

    /// The predicted frame under the playback cursor.
    pub fn right_frame(&self) -> Option<&Frame> {
        let last = self.predictions.len().checked_sub(1)?;
        self.predictions.get(self.playback.cursor().min(last))
    }

    /// True when a frame, the mode, or a comparison parameter changed since
    /// the last successful [`Engine::render`].
    pub fn needs_render(&self) -> bool {
        self.dirty
    }

    /// Redraw both display rasters from the current state.
    pub fn render(&mut self) -> NowcastResult<(&RasterBuffer, &RasterBuffer)> {
        let timeout = self.config.decode_timeout();
        let mut left = RasterBuffer::new(self.config.canvas);
        if let Some(frame) = self.left_frame() {
            draw_frame(&mut left, frame, DrawOpts::default(), timeout)?;
        }
        let mut right = RasterBuffer::new(self.config.canvas);
        composite(
            &mut right,
            self.left_frame(),
            self.right_frame(),
            self.config.compare,
            self.config.comparison_params(),
            timeout,
        )?;

        self.left = left;
        self.right = right;
        self.dirty = false;
        Ok((&self.left, &self.right))
    }

    pub fn render_if_needed(&mut self) -> NowcastResult<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.render()?;
        Ok(true)
    }

    pub fn left_raster(&self) -> &RasterBuffer {
        &self.left
    }

    pub fn right_raster(&self) -> &RasterBuffer {
        &self.right
    }

    /// Similarity of the newest observed frame and the current prediction.
    pub fn metrics(&self) -> NowcastResult<Option<FrameMetrics>> {
        let (Some(left), Some(right)) = (self.left_frame(), self.right_frame()) else {
            return Ok(None);
        };
        measure(left, right, self.config.canvas, self.config.decode_timeout()).map(Some)
    }
}
