//! Frame sequence comparison and playback for short-term forecast imagery.
//!
//! Two image sequences come in (observed history and optional ground
//! truth), a third is predicted from them, either by a remote model API or
//! by a deterministic local extrapolation, and the newest observed frame is
//! compared against the prediction under the playback cursor:
//!
//! - [`Engine`] owns the sequences, settings, playback, and status line
//! - [`compare::composite`] renders side, overlay, or diff views
//! - [`similarity::score`] gives a cheap correlation-based similarity
#![forbid(unsafe_code)]

mod assets;
mod foundation;

mod blur_cpu;
pub mod compare;
mod composite_cpu;
pub mod config;
pub mod engine;
pub mod extrapolate;
pub mod frame;
pub mod gray;
pub mod ingest;
pub mod playback;
pub mod raster;
pub mod remote;
pub mod similarity;

pub use crate::assets::DecodedFrame;
pub use crate::foundation::core::{Canvas, ComparisonMode, ComparisonParams, PredictMode};
pub use crate::foundation::error::{NowcastError, NowcastResult};

pub use crate::compare::{FrameMetrics, composite, diff_rasters};
pub use crate::config::EngineConfig;
pub use crate::engine::Engine;
pub use crate::extrapolate::extrapolate;
pub use crate::frame::{Frame, Sequence};
pub use crate::gray::{GrayscaleBuffer, to_gray};
pub use crate::playback::{PlaybackScheduler, PlaybackState, PlaybackTimer};
pub use crate::raster::{DrawOpts, Placement, RasterBuffer, draw_frame};
pub use crate::remote::{MockPredictor, Predictor, RemotePredictor};
