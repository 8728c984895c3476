//! Deterministic stand-in for a forecast model.
//!
//! The last observed frame is advected by a fixed vector per step and
//! softened with a small blur. Purely illustrative, not a motion model.

use std::time::Duration;

use crate::{
    Canvas, Frame, NowcastError, NowcastResult, Sequence,
    blur_cpu::gaussian_blur,
    raster::{Placement, RasterBuffer, blit},
};

/// Pixel shift applied per step, `(x, y)`.
pub const ADVECTION_PER_STEP: (f32, f32) = (2.0, 1.5);
pub const BLUR_SIGMA: f32 = 0.6;

#[tracing::instrument(skip(inputs), fields(n_inputs = inputs.len()))]
pub fn extrapolate(
    inputs: &[Frame],
    horizon: u32,
    decode_timeout: Duration,
) -> NowcastResult<Sequence> {
    let base = inputs.last().ok_or(NowcastError::EmptyInput)?;
    if horizon == 0 {
        return Err(NowcastError::validation("horizon must be > 0"));
    }

    let decoded = base.decode_with_timeout(decode_timeout)?;
    let canvas = Canvas::new(decoded.width, decoded.height)?;

    let mut out = Vec::new();
    let mut scratch = RasterBuffer::new(canvas);
    for t in 1..=horizon {
        let step = t as f32;
        scratch.clear();
        let placement = Placement::offset(
            decoded.width,
            decoded.height,
            ADVECTION_PER_STEP.0 * step,
            ADVECTION_PER_STEP.1 * step,
        );
        blit(&mut scratch, &decoded, placement, 1.0)?;
        let blurred = gaussian_blur(&scratch, BLUR_SIGMA)?;
        out.push(blurred.to_frame()?);
    }

    tracing::debug!(frames = out.len(), "mock extrapolation done");
    Ok(out)
}
