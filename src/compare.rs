//! Observed-vs-predicted comparison rendering.
//!
//! [`composite`] clears and fully rewrites its target on every call, so it
//! is safe to invoke again whenever the frames, the mode, or the parameters
//! change.

use std::time::Duration;

use crate::{
    ComparisonMode, ComparisonParams, Frame, NowcastError, NowcastResult,
    composite_cpu::{diff_heat, straight_rgb},
    gray::to_gray,
    raster::{DrawOpts, RasterBuffer, draw_frame},
    similarity,
};

#[tracing::instrument(skip(target, left, right), fields(w = target.width, h = target.height))]
pub fn composite(
    target: &mut RasterBuffer,
    left: Option<&Frame>,
    right: Option<&Frame>,
    mode: ComparisonMode,
    params: ComparisonParams,
    decode_timeout: Duration,
) -> NowcastResult<()> {
    params.validate()?;
    target.clear();

    match mode {
        ComparisonMode::Side => {
            if let Some(right) = right {
                draw_frame(target, right, DrawOpts::default(), decode_timeout)?;
            }
        }
        ComparisonMode::Overlay => {
            if let Some(left) = left {
                draw_frame(target, left, DrawOpts::default(), decode_timeout)?;
            }
            if let Some(right) = right {
                let opts = DrawOpts {
                    opacity: Some(params.opacity),
                    keep_existing: true,
                };
                draw_frame(target, right, opts, decode_timeout)?;
            }
        }
        ComparisonMode::Diff => {
            let (Some(left), Some(right)) = (left, right) else {
                return Ok(());
            };
            let mut a = RasterBuffer::new(target.canvas());
            let mut b = RasterBuffer::new(target.canvas());
            draw_frame(&mut a, left, DrawOpts::default(), decode_timeout)?;
            draw_frame(&mut b, right, DrawOpts::default(), decode_timeout)?;
            *target = diff_rasters(&a, &b, params.diff_threshold)?;
        }
    }
    Ok(())
}

/// Per-pixel mean absolute difference of the straight-alpha RGB channels,
/// thresholded and heat-mapped.
pub fn diff_rasters(
    a: &RasterBuffer,
    b: &RasterBuffer,
    threshold: f32,
) -> NowcastResult<RasterBuffer> {
    if a.width != b.width || a.height != b.height || a.data.len() != b.data.len() {
        return Err(NowcastError::validation(
            "diff expects rasters of the same size",
        ));
    }
    let mut out = RasterBuffer::new(a.canvas());
    for ((o, pa), pb) in out
        .data
        .chunks_exact_mut(4)
        .zip(a.data.chunks_exact(4))
        .zip(b.data.chunks_exact(4))
    {
        let ca = straight_rgb([pa[0], pa[1], pa[2], pa[3]]);
        let cb = straight_rgb([pb[0], pb[1], pb[2], pb[3]]);
        let sum: u32 = (0..3).map(|c| u32::from(ca[c].abs_diff(cb[c]))).sum();
        let mut v = sum as f32 / 3.0;
        if v < threshold {
            v = 0.0;
        }
        o.copy_from_slice(&diff_heat(v));
    }
    Ok(out)
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct FrameMetrics {
    /// Normalized cross-correlation of the grayscale renders.
    pub score: f64,
    pub mse: f64,
}

/// Render both frames letterboxed at the target size and compare their
/// grayscale buffers.
pub fn measure(
    left: &Frame,
    right: &Frame,
    canvas: crate::Canvas,
    decode_timeout: Duration,
) -> NowcastResult<FrameMetrics> {
    let mut a = RasterBuffer::new(canvas);
    let mut b = RasterBuffer::new(canvas);
    draw_frame(&mut a, left, DrawOpts::default(), decode_timeout)?;
    draw_frame(&mut b, right, DrawOpts::default(), decode_timeout)?;
    let ga = to_gray(&a)?;
    let gb = to_gray(&b)?;
    Ok(FrameMetrics {
        score: similarity::score(&ga, &gb)?,
        mse: similarity::mse(&ga, &gb)?,
    })
}
