//! Fixed-size RGBA8 render targets and the letterboxing draw adapter.
//!
//! Pixels are stored premultiplied, row-major, origin top-left. Drawing a
//! [`Frame`] decodes it with a caller-supplied timeout, fits it into the
//! target preserving aspect ratio, and resamples it bilinearly.

use std::time::Duration;

use crate::{
    Canvas, Frame, NowcastError, NowcastResult,
    assets::{DecodedFrame, decode::encode_png},
    composite_cpu::{PremulRgba8, over},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RasterBuffer {
    pub fn new(canvas: Canvas) -> Self {
        Self {
            width: canvas.width,
            height: canvas.height,
            data: vec![0u8; canvas.pixel_count() * 4],
        }
    }

    pub fn from_decoded(decoded: &DecodedFrame) -> Self {
        Self {
            width: decoded.width,
            height: decoded.height,
            data: decoded.rgba8_premul.to_vec(),
        }
    }

    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn fill(&mut self, px: PremulRgba8) {
        for d in self.data.chunks_exact_mut(4) {
            d.copy_from_slice(&px);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> PremulRgba8 {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    pub fn to_png(&self) -> NowcastResult<Vec<u8>> {
        encode_png(&self.data, self.width, self.height)
    }

    pub fn to_frame(&self) -> NowcastResult<Frame> {
        Ok(Frame::from_bytes(self.to_png()?))
    }
}

/// Destination rectangle of a source image inside a target, in target pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub dx: f32,
    pub dy: f32,
    pub dw: f32,
    pub dh: f32,
}

impl Placement {
    /// Aspect-preserving fit of `src_w x src_h` into `dst_w x dst_h`, centered.
    pub fn letterbox(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Self {
        let (sw, sh) = (src_w as f32, src_h as f32);
        let (w, h) = (dst_w as f32, dst_h as f32);
        let scale = (w / sw).min(h / sh);
        let dw = sw * scale;
        let dh = sh * scale;
        Self {
            dx: (w - dw) / 2.0,
            dy: (h - dh) / 2.0,
            dw,
            dh,
        }
    }

    /// Native-size placement shifted by `(dx, dy)`.
    pub fn offset(src_w: u32, src_h: u32, dx: f32, dy: f32) -> Self {
        Self {
            dx,
            dy,
            dw: src_w as f32,
            dh: src_h as f32,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DrawOpts {
    /// Global alpha for the draw; fully opaque when unset.
    pub opacity: Option<f32>,
    /// Composite over the current contents instead of clearing first.
    pub keep_existing: bool,
}

/// Decode `frame` and draw it letterboxed into `target`.
pub fn draw_frame(
    target: &mut RasterBuffer,
    frame: &Frame,
    opts: DrawOpts,
    decode_timeout: Duration,
) -> NowcastResult<()> {
    let decoded = frame.decode_with_timeout(decode_timeout)?;
    draw_decoded(target, &decoded, opts)
}

pub fn draw_decoded(
    target: &mut RasterBuffer,
    src: &DecodedFrame,
    opts: DrawOpts,
) -> NowcastResult<()> {
    let placement = Placement::letterbox(src.width, src.height, target.width, target.height);
    if !opts.keep_existing {
        target.clear();
    }
    blit(target, src, placement, opts.opacity.unwrap_or(1.0))
}

/// Resample `src` into `placement` with bilinear filtering and composite it
/// over `target`. Target pixels whose centers fall outside the placement
/// are untouched.
pub fn blit(
    target: &mut RasterBuffer,
    src: &DecodedFrame,
    placement: Placement,
    opacity: f32,
) -> NowcastResult<()> {
    let expected = (src.width as usize)
        .checked_mul(src.height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| NowcastError::validation("source buffer size overflow"))?;
    if src.rgba8_premul.len() != expected || src.width == 0 || src.height == 0 {
        return Err(NowcastError::validation(
            "blit expects a non-empty source matching width*height*4",
        ));
    }
    let Placement { dx, dy, dw, dh } = placement;
    if !(dw > 0.0 && dh > 0.0) {
        return Ok(());
    }

    let x0 = dx.floor().max(0.0) as u32;
    let y0 = dy.floor().max(0.0) as u32;
    let x1 = ((dx + dw).ceil().max(0.0) as u32).min(target.width);
    let y1 = ((dy + dh).ceil().max(0.0) as u32).min(target.height);

    let sx_scale = src.width as f32 / dw;
    let sy_scale = src.height as f32 / dh;

    for y in y0..y1 {
        let cy = y as f32 + 0.5;
        if cy < dy || cy >= dy + dh {
            continue;
        }
        let v = (cy - dy) * sy_scale - 0.5;
        for x in x0..x1 {
            let cx = x as f32 + 0.5;
            if cx < dx || cx >= dx + dw {
                continue;
            }
            let u = (cx - dx) * sx_scale - 0.5;
            let sample = sample_bilinear(src, u, v);
            let i = (y as usize * target.width as usize + x as usize) * 4;
            let dst = [
                target.data[i],
                target.data[i + 1],
                target.data[i + 2],
                target.data[i + 3],
            ];
            target.data[i..i + 4].copy_from_slice(&over(dst, sample, opacity));
        }
    }
    Ok(())
}

fn sample_bilinear(src: &DecodedFrame, u: f32, v: f32) -> PremulRgba8 {
    let max_x = (src.width - 1) as f32;
    let max_y = (src.height - 1) as f32;
    let u = u.clamp(0.0, max_x);
    let v = v.clamp(0.0, max_y);

    let x0 = u.floor() as u32;
    let y0 = v.floor() as u32;
    let x1 = (x0 + 1).min(src.width - 1);
    let y1 = (y0 + 1).min(src.height - 1);
    let fx = u - x0 as f32;
    let fy = v - y0 as f32;

    let px = |x: u32, y: u32, c: usize| -> f32 {
        let i = (y as usize * src.width as usize + x as usize) * 4 + c;
        f32::from(src.rgba8_premul[i])
    };

    let mut out = [0u8; 4];
    for (c, o) in out.iter_mut().enumerate() {
        let top = px(x0, y0, c) * (1.0 - fx) + px(x1, y0, c) * fx;
        let bottom = px(x0, y1, c) * (1.0 - fx) + px(x1, y1, c) * fx;
        *o = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}
