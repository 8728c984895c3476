use crate::{NowcastError, NowcastResult, raster::RasterBuffer};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Axis {
    Horizontal,
    Vertical,
}

/// Separable Gaussian blur of a premultiplied raster.
///
/// The kernel radius is `ceil(3 * sigma)`; edges clamp. `sigma == 0` copies.
pub fn gaussian_blur(src: &RasterBuffer, sigma: f32) -> NowcastResult<RasterBuffer> {
    let expected_len = (src.width as usize)
        .checked_mul(src.height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| NowcastError::validation("blur buffer size overflow"))?;
    if src.data.len() != expected_len {
        return Err(NowcastError::validation(
            "gaussian_blur expects data matching width*height*4",
        ));
    }
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(NowcastError::validation("blur sigma must be >= 0"));
    }
    let radius = (3.0 * sigma).ceil() as u32;
    if radius == 0 || expected_len == 0 {
        return Ok(src.clone());
    }

    let kernel = gaussian_kernel_q16(radius, sigma)?;
    let mut tmp = vec![0u8; expected_len];
    let mut out = src.clone();

    convolve(&src.data, &mut tmp, src.width, src.height, &kernel, Axis::Horizontal);
    convolve(&tmp, &mut out.data, src.width, src.height, &kernel, Axis::Vertical);
    Ok(out)
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> NowcastResult<Vec<u32>> {
    let r = radius as i32;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    let weights_f: Vec<f64> = (-r..=r)
        .map(|i| {
            let x = f64::from(i);
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f64 = weights_f.iter().sum();
    if sum <= 0.0 {
        return Err(NowcastError::validation("gaussian kernel sum is zero"));
    }

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|&wf| ((wf / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();

    // Push rounding error into the center tap so the kernel sums to 1.0.
    let acc: i64 = weights.iter().map(|&w| i64::from(w)).sum();
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }

    Ok(weights)
}

fn convolve(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32], axis: Axis) {
    let radius = (k.len() / 2) as i32;
    let (w, h) = (width as i32, height as i32);
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let d = ki as i32 - radius;
                let (sx, sy) = match axis {
                    Axis::Horizontal => ((x + d).clamp(0, w - 1), y),
                    Axis::Vertical => (x, (y + d).clamp(0, h - 1)),
                };
                let idx = ((sy * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    let v = (acc + 32768) >> 16;
    v.min(255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Canvas;

    #[test]
    fn sigma_0_is_identity() {
        let src = RasterBuffer {
            width: 1,
            height: 2,
            data: vec![1u8, 2, 3, 4, 5, 6, 7, 8],
        };
        assert_eq!(gaussian_blur(&src, 0.0).unwrap(), src);
    }

    #[test]
    fn constant_raster_is_unchanged() {
        let mut src = RasterBuffer::new(Canvas::new(4, 3).unwrap());
        src.fill([10, 20, 30, 40]);
        assert_eq!(gaussian_blur(&src, 0.6).unwrap(), src);
    }

    #[test]
    fn blur_spreads_energy_from_single_pixel() {
        let mut src = RasterBuffer::new(Canvas::new(5, 5).unwrap());
        let center = ((2 * 5 + 2) * 4) as usize;
        src.data[center..center + 4].copy_from_slice(&[255, 255, 255, 255]);

        let out = gaussian_blur(&src, 0.6).unwrap();

        let nonzero = out.data.chunks_exact(4).filter(|px| px[3] != 0).count();
        assert!(nonzero > 1);
        assert!(out.pixel(2, 2)[3] < 255);

        let sum_a: u32 = out.data.chunks_exact(4).map(|px| u32::from(px[3])).sum();
        assert!((sum_a as i32 - 255).abs() <= 4);
    }

    #[test]
    fn negative_sigma_is_rejected() {
        let src = RasterBuffer::new(Canvas::new(2, 2).unwrap());
        assert!(gaussian_blur(&src, -1.0).is_err());
    }
}
