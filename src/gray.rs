use crate::{NowcastError, NowcastResult, composite_cpu::straight_rgb, raster::RasterBuffer};

/// Single-channel luminance, one byte per pixel. Dimensions are tracked by
/// the caller.
pub type GrayscaleBuffer = Vec<u8>;

/// Rec. 601 luma, truncated: `floor(0.299 R + 0.587 G + 0.114 B)`.
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    // Fixed-point in thousandths keeps the floor exact for white.
    let y = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    (y / 1000).min(255) as u8
}

/// Luma of every pixel, computed on straight-alpha colors.
pub fn to_gray(raster: &RasterBuffer) -> NowcastResult<GrayscaleBuffer> {
    let expected = raster.width as usize * raster.height as usize * 4;
    if raster.data.len() != expected {
        return Err(NowcastError::validation(
            "to_gray expects a raster matching width*height*4",
        ));
    }
    Ok(raster
        .data
        .chunks_exact(4)
        .map(|px| {
            let [r, g, b] = straight_rgb([px[0], px[1], px[2], px[3]]);
            luma(r, g, b)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Canvas;

    #[test]
    fn luma_weights_and_truncation() {
        assert_eq!(luma(255, 255, 255), 255);
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 0, 0), 76);
        assert_eq!(luma(0, 255, 0), 149);
        assert_eq!(luma(0, 0, 255), 29);
    }

    #[test]
    fn gray_has_one_sample_per_pixel() {
        let mut raster = RasterBuffer::new(Canvas::new(3, 2).unwrap());
        raster.fill([10, 200, 30, 255]);
        let gray = to_gray(&raster).unwrap();
        assert_eq!(gray.len(), 6);
        assert!(gray.iter().all(|&g| g == luma(10, 200, 30)));
    }

    #[test]
    fn translucent_pixels_keep_their_color_luma() {
        let mut raster = RasterBuffer::new(Canvas::new(2, 2).unwrap());
        // (200, 100, 50) at alpha 128, premultiplied
        raster.fill([100, 50, 25, 128]);
        let gray = to_gray(&raster).unwrap();
        let expected = i32::from(luma(200, 100, 50));
        assert!(gray.iter().all(|&g| (i32::from(g) - expected).abs() <= 1));
    }

    #[test]
    fn transparent_pixels_are_black() {
        let raster = RasterBuffer::new(Canvas::new(2, 1).unwrap());
        assert_eq!(to_gray(&raster).unwrap(), vec![0, 0]);
    }

    #[test]
    fn gray_rejects_mismatched_buffer() {
        let raster = RasterBuffer {
            width: 2,
            height: 2,
            data: vec![0; 3],
        };
        assert!(to_gray(&raster).is_err());
    }
}
