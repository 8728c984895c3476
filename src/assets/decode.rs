use std::{io::Cursor, sync::Arc};

use anyhow::Context;

use crate::{NowcastError, NowcastResult, assets::DecodedFrame, composite_cpu::straight_rgb};

pub fn decode_image(bytes: &[u8]) -> NowcastResult<DecodedFrame> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| NowcastError::decode(format!("decode image from memory: {e}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(NowcastError::decode("image has zero width or height"));
    }

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(DecodedFrame {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

/// Encode a premultiplied RGBA8 buffer as PNG bytes (straight alpha on disk).
pub fn encode_png(rgba8_premul: &[u8], width: u32, height: u32) -> NowcastResult<Vec<u8>> {
    let mut straight = rgba8_premul.to_vec();
    unpremultiply_rgba8_in_place(&mut straight);
    let img = image::RgbaImage::from_raw(width, height, straight)
        .ok_or_else(|| NowcastError::validation("png encode expects width*height*4 bytes"))?;

    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .context("encode png")?;
    Ok(buf)
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let rgb = straight_rgb([px[0], px[1], px[2], px[3]]);
        px[..3].copy_from_slice(&rgb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_raw(w, h, px.repeat((w * h) as usize)).unwrap();
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn decode_image_png_dimensions_and_premul() {
        let decoded = decode_image(&png_bytes(1, 1, [100, 50, 200, 128])).unwrap();
        assert_eq!(decoded.width, 1);
        assert_eq!(decoded.height, 1);
        assert_eq!(
            decoded.rgba8_premul.as_slice(),
            &[
                ((100u16 * 128 + 127) / 255) as u8,
                ((50u16 * 128 + 127) / 255) as u8,
                ((200u16 * 128 + 127) / 255) as u8,
                128u8
            ]
        );
    }

    #[test]
    fn decode_garbage_is_decode_error() {
        let err = decode_image(b"not an image").unwrap_err();
        assert!(matches!(err, NowcastError::Decode(_)));
    }

    #[test]
    fn opaque_png_survives_encode_decode() {
        let src = png_bytes(3, 2, [10, 20, 30, 255]);
        let decoded = decode_image(&src).unwrap();
        let encoded = encode_png(&decoded.rgba8_premul, 3, 2).unwrap();
        let again = decode_image(&encoded).unwrap();
        assert_eq!(again, decoded);
    }
}
