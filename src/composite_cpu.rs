pub type PremulRgba8 = [u8; 4];

/// Source-over for premultiplied pixels with an extra global opacity.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = sa.saturating_add(mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

/// Straight-alpha color channels of a premultiplied pixel. Fully
/// transparent pixels read as black.
pub fn straight_rgb(px: PremulRgba8) -> [u8; 3] {
    let a = u16::from(px[3]);
    match a {
        0 => [0, 0, 0],
        255 => [px[0], px[1], px[2]],
        _ => {
            let un = |c: u8| ((u16::from(c) * 255 + a / 2) / a).min(255) as u8;
            [un(px[0]), un(px[1]), un(px[2])]
        }
    }
}

/// Heat-map encoding of a mean channel difference `v`: strong differences
/// trend red, weak ones blue. Always opaque.
///
/// Channels are clamped to `[0, 255]` and rounded half to even.
pub fn diff_heat(v: f32) -> PremulRgba8 {
    let v = v.max(0.0);
    let r = quantize(v * 1.5);
    let g = quantize(v);
    let b = quantize(255.0 - v.min(255.0));
    [r, g, b, 255]
}

fn quantize(x: f32) -> u8 {
    x.clamp(0.0, 255.0).round_ties_even() as u8
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}
