//! CSS color parsing and WCAG contrast math.
//!
//! Colors are carried as `[r, g, b, a]` channel arrays in 0.0-1.0 space.
//! Contrast ratios follow the WCAG 2.x relative-luminance definition; the
//! piecewise sRGB decoding constants below are normative.

use image::{DynamicImage, GenericImageView};

use crate::types::BoundingBox;

/// Rec. 709 luma weights used by the WCAG luminance formula.
const LUMA_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Parse a CSS color value.
///
/// Accepts `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, and the `rgb()` /
/// `rgba()` functional forms (comma-, space-, and slash-separated).
/// Returns `None` for `transparent`, named colors, and anything malformed.
pub fn parse_css_color(value: &str) -> Option<[f32; 4]> {
    let v = value.trim();
    if v.eq_ignore_ascii_case("transparent") {
        return None;
    }
    if let Some(hex) = v.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = v.to_ascii_lowercase();
    lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
        .and_then(parse_rgb_args)
}

fn parse_hex(hex: &str) -> Option<[f32; 4]> {
    let nibbles: Vec<u8> = hex
        .chars()
        .map(|c| c.to_digit(16).map(|d| d as u8))
        .collect::<Option<_>>()?;
    let bytes: Vec<u8> = match nibbles.len() {
        // Shorthand forms duplicate each nibble: #fa0 -> #ffaa00.
        3 | 4 => nibbles.iter().map(|n| n * 16 + n).collect(),
        6 | 8 => nibbles.chunks(2).map(|pair| pair[0] * 16 + pair[1]).collect(),
        _ => return None,
    };
    let alpha = bytes.get(3).copied().unwrap_or(255);
    Some([
        bytes[0] as f32 / 255.0,
        bytes[1] as f32 / 255.0,
        bytes[2] as f32 / 255.0,
        alpha as f32 / 255.0,
    ])
}

fn parse_rgb_args(args: &str) -> Option<[f32; 4]> {
    let mut parts = args
        .split(|c: char| c == ',' || c == '/' || c.is_ascii_whitespace())
        .filter(|part| !part.is_empty());

    let mut rgb = [0.0f32; 3];
    for slot in rgb.iter_mut() {
        let channel: f32 = parts.next()?.trim().parse().ok()?;
        *slot = (channel / 255.0).clamp(0.0, 1.0);
    }
    // Alpha is already on the 0-1 scale.
    let alpha = match parts.next() {
        Some(raw) => raw.trim().parse::<f32>().ok()?.clamp(0.0, 1.0),
        None => 1.0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some([rgb[0], rgb[1], rgb[2], alpha])
}

/// WCAG contrast ratio between two opaque colors, in [1, 21].
pub fn contrast_ratio(a: [f32; 3], b: [f32; 3]) -> f32 {
    let la = relative_luminance(a);
    let lb = relative_luminance(b);
    (la.max(lb) + 0.05) / (la.min(lb) + 0.05)
}

pub fn relative_luminance(rgb: [f32; 3]) -> f32 {
    rgb.iter()
        .zip(LUMA_WEIGHTS)
        .map(|(&channel, weight)| weight * srgb_to_linear(channel.clamp(0.0, 1.0)))
        .sum()
}

/// Piecewise sRGB decoding per the WCAG definition.
fn srgb_to_linear(channel: f32) -> f32 {
    if channel <= 0.03928 {
        channel / 12.92
    } else {
        ((channel + 0.055) / 1.055).powf(2.4)
    }
}

/// Composite a partially transparent foreground over an opaque background.
pub fn blend_over_background(fg: [f32; 3], bg: [f32; 3], alpha: f32) -> [f32; 3] {
    let a = alpha.clamp(0.0, 1.0);
    std::array::from_fn(|i| fg[i].mul_add(a, bg[i] * (1.0 - a)))
}

pub fn rgb_to_hex(rgb: [f32; 3]) -> String {
    format!(
        "#{:02X}{:02X}{:02X}",
        (rgb[0].clamp(0.0, 1.0) * 255.0).round() as u8,
        (rgb[1].clamp(0.0, 1.0) * 255.0).round() as u8,
        (rgb[2].clamp(0.0, 1.0) * 255.0).round() as u8,
    )
}

/// Average color over a bounding box in a screenshot, sampled on a sparse grid.
///
/// Returns `None` when the box falls entirely outside the image.
pub fn sample_background_color(img: &DynamicImage, bbox: &BoundingBox) -> Option<[f32; 3]> {
    let (img_w, img_h) = img.dimensions();
    if img_w == 0 || img_h == 0 {
        return None;
    }

    let x0 = bbox.x.max(0.0).floor() as u32;
    let y0 = bbox.y.max(0.0).floor() as u32;
    let x1 = ((bbox.x + bbox.width).ceil().max(0.0) as u32).min(img_w);
    let y1 = ((bbox.y + bbox.height).ceil().max(0.0) as u32).min(img_h);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    let w = x1 - x0;
    let h = y1 - y0;
    let step_x = (w / 12).max(1);
    let step_y = (h / 12).max(1);

    let mut accum = [0u64; 3];
    let mut count = 0u64;
    for y in (y0..y1).step_by(step_y as usize) {
        for x in (x0..x1).step_by(step_x as usize) {
            let pixel = img.get_pixel(x, y).0;
            accum[0] += pixel[0] as u64;
            accum[1] += pixel[1] as u64;
            accum[2] += pixel[2] as u64;
            count += 1;
        }
    }

    if count == 0 {
        None
    } else {
        Some([
            accum[0] as f32 / count as f32 / 255.0,
            accum[1] as f32 / count as f32 / 255.0,
            accum[2] as f32 / count as f32 / 255.0,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_forms() {
        assert_eq!(parse_css_color("#fff"), Some([1.0, 1.0, 1.0, 1.0]));
        let c = parse_css_color("#DC3545").unwrap();
        assert!((c[0] - 220.0 / 255.0).abs() < 1e-6);
        assert!((c[1] - 53.0 / 255.0).abs() < 1e-6);
        assert!((c[2] - 69.0 / 255.0).abs() < 1e-6);
        let with_alpha = parse_css_color("#00000080").unwrap();
        assert!((with_alpha[3] - 128.0 / 255.0).abs() < 1e-3);
    }

    #[test]
    fn parses_shorthand_hex_with_alpha() {
        let c = parse_css_color("#f008").unwrap();
        assert_eq!(c[0], 1.0);
        assert_eq!(c[1], 0.0);
        assert!((c[3] - 136.0 / 255.0).abs() < 1e-3);
    }

    #[test]
    fn parses_rgb_functions() {
        assert_eq!(
            parse_css_color("rgb(255, 0, 0)"),
            Some([1.0, 0.0, 0.0, 1.0])
        );
        let c = parse_css_color("rgba(0, 0, 0, 0.5)").unwrap();
        assert!((c[3] - 0.5).abs() < 1e-6);
        // Modern space/slash syntax.
        let modern = parse_css_color("rgb(255 128 0 / 0.25)").unwrap();
        assert!((modern[1] - 128.0 / 255.0).abs() < 1e-6);
        assert!((modern[3] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn transparent_and_garbage_return_none() {
        assert_eq!(parse_css_color("transparent"), None);
        assert_eq!(parse_css_color("cornflowerblue"), None);
        assert_eq!(parse_css_color("#12"), None);
        assert_eq!(parse_css_color("rgb(1, 2)"), None);
        assert_eq!(parse_css_color("rgb(1, 2, 3, 4, 5)"), None);
    }

    #[test]
    fn black_on_white_is_21_to_1() {
        let ratio = contrast_ratio([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        assert!((ratio - 21.0).abs() < 0.01);
    }

    #[test]
    fn contrast_is_symmetric() {
        let a = [0.2, 0.4, 0.6];
        let b = [0.9, 0.9, 0.9];
        assert!((contrast_ratio(a, b) - contrast_ratio(b, a)).abs() < 1e-6);
    }

    #[test]
    fn light_gray_on_white_fails_aa() {
        // #ccc on #fff is about 1.6:1; #bbb about 1.9:1. Both sit far below
        // the 4.5:1 AA requirement.
        let light = [204.0 / 255.0; 3];
        let ratio = contrast_ratio(light, [1.0, 1.0, 1.0]);
        assert!(ratio > 1.5 && ratio < 1.7, "got {ratio}");

        let darker = [187.0 / 255.0; 3];
        let ratio = contrast_ratio(darker, [1.0, 1.0, 1.0]);
        assert!(ratio > 1.8 && ratio < 2.0, "got {ratio}");
    }

    #[test]
    fn blending_interpolates_linearly() {
        let mid = blend_over_background([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], 0.5);
        assert!((mid[0] - 0.5).abs() < 1e-6);
        assert!((mid[2] - 0.5).abs() < 1e-6);

        let opaque = blend_over_background([0.3, 0.6, 0.9], [0.0, 0.0, 0.0], 1.0);
        assert_eq!(opaque, [0.3, 0.6, 0.9]);
    }

    #[test]
    fn sampling_averages_the_region() {
        let img = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            40,
            40,
            image::Rgba([10, 20, 30, 255]),
        ));
        let bbox = BoundingBox {
            x: 5.0,
            y: 5.0,
            width: 20.0,
            height: 20.0,
        };
        let c = sample_background_color(&img, &bbox).unwrap();
        assert!((c[0] - 10.0 / 255.0).abs() < 1e-3);
        assert!((c[1] - 20.0 / 255.0).abs() < 1e-3);
        assert!((c[2] - 30.0 / 255.0).abs() < 1e-3);
    }

    #[test]
    fn sampling_outside_image_returns_none() {
        let img = DynamicImage::ImageRgba8(image::RgbaImage::new(10, 10));
        let bbox = BoundingBox {
            x: 50.0,
            y: 50.0,
            width: 5.0,
            height: 5.0,
        };
        assert!(sample_background_color(&img, &bbox).is_none());
    }
}
