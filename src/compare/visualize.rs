//! Diff visualizations: overlay, side-by-side, heatmap.

use image::{DynamicImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::annotate::font;
use crate::error::{CvrError, Result};

use super::{DiffData, DiffRegion};

const OVERLAY_FILL: [u8; 4] = [220, 53, 69, 90];
const OVERLAY_BORDER: [u8; 4] = [220, 53, 69, 255];
const LABEL_BAR_HEIGHT: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStyle {
    #[default]
    Overlay,
    Sidebyside,
    Heatmap,
}

/// Render the requested visualization to `output_path`.
pub fn render_diff(
    reference: &DynamicImage,
    data: &DiffData,
    regions: &[DiffRegion],
    style: DiffStyle,
    output_path: &Path,
) -> Result<()> {
    let img = match style {
        DiffStyle::Overlay => render_overlay(&data.current, regions),
        DiffStyle::Sidebyside => render_side_by_side(reference, data),
        DiffStyle::Heatmap => render_heatmap(data),
    };
    img.save(output_path).map_err(|e| {
        CvrError::artifact_write(output_path.display().to_string(), e.to_string())
    })?;
    Ok(())
}

/// Current screenshot with each diff region stamped in translucent red.
fn render_overlay(current: &DynamicImage, regions: &[DiffRegion]) -> RgbaImage {
    let mut canvas = current.to_rgba8();
    let (cw, ch) = canvas.dimensions();
    for region in regions {
        let x1 = (region.x + region.width).min(cw);
        let y1 = (region.y + region.height).min(ch);
        for y in region.y..y1 {
            for x in region.x..x1 {
                let px = canvas.get_pixel(x, y).0;
                canvas.put_pixel(x, y, Rgba(blend(px, OVERLAY_FILL)));
            }
        }
        // 2px border.
        for t in 0..2u32 {
            for x in region.x.saturating_sub(t)..(x1 + t).min(cw) {
                put(&mut canvas, x, region.y.saturating_sub(t), OVERLAY_BORDER);
                put(&mut canvas, x, (y1 + t).min(ch - 1), OVERLAY_BORDER);
            }
            for y in region.y.saturating_sub(t)..(y1 + t).min(ch) {
                put(&mut canvas, region.x.saturating_sub(t), y, OVERLAY_BORDER);
                put(&mut canvas, (x1 + t).min(cw - 1), y, OVERLAY_BORDER);
            }
        }
    }
    canvas
}

/// `reference | change mask | current`, each with a label bar on top.
fn render_side_by_side(reference: &DynamicImage, data: &DiffData) -> RgbaImage {
    let (w, h) = (data.width, data.height);
    let ref_rgba = reference.to_rgba8();
    let cur_rgba = data.current.to_rgba8();

    let mut mask = RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]));
    for y in 0..h {
        for x in 0..w {
            if data.changed[(y as usize) * w as usize + x as usize] {
                mask.put_pixel(x, y, Rgba([220, 53, 69, 255]));
            }
        }
    }

    let total_w = w * 3;
    let total_h = h + LABEL_BAR_HEIGHT;
    let mut canvas = RgbaImage::from_pixel(total_w, total_h, Rgba([33, 37, 41, 255]));

    for (slot, (img, label)) in [
        (&ref_rgba, "REFERENCE"),
        (&mask, "DIFF"),
        (&cur_rgba, "CURRENT"),
    ]
    .iter()
    .enumerate()
    {
        let offset_x = slot as u32 * w;
        image::imageops::overlay(
            &mut canvas,
            *img,
            offset_x as i64,
            LABEL_BAR_HEIGHT as i64,
        );
        let tw = font::text_width(label, 2);
        let tx = offset_x + (w.saturating_sub(tw)) / 2;
        font::draw_text(
            &mut canvas,
            tx as i64,
            ((LABEL_BAR_HEIGHT - font::text_height(2)) / 2) as i64,
            label,
            2,
            Rgba([248, 249, 250, 255]),
            false,
        );
    }

    canvas
}

/// Normalized per-pixel delta on a blue (unchanged) to red (max delta) ramp.
fn render_heatmap(data: &DiffData) -> RgbaImage {
    let (w, h) = (data.width, data.height);
    let mut canvas = RgbaImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let d = data.delta[(y as usize) * w as usize + x as usize].clamp(0.0, 1.0);
            canvas.put_pixel(x, y, Rgba(heat_color(d)));
        }
    }
    canvas
}

fn heat_color(t: f32) -> [u8; 4] {
    // Blue -> cyan -> yellow -> red.
    let (r, g, b) = if t < 0.33 {
        let k = t / 0.33;
        (0.0, k, 1.0)
    } else if t < 0.66 {
        let k = (t - 0.33) / 0.33;
        (k, 1.0, 1.0 - k)
    } else {
        let k = (t - 0.66) / 0.34;
        (1.0, 1.0 - k, 0.0)
    };
    [
        (r * 255.0) as u8,
        (g * 255.0) as u8,
        (b * 255.0) as u8,
        255,
    ]
}

fn blend(base: [u8; 4], over: [u8; 4]) -> [u8; 4] {
    let a = over[3] as f32 / 255.0;
    [
        (over[0] as f32 * a + base[0] as f32 * (1.0 - a)) as u8,
        (over[1] as f32 * a + base[1] as f32 * (1.0 - a)) as u8,
        (over[2] as f32 * a + base[2] as f32 * (1.0 - a)) as u8,
        255,
    ]
}

fn put(canvas: &mut RgbaImage, x: u32, y: u32, color: [u8; 4]) {
    if x < canvas.width() && y < canvas.height() {
        canvas.put_pixel(x, y, Rgba(color));
    }
}
