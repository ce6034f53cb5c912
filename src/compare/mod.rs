//! Reference-image comparison: pixel diff, structural similarity, and
//! diff-region extraction.

mod visualize;

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CvrError, Result};

pub use visualize::{render_diff, DiffStyle};

/// Per-pixel normalized delta above this counts as changed.
const PIXEL_CHANGE_THRESHOLD: f32 = 0.1;

/// Connected components smaller than this many pixels are noise.
const MIN_REGION_PIXELS: usize = 100;

/// Region severity cutoffs by pixel count.
const MODERATE_REGION_PIXELS: usize = 1_000;
const MAJOR_REGION_PIXELS: usize = 10_000;

/// SSIM window edge and Gaussian sigma.
const SSIM_WINDOW: usize = 11;
const SSIM_SIGMA: f64 = 1.5;

pub const DEFAULT_PIXEL_THRESHOLD: f64 = 5.0;
pub const DEFAULT_SSIM_THRESHOLD: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareMethod {
    Pixel,
    Ssim,
    #[default]
    Hybrid,
}

/// Severity vocabulary for diff regions (distinct from issue severities).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffSeverity {
    Minor,
    Moderate,
    Major,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub pixel_count: usize,
    pub severity: DiffSeverity,
}

/// Rectangular mask excluded from the diff; px, or 0-1 normalized when all
/// coordinates fall inside the unit square.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IgnoreRegion {
    pub x: f32,
    pub y: f32,
    #[serde(alias = "w")]
    pub width: f32,
    #[serde(alias = "h")]
    pub height: f32,
}

#[derive(Debug, Clone)]
pub struct CompareParams {
    pub method: CompareMethod,
    pub pixel_threshold: f64,
    pub ssim_threshold: f64,
    pub ignore_regions: Vec<IgnoreRegion>,
}

impl Default for CompareParams {
    fn default() -> Self {
        Self {
            method: CompareMethod::Hybrid,
            pixel_threshold: DEFAULT_PIXEL_THRESHOLD,
            ssim_threshold: DEFAULT_SSIM_THRESHOLD,
            ignore_regions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub method: CompareMethod,
    pub pixel_diff_percent: f64,
    pub ssim_score: f64,
    pub pixel_threshold: f64,
    pub ssim_threshold: f64,
    pub size_mismatch: bool,
    pub diff_regions: Vec<DiffRegion>,
    #[serde(rename = "match")]
    pub is_match: bool,
}

/// Raw per-pixel diff data kept for visualization.
pub struct DiffData {
    pub width: u32,
    pub height: u32,
    pub changed: Vec<bool>,
    pub delta: Vec<f32>,
    /// Current image after any resize-to-reference.
    pub current: DynamicImage,
}

pub fn load_reference(path: &Path) -> Result<DynamicImage> {
    if !path.exists() {
        return Err(CvrError::ReferenceNotFound(path.display().to_string()));
    }
    image::open(path).map_err(|e| CvrError::ReferenceUnreadable {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

pub fn compare_images(
    reference: &DynamicImage,
    current: &DynamicImage,
    params: &CompareParams,
) -> (ComparisonResult, DiffData) {
    let (ref_w, ref_h) = reference.dimensions();
    let size_mismatch = current.dimensions() != (ref_w, ref_h);
    let current = if size_mismatch {
        current.resize_exact(ref_w, ref_h, FilterType::Lanczos3)
    } else {
        current.clone()
    };

    let mut ref_rgba = reference.to_rgba8();
    let mut cur_rgba = current.to_rgba8();
    apply_ignore_regions(&mut ref_rgba, &params.ignore_regions);
    apply_ignore_regions(&mut cur_rgba, &params.ignore_regions);

    let total = (ref_w as usize) * (ref_h as usize);
    let mut changed = vec![false; total];
    let mut delta = vec![0.0f32; total];
    let mut changed_count = 0usize;

    for y in 0..ref_h {
        for x in 0..ref_w {
            let a = ref_rgba.get_pixel(x, y).0;
            let b = cur_rgba.get_pixel(x, y).0;
            let d = ((a[0] as i32 - b[0] as i32).abs()
                + (a[1] as i32 - b[1] as i32).abs()
                + (a[2] as i32 - b[2] as i32).abs()) as f32
                / 765.0;
            let idx = (y as usize) * ref_w as usize + x as usize;
            delta[idx] = d;
            if d > PIXEL_CHANGE_THRESHOLD {
                changed[idx] = true;
                changed_count += 1;
            }
        }
    }

    let pixel_diff_percent = if total == 0 {
        0.0
    } else {
        changed_count as f64 / total as f64 * 100.0
    };

    let ssim_score = ssim(
        &luminance(&ref_rgba),
        &luminance(&cur_rgba),
        ref_w as usize,
        ref_h as usize,
    );

    let diff_regions = extract_regions(&changed, ref_w as usize, ref_h as usize);

    let pixel_ok = pixel_diff_percent <= params.pixel_threshold;
    let ssim_ok = ssim_score >= params.ssim_threshold;
    let is_match = match params.method {
        CompareMethod::Pixel => pixel_ok,
        CompareMethod::Ssim => ssim_ok,
        CompareMethod::Hybrid => pixel_ok && ssim_ok,
    };

    let result = ComparisonResult {
        method: params.method,
        pixel_diff_percent,
        ssim_score,
        pixel_threshold: params.pixel_threshold,
        ssim_threshold: params.ssim_threshold,
        size_mismatch,
        diff_regions,
        is_match,
    };
    let data = DiffData {
        width: ref_w,
        height: ref_h,
        changed,
        delta,
        current: DynamicImage::ImageRgba8(cur_rgba),
    };
    (result, data)
}

fn apply_ignore_regions(img: &mut image::RgbaImage, regions: &[IgnoreRegion]) {
    let (img_w, img_h) = img.dimensions();
    for region in regions {
        if region.width <= 0.0 || region.height <= 0.0 {
            continue;
        }
        let normalized = region.x >= 0.0
            && region.y >= 0.0
            && region.x <= 1.0
            && region.y <= 1.0
            && region.width <= 1.0
            && region.height <= 1.0;
        let (rx, ry, rw, rh) = if normalized {
            (
                region.x * img_w as f32,
                region.y * img_h as f32,
                region.width * img_w as f32,
                region.height * img_h as f32,
            )
        } else {
            (region.x, region.y, region.width, region.height)
        };

        let x0 = (rx.max(0.0).floor() as u32).min(img_w);
        let y0 = (ry.max(0.0).floor() as u32).min(img_h);
        let x1 = ((rx + rw).ceil().max(0.0) as u32).min(img_w);
        let y1 = ((ry + rh).ceil().max(0.0) as u32).min(img_h);

        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, image::Rgba([0, 0, 0, 255]));
            }
        }
    }
}

fn luminance(img: &image::RgbaImage) -> Vec<f64> {
    img.pixels()
        .map(|p| 0.299 * p.0[0] as f64 + 0.587 * p.0[1] as f64 + 0.114 * p.0[2] as f64)
        .collect()
}

/// Mean SSIM over 11x11 Gaussian-weighted windows on the luminance channel.
/// Images smaller than one window fall back to a single global window.
fn ssim(a: &[f64], b: &[f64], width: usize, height: usize) -> f64 {
    if width == 0 || height == 0 || a.is_empty() {
        return 1.0;
    }
    if width < SSIM_WINDOW || height < SSIM_WINDOW {
        return global_ssim(a, b);
    }

    let kernel = gaussian_kernel();
    let half = SSIM_WINDOW / 2;
    let c1 = (0.01f64 * 255.0).powi(2);
    let c2 = (0.03f64 * 255.0).powi(2);

    let mut sum = 0.0f64;
    let mut windows = 0usize;

    for cy in half..(height - half) {
        for cx in half..(width - half) {
            let mut mu_x = 0.0;
            let mut mu_y = 0.0;
            for ky in 0..SSIM_WINDOW {
                for kx in 0..SSIM_WINDOW {
                    let w = kernel[ky * SSIM_WINDOW + kx];
                    let idx = (cy + ky - half) * width + (cx + kx - half);
                    mu_x += w * a[idx];
                    mu_y += w * b[idx];
                }
            }
            let mut sigma_x = 0.0;
            let mut sigma_y = 0.0;
            let mut sigma_xy = 0.0;
            for ky in 0..SSIM_WINDOW {
                for kx in 0..SSIM_WINDOW {
                    let w = kernel[ky * SSIM_WINDOW + kx];
                    let idx = (cy + ky - half) * width + (cx + kx - half);
                    let dx = a[idx] - mu_x;
                    let dy = b[idx] - mu_y;
                    sigma_x += w * dx * dx;
                    sigma_y += w * dy * dy;
                    sigma_xy += w * dx * dy;
                }
            }

            let numerator = (2.0 * mu_x * mu_y + c1) * (2.0 * sigma_xy + c2);
            let denominator =
                (mu_x * mu_x + mu_y * mu_y + c1) * (sigma_x + sigma_y + c2);
            sum += numerator / denominator;
            windows += 1;
        }
    }

    if windows == 0 {
        1.0
    } else {
        (sum / windows as f64).clamp(0.0, 1.0)
    }
}

fn global_ssim(a: &[f64], b: &[f64]) -> f64 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 1.0;
    }
    let n = len as f64;
    let mu_x: f64 = a[..len].iter().sum::<f64>() / n;
    let mu_y: f64 = b[..len].iter().sum::<f64>() / n;
    let mut sigma_x = 0.0;
    let mut sigma_y = 0.0;
    let mut sigma_xy = 0.0;
    for i in 0..len {
        let dx = a[i] - mu_x;
        let dy = b[i] - mu_y;
        sigma_x += dx * dx;
        sigma_y += dy * dy;
        sigma_xy += dx * dy;
    }
    sigma_x /= n;
    sigma_y /= n;
    sigma_xy /= n;

    let c1 = (0.01f64 * 255.0).powi(2);
    let c2 = (0.03f64 * 255.0).powi(2);
    let numerator = (2.0 * mu_x * mu_y + c1) * (2.0 * sigma_xy + c2);
    let denominator = (mu_x * mu_x + mu_y * mu_y + c1) * (sigma_x + sigma_y + c2);
    if denominator.abs() < f64::EPSILON {
        return 1.0;
    }
    (numerator / denominator).clamp(0.0, 1.0)
}

fn gaussian_kernel() -> Vec<f64> {
    let half = (SSIM_WINDOW / 2) as f64;
    let mut kernel = Vec::with_capacity(SSIM_WINDOW * SSIM_WINDOW);
    let mut sum = 0.0;
    for y in 0..SSIM_WINDOW {
        for x in 0..SSIM_WINDOW {
            let dx = x as f64 - half;
            let dy = y as f64 - half;
            let v = (-(dx * dx + dy * dy) / (2.0 * SSIM_SIGMA * SSIM_SIGMA)).exp();
            kernel.push(v);
            sum += v;
        }
    }
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// 4-connectivity connected components over the change mask, dropping
/// components below the noise floor. Regions come back ordered by their
/// top-left corner.
fn extract_regions(changed: &[bool], width: usize, height: usize) -> Vec<DiffRegion> {
    let mut visited = vec![false; changed.len()];
    let mut regions = Vec::new();
    let mut queue = std::collections::VecDeque::new();

    for start in 0..changed.len() {
        if !changed[start] || visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);

        let mut min_x = usize::MAX;
        let mut min_y = usize::MAX;
        let mut max_x = 0usize;
        let mut max_y = 0usize;
        let mut count = 0usize;

        while let Some(idx) = queue.pop_front() {
            let x = idx % width;
            let y = idx / width;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
            count += 1;

            if x > 0 {
                push_neighbor(idx - 1, changed, &mut visited, &mut queue);
            }
            if x + 1 < width {
                push_neighbor(idx + 1, changed, &mut visited, &mut queue);
            }
            if y > 0 {
                push_neighbor(idx - width, changed, &mut visited, &mut queue);
            }
            if y + 1 < height {
                push_neighbor(idx + width, changed, &mut visited, &mut queue);
            }
        }

        if count < MIN_REGION_PIXELS {
            continue;
        }

        let severity = if count > MAJOR_REGION_PIXELS {
            DiffSeverity::Major
        } else if count > MODERATE_REGION_PIXELS {
            DiffSeverity::Moderate
        } else {
            DiffSeverity::Minor
        };

        regions.push(DiffRegion {
            x: min_x as u32,
            y: min_y as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
            pixel_count: count,
            severity,
        });
    }

    regions.sort_by_key(|r| (r.y, r.x));
    regions
}

fn push_neighbor(
    idx: usize,
    changed: &[bool],
    visited: &mut [bool],
    queue: &mut std::collections::VecDeque<usize>,
) {
    if changed[idx] && !visited[idx] {
        visited[idx] = true;
        queue.push_back(idx);
    }
}
