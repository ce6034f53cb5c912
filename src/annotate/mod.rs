//! Screenshot annotation: numbered severity markers plus a legend.
//!
//! The annotated image is the original screenshot with a circled number on
//! each issue's element, a border hugging its bounding box, and a legend
//! strip appended below mapping numbers to descriptions and selectors.

pub(crate) mod font;

use image::{DynamicImage, Rgba, RgbaImage};
use std::path::Path;

use crate::budget::{truncate_chars, LEGEND_DESCRIPTION_CHARS};
use crate::color::{contrast_ratio, sample_background_color};
use crate::error::{CvrError, Result};
use crate::types::{BoundingBox, Issue, Severity};

use font::put_pixel_clipped;

/// Marker geometry.
const MARKER_DIAMETER: u32 = 32;
const MARKER_RADIUS: i64 = (MARKER_DIAMETER / 2) as i64;
const MARKER_BORDER: i64 = 2;
const EDGE_MARGIN: i64 = 5;
const ELEMENT_BORDER: i64 = 3;
/// Overlapping badges step right and down by this much.
const STACK_OFFSET: i64 = 20;

/// Legend geometry.
const LEGEND_PADDING: u32 = 20;
const LEGEND_LINE_HEIGHT: u32 = 28;
const LEGEND_SEPARATOR: u32 = 2;
const LEGEND_INDENT: u32 = 24;

/// Severity colors: blocking red, major orange, minor yellow.
const COLOR_BLOCKING: [u8; 3] = [0xDC, 0x35, 0x45];
const COLOR_MAJOR: [u8; 3] = [0xFF, 0x91, 0x00];
const COLOR_MINOR: [u8; 3] = [0xFF, 0xC1, 0x07];
const COLOR_FALLBACK: [u8; 3] = [0x00, 0x00, 0x00];

const LEGEND_BG: [u8; 3] = [0xF8, 0xF9, 0xFA];
const LEGEND_SEPARATOR_COLOR: [u8; 3] = [0xDE, 0xE2, 0xE6];
const LEGEND_TEXT: [u8; 3] = [0x21, 0x25, 0x29];
const LEGEND_SELECTOR_TEXT: [u8; 3] = [0x6C, 0x75, 0x7D];

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Red-vs-background contrast below this substitutes black markers.
const FALLBACK_CONTRAST: f32 = 3.0;

/// What the annotator drew; returned for reporting and tests.
#[derive(Debug, Clone)]
pub struct AnnotationSummary {
    pub markers: usize,
    pub legend_entries: usize,
    /// Final marker color per drawn marker, in issue order.
    pub marker_colors: Vec<[u8; 3]>,
}

pub fn severity_color(severity: Severity) -> [u8; 3] {
    match severity {
        Severity::Blocking => COLOR_BLOCKING,
        Severity::Major => COLOR_MAJOR,
        Severity::Minor => COLOR_MINOR,
    }
}

/// Annotate `screenshot_path` with the given issues and write the result
/// to `output_path`.
pub fn annotate_screenshot(
    screenshot_path: &Path,
    issues: &[Issue],
    output_path: &Path,
) -> Result<AnnotationSummary> {
    let screenshot = image::open(screenshot_path)
        .map_err(|e| CvrError::Annotation(format!("cannot read screenshot: {e}")))?;
    let annotated = render(&screenshot, issues)?;
    annotated
        .image
        .save(output_path)
        .map_err(|e| CvrError::Annotation(format!("cannot write annotated image: {e}")))?;
    Ok(annotated.summary)
}

struct Rendered {
    image: RgbaImage,
    summary: AnnotationSummary,
}

fn render(screenshot: &DynamicImage, issues: &[Issue]) -> Result<Rendered> {
    let source = screenshot.to_rgba8();
    let (width, height) = (source.width(), source.height());

    let legend_height = legend_height_for(issues.len());
    let mut canvas = RgbaImage::from_pixel(
        width,
        height + legend_height,
        Rgba([LEGEND_BG[0], LEGEND_BG[1], LEGEND_BG[2], 255]),
    );
    image::imageops::overlay(&mut canvas, &source, 0, 0);

    // Separator at the top of the legend strip.
    for dy in 0..LEGEND_SEPARATOR {
        for x in 0..width {
            canvas.put_pixel(
                x,
                height + dy,
                Rgba([
                    LEGEND_SEPARATOR_COLOR[0],
                    LEGEND_SEPARATOR_COLOR[1],
                    LEGEND_SEPARATOR_COLOR[2],
                    255,
                ]),
            );
        }
    }

    let mut placed_centers: Vec<(i64, i64)> = Vec::new();
    let mut marker_colors = Vec::new();
    let mut markers = 0usize;
    let sample_source = DynamicImage::ImageRgba8(source.clone());

    for issue in issues {
        let Some(bbox) = issue.bounding_box else {
            continue;
        };
        let color = marker_color_for(&sample_source, &bbox, issue.severity);
        marker_colors.push(color);

        draw_element_border(&mut canvas, &bbox, width, height, color);

        let center = place_marker(&bbox, width, height, &placed_centers);
        placed_centers.push(center);
        draw_marker(&mut canvas, center, color, issue.id);
        markers += 1;
    }

    draw_legend(&mut canvas, issues, height);

    Ok(Rendered {
        image: canvas,
        summary: AnnotationSummary {
            markers,
            legend_entries: issues.len(),
            marker_colors,
        },
    })
}

fn legend_height_for(entries: usize) -> u32 {
    LEGEND_SEPARATOR + 2 * LEGEND_PADDING + entries as u32 * 2 * LEGEND_LINE_HEIGHT
}

/// Severity color, or black when red would vanish against the element's
/// background. The probe color is always the blocking red so the fallback
/// behaves uniformly across severities on the same backdrop.
fn marker_color_for(screenshot: &DynamicImage, bbox: &BoundingBox, severity: Severity) -> [u8; 3] {
    let base = severity_color(severity);
    let Some(bg) = sample_background_color(screenshot, bbox) else {
        return base;
    };
    let red = [
        COLOR_BLOCKING[0] as f32 / 255.0,
        COLOR_BLOCKING[1] as f32 / 255.0,
        COLOR_BLOCKING[2] as f32 / 255.0,
    ];
    if contrast_ratio(red, bg) < FALLBACK_CONTRAST {
        COLOR_FALLBACK
    } else {
        base
    }
}

/// Top-right of the box, pushed out by the radius, clamped inside the
/// screenshot, then stacked clear of previously placed markers.
fn place_marker(
    bbox: &BoundingBox,
    width: u32,
    height: u32,
    placed: &[(i64, i64)],
) -> (i64, i64) {
    let mut cx = (bbox.x + bbox.width) as i64 + MARKER_RADIUS;
    let mut cy = bbox.y as i64 - MARKER_RADIUS;

    let clamp = |cx: i64, cy: i64| -> (i64, i64) {
        let min = MARKER_RADIUS + EDGE_MARGIN;
        let max_x = width as i64 - MARKER_RADIUS - EDGE_MARGIN;
        let max_y = height as i64 - MARKER_RADIUS - EDGE_MARGIN;
        (cx.clamp(min, max_x.max(min)), cy.clamp(min, max_y.max(min)))
    };

    (cx, cy) = clamp(cx, cy);

    let overlaps = |cx: i64, cy: i64, placed: &[(i64, i64)]| {
        placed.iter().any(|(px, py)| {
            let dx = cx - px;
            let dy = cy - py;
            dx * dx + dy * dy < (MARKER_DIAMETER as i64).pow(2)
        })
    };

    let mut guard = 0;
    while overlaps(cx, cy, placed) && guard < 64 {
        cx += STACK_OFFSET;
        cy += STACK_OFFSET;
        (cx, cy) = clamp(cx, cy);
        guard += 1;
        // Clamping can pin the marker in a corner; stop rather than loop.
        if guard > 0 && cx == width as i64 - MARKER_RADIUS - EDGE_MARGIN
            && cy == height as i64 - MARKER_RADIUS - EDGE_MARGIN
        {
            break;
        }
    }

    (cx, cy)
}

fn draw_marker(canvas: &mut RgbaImage, center: (i64, i64), color: [u8; 3], id: usize) {
    let fill = Rgba([color[0], color[1], color[2], 255]);
    let (cx, cy) = center;

    // White border ring first, fill on top.
    fill_circle(canvas, cx, cy, MARKER_RADIUS + MARKER_BORDER, WHITE);
    fill_circle(canvas, cx, cy, MARKER_RADIUS, fill);

    let label = if id > 20 {
        format!("({id})")
    } else {
        id.to_string()
    };
    let scale = 2;
    let tw = font::text_width(&label, scale) as i64;
    let th = font::text_height(scale) as i64;
    font::draw_text(canvas, cx - tw / 2, cy - th / 2, &label, scale, WHITE, true);
}

fn fill_circle(canvas: &mut RgbaImage, cx: i64, cy: i64, radius: i64, color: Rgba<u8>) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel_clipped(canvas, cx + dx, cy + dy, color);
            }
        }
    }
}

fn draw_element_border(
    canvas: &mut RgbaImage,
    bbox: &BoundingBox,
    width: u32,
    height: u32,
    color: [u8; 3],
) {
    let stroke = Rgba([color[0], color[1], color[2], 255]);
    let x0 = bbox.x as i64;
    let y0 = bbox.y as i64;
    let x1 = (bbox.x + bbox.width) as i64;
    let y1 = (bbox.y + bbox.height) as i64;

    for t in 0..ELEMENT_BORDER {
        // Horizontal edges.
        for x in (x0 - t)..=(x1 + t) {
            if x >= 0 && x < width as i64 {
                put_pixel_clipped(canvas, x, y0 - t, stroke);
                put_pixel_clipped(canvas, x, y1 + t, stroke);
            }
        }
        // Vertical edges.
        for y in (y0 - t)..=(y1 + t) {
            if y >= 0 && y < height as i64 {
                put_pixel_clipped(canvas, x0 - t, y, stroke);
                put_pixel_clipped(canvas, x1 + t, y, stroke);
            }
        }
    }
}

fn draw_legend(canvas: &mut RgbaImage, issues: &[Issue], screenshot_height: u32) {
    let text_color = Rgba([LEGEND_TEXT[0], LEGEND_TEXT[1], LEGEND_TEXT[2], 255]);
    let selector_color = Rgba([
        LEGEND_SELECTOR_TEXT[0],
        LEGEND_SELECTOR_TEXT[1],
        LEGEND_SELECTOR_TEXT[2],
        255,
    ]);
    let scale = 2;
    let text_h = font::text_height(scale) as i64;

    let top = (screenshot_height + LEGEND_SEPARATOR + LEGEND_PADDING) as i64;
    let left = LEGEND_PADDING as i64;

    for (index, issue) in issues.iter().enumerate() {
        let entry_top = top + (index as u32 * 2 * LEGEND_LINE_HEIGHT) as i64;
        let line1_y = entry_top + (LEGEND_LINE_HEIGHT as i64 - text_h) / 2;
        let line2_y = entry_top + LEGEND_LINE_HEIGHT as i64 + (LEGEND_LINE_HEIGHT as i64 - text_h) / 2;

        // Severity dot stands in for the emoji glyph.
        let dot = severity_color(issue.severity);
        fill_circle(
            canvas,
            left + 6,
            entry_top + LEGEND_LINE_HEIGHT as i64 / 2,
            6,
            Rgba([dot[0], dot[1], dot[2], 255]),
        );

        let description = truncate_chars(&issue.description, LEGEND_DESCRIPTION_CHARS);
        let line1 = format!("#{}: {description}", issue.id);
        font::draw_text(canvas, left + 20, line1_y, &line1, scale, text_color, false);

        let selector = issue.css_selector.as_deref().unwrap_or("(page)");
        let line2 = format!("\u{2192} {selector}");
        font::draw_text(
            canvas,
            left + LEGEND_INDENT as i64,
            line2_y,
            &line2,
            scale,
            selector_color,
            false,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn issue(id: usize, severity: Severity, bbox: Option<BoundingBox>) -> Issue {
        Issue {
            id,
            check_id: "color-contrast".into(),
            pillar: "Accessibility".into(),
            severity,
            element: bbox.map(|_| 0),
            css_selector: bbox.map(|_| "p.intro".to_string()),
            description: "Text contrast 1.6:1 is below the required 4.5:1".into(),
            recommendation: None,
            bounding_box: bbox,
            details: BTreeMap::new(),
        }
    }

    fn bbox(x: f32, y: f32, w: f32, h: f32) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width: w,
            height: h,
        }
    }

    fn white_screenshot(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])))
    }

    #[test]
    fn marker_count_matches_issues_with_boxes() {
        let screenshot = white_screenshot(400, 300);
        let issues = vec![
            issue(1, Severity::Major, Some(bbox(10.0, 10.0, 80.0, 24.0))),
            issue(2, Severity::Minor, None),
            issue(3, Severity::Blocking, Some(bbox(10.0, 120.0, 80.0, 24.0))),
        ];
        let rendered = render(&screenshot, &issues).unwrap();
        assert_eq!(rendered.summary.markers, 2);
        assert_eq!(rendered.summary.legend_entries, 3);
    }

    #[test]
    fn final_dimensions_append_legend() {
        let screenshot = white_screenshot(400, 300);
        let issues = vec![issue(1, Severity::Major, Some(bbox(10.0, 10.0, 80.0, 24.0)))];
        let rendered = render(&screenshot, &issues).unwrap();
        assert_eq!(rendered.image.width(), 400);
        assert_eq!(rendered.image.height(), 300 + legend_height_for(1));
    }

    #[test]
    fn zero_issues_leaves_screenshot_pixels_intact() {
        let screenshot = white_screenshot(64, 48);
        let rendered = render(&screenshot, &[]).unwrap();
        assert_eq!(rendered.image.height(), 48 + legend_height_for(0));
        let source = screenshot.to_rgba8();
        for y in 0..48 {
            for x in 0..64 {
                assert_eq!(rendered.image.get_pixel(x, y), source.get_pixel(x, y));
            }
        }
    }

    #[test]
    fn severity_colors_on_white_background() {
        let screenshot = white_screenshot(400, 300);
        let issues = vec![
            issue(1, Severity::Blocking, Some(bbox(10.0, 50.0, 60.0, 20.0))),
            issue(2, Severity::Major, Some(bbox(10.0, 120.0, 60.0, 20.0))),
            issue(3, Severity::Minor, Some(bbox(10.0, 190.0, 60.0, 20.0))),
        ];
        let rendered = render(&screenshot, &issues).unwrap();
        assert_eq!(
            rendered.summary.marker_colors,
            vec![COLOR_BLOCKING, COLOR_MAJOR, COLOR_MINOR]
        );
    }

    #[test]
    fn red_background_forces_black_markers() {
        let screenshot = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            400,
            300,
            Rgba([0xDC, 0x35, 0x45, 255]),
        ));
        let issues = vec![
            issue(1, Severity::Blocking, Some(bbox(10.0, 50.0, 60.0, 20.0))),
            issue(2, Severity::Minor, Some(bbox(10.0, 150.0, 60.0, 20.0))),
        ];
        let rendered = render(&screenshot, &issues).unwrap();
        assert_eq!(
            rendered.summary.marker_colors,
            vec![COLOR_FALLBACK, COLOR_FALLBACK]
        );
    }

    #[test]
    fn overlapping_markers_stack_deterministically() {
        let screenshot = white_screenshot(600, 400);
        let same_box = bbox(100.0, 100.0, 50.0, 20.0);
        let issues = vec![
            issue(1, Severity::Major, Some(same_box)),
            issue(2, Severity::Major, Some(same_box)),
        ];
        let a = render(&screenshot, &issues).unwrap();
        let b = render(&screenshot, &issues).unwrap();
        assert_eq!(a.image.as_raw(), b.image.as_raw());

        let first = place_marker(&same_box, 600, 400, &[]);
        let second = place_marker(&same_box, 600, 400, &[first]);
        // Stacked badges walk down-right in whole STACK_OFFSET steps.
        let dx = second.0 - first.0;
        let dy = second.1 - first.1;
        assert_eq!(dx, dy);
        assert!(dx > 0 && dx % STACK_OFFSET == 0);
    }

    #[test]
    fn marker_stays_inside_bounds_for_edge_elements() {
        let corner = bbox(590.0, 0.0, 20.0, 20.0);
        let (cx, cy) = place_marker(&corner, 600, 400, &[]);
        assert!(cx + MARKER_RADIUS + EDGE_MARGIN <= 600);
        assert!(cy - MARKER_RADIUS - EDGE_MARGIN >= 0);
    }

    #[test]
    fn annotate_writes_file() {
        let dir = TempDir::new().unwrap();
        let shot = dir.path().join("screenshot.png");
        white_screenshot(120, 90).save(&shot).unwrap();
        let out = dir.path().join("annotated.png");
        let summary = annotate_screenshot(
            &shot,
            &[issue(1, Severity::Major, Some(bbox(10.0, 10.0, 40.0, 20.0)))],
            &out,
        )
        .unwrap();
        assert!(out.exists());
        assert_eq!(summary.markers, 1);
    }

    #[test]
    fn high_issue_ids_render_in_paren_form() {
        // Only checks that drawing does not panic and marker is placed.
        let screenshot = white_screenshot(300, 200);
        let mut many = issue(21, Severity::Minor, Some(bbox(40.0, 40.0, 30.0, 15.0)));
        many.description = "x".into();
        let rendered = render(&screenshot, &[many]).unwrap();
        assert_eq!(rendered.summary.markers, 1);
    }
}
