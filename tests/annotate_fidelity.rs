//! Annotator fidelity: marker counts, legend sizing, contrast fallback.

use std::collections::BTreeMap;

use cvr_lib::annotate::annotate_screenshot;
use cvr_lib::{BoundingBox, Issue, Severity};
use image::{GenericImageView, Rgba, RgbaImage};
use tempfile::TempDir;

fn issue(id: usize, severity: Severity, bbox: Option<BoundingBox>) -> Issue {
    Issue {
        id,
        check_id: "touch-targets".into(),
        pillar: "Usability".into(),
        severity,
        element: bbox.map(|_| 0),
        css_selector: bbox.map(|_| "button.cta".to_string()),
        description: format!("Issue number {id} needs attention"),
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

fn save_solid(path: &std::path::Path, w: u32, h: u32, color: [u8; 4]) {
    RgbaImage::from_pixel(w, h, Rgba(color)).save(path).unwrap();
}

#[test]
fn marker_count_equals_issues_with_bounding_boxes() {
    let dir = TempDir::new().unwrap();
    let shot = dir.path().join("screenshot.png");
    save_solid(&shot, 500, 400, [255, 255, 255, 255]);

    let issues = vec![
        issue(1, Severity::Blocking, Some(bbox(20.0, 20.0, 80.0, 30.0))),
        issue(2, Severity::Major, None),
        issue(3, Severity::Minor, Some(bbox(20.0, 200.0, 80.0, 30.0))),
    ];

    let out = dir.path().join("annotated.png");
    let summary = annotate_screenshot(&shot, &issues, &out).unwrap();

    assert_eq!(summary.markers, 2);
    assert_eq!(summary.legend_entries, 3);
    assert!(out.exists());
}

#[test]
fn zero_issues_appends_empty_legend_and_preserves_pixels() {
    let dir = TempDir::new().unwrap();
    let shot = dir.path().join("screenshot.png");
    save_solid(&shot, 96, 64, [10, 120, 200, 255]);

    let out = dir.path().join("annotated.png");
    let summary = annotate_screenshot(&shot, &[], &out).unwrap();
    assert_eq!(summary.markers, 0);
    assert_eq!(summary.legend_entries, 0);

    let original = image::open(&shot).unwrap();
    let annotated = image::open(&out).unwrap();
    assert_eq!(annotated.width(), original.width());
    assert!(annotated.height() > original.height(), "legend strip added");
    for y in 0..original.height() {
        for x in 0..original.width() {
            assert_eq!(
                annotated.get_pixel(x, y),
                original.get_pixel(x, y),
                "screenshot pixel changed at {x},{y}"
            );
        }
    }
}

#[test]
fn red_background_forces_black_for_every_marker() {
    let dir = TempDir::new().unwrap();
    let shot = dir.path().join("screenshot.png");
    // Synthetic page painted in the annotator's own blocking red.
    save_solid(&shot, 500, 400, [0xDC, 0x35, 0x45, 255]);

    let issues = vec![
        issue(1, Severity::Blocking, Some(bbox(30.0, 30.0, 60.0, 25.0))),
        issue(2, Severity::Major, Some(bbox(30.0, 130.0, 60.0, 25.0))),
        issue(3, Severity::Minor, Some(bbox(30.0, 230.0, 60.0, 25.0))),
    ];

    let out = dir.path().join("annotated.png");
    let summary = annotate_screenshot(&shot, &issues, &out).unwrap();
    for color in &summary.marker_colors {
        assert_eq!(*color, [0, 0, 0], "expected black fallback, got {color:?}");
    }
}

#[test]
fn white_background_keeps_severity_colors() {
    let dir = TempDir::new().unwrap();
    let shot = dir.path().join("screenshot.png");
    save_solid(&shot, 500, 400, [255, 255, 255, 255]);

    let issues = vec![
        issue(1, Severity::Blocking, Some(bbox(30.0, 30.0, 60.0, 25.0))),
        issue(2, Severity::Major, Some(bbox(30.0, 130.0, 60.0, 25.0))),
        issue(3, Severity::Minor, Some(bbox(30.0, 230.0, 60.0, 25.0))),
    ];

    let out = dir.path().join("annotated.png");
    let summary = annotate_screenshot(&shot, &issues, &out).unwrap();
    assert_eq!(
        summary.marker_colors,
        vec![[0xDC, 0x35, 0x45], [0xFF, 0x91, 0x00], [0xFF, 0xC1, 0x07]]
    );
}

#[test]
fn annotation_is_deterministic_for_stacked_markers() {
    let dir = TempDir::new().unwrap();
    let shot = dir.path().join("screenshot.png");
    save_solid(&shot, 600, 400, [255, 255, 255, 255]);

    // Three issues on the same element stack their badges.
    let same = bbox(200.0, 150.0, 90.0, 30.0);
    let issues = vec![
        issue(1, Severity::Major, Some(same)),
        issue(2, Severity::Major, Some(same)),
        issue(3, Severity::Minor, Some(same)),
    ];

    let out_a = dir.path().join("a.png");
    let out_b = dir.path().join("b.png");
    annotate_screenshot(&shot, &issues, &out_a).unwrap();
    annotate_screenshot(&shot, &issues, &out_b).unwrap();

    let a = image::open(&out_a).unwrap().to_rgba8();
    let b = image::open(&out_b).unwrap().to_rgba8();
    assert_eq!(a.as_raw(), b.as_raw());
}

#[test]
fn legend_grows_linearly_with_entries() {
    let dir = TempDir::new().unwrap();
    let shot = dir.path().join("screenshot.png");
    save_solid(&shot, 300, 200, [255, 255, 255, 255]);

    let heights: Vec<u32> = [0usize, 1, 3]
        .iter()
        .map(|&n| {
            let issues: Vec<Issue> = (1..=n)
                .map(|id| issue(id, Severity::Minor, Some(bbox(10.0, 10.0, 40.0, 15.0))))
                .collect();
            let out = dir.path().join(format!("annotated_{n}.png"));
            annotate_screenshot(&shot, &issues, &out).unwrap();
            image::open(&out).unwrap().height()
        })
        .collect();

    let per_entry = heights[1] - heights[0];
    assert!(per_entry > 0);
    assert_eq!(heights[2] - heights[0], 3 * per_entry);
}
