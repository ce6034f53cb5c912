//! Canvas Visual Review (CVR) Library
//!
//! A spec-driven visual design review engine for live web pages. Given a
//! URL and a declarative design spec, CVR drives a headless browser,
//! captures visual and structural context, runs compliance checks,
//! annotates a screenshot with numbered redlines, and emits structured
//! issue reports. A second mode compares a live page against a reference
//! image (pixel + SSIM).
//!
//! # Module Overview
//!
//! - [`spec`] - Spec loading: markdown + frontmatter, inheritance, overrides
//! - [`browser`] - Headless browser capture via a Node/Playwright helper
//! - [`checks`] - Check registry and the built-in evaluators
//! - [`annotate`] - Screenshot markers and legend rendering
//! - [`compare`] - Pixel + SSIM comparison and diff visualization
//! - [`review`] - The orchestrator tying capture, checks, and artifacts together
//! - [`session`] - Durable per-session artifact directories
//! - [`events`] - Event bus for external overlay subscribers
//!
//! # Example
//!
//! ```no_run
//! use cvr_lib::review::{EngineOptions, ReviewEngine, ReviewOptions};
//!
//! # async fn example() -> cvr_lib::Result<()> {
//! let engine = ReviewEngine::new(EngineOptions::default());
//! let options = ReviewOptions {
//!     annotate: true,
//!     ..Default::default()
//! };
//! let result = engine
//!     .review("https://example.com", "web-baseline", &options)
//!     .await?;
//! println!("{} issues found", result.issues.len());
//! # Ok(())
//! # }
//! ```

pub mod annotate;
pub mod browser;
pub mod budget;
pub mod checks;
pub mod color;
pub mod compare;
pub mod config;
pub mod error;
pub mod events;
pub mod output;
pub mod review;
pub mod selector;
pub mod session;
pub mod spec;
pub mod types;
pub mod viewport;

pub use browser::{BrowserManager, BrowserOptions};
pub use error::{CvrError, ErrorPayload, Result};
pub use events::{EventBus, ReviewEvent};
pub use output::{CompactReviewResult, CompareOutcome, ErrorResult, ReviewResult};
pub use review::{CompareOptions, EngineOptions, ReviewEngine, ReviewOptions};
pub use session::{ArtifactPaths, SessionManifest, SessionReport, SessionStore, SpecRef};
pub use spec::{Check, Pillar, Spec, SpecLoader};
pub use types::{
    A11yImpact, A11yReport, A11yViolation, BoundingBox, Diagnostic, ElementInfo, Grade, Issue,
    PageCapture, PillarGrade, Severity, SummaryCounts,
};
pub use viewport::Viewport;
