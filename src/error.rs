use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::ParseError;

#[derive(Debug, Error)]
pub enum CvrError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] ParseError),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Spec not found: {0}")]
    SpecNotFound(String),

    #[error("Spec parse error in {path}: {message}")]
    SpecParse { path: String, message: String },

    #[error("Spec inheritance cycle detected at {0}")]
    SpecCycle(String),

    #[error("Invalid severity '{token}' on check '{check_id}' (expected blocking, major, or minor)")]
    SpecInvalidSeverity { check_id: String, token: String },

    #[error("Navigation failed for {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("Navigation timed out for {url} after {seconds}s")]
    NavigationTimeout { url: String, seconds: u64 },

    #[error("Reference image not found: {0}")]
    ReferenceNotFound(String),

    #[error("Reference image unreadable: {path}: {message}")]
    ReferenceUnreadable { path: String, message: String },

    #[error("Annotation failed: {0}")]
    Annotation(String),

    #[error("Evaluator '{check_id}' failed: {message}")]
    Evaluator { check_id: String, message: String },

    #[error("Artifact write failed for {path}: {message}")]
    ArtifactWrite { path: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CvrError {
    pub fn spec_parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        CvrError::SpecParse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn evaluator(check_id: impl Into<String>, message: impl Into<String>) -> Self {
        CvrError::Evaluator {
            check_id: check_id.into(),
            message: message.into(),
        }
    }

    pub fn artifact_write(path: impl Into<String>, message: impl Into<String>) -> Self {
        CvrError::ArtifactWrite {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Stable machine-facing kind name; part of the public error contract.
    pub fn error_kind(&self) -> &'static str {
        match self {
            CvrError::Io(_) => "IoError",
            CvrError::InvalidUrl(_) => "InvalidUrl",
            CvrError::Image(_) => "ImageError",
            CvrError::Serialization(_) => "SerializationError",
            CvrError::SpecNotFound(_) => "SpecNotFound",
            CvrError::SpecParse { .. } => "SpecParseError",
            CvrError::SpecCycle(_) => "SpecCycle",
            CvrError::SpecInvalidSeverity { .. } => "SpecInvalidSeverity",
            CvrError::Navigation { .. } => "NavigationError",
            CvrError::NavigationTimeout { .. } => "NavigationTimeout",
            CvrError::ReferenceNotFound(_) => "ReferenceNotFound",
            CvrError::ReferenceUnreadable { .. } => "ReferenceUnreadable",
            CvrError::Annotation(_) => "AnnotationError",
            CvrError::Evaluator { .. } => "EvaluatorError",
            CvrError::ArtifactWrite { .. } => "ArtifactWriteError",
            CvrError::Config(_) => "ConfigError",
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let remediation = match self {
            CvrError::Io(_) => "Check file paths and permissions.",
            CvrError::InvalidUrl(_) => "Verify the URL format (e.g., https://example.com).",
            CvrError::Image(_) => {
                "Verify the image path and that the file is a valid PNG/JPEG/WebP."
            }
            CvrError::Serialization(_) => "Check JSON inputs; rerun with --verbose for details.",
            CvrError::SpecNotFound(_) => {
                "Check the spec id against the spec search roots, or pass an explicit path."
            }
            CvrError::SpecParse { .. } => {
                "Fix the spec markdown: YAML frontmatter between --- markers, H2 pillars, H4 checks."
            }
            CvrError::SpecCycle(_) => "Remove the circular `extends` reference between specs.",
            CvrError::SpecInvalidSeverity { .. } => "Use one of: blocking, major, minor.",
            CvrError::Navigation { .. } => {
                "Check that the URL is reachable and the page loads without blocking."
            }
            CvrError::NavigationTimeout { .. } => {
                "Try increasing --nav-timeout or ensure the page reaches network idle."
            }
            CvrError::ReferenceNotFound(_) => {
                "Verify the reference image path; use an absolute path if needed."
            }
            CvrError::ReferenceUnreadable { .. } => {
                "Use a supported reference format (png, jpg, jpeg, webp)."
            }
            CvrError::Annotation(_) => {
                "The review itself succeeded; rerun with --verbose to inspect the annotation failure."
            }
            CvrError::Evaluator { .. } => {
                "Inspect the check config in the spec; rerun with --verbose for details."
            }
            CvrError::ArtifactWrite { .. } => {
                "Check that the sessions directory is writable and has free space."
            }
            CvrError::Config(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("playwright npm package is missing") {
                    "Install Playwright (e.g., `npm install playwright` and `npx playwright install chromium`)."
                } else if lower.contains("chromium executable") {
                    "Run `npx playwright install chromium` to download the browser."
                } else if lower.contains("not found on path") || lower.contains("node command") {
                    "Install Node.js and ensure the node binary is on PATH."
                } else {
                    "Check flags and paths (e.g., --viewport WIDTHxHEIGHT)."
                }
            }
        };

        ErrorPayload {
            error_kind: self.error_kind().to_string(),
            message: self.to_string(),
            remediation: Some(remediation.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CvrError>;

/// Machine-facing error shape; serialized inside `{ok:false, ...}` envelopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub error_kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}
