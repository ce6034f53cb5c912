//! Browser manager: scoped capture sessions over a Node/Playwright helper.
//!
//! Concurrent captures are bounded by a semaphore; each capture owns its
//! own browser context for its whole lifetime, and the helper process is
//! killed on timeout so no context outlives its review.

use std::fs;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::error::{CvrError, Result};
use crate::types::PageCapture;
use crate::viewport::Viewport;

use super::capture::{convert_capture, RawCapture};
use super::playwright::{
    ensure_node_available, ensure_playwright_available, map_helper_failure, map_script_status,
    map_spawn_error, ScriptStatus, REVIEW_SCRIPT, SCREENSHOT_SCRIPT,
};

pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_NETWORK_IDLE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for browser capture sessions.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// The Node.js command to use (default: "node").
    pub node_command: String,
    pub viewport: Viewport,
    pub headless: bool,
    pub navigation_timeout: Duration,
    pub network_idle_timeout: Duration,
    /// Hard ceiling on the whole helper process.
    pub process_timeout: Duration,
    pub max_concurrent_sessions: usize,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            node_command: "node".to_string(),
            viewport: Viewport::default(),
            headless: true,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            network_idle_timeout: DEFAULT_NETWORK_IDLE_TIMEOUT,
            process_timeout: DEFAULT_PROCESS_TIMEOUT,
            max_concurrent_sessions: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowserManager {
    options: BrowserOptions,
    semaphore: Arc<Semaphore>,
}

impl BrowserManager {
    pub fn new(options: BrowserOptions) -> Self {
        let permits = options.max_concurrent_sessions.max(1);
        Self {
            options,
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.options.viewport
    }

    /// Capture a full review snapshot: screenshot, element table, DOM,
    /// accessibility scan. `scope` narrows extraction to a selector subtree.
    pub async fn capture_page(
        &self,
        url: &str,
        screenshot_path: &Path,
        scope: Option<&str>,
    ) -> Result<PageCapture> {
        ensure_node_available(&self.options.node_command).await?;
        ensure_playwright_available(&self.options.node_command).await?;
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| CvrError::Config("Browser manager unavailable".to_string()))?;

        ensure_parent_dir(screenshot_path)?;

        let mut args = self.common_args(url, screenshot_path);
        args.push(scope.unwrap_or("").to_string());
        let stdout = self.run_helper(url, REVIEW_SCRIPT, &args).await?;

        let raw: RawCapture = serde_json::from_str(&stdout).map_err(|e| {
            CvrError::Navigation {
                url: url.to_string(),
                message: format!("unexpected browser helper output: {e}"),
            }
        })?;

        if raw.status != "ok" {
            let payload = ScriptStatus {
                status: raw.status.clone(),
                message: raw.message.clone(),
            };
            return Err(map_script_status(
                url,
                &payload,
                self.options.navigation_timeout,
            ));
        }

        Ok(convert_capture(
            raw,
            url,
            self.options.viewport,
            screenshot_path,
        ))
    }

    /// Capture only a screenshot (compare mode). `full_page` scrolls the
    /// whole document; otherwise the viewport alone is captured.
    pub async fn capture_screenshot(
        &self,
        url: &str,
        screenshot_path: &Path,
        full_page: bool,
    ) -> Result<()> {
        ensure_node_available(&self.options.node_command).await?;
        ensure_playwright_available(&self.options.node_command).await?;
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| CvrError::Config("Browser manager unavailable".to_string()))?;

        ensure_parent_dir(screenshot_path)?;

        let mut args = self.common_args(url, screenshot_path);
        args.push(if full_page { "1" } else { "0" }.to_string());
        let stdout = self.run_helper(url, SCREENSHOT_SCRIPT, &args).await?;

        let payload: ScriptStatus = serde_json::from_str(&stdout).map_err(|e| {
            CvrError::Navigation {
                url: url.to_string(),
                message: format!("unexpected browser helper output: {e}"),
            }
        })?;
        if payload.status != "ok" {
            return Err(map_script_status(
                url,
                &payload,
                self.options.navigation_timeout,
            ));
        }
        Ok(())
    }

    fn common_args(&self, url: &str, screenshot_path: &Path) -> Vec<String> {
        vec![
            url.to_string(),
            self.options.viewport.width.to_string(),
            self.options.viewport.height.to_string(),
            self.options.navigation_timeout.as_millis().to_string(),
            self.options.network_idle_timeout.as_millis().to_string(),
            screenshot_path.to_string_lossy().to_string(),
            if self.options.headless { "1" } else { "0" }.to_string(),
        ]
    }

    async fn run_helper(&self, url: &str, script: &str, args: &[String]) -> Result<String> {
        let mut cmd = Command::new(&self.options.node_command);
        cmd.arg("-e").arg(script);
        for arg in args {
            cmd.arg(arg);
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|err| map_spawn_error(err, &self.options.node_command))?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut out) = stdout_pipe {
                let _ = out.read_to_end(&mut buf).await;
            }
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut err) = stderr_pipe {
                let _ = err.read_to_end(&mut buf).await;
            }
            buf
        });

        let status = match timeout(self.options.process_timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => return Err(CvrError::Io(err)),
            Err(_) => {
                let _ = child.kill().await;
                let _ = child.wait().await;
                return Err(CvrError::NavigationTimeout {
                    url: url.to_string(),
                    seconds: self.options.process_timeout.as_secs(),
                });
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(map_helper_failure(url, status.to_string(), &stderr));
        }

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                CvrError::artifact_write(parent.display().to_string(), e.to_string())
            })?;
        }
    }
    Ok(())
}

/// Normalize a user-supplied URL; file URLs are accepted for reproducible
/// local review targets.
pub fn validate_url(input: &str) -> Result<String> {
    let parsed = url::Url::parse(input)?;
    match parsed.scheme() {
        "http" | "https" | "file" => Ok(parsed.into()),
        other => Err(CvrError::Config(format!(
            "unsupported URL scheme '{other}' (expected http, https, or file)"
        ))),
    }
}
