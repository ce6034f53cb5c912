//! Inline Playwright scripts and Node.js plumbing.
//!
//! The browser is driven through a Node subprocess running an inline
//! script: navigate, wait for network idle, screenshot, then extract the
//! element table, a bounded DOM tree, and an axe accessibility scan in one
//! JSON document on stdout.

use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{CvrError, Result};

/// Screenshot-only capture (compare mode).
pub(crate) const SCREENSHOT_SCRIPT: &str = r#"
const [, url, width, height, navTimeout, idleTimeout, screenshotPath, headlessFlag, fullPageFlag] = process.argv;

async function run() {
  let browser;
  try {
    const { chromium } = require('playwright');
    browser = await chromium.launch({ headless: headlessFlag !== '0' });
    const context = await browser.newContext({
      viewport: { width: parseInt(width, 10), height: parseInt(height, 10) }
    });
    const page = await context.newPage();
    const navMs = parseInt(navTimeout, 10);
    const idleMs = parseInt(idleTimeout, 10);

    try {
      await page.goto(url, { waitUntil: 'networkidle', timeout: navMs });
      await page.waitForLoadState('networkidle', { timeout: idleMs });
    } catch (err) {
      const message = err && err.message ? err.message : String(err);
      const status = /[Tt]imeout/.test(message) ? 'nav_timeout' : 'nav_error';
      console.log(JSON.stringify({ status, message }));
      process.exitCode = 0;
      return;
    }

    await page.screenshot({ path: screenshotPath, fullPage: fullPageFlag !== '0' });
    console.log(JSON.stringify({ status: 'ok' }));
  } catch (err) {
    const message = err && err.message ? err.message : String(err);
    console.error(JSON.stringify({ status: 'error', message }));
    process.exitCode = 1;
  } finally {
    if (browser) {
      await browser.close();
    }
  }
}

run();
"#;

/// Full review capture: screenshot, element table with computed and focus
/// styles, bounded DOM tree, axe scan.
pub(crate) const REVIEW_SCRIPT: &str = r#"
const [, url, width, height, navTimeout, idleTimeout, screenshotPath, headlessFlag, scopeSelector] = process.argv;

const MAX_ELEMENTS = 2000;
const MAX_FOCUS_PROBES = 200;
const MAX_DOM_DEPTH = 5;
const MAX_DOM_CHILDREN = 20;
const MAX_DOM_TEXT = 100;

async function run() {
  let browser;
  try {
    const { chromium } = require('playwright');
    browser = await chromium.launch({ headless: headlessFlag !== '0' });
    const context = await browser.newContext({
      viewport: { width: parseInt(width, 10), height: parseInt(height, 10) }
    });
    const page = await context.newPage();
    const navMs = parseInt(navTimeout, 10);
    const idleMs = parseInt(idleTimeout, 10);

    try {
      await page.goto(url, { waitUntil: 'networkidle', timeout: navMs });
      await page.waitForLoadState('networkidle', { timeout: idleMs });
    } catch (err) {
      const message = err && err.message ? err.message : String(err);
      const status = /[Tt]imeout/.test(message) ? 'nav_timeout' : 'nav_error';
      console.log(JSON.stringify({ status, message }));
      process.exitCode = 0;
      return;
    }

    await page.screenshot({ path: screenshotPath, fullPage: false });

    const capture = await page.evaluate(({ scope, maxElements, maxFocusProbes, maxDepth, maxChildren, maxText }) => {
      const root = (scope && document.querySelector(scope)) || document.body;

      function styleInfo(el) {
        const s = window.getComputedStyle(el);
        return {
          color: s.color || null,
          backgroundColor: s.backgroundColor || null,
          fontSize: parseFloat(s.fontSize) || null,
          outlineStyle: s.outlineStyle || null,
          boxShadow: s.boxShadow || null,
          display: s.display || null,
          visibility: s.visibility || null,
          opacity: s.opacity !== '' ? parseFloat(s.opacity) : null
        };
      }

      function directText(el) {
        let text = null;
        for (const child of el.childNodes) {
          if (child.nodeType === Node.TEXT_NODE) {
            const trimmed = child.textContent.trim();
            if (trimmed) {
              text = text ? text + ' ' + trimmed : trimmed;
            }
          }
        }
        return text;
      }

      function parentChain(el) {
        const chain = [];
        let parent = el.parentElement;
        while (parent && parent !== document.documentElement && chain.length < 3) {
          const ps = window.getComputedStyle(parent);
          chain.push({
            tag: parent.tagName.toLowerCase(),
            id: parent.id || null,
            classes: Array.from(parent.classList),
            backgroundColor: ps.backgroundColor || null
          });
          parent = parent.parentElement;
        }
        return chain;
      }

      const elements = [];
      const walker = document.createTreeWalker(root, NodeFilter.SHOW_ELEMENT);
      let node = root;
      while (node && elements.length < maxElements) {
        const rect = node.getBoundingClientRect();
        if (rect.width > 0 || rect.height > 0) {
          const attributes = {};
          for (const attr of node.attributes) {
            attributes[attr.name] = attr.value;
          }
          elements.push({
            tag: node.tagName.toLowerCase(),
            id: node.id || null,
            classes: Array.from(node.classList),
            attributes,
            styles: styleInfo(node),
            focusStyles: null,
            boundingBox: { x: rect.x, y: rect.y, width: rect.width, height: rect.height },
            parentChain: parentChain(node),
            text: directText(node),
            domIndex: elements.length
          });
          node.__cvrIndex = elements.length - 1;
        }
        node = walker.nextNode();
      }

      // Probe focus styling on focusable elements.
      const previouslyFocused = document.activeElement;
      const focusables = root.querySelectorAll('a[href], button, input, select, textarea, [tabindex]');
      let probes = 0;
      for (const el of focusables) {
        if (probes >= maxFocusProbes) break;
        if (el.__cvrIndex === undefined) continue;
        try {
          el.focus({ preventScroll: true });
          if (document.activeElement === el) {
            const fs = window.getComputedStyle(el);
            elements[el.__cvrIndex].focusStyles = {
              outlineStyle: fs.outlineStyle || null,
              boxShadow: fs.boxShadow || null
            };
          }
        } catch (e) { /* unfocusable despite matching */ }
        probes++;
      }
      if (previouslyFocused && previouslyFocused.focus) {
        previouslyFocused.focus({ preventScroll: true });
      } else if (document.activeElement && document.activeElement.blur) {
        document.activeElement.blur();
      }

      function domNode(el, depth) {
        if (depth > maxDepth) return null;
        const children = [];
        for (const child of el.children) {
          if (children.length >= maxChildren) break;
          const converted = domNode(child, depth + 1);
          if (converted) children.push(converted);
        }
        let text = directText(el);
        if (text && text.length > maxText) {
          text = text.slice(0, maxText);
        }
        return {
          tag: el.tagName.toLowerCase(),
          id: el.id || null,
          classes: Array.from(el.classList),
          text,
          children
        };
      }

      return { elements, dom: domNode(root, 1) };
    }, {
      scope: scopeSelector || null,
      maxElements: MAX_ELEMENTS,
      maxFocusProbes: MAX_FOCUS_PROBES,
      maxDepth: MAX_DOM_DEPTH,
      maxChildren: MAX_DOM_CHILDREN,
      maxText: MAX_DOM_TEXT
    });

    let a11y = null;
    try {
      const axe = require('axe-core');
      await page.evaluate(axe.source);
      const results = await page.evaluate(async () => {
        return await window.axe.run(document, { resultTypes: ['violations'] });
      });
      a11y = {
        violations: (results.violations || []).map(v => ({
          id: v.id,
          impact: v.impact || 'minor',
          description: v.description || '',
          nodes: (v.nodes || []).map(n => ({
            html: n.html || '',
            target: (n.target || []).map(String)
          }))
        }))
      };
    } catch (err) { /* scan failure is non-fatal; a11y stays null */ }

    console.log(JSON.stringify({ status: 'ok', elements: capture.elements, dom: capture.dom, a11y }));
  } catch (err) {
    const message = err && err.message ? err.message : String(err);
    console.error(JSON.stringify({ status: 'error', message }));
    process.exitCode = 1;
  } finally {
    if (browser) {
      await browser.close();
    }
  }
}

run();
"#;

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ScriptStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Fail fast when the configured Node binary is missing.
pub(crate) async fn ensure_node_available(node_command: &str) -> Result<()> {
    let result = Command::new(node_command)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match result {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => Err(CvrError::Config(format!(
            "Node command '{node_command}' exists but failed to report a version"
        ))),
        Err(err) => Err(map_spawn_error(err, node_command)),
    }
}

/// Verify the Playwright npm package resolves before paying for a launch.
pub(crate) async fn ensure_playwright_available(node_command: &str) -> Result<()> {
    let result = Command::new(node_command)
        .arg("-e")
        .arg("require('playwright')")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match result {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => Err(CvrError::Config(
            "Playwright npm package is missing; install with `npm install playwright`."
                .to_string(),
        )),
        Err(err) => Err(map_spawn_error(err, node_command)),
    }
}

pub(crate) fn map_spawn_error(err: io::Error, node_command: &str) -> CvrError {
    if err.kind() == io::ErrorKind::NotFound {
        CvrError::Config(format!(
            "Node command '{node_command}' was not found on PATH"
        ))
    } else {
        CvrError::Io(err)
    }
}

/// Map a non-zero helper exit into the closest engine error.
pub(crate) fn map_helper_failure(url: &str, status: String, stderr: &str) -> CvrError {
    if let Ok(payload) = serde_json::from_str::<ScriptStatus>(stderr.trim()) {
        return map_script_status(url, &payload, Duration::from_secs(0));
    }
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("cannot find module 'playwright'") {
        return CvrError::Config(
            "Playwright npm package is missing; install with `npm install playwright`."
                .to_string(),
        );
    }
    if lower.contains("executable doesn't exist") || lower.contains("chromium") {
        return CvrError::Config(format!(
            "chromium executable is unavailable: {}",
            stderr.trim()
        ));
    }
    CvrError::Navigation {
        url: url.to_string(),
        message: format!("browser helper exited with {status}: {}", stderr.trim()),
    }
}

/// Map an in-script status payload onto an engine error.
pub(crate) fn map_script_status(
    url: &str,
    payload: &ScriptStatus,
    nav_timeout: Duration,
) -> CvrError {
    let message = payload
        .message
        .clone()
        .unwrap_or_else(|| "no additional details".to_string());
    match payload.status.as_str() {
        "nav_timeout" => CvrError::NavigationTimeout {
            url: url.to_string(),
            seconds: nav_timeout.as_secs(),
        },
        "nav_error" => CvrError::Navigation {
            url: url.to_string(),
            message,
        },
        other => CvrError::Navigation {
            url: url.to_string(),
            message: format!("browser helper returned status '{other}': {message}"),
        },
    }
}
