use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::browser::BrowserOptions;
use crate::compare::{DEFAULT_PIXEL_THRESHOLD, DEFAULT_SSIM_THRESHOLD};
use crate::error::{CvrError, Result};
use crate::session::DEFAULT_SESSIONS_ROOT;
use crate::viewport::Viewport;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub viewport: Viewport,
    pub sessions_root: PathBuf,
    pub spec_roots: Vec<PathBuf>,
    pub thresholds: Thresholds,
    pub timeouts: Timeouts,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub pixel: f64,
    pub ssim: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            pixel: DEFAULT_PIXEL_THRESHOLD,
            ssim: DEFAULT_SSIM_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "humantime_serde")]
    pub navigation: Duration,
    #[serde(with = "humantime_serde")]
    pub network_idle: Duration,
    #[serde(with = "humantime_serde")]
    pub process: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(30),
            network_idle: Duration::from_secs(10),
            process: Duration::from_secs(60),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            sessions_root: PathBuf::from(DEFAULT_SESSIONS_ROOT),
            spec_roots: vec![PathBuf::from("specs"), PathBuf::from(".canvas/specs")],
            thresholds: Thresholds::default(),
            timeouts: Timeouts::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file. Missing fields fall back to
    /// defaults; CLI flags override whatever loads here.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| CvrError::Config(format!("cannot read {}: {e}", path.display())))?;
        let cfg: Config = toml::from_str(&contents)
            .map_err(|e| CvrError::Config(format!("invalid config {}: {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.thresholds.pixel) {
            return Err(CvrError::Config(
                "thresholds.pixel must be between 0 and 100".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.thresholds.ssim) {
            return Err(CvrError::Config(
                "thresholds.ssim must be between 0.0 and 1.0".into(),
            ));
        }
        if self.timeouts.navigation.is_zero()
            || self.timeouts.network_idle.is_zero()
            || self.timeouts.process.is_zero()
        {
            return Err(CvrError::Config(
                "timeouts must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn browser_options(&self) -> BrowserOptions {
        BrowserOptions {
            viewport: self.viewport,
            navigation_timeout: self.timeouts.navigation,
            network_idle_timeout: self.timeouts.network_idle,
            process_timeout: self.timeouts.process,
            ..BrowserOptions::default()
        }
    }
}

/// Load the config file if given, defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_toml_file(path),
        None => Ok(Config::default()),
    }
}
