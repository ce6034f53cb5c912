//! Headless browser capture via a Node/Playwright helper subprocess.

mod capture;
mod manager;
mod playwright;

pub use manager::{
    validate_url, BrowserManager, BrowserOptions, DEFAULT_NAVIGATION_TIMEOUT,
    DEFAULT_NETWORK_IDLE_TIMEOUT, DEFAULT_PROCESS_TIMEOUT,
};
