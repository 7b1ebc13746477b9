//! Configuration loading and resolution.
//!
//! Every value resolves as: explicit CLI flag, then environment variable,
//! then the built-in default.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::browser::chromium::find_chromium;

/// Port used when neither `--port` nor `PORT` is set.
pub const DEFAULT_PORT: u16 = 3000;

/// Desktop user agent presented to the storefront.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0.0.0";

pub const DEFAULT_VIEWPORT: (u32, u32) = (1920, 1080);

/// Upper bound for page load plus network settling.
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Pause after navigation so client-side scripts can populate `runParams`.
pub const SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Chromium flags for containerized hosts without a usable sandbox or /dev/shm.
pub const LAUNCH_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
];

/// How each per-request browser is launched and driven.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Chromium binary; `None` lets chromiumoxide detect one.
    pub chrome_path: Option<PathBuf>,
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub navigation_timeout: Duration,
    pub settle_delay: Duration,
    pub launch_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_path: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport_width: DEFAULT_VIEWPORT.0,
            viewport_height: DEFAULT_VIEWPORT.1,
            navigation_timeout: NAVIGATION_TIMEOUT,
            settle_delay: SETTLE_DELAY,
            launch_args: LAUNCH_ARGS.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl BrowserSettings {
    pub fn with_chrome_path(mut self, path: Option<PathBuf>) -> Self {
        self.chrome_path = path;
        self
    }
}

/// Everything the HTTP server needs at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub browser: BrowserSettings,
}

impl ServerConfig {
    pub fn new(host: IpAddr, port: u16, browser: BrowserSettings) -> Self {
        Self {
            addr: SocketAddr::new(host, port),
            browser,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            DEFAULT_PORT,
            BrowserSettings::default(),
        )
    }
}

/// Resolve the listening port.
pub fn resolve_port(explicit: Option<u16>) -> u16 {
    resolve_port_from(explicit, std::env::var("PORT").ok().as_deref())
}

fn resolve_port_from(explicit: Option<u16>, env_value: Option<&str>) -> u16 {
    if let Some(port) = explicit {
        return port;
    }

    match env_value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(value = raw, "ignoring invalid PORT, using {DEFAULT_PORT}");
            DEFAULT_PORT
        }),
        None => DEFAULT_PORT,
    }
}

/// Resolve the Chromium binary.
pub fn resolve_chrome_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var("CHROME_PATH") {
        let path = PathBuf::from(env_path.trim());
        if path.exists() {
            return Some(path);
        }
        tracing::warn!(path = %path.display(), "CHROME_PATH does not exist, searching PATH");
    }

    find_chromium()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_explicit_wins() {
        assert_eq!(resolve_port_from(Some(8080), Some("9000")), 8080);
    }

    #[test]
    fn test_port_from_env() {
        assert_eq!(resolve_port_from(None, Some("9000")), 9000);
        assert_eq!(resolve_port_from(None, Some(" 9001 ")), 9001);
    }

    #[test]
    fn test_port_default() {
        assert_eq!(resolve_port_from(None, None), 3000);
        assert_eq!(resolve_port_from(None, Some("")), 3000);
        assert_eq!(resolve_port_from(None, Some("web")), 3000);
    }

    #[test]
    fn test_browser_defaults() {
        let s = BrowserSettings::default();
        assert_eq!(s.navigation_timeout, Duration::from_secs(60));
        assert_eq!(s.settle_delay, Duration::from_secs(5));
        assert_eq!((s.viewport_width, s.viewport_height), (1920, 1080));
        assert!(s.launch_args.iter().any(|a| a == "--no-sandbox"));
        assert!(s.chrome_path.is_none());
    }

    #[test]
    fn test_explicit_chrome_path() {
        let p = resolve_chrome_path(Some(Path::new("/opt/chrome/chrome")));
        assert_eq!(p, Some(PathBuf::from("/opt/chrome/chrome")));
    }

    #[test]
    fn test_server_config_default_addr() {
        let c = ServerConfig::default();
        assert_eq!(c.addr.port(), 3000);
        assert!(c.addr.ip().is_unspecified());
    }
}
