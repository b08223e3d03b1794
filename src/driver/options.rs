//! Browser launch configuration.
//!
//! [`BrowserOptions`] holds everything needed to start a browser: what to
//! show, how big the window is, which binary to run and which profile to
//! use. [`BrowserOptions::to_args`] turns it into the command line.
//!
//! # Example
//!
//! ```ignore
//! use proton::BrowserOptions;
//!
//! let options = BrowserOptions::new()
//!     .with_title("Dashboard")
//!     .with_window_size(1280, 800)
//!     .with_debug();
//!
//! let args = options.to_args(std::path::Path::new("/tmp/profile"));
//! assert_eq!(args.last().map(String::as_str), Some("--remote-debugging-port=0"));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::WindowState;

use super::assets;
use super::binary::Flavor;

// ============================================================================
// Constants
// ============================================================================

/// Default time allowed from spawn to a negotiated session.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Flags passed to every launched browser, before caller arguments.
pub const DEFAULT_BROWSER_ARGS: &[&str] = &[
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-client-side-phishing-detection",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-infobars",
    "--disable-extensions",
    "--disable-features=site-per-process",
    "--disable-hang-monitor",
    "--disable-ipc-flooding-protection",
    "--disable-popup-blocking",
    "--disable-prompt-on-repost",
    "--disable-renderer-backgrounding",
    "--disable-sync",
    "--disable-translate",
    "--metrics-recording-only",
    "--no-first-run",
    "--safebrowsing-disable-auto-update",
    "--enable-automation",
    "--password-store=basic",
    "--use-mock-keychain",
    "--disable-dinosaur-easter-egg",
    "--disable-windows10-custom-titlebar",
    "--no-default-browser-check",
];

const HEADLESS_FLAG: &str = "--headless";

// ============================================================================
// BrowserOptions
// ============================================================================

/// Browser launch configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserOptions {
    /// Title of the blank start page, used when `url` is not set.
    pub title: String,

    /// Page opened at startup.
    pub url: Option<String>,

    /// Log page console output at `info` and open devtools.
    pub debug: bool,

    /// User data directory. A temporary one is created when unset.
    pub user_data_dir: Option<PathBuf>,

    /// Leave the user data directory on disk after close.
    pub keep_user_data_dir: bool,

    /// Window dimensions in pixels. `None` starts maximized.
    pub window_size: Option<(u32, u32)>,

    /// Window state applied after startup.
    pub window_state: WindowState,

    /// Browser family looked up when `binary` is unset.
    pub flavor: Flavor,

    /// Explicit browser executable.
    pub binary: Option<PathBuf>,

    /// Run without a visible window.
    pub headless: bool,

    /// Additional command-line arguments.
    pub extra_args: Vec<String>,

    /// Time allowed from spawn to a negotiated session.
    pub startup_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl BrowserOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            title: String::new(),
            url: None,
            debug: false,
            user_data_dir: None,
            keep_user_data_dir: false,
            window_size: None,
            window_state: WindowState::Normal,
            flavor: Flavor::Chrome,
            binary: None,
            headless: false,
            extra_args: Vec::new(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    /// Creates options configured for headless mode.
    #[inline]
    #[must_use]
    pub fn headless() -> Self {
        Self {
            headless: true,
            ..Self::new()
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl BrowserOptions {
    /// Sets the start page title.
    #[inline]
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the start page URL.
    #[inline]
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Enables debug mode.
    #[inline]
    #[must_use]
    pub fn with_debug(mut self) -> Self {
        self.debug = true;
        self
    }

    /// Uses `path` as the user data directory.
    #[inline]
    #[must_use]
    pub fn with_user_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_data_dir = Some(path.into());
        self
    }

    /// Keeps the user data directory after close.
    #[inline]
    #[must_use]
    pub fn with_keep_user_data_dir(mut self) -> Self {
        self.keep_user_data_dir = true;
        self
    }

    /// Sets window size in pixels.
    #[inline]
    #[must_use]
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = Some((width, height));
        self
    }

    /// Sets the window state applied after startup.
    #[inline]
    #[must_use]
    pub fn with_window_state(mut self, state: WindowState) -> Self {
        self.window_state = state;
        self
    }

    /// Sets the browser family.
    #[inline]
    #[must_use]
    pub fn with_flavor(mut self, flavor: Flavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Sets the browser executable.
    #[inline]
    #[must_use]
    pub fn with_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    /// Enables headless mode.
    #[inline]
    #[must_use]
    pub fn with_headless(mut self) -> Self {
        self.headless = true;
        self
    }

    /// Adds a custom command-line argument.
    #[inline]
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Adds multiple custom command-line arguments.
    #[inline]
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the startup timeout.
    #[inline]
    #[must_use]
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }
}

// ============================================================================
// Conversion Methods
// ============================================================================

impl BrowserOptions {
    /// Builds the browser command line for a profile at `user_data_dir`.
    #[must_use]
    pub fn to_args(&self, user_data_dir: &Path) -> Vec<String> {
        let mut args: Vec<String> =
            Vec::with_capacity(DEFAULT_BROWSER_ARGS.len() + self.extra_args.len() + 6);

        args.extend(DEFAULT_BROWSER_ARGS.iter().map(|arg| (*arg).to_string()));
        args.extend(self.extra_args.iter().cloned());

        args.push(format!("--app={}", self.start_url()));
        args.push(format!("--user-data-dir={}", user_data_dir.display()));

        match self.window_size {
            Some((width, height)) => args.push(format!("--window-size={width},{height}")),
            None => args.push("--start-maximized".to_string()),
        }

        if self.debug {
            args.push("--auto-open-devtools-for-tabs".to_string());
        }

        if self.headless && !self.extra_args.iter().any(|arg| is_headless_arg(arg)) {
            args.push(HEADLESS_FLAG.to_string());
        }

        args.push("--remote-debugging-port=0".to_string());
        args
    }

    /// Returns the page opened at startup.
    #[must_use]
    pub fn start_url(&self) -> String {
        match &self.url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => assets::blank_page_uri(&self.title),
        }
    }

    /// Validates the options configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if validation fails.
    pub fn validate(&self) -> Result<()> {
        if let Some((width, height)) = self.window_size
            && (width == 0 || height == 0)
        {
            return Err(Error::config("Window dimensions must be greater than zero"));
        }

        if self.startup_timeout.is_zero() {
            return Err(Error::config("Startup timeout must be greater than zero"));
        }

        if let Some(binary) = &self.binary
            && !binary.is_file()
        {
            return Err(Error::config(format!(
                "Browser binary not found at: {}",
                binary.display()
            )));
        }

        if self.extra_args.iter().any(|arg| arg.starts_with("--remote-debugging-port")) {
            return Err(Error::config("The remote debugging port is managed internally"));
        }

        Ok(())
    }

    /// Returns `true` if the browser runs without a window.
    ///
    /// Also true when a `--headless` flag is passed through `extra_args`.
    #[inline]
    #[must_use]
    pub fn is_headless(&self) -> bool {
        self.headless || self.extra_args.iter().any(|arg| is_headless_arg(arg))
    }

    /// Returns the configured binary, or looks one up for the flavor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BrowserNotFound`] if no binary is installed.
    pub fn resolve_binary(&self) -> Result<PathBuf> {
        match &self.binary {
            Some(binary) => Ok(binary.clone()),
            None => self.flavor.locate(),
        }
    }
}

fn is_headless_arg(arg: &str) -> bool {
    arg == HEADLESS_FLAG || arg.starts_with("--headless=")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> PathBuf {
        PathBuf::from("/tmp/proton-profile")
    }

    #[test]
    fn test_new_creates_default() {
        let options = BrowserOptions::new();
        assert!(options.title.is_empty());
        assert!(options.url.is_none());
        assert!(!options.debug);
        assert!(options.window_size.is_none());
        assert_eq!(options.window_state, WindowState::Normal);
        assert_eq!(options.flavor, Flavor::Chrome);
        assert!(!options.headless);
        assert_eq!(options.startup_timeout, DEFAULT_STARTUP_TIMEOUT);
    }

    #[test]
    fn test_builder_chain() {
        let options = BrowserOptions::new()
            .with_title("App")
            .with_url("https://example.com")
            .with_window_size(1920, 1080)
            .with_flavor(Flavor::Edge)
            .with_keep_user_data_dir()
            .with_debug();

        assert_eq!(options.title, "App");
        assert_eq!(options.url.as_deref(), Some("https://example.com"));
        assert_eq!(options.window_size, Some((1920, 1080)));
        assert_eq!(options.flavor, Flavor::Edge);
        assert!(options.keep_user_data_dir);
        assert!(options.debug);
    }

    #[test]
    fn test_to_args_ordering() {
        let options = BrowserOptions::new()
            .with_url("https://example.com")
            .with_window_size(800, 600)
            .with_debug()
            .with_headless()
            .with_arg("--custom");

        let args = options.to_args(&profile());
        let tail = &args[DEFAULT_BROWSER_ARGS.len()..];

        assert_eq!(
            tail,
            [
                "--custom",
                "--app=https://example.com",
                "--user-data-dir=/tmp/proton-profile",
                "--window-size=800,600",
                "--auto-open-devtools-for-tabs",
                "--headless",
                "--remote-debugging-port=0",
            ]
        );
    }

    #[test]
    fn test_to_args_starts_with_defaults() {
        let args = BrowserOptions::new().to_args(&profile());
        assert_eq!(args[0], DEFAULT_BROWSER_ARGS[0]);
        assert!(args.contains(&"--no-first-run".to_string()));
    }

    #[test]
    fn test_to_args_maximized_without_size() {
        let args = BrowserOptions::new().to_args(&profile());
        assert!(args.contains(&"--start-maximized".to_string()));
        assert!(!args.iter().any(|arg| arg.starts_with("--window-size")));
    }

    #[test]
    fn test_to_args_blank_page_without_url() {
        let args = BrowserOptions::new().with_title("Hi").to_args(&profile());
        assert!(
            args.iter()
                .any(|arg| arg.starts_with("--app=data:text/html;base64,"))
        );
    }

    #[test]
    fn test_headless_flag_in_extra_args() {
        let options = BrowserOptions::new().with_arg("--headless=new");
        assert!(options.is_headless());

        let args = options.to_args(&profile());
        assert_eq!(args.iter().filter(|arg| arg.starts_with("--headless")).count(), 1);
    }

    #[test]
    fn test_headless_constructor() {
        assert!(BrowserOptions::headless().is_headless());
    }

    #[test]
    fn test_validate_valid() {
        let options = BrowserOptions::new().with_window_size(800, 600);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_dimension() {
        let err = BrowserOptions::new()
            .with_window_size(0, 600)
            .validate()
            .expect_err("zero width");
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_validate_missing_binary() {
        let options = BrowserOptions::new().with_binary("/nonexistent/browser");
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_debugging_port() {
        let options = BrowserOptions::new().with_arg("--remote-debugging-port=9222");
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_resolve_binary_prefers_explicit_path() {
        let options = BrowserOptions::new().with_binary("/opt/browser");
        let binary = options.resolve_binary().expect("explicit binary");
        assert_eq!(binary, PathBuf::from("/opt/browser"));
    }
}
