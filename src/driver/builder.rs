//! Builder pattern for session configuration.
//!
//! Provides a fluent API for configuring and launching [`Session`] instances.
//!
//! # Example
//!
//! ```no_run
//! use proton::Session;
//!
//! # async fn example() -> proton::Result<()> {
//! let session = Session::builder()
//!     .title("Hello")
//!     .window_size(800, 600)
//!     .launch()
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use crate::browser::Session;
use crate::error::Result;
use crate::protocol::WindowState;

use super::binary::Flavor;
use super::options::BrowserOptions;

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for launching a [`Session`].
///
/// Use [`Session::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct SessionBuilder {
    options: BrowserOptions,
}

// ============================================================================
// SessionBuilder Implementation
// ============================================================================

impl SessionBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder from existing options.
    #[inline]
    #[must_use]
    pub fn from_options(options: BrowserOptions) -> Self {
        Self { options }
    }

    /// Sets the blank start page title.
    #[inline]
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.options.title = title.into();
        self
    }

    /// Sets the page opened at startup.
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.options.url = Some(url.into());
        self
    }

    /// Enables debug mode: console output at `info` and devtools open.
    #[inline]
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.options.debug = debug;
        self
    }

    /// Sets the user data directory.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory to use, created if missing
    /// * `keep` - Leave the directory on disk after close
    #[inline]
    #[must_use]
    pub fn user_data_dir(mut self, path: impl Into<PathBuf>, keep: bool) -> Self {
        self.options.user_data_dir = Some(path.into());
        self.options.keep_user_data_dir = keep;
        self
    }

    /// Keeps the (possibly temporary) user data directory after close.
    #[inline]
    #[must_use]
    pub fn keep_user_data_dir(mut self) -> Self {
        self.options.keep_user_data_dir = true;
        self
    }

    /// Sets window size in pixels.
    #[inline]
    #[must_use]
    pub fn window_size(mut self, width: u32, height: u32) -> Self {
        self.options.window_size = Some((width, height));
        self
    }

    /// Sets the initial window state.
    #[inline]
    #[must_use]
    pub fn window_state(mut self, state: WindowState) -> Self {
        self.options.window_state = state;
        self
    }

    /// Sets the browser family.
    #[inline]
    #[must_use]
    pub fn flavor(mut self, flavor: Flavor) -> Self {
        self.options.flavor = flavor;
        self
    }

    /// Sets the browser executable, skipping discovery.
    #[inline]
    #[must_use]
    pub fn binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.binary = Some(path.into());
        self
    }

    /// Runs without a visible window.
    #[inline]
    #[must_use]
    pub fn headless(mut self) -> Self {
        self.options.headless = true;
        self
    }

    /// Adds a custom command-line argument.
    #[inline]
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.options.extra_args.push(arg.into());
        self
    }

    /// Adds multiple custom command-line arguments.
    #[inline]
    #[must_use]
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.options.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the time allowed from spawn to a ready session.
    #[inline]
    #[must_use]
    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.options.startup_timeout = timeout;
        self
    }

    /// Returns the accumulated options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &BrowserOptions {
        &self.options
    }

    /// Launches the browser and attaches a session.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`](crate::Error::Config) if the options are invalid
    /// - [`Error::BrowserNotFound`](crate::Error::BrowserNotFound) if no binary is installed
    /// - Any startup error from the launch sequence
    pub async fn launch(self) -> Result<Session> {
        Session::launch(self.options).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_default_options() {
        let builder = SessionBuilder::new();
        assert_eq!(builder.options(), &BrowserOptions::default());
    }

    #[test]
    fn test_setters_fill_options() {
        let builder = SessionBuilder::new()
            .title("App")
            .url("https://example.com")
            .debug(true)
            .window_size(640, 480)
            .window_state(WindowState::Fullscreen)
            .flavor(Flavor::Edge)
            .binary("/opt/edge")
            .arg("--one")
            .args(["--two", "--three"])
            .startup_timeout(Duration::from_secs(5));

        let options = builder.options();
        assert_eq!(options.title, "App");
        assert_eq!(options.url.as_deref(), Some("https://example.com"));
        assert!(options.debug);
        assert_eq!(options.window_size, Some((640, 480)));
        assert_eq!(options.window_state, WindowState::Fullscreen);
        assert_eq!(options.flavor, Flavor::Edge);
        assert_eq!(options.binary, Some(PathBuf::from("/opt/edge")));
        assert_eq!(options.extra_args, ["--one", "--two", "--three"]);
        assert_eq!(options.startup_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_user_data_dir_sets_keep() {
        let builder = SessionBuilder::new().user_data_dir("/tmp/data", true);
        assert_eq!(builder.options().user_data_dir, Some(PathBuf::from("/tmp/data")));
        assert!(builder.options().keep_user_data_dir);
    }

    #[test]
    fn test_headless() {
        assert!(SessionBuilder::new().headless().options().is_headless());
    }

    #[tokio::test]
    async fn test_launch_fails_with_nonexistent_binary() {
        let err = SessionBuilder::new()
            .binary("/nonexistent/chrome")
            .launch()
            .await
            .expect_err("missing binary");
        assert!(err.to_string().contains("/nonexistent/chrome"));
    }

    #[test]
    fn test_builder_is_clone() {
        let builder = SessionBuilder::new().binary("/usr/bin/chromium");
        let cloned = builder.clone();
        assert_eq!(builder.options(), cloned.options());
    }
}
