//! Browser binary discovery.
//!
//! Looks for a Chromium-family browser in the usual install locations of the
//! current platform.
//!
//! | Flavor | Linux | macOS | Windows |
//! |--------|-------|-------|---------|
//! | Chrome | `/usr/bin/google-chrome*`, `chromium*` | `/Applications/...` | `%ProgramFiles%`, `%LocalAppData%` |
//! | Edge | `/usr/bin/microsoft-edge*` | `/Applications/Microsoft Edge.app` | `%ProgramFiles%`, `%LocalAppData%` |

// ============================================================================
// Imports
// ============================================================================

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// Flavor
// ============================================================================

/// Browser family to launch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Flavor {
    /// Google Chrome or Chromium.
    #[default]
    Chrome,
    /// Microsoft Edge.
    Edge,
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chrome => f.write_str("Chrome"),
            Self::Edge => f.write_str("Edge"),
        }
    }
}

impl Flavor {
    /// Returns the install locations checked for this flavor, in order.
    #[must_use]
    pub fn candidates(self) -> Vec<PathBuf> {
        if cfg!(target_os = "macos") {
            self.macos_candidates()
        } else if cfg!(target_os = "windows") {
            self.windows_candidates()
        } else {
            self.unix_candidates()
        }
    }

    /// Returns the first existing install location.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BrowserNotFound`] if none exists.
    pub fn locate(self) -> Result<PathBuf> {
        let found = self.candidates().into_iter().find(|path| is_file(path));

        match found {
            Some(path) => {
                debug!(flavor = %self, path = %path.display(), "Browser binary found");
                Ok(path)
            }
            None => Err(Error::browser_not_found(self)),
        }
    }

    fn macos_candidates(self) -> Vec<PathBuf> {
        let paths: &[&str] = match self {
            Self::Chrome => &[
                "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
                "/Applications/Chromium.app/Contents/MacOS/Chromium",
                "/usr/bin/google-chrome-stable",
                "/usr/bin/google-chrome",
                "/usr/bin/chromium",
                "/usr/bin/chromium-browser",
            ],
            Self::Edge => &["/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge"],
        };
        paths.iter().map(PathBuf::from).collect()
    }

    fn windows_candidates(self) -> Vec<PathBuf> {
        let roots = ["LocalAppData", "ProgramFiles", "ProgramFiles(x86)"];
        let suffixes: &[&str] = match self {
            Self::Chrome => &[
                "Google/Chrome/Application/chrome.exe",
                "Chromium/Application/chrome.exe",
            ],
            Self::Edge => &["Microsoft/Edge/Application/msedge.exe"],
        };

        let mut paths = Vec::new();
        if self == Self::Chrome {
            paths.push(PathBuf::from("C:/Program Files/Google/Chrome/Application/chrome.exe"));
        }
        for suffix in suffixes {
            for root in roots {
                if let Some(dir) = env::var_os(root) {
                    paths.push(Path::new(&dir).join(suffix));
                }
            }
        }
        paths
    }

    fn unix_candidates(self) -> Vec<PathBuf> {
        let paths: &[&str] = match self {
            Self::Chrome => &[
                "/usr/bin/google-chrome-stable",
                "/usr/bin/google-chrome",
                "/usr/bin/chromium",
                "/usr/bin/chromium-browser",
            ],
            Self::Edge => &["/usr/bin/microsoft-edge", "/usr/bin/microsoft-edge-dev"],
        };
        paths.iter().map(PathBuf::from).collect()
    }
}

fn is_file(path: &Path) -> bool {
    path.metadata().map(|meta| meta.is_file()).unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================
