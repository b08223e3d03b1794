//! Browser user data directory management.
//!
//! Every session runs against its own user data directory:
//!
//! - Temporary directories are created under the system temp dir and
//!   removed on close (or on drop) unless kept
//! - Caller-supplied directories are created if missing and removed on close
//!   unless kept
//!
//! # Example
//!
//! ```no_run
//! use proton::driver::Profile;
//!
//! # fn example() -> proton::Result<()> {
//! let profile = Profile::new_temp(false)?;
//! println!("Profile at: {}", profile.path().display());
//! profile.close()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Prefix of temporary profile directories.
const TEMP_PREFIX: &str = "proton-userdata-";

// ============================================================================
// Profile
// ============================================================================

/// A browser user data directory.
///
/// # Temporary Profiles
///
/// Created with [`Profile::new_temp()`]. Dropping the profile deletes the
/// directory unless `keep` was requested.
///
/// # Caller Profiles
///
/// Created with [`Profile::from_path()`]. Only [`Profile::close()`] deletes
/// them, and only when `keep` is off.
#[derive(Debug)]
pub struct Profile {
    /// Temporary directory handle (keeps the temp dir alive).
    temp_dir: Option<TempDir>,

    /// Path to the profile directory.
    path: PathBuf,

    /// Leave the directory on disk at close.
    keep: bool,
}

// ============================================================================
// Profile - Constructors
// ============================================================================

impl Profile {
    /// Creates a new temporary profile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Profile`] if the directory cannot be created.
    pub fn new_temp(keep: bool) -> Result<Self> {
        let temp_dir = TempDir::with_prefix(TEMP_PREFIX)
            .map_err(|e| Error::profile(format!("Failed to create temp profile: {e}")))?;

        let path = temp_dir.path().to_path_buf();
        debug!(path = %path.display(), keep, "Created temporary profile");

        Ok(Self {
            temp_dir: Some(temp_dir),
            path,
            keep,
        })
    }

    /// Uses a caller-supplied directory, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Profile`] if the directory cannot be created.
    pub fn from_path(path: impl Into<PathBuf>, keep: bool) -> Result<Self> {
        let path = path.into();

        if path.exists() {
            debug!(path = %path.display(), "Using existing profile directory");
        } else {
            fs::create_dir_all(&path).map_err(|e| {
                Error::profile(format!(
                    "Failed to create profile directory at {}: {e}",
                    path.display()
                ))
            })?;
            debug!(path = %path.display(), "Created profile directory");
        }

        Ok(Self {
            temp_dir: None,
            path,
            keep,
        })
    }

    /// Creates a profile from optional caller configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Profile`] if the directory cannot be created.
    pub fn prepare(path: Option<&Path>, keep: bool) -> Result<Self> {
        match path {
            Some(path) => Self::from_path(path, keep),
            None => Self::new_temp(keep),
        }
    }
}

// ============================================================================
// Profile - Accessors
// ============================================================================

impl Profile {
    /// Returns the path to the profile directory.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if the directory survives close.
    #[inline]
    #[must_use]
    pub const fn is_kept(&self) -> bool {
        self.keep
    }

    /// Returns `true` if the directory was created by this profile.
    #[inline]
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        self.temp_dir.is_some()
    }
}

// ============================================================================
// Profile - Cleanup
// ============================================================================

impl Profile {
    /// Releases the directory, deleting it unless kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Profile`] if deletion fails.
    pub fn close(mut self) -> Result<()> {
        match (self.temp_dir.take(), self.keep) {
            (Some(temp_dir), true) => {
                let path = temp_dir.keep();
                debug!(path = %path.display(), "Kept temporary profile");
            }
            (Some(temp_dir), false) => {
                temp_dir.close().map_err(|e| {
                    Error::profile(format!(
                        "Failed to remove profile at {}: {e}",
                        self.path.display()
                    ))
                })?;
                debug!(path = %self.path.display(), "Removed temporary profile");
            }
            (None, true) => {}
            (None, false) => {
                if self.path.exists() {
                    fs::remove_dir_all(&self.path).map_err(|e| {
                        Error::profile(format!(
                            "Failed to remove profile at {}: {e}",
                            self.path.display()
                        ))
                    })?;
                    debug!(path = %self.path.display(), "Removed profile directory");
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::Profile;

    #[test]
    fn test_new_temp_creates_directory() {
        let profile = Profile::new_temp(false).expect("create temp profile");
        assert!(profile.path().is_dir());
        assert!(profile.is_temporary());
    }

    #[test]
    fn test_temp_profile_cleanup_on_drop() {
        let path = {
            let profile = Profile::new_temp(false).expect("create temp profile");
            profile.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_temp_profile_removed_on_close() {
        let profile = Profile::new_temp(false).expect("create temp profile");
        let path = profile.path().to_path_buf();
        profile.close().expect("close");
        assert!(!path.exists());
    }

    #[test]
    fn test_kept_temp_profile_survives_close() {
        let profile = Profile::new_temp(true).expect("create temp profile");
        let path = profile.path().to_path_buf();
        profile.close().expect("close");
        assert!(path.exists());
        std::fs::remove_dir_all(&path).expect("cleanup");
    }

    #[test]
    fn test_from_path_creates_and_removes_directory() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let profile_path = temp.path().join("test_profile");

        let profile = Profile::from_path(&profile_path, false).expect("create profile");
        assert!(profile_path.is_dir());
        assert!(!profile.is_temporary());

        profile.close().expect("close");
        assert!(!profile_path.exists());
    }

    #[test]
    fn test_kept_path_profile_survives_close() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let profile_path = temp.path().join("kept");

        let profile = Profile::prepare(Some(&profile_path), true).expect("create profile");
        assert!(profile.is_kept());
        profile.close().expect("close");
        assert!(profile_path.is_dir());
    }
}
