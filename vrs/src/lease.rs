//! Exclusive, crash-visible checkout of a cache file.
//!
//! A file `<name>` is leased by renaming it to `<name>.using`. The rename is atomic, so at
//! most one holder (in this or any other process) owns a given file. On release the file is
//! renamed back to `<name>`, unless the lease was marked leaked (the key was revealed), in
//! which case it is retired to `<name>.used` and never offered again. Files left as
//! `.using` by a crashed holder are never selected.

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Suffix of a leased file.
pub const USING: &str = "using";

/// Suffix of a retired file.
pub const USED: &str = "used";

/// Result of releasing a [`Lease`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The file is available for selection again.
    Returned,
    /// The file will never be selected again.
    Retired,
}

/// Appends `.suffix` to `path`.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Exclusive ownership of a cache file.
#[derive(Debug)]
pub struct Lease {
    base: PathBuf,
    using: PathBuf,
    leaked: bool,
    finished: bool,
}

impl Lease {
    /// Attempts to lease the file at `base`. Returns `None` if it does not exist or is
    /// already leased.
    pub fn acquire(base: impl Into<PathBuf>) -> Option<Self> {
        let base = base.into();
        let using = with_suffix(&base, USING);
        match fs::rename(&base, &using) {
            Ok(()) => {
                debug!(path = ?base, "acquired lease");
                Some(Self {
                    base,
                    using,
                    leaked: false,
                    finished: false,
                })
            }
            Err(err) => {
                debug!(path = ?base, ?err, "lease unavailable");
                None
            }
        }
    }

    /// Path of the leased file while the lease is held.
    pub fn path(&self) -> &Path {
        &self.using
    }

    /// Path the file is returned to on release.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Marks the cached key as revealed: the file is retired on release.
    pub fn set_leaked(&mut self) {
        self.leaked = true;
    }

    pub fn is_leaked(&self) -> bool {
        self.leaked
    }

    /// Returns or retires the file.
    pub fn release(mut self) -> Outcome {
        self.finish()
    }

    /// Deletes the leased file.
    pub fn discard(mut self) {
        self.finished = true;
        if let Err(err) = fs::remove_file(&self.using) {
            warn!(path = ?self.using, ?err, "failed to discard cache file");
        }
    }

    fn finish(&mut self) -> Outcome {
        self.finished = true;
        if !self.leaked {
            match fs::rename(&self.using, &self.base) {
                Ok(()) => {
                    debug!(path = ?self.base, "returned lease");
                    return Outcome::Returned;
                }
                Err(err) => {
                    // The file stays `.using` and is never selected again.
                    warn!(path = ?self.using, ?err, "failed to return cache file");
                    return Outcome::Retired;
                }
            }
        }

        let used = with_suffix(&self.base, USED);
        if let Err(err) = fs::rename(&self.using, &used) {
            warn!(path = ?self.using, ?err, "failed to retire cache file, deleting");
            if let Err(err) = fs::remove_file(&self.using) {
                warn!(path = ?self.using, ?err, "failed to delete leaked cache file");
            }
        } else {
            debug!(path = ?used, "retired lease");
        }
        Outcome::Retired
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if !self.finished {
            self.finish();
        }
    }
}
