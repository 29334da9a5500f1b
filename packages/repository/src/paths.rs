//! Canonical file paths for locally stored reports.
//!
//! Relative paths resolve against the process working directory, matching
//! how the rest of the toolchain addresses its `data/` directory.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Directory holding local data files.
pub const DEFAULT_DATA_DIR: &str = "data";

/// File name of the JSON report store inside [`DEFAULT_DATA_DIR`].
pub const DEFAULT_REPORTS_FILE: &str = "reports.json";

/// Returns the default path of the JSON report store (`data/reports.json`).
#[must_use]
pub fn default_reports_path() -> PathBuf {
    Path::new(DEFAULT_DATA_DIR).join(DEFAULT_REPORTS_FILE)
}

/// Returns the sibling path a file is staged at before being renamed over
/// `path` (`reports.json` -> `reports.json.tmp`).
#[must_use]
pub fn staging_path(path: &Path) -> PathBuf {
    let mut staged = OsString::from(path.as_os_str());
    staged.push(".tmp");
    PathBuf::from(staged)
}
