//! # Utility Functions Module
//!
//! This module provides helpers for building argument vectors for external tools.
//! Arguments are passed straight to the process API, never through a shell, so
//! filenames with quotes or spaces need no escaping. A relative path that starts
//! with `-` still reads as an option, so those go through `dash_safe` first.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Converts one string-like or path-like item into an owned process argument.
///
/// # Example
/// ```rust
/// use any2mp3::utils::os_arg;
/// use std::path::Path;
///
/// let arg = os_arg(Path::new("My Song.wav"));
/// assert_eq!(arg, "My Song.wav");
/// ```
pub fn os_arg<T: AsRef<OsStr>>(item: T) -> OsString {
    item.as_ref().to_os_string()
}

/// Path usable as a positional argument: a relative path starting with `-` gets a
/// leading `./` so the tool can't take it for a flag.
pub fn dash_safe(path: &Path) -> PathBuf {
    if path.is_relative() && path.to_string_lossy().starts_with('-') {
        Path::new(".").join(path)
    } else {
        path.to_path_buf()
    }
}

/// Macro for building argument vectors from mixed `&str`, `String` and `&Path` items.
///
/// # Example
/// ```rust
/// use any2mp3::args;
/// use std::path::Path;
///
/// let bitrate = 192;
/// let args = args!["-b", bitrate.to_string(), Path::new("tmp.wav")];
/// assert_eq!(args.len(), 3);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        ::std::vec![$($crate::utils::os_arg($item)),*]
    };
}
