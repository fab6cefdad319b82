// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Naming the directory a single crash is stored in.

use crate::crash_event::CrashEvent;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Datelike, Utc};
use thiserror::Error;

/// Size of the buffer a leaf name must fit in, including a terminator.
pub const PATH_MAX: usize = 4096;

/// `strftime(3)` format for the leaf name after the year.
///
/// The year is formatted separately: chrono's `%Y` prefixes years past 9999
/// with `+`, which `strftime(3)` does not.
const LEAF_TIME_FORMAT: &str = "%m-%d_%H:%M:%S";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("store requires an absolute path, but got '{0}'")]
    NotAbsolute(Utf8PathBuf),

    #[error("crash timestamp {0} cannot be represented as a UTC time")]
    TimestampOutOfRange(u64),

    #[error("formatted storage path too long (needed {needed} bytes)")]
    LeafTooLong { needed: usize },
}

/// Location of one stored crash: `<base>/<date>_<time>.pid=<pid>.uid=<uid>`.
///
/// Leaf names only have one-second resolution. Two crashes of the same pid
/// and uid within the same second map to the same directory, and nothing
/// keeps them apart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoragePath {
    base: Utf8PathBuf,
    leaf: String,
}

impl StoragePath {
    pub fn new(
        base: &Utf8Path,
        event: &CrashEvent,
    ) -> Result<StoragePath, PathError> {
        ensure_absolute(base)?;
        let leaf = leaf_name(event)?;
        Ok(StoragePath { base: base.to_owned(), leaf })
    }

    /// The full path of the crash directory.
    pub fn dir(&self) -> Utf8PathBuf {
        self.base.join(&self.leaf)
    }
}

/// Reject base directories that would be resolved against whatever the
/// working directory of the kernel-spawned process happens to be.
pub fn ensure_absolute(base: &Utf8Path) -> Result<(), PathError> {
    if base.as_str().starts_with('/') {
        Ok(())
    } else {
        Err(PathError::NotAbsolute(base.to_owned()))
    }
}

/// Format the leaf directory name for `event`.
pub fn leaf_name(event: &CrashEvent) -> Result<String, PathError> {
    let secs = i64::try_from(event.timestamp)
        .map_err(|_| PathError::TimestampOutOfRange(event.timestamp))?;
    let time = DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or(PathError::TimestampOutOfRange(event.timestamp))?;

    let leaf = format!(
        "{:04}-{}.pid={}.uid={}",
        time.year(),
        time.format(LEAF_TIME_FORMAT),
        event.pid,
        event.uid
    );
    if leaf.len() + 1 > PATH_MAX {
        return Err(PathError::LeafTooLong { needed: leaf.len() + 1 });
    }
    Ok(leaf)
}
