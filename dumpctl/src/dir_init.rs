// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Creating every directory along a storage path.

use camino::{Utf8Path, Utf8PathBuf};
use slog::{debug, Logger};
use std::fs::DirBuilder;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use thiserror::Error;

/// Mode passed to `mkdir(2)` for each component, before the umask.
pub const DIR_MODE: u32 = 0o777;

#[derive(Debug, Error)]
#[error("could not create path '{path}', mkdir failed")]
pub struct CreateDirError {
    pub path: Utf8PathBuf,
    #[source]
    pub err: io::Error,
}

/// Every prefix of `path` that names a directory, shortest first.
///
/// `/var/lib/coredumps` yields `/var`, `/var/lib`, `/var/lib/coredumps`.
/// The root itself is never included.
pub fn path_prefixes(path: &Utf8Path) -> Vec<&Utf8Path> {
    let mut prefixes: Vec<&Utf8Path> = path
        .ancestors()
        .filter(|p| !p.as_str().is_empty() && p.as_str() != "/")
        .collect();
    prefixes.reverse();
    prefixes
}

/// Create each directory in `path_prefixes(path)` in order. Components that
/// already exist are left alone, so running this twice is harmless.
///
/// Any other `mkdir` failure stops the walk. Directories created before the
/// failure are not removed.
pub fn create_dir_prefixes(
    log: &Logger,
    path: &Utf8Path,
) -> Result<(), CreateDirError> {
    let mut builder = DirBuilder::new();
    builder.mode(DIR_MODE);

    for prefix in path_prefixes(path) {
        match builder.create(prefix) {
            Ok(()) => debug!(log, "created directory"; "path" => %prefix),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
            Err(err) => {
                return Err(CreateDirError { path: prefix.to_owned(), err })
            }
        }
    }
    Ok(())
}
