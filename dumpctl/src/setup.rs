// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `setup` action: register `dumpctl` as the kernel's core handler.

use crate::storage_path::{ensure_absolute, PathError};
use camino::{Utf8Path, Utf8PathBuf};
use slog::{info, Logger};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

/// The sysctl the kernel reads its core handler from.
pub const CORE_PATTERN_PATH: &str = "/proc/sys/kernel/core_pattern";

/// Kernel placeholders, in the order `store` expects them: global pid, uid,
/// gid, signal, unix time, core size limit, executable name, executable
/// path.
pub const STORE_TEMPLATE: &str = "store %P %u %g %s %t %c %e %E";

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to determine real path of '{argv0}'")]
    Resolve {
        argv0: String,
        #[source]
        err: io::Error,
    },

    #[error("resolved executable path is not valid UTF-8: {0:?}")]
    NotUtf8(PathBuf),

    #[error(
        "the kernel splits core_pattern on whitespace, so '{0}' cannot \
         be used in it"
    )]
    Whitespace(Utf8PathBuf),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("could not open {path} to configure system, check perms")]
    Open {
        path: Utf8PathBuf,
        #[source]
        err: io::Error,
    },

    #[error("failed to write to {path} (but open worked)")]
    Write {
        path: Utf8PathBuf,
        #[source]
        err: io::Error,
    },
}

/// Build the `core_pattern` line that pipes cores into `exe store ...`.
///
/// `dir` is passed along as `-d` so the kernel-spawned handler stores into
/// the same place the operator chose at setup time.
pub fn render_core_pattern(exe: &Utf8Path, dir: Option<&Utf8Path>) -> String {
    match dir {
        Some(dir) => format!("| {exe} -d {dir} {STORE_TEMPLATE}"),
        None => format!("| {exe} {STORE_TEMPLATE}"),
    }
}

/// Find the absolute, symlink-free path of the running executable.
///
/// `argv0` is tried first, so setting up from a symlinked install records
/// the real binary. When it is a bare command name found through `$PATH`,
/// the kernel's idea of our executable is used instead.
pub fn resolve_self(argv0: Option<&str>) -> Result<Utf8PathBuf, SetupError> {
    let (name, path) = match argv0 {
        Some(argv0) if argv0.contains('/') => {
            (argv0.to_string(), PathBuf::from(argv0))
        }
        _ => {
            let exe = std::env::current_exe().map_err(|err| {
                SetupError::Resolve {
                    argv0: argv0.unwrap_or_default().to_string(),
                    err,
                }
            })?;
            (exe.display().to_string(), exe)
        }
    };
    let real = std::fs::canonicalize(&path)
        .map_err(|err| SetupError::Resolve { argv0: name, err })?;
    Utf8PathBuf::try_from(real)
        .map_err(|e| SetupError::NotUtf8(e.into_path_buf()))
}

/// Point the kernel's `core_pattern` at `exe`.
///
/// Returns the pattern that was written.
pub fn setup(
    log: &Logger,
    exe: &Utf8Path,
    dir: Option<&Utf8Path>,
    core_pattern: &Utf8Path,
) -> Result<String, SetupError> {
    for path in std::iter::once(exe).chain(dir) {
        if path.as_str().contains(char::is_whitespace) {
            return Err(SetupError::Whitespace(path.to_owned()));
        }
    }
    ensure_absolute(exe)?;
    if let Some(dir) = dir {
        ensure_absolute(dir)?;
    }

    let pattern = render_core_pattern(exe, dir);
    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(core_pattern)
        .map_err(|err| SetupError::Open {
            path: core_pattern.to_owned(),
            err,
        })?;
    file.write_all(pattern.as_bytes()).map_err(|err| SetupError::Write {
        path: core_pattern.to_owned(),
        err,
    })?;

    info!(log, "installed core handler";
        "core_pattern" => %core_pattern,
        "pattern" => &pattern,
    );
    Ok(pattern)
}
