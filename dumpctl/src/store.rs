// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `store` action: persist one crash's core image and metadata.
//!
//! A store runs through a fixed sequence of stages:
//!
//! ```text
//! ValidateArgs -> BuildPath -> CreateDirs -> OpenStoreDir -> CopyCore
//!     -> WriteMetadata -> Done
//! ```
//!
//! The first failing stage ends the store. Nothing is cleaned up afterwards:
//! a crash directory holding only a partial `core` is left for whoever looks
//! at it next.

use crate::copy::{copy_stream, CopyError};
use crate::crash_event::{ArgsError, CrashEvent};
use crate::dir_init::{create_dir_prefixes, CreateDirError};
use crate::metadata::{write_metadata, MetadataError, FILE_MODE};
use crate::storage_path::{PathError, StoragePath};
use camino::{Utf8Path, Utf8PathBuf};
use slog::{debug, info, o, Logger};
use std::ffi::OsStr;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use thiserror::Error;

pub const CORE_FILE_NAME: &str = "core";

/// Where crashes are stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Absolute directory that per-crash directories are created under.
    pub base_dir: Utf8PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreStage {
    ValidateArgs,
    BuildPath,
    CreateDirs,
    OpenStoreDir,
    CopyCore,
    WriteMetadata,
    Done,
}

impl fmt::Display for StoreStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StoreStage::ValidateArgs => "validate arguments",
            StoreStage::BuildPath => "build storage path",
            StoreStage::CreateDirs => "create directories",
            StoreStage::OpenStoreDir => "open storage directory",
            StoreStage::CopyCore => "copy core",
            StoreStage::WriteMetadata => "write metadata",
            StoreStage::Done => "done",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Args(#[from] ArgsError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    CreateDirs(#[from] CreateDirError),

    #[error("failed to open storage dir '{path}'")]
    OpenStoreDir {
        path: Utf8PathBuf,
        #[source]
        err: io::Error,
    },

    #[error("could not open core file '{path}'")]
    OpenCore {
        path: Utf8PathBuf,
        #[source]
        err: io::Error,
    },

    #[error("could not read/write core file '{path}'")]
    Copy {
        path: Utf8PathBuf,
        #[source]
        err: CopyError,
    },

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

impl StoreError {
    /// The stage that failed.
    pub fn stage(&self) -> StoreStage {
        match self {
            StoreError::Args(_) => StoreStage::ValidateArgs,
            StoreError::Path(_) => StoreStage::BuildPath,
            StoreError::CreateDirs(_) => StoreStage::CreateDirs,
            StoreError::OpenStoreDir { .. } => StoreStage::OpenStoreDir,
            StoreError::OpenCore { .. } | StoreError::Copy { .. } => {
                StoreStage::CopyCore
            }
            StoreError::Metadata(_) => StoreStage::WriteMetadata,
        }
    }
}

/// What a successful store left on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredDump {
    pub dir: Utf8PathBuf,
    pub core_path: Utf8PathBuf,
    pub metadata_path: Utf8PathBuf,
    pub core_bytes: u64,
}

/// Decode the positional `store` arguments and then [`store`] the crash.
///
/// Arguments are fully validated before anything touches the filesystem.
pub fn store_from_args<S, R>(
    log: &Logger,
    config: &StoreConfig,
    args: &[S],
    input: &mut R,
) -> Result<StoredDump, StoreError>
where
    S: AsRef<OsStr>,
    R: Read + ?Sized,
{
    debug!(log, "stage"; "stage" => %StoreStage::ValidateArgs);
    let event = CrashEvent::from_args(args)?;
    store(log, config, &event, input)
}

/// Store the core image read from `input` for the crash described by
/// `event`.
pub fn store<R>(
    log: &Logger,
    config: &StoreConfig,
    event: &CrashEvent,
    input: &mut R,
) -> Result<StoredDump, StoreError>
where
    R: Read + ?Sized,
{
    let log = log.new(o!(
        "pid" => event.pid,
        "uid" => event.uid,
        "signal" => event.signal,
    ));
    debug!(log, "storing crash";
        "comm" => %event.comm.to_string_lossy(),
        "exe_path" => %event.exe_path.to_string_lossy(),
        "core_limit" => ?event.core_limit,
    );

    debug!(log, "stage"; "stage" => %StoreStage::BuildPath);
    let storage_path = StoragePath::new(&config.base_dir, event)?;
    let dir = storage_path.dir();

    debug!(log, "stage"; "stage" => %StoreStage::CreateDirs, "dir" => %dir);
    create_dir_prefixes(&log, &dir)?;

    debug!(log, "stage"; "stage" => %StoreStage::OpenStoreDir);
    open_store_dir(&dir)?;

    debug!(log, "stage"; "stage" => %StoreStage::CopyCore);
    let core_path = dir.join(CORE_FILE_NAME);
    let core_bytes = {
        let mut core = OpenOptions::new()
            .write(true)
            .create(true)
            .mode(FILE_MODE)
            .open(&core_path)
            .map_err(|err| StoreError::OpenCore {
                path: core_path.clone(),
                err,
            })?;
        copy_stream(&log, input, &mut core)
            .map_err(|err| StoreError::Copy { path: core_path.clone(), err })?
    };

    debug!(log, "stage"; "stage" => %StoreStage::WriteMetadata);
    let metadata_path = write_metadata(&dir, event)?;

    debug!(log, "stage"; "stage" => %StoreStage::Done);
    info!(log, "stored core";
        "dir" => %dir,
        "core_bytes" => core_bytes,
    );
    Ok(StoredDump { dir, core_path, metadata_path, core_bytes })
}

fn open_store_dir(dir: &Utf8Path) -> Result<File, StoreError> {
    let open_err =
        |err| StoreError::OpenStoreDir { path: dir.to_owned(), err };
    let file = File::open(dir).map_err(open_err)?;
    let metadata = file.metadata().map_err(open_err)?;
    if !metadata.is_dir() {
        return Err(open_err(io::Error::other("not a directory")));
    }
    Ok(file)
}
