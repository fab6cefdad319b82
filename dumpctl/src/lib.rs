// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Store process core dumps without an init-system daemon.
//!
//! The kernel is pointed at `dumpctl store` through
//! `/proc/sys/kernel/core_pattern`. Each time a process dies with a core
//! dump, the kernel runs `dumpctl` with the crash parameters as arguments
//! and the core image on stdin, and `dumpctl` writes both into a new
//! directory:
//!
//! ```text
//! <dir>/<YYYY-MM-DD>_<HH:MM:SS>.pid=<pid>.uid=<uid>/core
//! <dir>/<YYYY-MM-DD>_<HH:MM:SS>.pid=<pid>.uid=<uid>/info.txt
//! ```

pub mod cmd;
pub mod copy;
pub mod crash_event;
pub mod dir_init;
pub mod logging;
pub mod metadata;
pub mod setup;
pub mod staging;
pub mod storage_path;
pub mod store;

pub use crash_event::CrashEvent;
pub use logging::LogConfig;
pub use store::{store, store_from_args, StoreConfig, StoreError, StoredDump};

/// Where crashes are stored when `-d` is not given.
pub const DEFAULT_COREDUMP_DIR: &str = "/var/lib/systemd/coredump";
