// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Kernel core_pattern handler: stores crash dumps under a local directory

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use dumpctl::cmd::{fatal, CmdError};
use dumpctl::setup::{self, CORE_PATTERN_PATH};
use dumpctl::{
    store_from_args, LogConfig, StoreConfig, StoreError, DEFAULT_COREDUMP_DIR,
};
use slog::{warn, Level, Logger};
use std::ffi::{OsStr, OsString};

#[derive(Debug, Parser)]
#[command(
    name = "dumpctl",
    about = "Store process core dumps piped in by the kernel"
)]
struct Args {
    /// Directory crash dumps are stored under
    #[arg(short, long, default_value = DEFAULT_COREDUMP_DIR)]
    dir: Utf8PathBuf,

    /// Log to stderr only
    #[arg(long)]
    no_syslog: bool,

    /// Also log debug messages
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Store the core image on stdin (invoked by the kernel)
    Store {
        /// <pid> <uid> <gid> <signal> <timestamp> [<core-limit>] <comm>
        /// <exe-path>
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<OsString>,
    },
    /// Register this program as the kernel's core handler
    #[command(alias = "store-setup")]
    Setup {
        /// File the core pattern is written to
        #[arg(long, default_value = CORE_PATTERN_PATH)]
        core_pattern: Utf8PathBuf,
    },
    /// List stored crashes
    List,
    /// Show a stored crash
    Info,
    /// Open a stored crash in gdb
    Gdb,
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::Store { .. } => "store",
            Action::Setup { .. } => "setup",
            Action::List => "list",
            Action::Info => "info",
            Action::Gdb => "gdb",
        }
    }
}

fn main() {
    let args = Args::parse();
    let log = LogConfig {
        syslog: !args.no_syslog,
        level: if args.verbose { Level::Debug } else { Level::Info },
    }
    .to_logger();

    if let Err(cmd_error) = run(&log, args) {
        fatal(log, cmd_error);
    }
}

fn run(log: &Logger, args: Args) -> Result<(), CmdError> {
    match &args.action {
        Action::Store { args: tokens } => {
            let config = StoreConfig { base_dir: args.dir.clone() };
            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            store_from_args(log, &config, tokens.as_slice(), &mut input)
                .map(|_| ())
                .map_err(store_error)
        }
        Action::Setup { core_pattern } => {
            let argv0 = std::env::args_os().next();
            let argv0 = argv0.as_deref().and_then(OsStr::to_str);
            let exe = setup::resolve_self(argv0)
                .context("could not locate dumpctl executable")
                .map_err(CmdError::Failure)?;
            let dir = (args.dir.as_str() != DEFAULT_COREDUMP_DIR)
                .then_some(args.dir.as_path());
            setup::setup(log, &exe, dir, core_pattern)
                .with_context(|| format!("failed to set up {core_pattern}"))
                .map(|_| ())
                .map_err(CmdError::Failure)
        }
        action @ (Action::List | Action::Info | Action::Gdb) => {
            let name = action.name();
            warn!(log, "action {name} is unimplemented");
            Err(CmdError::Failure(anyhow::anyhow!("{name} failed")))
        }
    }
}

fn store_error(err: StoreError) -> CmdError {
    let stage = err.stage();
    match err {
        StoreError::Args(err) => CmdError::Usage(format!("store: {err}")),
        err => CmdError::Failure(
            anyhow::Error::new(err)
                .context(format!("store failed at stage '{stage}'")),
        ),
    }
}
