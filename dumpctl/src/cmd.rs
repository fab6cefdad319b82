// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Common facilities for the `dumpctl` command.

use slog::{error, Logger};
use slog_error_chain::InlineErrorChain;

/// Exit status for a failed action.
pub const EXIT_FAILURE: i32 = 1;
/// Exit status for a command line we could not make sense of.
pub const EXIT_USAGE: i32 = 2;

/// Represents a failure of the command as a whole.
#[derive(Debug)]
pub enum CmdError {
    /// Incorrect command-line arguments
    Usage(String),
    /// All other errors
    Failure(anyhow::Error),
}

impl CmdError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CmdError::Usage(_) => EXIT_USAGE,
            CmdError::Failure(_) => EXIT_FAILURE,
        }
    }
}

/// Log `cmd_error` and return the exit status it maps to.
pub fn report(log: &Logger, cmd_error: &CmdError) -> i32 {
    match cmd_error {
        CmdError::Usage(message) => error!(log, "Error: {message}"),
        CmdError::Failure(err) => {
            error!(log, "Error: {}", InlineErrorChain::new(err.as_ref()))
        }
    }
    cmd_error.exit_code()
}

/// Report `cmd_error` and exit the process.
///
/// Takes the logger by value: it is dropped, flushing any records still
/// queued, before the process exits.
pub fn fatal(log: Logger, cmd_error: CmdError) -> ! {
    let code = report(&log, &cmd_error);
    drop(log);
    std::process::exit(code);
}
