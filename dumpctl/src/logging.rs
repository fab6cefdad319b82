// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Logger construction.
//!
//! `dumpctl` usually runs with no terminal attached: the kernel spawns it
//! with stdin connected to the crashing process and nobody watching stderr.
//! Diagnostics therefore go to the system log as well as to stderr.

use slog::{
    o, Drain, Level, LevelFilter, Logger, Never, OwnedKVList, Record, KV,
};
use std::fmt::{self, Write as _};
use std::sync::Mutex;
use syslog::{Facility, Formatter3164, LoggerBackend};

/// Process name reported to syslog.
pub const SYSLOG_IDENT: &str = "dumpctl";

/// How diagnostics are emitted. Built once in `main` and turned into the
/// [`Logger`] handed to everything else.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogConfig {
    /// Mirror every record to the local syslog daemon.
    pub syslog: bool,
    /// Least severe level that is emitted.
    pub level: Level,
}

impl LogConfig {
    pub fn to_logger(&self) -> Logger {
        let decorator = slog_term::TermDecorator::new().stderr().build();
        let stderr_drain = slog_term::FullFormat::new(decorator).build().fuse();

        let syslog_drain = if self.syslog {
            match SyslogDrain::new(SYSLOG_IDENT) {
                Ok(drain) => Some(drain),
                Err(err) => {
                    // There is no logger yet to report this through.
                    eprintln!(
                        "warning: syslog unavailable, logging to stderr \
                         only: {err}"
                    );
                    None
                }
            }
        } else {
            None
        };

        let drain: Box<dyn Drain<Ok = (), Err = Never> + Send> =
            match syslog_drain {
                Some(syslog_drain) => Box::new(
                    slog::Duplicate::new(stderr_drain, syslog_drain)
                        .ignore_res(),
                ),
                None => Box::new(stderr_drain),
            };

        // The async drain flushes when the last `Logger` clone is dropped,
        // so callers must drop the logger before `process::exit`.
        let drain = slog_async::Async::new(drain).build().fuse();
        let drain = LevelFilter::new(drain, self.level).fuse();
        Logger::root(drain, o!())
    }
}

type SyslogLogger = syslog::Logger<LoggerBackend, Formatter3164>;

/// A drain that forwards records to syslog over its unix socket.
pub struct SyslogDrain {
    inner: Mutex<SyslogLogger>,
}

impl SyslogDrain {
    pub fn new(ident: &str) -> Result<Self, syslog::Error> {
        let formatter = Formatter3164 {
            facility: Facility::LOG_DAEMON,
            hostname: None,
            process: ident.to_string(),
            pid: std::process::id(),
        };
        let inner = syslog::unix(formatter)?;
        Ok(SyslogDrain { inner: Mutex::new(inner) })
    }
}

impl Drain for SyslogDrain {
    type Ok = ();
    type Err = Never;

    fn log(
        &self,
        record: &Record<'_>,
        values: &OwnedKVList,
    ) -> Result<(), Never> {
        let line = format_record(record, values);
        // Losing a line to a broken syslog socket is preferable to failing
        // the store; stderr still gets it.
        let Ok(mut inner) = self.inner.lock() else {
            return Ok(());
        };
        let _ = match record.level() {
            Level::Critical => inner.crit(line),
            Level::Error => inner.err(line),
            Level::Warning => inner.warning(line),
            Level::Info => inner.info(line),
            Level::Debug | Level::Trace => inner.debug(line),
        };
        Ok(())
    }
}

/// Render the message followed by ` key=value` for every pair, record
/// pairs first.
fn format_record(record: &Record<'_>, values: &OwnedKVList) -> String {
    let mut line = record.msg().to_string();
    let mut serializer = KvAppender(&mut line);
    let _ = record.kv().serialize(record, &mut serializer);
    let _ = values.serialize(record, &mut serializer);
    line
}

struct KvAppender<'a>(&'a mut String);

impl slog::Serializer for KvAppender<'_> {
    fn emit_arguments(
        &mut self,
        key: slog::Key,
        val: &fmt::Arguments<'_>,
    ) -> slog::Result {
        write!(self.0, " {key}={val}")?;
        Ok(())
    }
}
