// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Streaming copy of a core image from the kernel pipe into a file.

use crate::staging::StagingBuffer;
use slog::{debug, warn, Logger};
use slog_error_chain::InlineErrorChain;
use std::io::{self, ErrorKind, Read, Write};
use thiserror::Error;

/// Transient read/write failures tolerated before a copy is abandoned.
pub const MAX_TRANSIENT_ERRORS: u32 = 10;

#[derive(Debug, Error)]
pub enum CopyError {
    #[error(
        "too many errors while copying core image \
         ({errors} failures, {written} bytes written)"
    )]
    TooManyErrors {
        errors: u32,
        written: u64,
        #[source]
        last_error: Option<io::Error>,
    },
}

/// Copy everything from `input` to `output` through a [`StagingBuffer`].
///
/// Read and write failures are retried until more than
/// [`MAX_TRANSIENT_ERRORS`] of them have been seen in total, at which point
/// the copy stops without touching either stream again. A write that
/// accepts zero bytes counts as a failure. Interrupted calls are retried for
/// free. Bytes already written are left in `output` when the copy fails.
///
/// Returns the number of bytes written, which equals the number read.
pub fn copy_stream<R, W>(
    log: &Logger,
    input: &mut R,
    output: &mut W,
) -> Result<u64, CopyError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = StagingBuffer::new();
    let mut errors: u32 = 0;
    let mut last_error = None;
    let mut read_bytes: u64 = 0;
    let mut written: u64 = 0;
    let mut done_reading = false;

    loop {
        if errors > MAX_TRANSIENT_ERRORS {
            return Err(CopyError::TooManyErrors {
                errors,
                written,
                last_error,
            });
        }

        if !done_reading && !buf.is_full() {
            match input.read(buf.tail_mut()) {
                Ok(0) => {
                    debug!(log, "end of core input";
                        "read_bytes" => read_bytes);
                    done_reading = true;
                }
                Ok(n) => {
                    buf.feed(n);
                    read_bytes += n as u64;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    errors += 1;
                    warn!(
                        log,
                        "error reading input core file, will retry";
                        "errors" => errors,
                        InlineErrorChain::new(&err),
                    );
                    last_error = Some(err);
                    continue;
                }
            }
        }

        // Keep writing while there is no room to read into, or nothing left
        // to read. Otherwise go back and top the buffer up first.
        loop {
            if buf.is_empty() {
                if done_reading {
                    debug_assert_eq!(read_bytes, written);
                    return Ok(written);
                }
                break;
            }

            match output.write(buf.data()) {
                Ok(0) => {
                    errors += 1;
                    warn!(
                        log,
                        "write returned zero bytes written, will retry";
                        "errors" => errors,
                    );
                    break;
                }
                Ok(n) => {
                    buf.consume(n);
                    written += n as u64;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    errors += 1;
                    warn!(
                        log,
                        "write failed, will retry";
                        "errors" => errors,
                        InlineErrorChain::new(&err),
                    );
                    last_error = Some(err);
                    break;
                }
            }

            if !(buf.is_full() || done_reading) {
                break;
            }
        }
    }
}
