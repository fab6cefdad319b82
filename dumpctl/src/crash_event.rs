// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoding the crash parameters the kernel passes on the command line.
//!
//! The kernel expands the `core_pattern` template into positional arguments:
//!
//! ```text
//! store %P %u %g %s %t %c %e %E
//! ```
//!
//! that is, global pid, uid, gid, signal number, unix timestamp, core size
//! limit, executable short name and executable path. The core size limit may
//! be left out of the template, so both 7 and 8 tokens are accepted.
//!
//! The name and path are whatever bytes the crashed process had, which need
//! not be UTF-8, so tokens are taken as `OsStr`.

use std::ffi::{OsStr, OsString};
use std::num::IntErrorKind;
use thiserror::Error;

/// Identifying information about one crashed process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrashEvent {
    pub pid: u64,
    pub uid: u64,
    pub gid: u64,
    pub signal: u64,
    /// Seconds since the unix epoch, UTC.
    pub timestamp: u64,
    /// Soft `RLIMIT_CORE` of the crashed process, as passed by the kernel.
    /// Recorded only for debugging.
    pub core_limit: Option<String>,
    /// Executable short name (`comm`), possibly truncated by the kernel.
    pub comm: OsString,
    pub exe_path: OsString,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgsError {
    #[error("store requires 7 or 8 arguments, but got {0}")]
    Arity(usize),

    #[error("failure parsing {name}, '{value}': {reason}")]
    ParseInt { name: &'static str, value: String, reason: &'static str },

    #[error("trailing characters in {name}, '{value}'")]
    TrailingCharacters { name: &'static str, value: String },

    #[error("empty value for {name}")]
    Empty { name: &'static str },

    #[error("{name} is not valid UTF-8: {value:?}")]
    NotUtf8 { name: &'static str, value: OsString },
}

impl CrashEvent {
    /// Build a `CrashEvent` from the positional `store` arguments.
    pub fn from_args<S: AsRef<OsStr>>(args: &[S]) -> Result<Self, ArgsError> {
        let (core_limit, comm, exe_path) = match args {
            [_, _, _, _, _, comm, exe_path] => (None, comm, exe_path),
            [_, _, _, _, _, limit, comm, exe_path] => (
                Some(limit.as_ref().to_string_lossy().into_owned()),
                comm,
                exe_path,
            ),
            _ => return Err(ArgsError::Arity(args.len())),
        };

        Ok(CrashEvent {
            pid: parse_unum(utf8_arg(&args[0], "pid")?, "pid")?,
            uid: parse_unum(utf8_arg(&args[1], "uid")?, "uid")?,
            gid: parse_unum(utf8_arg(&args[2], "gid")?, "gid")?,
            signal: parse_unum(utf8_arg(&args[3], "signal")?, "signal")?,
            timestamp: parse_unum(
                utf8_arg(&args[4], "timestamp")?,
                "timestamp",
            )?,
            core_limit,
            comm: comm.as_ref().to_owned(),
            exe_path: exe_path.as_ref().to_owned(),
        })
    }
}

fn utf8_arg<'a, S: AsRef<OsStr>>(
    arg: &'a S,
    name: &'static str,
) -> Result<&'a str, ArgsError> {
    let arg = arg.as_ref();
    arg.to_str()
        .ok_or_else(|| ArgsError::NotUtf8 { name, value: arg.to_owned() })
}

/// Parse an unsigned integer the way `strtoumax(3)` does with base 0: a
/// `0x`/`0X` prefix selects hex, a leading `0` selects octal, anything else
/// is decimal. Unlike `strtoumax`, signs and leading whitespace are
/// rejected, as is anything left over after the digits.
pub fn parse_unum(value: &str, name: &'static str) -> Result<u64, ArgsError> {
    if value.is_empty() {
        return Err(ArgsError::Empty { name });
    }

    let (digits, radix) = if let Some(hex) =
        value.strip_prefix("0x").or_else(|| value.strip_prefix("0X"))
    {
        (hex, 16)
    } else if value.len() > 1 && value.starts_with('0') {
        (&value[1..], 8)
    } else {
        (value, 10)
    };

    // Split off the longest valid digit prefix so trailing junk can be
    // reported separately from a bad number.
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_digit(radix))
        .map_or(digits.len(), |(i, _)| i);
    if end == 0 {
        return Err(if digits.is_empty() {
            ArgsError::ParseInt {
                name,
                value: value.to_string(),
                reason: "no digits after prefix",
            }
        } else {
            ArgsError::TrailingCharacters { name, value: value.to_string() }
        });
    }
    if end != digits.len() {
        return Err(ArgsError::TrailingCharacters {
            name,
            value: value.to_string(),
        });
    }

    u64::from_str_radix(digits, radix).map_err(|err| ArgsError::ParseInt {
        name,
        value: value.to_string(),
        reason: match err.kind() {
            IntErrorKind::PosOverflow => "numerical result out of range",
            _ => "invalid digit",
        },
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use std::os::unix::ffi::OsStrExt;

    #[test]
    fn parses_eight_tokens() {
        let args = [
            "1234",
            "0",
            "0",
            "11",
            "1700000000",
            "18446744073709551615",
            "myprog",
            "/usr/bin/myprog",
        ];
        let event = CrashEvent::from_args(&args).unwrap();
        assert_eq!(
            event,
            CrashEvent {
                pid: 1234,
                uid: 0,
                gid: 0,
                signal: 11,
                timestamp: 1700000000,
                core_limit: Some("18446744073709551615".to_string()),
                comm: "myprog".into(),
                exe_path: "/usr/bin/myprog".into(),
            }
        );
    }

    #[test]
    fn parses_seven_tokens_without_core_limit() {
        let args =
            ["42", "1000", "100", "6", "1", "my prog", "/opt/my prog/bin"];
        let event = CrashEvent::from_args(&args).unwrap();
        assert_eq!(event.pid, 42);
        assert_eq!(event.uid, 1000);
        assert_eq!(event.gid, 100);
        assert_eq!(event.signal, 6);
        assert_eq!(event.timestamp, 1);
        assert_eq!(event.core_limit, None);
        assert_eq!(event.comm, "my prog");
        assert_eq!(event.exe_path, "/opt/my prog/bin");
    }

    #[test]
    fn keeps_non_utf8_name_and_path() {
        let args: Vec<OsString> = [
            b"1234".as_slice(),
            b"0",
            b"0",
            b"11",
            b"1700000000",
            b"my\xffprog",
            b"/usr/bin/my\xffprog",
        ]
        .into_iter()
        .map(|bytes| OsStr::from_bytes(bytes).to_owned())
        .collect();

        let event = CrashEvent::from_args(&args).unwrap();
        assert_eq!(event.pid, 1234);
        assert_eq!(event.comm.as_bytes(), b"my\xffprog");
        assert_eq!(event.exe_path.as_bytes(), b"/usr/bin/my\xffprog");
    }

    #[test]
    fn rejects_non_utf8_numbers() {
        let mut args: Vec<OsString> =
            ["1", "0", "0", "11", "1700000000", "c", "/p"]
                .into_iter()
                .map(OsString::from)
                .collect();
        args[2] = OsStr::from_bytes(b"1\xff").to_owned();
        assert_eq!(
            CrashEvent::from_args(&args),
            Err(ArgsError::NotUtf8 {
                name: "gid",
                value: OsStr::from_bytes(b"1\xff").to_owned(),
            })
        );
    }

    #[test]
    fn rejects_wrong_arity() {
        let six = ["1", "2", "3", "4", "5", "comm"];
        assert_eq!(CrashEvent::from_args(&six), Err(ArgsError::Arity(6)));

        let nine = ["1"; 9];
        assert_eq!(CrashEvent::from_args(&nine), Err(ArgsError::Arity(9)));

        let none: [&str; 0] = [];
        assert_eq!(CrashEvent::from_args(&none), Err(ArgsError::Arity(0)));
    }

    #[test]
    fn rejects_bad_numbers() {
        let args = ["12x", "0", "0", "11", "1700000000", "c", "/p"];
        assert_eq!(
            CrashEvent::from_args(&args),
            Err(ArgsError::TrailingCharacters {
                name: "pid",
                value: "12x".to_string()
            })
        );

        let args = ["1", "0", "0", "11", "-5", "c", "/p"];
        assert!(matches!(
            CrashEvent::from_args(&args),
            Err(ArgsError::TrailingCharacters { name: "timestamp", .. })
        ));
    }

    #[test]
    fn parse_unum_bases() {
        assert_eq!(parse_unum("0", "n"), Ok(0));
        assert_eq!(parse_unum("10", "n"), Ok(10));
        assert_eq!(parse_unum("0x1f", "n"), Ok(31));
        assert_eq!(parse_unum("0X1F", "n"), Ok(31));
        assert_eq!(parse_unum("017", "n"), Ok(15));
        assert_eq!(parse_unum("18446744073709551615", "n"), Ok(u64::MAX));
    }

    #[test]
    fn parse_unum_errors() {
        assert_eq!(
            parse_unum("", "uid"),
            Err(ArgsError::Empty { name: "uid" })
        );
        assert_eq!(
            parse_unum("18446744073709551616", "uid"),
            Err(ArgsError::ParseInt {
                name: "uid",
                value: "18446744073709551616".to_string(),
                reason: "numerical result out of range",
            })
        );
        assert!(matches!(
            parse_unum("0x", "uid"),
            Err(ArgsError::ParseInt { reason: "no digits after prefix", .. })
        ));
        assert!(matches!(
            parse_unum("09", "uid"),
            Err(ArgsError::TrailingCharacters { .. })
        ));
        assert!(matches!(
            parse_unum(" 1", "uid"),
            Err(ArgsError::TrailingCharacters { .. })
        ));
        assert!(matches!(
            parse_unum("+1", "uid"),
            Err(ArgsError::TrailingCharacters { .. })
        ));
    }
}
