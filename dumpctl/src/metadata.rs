// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `info.txt` record stored next to each core.

use crate::crash_event::CrashEvent;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use thiserror::Error;

pub const METADATA_FILE_NAME: &str = "info.txt";

/// Mode for files written into a crash directory, before the umask.
pub const FILE_MODE: u32 = 0o644;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("could not open {path} file")]
    Open {
        path: Utf8PathBuf,
        #[source]
        err: io::Error,
    },

    #[error("could not write {path} file")]
    Write {
        path: Utf8PathBuf,
        #[source]
        err: io::Error,
    },
}

/// Render the metadata record for `event`.
///
/// `comm` and `path` come from the crashed process and are copied byte for
/// byte, so a hostile process can put arbitrary bytes (including newlines
/// and invalid UTF-8) into this file.
pub fn render_metadata(event: &CrashEvent) -> Vec<u8> {
    let mut record = format!(
        "pid: {}\n\
         uid: {}\n\
         gid: {}\n\
         signal: {}\n\
         timestamp: {}\n",
        event.pid, event.uid, event.gid, event.signal, event.timestamp,
    )
    .into_bytes();
    for (key, value) in [("comm", &event.comm), ("path", &event.exe_path)] {
        record.extend_from_slice(key.as_bytes());
        record.extend_from_slice(b": ");
        record.extend_from_slice(value.as_bytes());
        record.push(b'\n');
    }
    record
}

/// Write `info.txt` for `event` into the crash directory `dir`.
pub fn write_metadata(
    dir: &Utf8Path,
    event: &CrashEvent,
) -> Result<Utf8PathBuf, MetadataError> {
    let path = dir.join(METADATA_FILE_NAME);
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .mode(FILE_MODE)
        .open(&path)
        .map_err(|err| MetadataError::Open { path: path.clone(), err })?;

    file.write_all(&render_metadata(event))
        .map_err(|err| MetadataError::Write { path: path.clone(), err })?;
    Ok(path)
}

#[cfg(test)]
mod test {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use std::ffi::OsStr;

    fn example_event() -> CrashEvent {
        CrashEvent {
            pid: 1234,
            uid: 0,
            gid: 0,
            signal: 11,
            timestamp: 1700000000,
            core_limit: Some("0".to_string()),
            comm: "myprog".into(),
            exe_path: "/usr/bin/myprog".into(),
        }
    }

    #[test]
    fn record_has_fixed_keys_in_order() {
        assert_eq!(
            render_metadata(&example_event()),
            "pid: 1234\n\
             uid: 0\n\
             gid: 0\n\
             signal: 11\n\
             timestamp: 1700000000\n\
             comm: myprog\n\
             path: /usr/bin/myprog\n"
                .as_bytes()
        );
    }

    #[test]
    fn fields_are_not_escaped() {
        let mut event = example_event();
        event.comm = "two words".into();
        event.exe_path = "/tmp/evil\npid: 1".into();
        let record = String::from_utf8(render_metadata(&event)).unwrap();
        assert!(record.contains("comm: two words\n"));
        assert!(record.ends_with("path: /tmp/evil\npid: 1\n"));
    }

    #[test]
    fn non_utf8_fields_are_copied_verbatim() {
        let mut event = example_event();
        event.comm = OsStr::from_bytes(b"my\xffprog").to_owned();
        event.exe_path = OsStr::from_bytes(b"/opt/\xfe\xff/prog").to_owned();
        let record = render_metadata(&event);
        assert!(record
            .ends_with(b"comm: my\xffprog\npath: /opt/\xfe\xff/prog\n"));
    }

    #[test]
    fn writes_info_txt() {
        let tmp = Utf8TempDir::new().unwrap();
        let path = write_metadata(tmp.path(), &example_event()).unwrap();
        assert_eq!(path, tmp.path().join("info.txt"));
        assert_eq!(
            std::fs::read(&path).unwrap(),
            render_metadata(&example_event())
        );
    }

    #[test]
    fn missing_directory_fails_to_open() {
        let tmp = Utf8TempDir::new().unwrap();
        let err = write_metadata(&tmp.path().join("missing"), &example_event())
            .unwrap_err();
        assert!(matches!(err, MetadataError::Open { .. }), "{err:?}");
    }
}
