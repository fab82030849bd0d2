//! Shared handling for append-only JSON lines files.
//!
//! A crash mid-append leaves at most one torn line at the end of the file.
//! [`read_lines`] drops that tail from disk before the file is reopened for
//! appending, and [`append_line`] cuts a failed write back off, so the next
//! record always starts on a fresh line.

use crate::core::{Error, Result};
use serde::de::DeserializeOwned;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::warn;

/// Parse every line of `path`.
///
/// An unparsable final line is truncated away; an unparsable line anywhere
/// else is an error. A final line missing its newline gets one.
pub fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let bytes = std::fs::read(path)?;
    let mut items = Vec::new();
    let mut keep = 0usize;
    let mut start = 0usize;
    let mut number = 0usize;

    while start < bytes.len() {
        number += 1;
        let (end, next) = match bytes[start..].iter().position(|b| *b == b'\n') {
            Some(offset) => (start + offset, start + offset + 1),
            None => (bytes.len(), bytes.len()),
        };
        let line = &bytes[start..end];

        if !line.iter().all(u8::is_ascii_whitespace) {
            match serde_json::from_slice::<T>(line) {
                Ok(item) => items.push(item),
                Err(e) if next == bytes.len() => {
                    warn!(path = %path.display(), line = number, error = %e, "dropping torn final line");
                    break;
                }
                Err(e) => {
                    return Err(Error::SerializationError(format!(
                        "{} line {}: {}",
                        path.display(),
                        number,
                        e
                    )))
                }
            }
        }
        keep = next;
        start = next;
    }

    if keep < bytes.len() {
        OpenOptions::new()
            .write(true)
            .open(path)?
            .set_len(keep as u64)?;
    }
    if keep > 0 && bytes[keep - 1] != b'\n' {
        let mut file = OpenOptions::new().append(true).open(path)?;
        file.write_all(b"\n")?;
        file.sync_data()?;
    }

    Ok(items)
}

/// Write `line` plus a newline and sync it. On failure the file is cut
/// back to its previous length and the buffered bytes are discarded.
pub fn append_line(writer: &mut BufWriter<File>, line: &str) -> std::io::Result<()> {
    let before = writer.get_ref().metadata()?.len();
    let written = writeln!(writer, "{}", line)
        .and_then(|_| writer.flush())
        .and_then(|_| writer.get_ref().sync_data());

    if let Err(e) = written {
        rollback(writer, before);
        return Err(e);
    }
    Ok(())
}

fn rollback(writer: &mut BufWriter<File>, len: u64) {
    let restored = writer.get_ref().try_clone().and_then(|file| {
        file.set_len(len)?;
        Ok(file)
    });
    match restored {
        Ok(file) => {
            // into_parts hands back the buffer without flushing it
            let (_old, _discarded) = std::mem::replace(writer, BufWriter::new(file)).into_parts();
        }
        Err(e) => warn!(error = %e, "could not roll back partial line"),
    }
}
