//! Bounded, newline-aligned reads from a growing file.
//!
//! The tailer reads at most `max_bytes` starting at a caller-supplied
//! offset and returns only complete, newline-terminated lines. The
//! returned end offset counts exactly the bytes consumed, so it is
//! always safe to persist as the next starting point.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Read complete lines from `path` starting at `start`.
///
/// Returns the raw lines (trimmed, blanks dropped) and the offset one
/// past the last consumed newline. If the window contains no newline at
/// all — a single record larger than `max_bytes` — returns no lines and
/// `end == start`: the file stalls rather than ever yielding a record
/// fragment. The source file is never modified.
///
/// # Errors
///
/// Returns any I/O error from opening, seeking, or reading the file.
pub fn read_tail(path: &Path, start: u64, max_bytes: u64) -> std::io::Result<(Vec<String>, u64)> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(start))?;

    let mut data = Vec::new();
    file.take(max_bytes).read_to_end(&mut data)?;

    if data.is_empty() {
        return Ok((Vec::new(), start));
    }

    // Trim back to the last newline so no partial line is ever decoded.
    if data.last() != Some(&b'\n') {
        match data.iter().rposition(|&b| b == b'\n') {
            Some(last_nl) => data.truncate(last_nl + 1),
            None => return Ok((Vec::new(), start)),
        }
    }

    let end = start + data.len() as u64;
    let text = String::from_utf8_lossy(&data);
    let lines = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    Ok((lines, end))
}
