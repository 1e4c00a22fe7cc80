use std::{fs, io};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::{Duration, Instant};

/// Reads a text file into one string per non-empty line.
pub fn file_to_vec(filename: impl AsRef<Path>) -> io::Result<Vec<String>> {
    let file_in = fs::File::open(filename)?;
    let file_reader = BufReader::new(file_in);
    let mut lines = Vec::new();
    for line in file_reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
    Ok(lines)
}

/// Logs the time spent in `l_step` since `prev` and returns the new elapsed mark.
pub(crate) fn trace(l_type: &str, l_step: &str, start: Instant, prev: Duration) -> Duration {
    let now = start.elapsed();
    log::trace!("{} | Total={:.2?} | {}={:.2?}", l_type, now, l_step, now - prev);
    now
}
