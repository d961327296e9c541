//! Append-Only Time-Series Store
//!
//! The series lives in one flat, two-column text file:
//!
//! ```text
//! datetime,value
//! 2024-07-06T14:00:00,23
//! 2024-07-06T14:02:00,25
//! ```
//!
//! ## Write Guarantees
//!
//! The monitor can be killed at any moment (power cut, service restart), so
//! each mutation is atomic at its own granularity:
//!
//! - `append` builds the whole record (plus the header, for a new file) in
//!   memory and hands it to the kernel in a single `write_all` on an
//!   `O_APPEND` descriptor. A write that fails part way is truncated back to
//!   the previous length, and a torn last line from an earlier crash is
//!   closed off before the next record so it cannot swallow it.
//! - `rewrite_all` writes a complete replacement into a temporary file in the
//!   same directory, syncs it, and renames it over the original. Readers see
//!   either the old file or the new one, and a failure before the rename
//!   leaves the old file untouched.
//!
//! ## Read Tolerance
//!
//! Files written by older builds or damaged by an unclean shutdown may hold a
//! few bad lines. `read_all` skips any record that does not parse, logs it,
//! and keeps loading the rest.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::constants::SERIES_HEADER;
use crate::errors::StoreError;
use crate::time::{format_timestamp, parse_timestamp, Timestamp};

/// One derived reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: Timestamp,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Ordered samples, oldest first
pub type Series = Vec<Sample>;

/// Statistics for one `read_all` pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReadStats {
    /// Lines seen, header included
    pub lines_processed: usize,
    /// Records loaded into the series
    pub records_read: usize,
    /// Records skipped because a field did not parse
    pub parse_errors: usize,
}

/// File-backed series with lazy creation
#[derive(Debug, Clone)]
pub struct SeriesStore {
    path: PathBuf,
}

impl SeriesStore {
    /// Bind to `path`; nothing is created until the first append
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when anything occupies the path, even something unreadable
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Append one record, writing the header first if the file is new or empty
    ///
    /// A torn final line left by an earlier crash is terminated before the
    /// record, and a failed write is rolled back to the previous length.
    pub fn append(&self, sample: &Sample) -> Result<(), StoreError> {
        if !sample.value.is_finite() {
            return Err(StoreError::NonFinite {
                value: sample.value,
            });
        }
        ensure_parent_dir(&self.path)?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io("open", &self.path, e))?;

        let prev_len = file
            .metadata()
            .map_err(|e| StoreError::io("inspect", &self.path, e))?
            .len();

        let mut record = String::with_capacity(64);
        if prev_len == 0 {
            record.push_str(SERIES_HEADER);
            record.push('\n');
        } else if !ends_with_newline(&mut file, prev_len)
            .map_err(|e| StoreError::io("inspect", &self.path, e))?
        {
            record.push('\n');
        }
        push_record(&mut record, sample);

        if let Err(e) = file.write_all(record.as_bytes()) {
            if let Err(rollback) = file.set_len(prev_len) {
                log::error!(
                    "{}: could not roll back partial append: {rollback}",
                    self.path.display()
                );
            }
            return Err(StoreError::io("append to", &self.path, e));
        }
        Ok(())
    }

    /// Load the full series; an absent file is an empty series
    pub fn read_all(&self) -> Result<Series, StoreError> {
        self.read_all_with_stats().map(|(series, _)| series)
    }

    /// Load the full series along with parse statistics
    pub fn read_all_with_stats(&self) -> Result<(Series, ReadStats), StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok((Series::new(), ReadStats::default()));
            }
            Err(e) => return Err(StoreError::io("open", &self.path, e)),
        };

        let mut series = Series::new();
        let mut stats = ReadStats::default();

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| StoreError::io("read", &self.path, e))?;
            stats.lines_processed += 1;

            let line = line.trim();
            if line.is_empty() || (index == 0 && is_header(line)) {
                continue;
            }

            match parse_record(line) {
                Ok(sample) => {
                    series.push(sample);
                    stats.records_read += 1;
                }
                Err(reason) => {
                    stats.parse_errors += 1;
                    log::warn!(
                        "{}: skipping line {}: {reason}: {line:?}",
                        self.path.display(),
                        index + 1
                    );
                }
            }
        }

        Ok((series, stats))
    }

    /// Atomically replace the file with the header plus `series`
    pub fn rewrite_all(&self, series: &[Sample]) -> Result<(), StoreError> {
        let mut contents = String::with_capacity(32 * (series.len() + 1));
        contents.push_str(SERIES_HEADER);
        contents.push('\n');
        for sample in series {
            push_record(&mut contents, sample);
        }
        write_atomically(&self.path, &contents)
    }
}

/// Replace `path` with `contents` via a synced temporary file and a rename
pub(crate) fn write_atomically(path: &Path, contents: &str) -> Result<(), StoreError> {
    ensure_parent_dir(path)?;

    let mut tmp = NamedTempFile::new_in(parent_dir(path))
        .map_err(|e| StoreError::io("create temporary file for", path, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        writer
            .write_all(contents.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(|e| StoreError::io("write temporary file for", path, e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| StoreError::io("sync temporary file for", path, e))?;
    tmp.persist(path)
        .map_err(|e| StoreError::io("replace", path, e.error))?;
    Ok(())
}

fn ends_with_newline(file: &mut File, len: u64) -> io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn push_record(out: &mut String, sample: &Sample) {
    out.push_str(&format_timestamp(&sample.timestamp));
    out.push(',');
    out.push_str(&sample.value.to_string());
    out.push('\n');
}

/// Older builds named the value column after the measurement; any
/// `datetime,...` first line is a header.
fn is_header(line: &str) -> bool {
    line.starts_with("datetime,")
}

fn parse_record(line: &str) -> Result<Sample, &'static str> {
    let (timestamp, value) = line.split_once(',').ok_or("not enough fields")?;
    let timestamp = parse_timestamp(timestamp).map_err(|_| "invalid timestamp")?;
    let value = value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or("invalid value")?;
    Ok(Sample { timestamp, value })
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), StoreError> {
    let parent = parent_dir(path);
    if parent.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(parent).map_err(|e| StoreError::io("create directory for", path, e))
}
