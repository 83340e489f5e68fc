use crate::error::{ReplayError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Line-oriented access to a CSV recording
///
/// Nothing is cached and no file handle is kept between reads: every call
/// reopens the file and streams to the requested line. A recording that is
/// rewritten underneath us yields different rows or a parse error, never a
/// stale handle.
#[derive(Debug, Clone)]
pub struct RowStore {
    path: PathBuf,
    row_count: usize,
}

impl RowStore {
    /// Open a recording and count its lines (header included)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut store = Self { path, row_count: 0 };
        store.row_count = store.scan()?.count_rows()?;
        debug!("Opened {:?}: {} rows", store.path, store.row_count);
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total number of lines, header included
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Read a single line by index
    pub fn row(&self, index: usize) -> Result<String> {
        if index >= self.row_count {
            return Err(self.out_of_range(index));
        }

        match self.scan()?.nth(index) {
            Some((_, line)) => line,
            // The file shrank since it was opened
            None => Err(self.out_of_range(index)),
        }
    }

    /// Stateful reader starting at `start`
    pub fn cursor(&self, start: usize) -> RowCursor<'_> {
        RowCursor { store: self, index: start }
    }

    /// Stream every line once, in file order, over a single open handle
    pub fn scan(&self) -> Result<RowScan> {
        let file = File::open(&self.path).map_err(|e| self.unavailable(e))?;
        Ok(RowScan {
            path: self.path.clone(),
            lines: BufReader::new(file).lines(),
            index: 0,
        })
    }

    fn out_of_range(&self, index: usize) -> ReplayError {
        ReplayError::IndexOutOfRange { index, row_count: self.row_count }
    }

    fn unavailable(&self, source: std::io::Error) -> ReplayError {
        ReplayError::FileUnavailable { path: self.path.clone(), source }
    }
}

/// Cursor over a [`RowStore`] that reopens the file for every row
pub struct RowCursor<'a> {
    store: &'a RowStore,
    index: usize,
}

impl RowCursor<'_> {
    /// Index of the row the next call to [`next_row`](Self::next_row) returns
    pub fn position(&self) -> usize {
        self.index
    }

    /// Read the row under the cursor and advance, or `None` at end of file
    pub fn next_row(&mut self) -> Result<Option<String>> {
        if self.index >= self.store.row_count() {
            return Ok(None);
        }

        let line = self.store.row(self.index)?;
        self.index += 1;
        Ok(Some(line))
    }
}

/// Single-pass line iterator yielding `(row index, line)`
pub struct RowScan {
    path: PathBuf,
    lines: std::io::Lines<BufReader<File>>,
    index: usize,
}

impl RowScan {
    fn count_rows(self) -> Result<usize> {
        self.into_iter().try_fold(0, |count, (_, line)| line.map(|_| count + 1))
    }
}

impl Iterator for RowScan {
    type Item = (usize, Result<String>);

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.lines.next()?;
        let index = self.index;
        self.index += 1;

        let line = line
            .map(|l| l.trim_end_matches('\r').to_string())
            .map_err(|source| ReplayError::FileUnavailable { path: self.path.clone(), source });
        Some((index, line))
    }
}

/// Split a raw row into its fields
///
/// Recordings exported with `", "` separators are accepted alongside plain
/// commas. Quoted fields follow the usual CSV rules.
pub fn parse_row(line: &str) -> Vec<String> {
    let normalized = line.replace(", ", ",");

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(normalized.as_bytes());

    let mut record = csv::StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => record.iter().map(str::to_string).collect(),
        // Blank line or a record csv refuses; fall back to a plain split
        _ => normalized.split(',').map(str::to_string).collect(),
    }
}

/// Parse one field as a finite number
pub fn parse_number<T>(field: &str, row: usize, column: usize) -> Result<T>
where
    T: FromStr + Into<f64> + Copy,
{
    let invalid = || ReplayError::InvalidNumber {
        row,
        column,
        value: field.to_string(),
    };

    let value: T = field.trim().parse().map_err(|_| invalid())?;
    if value.into().is_finite() {
        Ok(value)
    } else {
        Err(invalid())
    }
}
