//! One CSV file of the store and its cached read cursor.
//!
//! Record indices count physical CSV records, so when the file carries a header
//! row the header is record 0 and the first data row is record 1. The cursor
//! remembers the byte offset at which record `index` starts; a read that begins
//! where the previous one stopped resumes from that offset instead of
//! re-parsing the file from the top.

use chainetl_common::{EtlError, Result};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cursor {
    /// Index of the next record to be read
    index: u64,
    /// Byte offset at which that record starts
    position: u64,
}

#[derive(Debug, Default)]
struct FileState {
    file: Option<File>,
    has_header: bool,
    closed: bool,
    cursor: Cursor,
    /// Records parsed since the handle was created, header and skipped rows included
    records_scanned: u64,
}

/// Lazily opened CSV file guarded by its own mutex
#[derive(Debug)]
pub struct FileHandle {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileHandle {
    /// Register a file; nothing is opened until the first read or write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(FileState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `rows` in one batch, writing `headers` first if the file has never
    /// been written. Returns the number of data rows appended.
    ///
    /// Rows are rendered in memory before touching the file, so a malformed row
    /// leaves the file as it was.
    pub fn write_all(&self, headers: &[String], rows: &[Vec<String>]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut state = self.lock()?;
        state.open(&self.path)?;

        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        if !state.has_header {
            writer.write_record(headers)?;
        }
        for row in rows {
            writer.write_record(row)?;
        }
        let buf = writer
            .into_inner()
            .map_err(|err| EtlError::from(err.into_error()))?;

        let file = state.file.as_mut().ok_or(EtlError::Closed)?;
        let len = file.metadata()?.len();
        if let Err(err) = file.write_all(&buf).and_then(|()| file.flush()) {
            // Drop whatever part of the batch made it to disk.
            let _ = file.set_len(len);
            return Err(err.into());
        }

        state.has_header = true;
        Ok(rows.len())
    }

    /// Read up to `limit` data rows starting at record `line`.
    ///
    /// A negative `line` counts back from the end of the file (`-1` is the last
    /// record). `limit <= 0` reads to the end. The header row is never returned.
    pub fn read(&self, line: i64, limit: i64) -> Result<Vec<Vec<String>>> {
        let mut state = self.lock()?;
        state.open(&self.path)?;

        let target = if line < 0 {
            let total = state.count_records()?;
            total.saturating_sub(line.unsigned_abs())
        } else {
            line as u64
        };
        state.seek_record(target)?;

        if state.has_header && state.cursor.index == 0 {
            state.advance(1, |_| {})?;
        }

        let max = if limit <= 0 { u64::MAX } else { limit as u64 };
        let mut rows = Vec::new();
        state.advance(max, |record| {
            rows.push(record.iter().map(str::to_string).collect());
        })?;
        Ok(rows)
    }

    /// Close the underlying file. Returns `false` if it was never opened or is
    /// already closed; later reads and writes fail with [`EtlError::Closed`].
    pub fn close(&self) -> Result<bool> {
        let mut state = self.lock()?;
        state.closed = true;
        Ok(state.file.take().is_some())
    }

    /// Total records parsed by this handle, for observing cursor reuse.
    pub fn records_scanned(&self) -> Result<u64> {
        Ok(self.lock()?.records_scanned)
    }

    fn lock(&self) -> Result<MutexGuard<'_, FileState>> {
        self.state.lock().map_err(|_| {
            std::io::Error::other(format!("file lock poisoned: {}", self.path.display())).into()
        })
    }
}

impl FileState {
    fn open(&mut self, path: &Path) -> Result<()> {
        if self.closed {
            return Err(EtlError::Closed);
        }
        if self.file.is_some() {
            return Ok(());
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;
        self.has_header = file.metadata()?.len() > 0;
        self.cursor = Cursor::default();
        self.file = Some(file);
        Ok(())
    }

    /// Rescan from the start to count every record, leaving the cursor at EOF.
    fn count_records(&mut self) -> Result<u64> {
        self.cursor = Cursor::default();
        self.advance(u64::MAX, |_| {})?;
        Ok(self.cursor.index)
    }

    /// Move the cursor to record `target`, stopping early at EOF.
    fn seek_record(&mut self, target: u64) -> Result<()> {
        if self.cursor.index == target {
            return Ok(());
        }
        if self.cursor.index > target {
            self.cursor = Cursor::default();
        }
        let remaining = target - self.cursor.index;
        self.advance(remaining, |_| {})?;
        Ok(())
    }

    /// Parse up to `max` records from the cursor, handing each to `sink`.
    fn advance(&mut self, max: u64, mut sink: impl FnMut(&csv::StringRecord)) -> Result<u64> {
        let start = self.cursor.position;
        let file = self.file.as_mut().ok_or(EtlError::Closed)?;
        file.seek(SeekFrom::Start(start))?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(&mut *file);
        let mut record = csv::StringRecord::new();
        let mut consumed = 0u64;
        while consumed < max && reader.read_record(&mut record)? {
            sink(&record);
            consumed += 1;
        }
        let end = start + reader.position().byte();

        self.cursor = Cursor {
            index: self.cursor.index + consumed,
            position: end,
        };
        self.records_scanned += consumed;
        Ok(consumed)
    }
}
