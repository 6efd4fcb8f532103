use anyhow::Result;
use indexmap::IndexMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error_handling::DemuxError;

/// Extension of per-key data series files
pub const DATA_EXTENSION: &str = "data";

/// `<datestamp>_<key>.<extension>`
pub fn series_file_name(datestamp: &str, key: &str, extension: &str) -> String {
    format!("{}_{}.{}", datestamp, key, extension)
}

/// Output file of one key; open or closed, never both
#[derive(Debug)]
pub struct OutputHandle {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl OutputHandle {
    /// Create (truncating) the file at `path`
    fn create(path: PathBuf) -> Result<Self> {
        let file = File::create(&path).map_err(|e| DemuxError::output(&path, e))?;
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Write `line` followed by a newline
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        let path = &self.path;
        let writer = self.writer.as_mut().ok_or_else(|| {
            DemuxError::output(
                path,
                std::io::Error::new(std::io::ErrorKind::Other, "output file is closed"),
            )
        })?;
        writeln!(writer, "{}", line).map_err(|e| DemuxError::output(path, e))?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| DemuxError::output(&self.path, e))?;
        }
        Ok(())
    }

    /// Reopen in append mode so earlier content is kept
    fn reopen(&mut self) -> Result<()> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .append(true)
                .open(&self.path)
                .map_err(|e| DemuxError::output(&self.path, e))?;
            self.writer = Some(BufWriter::new(file));
        }
        Ok(())
    }
}

/// What [`OutputTable::activate`] did for the new current key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// The key's file was already open
    Unchanged,
    Created(PathBuf),
    Reopened(PathBuf),
    /// No file exists and no datestamp is known yet
    Deferred,
}

/// Output files keyed by correlation key; at most one per key
#[derive(Debug, Default)]
pub struct OutputTable {
    dir: PathBuf,
    handles: IndexMap<String, OutputHandle>,
}

impl OutputTable {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            handles: IndexMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The key's handle if it exists and is open
    pub fn open_handle(&mut self, key: &str) -> Option<&mut OutputHandle> {
        self.handles.get_mut(key).filter(|h| h.is_open())
    }

    /// Write a line to the key's file, failing if there is no open file for it
    pub fn write_line(&mut self, key: &str, line: &str) -> Result<()> {
        match self.handles.get_mut(key) {
            Some(handle) => handle.write_line(line),
            None => Err(anyhow::anyhow!("no output file exists for key '{}'", key)),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.handles.contains_key(key)
    }

    pub fn is_open(&self, key: &str) -> bool {
        self.handles.get(key).is_some_and(OutputHandle::is_open)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn open_count(&self) -> usize {
        self.handles.values().filter(|h| h.is_open()).count()
    }

    /// Close the key's file if it is open
    pub fn close(&mut self, key: &str) -> Result<()> {
        match self.handles.get_mut(key) {
            Some(handle) => handle.close(),
            None => Ok(()),
        }
    }

    /// Make `key`'s file available: reopen it if closed, or create it when a
    /// datestamp is known
    pub fn activate(&mut self, key: &str, datestamp: Option<&str>) -> Result<Activation> {
        if let Some(handle) = self.handles.get_mut(key) {
            if handle.is_open() {
                return Ok(Activation::Unchanged);
            }
            handle.reopen()?;
            return Ok(Activation::Reopened(handle.path.clone()));
        }

        let Some(datestamp) = datestamp else {
            return Ok(Activation::Deferred);
        };

        let path = self
            .dir
            .join(series_file_name(datestamp, key, DATA_EXTENSION));
        let handle = OutputHandle::create(path.clone())?;
        self.handles.insert(key.to_string(), handle);
        Ok(Activation::Created(path))
    }

    /// Close every open file, reporting the first failure after trying all of them
    pub fn close_all(&mut self) -> Result<()> {
        let mut first_error = None;
        for handle in self.handles.values_mut() {
            if let Err(e) = handle.close() {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
