use anyhow::Result;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::decompression::DecompressionReader;
use crate::error_handling::DemuxError;

/// Ordered lines of one input file
///
/// Line numbers are 1-based and start over for every source. Trailing `\n` /
/// `\r\n` is removed and invalid UTF-8 is replaced rather than rejected.
pub struct LineSource<R: BufRead = DecompressionReader> {
    path: PathBuf,
    reader: R,
    line_number: usize,
    buf: Vec<u8>,
}

impl LineSource<DecompressionReader> {
    /// Open a plain or compressed file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = DecompressionReader::new(path)?;
        Ok(Self::from_reader(path, reader))
    }
}

impl<R: BufRead> LineSource<R> {
    /// Wrap an already opened reader; `path` is only used in error messages
    pub fn from_reader<P: Into<PathBuf>>(path: P, reader: R) -> Self {
        Self {
            path: path.into(),
            reader,
            line_number: 0,
            buf: Vec::with_capacity(256),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of the line most recently returned
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Read the next line into `line`, returning its number or `None` at EOF
    pub fn next_line(&mut self, line: &mut String) -> Result<Option<usize>> {
        self.buf.clear();
        let n = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .map_err(|e| DemuxError::input(&self.path, e))?;
        if n == 0 {
            return Ok(None);
        }

        if self.buf.ends_with(b"\n") {
            self.buf.pop();
            if self.buf.ends_with(b"\r") {
                self.buf.pop();
            }
        }

        line.clear();
        line.push_str(&String::from_utf8_lossy(&self.buf));
        self.line_number += 1;
        Ok(Some(self.line_number))
    }
}
