use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error_handling::DemuxError;

/// Key shared by every line when no id column is configured
pub const IMPLICIT_KEY: &str = "all";

/// Options bag consumed by the demultiplexer
#[derive(Debug, Clone)]
pub struct DemuxConfig {
    /// Capture slot whose value selects the current output stream
    pub id_column: Option<String>,
    /// Only process lines whose id column equals this value
    pub id_filter: Option<String>,
    /// Directory receiving the `<datestamp>_<key>.data` files
    pub output_dir: PathBuf,
    /// Emit a diagnostic line whenever an output file is created or reopened
    pub verbose: bool,
    pub no_emoji: bool,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            id_column: None,
            id_filter: None,
            output_dir: PathBuf::from("."),
            verbose: false,
            no_emoji: false,
        }
    }
}

impl DemuxConfig {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = Some(column.into());
        self
    }

    pub fn with_id_filter(mut self, id: impl Into<String>) -> Self {
        self.id_filter = Some(id.into().trim().to_string());
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Check the option combination and make sure the output directory is usable
    ///
    /// The directory is created when missing. Writability is probed by creating
    /// (and immediately removing) a temporary file inside it.
    pub fn validate(&self) -> Result<()> {
        if let Some(ref column) = self.id_column {
            if column.is_empty() {
                return Err(DemuxError::configuration("id column name must not be empty").into());
            }
        }

        if self.id_filter.is_some() && self.id_column.is_none() {
            return Err(
                DemuxError::configuration("an id filter requires an id column to be set").into(),
            );
        }

        ensure_writable_dir(&self.output_dir)
    }

    /// Prefix for diagnostics written to stderr
    pub fn info_prefix(&self) -> &'static str {
        if self.no_emoji {
            "logdemux:"
        } else {
            "🔹"
        }
    }

    pub fn warning_prefix(&self) -> &'static str {
        if self.no_emoji {
            "logdemux:"
        } else {
            "⚠️"
        }
    }
}

/// Create `dir` if needed and verify files can be created in it
pub fn ensure_writable_dir(dir: &Path) -> Result<()> {
    if dir.exists() && !dir.is_dir() {
        return Err(DemuxError::configuration(format!(
            "output path '{}' is not a directory",
            dir.display()
        ))
        .into());
    }

    fs::create_dir_all(dir).map_err(|e| {
        DemuxError::configuration(format!(
            "cannot create output directory '{}': {}",
            dir.display(),
            e
        ))
    })?;

    tempfile::Builder::new()
        .prefix(".logdemux-probe")
        .tempfile_in(dir)
        .map_err(|e| {
            DemuxError::configuration(format!(
                "output directory '{}' is not writable: {}",
                dir.display(),
                e
            ))
        })?;

    Ok(())
}
