//! Application memory log to per-PID memory series plus dump markers

use anyhow::{Context, Result};
use chrono::{DateTime, Duration};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::worker_type_pattern;
use crate::config::DemuxConfig;
use crate::demux::{parse, MatchContext};
use crate::error_handling::DemuxError;
use crate::fields::DATESTAMP_FIELD;
use crate::output::series_file_name;
use crate::record::parse_record;
use crate::rules::{Rule, RuleSet};
use crate::stats::ProcessingStats;

pub const ID_COLUMN: &str = "PID";
pub const IMPULSES_EXTENSION: &str = "impulses";
pub const DEFAULT_IMPULSE_OFFSET: i64 = -4;

const IMPULSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S 2000000000";
const RECORD_KEYS: [&str; 4] = ["PSS", "RSS", "Live", "Old"];

#[derive(Debug, Clone)]
pub struct MemlogOptions {
    pub pid: Option<u32>,
    pub worker_type: Option<String>,
    /// Hours added to dump timestamps (UTC) for the impulses file
    pub impulse_offset: i64,
}

impl Default for MemlogOptions {
    fn default() -> Self {
        Self {
            pid: None,
            worker_type: None,
            impulse_offset: DEFAULT_IMPULSE_OFFSET,
        }
    }
}

/// Output and dumps directories for a set of log files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemlogDirs {
    pub output: PathBuf,
    pub dumps: PathBuf,
}

impl MemlogDirs {
    /// Derive both directories from the single directory holding `files`
    ///
    /// `.../logs/...` becomes `.../output/...` and `.../dumps/...` (first
    /// occurrence only); any other directory gets `output/` and `dumps/`
    /// subdirectories.
    pub fn derive<P: AsRef<Path>>(files: &[P]) -> Result<Self> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        for file in files {
            let dir = match file.as_ref().parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }

        let dir = match dirs.as_slice() {
            [] => return Err(DemuxError::configuration("no input files given").into()),
            [dir] => dir,
            _ => {
                return Err(DemuxError::configuration(format!(
                    "memory logs must come from a single directory, found {}",
                    dirs.len()
                ))
                .into())
            }
        };

        let name = dir.to_string_lossy();
        if name.contains("logs") {
            Ok(Self {
                output: PathBuf::from(name.replacen("logs", "output", 1)),
                dumps: PathBuf::from(name.replacen("logs", "dumps", 1)),
            })
        } else {
            Ok(Self {
                output: dir.join("output"),
                dumps: dir.join("dumps"),
            })
        }
    }

    pub fn create(&self) -> Result<()> {
        for dir in [&self.output, &self.dumps] {
            fs::create_dir_all(dir).map_err(|e| {
                DemuxError::configuration(format!("cannot create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }
}

fn log_line_pattern(worker_type: Option<&str>) -> String {
    format!(
        concat!(
            r"^\[----\] ",
            r"(?P<SEVERITY_CHAR>[A-Z]), \[",
            r"(?P<date>[-0-9]*)T",
            r"(?P<TIME>[0-9:]*)\.",
            r"(?P<MS>[0-9]*) #",
            r"(?P<PID>[0-9]*):",
            r"(?P<THREAD>[a-z0-9]*)\] +",
            r"[A-Z]{{0,5}} -- [^:]*: ",
            r"MIQ\({worker}\) .*",
            r"Memory Info XXXX ",
            r"(?P<MSG>\([^)]*\) )?=> ",
            r"(?P<MEM_INFO>\{{[^}}]*\}})",
        ),
        worker = worker_type_pattern(worker_type),
    )
}

/// Timestamps of the heap dumps taken for `pid`, sorted by file name
///
/// Dump files are named `<anything>_<epoch>_<pid>.dump.gz`.
pub fn dump_times(dumps_dir: &Path, pid: &str, offset_hours: i64) -> Result<Vec<String>> {
    let pattern = format!(
        "{}{}*_{}.dump.gz",
        glob::Pattern::escape(&dumps_dir.to_string_lossy()),
        std::path::MAIN_SEPARATOR,
        glob::Pattern::escape(pid)
    );
    let mut files: Vec<PathBuf> = glob::glob(&pattern)
        .with_context(|| format!("invalid dump pattern '{}'", pattern))?
        .filter_map(|path| path.ok())
        .collect();
    files.sort();

    let times = files
        .iter()
        .filter_map(|file| {
            let name = file.file_name()?.to_string_lossy().to_string();
            let parts: Vec<&str> = name.split('_').collect();
            let epoch = parts.len().checked_sub(2).and_then(|i| parts[i].parse::<i64>().ok())?;
            let time = DateTime::from_timestamp(epoch, 0)?
                .naive_utc()
                .checked_add_signed(Duration::try_hours(offset_hours)?)?;
            Some(time.format(IMPULSE_FORMAT).to_string())
        })
        .collect();
    Ok(times)
}

fn write_impulses(ctx: &MatchContext<'_>, pid: &str, dumps_dir: &Path, offset_hours: i64) -> Result<()> {
    let datestamp = ctx
        .fields
        .get(DATESTAMP_FIELD)
        .map(str::to_string)
        .or_else(|| ctx.fields.datestamp())
        .unwrap_or_default();
    let path = ctx
        .outputs
        .dir()
        .join(series_file_name(&datestamp, pid, IMPULSES_EXTENSION));

    let mut contents = String::new();
    for time in dump_times(dumps_dir, pid, offset_hours)? {
        contents.push_str(&time);
        contents.push('\n');
    }
    fs::write(&path, contents).map_err(|e| DemuxError::output(&path, e))?;
    Ok(())
}

fn record_memory(
    ctx: &mut MatchContext<'_>,
    seen: &RefCell<HashSet<String>>,
    dumps_dir: &Path,
    offset_hours: i64,
) -> Result<()> {
    let Some(pid) = ctx.key.map(str::to_string) else {
        return Ok(());
    };

    if seen.borrow_mut().insert(pid.clone()) {
        write_impulses(ctx, &pid, dumps_dir, offset_hours)?;
    }

    let record = parse_record(ctx.fields.require("MEM_INFO")?)?;
    let mut line = format!(
        "{}T{}",
        ctx.fields.require("date")?,
        ctx.fields.require("TIME")?
    );
    for key in RECORD_KEYS {
        line.push(' ');
        line.push_str(&record.require(key)?.to_string());
    }
    ctx.write_current(&line)?;
    Ok(())
}

pub fn rules<'h>(
    options: &MemlogOptions,
    dumps_dir: &'h Path,
    seen: &'h RefCell<HashSet<String>>,
) -> Result<RuleSet<'h>> {
    let offset = options.impulse_offset;
    Ok(RuleSet::new().with_rule(
        Rule::new("memory", &log_line_pattern(options.worker_type.as_deref()))?
            .with_handler(move |ctx| record_memory(ctx, seen, dumps_dir, offset)),
    ))
}

pub fn configure(config: DemuxConfig, options: &MemlogOptions, dirs: &MemlogDirs) -> DemuxConfig {
    let mut config = config.with_id_column(ID_COLUMN);
    config.output_dir = dirs.output.clone();
    match options.pid {
        Some(pid) => config.with_id_filter(pid.to_string()),
        None => config,
    }
}

pub fn run<P: AsRef<Path>>(
    files: &[P],
    options: &MemlogOptions,
    config: DemuxConfig,
) -> Result<ProcessingStats> {
    let dirs = MemlogDirs::derive(files)?;
    dirs.create()?;
    if config.verbose {
        eprintln!(
            "{} writing to {} (dumps from {})",
            config.info_prefix(),
            dirs.output.display(),
            dirs.dumps.display()
        );
    }

    let seen = RefCell::new(HashSet::new());
    let rules = rules(options, &dirs.dumps, &seen)?;
    parse(files, configure(config, options, &dirs), rules)
}
