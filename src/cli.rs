// Command-line interface definitions and their translation into run options

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DemuxConfig;
use crate::config_file::ConfigFile;
use crate::processors::{top, MemlogOptions, SplitOptions, TopOptions};

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatsFormat {
    Table,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "logdemux")]
#[command(about = "Split multi-process log files into per-process data series")]
#[command(
    long_about = "Split multi-process log files into per-process data series\n\nEvery input line is matched against a set of patterns. Named captures are remembered across lines, so an occasional date line gives context to the frequent data lines after it. Lines are routed to one output file per key (usually a PID), named <datestamp>_<key>.data.\n\nInputs can be plain text or compressed (.gz, .zst).\n\nEXAMPLES:\n  logdemux top --offset -5 top_output_*.log.gz\n  logdemux memlog case/logs/evm.log*\n  logdemux split -i req -r '^date=(?P<date>\\S+)' -r '^req=(?P<req>\\d+)' -o out app.log"
)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Print a line whenever an output file is created or reopened
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Print processing statistics when done. Use -s for a table, or --stats=json
    #[arg(
        short = 's',
        long = "stats",
        value_enum,
        value_name = "FORMAT",
        require_equals = true,
        num_args = 0..=1,
        default_missing_value = "table",
        global = true
    )]
    pub stats: Option<StatsFormat>,

    /// Plain text prefixes instead of emoji in diagnostics
    #[arg(long = "no-emoji", global = true)]
    pub no_emoji: bool,

    /// Read defaults from this file instead of the usual locations
    #[arg(long = "config-file", value_name = "PATH", global = true)]
    pub config_file: Option<PathBuf>,

    /// Do not read any configuration file
    #[arg(long = "ignore-config", global = true, conflicts_with = "config_file")]
    pub ignore_config: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Split lines matched by arbitrary patterns, one file per id value
    Split(SplitArgs),
    /// Turn top(1) batch output into per-PID memory series
    Top(TopArgs),
    /// Turn application memory log lines into per-PID memory series
    Memlog(MemlogArgs),
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Capture name whose value selects the output file
    #[arg(short = 'i', long = "id-column", value_name = "NAME")]
    pub id_column: Option<String>,

    /// Only keep lines whose id column has this value
    #[arg(short = 'p', long = "id", value_name = "ID", requires = "id_column")]
    pub id: Option<String>,

    /// Pattern with named captures; repeat for several patterns. A capture named `date` names the output files
    #[arg(short = 'r', long = "regex", value_name = "REGEX", required = true)]
    pub patterns: Vec<String>,

    /// Directory for the output files
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Input files (plain, .gz or .zst)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct TopArgs {
    /// Offset, in hours, from top to the host machine
    #[arg(long = "offset", value_name = "HRS", allow_negative_numbers = true)]
    pub offset: Option<i64>,

    /// Specific PID to gather data for
    #[arg(short = 'p', long = "pid")]
    pub pid: Option<u32>,

    /// The process table has a PPID column (default)
    #[arg(short = 'P', long = "ppid", overrides_with = "no_ppid")]
    pub ppid: bool,

    /// The process table has no PPID column
    #[arg(long = "no-ppid", overrides_with = "ppid")]
    pub no_ppid: bool,

    /// Number of digits for PIDs in top
    #[arg(long = "pid-size", value_name = "NUM", default_value_t = top::DEFAULT_PID_SIZE)]
    pub pid_size: usize,

    /// Worker type filter
    #[arg(short = 'w', long = "worker-type", value_name = "WORKER")]
    pub worker_type: Option<String>,

    /// Directory for the output files
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// top output files (plain, .gz or .zst)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct MemlogArgs {
    /// Specific PID to gather data for
    #[arg(short = 'p', long = "pid")]
    pub pid: Option<u32>,

    /// Worker type filter
    #[arg(short = 'w', long = "worker-type", value_name = "WORKER")]
    pub worker_type: Option<String>,

    /// Hours added to heap dump timestamps in the impulses files
    #[arg(
        long = "impulse-offset",
        value_name = "HRS",
        allow_negative_numbers = true,
        default_value_t = crate::processors::memlog::DEFAULT_IMPULSE_OFFSET
    )]
    pub impulse_offset: i64,

    /// Log files, all from the same directory
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

impl Cli {
    /// Load the configuration file unless told not to
    pub fn load_config_file(&self) -> Result<ConfigFile> {
        if self.ignore_config {
            return Ok(ConfigFile::default());
        }
        ConfigFile::load_with_custom_path(self.config_file.as_deref())
    }

    /// Run options shared by every subcommand; flags win over the config file
    pub fn demux_config(&self, file: &ConfigFile, default_output_dir: &str) -> DemuxConfig {
        let output_dir = match &self.command {
            Command::Split(args) => args.output_dir.clone(),
            Command::Top(args) => args.output_dir.clone(),
            Command::Memlog(_) => None,
        }
        .or_else(|| file.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from(default_output_dir));

        let mut config = DemuxConfig::new(output_dir)
            .with_verbose(self.verbose || file.verbose.unwrap_or(false));
        config.no_emoji = self.no_emoji
            || file.no_emoji.unwrap_or(false)
            || std::env::var("NO_EMOJI").is_ok();
        config
    }
}

impl SplitArgs {
    pub fn options(&self) -> SplitOptions {
        SplitOptions {
            patterns: self.patterns.clone(),
            id_column: self.id_column.clone(),
            id_filter: self.id.clone(),
        }
    }
}

impl TopArgs {
    pub fn options(&self, file: &ConfigFile) -> TopOptions {
        TopOptions {
            offset: self.offset.or(file.tz_offset).unwrap_or(0),
            pid: self.pid,
            has_ppid: !self.no_ppid,
            pid_size: self.pid_size,
            worker_type: self.worker_type.clone(),
        }
    }
}

impl MemlogArgs {
    pub fn options(&self) -> MemlogOptions {
        MemlogOptions {
            pid: self.pid,
            worker_type: self.worker_type.clone(),
            impulse_offset: self.impulse_offset,
        }
    }
}
