//! top(1) batch output to per-PID memory series
//!
//! Every sample starts with the uptime header that carries the wall-clock
//! time. Calendar dates come from occasional `timesync:` lines, so rows seen
//! before the first timesync are queued per PID and written to their files
//! when that timesync arrives.

use anyhow::Result;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;

use super::worker_type_pattern;
use crate::byte_format::to_bytes;
use crate::config::DemuxConfig;
use crate::datestring::ReferenceDate;
use crate::demux::{parse, MatchContext};
use crate::fields::DATE_FIELD;
use crate::rules::{Rule, RuleSet};
use crate::stats::ProcessingStats;

pub const DEFAULT_OUTPUT_DIR: &str = "top_outputs";
pub const DEFAULT_PID_SIZE: usize = 5;
pub const ID_COLUMN: &str = "PID";

const UPTIME_PATTERN: &str = concat!(
    r"top - ",
    r"(?P<LOCAL_TIME>\d\d:\d\d:\d\d)\s*",
    r"up\s*",
    r"(?P<UPTIME_DAYS>\d* days?)?,?\s*",
    r"(?P<UPTIME_HOURS>\d?\d:\d\d|\d+ min),\s*",
    r"(?P<LOGGED_IN_USERS>\d* users?),\s*",
    r"load average:\s*",
    r"(?P<LOAD_1>[\d.]*),\s*",
    r"(?P<LOAD_5>[\d.]*),\s*",
    r"(?P<LOAD_15>[\d.]*)",
);

const TIMESYNC_PATTERN: &str = r"timesync: date time is-> (?P<DATE_STRING>.*)$";

#[derive(Debug, Clone)]
pub struct TopOptions {
    /// Hours between the top host clock and the machine the data is read on
    pub offset: i64,
    pub pid: Option<u32>,
    /// Whether the process table has a PPID column
    pub has_ppid: bool,
    /// Width of the PID column
    pub pid_size: usize,
    pub worker_type: Option<String>,
}

impl Default for TopOptions {
    fn default() -> Self {
        Self {
            offset: 0,
            pid: None,
            has_ppid: true,
            pid_size: DEFAULT_PID_SIZE,
            worker_type: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct TopRow {
    date: Option<String>,
    time: String,
    virt: u64,
    res: u64,
    shr: u64,
    line_number: usize,
}

impl TopRow {
    fn render(&self) -> String {
        format!(
            "{}T{} {} {} {} {}",
            self.date.as_deref().unwrap_or_default(),
            self.time,
            self.res,
            self.virt,
            self.shr,
            self.line_number
        )
    }
}

/// Correlation state shared by the top handlers
#[derive(Debug, Default)]
pub struct TopState {
    reference: Option<ReferenceDate>,
    pending: IndexMap<String, VecDeque<TopRow>>,
}

impl TopState {
    pub fn reference(&self) -> Option<ReferenceDate> {
        self.reference
    }

    /// Rows of `pid` waiting for its output file
    pub fn pending_rows(&self, pid: &str) -> usize {
        self.pending.get(pid).map_or(0, VecDeque::len)
    }

    /// Rows of every PID still waiting for a date
    pub fn unwritten_rows(&self) -> usize {
        self.pending.values().map(VecDeque::len).sum()
    }
}

fn process_pattern(options: &TopOptions) -> String {
    // The extra column accounts for the separating space
    let ppid_size = if options.has_ppid {
        options.pid_size + 1
    } else {
        0
    };

    format!(
        concat!(
            r"^(?P<PID>[ 0-9]{{{pid}}})\s",
            r"(?P<PPID>[ 0-9]{{{ppid}}})",
            r"(?P<USER>.{{10}})",
            r"(?P<PR>.{{2}})\s",
            r"(?P<NI>.{{3}})\s",
            r"(?P<VIRT>.{{7}})\s",
            r"(?P<RSS>.{{6}})\s",
            r"(?P<SHR>.{{6}})\s",
            r"(?P<S>\w)\s",
            r"(?P<CPU_PCT>.{{5}})\s",
            r"(?P<MEM_PCT>.{{4}})\s",
            r"(?P<CPU_TIME>.{{9}})\s",
            r"(?P<CMD>{worker})$",
        ),
        pid = options.pid_size,
        ppid = ppid_size,
        worker = worker_type_pattern(options.worker_type.as_deref()),
    )
}

fn record_process(ctx: &mut MatchContext<'_>, state: &RefCell<TopState>) -> Result<()> {
    let Some(pid) = ctx.key.map(str::to_string) else {
        return Ok(());
    };
    let time = ctx.fields.require("LOCAL_TIME")?.to_string();
    let virt = to_bytes(ctx.fields.require("VIRT")?)?;
    let res = to_bytes(ctx.fields.require("RSS")?)?;
    let shr = to_bytes(ctx.fields.require("SHR")?)?;

    let mut state = state.borrow_mut();
    let date = state.reference.map(|r| r.resolve_string(&time));
    let queue = state.pending.entry(pid).or_default();
    queue.push_back(TopRow {
        date,
        time,
        virt,
        res,
        shr,
        line_number: ctx.line_number,
    });

    if !ctx.has_open_output() {
        return Ok(());
    }
    while let Some(row) = queue.pop_front() {
        ctx.write_current(&row.render())?;
    }
    Ok(())
}

fn apply_timesync(
    ctx: &mut MatchContext<'_>,
    state: &RefCell<TopState>,
    offset_hours: i64,
) -> Result<()> {
    let reference = ReferenceDate::parse(ctx.fields.require("DATE_STRING")?, offset_hours)?;
    ctx.fields.set(DATE_FIELD, reference.date_string());

    let mut state = state.borrow_mut();
    state.reference = Some(reference);
    for (pid, queue) in state.pending.iter_mut() {
        if queue.is_empty() {
            continue;
        }
        for row in queue.iter_mut().filter(|row| row.date.is_none()) {
            row.date = Some(reference.resolve_string(&row.time));
        }

        ctx.open_output(pid)?;
        if ctx.outputs.is_open(pid) {
            while let Some(row) = queue.pop_front() {
                ctx.outputs.write_line(pid, &row.render())?;
            }
        }
        ctx.close_output(pid)?;
    }
    Ok(())
}

/// Uptime, process and timesync rules, in that order
pub fn rules<'h>(options: &TopOptions, state: &'h RefCell<TopState>) -> Result<RuleSet<'h>> {
    let offset = options.offset;
    Ok(RuleSet::new()
        .with_rule(Rule::new("uptime", UPTIME_PATTERN)?)
        .with_rule(
            Rule::new("process", &process_pattern(options))?
                .with_handler(move |ctx| record_process(ctx, state)),
        )
        .with_rule(
            Rule::new("timesync", TIMESYNC_PATTERN)?
                .with_handler(move |ctx| apply_timesync(ctx, state, offset)),
        ))
}

pub fn configure(config: DemuxConfig, options: &TopOptions) -> DemuxConfig {
    let config = config.with_id_column(ID_COLUMN);
    match options.pid {
        Some(pid) => config.with_id_filter(pid.to_string()),
        None => config,
    }
}

pub fn run<P: AsRef<Path>>(
    files: &[P],
    options: &TopOptions,
    config: DemuxConfig,
) -> Result<ProcessingStats> {
    let warning = config.warning_prefix();
    let state = RefCell::new(TopState::default());
    let stats = parse(files, configure(config, options), rules(options, &state)?)?;

    let unwritten = state.borrow().unwritten_rows();
    if unwritten > 0 {
        eprintln!(
            "{} {} process rows were not written: no timesync line was found",
            warning, unwritten
        );
    }
    Ok(stats)
}
