//! Generic splitter: every matched line goes to its key's file

use anyhow::Result;
use regex::Regex;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::config::DemuxConfig;
use crate::demux::{parse, MatchContext};
use crate::error_handling::DemuxError;
use crate::rules::{Rule, RuleSet};
use crate::stats::ProcessingStats;

pub const DEFAULT_OUTPUT_DIR: &str = "split_outputs";

#[derive(Debug, Clone, Default)]
pub struct SplitOptions {
    pub patterns: Vec<String>,
    pub id_column: Option<String>,
    pub id_filter: Option<String>,
}

/// Last line written, so a line matched by several rules is written once
type LastWritten = RefCell<Option<(PathBuf, usize)>>;

/// Patterns declaring the id column, with their position in the rule list
#[derive(Debug, Default)]
struct KeyRules {
    column: String,
    filter: Option<String>,
    rules: Vec<(usize, Regex)>,
}

impl KeyRules {
    fn new(options: &SplitOptions, rules: &[Rule<'_>]) -> Self {
        let Some(column) = options.id_column.as_deref() else {
            return Self::default();
        };
        Self {
            column: column.to_string(),
            filter: options.id_filter.clone(),
            rules: rules
                .iter()
                .enumerate()
                .filter(|(_, rule)| rule.declares(column))
                .map(|(index, rule)| (index, rule.regex().clone()))
                .collect(),
        }
    }

    /// Whether rule `index` is the one to write `line`
    ///
    /// A line belongs to the key set by the last id-declaring rule matching
    /// it, so rules before that one leave it alone. Lines carrying an id
    /// other than the filter are not written by any rule.
    fn writes_at(&self, index: usize, line: &str) -> bool {
        let mut last = None;
        for (position, regex) in &self.rules {
            let Some(captures) = regex.captures(line) else {
                continue;
            };
            let id = captures.name(&self.column).map_or("", |m| m.as_str().trim());
            if self.filter.as_deref().is_some_and(|filter| filter != id) {
                return false;
            }
            last = Some(*position);
        }
        last.map_or(true, |position| index >= position)
    }
}

fn write_matched(ctx: &mut MatchContext<'_>, last: &LastWritten) -> Result<()> {
    let position = (ctx.path.to_path_buf(), ctx.line_number);
    if last.borrow().as_ref() == Some(&position) {
        return Ok(());
    }
    if ctx.write_current(&format!("{} {}", ctx.line_number, ctx.line))? {
        *last.borrow_mut() = Some(position);
    }
    Ok(())
}

pub fn rules<'h>(options: &SplitOptions, last: &'h LastWritten) -> Result<RuleSet<'h>> {
    if options.patterns.is_empty() {
        return Err(DemuxError::configuration("at least one pattern is required").into());
    }

    let compiled = options
        .patterns
        .iter()
        .enumerate()
        .map(|(index, pattern)| Rule::new(format!("pattern-{}", index + 1), pattern))
        .collect::<Result<Vec<_>>>()?;
    let key_rules = Rc::new(KeyRules::new(options, &compiled));

    let mut rules = RuleSet::new();
    for (index, rule) in compiled.into_iter().enumerate() {
        let key_rules = Rc::clone(&key_rules);
        rules.push(rule.with_handler(move |ctx| {
            if key_rules.writes_at(index, ctx.line) {
                write_matched(ctx, last)
            } else {
                Ok(())
            }
        }));
    }
    Ok(rules)
}

pub fn configure(config: DemuxConfig, options: &SplitOptions) -> DemuxConfig {
    let mut config = match options.id_column.as_deref() {
        Some(column) => config.with_id_column(column),
        None => config,
    };
    if let Some(filter) = options.id_filter.as_deref() {
        config = config.with_id_filter(filter);
    }
    config
}

pub fn run<P: AsRef<Path>>(
    files: &[P],
    options: &SplitOptions,
    config: DemuxConfig,
) -> Result<ProcessingStats> {
    let last = RefCell::new(None);
    let rules = rules(options, &last)?;
    parse(files, configure(config, options), rules)
}
