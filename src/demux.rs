use anyhow::Result;
use std::io::BufRead;
use std::path::Path;

use crate::config::{DemuxConfig, IMPLICIT_KEY};
use crate::error_handling::DemuxError;
use crate::fields::{FieldBuffer, DATESTAMP_FIELD};
use crate::output::{Activation, OutputTable};
use crate::readers::LineSource;
use crate::rules::RuleSet;
use crate::stats::ProcessingStats;

/// Everything a handler sees for one rule match
pub struct MatchContext<'a> {
    /// Name of the rule that matched
    pub rule: &'a str,
    /// Current key after this match was applied
    pub key: Option<&'a str>,
    pub outputs: &'a mut OutputTable,
    pub fields: &'a mut FieldBuffer,
    /// 1-based, restarting for every input file
    pub line_number: usize,
    pub line: &'a str,
    pub path: &'a Path,
    config: &'a DemuxConfig,
    stats: &'a mut ProcessingStats,
}

impl MatchContext<'_> {
    pub fn require_key(&self) -> Result<&str> {
        self.key
            .ok_or_else(|| anyhow::anyhow!("no current key at line {}", self.line_number))
    }

    /// Whether the current key has an open output file
    pub fn has_open_output(&self) -> bool {
        self.key.is_some_and(|key| self.outputs.is_open(key))
    }

    /// Write to the current key's file; `false` when no file is open for it
    pub fn write_current(&mut self, line: &str) -> Result<bool> {
        let Some(key) = self.key else {
            return Ok(false);
        };
        match self.outputs.open_handle(key) {
            Some(handle) => {
                handle.write_line(line)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Create or reopen `key`'s file outside the usual key switch
    ///
    /// Files opened for a key that is not current must be released with
    /// [`MatchContext::close_output`] before the handler returns.
    pub fn open_output(&mut self, key: &str) -> Result<Activation> {
        activate_output(key, self.config, self.fields, self.outputs, self.stats)
    }

    /// Close `key`'s file unless it belongs to the current key
    pub fn close_output(&mut self, key: &str) -> Result<()> {
        if self.key == Some(key) {
            return Ok(());
        }
        self.outputs.close(key)
    }
}

/// Stateful multi-rule line demultiplexer
///
/// Owns the field buffer, the current key and the output table for a single
/// run. Lines are processed strictly in order, file by file.
pub struct Demultiplexer<'h> {
    config: DemuxConfig,
    rules: RuleSet<'h>,
    /// Per rule: does its matcher declare the id column
    declares_id: Vec<bool>,
    fields: FieldBuffer,
    current_key: Option<String>,
    outputs: OutputTable,
    stats: ProcessingStats,
}

impl<'h> Demultiplexer<'h> {
    pub fn new(config: DemuxConfig, rules: RuleSet<'h>) -> Result<Self> {
        if rules.is_empty() {
            return Err(DemuxError::configuration("at least one rule is required").into());
        }
        config.validate()?;

        let declares_id = rules
            .iter()
            .map(|rule| {
                config
                    .id_column
                    .as_deref()
                    .is_some_and(|column| rule.declares(column))
            })
            .collect();

        let current_key = match config.id_column {
            Some(_) => None,
            None => Some(IMPLICIT_KEY.to_string()),
        };

        Ok(Self {
            outputs: OutputTable::new(&config.output_dir),
            config,
            rules,
            declares_id,
            fields: FieldBuffer::new(),
            current_key,
            stats: ProcessingStats::new(),
        })
    }

    pub fn config(&self) -> &DemuxConfig {
        &self.config
    }

    pub fn fields(&self) -> &FieldBuffer {
        &self.fields
    }

    pub fn current_key(&self) -> Option<&str> {
        self.current_key.as_deref()
    }

    pub fn outputs(&self) -> &OutputTable {
        &self.outputs
    }

    pub fn stats(&self) -> &ProcessingStats {
        &self.stats
    }

    /// Process every file in order, then close all outputs
    ///
    /// Outputs are closed on the error path too; the first error is returned.
    pub fn parse_files<P: AsRef<Path>>(&mut self, files: &[P]) -> Result<()> {
        if files.is_empty() {
            return Err(DemuxError::configuration("no input files given").into());
        }

        self.stats.start_timer();
        let result = files
            .iter()
            .try_for_each(|path| self.parse_file(path.as_ref()));
        let closed = self.finish();
        result.and(closed)
    }

    pub fn parse_file(&mut self, path: &Path) -> Result<()> {
        let source = LineSource::open(path)?;
        self.parse_source(source)
    }

    /// Process all lines of one source; outputs stay open for the next one
    pub fn parse_source<R: BufRead>(&mut self, mut source: LineSource<R>) -> Result<()> {
        let mut line = String::new();
        while let Some(line_number) = source.next_line(&mut line)? {
            self.process_line(&line, line_number, source.path())?;
        }
        self.stats.files_processed += 1;
        Ok(())
    }

    /// Close every open output file
    pub fn finish(&mut self) -> Result<()> {
        self.stats.finish_processing();
        self.outputs.close_all()
    }

    /// Run one physical line through every rule
    pub fn process_line(&mut self, line: &str, line_number: usize, path: &Path) -> Result<()> {
        let Self {
            config,
            rules,
            declares_id,
            fields,
            current_key,
            outputs,
            stats,
        } = self;

        stats.lines_read += 1;
        let mut matched = false;

        for (rule, &has_id) in rules.iter_mut().zip(declares_id.iter()) {
            let Some(captures) = rule.regex().captures(line) else {
                continue;
            };

            let line_id = if has_id {
                config
                    .id_column
                    .as_deref()
                    .and_then(|column| captures.name(column))
                    .map(|m| m.as_str().trim())
            } else {
                None
            };

            if has_id {
                if let Some(ref filter) = config.id_filter {
                    if line_id != Some(filter.as_str()) {
                        stats.lines_filtered += 1;
                        continue;
                    }
                }
            }

            matched = true;
            stats.rule_matches += 1;

            for slot in rule.slots() {
                match captures.name(slot) {
                    Some(m) => fields.set(slot.as_str(), m.as_str()),
                    None => {
                        fields.remove(slot);
                    }
                }
            }

            if has_id {
                let new_key = line_id.filter(|id| !id.is_empty());
                if current_key.as_deref() != new_key {
                    if let Some(previous) = current_key.as_deref() {
                        outputs.close(previous)?;
                    }
                    *current_key = new_key.map(str::to_string);
                }
            }

            if let Some(key) = current_key.as_deref() {
                activate_output(key, config, fields, outputs, stats)?;
            }

            let (rule_name, handler) = rule.handler_parts();
            if let Some(handler) = handler {
                stats.handler_calls += 1;
                let mut ctx = MatchContext {
                    rule: rule_name,
                    key: current_key.as_deref(),
                    outputs: &mut *outputs,
                    fields: &mut *fields,
                    line_number,
                    line,
                    path,
                    config: &*config,
                    stats: &mut *stats,
                };
                handler(&mut ctx).map_err(|e| wrap_handler_error(e, rule_name, line_number))?;
            }
        }

        if matched {
            stats.lines_matched += 1;
        }
        Ok(())
    }
}

/// Make `key`'s file available, recording the datestamp of a new one
fn activate_output(
    key: &str,
    config: &DemuxConfig,
    fields: &mut FieldBuffer,
    outputs: &mut OutputTable,
    stats: &mut ProcessingStats,
) -> Result<Activation> {
    let datestamp = fields.datestamp();
    let activation = outputs.activate(key, datestamp.as_deref())?;
    match &activation {
        Activation::Created(path) => {
            if let Some(stamp) = datestamp {
                fields.set(DATESTAMP_FIELD, stamp);
            }
            stats.outputs_created += 1;
            if config.verbose {
                eprintln!("{} creating new file:  {}", config.info_prefix(), path.display());
            }
        }
        Activation::Reopened(path) => {
            stats.outputs_reopened += 1;
            if config.verbose {
                eprintln!("{} reopening file:  {}", config.info_prefix(), path.display());
            }
        }
        Activation::Unchanged | Activation::Deferred => {}
    }
    Ok(activation)
}

/// Tag a handler failure with its rule and line, keeping typed demux errors as they are
fn wrap_handler_error(error: anyhow::Error, rule: &str, line_number: usize) -> anyhow::Error {
    if error.is::<DemuxError>() {
        return error;
    }
    DemuxError::Handler {
        rule: rule.to_string(),
        line_number,
        cause: format!("{:#}", error).into(),
    }
    .into()
}

/// Demultiplex `files` with `rules` in one pass
pub fn parse<P: AsRef<Path>>(
    files: &[P],
    config: DemuxConfig,
    rules: RuleSet<'_>,
) -> Result<ProcessingStats> {
    let mut demux = Demultiplexer::new(config, rules)?;
    demux.parse_files(files)?;
    Ok(demux.stats().clone())
}
