use anyhow::{Context, Result};
use regex::Regex;
use std::fmt;

use crate::demux::MatchContext;
use crate::error_handling::DemuxError;

/// Callback invoked on every successful match of its rule
pub type Handler<'h> = Box<dyn FnMut(&mut MatchContext<'_>) -> Result<()> + 'h>;

/// A line matcher, the capture slots it declares and an optional handler
pub struct Rule<'h> {
    name: String,
    regex: Regex,
    slots: Vec<String>,
    handler: Option<Handler<'h>>,
}

impl<'h> Rule<'h> {
    /// Compile `pattern` into a rule
    ///
    /// Named groups use the regex crate syntax, `(?P<name>...)` or `(?<name>...)`.
    /// A pattern that fails to compile is a configuration error.
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self> {
        let name = name.into();
        let regex = Regex::new(pattern)
            .map_err(|e| {
                DemuxError::configuration(format!("invalid pattern for rule '{}': {}", name, e))
            })
            .with_context(|| format!("Failed to compile regex pattern: {}", pattern))?;
        Ok(Self::from_regex(name, regex))
    }

    pub fn from_regex(name: impl Into<String>, regex: Regex) -> Self {
        let slots = regex
            .capture_names()
            .flatten()
            .map(str::to_string)
            .collect();
        Self {
            name: name.into(),
            regex,
            slots,
            handler: None,
        }
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&mut MatchContext<'_>) -> Result<()> + 'h,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Named capture slots in pattern order
    pub fn slots(&self) -> &[String] {
        &self.slots
    }

    pub fn declares(&self, slot: &str) -> bool {
        self.slots.iter().any(|s| s == slot)
    }

    /// Name and handler borrowed together for dispatch
    pub(crate) fn handler_parts(&mut self) -> (&str, Option<&mut Handler<'h>>) {
        (&self.name, self.handler.as_mut())
    }
}

impl fmt::Debug for Rule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("pattern", &self.regex.as_str())
            .field("slots", &self.slots)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

/// Rules evaluated against every line, in registration order
#[derive(Debug, Default)]
pub struct RuleSet<'h> {
    rules: Vec<Rule<'h>>,
}

impl<'h> RuleSet<'h> {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: Rule<'h>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn push(&mut self, rule: Rule<'h>) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule<'h>> {
        self.rules.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Rule<'h>> {
        self.rules.iter_mut()
    }
}
