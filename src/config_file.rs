use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use crate::error_handling::DemuxError;

const PROJECT_FILE_NAME: &str = ".logdemuxrc";

/// Defaults read from a logdemux configuration file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub output_dir: Option<PathBuf>,
    pub verbose: Option<bool>,
    /// Default `--offset` for the top processor, in hours
    pub tz_offset: Option<i64>,
    pub no_emoji: Option<bool>,
}

impl ConfigFile {
    /// Find a project-level .logdemuxrc by walking up from `start`
    pub fn find_project_config_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let config_path = current.join(PROJECT_FILE_NAME);
            if config_path.is_file() {
                return Some(config_path);
            }
            if !current.pop() {
                break;
            }
        }
        None
    }

    pub fn find_project_config() -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok()?;
        Self::find_project_config_from(&cwd)
    }

    /// User config file locations in order of preference
    pub fn get_user_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("logdemux").join("config.ini"));
        }
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(PROJECT_FILE_NAME));
        }
        paths
    }

    /// Load with precedence project > user > defaults
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::get_user_config_paths()
            .into_iter()
            .find(|p| p.is_file())
        {
            config = config.merge(Self::load_from_path(&path)?);
        }

        if let Some(project_path) = Self::find_project_config() {
            config = config.merge(Self::load_from_path(&project_path)?);
        }

        Ok(config)
    }

    pub fn load_with_custom_path(custom_path: Option<&Path>) -> Result<Self> {
        match custom_path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse_ini_content(&content)
            .map_err(|e| DemuxError::configuration(format!("{}: {}", path.display(), e)).into())
    }

    /// Parse root-level `key = value` pairs; sections and unknown keys are ignored
    fn parse_ini_content(content: &str) -> Result<Self> {
        let mut config = Self::default();
        let mut in_section = false;

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                in_section = true;
                continue;
            }
            if in_section {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            let line_number = index + 1;

            match key {
                "output_dir" => config.output_dir = Some(PathBuf::from(value)),
                "verbose" => config.verbose = Some(parse_bool(value, key, line_number)?),
                "no_emoji" => config.no_emoji = Some(parse_bool(value, key, line_number)?),
                "tz_offset" => {
                    config.tz_offset = Some(value.parse().map_err(|_| {
                        anyhow!("line {}: tz_offset must be a whole number of hours, got '{}'", line_number, value)
                    })?)
                }
                _ => {}
            }
        }

        Ok(config)
    }

    /// Overlay `other` on top of `self`
    fn merge(self, other: Self) -> Self {
        Self {
            output_dir: other.output_dir.or(self.output_dir),
            verbose: other.verbose.or(self.verbose),
            tz_offset: other.tz_offset.or(self.tz_offset),
            no_emoji: other.no_emoji.or(self.no_emoji),
        }
    }
}

fn parse_bool(value: &str, key: &str, line_number: usize) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(anyhow!(
            "line {}: {} must be true or false, got '{}'",
            line_number,
            key,
            value
        )),
    }
}
