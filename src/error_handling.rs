use std::path::{Path, PathBuf};
use std::process;

/// Error taxonomy for a demultiplexing run
///
/// Every variant is fatal: a run either completes or aborts, and partially
/// written output files are left as they are.
#[derive(Debug, thiserror::Error)]
pub enum DemuxError {
    /// Invalid setup: empty input list, bad output directory, malformed pattern
    #[error("{0}")]
    Configuration(String),

    /// A source file could not be opened or read
    #[error("failed to read '{}': {cause}", path.display())]
    Input {
        path: PathBuf,
        cause: std::io::Error,
    },

    /// An output file could not be created, reopened, written or flushed
    #[error("failed to write '{}': {cause}", path.display())]
    Output {
        path: PathBuf,
        cause: std::io::Error,
    },

    /// A rule handler returned an error
    #[error("handler for rule '{rule}' failed at line {line_number}: {cause}")]
    Handler {
        rule: String,
        line_number: usize,
        cause: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl DemuxError {
    pub fn configuration(message: impl Into<String>) -> Self {
        DemuxError::Configuration(message.into())
    }

    pub fn input(path: &Path, cause: std::io::Error) -> Self {
        DemuxError::Input {
            path: path.to_path_buf(),
            cause,
        }
    }

    pub fn output(path: &Path, cause: std::io::Error) -> Self {
        DemuxError::Output {
            path: path.to_path_buf(),
            cause,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, DemuxError::Configuration(_))
    }
}

/// Standard Unix exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidUsage = 2,
}

impl ExitCode {
    pub fn exit(self) -> ! {
        process::exit(self as i32)
    }

    /// Configuration problems are usage errors, everything else is a runtime failure
    pub fn for_error(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<DemuxError>() {
            Some(e) if e.is_configuration() => ExitCode::InvalidUsage,
            _ => ExitCode::GeneralError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_map_to_invalid_usage() {
        let err: anyhow::Error = DemuxError::configuration("no input files").into();
        assert_eq!(ExitCode::for_error(&err), ExitCode::InvalidUsage);
        assert_eq!(err.to_string(), "no input files");
    }

    #[test]
    fn test_io_errors_map_to_general_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: anyhow::Error = DemuxError::input(Path::new("a.log"), io).into();
        assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
        assert!(err.to_string().contains("a.log"));

        let plain = anyhow::anyhow!("something else");
        assert_eq!(ExitCode::for_error(&plain), ExitCode::GeneralError);
    }

    #[test]
    fn test_handler_error_mentions_rule_and_line() {
        let err = DemuxError::Handler {
            rule: "proc".to_string(),
            line_number: 42,
            cause: anyhow::anyhow!("missing RSS").into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("proc"));
        assert!(msg.contains("42"));
        assert!(msg.contains("missing RSS"));
    }
}
