//! Ready-made rule sets for the log formats the tool understands

pub mod memlog;
pub mod split;
pub mod top;

pub use memlog::MemlogOptions;
pub use split::SplitOptions;
pub use top::TopOptions;

/// Regex fragment matching a worker type filter, or anything
fn worker_type_pattern(worker_type: Option<&str>) -> String {
    match worker_type {
        Some(worker) => format!(".*{}.*", worker),
        None => ".*".to_string(),
    }
}
