// Core library for the logdemux log demultiplexer

pub mod byte_format;
pub mod cli;
pub mod config;
pub mod config_file;
pub mod datestring;
pub mod decompression;
pub mod demux;
pub mod error_handling;
pub mod fields;
pub mod output;
pub mod processors;
pub mod readers;
pub mod record;
pub mod rules;
pub mod stats;

pub use byte_format::to_bytes;
pub use config::{DemuxConfig, IMPLICIT_KEY};
pub use datestring::ReferenceDate;
pub use demux::{parse, Demultiplexer, MatchContext};
pub use error_handling::{DemuxError, ExitCode};
pub use fields::FieldBuffer;
pub use output::{Activation, OutputTable};
pub use readers::LineSource;
pub use record::{parse_record, Record, RecordValue};
pub use rules::{Rule, RuleSet};
pub use stats::ProcessingStats;
