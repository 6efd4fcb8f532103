mod common;
use common::*;

use anyhow::Result;
use logdemux::fields::DATE_FIELD;
use logdemux::{parse, DemuxConfig, DemuxError, ReferenceDate, Rule, RuleSet};
use proptest::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Timesync stamps set the date, data rows carry only a time
fn sampling_rules<'h>() -> RuleSet<'h> {
    RuleSet::new()
        .with_rule(
            Rule::new("timesync", r"timesync: date time is-> (?P<DATE_STRING>.*)$")
                .unwrap()
                .with_handler(|ctx| {
                    let reference = ReferenceDate::parse(ctx.fields.require("DATE_STRING")?, 0)?;
                    ctx.fields.set(DATE_FIELD, reference.date_string());
                    Ok(())
                }),
        )
        .with_rule(
            Rule::new(
                "sample",
                r"^(?P<TIME>\d\d:\d\d:\d\d) pid=(?P<PID>\d+) rss=(?P<RSS>\d+)$",
            )
            .unwrap()
            .with_handler(|ctx| {
                let line = format!(
                    "{}T{} {} {}",
                    ctx.fields.require(DATE_FIELD)?,
                    ctx.fields.require("TIME")?,
                    ctx.fields.require("RSS")?,
                    ctx.line_number
                );
                ctx.write_current(&line)?;
                Ok(())
            }),
        )
}

fn sample(time: &str, pid: u32, rss: u32) -> String {
    format!("{} pid={} rss={}", time, pid, rss)
}

fn pid_config(dir: &Path) -> DemuxConfig {
    DemuxConfig::new(dir).with_id_column("PID")
}

#[test]
fn test_two_files_two_pids_end_to_end() -> Result<()> {
    let input = TempDir::new()?;
    let output = TempDir::new()?;
    let first = write_plain(
        input.path(),
        "first.log",
        &[
            TIMESYNC_LINE.to_string(),
            sample("00:00:01", 100, 10),
            sample("00:00:01", 200, 20),
            "unrelated chatter".to_string(),
            sample("00:00:02", 100, 11),
        ],
    );
    let second = write_plain(
        input.path(),
        "second.log",
        &[sample("00:00:03", 200, 21), sample("00:00:03", 100, 12)],
    );

    let stats = parse(&[first, second], pid_config(output.path()), sampling_rules())?;

    assert_eq!(
        file_names(output.path()),
        vec!["20000101_100.data", "20000101_200.data"]
    );
    assert_eq!(
        read(output.path(), "20000101_100.data"),
        "2000-01-01T00:00:01 10 2\n2000-01-01T00:00:02 11 5\n2000-01-01T00:00:03 12 2\n"
    );
    assert_eq!(
        read(output.path(), "20000101_200.data"),
        "2000-01-01T00:00:01 20 3\n2000-01-01T00:00:03 21 1\n"
    );
    assert_eq!(stats.files_processed, 2);
    assert_eq!(stats.lines_read, 7);
    assert_eq!(stats.lines_matched, 6);
    assert_eq!(stats.outputs_created, 2);
    Ok(())
}

#[test]
fn test_gzip_and_plain_outputs_are_identical() -> Result<()> {
    let lines = vec![
        TIMESYNC_LINE.to_string(),
        sample("00:00:01", 7, 100),
        sample("00:00:01", 8, 200),
        sample("00:00:02", 7, 101),
        sample("00:00:02", 9, 300),
        sample("00:00:03", 8, 201),
    ];

    let input = TempDir::new()?;
    let plain_out = TempDir::new()?;
    let gzip_out = TempDir::new()?;
    let plain = write_plain(input.path(), "top.log", &lines);
    let gzip = write_gzip(input.path(), "top.log.gz", &lines);

    parse(&[plain], pid_config(plain_out.path()), sampling_rules())?;
    parse(&[gzip], pid_config(gzip_out.path()), sampling_rules())?;

    let names = file_names(plain_out.path());
    assert_eq!(names.len(), 3);
    assert_eq!(names, file_names(gzip_out.path()));
    for name in names {
        assert_eq!(
            std::fs::read(plain_out.path().join(&name))?,
            std::fs::read(gzip_out.path().join(&name))?,
            "{} differs",
            name
        );
    }
    Ok(())
}

#[test]
fn test_zstd_input() -> Result<()> {
    use std::io::Write;

    let input = TempDir::new()?;
    let output = TempDir::new()?;
    let path = input.path().join("top.log.zst");
    let mut encoder = zstd::stream::write::Encoder::new(std::fs::File::create(&path)?, 0)?;
    writeln!(encoder, "{}", TIMESYNC_LINE)?;
    writeln!(encoder, "{}", sample("00:00:01", 1, 5))?;
    encoder.finish()?;

    parse(&[path], pid_config(output.path()), sampling_rules())?;
    assert_eq!(
        read(output.path(), "20000101_1.data"),
        "2000-01-01T00:00:01 5 2\n"
    );
    Ok(())
}

#[test]
fn test_missing_input_aborts_after_closing_outputs() -> Result<()> {
    let input = TempDir::new()?;
    let output = TempDir::new()?;
    let present = write_plain(
        input.path(),
        "present.log",
        &[TIMESYNC_LINE.to_string(), sample("00:00:01", 1, 5)],
    );
    let missing = input.path().join("missing.log");

    let err = parse(&[present, missing], pid_config(output.path()), sampling_rules()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DemuxError>(),
        Some(DemuxError::Input { .. })
    ));

    // Rows written before the failure were flushed
    assert_eq!(
        read(output.path(), "20000101_1.data"),
        "2000-01-01T00:00:01 5 2\n"
    );
    Ok(())
}

#[test]
fn test_unwritable_output_dir_is_configuration_error() -> Result<()> {
    let input = TempDir::new()?;
    let not_a_dir = write_plain(input.path(), "occupied", &["x".to_string()]);
    let log = write_plain(input.path(), "a.log", &[TIMESYNC_LINE.to_string()]);

    let err = parse(&[log], pid_config(&not_a_dir), sampling_rules()).unwrap_err();
    assert!(err.downcast_ref::<DemuxError>().unwrap().is_configuration());
    Ok(())
}

#[test]
fn test_empty_input_list_is_configuration_error() {
    let output = TempDir::new().unwrap();
    let files: Vec<PathBuf> = Vec::new();
    let err = parse(&files, pid_config(output.path()), sampling_rules()).unwrap_err();
    assert!(err.downcast_ref::<DemuxError>().unwrap().is_configuration());
}

#[test]
fn test_output_dir_is_created() -> Result<()> {
    let input = TempDir::new()?;
    let output = TempDir::new()?;
    let nested = output.path().join("a").join("b");
    let log = write_plain(
        input.path(),
        "a.log",
        &[TIMESYNC_LINE.to_string(), sample("00:00:01", 3, 1)],
    );

    parse(&[log], pid_config(&nested), sampling_rules())?;
    assert_eq!(file_names(&nested), vec!["20000101_3.data"]);
    Ok(())
}

fn row_rules<'h>() -> RuleSet<'h> {
    RuleSet::new()
        .with_rule(Rule::new("date", r"^date (?P<date>\S+)$").unwrap())
        .with_rule(
            Rule::new("row", r"^row (?P<key>\w+) (?P<seq>\d+)$")
                .unwrap()
                .with_handler(|ctx| {
                    let seq = ctx.fields.require("seq")?.to_string();
                    ctx.write_current(&seq)?;
                    Ok(())
                }),
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_interleaved_keys_keep_their_rows(
        keys in prop::collection::vec(0usize..4, 1..40),
        split_at in 0usize..40,
    ) {
        const NAMES: [&str; 4] = ["alpha", "beta", "gamma", "delta"];

        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();

        let rows: Vec<String> = keys
            .iter()
            .enumerate()
            .map(|(seq, &k)| format!("row {} {}", NAMES[k], seq))
            .collect();
        let split_at = split_at.min(rows.len());

        let mut first = vec!["date 2000-01-01".to_string()];
        first.extend_from_slice(&rows[..split_at]);
        let files = vec![
            write_plain(input.path(), "one.log", &first),
            write_plain(input.path(), "two.log", &rows[split_at..]),
        ];

        let config = DemuxConfig::new(output.path()).with_id_column("key");
        let stats = parse(&files, config, row_rules()).unwrap();

        let mut distinct: Vec<usize> = keys.clone();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(stats.outputs_created, distinct.len());
        prop_assert_eq!(file_names(output.path()).len(), distinct.len());

        for k in distinct {
            let expected: String = keys
                .iter()
                .enumerate()
                .filter(|&(_, &key)| key == k)
                .map(|(seq, _)| format!("{}\n", seq))
                .collect();
            let name = format!("20000101_{}.data", NAMES[k]);
            prop_assert_eq!(read(output.path(), &name), expected);
        }
    }
}
