// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub const TIMESYNC_LINE: &str = "timesync: date time is-> Sat Jan 01 00:00:00 UTC 2000 +0000";

/// Run the logdemux binary in `cwd` with the given arguments
pub fn run_logdemux_in(cwd: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_logdemux"))
        .args(args)
        .current_dir(cwd)
        .env("NO_EMOJI", "1")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute logdemux");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Write `lines` as a plain text file, one per line
pub fn write_plain(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(name);
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(&path, content).expect("Failed to write input file");
    path
}

/// Write `lines` as a gzip-compressed file
pub fn write_gzip(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).expect("Failed to create gzip file");
    let mut encoder = GzEncoder::new(file, Compression::default());
    for line in lines {
        writeln!(encoder, "{}", line).expect("Failed to write gzip content");
    }
    encoder.finish().expect("Failed to finish gzip stream");
    path
}

/// Sorted file names in `dir`
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("Failed to read output dir")
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

pub fn read(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name))
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", dir.join(name).display(), e))
}

/// top(1) uptime header line for a sample taken at `time`
pub fn top_uptime(time: &str) -> String {
    format!(
        "top - {} up 3 days,  4:05,  1 user,  load average: 0.15, 0.10, 0.05",
        time
    )
}

/// top(1) process line with a PPID column
pub fn top_process(pid: u32, virt: &str, res: &str, shr: &str, cmd: &str) -> String {
    format!(
        "{:>5} {:>6}{:<10}{:>2} {:>3} {:>7} {:>6} {:>6} {} {:>5} {:>4} {:>9} {}",
        pid, 1, " root", "20", "0", virt, res, shr, "S", "0.3", "2.1", "12:01.55", cmd
    )
}
