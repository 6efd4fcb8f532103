use serde::Serialize;
use std::time::{Duration, Instant};

/// Statistics collected during one demultiplexing run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessingStats {
    pub files_processed: usize,
    pub lines_read: usize,
    /// Lines matched by at least one rule
    pub lines_matched: usize,
    pub rule_matches: usize,
    /// Rule matches skipped because of the id filter
    pub lines_filtered: usize,
    pub handler_calls: usize,
    pub outputs_created: usize,
    pub outputs_reopened: usize,
    #[serde(serialize_with = "serialize_duration_ms")]
    pub processing_time: Duration,
    #[serde(skip)]
    pub start_time: Option<Instant>,
}

fn serialize_duration_ms<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u128(d.as_millis())
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    pub fn finish_processing(&mut self) {
        if let Some(start) = self.start_time {
            self.processing_time = start.elapsed();
        }
    }

    pub fn format_stats(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "Files processed: {}\n",
            self.files_processed
        ));
        output.push_str(&format!(
            "Lines processed: {} total, {} matched, {} filtered by id\n",
            self.lines_read, self.lines_matched, self.lines_filtered
        ));
        output.push_str(&format!(
            "Rule matches: {} ({} handler calls)\n",
            self.rule_matches, self.handler_calls
        ));
        output.push_str(&format!(
            "Output files: {} created, {} reopened\n",
            self.outputs_created, self.outputs_reopened
        ));

        let ms = self.processing_time.as_millis();
        if ms > 0 {
            let lines_per_sec = (self.lines_read as f64 * 1000.0) / ms as f64;
            output.push_str(&format!(
                "Time: {:.2}s ({:.0} lines/s)",
                self.processing_time.as_secs_f64(),
                lines_per_sec
            ));
        } else {
            output.push_str(&format!("Time: {:.2}s", self.processing_time.as_secs_f64()));
        }

        output
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_stats_lists_counters() {
        let stats = ProcessingStats {
            files_processed: 2,
            lines_read: 10,
            lines_matched: 6,
            rule_matches: 7,
            lines_filtered: 1,
            handler_calls: 5,
            outputs_created: 2,
            outputs_reopened: 1,
            ..Default::default()
        };
        let text = stats.format_stats();
        assert!(text.contains("Files processed: 2"));
        assert!(text.contains("10 total, 6 matched, 1 filtered by id"));
        assert!(text.contains("2 created, 1 reopened"));
    }

    #[test]
    fn test_json_output() {
        let stats = ProcessingStats {
            lines_read: 3,
            processing_time: Duration::from_millis(1500),
            ..Default::default()
        };
        let value: serde_json::Value = serde_json::from_str(&stats.to_json()).unwrap();
        assert_eq!(value["lines_read"], 3);
        assert_eq!(value["processing_time"], 1500);
        assert!(value.get("start_time").is_none());
    }
}
