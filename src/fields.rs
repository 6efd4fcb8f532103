use indexmap::IndexMap;

/// Field carrying the reference date used to name output files
pub const DATE_FIELD: &str = "date";

/// Digits-only form of [`DATE_FIELD`], set when an output file is created
pub const DATESTAMP_FIELD: &str = "_datestamp";

/// Cumulative map of capture slot name to the last value seen for it
///
/// Values are never cleared between lines, so infrequent lines (a timesync
/// stamp, say) provide context to the frequent lines that follow them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldBuffer {
    values: IndexMap<String, String>,
}

impl FieldBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Like [`FieldBuffer::get`] but an error naming the field when it is absent
    pub fn require(&self, name: &str) -> anyhow::Result<&str> {
        self.get(name)
            .ok_or_else(|| anyhow::anyhow!("field '{}' has not been captured yet", name))
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.values.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Digits of the current date, if one is known
    ///
    /// Falls back to an already recorded datestamp when no date is present.
    pub fn datestamp(&self) -> Option<String> {
        let from_date = self.get(DATE_FIELD).map(digits_only);
        match from_date {
            Some(stamp) if !stamp.is_empty() => Some(stamp),
            _ => self
                .get(DATESTAMP_FIELD)
                .filter(|stamp| !stamp.is_empty())
                .map(str::to_string),
        }
    }
}

fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_are_sticky_until_overwritten() {
        let mut buffer = FieldBuffer::new();
        buffer.set("date", "2000-01-01");
        buffer.set("PID", "100");
        buffer.set("PID", "200");

        assert_eq!(buffer.get("date"), Some("2000-01-01"));
        assert_eq!(buffer.get("PID"), Some("200"));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_datestamp_strips_non_digits() {
        let mut buffer = FieldBuffer::new();
        assert_eq!(buffer.datestamp(), None);

        buffer.set(DATE_FIELD, "2017-03-14");
        assert_eq!(buffer.datestamp().as_deref(), Some("20170314"));
    }

    #[test]
    fn test_datestamp_falls_back_to_recorded_stamp() {
        let mut buffer = FieldBuffer::new();
        buffer.set(DATESTAMP_FIELD, "19991231");
        assert_eq!(buffer.datestamp().as_deref(), Some("19991231"));

        buffer.set(DATE_FIELD, "");
        assert_eq!(buffer.datestamp().as_deref(), Some("19991231"));
    }

    #[test]
    fn test_require_names_missing_field() {
        let buffer = FieldBuffer::new();
        let err = buffer.require("RSS").unwrap_err();
        assert!(err.to_string().contains("RSS"));
    }

    #[test]
    fn test_iteration_keeps_first_insertion_order() {
        let mut buffer = FieldBuffer::new();
        buffer.set("b", "1");
        buffer.set("a", "2");
        buffer.set("b", "3");
        let names: Vec<&str> = buffer.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
