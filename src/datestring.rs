use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Timelike};

/// Format of the timesync stamp once the timezone name has been dropped
const STAMP_FORMAT: &str = "%a %b %d %H:%M:%S %Y %z";

/// Output format of resolved dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Reference date taken from an infrequent timesync stamp
///
/// Frequent lines often carry only a wall-clock time. Such a time is assumed
/// to lie within an hour of the reference, which is enough to tell whether it
/// belongs to the day before or after when the reference sits next to midnight.
///
/// ```
/// use logdemux::ReferenceDate;
///
/// let reference = ReferenceDate::parse("Sat Jan 01 00:01:00 EST 2000 -0500", 0).unwrap();
/// assert_eq!(reference.resolve_string("00:00:00"), "2000-01-01");
/// assert_eq!(reference.resolve_string("23:02:00"), "1999-12-31");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceDate {
    datetime: NaiveDateTime,
}

impl ReferenceDate {
    /// Parse `"<weekday> <month> <day> <HH:MM:SS> <tz-name> <year> <utc-offset>"`
    ///
    /// The wall-clock time of the stamp is kept (in the stamp's own offset) and
    /// then moved back by `offset_hours`.
    pub fn parse(stamp: &str, offset_hours: i64) -> Result<Self> {
        let tokens: Vec<&str> = stamp.split_whitespace().collect();
        if tokens.len() != 7 {
            return Err(anyhow!(
                "expected 7 fields in timesync stamp, found {}: '{}'",
                tokens.len(),
                stamp
            ));
        }

        // chrono cannot parse timezone names, the numeric offset is authoritative
        let without_zone_name = [
            tokens[0], tokens[1], tokens[2], tokens[3], tokens[5], tokens[6],
        ]
        .join(" ");

        let parsed = DateTime::parse_from_str(&without_zone_name, STAMP_FORMAT)
            .with_context(|| format!("invalid timesync stamp '{}'", stamp))?;

        Duration::try_hours(offset_hours)
            .and_then(|offset| parsed.naive_local().checked_sub_signed(offset))
            .map(Self::from_datetime)
            .ok_or_else(|| anyhow!("offset of {} hours is out of range", offset_hours))
    }

    pub fn from_datetime(datetime: NaiveDateTime) -> Self {
        Self { datetime }
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.datetime
    }

    pub fn date(&self) -> NaiveDate {
        self.datetime.date()
    }

    pub fn date_string(&self) -> String {
        self.date().format(DATE_FORMAT).to_string()
    }

    pub fn hour(&self) -> u32 {
        self.datetime.hour()
    }

    /// Date a time-only value (`HH:MM` or `HH:MM:SS`) belongs to
    pub fn resolve(&self, time: &str) -> NaiveDate {
        let date = self.date();
        match (time.get(0..2), self.hour()) {
            (Some("00"), 23) => date.succ_opt().unwrap_or(date),
            (Some("23"), 0) => date.pred_opt().unwrap_or(date),
            _ => date,
        }
    }

    pub fn resolve_string(&self, time: &str) -> String {
        self.resolve(time).format(DATE_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reference(date: &str, hour: u32) -> ReferenceDate {
        let date = NaiveDate::parse_from_str(date, DATE_FORMAT).unwrap();
        ReferenceDate::from_datetime(date.and_hms_opt(hour, 0, 0).unwrap())
    }

    #[test]
    fn test_parse_timesync_stamp() {
        let r = ReferenceDate::parse("Sat Jan 01 00:00:00 UTC 2000 +0000", 0).unwrap();
        assert_eq!(r.date_string(), "2000-01-01");
        assert_eq!(r.hour(), 0);
    }

    #[test]
    fn test_parse_keeps_stamp_wall_clock() {
        let r = ReferenceDate::parse("Fri Mar 03 23:45:10 EST 2017 -0500", 0).unwrap();
        assert_eq!(r.date_string(), "2017-03-03");
        assert_eq!(r.hour(), 23);
    }

    #[test]
    fn test_parse_applies_hour_offset() {
        let r = ReferenceDate::parse("Sat Jan 01 02:30:00 UTC 2000 +0000", 3).unwrap();
        assert_eq!(r.date_string(), "1999-12-31");
        assert_eq!(r.hour(), 23);

        let r = ReferenceDate::parse("Fri Dec 31 22:30:00 UTC 1999 +0000", -2).unwrap();
        assert_eq!(r.date_string(), "2000-01-01");
    }

    #[test]
    fn test_parse_rejects_huge_offsets() {
        assert!(ReferenceDate::parse("Sat Jan 01 00:00:00 UTC 2000 +0000", i64::MAX).is_err());
    }

    #[test]
    fn test_parse_rejects_malformed_stamps() {
        assert!(ReferenceDate::parse("Sat Jan 01 00:00:00 2000", 0).is_err());
        assert!(ReferenceDate::parse("Sat Foo 01 00:00:00 UTC 2000 +0000", 0).is_err());
        assert!(ReferenceDate::parse("", 0).is_err());
    }

    #[test]
    fn test_midnight_rollover() {
        assert_eq!(reference("2000-01-01", 0).resolve_string("23:30"), "1999-12-31");
        assert_eq!(reference("2000-01-01", 23).resolve_string("00:05"), "2000-01-02");
        assert_eq!(reference("2000-01-01", 0).resolve_string("00:05"), "2000-01-01");
        assert_eq!(reference("2000-01-01", 23).resolve_string("23:59:59"), "2000-01-01");
        assert_eq!(reference("2000-01-01", 12).resolve_string("00:05"), "2000-01-01");
    }

    #[test]
    fn test_resolve_short_input_uses_reference() {
        assert_eq!(reference("2000-01-01", 23).resolve_string("0"), "2000-01-01");
    }

    proptest! {
        #[test]
        fn prop_other_hours_resolve_to_reference(hour in 1u32..23, ref_hour in 0u32..24, minute in 0u32..60) {
            let r = reference("2016-02-29", ref_hour);
            let time = format!("{:02}:{:02}", hour, minute);
            prop_assert_eq!(r.resolve(&time), r.date());
        }
    }
}
