//! Timestamps as they appear in a store.
//!
//! Stores written by older releases hold naive `YYYY-MM-DD HH:MM:SS[.f]` text;
//! current releases write RFC 3339 UTC. Both must be compared and subtracted
//! against each other, so every stored value is parsed into a
//! [`StoredTimestamp`] that remembers whether it carried a zone.
//!
//! A naive value that meets an aware operand is aligned to that operand's
//! offset before any arithmetic. A naive value converted on its own is read
//! as UTC.

use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, TimeDelta, TimeZone, Utc,
};

use crate::CoreError;

const AWARE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredTimestamp {
    Naive(NaiveDateTime),
    Aware(DateTime<FixedOffset>),
}

impl StoredTimestamp {
    /// Parse a timestamp column value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTimestamp`] if the text matches none of the
    /// accepted layouts.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(StoredTimestamp::Aware(dt));
        }
        for format in AWARE_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(trimmed, format) {
                return Ok(StoredTimestamp::Aware(dt));
            }
        }
        if let Some(stripped) = trimmed.strip_suffix('Z') {
            if let Some(naive) = parse_naive(stripped) {
                return Ok(StoredTimestamp::Aware(Utc.from_utc_datetime(&naive).fixed_offset()));
            }
        }
        if let Some(naive) = parse_naive(trimmed) {
            return Ok(StoredTimestamp::Naive(naive));
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Ok(StoredTimestamp::Naive(date.and_time(chrono::NaiveTime::MIN)));
        }

        Err(CoreError::InvalidTimestamp(raw.to_string()))
    }

    /// Parse an optional column value; `NULL` stays `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTimestamp`] for non-null unparseable text.
    pub fn parse_opt(raw: Option<&str>) -> Result<Option<Self>, CoreError> {
        raw.map(Self::parse).transpose()
    }

    #[must_use]
    pub fn is_naive(&self) -> bool {
        matches!(self, StoredTimestamp::Naive(_))
    }

    /// The instant this value denotes, reading naive values as UTC.
    #[must_use]
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self {
            StoredTimestamp::Naive(naive) => Utc.from_utc_datetime(naive),
            StoredTimestamp::Aware(aware) => aware.with_timezone(&Utc),
        }
    }

    /// Interpret this value in `offset` if it is naive; aware values keep
    /// their own instant and are only re-expressed in `offset`.
    #[must_use]
    pub fn aligned_to(&self, offset: FixedOffset) -> DateTime<FixedOffset> {
        match self {
            StoredTimestamp::Naive(naive) => {
                let utc = *naive - TimeDelta::seconds(i64::from(offset.local_minus_utc()));
                DateTime::from_naive_utc_and_offset(utc, offset)
            }
            StoredTimestamp::Aware(aware) => aware.with_timezone(&offset),
        }
    }
}

impl From<DateTime<Utc>> for StoredTimestamp {
    fn from(value: DateTime<Utc>) -> Self {
        StoredTimestamp::Aware(value.fixed_offset())
    }
}

/// Canonical text written for every timestamp column.
#[must_use]
pub fn format_stored(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

/// Best estimate of an event that happened somewhere in `[start, end]`.
#[must_use]
pub fn midpoint(start: DateTime<Utc>, end: DateTime<Utc>) -> DateTime<Utc> {
    start + end.signed_duration_since(start) / 2
}

/// [`midpoint`] over stored values that may mix naive and aware text.
#[must_use]
pub fn midpoint_stored(start: &StoredTimestamp, end: &StoredTimestamp) -> DateTime<Utc> {
    match (start, end) {
        (StoredTimestamp::Naive(a), StoredTimestamp::Naive(b)) => {
            let mid = *a + b.signed_duration_since(*a) / 2;
            Utc.from_utc_datetime(&mid)
        }
        (StoredTimestamp::Naive(_), StoredTimestamp::Aware(b)) => {
            let a = start.aligned_to(*b.offset());
            midpoint(a.with_timezone(&Utc), b.with_timezone(&Utc))
        }
        (StoredTimestamp::Aware(a), StoredTimestamp::Naive(_)) => {
            let b = end.aligned_to(*a.offset());
            midpoint(a.with_timezone(&Utc), b.with_timezone(&Utc))
        }
        (StoredTimestamp::Aware(a), StoredTimestamp::Aware(b)) => {
            midpoint(a.with_timezone(&Utc), b.with_timezone(&Utc))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn midpoint_of_half_day_is_six_hours_in() {
        let start = utc("2024-01-01T00:00:00Z");
        let end = utc("2024-01-01T12:00:00Z");
        assert_eq!(midpoint(start, end), utc("2024-01-01T06:00:00Z"));
    }

    #[test]
    fn midpoint_of_equal_instants_is_that_instant() {
        let at = utc("2024-03-05T10:11:12Z");
        assert_eq!(midpoint(at, at), at);
    }

    #[test]
    fn parses_rfc3339_as_aware() {
        let parsed = StoredTimestamp::parse("2024-01-01T06:00:00+00:00").unwrap();
        assert!(!parsed.is_naive());
        assert_eq!(parsed.to_utc(), utc("2024-01-01T06:00:00Z"));
    }

    #[test]
    fn parses_legacy_naive_with_microseconds() {
        let parsed = StoredTimestamp::parse("2024-01-01 06:00:00.123456").unwrap();
        assert!(parsed.is_naive());
        assert_eq!(parsed.to_utc(), utc("2024-01-01T06:00:00.123456Z"));
    }

    #[test]
    fn parses_space_separated_offset() {
        let parsed = StoredTimestamp::parse("2024-01-01 08:00:00+02:00").unwrap();
        assert_eq!(parsed.to_utc(), utc("2024-01-01T06:00:00Z"));
    }

    #[test]
    fn parses_zulu_suffix_without_t_separator() {
        let parsed = StoredTimestamp::parse("2024-01-01 06:00:00Z").unwrap();
        assert!(!parsed.is_naive());
        assert_eq!(parsed.to_utc(), utc("2024-01-01T06:00:00Z"));
    }

    #[test]
    fn rejects_garbage() {
        let err = StoredTimestamp::parse("yesterday").unwrap_err();
        assert!(matches!(err, CoreError::InvalidTimestamp(ref v) if v == "yesterday"));
    }

    #[test]
    fn parse_opt_keeps_null() {
        assert!(StoredTimestamp::parse_opt(None).unwrap().is_none());
    }

    #[test]
    fn naive_operand_is_aligned_to_aware_operand_zone() {
        // Naive 10:00 next to a +02:00 value is read as 10:00+02:00 (08:00Z).
        let naive = StoredTimestamp::parse("2024-01-01 10:00:00").unwrap();
        let aware = StoredTimestamp::parse("2024-01-01T12:00:00+02:00").unwrap();
        assert_eq!(midpoint_stored(&naive, &aware), utc("2024-01-01T09:00:00Z"));
        assert_eq!(midpoint_stored(&aware, &naive), utc("2024-01-01T09:00:00Z"));
    }

    #[test]
    fn naive_pair_is_read_as_utc() {
        let a = StoredTimestamp::parse("2024-01-01 00:00:00").unwrap();
        let b = StoredTimestamp::parse("2024-01-01 12:00:00").unwrap();
        assert_eq!(midpoint_stored(&a, &b), utc("2024-01-01T06:00:00Z"));
    }

    #[test]
    fn naive_and_utc_operands_agree_with_utc_midpoint() {
        let naive = StoredTimestamp::parse("2024-01-01 00:00:00").unwrap();
        let aware = StoredTimestamp::from(utc("2024-01-01T12:00:00Z"));
        assert_eq!(midpoint_stored(&naive, &aware), utc("2024-01-01T06:00:00Z"));
    }

    #[test]
    fn format_stored_round_trips_through_parse() {
        let at = utc("2024-01-01T06:00:00.250Z");
        let text = format_stored(at);
        assert_eq!(text, "2024-01-01T06:00:00.250000Z");
        assert_eq!(StoredTimestamp::parse(&text).unwrap().to_utc(), at);
    }
}
