//! Calendar-local dates and times of day.
//!
//! A `YYYY-MM-DD` string names a day on the wall calendar, not an instant, so
//! it is split into components and never passed through a UTC-aware parser.

use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::{de, Deserialize, Deserializer, Serializer};

use crate::error::DomainError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

pub fn parse_calendar_date(raw: &str) -> Result<NaiveDate, DomainError> {
    let invalid = || DomainError::InvalidDate(raw.to_string());
    let mut parts = raw.trim().splitn(3, '-');
    let (Some(year), Some(month), Some(day)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// Blank input means "no date" and is not an error.
pub fn parse_optional_calendar_date(raw: &str) -> Result<Option<NaiveDate>, DomainError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_calendar_date(raw).map(Some)
}

pub fn format_calendar_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime, DomainError> {
    NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT)
        .map_err(|_| DomainError::InvalidTime(raw.to_string()))
}

pub fn format_time_of_day(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Accepts `YYYY-MM-DD`, or an RFC 3339 timestamp written by older clients,
/// which is reduced to the calendar day in its own offset.
fn read_date(raw: &str) -> Result<NaiveDate, DomainError> {
    match parse_calendar_date(raw) {
        Ok(date) => Ok(date),
        Err(err) => DateTime::parse_from_rfc3339(raw.trim())
            .map(|stamp| stamp.date_naive())
            .map_err(|_| err),
    }
}

pub mod calendar_date {
    use super::*;

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_calendar_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        read_date(&raw).map_err(de::Error::custom)
    }
}

pub mod optional_calendar_date {
    use super::*;

    pub fn serialize<S: Serializer>(
        date: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => serializer.serialize_str(&format_calendar_date(*date)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            Some(raw) if !raw.trim().is_empty() => read_date(&raw).map(Some).map_err(de::Error::custom),
            _ => Ok(None),
        }
    }
}

pub mod optional_time_of_day {
    use super::*;

    pub fn serialize<S: Serializer>(
        time: &Option<NaiveTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match time {
            Some(time) => serializer.serialize_str(&format_time_of_day(*time)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveTime>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            Some(raw) if !raw.trim().is_empty() => {
                parse_time_of_day(&raw).map(Some).map_err(de::Error::custom)
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_components_without_timezone_shift() {
        let date = parse_calendar_date("2025-03-10").expect("date");
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 10).expect("ymd"));
        assert_eq!(format_calendar_date(date), "2025-03-10");
    }

    #[test]
    fn rejects_malformed_and_impossible_dates() {
        assert!(parse_calendar_date("2025-02-30").is_err());
        assert!(parse_calendar_date("2025/03/10").is_err());
        assert!(parse_calendar_date("").is_err());
        assert_eq!(parse_optional_calendar_date("  ").expect("blank"), None);
    }

    #[test]
    fn legacy_timestamp_keeps_its_local_day() {
        // Written at local midnight in UTC-5, which is 05:00 UTC.
        assert_eq!(
            read_date("2025-03-10T00:00:00-05:00").expect("legacy"),
            NaiveDate::from_ymd_opt(2025, 3, 10).expect("ymd")
        );
    }

    #[test]
    fn parses_time_of_day() {
        let time = parse_time_of_day("09:30").expect("time");
        assert_eq!(format_time_of_day(time), "09:30");
        assert!(parse_time_of_day("9h30").is_err());
    }
}
