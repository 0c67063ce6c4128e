//! Schedule normalization.
//!
//! A task may be scheduled with an explicit instant, an ISO-8601 string or an
//! epoch-millis number. Everything is normalized to the UTC timestamp string the
//! queue service expects, or rejected with [`QueueError::InvalidSchedule`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

use crate::error::{QueueError, Result};

/// Minimum lead time for numeric schedules. Closer instants are pushed forward.
pub const MIN_LEAD_MS: i64 = 5_000;

/// Schedule input for a task. Absence is expressed as `Option<Schedule>::None`.
#[derive(Debug, Clone, PartialEq)]
pub enum Schedule {
    /// An explicit instant, used as is.
    At(DateTime<Utc>),
    /// An ISO-8601 / RFC 3339 string.
    Iso(String),
    /// Milliseconds since the Unix epoch.
    EpochMillis(i64),
}

impl Schedule {
    pub fn at(instant: DateTime<Utc>) -> Self {
        Schedule::At(instant)
    }

    pub fn iso(value: impl Into<String>) -> Self {
        Schedule::Iso(value.into())
    }

    pub fn epoch_millis(millis: i64) -> Self {
        Schedule::EpochMillis(millis)
    }

    /// Read a schedule from loosely typed JSON input (CLI files, user payloads).
    ///
    /// `null` means no schedule. Anything other than a string or an integer is rejected.
    pub fn from_json(value: &Value) -> Result<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(Schedule::Iso(s.clone()))),
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
                .map(|millis| Some(Schedule::EpochMillis(millis)))
                .ok_or_else(|| QueueError::InvalidSchedule {
                    input: n.to_string(),
                }),
            other => Err(QueueError::InvalidSchedule {
                input: other.to_string(),
            }),
        }
    }

    /// Normalize against the current clock.
    pub fn normalize(&self) -> Result<String> {
        self.normalize_at(Utc::now())
    }

    /// Normalize against a given `now`.
    pub fn normalize_at(&self, now: DateTime<Utc>) -> Result<String> {
        let instant = match self {
            Schedule::At(instant) => *instant,
            Schedule::Iso(value) => parse_iso(value).ok_or_else(|| QueueError::InvalidSchedule {
                input: value.clone(),
            })?,
            Schedule::EpochMillis(millis) => {
                let floor = now.timestamp_millis().saturating_add(MIN_LEAD_MS);
                let millis = (*millis).max(floor);
                Utc.timestamp_millis_opt(millis)
                    .single()
                    .ok_or_else(|| QueueError::InvalidSchedule {
                        input: millis.to_string(),
                    })?
            }
        };
        Ok(format_instant(&instant))
    }
}

impl From<DateTime<Utc>> for Schedule {
    fn from(instant: DateTime<Utc>) -> Self {
        Schedule::At(instant)
    }
}

/// Normalize an optional schedule. `None` stays `None`.
pub fn normalize(schedule: Option<&Schedule>) -> Result<Option<String>> {
    schedule.map(Schedule::normalize).transpose()
}

/// Millisecond-precision UTC form, e.g. `2100-01-31T13:00:00.000Z`.
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_iso(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(instant.with_timezone(&Utc));
    }
    // Offset-less forms are read as UTC.
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
