
use chrono::{DateTime, Datelike, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

/// Timezone used for calendar boundaries and labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UserTimezone {
    Utc,
    #[default]
    Local,
}

/// Calendar fields of a bar timestamp, compared column by column by the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CalendarFields {
    pub year: i32,
    /// 1-based
    pub month: u32,
    pub day: u32,
    pub hour: u32,
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub fn month_name(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|i| MONTHS.get(i as usize))
        .copied()
        .unwrap_or("")
}

impl UserTimezone {
    /// Splits a unix timestamp (seconds) into calendar fields in this timezone.
    pub fn calendar(&self, timestamp: i64) -> Option<CalendarFields> {
        let datetime = DateTime::from_timestamp(timestamp, 0)?;

        Some(match self {
            UserTimezone::Utc => Self::fields(&datetime),
            UserTimezone::Local => Self::fields(&datetime.with_timezone(&chrono::Local)),
        })
    }

    fn fields<Tz: TimeZone>(datetime: &DateTime<Tz>) -> CalendarFields {
        CalendarFields {
            year: datetime.year(),
            month: datetime.month(),
            day: datetime.day(),
            hour: datetime.hour(),
        }
    }

    /// Tooltip header, e.g. `Jan 15, 2024, 02:00 PM`.
    pub fn format_tooltip_timestamp(&self, timestamp: i64) -> String {
        const FORMAT: &str = "%b %-d, %Y, %I:%M %p";

        match DateTime::from_timestamp(timestamp, 0) {
            Some(datetime) => match self {
                UserTimezone::Utc => datetime.format(FORMAT).to_string(),
                UserTimezone::Local => datetime
                    .with_timezone(&chrono::Local)
                    .format(FORMAT)
                    .to_string(),
            },
            None => timestamp.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for UserTimezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let timezone_str = String::deserialize(deserializer)?;
        match timezone_str.to_lowercase().as_str() {
            "utc" => Ok(UserTimezone::Utc),
            "local" => Ok(UserTimezone::Local),
            _ => Err(serde::de::Error::custom("Invalid UserTimezone")),
        }
    }
}

impl Serialize for UserTimezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            UserTimezone::Utc => serializer.serialize_str("UTC"),
            UserTimezone::Local => serializer.serialize_str("Local"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utc_calendar_fields() {
        // 2024-01-15T14:00:00Z
        let fields = UserTimezone::Utc.calendar(1_705_327_200).unwrap();

        assert_eq!(
            fields,
            CalendarFields {
                year: 2024,
                month: 1,
                day: 15,
                hour: 14,
            }
        );
    }

    #[test]
    fn tooltip_timestamp_reads_like_a_date() {
        insta::assert_snapshot!(
            UserTimezone::Utc.format_tooltip_timestamp(1_705_327_200),
            @"Jan 15, 2024, 02:00 PM"
        );
    }

    #[test]
    fn month_names_are_one_based() {
        assert_eq!(month_name(1), "Jan");
        assert_eq!(month_name(12), "Dec");
        assert_eq!(month_name(0), "");
        assert_eq!(month_name(13), "");
    }

    #[test]
    fn serde_accepts_either_case() {
        let tz: UserTimezone = serde_json::from_str(r#""utc""#).unwrap();
        assert_eq!(tz, UserTimezone::Utc);
        assert_eq!(serde_json::to_string(&UserTimezone::Local).unwrap(), r#""Local""#);
    }
}
