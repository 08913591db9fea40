//! Permissive, day-first date parsing for spreadsheet cells.
//!
//! SCADA exports write dates in whatever the vendor's locale produced. The
//! parser tries, in order:
//!
//! ```text
//! explicit offset  2024-03-04T10:00:00+02:00, 2024-03-04 10:00+01, ... UTC
//! year first       2024-03-04 10:00:00.250, 2024/03/04, 20240304
//! day first        04/03/2024 10:00, 04/03/2024 10:00 AM, 04-03-24, 04.03.2024
//! month first      12/31/2024 (only when day-first is impossible)
//! month names      4 Mar 2024 10:00, March 4, 2024 1:30 PM
//! ```
//!
//! Naive results are localized in the field's zone and returned as UTC
//! epoch milliseconds.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, TimeZone,
};
use chrono_tz::Tz;

/// Layouts with an explicit numeric offset.
///
/// `%#z` also reads hour-only offsets such as `+01`.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%d %H:%M%#z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%#z",
    "%d/%m/%Y %H:%M:%S%.f%:z",
    "%d/%m/%Y %H:%M:%S%.f%#z",
    "%d/%m/%Y %H:%M%:z",
    "%d/%m/%Y %H:%M%#z",
];

const YEAR_FIRST_DATETIME: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %I:%M:%S%.f %p",
    "%Y-%m-%d %I:%M %p",
    "%Y/%m/%d %I:%M:%S%.f %p",
    "%Y/%m/%d %I:%M %p",
    "%Y%m%d%H%M%S",
    "%Y%m%dT%H%M%S",
];

const YEAR_FIRST_DATE: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d"];

const DAY_FIRST_DATETIME: &[&str] = &[
    "%d/%m/%Y %H:%M:%S%.f",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S%.f",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M:%S%.f",
    "%d.%m.%Y %H:%M",
    "%d/%m/%y %H:%M:%S%.f",
    "%d/%m/%y %H:%M",
    "%d-%m-%y %H:%M:%S%.f",
    "%d-%m-%y %H:%M",
    "%d.%m.%y %H:%M:%S%.f",
    "%d.%m.%y %H:%M",
    "%d/%m/%Y %I:%M:%S%.f %p",
    "%d/%m/%Y %I:%M %p",
    "%d-%m-%Y %I:%M:%S%.f %p",
    "%d-%m-%Y %I:%M %p",
    "%d.%m.%Y %I:%M:%S%.f %p",
    "%d.%m.%Y %I:%M %p",
    "%d/%m/%y %I:%M:%S%.f %p",
    "%d/%m/%y %I:%M %p",
];

const DAY_FIRST_DATE: &[&str] = &[
    "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%d/%m/%y", "%d-%m-%y", "%d.%m.%y",
];

const MONTH_FIRST_DATETIME: &[&str] = &[
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m-%d-%Y %H:%M:%S%.f",
    "%m-%d-%Y %H:%M",
    "%m/%d/%y %H:%M:%S%.f",
    "%m/%d/%y %H:%M",
    "%m/%d/%Y %I:%M:%S%.f %p",
    "%m/%d/%Y %I:%M %p",
    "%m-%d-%Y %I:%M:%S%.f %p",
    "%m-%d-%Y %I:%M %p",
    "%m/%d/%y %I:%M:%S%.f %p",
    "%m/%d/%y %I:%M %p",
];

const MONTH_FIRST_DATE: &[&str] = &["%m/%d/%Y", "%m-%d-%Y", "%m/%d/%y"];

/// `%b` also accepts full month names when parsing.
const NAMED_MONTH_DATETIME: &[&str] = &[
    "%d %b %Y %H:%M:%S%.f",
    "%d %b %Y %H:%M",
    "%d-%b-%Y %H:%M:%S%.f",
    "%d-%b-%Y %H:%M",
    "%b %d %Y %H:%M:%S%.f",
    "%b %d %Y %H:%M",
    "%b %d, %Y %H:%M:%S%.f",
    "%b %d, %Y %H:%M",
    "%d %b %Y %I:%M:%S%.f %p",
    "%d %b %Y %I:%M %p",
    "%b %d, %Y %I:%M:%S%.f %p",
    "%b %d, %Y %I:%M %p",
];

const NAMED_MONTH_DATE: &[&str] = &["%d %b %Y", "%d-%b-%Y", "%b %d %Y", "%b %d, %Y"];

/// A parsed value: either pinned to an offset or a wall-clock reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedDateTime {
    Offset(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

/// Parse `text` into UTC epoch milliseconds, localizing naive values in `tz`.
///
/// Returns `None` when no layout matches or the local time cannot be placed.
pub fn parse_epoch_millis(text: &str, tz: Tz) -> Option<i64> {
    match parse_datetime(text)? {
        ParsedDateTime::Offset(dt) => Some(dt.timestamp_millis()),
        ParsedDateTime::Naive(naive) => localize(naive, tz).map(|dt| dt.timestamp_millis()),
    }
}

/// Parse `text` without attaching a zone.
pub fn parse_datetime(text: &str) -> Option<ParsedDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(dt) = parse_with_offset(text) {
        return Some(ParsedDateTime::Offset(dt));
    }

    let datetime_groups = [
        YEAR_FIRST_DATETIME,
        DAY_FIRST_DATETIME,
        MONTH_FIRST_DATETIME,
        NAMED_MONTH_DATETIME,
    ];
    let date_groups = [
        YEAR_FIRST_DATE,
        DAY_FIRST_DATE,
        MONTH_FIRST_DATE,
        NAMED_MONTH_DATE,
    ];

    // Date-only layouts are tried group by group alongside their datetime
    // counterparts so that day-first always wins over month-first.
    for (datetimes, dates) in datetime_groups.iter().zip(date_groups.iter()) {
        if let Some(naive) = first_match(text, datetimes, |t, f| {
            NaiveDateTime::parse_from_str(t, f)
                .ok()
                .filter(|dt| plausible_year(f, dt.year()))
        }) {
            return Some(ParsedDateTime::Naive(naive));
        }
        if let Some(date) = first_match(text, dates, |t, f| {
            NaiveDate::parse_from_str(t, f)
                .ok()
                .filter(|d| plausible_year(f, d.year()))
        }) {
            return date.and_hms_opt(0, 0, 0).map(ParsedDateTime::Naive);
        }
    }

    None
}

/// `%Y` happily reads "24" as the year 24; leave two-digit years to `%y`.
fn plausible_year(format: &str, year: i32) -> bool {
    !format.contains("%Y") || year >= 1000
}

fn first_match<T>(text: &str, formats: &[&str], parse: impl Fn(&str, &str) -> Option<T>) -> Option<T> {
    formats.iter().find_map(|format| parse(text, format))
}

fn parse_with_offset(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    if let Some(dt) = first_match(text, OFFSET_FORMATS, |t, f| {
        DateTime::parse_from_str(t, f).ok()
    }) {
        return Some(dt);
    }

    // "Z", "UTC" and "GMT" designators pin the value to UTC.
    let stripped = ["Z", " UTC", " GMT", "UTC", "GMT"]
        .iter()
        .find_map(|suffix| text.strip_suffix(suffix))?;
    match parse_datetime(stripped)? {
        ParsedDateTime::Naive(naive) => Some(naive.and_utc().fixed_offset()),
        ParsedDateTime::Offset(_) => None,
    }
}

/// Attach `tz` to a wall-clock reading.
///
/// Ambiguous readings (DST fall-back) resolve to the standard-time instant;
/// readings inside a DST gap use the offset in effect before the gap.
pub fn localize(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(_, standard) => Some(standard),
        LocalResult::None => {
            let before = naive.checked_sub_signed(Duration::hours(1))?;
            tz.from_local_datetime(&before)
                .earliest()
                .and_then(|dt| dt.checked_add_signed(Duration::hours(1)))
        }
    }
}
