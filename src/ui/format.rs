use chrono::{DateTime, TimeZone, Utc};
use std::fmt::Display;
use std::fmt::Write;

use crate::models::night::SleepNight;

const ONE_MINUTE_MILLIS: i64 = 60 * 1000;
const ONE_HOUR_MILLIS: i64 = 60 * ONE_MINUTE_MILLIS;

pub fn convert_numeric_quality_to_string(quality: i32) -> &'static str {
    match quality {
        0 => "Very bad",
        1 => "Poor",
        2 => "So-so",
        3 => "OK",
        4 => "Pretty good",
        5 => "Excellent",
        _ => "--",
    }
}

fn to_date_time<Tz: TimeZone>(millis: i64, tz: &Tz) -> Option<DateTime<Tz>> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|utc| utc.with_timezone(tz))
}

/// e.g. `Tuesday Mar-05-2024 Time: 22:41`
pub fn convert_long_to_date_string<Tz>(millis: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match to_date_time(millis, tz) {
        Some(time) => time.format("%A %b-%d-%Y Time: %H:%M").to_string(),
        None => "--".to_string(),
    }
}

/// Night length in the coarsest unit that is non-zero, plus the weekday the
/// night started on: `7 hours on Tuesday`.
pub fn convert_duration_to_formatted<Tz>(start_time_milli: i64, end_time_milli: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let duration_milli = end_time_milli - start_time_milli;
    let weekday = to_date_time(start_time_milli, tz)
        .map(|time| time.format("%A").to_string())
        .unwrap_or_default();

    if duration_milli < ONE_MINUTE_MILLIS {
        format!("{} seconds on {}", duration_milli / 1000, weekday)
    } else if duration_milli < ONE_HOUR_MILLIS {
        format!("{} minutes on {}", duration_milli / ONE_MINUTE_MILLIS, weekday)
    } else {
        format!("{} hours on {}", duration_milli / ONE_HOUR_MILLIS, weekday)
    }
}

/// `h:mm:ss`
pub fn format_hours_minutes_seconds(duration_milli: i64) -> String {
    let total_seconds = duration_milli.max(0) / 1000;
    format!(
        "{}:{:02}:{:02}",
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60
    )
}

/// Plain-text summary of every night, in the order given. Open nights only
/// show their start.
pub fn format_nights<Tz>(nights: &[SleepNight], tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::from("Here is your sleep data\n");
    for night in nights {
        // Writing into a String cannot fail.
        let _ = writeln!(out);
        let _ = writeln!(out, "Start:\t{}", convert_long_to_date_string(night.start_time_milli, tz));
        if !night.is_open() {
            let _ = writeln!(out, "End:\t{}", convert_long_to_date_string(night.end_time_milli, tz));
            let _ = writeln!(
                out,
                "Quality:\t{}",
                convert_numeric_quality_to_string(night.sleep_quality_rating)
            );
            let _ = writeln!(
                out,
                "Hours:Minutes:Seconds:\t{}",
                format_hours_minutes_seconds(night.duration_millis())
            );
        }
    }
    out
}
