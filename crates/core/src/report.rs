use crate::domain::weather::AggregateMap;
use chrono::{DateTime, TimeZone};
use std::fmt::{self, Write};

pub const HOT_DAY_MARKER: &str = "hellepäivä";

/// Writes one fixed-width line per date in ascending order, then the hot-day total.
pub fn write_report<W: Write>(out: &mut W, dates: &AggregateMap) -> fmt::Result {
    let mut keys: Vec<&String> = dates.keys().collect();
    keys.sort();

    let mut hot_days: u64 = 0;
    for key in keys {
        let day = &dates[key];
        let marker = if day.is_hot() {
            hot_days += 1;
            HOT_DAY_MARKER
        } else {
            ""
        };
        writeln!(
            out,
            "{:<16} min={:<7.2} avg={:<7.2} max={:<7.2} {:>16}",
            key, day.min, day.avg, day.max, marker
        )?;
    }

    write!(out, "\nTotal number of hellepäivät: {hot_days}\n")
}

pub fn render(dates: &AggregateMap) -> String {
    let mut out = String::with_capacity(dates.len() * 80 + 40);
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, dates);
    out
}

/// Full response body: generation time and year header followed by the report.
pub fn render_page<Tz>(generated_at: &DateTime<Tz>, year: &str, dates: &AggregateMap) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    format!(
        "Data at {} year {year}:\n\n{}",
        generated_at.format("%H:%M:%S"),
        render(dates)
    )
}

pub fn hot_day_count(dates: &AggregateMap) -> usize {
    dates.values().filter(|d| d.is_hot()).count()
}
