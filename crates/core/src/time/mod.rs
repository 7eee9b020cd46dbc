use chrono::{DateTime, FixedOffset, TimeZone};

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Parses an observation timestamp (RFC 3339, e.g. `2019-06-01T12:00:00+03:00` or `...Z`).
pub fn parse_instant(s: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s)
}

/// Calendar date of `instant` as seen in `tz`, formatted `YYYY-MM-DD`.
pub fn local_date_key<Tz: TimeZone>(instant: &DateTime<FixedOffset>, tz: &Tz) -> String {
    instant
        .with_timezone(tz)
        .date_naive()
        .format(DATE_KEY_FORMAT)
        .to_string()
}

/// First and last day of `year` as query parameters for the feature service.
pub fn year_bounds(year: &str) -> (String, String) {
    (format!("{year}-01-01"), format!("{year}-12-31"))
}
