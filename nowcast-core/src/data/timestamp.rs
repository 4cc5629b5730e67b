//! Period label parsing for the raw `year_quarter` column.
//!
//! Vintage files are not consistent about how they spell a quarter, so the
//! parser accepts ISO dates as well as the common quarter spellings. Quarter
//! and month labels resolve to the first day of the period.

use chrono::NaiveDate;

/// Parse a period label into the date it starts on.
///
/// Accepted forms: `2019-04-01`, `2019-04`, `2019Q2`, `2019-Q2`, `2019 Q2`
/// (the `Q` may be lower case).
pub fn parse_period(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Some(date) = parse_quarter(s) {
        return Some(date);
    }
    parse_year_month(s)
}

fn parse_quarter(s: &str) -> Option<NaiveDate> {
    let upper = s.to_ascii_uppercase();
    let (year, quarter) = upper.split_once('Q')?;
    let year = year.trim_end_matches(|c: char| c == '-' || c == ' ');
    if year.len() != 4 {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let quarter: u32 = quarter.trim().parse().ok()?;
    if !(1..=4).contains(&quarter) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1)
}

fn parse_year_month(s: &str) -> Option<NaiveDate> {
    let (year, month) = s.split_once('-')?;
    if year.len() != 4 {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}
