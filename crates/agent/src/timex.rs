//! TIMEX date expressions: parsing typed dates and rendering natural language.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// A definite calendar date (`2019-03-22`), as opposed to `XXXX-03-22`.
pub fn is_definite(timex: &str) -> bool {
    NaiveDate::parse_from_str(timex, "%Y-%m-%d").is_ok()
}

/// Converts a typed travel date into a TIMEX value.
pub fn parse_user_date(text: &str, today: NaiveDate) -> Option<String> {
    let text = text.trim().to_lowercase();
    let date = match text.as_str() {
        "today" | "hoy" => Some(today),
        "tomorrow" | "mañana" => today.succ_opt(),
        _ => NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(&text, "%d/%m/%Y"))
            .ok(),
    }?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// Renders a TIMEX date or date range relative to `today`, falling back to the raw value.
pub fn to_natural_language(timex: &str, today: NaiveDate) -> String {
    if let Some(inner) = timex.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
        let mut parts = inner.split(',');
        if let (Some(start), Some(end)) = (parts.next(), parts.next()) {
            if let (Some(start), Some(end)) =
                (describe_date(start, today), describe_date(end, today))
            {
                return format!("{start} to {end}");
            }
        }
        return timex.to_string();
    }

    describe_date(timex, today).unwrap_or_else(|| timex.to_string())
}

fn describe_date(timex: &str, today: NaiveDate) -> Option<String> {
    if let Ok(date) = NaiveDate::parse_from_str(timex, "%Y-%m-%d") {
        return Some(relative(date, today).unwrap_or_else(|| absolute(date, true)));
    }

    // Year-less dates such as `XXXX-03-22`.
    let rest = timex.strip_prefix("XXXX-")?;
    let (month, day) = rest.split_once('-')?;
    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    let date = NaiveDate::from_ymd_opt(2000, month, day)?;
    Some(absolute(date, false))
}

fn relative(date: NaiveDate, today: NaiveDate) -> Option<String> {
    let days = date.signed_duration_since(today).num_days();
    match days {
        0 => return Some("today".to_string()),
        1 => return Some("tomorrow".to_string()),
        -1 => return Some("yesterday".to_string()),
        _ => {}
    }

    let week = date.iso_week();
    let weekday = weekday_name(date.weekday());
    if week == today.iso_week() {
        Some(format!("this {weekday}"))
    } else if week == (today + Duration::days(7)).iso_week() {
        Some(format!("next {weekday}"))
    } else if week == (today - Duration::days(7)).iso_week() {
        Some(format!("last {weekday}"))
    } else {
        None
    }
}

fn absolute(date: NaiveDate, with_year: bool) -> String {
    let day = date.day();
    let month = MONTHS[date.month0() as usize];
    if with_year {
        format!("{day}{} {month} {}", ordinal_suffix(day), date.year())
    } else {
        format!("{day}{} {month}", ordinal_suffix(day))
    }
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
