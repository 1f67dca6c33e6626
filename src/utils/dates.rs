//! Due-date normalisation.
//!
//! Turns what a user (or the model) wrote as a due date into a calendar date.
//! The result is tri-state so that the explicit "skip" keyword can never be
//! confused with text that simply failed to parse.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

/// Keyword meaning "no due date".
pub const SKIP_KEYWORD: &str = "skip";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueDate {
    /// The user explicitly asked for no due date.
    Skipped,
    Parsed(NaiveDate),
    /// Not a date we understand; the caller should re-prompt.
    Invalid,
}

impl DueDate {
    /// `Some(due_on)` when the due date is settled, `None` when it is not.
    #[must_use]
    pub fn settled(self) -> Option<Option<NaiveDate>> {
        match self {
            DueDate::Skipped => Some(None),
            DueDate::Parsed(d) => Some(Some(d)),
            DueDate::Invalid => None,
        }
    }
}

/// Strict formats, tried in order. `%d`/`%m` also accept single digits.
const STRICT_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];

static IN_N_DAYS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)in\s+(\d+)\s+day").expect("static regex compile"));

static STRICT_SHAPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-\d{1,2}-\d{1,2}|\d{1,2}[-/]\d{1,2}[-/]\d{4})$")
        .expect("static regex compile")
});

static MONTH_DAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([a-z]+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?(?:,?\s+(\d{4}))?$")
        .expect("static regex compile")
});

static DAY_MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d{1,2})(?:st|nd|rd|th)?\s+(?:of\s+)?([a-z]+)\.?(?:,?\s+(\d{4}))?$")
        .expect("static regex compile")
});

/// Parses a due-date expression relative to `today`.
#[must_use]
pub fn parse_due(text: &str, today: NaiveDate) -> DueDate {
    let cleaned = text.trim().trim_end_matches(&['.', '!'][..]).trim();
    let lowered = cleaned.to_lowercase();

    if lowered.is_empty() {
        return DueDate::Invalid;
    }
    if lowered == SKIP_KEYWORD {
        return DueDate::Skipped;
    }
    if lowered == "today" {
        return DueDate::Parsed(today);
    }
    if lowered == "tomorrow" {
        return DueDate::Parsed(today + Duration::days(1));
    }
    if let Some(caps) = IN_N_DAYS_RE.captures(&lowered) {
        return caps
            .get(1)
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .and_then(|n| today.checked_add_signed(Duration::try_days(n)?))
            .map_or(DueDate::Invalid, DueDate::Parsed);
    }

    for format in STRICT_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&lowered, format) {
            return DueDate::Parsed(date);
        }
    }

    // Numeric dates that failed every strict format are impossible dates
    // (e.g. month 13); never hand them to the lenient parser.
    if STRICT_SHAPE_RE.is_match(&lowered) {
        return DueDate::Invalid;
    }

    parse_natural(&lowered, today).map_or(DueDate::Invalid, DueDate::Parsed)
}

fn parse_natural(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    match text {
        "next week" => return Some(today + Duration::days(7)),
        "end of week" | "end of the week" | "eow" => {
            return Some(upcoming(today, Weekday::Fri, true));
        }
        "end of month" | "end of the month" | "eom" => return last_day_of_month(today),
        _ => {}
    }

    if let Some(rest) = text.strip_prefix("next ")
        && let Some(weekday) = parse_weekday(rest)
    {
        return Some(in_following_week(today, weekday));
    }
    let bare = text
        .strip_prefix("this ")
        .or_else(|| text.strip_prefix("on "))
        .unwrap_or(text);
    if let Some(weekday) = parse_weekday(bare) {
        return Some(upcoming(today, weekday, false));
    }

    if let Some(caps) = MONTH_DAY_RE.captures(text) {
        let month = parse_month(caps.get(1)?.as_str())?;
        let day = caps.get(2)?.as_str().parse::<u32>().ok()?;
        let year = caps.get(3).and_then(|m| m.as_str().parse::<i32>().ok());
        return month_day(today, month, day, year);
    }
    if let Some(caps) = DAY_MONTH_RE.captures(text) {
        let day = caps.get(1)?.as_str().parse::<u32>().ok()?;
        let month = parse_month(caps.get(2)?.as_str())?;
        let year = caps.get(3).and_then(|m| m.as_str().parse::<i32>().ok());
        return month_day(today, month, day, year);
    }

    None
}

/// The closest `weekday` after today (or today itself when `include_today`).
fn upcoming(today: NaiveDate, weekday: Weekday, include_today: bool) -> NaiveDate {
    let current = today.weekday().num_days_from_monday();
    let target = weekday.num_days_from_monday();
    let mut ahead = (7 + target - current) % 7;
    if ahead == 0 && !include_today {
        ahead = 7;
    }
    today + Duration::days(i64::from(ahead))
}

/// `weekday` in the calendar week (Monday based) after the current one.
fn in_following_week(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let to_next_monday = 7 - today.weekday().num_days_from_monday();
    today + Duration::days(i64::from(to_next_monday + weekday.num_days_from_monday()))
}

fn last_day_of_month(today: NaiveDate) -> Option<NaiveDate> {
    let (y, m) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1).and_then(|d| d.pred_opt())
}

fn month_day(today: NaiveDate, month: u32, day: u32, year: Option<i32>) -> Option<NaiveDate> {
    match year {
        Some(y) => NaiveDate::from_ymd_opt(y, month, day),
        None => {
            let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
            if this_year < today {
                NaiveDate::from_ymd_opt(today.year() + 1, month, day)
            } else {
                Some(this_year)
            }
        }
    }
}

fn parse_weekday(raw: &str) -> Option<Weekday> {
    match raw.trim() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" | "thur" | "thurs" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn parse_month(raw: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];
    let lowered = raw.to_lowercase();
    if lowered.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(&lowered))
        .and_then(|i| u32::try_from(i + 1).ok())
}
