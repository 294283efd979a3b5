//! Cron utility functions for folder trigger expressions
//!
//! Folder configurations carry standard 5-field cron expressions
//! (minute, hour, day-of-month, month, day-of-week with Sunday = 0 or 7).
//! The `cron` crate wants a leading seconds field and numbers days of the
//! week 1-7 with Sunday = 1, so expressions are normalized before parsing.
//! 6- and 7-field expressions are assumed to already be in the crate's syntax.

use chrono::{DateTime, Local};
use cron::Schedule;
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::errors::{AppError, AppResult};

/// Rewrite a cron expression into the syntax the `cron` crate parses
pub fn normalize_cron_expression(expression: &str) -> AppResult<String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.len() {
        5 => {
            let day_of_week = normalize_day_of_week(fields[4])?;
            Ok(format!(
                "0 {} {} {} {} {}",
                fields[0], fields[1], fields[2], fields[3], day_of_week
            ))
        }
        6 | 7 => Ok(fields.join(" ")),
        n => Err(AppError::validation(format!(
            "Invalid cron expression '{expression}': expected 5 fields, found {n}"
        ))),
    }
}

/// Parse a folder trigger expression
pub fn parse_schedule(expression: &str) -> AppResult<Schedule> {
    let normalized = normalize_cron_expression(expression)?;
    Schedule::from_str(&normalized).map_err(|e| {
        AppError::validation(format!("Invalid cron expression '{expression}': {e}"))
    })
}

/// Next firing strictly after `after`, in the local timezone
pub fn next_fire_time(schedule: &Schedule, after: &DateTime<Local>) -> Option<DateTime<Local>> {
    schedule.after(after).next()
}

/// Calculate the next scheduled time from a trigger expression
///
/// Returns `None` if the expression is invalid or never fires again.
pub fn calculate_next_scheduled_time(expression: &str) -> Option<DateTime<Local>> {
    parse_schedule(expression)
        .ok()
        .and_then(|schedule| schedule.upcoming(Local).next())
}

/// Map standard day-of-week numbering (0-7, Sunday = 0 and 7) to 1-7, Sunday = 1
///
/// Numeric tokens are expanded to explicit day lists so ranges that wrap
/// past Saturday stay correct. Named days pass through untouched.
fn normalize_day_of_week(field: &str) -> AppResult<String> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let mut tokens = Vec::new();
    let mut days = BTreeSet::new();

    for token in field.split(',') {
        if token.chars().any(|c| c.is_ascii_alphabetic()) {
            tokens.push(token.to_string());
            continue;
        }
        days.extend(expand_day_token(token)?);
    }

    tokens.extend(days.into_iter().map(|day| (day + 1).to_string()));
    Ok(tokens.join(","))
}

/// Expand one numeric token (`n`, `a-b`, `*/s`, `a-b/s`, `a/s`) to days 0-6
fn expand_day_token(token: &str) -> AppResult<Vec<u32>> {
    let invalid = || AppError::validation(format!("Invalid day-of-week value '{token}'"));

    let (range, step) = match token.split_once('/') {
        Some((range, step)) => {
            let step: u32 = step.parse().map_err(|_| invalid())?;
            if step == 0 {
                return Err(invalid());
            }
            (range, step)
        }
        None => (token, 1),
    };

    let (start, end) = if range == "*" {
        (0, 6)
    } else if let Some((a, b)) = range.split_once('-') {
        (
            a.parse::<u32>().map_err(|_| invalid())?,
            b.parse::<u32>().map_err(|_| invalid())?,
        )
    } else {
        let value = range.parse::<u32>().map_err(|_| invalid())?;
        // `a/s` means "from a to the end of the week"
        if token.contains('/') { (value, 7) } else { (value, value) }
    };

    if start > 7 || end > 7 || start > end {
        return Err(invalid());
    }

    Ok((start..=end)
        .step_by(step as usize)
        .map(|day| day % 7)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike, Weekday};
    use rstest::rstest;

    #[rstest]
    #[case("* * * * *", "0 * * * * *")]
    #[case("*/5 * * * *", "0 */5 * * * *")]
    #[case("30 9 * * 1-5", "0 30 9 * * 2,3,4,5,6")]
    #[case("0 0 * * 0", "0 0 0 * * 1")]
    #[case("0 0 * * 7", "0 0 0 * * 1")]
    #[case("0 0 * * 5-7", "0 0 0 * * 1,6,7")]
    #[case("0 0 * * MON-FRI", "0 0 0 * * MON-FRI")]
    #[case("0 0 0 * * *", "0 0 0 * * *")]
    fn test_normalize_cron_expression(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_cron_expression(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("* * *")]
    #[case("0 0 * * 8")]
    #[case("0 0 * * 5-2")]
    fn test_rejects_invalid_expressions(#[case] input: &str) {
        assert!(parse_schedule(input).is_err());
    }

    #[test]
    fn test_every_minute_fires_on_the_next_minute() {
        let schedule = parse_schedule("* * * * *").unwrap();
        let now = Local.with_ymd_and_hms(2025, 6, 2, 10, 15, 30).unwrap();
        let next = next_fire_time(&schedule, &now).unwrap();
        assert_eq!((next.hour(), next.minute(), next.second()), (10, 16, 0));
    }

    #[test]
    fn test_weekday_numbering_matches_standard_cron() {
        // 2025-06-07 is a Saturday; "1" is Monday in standard cron
        let schedule = parse_schedule("0 8 * * 1").unwrap();
        let saturday = Local.with_ymd_and_hms(2025, 6, 7, 12, 0, 0).unwrap();
        let next = next_fire_time(&schedule, &saturday).unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);
        assert_eq!(next.hour(), 8);
    }

    #[test]
    fn test_calculate_next_scheduled_time() {
        assert!(calculate_next_scheduled_time("0 */6 * * *").is_some());
        assert!(calculate_next_scheduled_time("invalid").is_none());
    }
}
