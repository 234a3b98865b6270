use std::{collections::BTreeSet, str::FromStr};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::error::SchedulerError;

/// Position of the day-of-week field once the seconds field is present.
const DOW_FIELD: usize = 5;

/// Parsed cron expression.
///
/// Expressions carry a leading seconds field (`sec min hour dom month dow [year]`);
/// a classic five-field expression fires at second zero. Numeric days of the week
/// follow crontab: `0` and `7` are Sunday, `1-5` is Monday to Friday.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expr: String,
    schedule: Schedule,
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self, SchedulerError> {
        let trimmed = expr.trim();
        let invalid = |reason: String| SchedulerError::InvalidCron {
            expr: expr.to_string(),
            reason,
        };

        let normalized = match trimmed.split_whitespace().count() {
            0 => return Err(invalid("empty expression".into())),
            5 => format!("0 {trimmed}"),
            _ => trimmed.to_string(),
        };

        let native = native_weekdays(&normalized).map_err(invalid)?;
        let schedule = Schedule::from_str(&native).map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            expr: normalized,
            schedule,
        })
    }

    /// Normalized expression (always with a seconds field).
    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// First fire time strictly after `after`, evaluated in `tz`.
    pub fn next_after(&self, after: &DateTime<Utc>, tz: &Tz) -> Option<DateTime<Tz>> {
        self.schedule.after(&after.with_timezone(tz)).next()
    }
}

/// Rewrite the day-of-week field into the `cron` crate's numbering (1-7, Sunday first).
fn native_weekdays(expr: &str) -> Result<String, String> {
    let mut fields: Vec<String> = expr.split_whitespace().map(str::to_string).collect();
    let Some(dow) = fields.get_mut(DOW_FIELD) else {
        return Ok(expr.to_string());
    };

    let items = dow
        .split(',')
        .map(weekday_item)
        .collect::<Result<Vec<_>, _>>()?;
    *dow = items.join(",");
    Ok(fields.join(" "))
}

/// One list item of the day-of-week field. Names and wildcards pass through.
fn weekday_item(item: &str) -> Result<String, String> {
    let numeric = item.chars().all(|c| c.is_ascii_digit() || "*?-/".contains(c));
    if !numeric || item == "*" || item == "?" {
        return Ok(item.to_string());
    }

    let (base, step) = match item.split_once('/') {
        Some((base, step)) => (base, Some(weekday_number(step)?)),
        None => (item, None),
    };
    if step == Some(0) {
        return Err(format!("zero step in day of week '{item}'"));
    }

    let (first, last) = match base.split_once('-') {
        _ if base == "*" || base == "?" => (0, 6),
        Some((a, b)) => (weekday_number(a)?, weekday_number(b)?),
        None if step.is_some() => (weekday_number(base)?, 6),
        None => {
            let day = weekday_number(base)?;
            (day, day)
        }
    };
    if first > last || last > 7 {
        return Err(format!("day of week out of range in '{item}'"));
    }

    let days: BTreeSet<u32> = (first..=last)
        .step_by(step.unwrap_or(1) as usize)
        .map(|day| day % 7 + 1)
        .collect();
    Ok(days
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(","))
}

fn weekday_number(token: &str) -> Result<u32, String> {
    token
        .parse()
        .map_err(|_| format!("invalid day of week '{token}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn five_fields_fire_at_second_zero() {
        let cron = CronSchedule::parse("*/5 * * * *").unwrap();
        assert_eq!(cron.expr(), "0 */5 * * * *");

        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 1, 30).unwrap();
        let next = cron.next_after(&now, &Tz::UTC).unwrap();
        assert_eq!(next, Tz::UTC.with_ymd_and_hms(2024, 3, 1, 12, 5, 0).unwrap());
    }

    #[test]
    fn six_fields_are_kept() {
        let cron = CronSchedule::parse(" * * * * * * ").unwrap();
        assert_eq!(cron.expr(), "* * * * * *");

        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let next = cron.next_after(&now, &Tz::UTC).unwrap();
        assert_eq!(next.with_timezone(&Utc), now + chrono::Duration::seconds(1));
    }

    #[test]
    fn invalid_expressions_are_rejected() {
        for expr in ["", "   ", "not a cron", "a b c d e f"] {
            let err = CronSchedule::parse(expr).unwrap_err();
            assert!(matches!(err, SchedulerError::InvalidCron { .. }), "{expr}");
        }
    }

    #[test]
    fn evaluated_in_the_configured_zone() {
        let cron = CronSchedule::parse("0 0 9 * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();

        let utc = cron.next_after(&now, &Tz::UTC).unwrap();
        assert_eq!(utc.with_timezone(&Utc), Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap());

        let ny: Tz = "America/New_York".parse().unwrap();
        let local = cron.next_after(&now, &ny).unwrap();
        assert_eq!(local.with_timezone(&Utc), Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap());
    }

    fn weekday(day: u32) -> DateTime<Tz> {
        // 2024-03-03 is a Sunday.
        Tz::UTC.with_ymd_and_hms(2024, 3, 3 + day, 9, 0, 0).unwrap()
    }

    fn next_days(expr: &str, count: usize) -> Vec<DateTime<Tz>> {
        let cron = CronSchedule::parse(expr).unwrap();
        let mut at = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap(); // Saturday
        let mut out = Vec::new();
        for _ in 0..count {
            let next = cron.next_after(&at, &Tz::UTC).unwrap();
            at = next.with_timezone(&Utc);
            out.push(next);
        }
        out
    }

    #[test]
    fn weekday_ranges_use_crontab_numbering() {
        assert_eq!(
            next_days("0 9 * * 1-5", 5),
            [weekday(1), weekday(2), weekday(3), weekday(4), weekday(5)]
        );
        assert_eq!(next_days("0 9 * * 1-5", 6)[5], weekday(8));
    }

    #[test]
    fn zero_and_seven_are_sunday() {
        assert_eq!(next_days("0 9 * * 0", 1), [weekday(0)]);
        assert_eq!(next_days("0 0 9 * * 7", 1), [weekday(0)]);
        assert_eq!(next_days("0 9 * * 5-7", 3), [weekday(0), weekday(5), weekday(6)]);
    }

    #[test]
    fn weekday_lists_steps_and_names() {
        assert_eq!(next_days("0 9 * * 1,3", 2), [weekday(1), weekday(3)]);
        assert_eq!(next_days("0 9 * * */2", 2), [weekday(0), weekday(2)]);
        assert_eq!(next_days("0 9 * * MON-FRI", 1), [weekday(1)]);
        // The user's spelling is kept for display.
        assert_eq!(CronSchedule::parse("0 9 * * 1-5").unwrap().expr(), "0 0 9 * * 1-5");
    }

    #[test]
    fn weekday_out_of_range_is_rejected() {
        for expr in ["0 9 * * 8", "0 9 * * 5-2", "0 9 * * 1/0"] {
            assert!(
                matches!(CronSchedule::parse(expr), Err(SchedulerError::InvalidCron { .. })),
                "{expr}"
            );
        }
    }
}
