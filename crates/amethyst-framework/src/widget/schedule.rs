//! Cron schedule widgets.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use amethyst_core::{BoxFuture, HandlerResult};
use chrono::{DateTime, TimeZone};
use cron::Schedule;

use super::{HandlerOutput, erase};
use crate::error::{WidgetError, WidgetResult};
use crate::plugin::{Plugin, PluginId};
use crate::scheduler::ScheduledTask;

type ScheduleFn<P> = Arc<dyn Fn(Arc<P>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

// ============================================================================
// CronExpr
// ============================================================================

/// A validated cron expression.
///
/// Accepts standard 5-field expressions (`minute hour day month weekday`,
/// weekdays `0-7` with `0` and `7` both Sunday) as well as 6 or 7 field
/// expressions with a leading seconds field and an optional trailing year.
/// Expressions with seconds use weekdays `1-7` starting on Sunday.
#[derive(Clone)]
pub struct CronExpr {
    source: String,
    schedule: Schedule,
}

impl CronExpr {
    /// Parses and validates `expression`.
    pub fn parse(expression: &str) -> WidgetResult<Self> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        let normalised = match fields.as_slice() {
            [minute, hour, day, month, weekday] => {
                let weekday = standard_weekdays(weekday).ok_or_else(|| WidgetError::InvalidCron {
                    expression: expression.to_string(),
                    reason: format!("invalid weekday field '{weekday}'"),
                })?;
                format!("0 {minute} {hour} {day} {month} {weekday}")
            }
            _ => fields.join(" "),
        };

        let schedule = Schedule::from_str(&normalised).map_err(|err| WidgetError::InvalidCron {
            expression: expression.to_string(),
            reason: err.to_string(),
        })?;

        Ok(Self {
            source: expression.to_string(),
            schedule,
        })
    }

    /// The expression as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// First occurrence strictly after `after`.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.schedule.after(after).next()
    }
}

impl FromStr for CronExpr {
    type Err = WidgetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CronExpr").field(&self.source).finish()
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Rewrites a standard weekday field (`0-7`, Sunday = 0 or 7) into the
/// `1-7` numbering used by expressions with seconds. Names are kept.
fn standard_weekdays(field: &str) -> Option<String> {
    let shift = |value: &str| -> Option<String> {
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Some(value.to_string());
        }
        match value.parse::<u8>().ok()? {
            day @ 0..=6 => Some((day + 1).to_string()),
            7 => Some("1".to_string()),
            _ => None,
        }
    };

    let mut parts = Vec::new();
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => (range, Some(step)),
            None => (part, None),
        };
        if let Some((start, "7")) = range.split_once('-') {
            parts.push(through_sunday(start, step)?);
            continue;
        }
        let range = match range.split_once('-') {
            Some((start, end)) => format!("{}-{}", shift(start)?, shift(end)?),
            None => shift(range)?,
        };
        parts.push(match step {
            Some(step) => format!("{range}/{step}"),
            None => range,
        });
    }
    Some(parts.join(","))
}

/// Expands a standard range ending on Sunday (`start-7[/step]`) into the
/// days it selects, since Sunday wraps to the start of the week.
fn through_sunday(start: &str, step: Option<&str>) -> Option<String> {
    let start = start.parse::<u8>().ok().filter(|start| *start <= 7)?;
    let step = match step {
        Some(step) => step.parse::<usize>().ok().filter(|step| *step > 0)?,
        None => 1,
    };
    let mut days: Vec<u8> = (start..=7)
        .step_by(step)
        .map(|day| day % 7 + 1)
        .collect();
    days.sort_unstable();
    days.dedup();
    Some(
        days.iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(","),
    )
}

// ============================================================================
// ScheduleWidget
// ============================================================================

/// A callback run on a cron schedule, declared by plugin `P`.
///
/// ```rust,ignore
/// widgets.schedule(
///     ScheduleWidget::new("*/5 * * * *", |this: Arc<Self>| async move {
///         this.refresh_cache().await
///     })?
///     .name("refresh_cache"),
/// )?;
/// ```
pub struct ScheduleWidget<P> {
    cron: CronExpr,
    label: String,
    callback: ScheduleFn<P>,
}

impl<P: Plugin> ScheduleWidget<P> {
    /// Declares a schedule. Fails if `cron` is not a valid expression.
    pub fn new<F, Fut, O>(cron: &str, callback: F) -> WidgetResult<Self>
    where
        F: Fn(Arc<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: HandlerOutput,
    {
        Ok(Self {
            cron: CronExpr::parse(cron)?,
            label: std::any::type_name::<F>().to_string(),
            callback: Arc::new(move |this| erase(callback(this))),
        })
    }

    /// Sets the label used in logs.
    pub fn name(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub(crate) fn bind(self, this: Arc<P>, owner: PluginId) -> ScheduledTask {
        let callback = self.callback;
        ScheduledTask::new(
            self.cron,
            self.label,
            Some(owner),
            Arc::new(move || callback(Arc::clone(&this))),
        )
    }
}

impl<P> ScheduleWidget<P> {
    /// The cron expression.
    pub fn cron(&self) -> &CronExpr {
        &self.cron
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Local, Timelike, Utc, Weekday};

    #[test]
    fn test_five_fields_get_seconds() {
        let cron = CronExpr::parse("*/5 * * * *").unwrap();
        assert_eq!(cron.as_str(), "*/5 * * * *");

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 2, 30).unwrap();
        let next = cron.next_after(&now).unwrap();
        assert_eq!((next.hour(), next.minute(), next.second()), (12, 5, 0));
    }

    #[test]
    fn test_six_fields_keep_seconds() {
        let cron = CronExpr::parse("*/10 * * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(cron.next_after(&now).unwrap().second(), 10);
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(matches!(
            CronExpr::parse("not a cron"),
            Err(WidgetError::InvalidCron { .. })
        ));
        assert!(CronExpr::parse("61 * * * *").is_err());
        assert!(CronExpr::parse("* * * * 9").is_err());
        assert!(CronExpr::parse("").is_err());
    }

    #[test]
    fn test_standard_sunday() {
        // 2024-01-01 is a Monday.
        let monday = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for expression in ["0 9 * * 0", "0 9 * * 7", "0 9 * * SUN"] {
            let next = CronExpr::parse(expression).unwrap().next_after(&monday).unwrap();
            assert_eq!(next.weekday(), Weekday::Sun, "{expression}");
        }

        let weekdays = CronExpr::parse("0 9 * * 1-5").unwrap();
        assert_eq!(weekdays.next_after(&monday).unwrap().weekday(), Weekday::Mon);

        // Thursday and Saturday only; Sunday is not selected by the step.
        let saturday = Utc.with_ymd_and_hms(2024, 1, 6, 10, 0, 0).unwrap();
        let stepped = CronExpr::parse("0 9 * * 4-7/2").unwrap();
        let next = stepped.next_after(&saturday).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 11, 9, 0, 0).unwrap());
        assert_eq!(next.weekday(), Weekday::Thu);
    }

    #[test]
    fn test_weekday_rewrite() {
        assert_eq!(standard_weekdays("*").as_deref(), Some("*"));
        assert_eq!(standard_weekdays("1-5").as_deref(), Some("2-6"));
        assert_eq!(standard_weekdays("0,6").as_deref(), Some("1,7"));
        assert_eq!(standard_weekdays("5-7").as_deref(), Some("1,6,7"));
        assert_eq!(standard_weekdays("4-7/2").as_deref(), Some("5,7"));
        assert_eq!(standard_weekdays("0-7/3").as_deref(), Some("1,4,7"));
        assert_eq!(standard_weekdays("0-7").as_deref(), Some("1,2,3,4,5,6,7"));
        assert_eq!(standard_weekdays("1-5/2").as_deref(), Some("2-6/2"));
        assert_eq!(standard_weekdays("*/2").as_deref(), Some("*/2"));
        assert_eq!(standard_weekdays("MON-FRI").as_deref(), Some("MON-FRI"));
        assert_eq!(standard_weekdays("8"), None);
    }

    #[test]
    fn test_next_is_strictly_later_and_increasing() {
        let cron = CronExpr::parse("* * * * * *").unwrap();
        let mut now = Local::now();
        for _ in 0..5 {
            let next = cron.next_after(&now).unwrap();
            assert!(next > now);
            now = next;
        }
    }
}
