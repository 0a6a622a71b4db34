//! Wall-clock gating for the digest trigger.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::config::DigestConfig;

/// The calendar day in the digest timezone, as a UTC range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    /// Last millisecond of the day.
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

pub fn local_minute(now: DateTime<Utc>, tz: Tz) -> String {
    now.with_timezone(&tz).format("%H:%M").to_string()
}

/// True only on an exact `HH:MM` match against a configured send time.
pub fn should_send_now(now: DateTime<Utc>, config: &DigestConfig) -> bool {
    let minute = local_minute(now, config.timezone);
    config.send_times.iter().any(|time| *time == minute)
}

/// Trigger cadence of `watch`, aligned to the wall clock like a `*/15` cron.
pub const TRIGGER_PERIOD_MINUTES: i64 = 15;

/// The first quarter-hour boundary strictly after `now`.
pub fn next_trigger(now: DateTime<Utc>) -> DateTime<Utc> {
    let period = TRIGGER_PERIOD_MINUTES * 60;
    let next = now.timestamp().div_euclid(period) * period + period;
    DateTime::from_timestamp(next, 0).unwrap_or(now + Duration::minutes(TRIGGER_PERIOD_MINUTES))
}

/// Idempotency key of the send slot `now` falls in.
pub fn dedup_key(now: DateTime<Utc>, tz: Tz) -> String {
    now.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string()
}

// Local wall times inside a DST gap do not exist; step forward to the first
// one that does.
fn resolve_local(tz: Tz, date: NaiveDate, time: NaiveTime, latest: bool) -> DateTime<Utc> {
    let mut naive = date.and_time(time);
    for _ in 0..4 {
        let mapped = tz.from_local_datetime(&naive);
        let resolved = if latest { mapped.latest() } else { mapped.earliest() };
        if let Some(local) = resolved {
            return local.with_timezone(&Utc);
        }
        naive += Duration::minutes(30);
    }
    Utc.from_utc_datetime(&date.and_time(time))
}

pub fn day_window(now: DateTime<Utc>, tz: Tz) -> DayWindow {
    let date = now.with_timezone(&tz).date_naive();
    let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    DayWindow {
        date,
        start: resolve_local(tz, date, NaiveTime::MIN, false),
        end: resolve_local(tz, date, end_of_day, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ts: &str) -> DateTime<Utc> {
        ts.parse().expect("timestamp")
    }

    #[test]
    fn triggers_land_on_quarter_hours() {
        assert_eq!(next_trigger(at("2026-01-15T14:07:12Z")), at("2026-01-15T14:15:00Z"));
        assert_eq!(next_trigger(at("2026-01-15T14:15:00Z")), at("2026-01-15T14:30:00Z"));
        assert_eq!(next_trigger(at("2026-01-15T23:59:59.900Z")), at("2026-01-16T00:00:00Z"));

        // A watcher started mid-quarter still hits every send time.
        let config = DigestConfig::default();
        let mut tick = at("2026-01-15T14:07:12Z");
        let mut fired = Vec::new();
        for _ in 0..40 {
            tick = next_trigger(tick);
            if should_send_now(tick, &config) {
                fired.push(local_minute(tick, config.timezone));
            }
        }
        assert_eq!(fired, vec!["13:30", "17:00"]);
    }

    #[test]
    fn fires_only_on_exact_send_minutes() {
        let config = DigestConfig::default();
        // 08:00 CST is 14:00 UTC in winter.
        assert!(should_send_now(at("2026-01-15T14:00:00Z"), &config));
        assert!(should_send_now(at("2026-01-15T14:00:59Z"), &config));
        assert!(!should_send_now(at("2026-01-15T13:59:00Z"), &config));
        assert!(!should_send_now(at("2026-01-15T14:01:00Z"), &config));
        assert!(should_send_now(at("2026-01-15T19:30:00Z"), &config));
        assert!(should_send_now(at("2026-01-15T23:00:00Z"), &config));
        // Same instant in summer is 09:00 CDT.
        assert!(!should_send_now(at("2026-07-15T14:00:00Z"), &config));
        assert!(should_send_now(at("2026-07-15T13:00:00Z"), &config));
    }

    #[test]
    fn dedup_key_is_local_minute() {
        let tz = chrono_tz::America::Chicago;
        assert_eq!(dedup_key(at("2026-01-15T14:00:42Z"), tz), "2026-01-15 08:00");
        assert_eq!(dedup_key(at("2026-01-16T03:30:00Z"), tz), "2026-01-15 21:30");
    }

    #[test]
    fn day_window_spans_local_calendar_day() {
        let tz = chrono_tz::America::Chicago;
        let window = day_window(at("2026-03-01T20:00:00Z"), tz);
        assert_eq!(window.date, NaiveDate::from_ymd_opt(2026, 3, 1).expect("date"));
        assert_eq!(window.start, at("2026-03-01T06:00:00Z"));
        assert_eq!(window.end, at("2026-03-02T05:59:59.999Z"));
        assert!(window.contains(at("2026-03-02T01:00:00Z")));
        assert!(!window.contains(at("2026-03-02T06:00:00Z")));
    }

    #[test]
    fn day_window_handles_dst_start() {
        let tz = chrono_tz::America::Chicago;
        // 2026-03-08 is 23 hours long in Chicago.
        let window = day_window(at("2026-03-08T18:00:00Z"), tz);
        assert_eq!(window.start, at("2026-03-08T06:00:00Z"));
        assert_eq!(window.end, at("2026-03-09T04:59:59.999Z"));
    }
}
