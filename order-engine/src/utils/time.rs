//! 时间工具函数：业务时区转换
//!
//! Timestamps are stored as Unix millis; calendar dates only exist in the
//! business timezone, so every date ↔ millis conversion goes through here.

use chrono::{NaiveDate, TimeZone};
use chrono_tz::Tz;
use shared::{AppError, AppResult};
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of "now" for the engine
pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        shared::util::now_millis()
    }
}

/// Manually driven clock (tests, replays)
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// 解析日期字符串 (YYYY-MM-DD)
pub fn parse_date(date: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("Invalid date format: {}", date)))
}

/// 解析 IANA 时区名称
pub fn parse_timezone(name: &str) -> AppResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| AppError::config(format!("Unknown timezone: {}", name)))
}

/// 日期开始 (00:00:00) → Unix millis (业务时区)
///
/// DST gap fallback: 如果本地时间不存在 (夏令时跳跃)，fallback 到 UTC。
pub fn day_start_millis(date: NaiveDate, tz: Tz) -> i64 {
    let naive = date.and_time(chrono::NaiveTime::MIN);
    naive
        .and_local_timezone(tz)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| naive.and_utc().timestamp_millis())
}

/// 日期结束 → 次日 00:00:00 的 Unix millis (业务时区)
///
/// 返回次日零点时间戳，调用方使用 `< end` (不含) 语义。
pub fn day_end_millis(date: NaiveDate, tz: Tz) -> i64 {
    let next_day = date.succ_opt().unwrap_or(date);
    day_start_millis(next_day, tz)
}

/// Unix millis → 业务时区日历日期
pub fn local_date(millis: i64, tz: Tz) -> NaiveDate {
    tz.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.date_naive())
        .unwrap_or_else(|| {
            chrono::DateTime::from_timestamp_millis(millis)
                .map(|dt| dt.date_naive())
                .unwrap_or_default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_bounds_follow_timezone() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let start_utc = day_start_millis(date, chrono_tz::UTC);
        let start_kolkata = day_start_millis(date, chrono_tz::Asia::Kolkata);
        // IST = UTC+5:30
        assert_eq!(start_utc - start_kolkata, 5 * 3_600_000 + 30 * 60_000);
        assert_eq!(day_end_millis(date, chrono_tz::UTC) - start_utc, 86_400_000);
    }

    #[test]
    fn test_local_date_crosses_midnight() {
        // 2026-03-10 20:00 UTC is already 2026-03-11 in Kolkata
        let millis = NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(20, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        assert_eq!(
            local_date(millis, chrono_tz::Asia::Kolkata),
            NaiveDate::from_ymd_opt(2026, 3, 11).unwrap()
        );
        assert_eq!(
            local_date(millis, chrono_tz::UTC),
            NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
        );
    }

    #[test]
    fn test_parse_helpers() {
        assert!(parse_date("2026-02-30").is_err());
        assert_eq!(
            parse_date("2026-02-28").unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()
        );
        assert_eq!(parse_timezone("Asia/Kolkata").unwrap(), chrono_tz::Asia::Kolkata);
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1_000);
        clock.advance(500);
        assert_eq!(clock.now_millis(), 1_500);
        clock.set(10);
        assert_eq!(clock.now_millis(), 10);
    }
}
