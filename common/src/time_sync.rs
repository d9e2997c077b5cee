use chrono::DateTime;
use embedded_hal::delay::DelayNs;
use log::{info, warn};
use thiserror::Error;

use crate::{clock::Millis, config::TimeConfig, retry::retry_forever};

/// Anything earlier is an unset RTC, not a real sync (2023-01-01T00:00:00Z).
pub const MIN_VALID_UNIX: u64 = 1_672_531_200;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeSyncError {
    #[error("time source has not synchronized yet")]
    NotSynced,
    #[error("time source returned implausible epoch {0}")]
    Implausible(u64),
    #[error("time source unavailable: {0}")]
    Unavailable(String),
}

/// One network round trip for the current UTC time.
pub trait TimeSource {
    fn query_unix_seconds(&mut self) -> Result<u64, TimeSyncError>;
}

impl<F> TimeSource for F
where
    F: FnMut() -> Result<u64, TimeSyncError>,
{
    fn query_unix_seconds(&mut self) -> Result<u64, TimeSyncError> {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SyncPoint {
    unix_seconds: u64,
    at_ms: u32,
}

/// Local wall clock kept in step with a [`TimeSource`].
///
/// Between syncs the clock free-runs on the caller's millisecond counter.
/// Every epoch it hands out already includes the configured UTC offset, so
/// callers format it with UTC calendar rules and never shift it again.
#[derive(Debug)]
pub struct NtpClock<S> {
    source: S,
    offset_secs: i64,
    update_interval_ms: u32,
    last_sync: Option<SyncPoint>,
}

impl<S: TimeSource> NtpClock<S> {
    pub fn new(source: S, offset_secs: i64, update_interval_ms: u32) -> Self {
        Self {
            source,
            offset_secs,
            update_interval_ms,
            last_sync: None,
        }
    }

    pub fn from_config(source: S, config: &TimeConfig) -> Self {
        Self::new(source, config.utc_offset_secs, config.ntp_update_interval_ms)
    }

    pub fn initialize(&mut self) {
        self.last_sync = None;
    }

    pub fn is_synced(&self) -> bool {
        self.last_sync.is_some()
    }

    pub fn offset_secs(&self) -> i64 {
        self.offset_secs
    }

    pub fn force_sync(&mut self, now_ms: u32) -> Result<(), TimeSyncError> {
        let unix_seconds = self.source.query_unix_seconds()?;
        if unix_seconds < MIN_VALID_UNIX {
            return Err(TimeSyncError::Implausible(unix_seconds));
        }

        self.last_sync = Some(SyncPoint {
            unix_seconds,
            at_ms: now_ms,
        });
        Ok(())
    }

    /// Re-syncs when due. Failures keep the free-running clock.
    pub fn refresh(&mut self, now_ms: u32) -> bool {
        let due = match self.last_sync {
            None => true,
            Some(sync) => now_ms.wrapping_sub(sync.at_ms) >= self.update_interval_ms,
        };
        if !due {
            return false;
        }

        match self.force_sync(now_ms) {
            Ok(()) => true,
            Err(err) => {
                warn!("time refresh failed: {err}");
                false
            }
        }
    }

    /// Seconds since 1970 with the UTC offset already added.
    pub fn epoch_seconds_local(&self, now_ms: u32) -> i64 {
        let utc = match self.last_sync {
            Some(sync) => {
                sync.unix_seconds as i64 + i64::from(now_ms.wrapping_sub(sync.at_ms) / 1000)
            }
            None => i64::from(now_ms / 1000),
        };
        utc + self.offset_secs
    }

    /// `HH:MM:SS` of the local epoch.
    pub fn formatted_local_time(&self, now_ms: u32) -> String {
        format_time_of_day(self.epoch_seconds_local(now_ms))
    }
}

/// `HH:MM:SS` of an epoch that already carries any local offset.
pub fn format_time_of_day(epoch_seconds: i64) -> String {
    format_epoch(epoch_seconds, "%H:%M:%S")
}

/// Calendar rendering with UTC rules. The caller's epoch is expected to carry
/// any local offset already.
pub fn format_calendar(epoch_seconds: i64) -> String {
    format_epoch(epoch_seconds, "%Y-%m-%d %H:%M:%S")
}

fn format_epoch(epoch_seconds: i64, pattern: &str) -> String {
    DateTime::from_timestamp(epoch_seconds, 0)
        .unwrap_or_default()
        .format(pattern)
        .to_string()
}

/// Logs each failed attempt and returns once the clock has synced.
pub fn sync_until_ok<S, D>(
    clock: &mut NtpClock<S>,
    millis: &impl Millis,
    delay: &mut D,
    retry_delay_ms: u32,
) where
    S: TimeSource,
    D: DelayNs,
{
    clock.initialize();
    let attempts = retry_forever(retry_delay_ms, delay, |attempt| {
        clock.force_sync(millis.now_ms()).map(|()| attempt).inspect_err(|err| {
            if attempt == 1 || attempt % 50 == 0 {
                warn!("NTP sync attempt {attempt} failed: {err}");
            }
        })
    });
    info!("NTP synced after {attempts} attempt(s)");
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::retry::testing::RecordingDelay;

    const UNIX_NOW: u64 = 1_700_000_000;

    fn fixed_source(value: u64) -> impl FnMut() -> Result<u64, TimeSyncError> {
        move || Ok(value)
    }

    struct FixedMillis(Cell<u32>);

    impl Millis for FixedMillis {
        fn now_ms(&self) -> u32 {
            self.0.get()
        }
    }

    #[test]
    fn epoch_includes_offset_and_free_runs() {
        let mut clock = NtpClock::new(fixed_source(UNIX_NOW), 8 * 3600, 60_000);
        clock.force_sync(1_000).unwrap();

        assert_eq!(clock.epoch_seconds_local(1_000), UNIX_NOW as i64 + 28_800);
        assert_eq!(clock.epoch_seconds_local(13_999), UNIX_NOW as i64 + 28_812);
    }

    #[test]
    fn formatted_time_uses_local_offset() {
        // 1_700_000_000 is 22:13:20 UTC; +8h wraps to 06:13:20.
        let mut clock = NtpClock::new(fixed_source(UNIX_NOW), 8 * 3600, 60_000);
        clock.force_sync(0).unwrap();

        assert_eq!(clock.formatted_local_time(0), "06:13:20");
        assert_eq!(clock.formatted_local_time(61_000), "06:14:21");
    }

    #[test]
    fn calendar_formatting_applies_no_extra_offset() {
        assert_eq!(format_calendar(1_700_000_000), "2023-11-14 22:13:20");
        assert_eq!(format_calendar(0), "1970-01-01 00:00:00");
    }

    #[test]
    fn time_of_day_wraps_at_midnight() {
        assert_eq!(format_time_of_day(1_700_000_000), "22:13:20");
        assert_eq!(format_time_of_day(86_400), "00:00:00");
        assert_eq!(format_time_of_day(-1), "23:59:59");
    }

    #[test]
    fn refresh_only_syncs_when_interval_elapsed() {
        let calls = Cell::new(0_u32);
        let source = || -> Result<u64, TimeSyncError> {
            calls.set(calls.get() + 1);
            Ok(UNIX_NOW + u64::from(calls.get()))
        };
        let mut clock = NtpClock::new(source, 0, 60_000);

        assert!(clock.refresh(5_000));
        assert!(!clock.refresh(30_000));
        assert!(!clock.refresh(64_999));
        assert!(clock.refresh(65_000));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn refresh_failure_keeps_previous_sync() {
        let healthy = Cell::new(true);
        let source = || {
            if healthy.get() {
                Ok(UNIX_NOW)
            } else {
                Err(TimeSyncError::Unavailable("timeout".to_string()))
            }
        };
        let mut clock = NtpClock::new(source, 0, 1_000);
        clock.force_sync(0).unwrap();
        healthy.set(false);

        assert!(!clock.refresh(10_000));
        assert_eq!(clock.epoch_seconds_local(10_000), UNIX_NOW as i64 + 10);
    }

    #[test]
    fn interval_math_survives_counter_wrap() {
        let mut clock = NtpClock::new(fixed_source(UNIX_NOW), 0, 60_000);
        clock.force_sync(u32::MAX - 499).unwrap();

        assert_eq!(clock.epoch_seconds_local(1_500), UNIX_NOW as i64 + 2);
        assert!(!clock.refresh(1_500));
    }

    #[test]
    fn rejects_unset_clock_values() {
        let mut clock = NtpClock::new(fixed_source(12), 0, 60_000);

        assert_eq!(clock.force_sync(0), Err(TimeSyncError::Implausible(12)));
        assert!(!clock.is_synced());
    }

    #[test]
    fn sync_until_ok_retries_without_cap() {
        let failures = Cell::new(5_u32);
        let source = || {
            if failures.get() > 0 {
                failures.set(failures.get() - 1);
                Err(TimeSyncError::NotSynced)
            } else {
                Ok(UNIX_NOW)
            }
        };
        let mut clock = NtpClock::new(source, 0, 60_000);
        let mut delay = RecordingDelay::default();
        let millis = FixedMillis(Cell::new(42));

        sync_until_ok(&mut clock, &millis, &mut delay, 100);

        assert!(clock.is_synced());
        assert_eq!(delay.calls, 5);
        assert_eq!(delay.total_ms(), 500);
    }
}
