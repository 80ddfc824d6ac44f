//! Once-a-day scheduling.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use amnesia_core::{AmnesiaError, Result};

/// Run once a day at a fixed local hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySchedule {
    hour: u32,
}

impl DailySchedule {
    /// A schedule firing at `hour` o'clock (0-23).
    pub fn new(hour: u32) -> Result<Self> {
        if hour > 23 {
            return Err(AmnesiaError::invalid_config(format!(
                "Hour must be between 0 and 23, got {hour}"
            )));
        }
        Ok(Self { hour })
    }

    /// The configured hour.
    pub fn hour(&self) -> u32 {
        self.hour
    }

    /// The first firing strictly after `now`.
    pub fn next_run_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let tz = now.timezone();
        let time = NaiveTime::from_hms_opt(self.hour, 0, 0).unwrap_or(NaiveTime::MIN);
        let mut day = now.date_naive();

        loop {
            // A local time skipped by a DST jump resolves to the next valid hour.
            let naive = day.and_time(time);
            let candidate = tz
                .from_local_datetime(&naive)
                .earliest()
                .or_else(|| tz.from_local_datetime(&(naive + chrono::Duration::hours(1))).earliest());

            if let Some(candidate) = candidate.filter(|c| c > now) {
                return candidate;
            }
            match day.checked_add_days(Days::new(1)) {
                Some(next) => day = next,
                None => return now.clone(),
            }
        }
    }

    /// Time from `now` until the next firing.
    pub fn duration_until<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Duration {
        (self.next_run_after(now) - now.clone())
            .to_std()
            .unwrap_or_default()
    }
}

/// Call `job` at every firing of `schedule` until `cancel` fires.
///
/// Returns how many times the job ran. A job in progress is awaited, not
/// interrupted; it receives its own clone of the token.
pub async fn run_daily<F, Fut>(schedule: DailySchedule, cancel: CancellationToken, mut job: F) -> usize
where
    F: FnMut(CancellationToken) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut runs = 0;
    let mut last_target: Option<DateTime<Local>> = None;

    loop {
        let now = Local::now();
        // The wall clock may lag behind the timer; never schedule the same firing twice.
        let base = match last_target {
            Some(last) if last > now => last,
            _ => now,
        };
        let target = schedule.next_run_after(&base);
        let wait = (target - now).to_std().unwrap_or_default();

        info!(next_run = %target, "Waiting for next scheduled run");

        tokio::select! {
            _ = cancel.cancelled() => return runs,
            _ = tokio::time::sleep(wait) => {}
        }

        info!(run = runs + 1, "Starting scheduled run");
        job(cancel.clone()).await;
        runs += 1;
        last_target = Some(target);

        if cancel.is_cancelled() {
            return runs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_hour_validation() {
        assert!(DailySchedule::new(0).is_ok());
        assert!(DailySchedule::new(23).is_ok());
        assert!(DailySchedule::new(24).is_err());
    }

    #[test]
    fn test_next_run_later_today() {
        let schedule = DailySchedule::new(18).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap();

        assert_eq!(
            schedule.next_run_after(&now),
            Utc.with_ymd_and_hms(2024, 3, 10, 18, 0, 0).unwrap()
        );
        assert_eq!(
            schedule.duration_until(&now),
            Duration::from_secs(8 * 3600 + 30 * 60)
        );
    }

    #[test]
    fn test_next_run_tomorrow() {
        let schedule = DailySchedule::new(6).unwrap();

        let after = Utc.with_ymd_and_hms(2024, 12, 31, 7, 0, 0).unwrap();
        assert_eq!(
            schedule.next_run_after(&after),
            Utc.with_ymd_and_hms(2025, 1, 1, 6, 0, 0).unwrap()
        );

        // Exactly on the hour counts as already fired.
        let on_time = Utc.with_ymd_and_hms(2024, 12, 31, 6, 0, 0).unwrap();
        assert_eq!(
            schedule.next_run_after(&on_time),
            Utc.with_ymd_and_hms(2025, 1, 1, 6, 0, 0).unwrap()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_daily_until_cancelled() {
        let schedule = DailySchedule::new(3).unwrap();
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let runs = run_daily(schedule, cancel.clone(), move |token| {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                    token.cancel();
                }
            }
        })
        .await;

        assert_eq!(runs, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_daily_cancelled_before_first_run() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let runs = run_daily(DailySchedule::new(3).unwrap(), cancel, |_| async {}).await;
        assert_eq!(runs, 0);
    }
}
