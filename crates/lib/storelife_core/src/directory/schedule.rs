//! Periodic directory sync: daily full run, hourly incremental run.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Timelike, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::sync::{DirectorySync, SyncKind, SyncOutcome};
use super::{DirectoryError, DirectoryResult};

pub const DEFAULT_DAILY_HOUR: u32 = 2;
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 8;

/// When the two sync jobs fire, in a fixed-offset local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSchedule {
    daily_at: NaiveTime,
    offset: FixedOffset,
}

impl SyncSchedule {
    /// # Errors
    ///
    /// Returns [`DirectoryError::InvalidSchedule`] when the hour is not in
    /// `0..24` or the offset is outside `-23..=23`.
    pub fn new(daily_hour: u32, utc_offset_hours: i32) -> DirectoryResult<Self> {
        let daily_at = NaiveTime::from_hms_opt(daily_hour, 0, 0).ok_or_else(|| {
            DirectoryError::InvalidSchedule(format!("daily hour {daily_hour} out of range"))
        })?;
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600).ok_or_else(|| {
            DirectoryError::InvalidSchedule(format!("UTC offset {utc_offset_hours}h out of range"))
        })?;
        Ok(Self { daily_at, offset })
    }

    /// First fire time of `kind` strictly after `now`.
    pub fn next_run(&self, kind: SyncKind, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.offset).naive_local();
        let next_local = match kind {
            SyncKind::Full => {
                let today = local.date().and_time(self.daily_at);
                if today > local {
                    today
                } else {
                    today + Duration::days(1)
                }
            }
            SyncKind::Incremental => {
                let top = local.date().and_hms_opt(local.hour(), 0, 0).unwrap_or(local);
                top + Duration::hours(1)
            }
        };
        (next_local - self.offset).and_utc()
    }
}

/// Drives [`DirectorySync`] on a [`SyncSchedule`] until cancelled.
pub struct SyncScheduler {
    sync: Arc<DirectorySync>,
    schedule: SyncSchedule,
    cancel: CancellationToken,
}

impl SyncScheduler {
    pub fn new(sync: Arc<DirectorySync>, schedule: SyncSchedule, cancel: CancellationToken) -> Self {
        Self {
            sync,
            schedule,
            cancel,
        }
    }

    /// Spawn the full and incremental loops.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        [SyncKind::Full, SyncKind::Incremental]
            .into_iter()
            .map(|kind| {
                let sync = Arc::clone(&self.sync);
                let cancel = self.cancel.clone();
                let schedule = self.schedule;
                tokio::spawn(async move { run_loop(sync, schedule, kind, cancel).await })
            })
            .collect()
    }
}

async fn run_loop(
    sync: Arc<DirectorySync>,
    schedule: SyncSchedule,
    kind: SyncKind,
    cancel: CancellationToken,
) {
    loop {
        let now = Utc::now();
        let next = schedule.next_run(kind, now);
        let wait = (next - now).to_std().unwrap_or_default();
        debug!(%kind, next = %next, "next directory sync scheduled");

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        match sync.run(kind).await {
            SyncOutcome::Completed(report) if !report.success => {
                warn!(%kind, errors = ?report.errors, "scheduled directory sync failed");
            }
            SyncOutcome::Completed(_) => {}
            SyncOutcome::AlreadyRunning => {
                info!(%kind, "scheduled directory sync skipped, previous run still active");
            }
        }
    }
    debug!(%kind, "directory sync loop stopped");
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::directory::store::MemoryDirectoryStore;
    use crate::directory::{DirectoryResult, DirectorySource};
    use crate::models::directory::{DirectoryDepartment, DirectoryUser};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn daily_run_is_at_local_hour() {
        let schedule = SyncSchedule::new(2, 8).unwrap();
        // 10:00 UTC = 18:00 +08:00, next 02:00 local is 18:00 UTC the same day.
        assert_eq!(
            schedule.next_run(SyncKind::Full, utc(2026, 3, 1, 10, 0)),
            utc(2026, 3, 1, 18, 0)
        );
        // 17:30 UTC = 01:30 local on the 2nd, still before 02:00.
        assert_eq!(
            schedule.next_run(SyncKind::Full, utc(2026, 3, 1, 17, 30)),
            utc(2026, 3, 1, 18, 0)
        );
    }

    #[test]
    fn daily_run_at_exact_time_moves_to_next_day() {
        let schedule = SyncSchedule::new(2, 8).unwrap();
        assert_eq!(
            schedule.next_run(SyncKind::Full, utc(2026, 3, 1, 18, 0)),
            utc(2026, 3, 2, 18, 0)
        );
    }

    #[test]
    fn hourly_run_is_at_top_of_next_hour() {
        let schedule = SyncSchedule::new(2, 8).unwrap();
        assert_eq!(
            schedule.next_run(SyncKind::Incremental, utc(2026, 3, 1, 10, 0)),
            utc(2026, 3, 1, 11, 0)
        );
        assert_eq!(
            schedule.next_run(SyncKind::Incremental, utc(2026, 12, 31, 23, 59)),
            utc(2027, 1, 1, 0, 0)
        );
    }

    #[test]
    fn invalid_schedule_is_rejected() {
        assert!(matches!(
            SyncSchedule::new(24, 8),
            Err(DirectoryError::InvalidSchedule(_))
        ));
        assert!(SyncSchedule::new(2, 30).is_err());
    }

    struct EmptySource;

    #[async_trait::async_trait]
    impl DirectorySource for EmptySource {
        async fn list_departments(&self) -> DirectoryResult<Vec<DirectoryDepartment>> {
            Ok(vec![])
        }
        async fn list_users(&self, _: &str) -> DirectoryResult<Vec<DirectoryUser>> {
            Ok(vec![])
        }
        async fn user_id_by_code(&self, _: &str) -> DirectoryResult<String> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn loops_stop_on_cancel() {
        let sync = Arc::new(DirectorySync::new(
            Arc::new(EmptySource),
            Arc::new(MemoryDirectoryStore::new()),
        ));
        let cancel = CancellationToken::new();
        let handles = SyncScheduler::new(
            sync,
            SyncSchedule::new(DEFAULT_DAILY_HOUR, DEFAULT_UTC_OFFSET_HOURS).unwrap(),
            cancel.clone(),
        ).spawn();
        assert_eq!(handles.len(), 2);

        cancel.cancel();
        for handle in handles {
            tokio::time::timeout(std::time::Duration::from_secs(1), handle)
                .await
                .expect("loop did not stop")
                .unwrap();
        }
    }
}
