//! Directory sync job: pull departments and users, upsert by external id.
//!
//! Batches are best-effort. A failed user-list fetch or a failed upsert is
//! logged, recorded in the report, and skipped; only failing to fetch the
//! department list aborts a run. At most one run per [`SyncKind`] is in flight.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use super::store::DirectoryStore;
use super::{DirectoryResult, DirectorySource};
use crate::error::StoreResult;
use crate::models::directory::UpsertOutcome;

/// Which flavour of sync to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    /// Upsert every record and rebuild the change fingerprints.
    Full,
    /// Upsert only records whose content changed since the last run.
    Incremental,
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncKind::Full => f.write_str("full"),
            SyncKind::Incremental => f.write_str("incremental"),
        }
    }
}

/// Per-record-type tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpsertCounts {
    pub created: u32,
    pub updated: u32,
    pub unchanged: u32,
    /// Not written because the fingerprint matched the previous run.
    pub skipped: u32,
    pub failed: u32,
}

impl UpsertCounts {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.created + self.updated + self.unchanged + self.skipped + self.failed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncCounts {
    pub departments: UpsertCounts,
    pub users: UpsertCounts,
}

/// Summary of one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub kind: SyncKind,
    /// False only when the run was aborted (department list unavailable).
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub counts: SyncCounts,
    pub errors: Vec<String>,
}

/// Result of a trigger.
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// A run of the same kind was already in flight; nothing was done.
    AlreadyRunning,
}

/// Clears the running flag when the run ends, including on panic.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct Fingerprints {
    departments: HashMap<String, u64>,
    users: HashMap<String, u64>,
}

fn fingerprint<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Tracks one record type through a run.
struct Batch<'a> {
    kind: SyncKind,
    previous: &'a HashMap<String, u64>,
    next: HashMap<String, u64>,
    counts: UpsertCounts,
}

impl<'a> Batch<'a> {
    fn new(kind: SyncKind, previous: &'a HashMap<String, u64>) -> Self {
        Self {
            kind,
            previous,
            next: HashMap::new(),
            counts: UpsertCounts::default(),
        }
    }

    /// Returns false when the record can be skipped.
    fn needs_write(&mut self, id: &str, fp: u64) -> bool {
        if self.kind == SyncKind::Incremental && self.previous.get(id) == Some(&fp) {
            self.counts.skipped += 1;
            self.next.insert(id.to_string(), fp);
            return false;
        }
        true
    }

    fn finish(&mut self, id: &str, fp: u64, result: StoreResult<UpsertOutcome>, label: &str, errors: &mut Vec<String>) {
        match result {
            Ok(outcome) => {
                self.counts.record(outcome);
                self.next.insert(id.to_string(), fp);
            }
            Err(e) => {
                warn!(id, error = %e, "{label} upsert failed");
                self.counts.failed += 1;
                errors.push(format!("{label} {id}: {e}"));
            }
        }
    }
}

/// Pulls the remote directory into the local store.
pub struct DirectorySync {
    source: Arc<dyn DirectorySource>,
    store: Arc<dyn DirectoryStore>,
    full_running: AtomicBool,
    incremental_running: AtomicBool,
    fingerprints: Mutex<Fingerprints>,
    last_reports: DashMap<SyncKind, SyncReport>,
}

impl DirectorySync {
    pub fn new(source: Arc<dyn DirectorySource>, store: Arc<dyn DirectoryStore>) -> Self {
        Self {
            source,
            store,
            full_running: AtomicBool::new(false),
            incremental_running: AtomicBool::new(false),
            fingerprints: Mutex::new(Fingerprints::default()),
            last_reports: DashMap::new(),
        }
    }

    fn flag(&self, kind: SyncKind) -> &AtomicBool {
        match kind {
            SyncKind::Full => &self.full_running,
            SyncKind::Incremental => &self.incremental_running,
        }
    }

    pub fn is_running(&self, kind: SyncKind) -> bool {
        self.flag(kind).load(Ordering::Acquire)
    }

    /// Most recent completed report of `kind`, if any.
    pub fn last_report(&self, kind: SyncKind) -> Option<SyncReport> {
        self.last_reports.get(&kind).map(|r| r.clone())
    }

    /// Run a sync unless one of the same kind is already in flight.
    ///
    /// Never fails: problems are captured in the returned report.
    #[instrument(skip(self))]
    pub async fn run(&self, kind: SyncKind) -> SyncOutcome {
        let Some(_guard) = RunGuard::acquire(self.flag(kind)) else {
            info!(%kind, "directory sync already running, trigger ignored");
            return SyncOutcome::AlreadyRunning;
        };

        info!(%kind, "directory sync started");
        let started = Instant::now();
        let mut report = SyncReport {
            kind,
            success: true,
            started_at: Utc::now(),
            duration_ms: 0,
            counts: SyncCounts::default(),
            errors: Vec::new(),
        };

        if let Err(e) = self.execute(kind, &mut report).await {
            error!(%kind, error = %e, "directory sync aborted");
            report.success = false;
            report.errors.push(format!("department list: {e}"));
        }
        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            %kind,
            success = report.success,
            duration_ms = report.duration_ms,
            departments = report.counts.departments.total(),
            users = report.counts.users.total(),
            errors = report.errors.len(),
            "directory sync finished"
        );
        self.last_reports.insert(kind, report.clone());
        SyncOutcome::Completed(report)
    }

    async fn execute(&self, kind: SyncKind, report: &mut SyncReport) -> DirectoryResult<()> {
        let departments = self.source.list_departments().await?;

        let previous = {
            let fps = self.fingerprints.lock().await;
            Fingerprints {
                departments: fps.departments.clone(),
                users: fps.users.clone(),
            }
        };

        let mut dept_batch = Batch::new(kind, &previous.departments);
        for dept in &departments {
            let fp = fingerprint(dept);
            if !dept_batch.needs_write(&dept.external_id, fp) {
                continue;
            }
            let result = self.store.upsert_department(dept).await;
            dept_batch.finish(&dept.external_id, fp, result, "department", &mut report.errors);
        }

        let mut user_batch = Batch::new(kind, &previous.users);
        let mut seen = HashSet::new();
        for dept in &departments {
            let users = match self.source.list_users(&dept.external_id).await {
                Ok(users) => users,
                Err(e) => {
                    warn!(department = %dept.external_id, error = %e, "user list fetch failed");
                    report
                        .errors
                        .push(format!("users of department {}: {e}", dept.external_id));
                    continue;
                }
            };
            for user in users {
                // Members of several departments are listed once per department.
                if !seen.insert(user.external_id.clone()) {
                    continue;
                }
                let fp = fingerprint(&user);
                if !user_batch.needs_write(&user.external_id, fp) {
                    continue;
                }
                let result = self.store.upsert_user(&user).await;
                user_batch.finish(&user.external_id, fp, result, "user", &mut report.errors);
            }
        }

        report.counts.departments = dept_batch.counts;
        report.counts.users = user_batch.counts;

        let mut fps = self.fingerprints.lock().await;
        match kind {
            SyncKind::Full => {
                fps.departments = dept_batch.next;
                fps.users = user_batch.next;
            }
            SyncKind::Incremental => {
                fps.departments.extend(dept_batch.next);
                fps.users.extend(user_batch.next);
            }
        }
        Ok(())
    }
}
