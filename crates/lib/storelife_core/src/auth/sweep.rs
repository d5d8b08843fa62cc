//! Periodic removal of sessions idle past the threshold.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::SessionManager;

/// Sweep interval default: 15 minutes.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 15 * 60;

/// Calls [`SessionManager::sweep_idle_sessions`] on a fixed interval until
/// cancelled.
pub struct IdleSessionSweeper {
    sessions: Arc<SessionManager>,
    every: Duration,
    cancel: CancellationToken,
}

impl IdleSessionSweeper {
    pub fn new(sessions: Arc<SessionManager>, every: Duration, cancel: CancellationToken) -> Self {
        Self {
            sessions,
            every,
            cancel,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval(self.every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match self.sessions.sweep_idle_sessions().await {
                Ok(0) => debug!("idle sweep found nothing"),
                Ok(removed) => info!(removed, "idle sessions swept"),
                Err(e) => warn!(error = %e, "idle session sweep failed"),
            }
        }
        debug!("idle session sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemorySessionStore, SessionStore, TokenSettings};
    use crate::directory::store::MemoryDirectoryStore;

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_interval_and_stops_on_cancel() {
        let store = Arc::new(MemorySessionStore::new());
        let users = Arc::new(MemoryDirectoryStore::new());
        let user = users.add_account("alice", None, vec![]);
        let manager = Arc::new(SessionManager::new(
            store.clone(),
            users,
            TokenSettings::new("test-secret"),
        ));
        manager.issue(&user).await.unwrap();
        let mut session = store.get_session(&user.id).await.unwrap().unwrap();
        session.last_activity -= chrono::Duration::hours(25);
        store
            .put_session(&session, Duration::from_secs(3600))
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let handle =
            IdleSessionSweeper::new(manager, Duration::from_secs(60), cancel.clone()).spawn();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(store.get_session(&user.id).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(store.get_session(&user.id).await.unwrap().is_none());

        cancel.cancel();
        handle.await.unwrap();
    }
}
