//! Durable retry queue for collections whose local state is ahead of the remote.
//!
//! Pushes are full-collection replaces of whatever the Local Store holds when
//! the push runs, so retrying is idempotent and one entry per collection is
//! enough.

use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{Freshness, SyncEngine};
use crate::error::{RemoteError, SyncError};
use crate::models::Collection;
use crate::remote::RemoteStore;

const BACKOFF_BASE_MS: u64 = 2_000;
const BACKOFF_MAX_MS: u64 = 5 * 60 * 1_000;

/// Delay before retry number `attempt` (1-based), with up to 20% jitter.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let backoff = BACKOFF_BASE_MS
        .saturating_mul(1_u64 << exp)
        .min(BACKOFF_MAX_MS);
    let jitter = rand::rng().random_range(0..=(backoff / 5).max(1));
    Duration::from_millis(backoff.saturating_add(jitter))
}

/// What triggered a push; decides the outbox bookkeeping on failure.
#[derive(Debug, Clone, Copy)]
pub(crate) enum PushOrigin {
    Save,
    Outbox { attempts: u32 },
}

/// Result of one [`SyncEngine::flush_outbox`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub pushed: Vec<Collection>,
    pub retrying: Vec<Collection>,
    pub dropped: Vec<Collection>,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        self.pushed.is_empty() && self.retrying.is_empty() && self.dropped.is_empty()
    }
}

/// Handle to the background task started by [`SyncEngine::spawn_outbox_worker`].
pub struct OutboxWorker {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl OutboxWorker {
    /// Stops the worker and waits for an in-flight flush to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.handle.await {
            tracing::warn!("Outbox worker ended abnormally: {}", e);
        }
    }
}

impl SyncEngine {
    /// Pushes the Local Store's current contents of `collection`.
    ///
    /// Runs under the collection's push lock, so pushes of one collection never
    /// overlap and the last one to run always carries the newest contents.
    /// Outbox bookkeeping also happens under the lock. The outer `Result` is a
    /// local failure; the inner one is the remote outcome.
    ///
    /// Only outbox retries update freshness here; a save publishes its own
    /// together with its snapshot.
    pub(crate) async fn push(
        &self,
        collection: Collection,
        remote: Result<Arc<dyn RemoteStore>, RemoteError>,
        origin: PushOrigin,
    ) -> Result<Result<(), RemoteError>, SyncError> {
        let _guard = self.inner.push_locks[collection.index()].lock().await;

        let result = match remote {
            Ok(remote) => {
                let items = self.store().to_array(collection).await?;
                remote.bulk_write(collection, &items).await
            }
            Err(e) => Err(e),
        };

        if let PushOrigin::Outbox { .. } = origin {
            let freshness = match &result {
                Ok(()) => Freshness::Synced,
                Err(_) => Freshness::LocalAhead,
            };
            self.set_freshness(collection, freshness);
        }

        let store = self.store();
        match &result {
            Ok(()) => {
                store.outbox_remove(collection).await?;
            }
            Err(e) => match origin {
                PushOrigin::Save if e.is_retryable() => {
                    store.outbox_upsert(collection, &e.to_string()).await?;
                    self.inner.wake.notify_one();
                }
                PushOrigin::Save => {}
                PushOrigin::Outbox { attempts } if e.is_retryable() => {
                    let delay = backoff_delay(attempts.saturating_add(1));
                    let next = Utc::now()
                        + chrono::Duration::from_std(delay)
                            .unwrap_or_else(|_| chrono::Duration::minutes(5));
                    store
                        .outbox_record_failure(collection, &e.to_string(), next)
                        .await?;
                }
                PushOrigin::Outbox { .. } => {
                    store.outbox_remove(collection).await?;
                }
            },
        }

        Ok(result)
    }

    /// Retries every due outbox entry once.
    ///
    /// Entries are dropped when the hotel is no longer in cloud mode or the
    /// remote refuses the write outright.
    pub async fn flush_outbox(&self) -> Result<FlushReport, SyncError> {
        let due = self.store().outbox_due(Utc::now()).await?;
        let mut report = FlushReport::default();
        if due.is_empty() {
            return Ok(report);
        }

        let settings = self.settings().get_settings().await;

        for entry in due {
            let collection = entry.collection;

            if !settings.is_cloud() {
                tracing::info!("Dropping queued push of {}: local mode", collection);
                self.store().outbox_remove(collection).await?;
                report.dropped.push(collection);
                continue;
            }

            let remote = self.settings().remote_for(&settings);
            let origin = PushOrigin::Outbox {
                attempts: entry.attempts,
            };

            match self.push(collection, remote, origin).await? {
                Ok(()) => {
                    tracing::info!(
                        "Pushed queued {} after {} failed attempt(s)",
                        collection,
                        entry.attempts
                    );
                    report.pushed.push(collection);
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!("Queued push of {} failed again: {}", collection, e);
                    report.retrying.push(collection);
                }
                Err(e) => {
                    tracing::warn!("Dropping queued push of {}: {}", collection, e);
                    report.dropped.push(collection);
                }
            }
        }

        Ok(report)
    }

    /// Starts a task that flushes the outbox every `interval` and whenever a
    /// save queues a push.
    pub fn spawn_outbox_worker(&self, interval: Duration) -> OutboxWorker {
        let engine = self.clone();
        let (shutdown, mut stop) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stop => break,
                    _ = ticker.tick() => {}
                    _ = engine.inner.wake.notified() => {}
                }

                match engine.flush_outbox().await {
                    Ok(report) if !report.is_empty() => {
                        tracing::debug!(
                            "Outbox flush: {} pushed, {} retrying, {} dropped",
                            report.pushed.len(),
                            report.retrying.len(),
                            report.dropped.len()
                        );
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Outbox flush failed: {}", e),
                }
            }

            tracing::debug!("Outbox worker stopped");
        });

        OutboxWorker { shutdown, handle }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::{item, setup};
    use crate::settings::SyncMode;

    fn offline() -> RemoteError {
        RemoteError::ConnectionError("offline".into())
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let first = backoff_delay(1);
        assert!(first >= Duration::from_secs(2) && first <= Duration::from_millis(2_400));

        let third = backoff_delay(3);
        assert!(third >= Duration::from_secs(8));

        let late = backoff_delay(40);
        assert!(late >= Duration::from_secs(300) && late <= Duration::from_secs(360));
    }

    #[tokio::test]
    async fn test_retry_at_attempt_limit_keeps_backing_off() {
        let ctx = setup(SyncMode::Cloud).await;
        ctx.remote.fail_writes(Collection::Attendance, offline());
        ctx.engine
            .store()
            .outbox_upsert(Collection::Attendance, "offline")
            .await
            .unwrap();

        let settings = ctx.engine.settings().get_settings().await;
        let remote = ctx.engine.settings().remote_for(&settings);
        let result = ctx
            .engine
            .push(
                Collection::Attendance,
                remote,
                PushOrigin::Outbox { attempts: u32::MAX },
            )
            .await
            .unwrap();

        assert!(result.is_err());
        let pending = ctx.engine.pending_pushes().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].next_attempt_at > Utc::now() + chrono::Duration::minutes(4));
        assert_eq!(
            ctx.engine.freshness(Collection::Attendance),
            Freshness::LocalAhead
        );
    }

    #[tokio::test]
    async fn test_flush_pushes_latest_local_contents() {
        let ctx = setup(SyncMode::Cloud).await;
        ctx.remote.fail_writes(Collection::Rooms, offline());

        ctx.engine
            .save_values(Collection::Rooms, vec![item("r1")])
            .await
            .unwrap();
        ctx.engine
            .save_values(Collection::Rooms, vec![item("r1"), item("r2")])
            .await
            .unwrap();
        assert_eq!(ctx.engine.pending_pushes().await.unwrap().len(), 1);

        ctx.remote.clear_failures();
        let report = ctx.engine.flush_outbox().await.unwrap();

        assert_eq!(report.pushed, vec![Collection::Rooms]);
        assert_eq!(
            ctx.remote.get(Collection::Rooms),
            vec![item("r1"), item("r2")]
        );
        assert_eq!(ctx.engine.freshness(Collection::Rooms), Freshness::Synced);
        assert!(ctx.engine.pending_pushes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_flush_backs_off() {
        let ctx = setup(SyncMode::Cloud).await;
        ctx.remote.fail_writes(Collection::Staff, offline());

        ctx.engine
            .save_values(Collection::Staff, vec![item("s1")])
            .await
            .unwrap();

        let report = ctx.engine.flush_outbox().await.unwrap();
        assert_eq!(report.retrying, vec![Collection::Staff]);

        let pending = ctx.engine.pending_pushes().await.unwrap();
        assert_eq!(pending[0].attempts, 1);
        assert!(pending[0].next_attempt_at > Utc::now());

        // Not due yet
        let report = ctx.engine.flush_outbox().await.unwrap();
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_flush_drops_entries_in_local_mode() {
        let ctx = setup(SyncMode::Cloud).await;
        ctx.remote.fail_writes(Collection::Guests, offline());
        ctx.engine
            .save_values(Collection::Guests, vec![item("g1")])
            .await
            .unwrap();

        let mut settings = ctx.engine.settings().get_settings().await;
        settings.mode = SyncMode::Local;
        ctx.engine.settings().save_settings(settings).await.unwrap();

        let report = ctx.engine.flush_outbox().await.unwrap();
        assert_eq!(report.dropped, vec![Collection::Guests]);
        assert!(ctx.engine.pending_pushes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flush_drops_on_permission_denied() {
        let ctx = setup(SyncMode::Cloud).await;
        ctx.remote.fail_writes(Collection::Bookings, offline());
        ctx.engine
            .save_values(Collection::Bookings, vec![item("b1")])
            .await
            .unwrap();

        ctx.remote.fail_writes(
            Collection::Bookings,
            RemoteError::PermissionDenied("bookings".into()),
        );
        let report = ctx.engine.flush_outbox().await.unwrap();

        assert_eq!(report.dropped, vec![Collection::Bookings]);
        assert!(ctx.engine.pending_pushes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_worker_pushes_queued_collection() {
        let ctx = setup(SyncMode::Cloud).await;
        ctx.engine
            .store()
            .bulk_add(Collection::Maintenance, vec![item("m1")])
            .await
            .unwrap();
        ctx.engine
            .store()
            .outbox_upsert(Collection::Maintenance, "left from last run")
            .await
            .unwrap();

        let worker = ctx.engine.spawn_outbox_worker(Duration::from_millis(50));

        let mut synced = false;
        for _ in 0..50 {
            if ctx.remote.get(Collection::Maintenance) == vec![item("m1")] {
                synced = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        worker.shutdown().await;

        assert!(synced);
        assert!(ctx.engine.pending_pushes().await.unwrap().is_empty());
    }
}
