//! Offline queue: operations meant for a remote instance are stored locally
//! and replayed in order when the remote is reachable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::database::db::queries;
use crate::database::models::{PendingOp, QueueStatus, QueuedOp};
use crate::error::{FinanceError, Result};

/// Body of `POST /api/sync`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub ops: Vec<PendingOp>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    pub applied: usize,
    pub skipped: usize,
}

/// Where queued operations are delivered.
#[async_trait]
pub trait SyncTarget: Send + Sync {
    async fn push(&self, op: &PendingOp) -> Result<()>;
}

pub struct HttpSyncTarget {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSyncTarget {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

#[async_trait]
impl SyncTarget for HttpSyncTarget {
    async fn push(&self, op: &PendingOp) -> Result<()> {
        let url = format!("{}/api/sync", self.base_url);
        let body = SyncRequest { ops: vec![op.clone()] };

        let resp = self.client.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            // a 4xx will not get better by sending the same payload again
            if status.is_client_error() {
                return Err(FinanceError::InvalidInput(format!("remote rejected op: HTTP {status} - {text}")));
            }
            return Err(FinanceError::Sync(format!("HTTP {status} - {text}")));
        }
        let summary: SyncResponse = resp.json().await?;
        debug!(applied = summary.applied, skipped = summary.skipped, "remote accepted op");
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub sent: usize,
    /// Entries that hit the attempt cap during this drain.
    pub dead: usize,
    pub remaining: i64,
    pub last_error: Option<String>,
}

#[derive(Clone)]
pub struct OfflineQueue {
    pool: Pool<Sqlite>,
    max_attempts: u32,
}

impl OfflineQueue {
    pub fn new(pool: Pool<Sqlite>, max_attempts: u32) -> Self {
        Self {
            pool,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn enqueue(&self, op: &PendingOp) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        let seq = queries::enqueue_op(&mut conn, op).await?;
        debug!(seq, "operation queued");
        Ok(seq)
    }

    pub async fn entries(&self) -> Result<Vec<QueuedOp>> {
        let mut conn = self.pool.acquire().await?;
        Ok(queries::list_ops(&mut conn).await?)
    }

    pub async fn pending(&self) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        Ok(queries::count_pending_ops(&mut conn).await?)
    }

    /// Sends pending entries oldest first, one at a time. A failure stops the
    /// drain so later entries never overtake an earlier one; an entry that
    /// reaches `max_attempts` is marked dead and the drain moves past it.
    pub async fn drain(&self, target: &dyn SyncTarget) -> Result<DrainReport> {
        let mut report = DrainReport::default();
        let mut conn = self.pool.acquire().await?;

        while let Some(entry) = queries::next_pending_op(&mut conn).await? {
            match target.push(&entry.op).await {
                Ok(()) => {
                    queries::remove_op(&mut conn, entry.seq).await?;
                    report.sent += 1;
                }
                Err(e) => {
                    let attempts = entry.attempts + 1;
                    let message = e.to_string();
                    let give_up = attempts >= self.max_attempts || !e.is_retryable();
                    let status = if give_up { QueueStatus::Dead } else { QueueStatus::Pending };
                    queries::record_op_failure(&mut conn, entry.seq, attempts, &message, status).await?;
                    report.last_error = Some(message.clone());

                    if give_up {
                        warn!(seq = entry.seq, attempts, error = %message, "queued operation dropped");
                        report.dead += 1;
                        continue;
                    }
                    warn!(seq = entry.seq, attempts, error = %message, "sync paused");
                    break;
                }
            }
        }

        report.remaining = queries::count_pending_ops(&mut conn).await?;
        info!(sent = report.sent, dead = report.dead, remaining = report.remaining, "queue drained");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::db::{connection, migrate};
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Fails every push whose id is in `failing`, records the rest.
    #[derive(Default)]
    struct RecordingTarget {
        delivered: Mutex<Vec<Uuid>>,
        failing: Vec<Uuid>,
        fatal: bool,
    }

    #[async_trait]
    impl SyncTarget for RecordingTarget {
        async fn push(&self, op: &PendingOp) -> Result<()> {
            let PendingOp::DeleteTransaction { id } = op else {
                return Ok(());
            };
            if self.failing.contains(id) {
                return Err(if self.fatal {
                    FinanceError::InvalidInput("malformed".into())
                } else {
                    FinanceError::Sync("offline".into())
                });
            }
            self.delivered.lock().unwrap().push(*id);
            Ok(())
        }
    }

    async fn queue(max_attempts: u32) -> OfflineQueue {
        let pool = connection::get_db_pool("sqlite::memory:").await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        OfflineQueue::new(pool, max_attempts)
    }

    async fn push_ids(queue: &OfflineQueue, n: usize) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for _ in 0..n {
            let id = Uuid::new_v4();
            queue.enqueue(&PendingOp::DeleteTransaction { id }).await.unwrap();
            ids.push(id);
        }
        ids
    }

    #[tokio::test]
    async fn drains_in_fifo_order() {
        let queue = queue(3).await;
        let ids = push_ids(&queue, 3).await;
        let target = RecordingTarget::default();

        let report = queue.drain(&target).await.unwrap();
        assert_eq!(report.sent, 3);
        assert_eq!(report.remaining, 0);
        assert_eq!(*target.delivered.lock().unwrap(), ids);
    }

    #[tokio::test]
    async fn failure_stops_the_drain_and_keeps_order() {
        let queue = queue(3).await;
        let ids = push_ids(&queue, 3).await;
        let target = RecordingTarget { failing: vec![ids[1]], ..Default::default() };

        let report = queue.drain(&target).await.unwrap();
        assert_eq!(report.sent, 1);
        assert_eq!(report.remaining, 2);
        assert_eq!(*target.delivered.lock().unwrap(), vec![ids[0]]);

        let entries = queue.entries().await.unwrap();
        assert_eq!(entries[0].attempts, 1);
        assert_eq!(entries[0].status, QueueStatus::Pending);
        assert_eq!(entries[1].attempts, 0);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let queue = queue(2).await;
        let ids = push_ids(&queue, 2).await;
        let target = RecordingTarget { failing: vec![ids[0]], ..Default::default() };

        let first = queue.drain(&target).await.unwrap();
        assert_eq!((first.sent, first.dead), (0, 0));

        let second = queue.drain(&target).await.unwrap();
        assert_eq!((second.sent, second.dead, second.remaining), (1, 1, 0));
        assert_eq!(*target.delivered.lock().unwrap(), vec![ids[1]]);

        let entries = queue.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, QueueStatus::Dead);
        assert_eq!(entries[0].attempts, 2);
    }

    #[tokio::test]
    async fn non_retryable_errors_are_dropped_immediately() {
        let queue = queue(10).await;
        let ids = push_ids(&queue, 2).await;
        let target = RecordingTarget { failing: vec![ids[0]], fatal: true, ..Default::default() };

        let report = queue.drain(&target).await.unwrap();
        assert_eq!((report.sent, report.dead), (1, 1));
        assert_eq!(queue.pending().await.unwrap(), 0);
    }
}
