// Persistent task queue backed by the task_queue table
//
// Dequeue order is priority DESC then insertion order among eligible rows
// (status pending, scheduled_at due). Failed rows are re-pended with an
// exponentially growing delay until max_retries is exhausted.

use std::time::Duration;

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::QueueRow;

/// Options for enqueueing a payload
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    pub priority: i64,
    pub max_retries: i64,
    /// Earliest eligibility is `now + delay`
    pub delay: Duration,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            priority: 0,
            max_retries: 3,
            delay: Duration::ZERO,
        }
    }
}

/// Outcome of failing a queue row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOutcome {
    /// Row re-pended; eligible again after `delay_secs`
    Retrying { retry_count: i64, delay_secs: u64 },

    /// Retries exhausted; row is terminal
    Exhausted,
}

/// Queue counters by row status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

/// FIFO-by-priority persistent queue
#[derive(Clone)]
pub struct TaskQueue {
    pool: SqlitePool,
}

impl TaskQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a pending row. Returns false when `task_id` already exists;
    /// callers must treat that as an internal error (double submission).
    #[instrument(skip(self, payload, options))]
    pub async fn enqueue(
        &self,
        task_id: Uuid,
        payload: &serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<bool, StoreError> {
        let now = Utc::now();
        let scheduled_at = now + chrono::Duration::from_std(options.delay).unwrap_or_default();

        let inserted = sqlx::query(
            r#"
            INSERT INTO task_queue (task_id, priority, payload, max_retries, scheduled_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(task_id) DO NOTHING
            "#,
        )
        .bind(task_id)
        .bind(options.priority)
        .bind(payload)
        .bind(options.max_retries)
        .bind(scheduled_at)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            warn!(%task_id, "enqueue collision");
            return Ok(false);
        }

        debug!(%task_id, priority = options.priority, "enqueued");
        Ok(true)
    }

    /// Atomically take the single most eligible pending row and flip it to
    /// processing. Returns None when nothing is due.
    #[instrument(skip(self))]
    pub async fn dequeue(&self) -> Result<Option<QueueRow>, StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, QueueRow>(
            r#"
            SELECT id, task_id, priority, payload, max_retries, retry_count,
                   status, scheduled_at, started_at, completed_at, created_at
            FROM task_queue
            WHERE status = 'pending' AND scheduled_at <= ?
            ORDER BY priority DESC, created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut row) = row else {
            return Ok(None);
        };

        sqlx::query("UPDATE task_queue SET status = 'processing', started_at = ? WHERE id = ?")
            .bind(now)
            .bind(row.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        row.status = "processing".to_string();
        row.started_at = Some(now);
        debug!(task_id = %row.task_id, "dequeued");
        Ok(Some(row))
    }

    /// Mark a row completed
    #[instrument(skip(self))]
    pub async fn complete(&self, task_id: Uuid) -> Result<(), StoreError> {
        let affected = sqlx::query(
            "UPDATE task_queue SET status = 'completed', completed_at = ? WHERE task_id = ?",
        )
        .bind(Utc::now())
        .bind(task_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(StoreError::NotFound(task_id));
        }
        Ok(())
    }

    /// Fail a row: re-pend with exponential delay while retries remain,
    /// otherwise transition to failed.
    ///
    /// The delay after the n-th failure is 2^n seconds, so a row with
    /// max_retries 3 observes delays of 2 s and 4 s before going terminal.
    #[instrument(skip(self))]
    pub async fn fail(&self, task_id: Uuid, error: &str) -> Result<FailOutcome, StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT retry_count, max_retries FROM task_queue WHERE task_id = ?",
        )
        .bind(task_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound(task_id))?;

        let retry_count: i64 = row.get("retry_count");
        let max_retries: i64 = row.get("max_retries");

        let outcome = if retry_count + 1 < max_retries {
            let retry_count = retry_count + 1;
            let delay_secs = 2u64.saturating_pow(retry_count.min(u32::MAX as i64) as u32);
            let scheduled_at = now + chrono::Duration::seconds(delay_secs as i64);

            sqlx::query(
                r#"
                UPDATE task_queue
                SET status = 'pending', retry_count = ?, scheduled_at = ?, started_at = NULL
                WHERE task_id = ?
                "#,
            )
            .bind(retry_count)
            .bind(scheduled_at)
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

            warn!(%task_id, retry_count, delay_secs, error, "queue row failed, retrying");
            FailOutcome::Retrying {
                retry_count,
                delay_secs,
            }
        } else {
            sqlx::query(
                "UPDATE task_queue SET status = 'failed', completed_at = ? WHERE task_id = ?",
            )
            .bind(now)
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

            warn!(%task_id, error, "queue row failed permanently");
            FailOutcome::Exhausted
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Counters by status
    pub async fn stats(&self) -> Result<QueueStats, StoreError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM task_queue GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut stats = QueueStats::default();
        for row in rows {
            let n: i64 = row.get("n");
            match row.get::<String, _>("status").as_str() {
                "pending" => stats.pending = n,
                "processing" => stats.processing = n,
                "completed" => stats.completed = n,
                "failed" => stats.failed = n,
                _ => {}
            }
        }
        Ok(stats)
    }

    /// Delete terminal rows whose completed_at is older than `age`.
    /// Safe to run concurrently with enqueue/dequeue.
    #[instrument(skip(self))]
    pub async fn cleanup(&self, age: Duration) -> Result<u64, StoreError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(age).unwrap_or_default();

        let deleted = sqlx::query(
            r#"
            DELETE FROM task_queue
            WHERE status IN ('completed', 'failed') AND completed_at <= ?
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if deleted > 0 {
            debug!(deleted, "queue cleanup");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::Database;
    use serde_json::json;

    async fn queue() -> TaskQueue {
        let db = Database::in_memory().await.unwrap();
        TaskQueue::new(db.pool().clone())
    }

    fn payload(n: u32) -> serde_json::Value {
        json!({ "n": n })
    }

    #[tokio::test]
    async fn dequeue_is_fifo_within_priority() {
        let q = queue().await;
        let first = Uuid::now_v7();
        let second = Uuid::now_v7();
        q.enqueue(first, &payload(1), EnqueueOptions::default()).await.unwrap();
        q.enqueue(second, &payload(2), EnqueueOptions::default()).await.unwrap();

        assert_eq!(q.dequeue().await.unwrap().unwrap().task_id, first);
        assert_eq!(q.dequeue().await.unwrap().unwrap().task_id, second);
        assert!(q.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn higher_priority_wins_regardless_of_insertion_order() {
        let q = queue().await;
        let low = Uuid::now_v7();
        let high = Uuid::now_v7();
        q.enqueue(low, &payload(1), EnqueueOptions::default()).await.unwrap();
        q.enqueue(
            high,
            &payload(2),
            EnqueueOptions {
                priority: 10,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(q.dequeue().await.unwrap().unwrap().task_id, high);
        assert_eq!(q.dequeue().await.unwrap().unwrap().task_id, low);
    }

    #[tokio::test]
    async fn delayed_rows_are_not_eligible() {
        let q = queue().await;
        q.enqueue(
            Uuid::now_v7(),
            &payload(1),
            EnqueueOptions {
                delay: Duration::from_secs(3600),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(q.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn enqueue_collision_returns_false() {
        let q = queue().await;
        let id = Uuid::now_v7();
        assert!(q.enqueue(id, &payload(1), EnqueueOptions::default()).await.unwrap());
        assert!(!q.enqueue(id, &payload(2), EnqueueOptions::default()).await.unwrap());
    }

    #[tokio::test]
    async fn fail_backs_off_exponentially_then_goes_terminal() {
        let q = queue().await;
        let id = Uuid::now_v7();
        q.enqueue(id, &payload(1), EnqueueOptions::default()).await.unwrap();
        q.dequeue().await.unwrap().unwrap();

        // max_retries = 3: delays 2 s then 4 s, then terminal
        let before = Utc::now();
        let outcome = q.fail(id, "boom").await.unwrap();
        assert_eq!(
            outcome,
            FailOutcome::Retrying {
                retry_count: 1,
                delay_secs: 2
            }
        );
        let row = fetch(&q, id).await;
        assert_eq!(row.status, "pending");
        let delta = (row.scheduled_at - before).num_milliseconds();
        assert!((1900..=2500).contains(&delta), "delay was {}ms", delta);

        // Not yet eligible
        assert!(q.dequeue().await.unwrap().is_none());

        let outcome = q.fail(id, "boom").await.unwrap();
        assert_eq!(
            outcome,
            FailOutcome::Retrying {
                retry_count: 2,
                delay_secs: 4
            }
        );

        let outcome = q.fail(id, "boom").await.unwrap();
        assert_eq!(outcome, FailOutcome::Exhausted);
        let row = fetch(&q, id).await;
        assert_eq!(row.status, "failed");
        assert!(row.completed_at.is_some());
        assert_eq!(row.retry_count, 2);
    }

    #[tokio::test]
    async fn complete_sets_completed_at() {
        let q = queue().await;
        let id = Uuid::now_v7();
        q.enqueue(id, &payload(1), EnqueueOptions::default()).await.unwrap();
        q.dequeue().await.unwrap().unwrap();
        q.complete(id).await.unwrap();

        let row = fetch(&q, id).await;
        assert_eq!(row.status, "completed");
        assert!(row.completed_at.is_some());
    }

    #[tokio::test]
    async fn stats_count_by_status() {
        let q = queue().await;
        let done = Uuid::now_v7();
        q.enqueue(done, &payload(1), EnqueueOptions::default()).await.unwrap();
        q.enqueue(Uuid::now_v7(), &payload(2), EnqueueOptions::default()).await.unwrap();
        q.dequeue().await.unwrap().unwrap();
        q.complete(done).await.unwrap();

        let stats = q.stats().await.unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.processing, 0);
    }

    #[tokio::test]
    async fn cleanup_deletes_old_terminal_rows_only() {
        let q = queue().await;
        let done = Uuid::now_v7();
        let live = Uuid::now_v7();
        q.enqueue(done, &payload(1), EnqueueOptions::default()).await.unwrap();
        q.enqueue(live, &payload(2), EnqueueOptions::default()).await.unwrap();
        q.dequeue().await.unwrap().unwrap();
        q.complete(done).await.unwrap();

        let deleted = q.cleanup(Duration::ZERO).await.unwrap();
        assert_eq!(deleted, 1);

        let stats = q.stats().await.unwrap();
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.pending, 1);
    }

    async fn fetch(q: &TaskQueue, task_id: Uuid) -> QueueRow {
        sqlx::query_as::<_, QueueRow>(
            r#"
            SELECT id, task_id, priority, payload, max_retries, retry_count,
                   status, scheduled_at, started_at, completed_at, created_at
            FROM task_queue
            WHERE task_id = ?
            "#,
        )
        .bind(task_id)
        .fetch_one(&q.pool)
        .await
        .unwrap()
    }
}
