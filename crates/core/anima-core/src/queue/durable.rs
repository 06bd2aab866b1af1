//! SQLite-backed durable event queue
//!
//! Events survive process restarts and are served in creation order. A
//! record that no longer decodes is dropped with a warning instead of
//! wedging the head of the queue.
//!
//! Claims run on their own task and are never cancelled halfway. A claimed
//! event whose caller went away before receiving it is written back with
//! its original id and creation time.

use crate::config::DurableQueueConfig;
use crate::shutdown::{wait_for_shutdown, ShutdownReceiver};
use crate::types::{Event, EventPayload, EventType};
use crate::{AnimaError, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Durable FIFO event queue over SQLite
pub struct DurableEventQueue {
    pool: SqlitePool,
    inserted: Arc<Notify>,
}

impl DurableEventQueue {
    /// Open (creating if needed) the queue database described by `config`
    pub async fn connect(config: &DurableQueueConfig) -> Result<Self> {
        info!("Opening durable event queue at: {}", config.database_url);

        let in_memory = config.database_url.contains(":memory:");
        let mut opts = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(|e| AnimaError::database(format!("Invalid SQLite URL: {}", e)))?
            .create_if_missing(true);
        if !in_memory {
            opts = opts.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to ":memory:" is its own database.
        let max_connections = if in_memory {
            1
        } else {
            config.max_connections.max(1)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the queue table if missing
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let queue = Self {
            pool,
            inserted: Arc::new(Notify::new()),
        };
        queue.init_schema().await?;
        Ok(queue)
    }

    async fn init_schema(&self) -> Result<()> {
        debug!("Initializing durable queue schema...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS durable_events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                source TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_durable_events_order ON durable_events(created_at, seq)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Persist an event; it is visible to consumers once this returns
    pub async fn offer(&self, event: &Event) -> Result<()> {
        store_event(&self.pool, event).await?;
        debug!(event_id = %event.id(), event_type = %event.event_type(), "durable event stored");
        self.inserted.notify_waiters();
        Ok(())
    }

    /// Persist a record from already-encoded parts, stamped with the current
    /// time
    ///
    /// Nothing is validated here; records that fail to decode are dropped
    /// when they reach the head of the queue.
    pub async fn offer_raw(&self, event_type: &str, payload_json: &str, source: &str) -> Result<()> {
        let event_id = Uuid::new_v4().to_string();
        insert_record(
            &self.pool,
            &event_id,
            event_type,
            payload_json,
            source,
            Utc::now().timestamp_micros(),
        )
        .await?;
        debug!(event_id, event_type, "raw durable record stored");
        self.inserted.notify_waiters();
        Ok(())
    }

    /// Claim and remove the oldest decodable event without waiting
    pub async fn try_take(&self) -> Result<Option<Event>> {
        let pool = self.pool.clone();
        let inserted = self.inserted.clone();
        let claim = tokio::spawn(async move {
            let head = claim_head(&pool).await?;
            Ok::<_, AnimaError>(head.map(|event| ClaimedEvent {
                event: Some(event),
                pool,
                inserted,
            }))
        });

        let claimed = claim
            .await
            .map_err(|e| AnimaError::database(format!("durable claim task failed: {}", e)))??;
        Ok(claimed.and_then(ClaimedEvent::into_event))
    }

    /// Wait until an event is available and claim it
    pub async fn take(&self) -> Result<Event> {
        loop {
            let notified = self.inserted.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(event) = self.try_take().await? {
                return Ok(event);
            }
            notified.await;
        }
    }

    /// Like [`take`](Self::take), but gives up with
    /// [`AnimaError::Interrupted`] when a shutdown signal arrives first
    ///
    /// Only the wait for new records is interrupted, never a claim in
    /// progress.
    pub async fn take_until(&self, shutdown: &mut ShutdownReceiver) -> Result<Event> {
        loop {
            match shutdown.try_recv() {
                Ok(signal) => return Err(interrupted(&format!("{:?}", signal))),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Lagged(_)) | Err(TryRecvError::Closed) => {
                    return Err(interrupted("closed"))
                }
            }

            let notified = self.inserted.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(event) = self.try_take().await? {
                return Ok(event);
            }

            tokio::select! {
                biased;
                signal = wait_for_shutdown(shutdown) => {
                    return Err(interrupted(&format!("{:?}", signal)));
                }
                _ = notified => {}
            }
        }
    }

    /// Like [`take`](Self::take), but returns `Ok(None)` once `timeout`
    /// elapses
    ///
    /// The deadline only bounds the wait for new records; a claim that has
    /// started always completes.
    pub async fn poll(&self, timeout: Duration) -> Result<Option<Event>> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.inserted.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(event) = self.try_take().await? {
                return Ok(Some(event));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    /// Number of stored records, including ones that may fail to decode
    pub async fn len(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM durable_events")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n.max(0) as u64)
    }

    /// Whether no records are stored
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Close the underlying pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl std::fmt::Debug for DurableEventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableEventQueue")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

/// An event removed from the store that goes back unless handed over
struct ClaimedEvent {
    event: Option<Event>,
    pool: SqlitePool,
    inserted: Arc<Notify>,
}

impl ClaimedEvent {
    fn into_event(mut self) -> Option<Event> {
        self.event.take()
    }
}

impl Drop for ClaimedEvent {
    fn drop(&mut self) {
        let Some(event) = self.event.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            error!(event_id = %event.id(), "claimed event dropped outside a runtime");
            return;
        };

        let pool = self.pool.clone();
        let inserted = self.inserted.clone();
        handle.spawn(async move {
            match store_event(&pool, &event).await {
                Ok(()) => {
                    debug!(event_id = %event.id(), "unclaimed event returned to durable queue");
                    inserted.notify_waiters();
                }
                Err(e) => error!(
                    event_id = %event.id(),
                    error = %e,
                    "failed to return unclaimed event to durable queue"
                ),
            }
        });
    }
}

fn interrupted(signal: &str) -> AnimaError {
    AnimaError::interrupted(format!("durable queue wait interrupted by {} shutdown", signal))
}

async fn store_event(pool: &SqlitePool, event: &Event) -> Result<()> {
    let payload_json = serde_json::to_string(event.payload())?;
    insert_record(
        pool,
        &event.id().to_string(),
        event.event_type().as_tag(),
        &payload_json,
        event.source(),
        event.created_at().timestamp_micros(),
    )
    .await
}

async fn insert_record(
    pool: &SqlitePool,
    event_id: &str,
    event_type: &str,
    payload_json: &str,
    source: &str,
    created_at: i64,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO durable_events (event_id, event_type, payload_json, source, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(event_id)
    .bind(event_type)
    .bind(payload_json)
    .bind(source)
    .bind(created_at)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

/// Delete and return the oldest decodable record, dropping poison rows on
/// the way
async fn claim_head(pool: &SqlitePool) -> Result<Option<Event>> {
    loop {
        let mut tx = pool.begin().await?;
        let row = sqlx::query(
            r#"
            DELETE FROM durable_events
            WHERE seq = (
                SELECT seq FROM durable_events ORDER BY created_at ASC, seq ASC LIMIT 1
            )
            RETURNING seq, event_id, event_type, payload_json, source, created_at
        "#,
        )
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;

        let Some(row) = row else {
            return Ok(None);
        };

        match decode_row(&row) {
            Ok(event) => return Ok(Some(event)),
            Err(reason) => {
                let seq: i64 = row.try_get("seq").unwrap_or(-1);
                warn!(seq, %reason, "dropping undecodable durable event");
            }
        }
    }
}

fn decode_row(row: &SqliteRow) -> std::result::Result<Event, String> {
    let event_id: String = row.try_get("event_id").map_err(|e| e.to_string())?;
    let tag: String = row.try_get("event_type").map_err(|e| e.to_string())?;
    let payload_json: String = row.try_get("payload_json").map_err(|e| e.to_string())?;
    let source: String = row.try_get("source").map_err(|e| e.to_string())?;
    let created_at: i64 = row.try_get("created_at").map_err(|e| e.to_string())?;

    let id = Uuid::parse_str(&event_id).map_err(|e| format!("bad event id: {}", e))?;
    let event_type =
        EventType::from_tag(&tag).ok_or_else(|| format!("unknown event type '{}'", tag))?;
    let payload: EventPayload =
        serde_json::from_str(&payload_json).map_err(|e| format!("bad payload: {}", e))?;
    let created_at = DateTime::<Utc>::from_timestamp_micros(created_at)
        .ok_or_else(|| format!("bad timestamp {}", created_at))?;

    Ok(Event::from_parts(id, event_type, payload, source, created_at))
}
