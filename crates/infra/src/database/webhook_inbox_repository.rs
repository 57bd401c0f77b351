//! SQLite-backed implementation of the webhook inbox port.
//!
//! Claims are lease-based: an entry stuck in `processing` past its lease
//! (worker crash, timeout) is claimable again, so processing is
//! at-least-once and relies on the applier being idempotent.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use meetsync_core::WebhookInbox;
use meetsync_domain::{InboxEntry, InboxStatus, MeetSyncError, Result, WebhookDelivery};
use rusqlite::{params, TransactionBehavior};
use tokio::task;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::manager::DbManager;
use super::rows::{map_inbox_row, map_join_error, to_millis, INBOX_COLUMNS};
use crate::errors::conversions::to_domain;

pub struct SqliteWebhookInbox {
    db: Arc<DbManager>,
}

impl SqliteWebhookInbox {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Number of entries in `status`.
    pub async fn count_by_status(&self, status: InboxStatus) -> Result<u64> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<u64> {
            let conn = db.get_connection()?;
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM webhook_inbox WHERE status = ?1",
                    [status.as_str()],
                    |row| row.get(0),
                )
                .map_err(to_domain)?;
            Ok(u64::try_from(count).unwrap_or_default())
        })
        .await
        .map_err(map_join_error)?
    }

    /// Fetch one entry by id.
    pub async fn get(&self, id: &str) -> Result<Option<InboxEntry>> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();
        task::spawn_blocking(move || -> Result<Option<InboxEntry>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(&format!("SELECT {INBOX_COLUMNS} FROM webhook_inbox WHERE id = ?1"))
                .map_err(to_domain)?;
            let mut rows = stmt.query_map([&id], map_inbox_row).map_err(to_domain)?;
            rows.next().transpose().map_err(to_domain)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update(&self, id: &str, sql: &'static str, params: Vec<rusqlite::types::Value>) -> Result<()> {
        let db = Arc::clone(&self.db);
        let entry_id = id.to_string();
        let updated = task::spawn_blocking(move || -> Result<usize> {
            let conn = db.get_connection()?;
            conn.execute(sql, rusqlite::params_from_iter(params)).map_err(to_domain)
        })
        .await
        .map_err(map_join_error)??;

        if updated == 0 {
            warn!(entry_id = %entry_id, "Inbox entry not found");
            return Err(MeetSyncError::NotFound(format!("inbox entry {entry_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl WebhookInbox for SqliteWebhookInbox {
    #[instrument(skip(self, delivery, raw_payload), fields(event_id = %delivery.event_id()))]
    async fn enqueue(
        &self,
        delivery: &WebhookDelivery,
        raw_payload: &serde_json::Value,
        received_at: DateTime<Utc>,
    ) -> Result<InboxEntry> {
        let entry = InboxEntry {
            id: Uuid::now_v7().to_string(),
            received_at,
            event_id: delivery.event_id().to_string(),
            delivery: delivery.clone(),
            raw_payload: raw_payload.clone(),
            status: InboxStatus::Pending,
            attempts: 0,
            next_attempt_at: received_at,
            lease_expires_at: None,
            last_error: None,
        };
        let delivery_json = serde_json::to_string(&entry.delivery).map_err(to_domain)?;
        let payload_json = serde_json::to_string(&entry.raw_payload).map_err(to_domain)?;

        let db = Arc::clone(&self.db);
        let row = entry.clone();
        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO webhook_inbox (id, event_id, delivery, raw_payload, status,
                     attempts, next_attempt_at, received_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', 0, ?5, ?6)",
                params![
                    row.id,
                    row.event_id,
                    delivery_json,
                    payload_json,
                    to_millis(row.next_attempt_at),
                    to_millis(row.received_at),
                ],
            )
            .map_err(to_domain)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)??;

        debug!(entry_id = %entry.id, "Webhook delivery queued");
        Ok(entry)
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
        lease: Duration,
    ) -> Result<Vec<InboxEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let db = Arc::clone(&self.db);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let now_ms = to_millis(now);
        let lease_until = to_millis(now + lease);

        task::spawn_blocking(move || -> Result<Vec<InboxEntry>> {
            let mut conn = db.get_connection()?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(to_domain)?;

            let ids = {
                let mut stmt = tx
                    .prepare(
                        "SELECT id FROM webhook_inbox
                         WHERE (status = 'pending' AND next_attempt_at <= ?1)
                            OR (status = 'processing' AND lease_expires_at <= ?1)
                         ORDER BY next_attempt_at ASC, received_at ASC
                         LIMIT ?2",
                    )
                    .map_err(to_domain)?;
                let rows = stmt
                    .query_map(params![now_ms, limit], |row| row.get::<_, String>(0))
                    .map_err(to_domain)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(to_domain)?
            };

            let mut claimed = Vec::with_capacity(ids.len());
            for id in ids {
                tx.execute(
                    "UPDATE webhook_inbox
                     SET status = 'processing', attempts = attempts + 1, lease_expires_at = ?2
                     WHERE id = ?1",
                    params![id, lease_until],
                )
                .map_err(to_domain)?;
                let entry = tx
                    .query_row(
                        &format!("SELECT {INBOX_COLUMNS} FROM webhook_inbox WHERE id = ?1"),
                        [&id],
                        map_inbox_row,
                    )
                    .map_err(to_domain)?;
                claimed.push(entry);
            }

            tx.commit().map_err(to_domain)?;
            Ok(claimed)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_done(&self, id: &str) -> Result<()> {
        self.update(
            id,
            "UPDATE webhook_inbox SET status = 'done', lease_expires_at = NULL WHERE id = ?1",
            vec![id.to_string().into()],
        )
        .await
    }

    async fn mark_retry(
        &self,
        id: &str,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<()> {
        self.update(
            id,
            "UPDATE webhook_inbox
             SET status = 'pending', lease_expires_at = NULL, last_error = ?2, next_attempt_at = ?3
             WHERE id = ?1",
            vec![id.to_string().into(), error.to_string().into(), to_millis(next_attempt_at).into()],
        )
        .await
    }

    async fn dead_letter(&self, id: &str, error: &str) -> Result<()> {
        self.update(
            id,
            "UPDATE webhook_inbox
             SET status = 'dead_letter', lease_expires_at = NULL, last_error = ?2
             WHERE id = ?1",
            vec![id.to_string().into(), error.to_string().into()],
        )
        .await
    }
}
