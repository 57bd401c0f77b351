//! SQLite-backed implementation of the calendar integration port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meetsync_core::IntegrationRepository;
use meetsync_domain::{
    CalendarIntegration, IntegrationSyncState, MeetSyncError, NewIntegration, Result,
};
use rusqlite::{params, OptionalExtension};
use tokio::task;
use tracing::{info, instrument};
use uuid::Uuid;

use super::manager::DbManager;
use super::rows::{map_integration_row, map_join_error, to_millis, INTEGRATION_COLUMNS};
use crate::errors::conversions::to_domain;

/// Stored `last_error` is truncated to this many characters.
const MAX_ERROR_LEN: usize = 500;

pub struct SqliteIntegrationRepository {
    db: Arc<DbManager>,
}

impl SqliteIntegrationRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn execute(&self, sql: &'static str, params: Vec<rusqlite::types::Value>) -> Result<usize> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<usize> {
            let conn = db.get_connection()?;
            conn.execute(sql, rusqlite::params_from_iter(params)).map_err(to_domain)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl IntegrationRepository for SqliteIntegrationRepository {
    #[instrument(skip(self, new), fields(provider = %new.provider, calendar_id = %new.calendar_id))]
    async fn create_integration(&self, new: &NewIntegration) -> Result<CalendarIntegration> {
        if new.access_token.is_empty() {
            return Err(MeetSyncError::InvalidInput("access_token must not be empty".into()));
        }
        let integration = CalendarIntegration {
            id: Uuid::now_v7().to_string(),
            user_id: new.user_id.clone(),
            provider: new.provider.clone(),
            calendar_id: new.calendar_id.clone(),
            is_active: true,
            access_token: new.access_token.clone(),
            last_synced_at: None,
            sync_state: IntegrationSyncState::Healthy,
            last_error: None,
            last_error_at: None,
            created_at: Utc::now(),
        };

        let db = Arc::clone(&self.db);
        let row = integration.clone();
        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO calendar_integrations (id, user_id, provider, calendar_id,
                     access_token, is_active, sync_state, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)",
                params![
                    row.id,
                    row.user_id,
                    row.provider,
                    row.calendar_id,
                    row.access_token,
                    row.sync_state.as_str(),
                    to_millis(row.created_at),
                ],
            )
            .map_err(to_domain)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)??;

        info!(integration_id = %integration.id, "Calendar integration connected");
        Ok(integration)
    }

    async fn get_integration(&self, id: &str) -> Result<Option<CalendarIntegration>> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> Result<Option<CalendarIntegration>> {
            let conn = db.get_connection()?;
            conn.query_row(
                &format!("SELECT {INTEGRATION_COLUMNS} FROM calendar_integrations WHERE id = ?1"),
                [&id],
                map_integration_row,
            )
            .optional()
            .map_err(to_domain)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_active_integrations(&self) -> Result<Vec<CalendarIntegration>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<CalendarIntegration>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {INTEGRATION_COLUMNS} FROM calendar_integrations
                     WHERE is_active = 1 ORDER BY created_at ASC, id ASC"
                ))
                .map_err(to_domain)?;
            let rows = stmt.query_map([], map_integration_row).map_err(to_domain)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(to_domain)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn is_active(&self, id: &str) -> Result<bool> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> Result<bool> {
            let conn = db.get_connection()?;
            let active: Option<i64> = conn
                .query_row(
                    "SELECT is_active FROM calendar_integrations WHERE id = ?1",
                    [&id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(to_domain)?;
            Ok(active == Some(1))
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    async fn deactivate(&self, id: &str) -> Result<bool> {
        let updated = self
            .execute(
                "UPDATE calendar_integrations SET is_active = 0 WHERE id = ?1",
                vec![id.to_string().into()],
            )
            .await?;
        if updated > 0 {
            info!(integration_id = id, "Calendar integration deactivated");
        }
        Ok(updated > 0)
    }

    async fn record_sync_success(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.execute(
            "UPDATE calendar_integrations
             SET sync_state = 'healthy', last_synced_at = ?2, last_error = NULL
             WHERE id = ?1 AND is_active = 1",
            vec![id.to_string().into(), to_millis(at).into()],
        )
        .await?;
        Ok(())
    }

    async fn record_sync_failure(
        &self,
        id: &str,
        state: IntegrationSyncState,
        error: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let detail: String = error.chars().take(MAX_ERROR_LEN).collect();
        self.execute(
            "UPDATE calendar_integrations
             SET sync_state = ?2, last_error = ?3, last_error_at = ?4
             WHERE id = ?1",
            vec![
                id.to_string().into(),
                state.as_str().to_string().into(),
                detail.into(),
                to_millis(at).into(),
            ],
        )
        .await?;
        Ok(())
    }
}
