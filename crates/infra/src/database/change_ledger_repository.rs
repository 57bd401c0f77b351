//! SQLite-backed reads of the append-only change ledger.
//!
//! Rows are only ever written by [`super::SqliteReconciliationStore`], inside
//! the same transaction as the meeting update they describe.

use std::sync::Arc;

use async_trait::async_trait;
use meetsync_core::ChangeLedger;
use meetsync_domain::{ChangeOrder, ChangeQuery, MeetingChange, Result};
use rusqlite::params;
use tokio::task;

use super::manager::DbManager;
use super::rows::{load_latest_change, map_change_row, map_join_error, to_millis, CHANGE_COLUMNS};
use crate::errors::conversions::to_domain;

pub struct SqliteChangeLedger {
    db: Arc<DbManager>,
}

impl SqliteChangeLedger {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

fn page_sql(order: ChangeOrder, has_cursor: bool) -> String {
    let (cmp, dir) = match order {
        ChangeOrder::Asc => (">", "ASC"),
        ChangeOrder::Desc => ("<", "DESC"),
    };
    let cursor = if has_cursor {
        format!(" AND (created_at {cmp} ?2 OR (created_at = ?2 AND seq {cmp} ?3))")
    } else {
        String::new()
    };
    format!(
        "SELECT {CHANGE_COLUMNS} FROM meeting_changes WHERE meeting_id = ?1{cursor}
         ORDER BY created_at {dir}, seq {dir} LIMIT ?4"
    )
}

#[async_trait]
impl ChangeLedger for SqliteChangeLedger {
    async fn list_changes(
        &self,
        meeting_id: &str,
        query: &ChangeQuery,
    ) -> Result<Vec<MeetingChange>> {
        let db = Arc::clone(&self.db);
        let meeting_id = meeting_id.to_string();
        let query = *query;

        task::spawn_blocking(move || -> Result<Vec<MeetingChange>> {
            let conn = db.get_connection()?;
            let (after_ts, after_seq) = query
                .after
                .map_or((0, 0), |cursor| (to_millis(cursor.created_at), cursor.seq));
            let mut stmt =
                conn.prepare(&page_sql(query.order, query.after.is_some())).map_err(to_domain)?;
            let rows = stmt
                .query_map(
                    params![meeting_id, after_ts, after_seq, i64::from(query.limit)],
                    map_change_row,
                )
                .map_err(to_domain)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(to_domain)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn latest_change(&self, meeting_id: &str) -> Result<Option<MeetingChange>> {
        let db = Arc::clone(&self.db);
        let meeting_id = meeting_id.to_string();

        task::spawn_blocking(move || -> Result<Option<MeetingChange>> {
            let conn = db.get_connection()?;
            load_latest_change(&conn, &meeting_id)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_clause_follows_order() {
        let asc = page_sql(ChangeOrder::Asc, true);
        assert!(asc.contains("created_at > ?2"));
        assert!(asc.contains("ORDER BY created_at ASC, seq ASC"));

        let desc = page_sql(ChangeOrder::Desc, false);
        assert!(!desc.contains("?2"));
        assert!(desc.contains("ORDER BY created_at DESC, seq DESC"));
    }
}
