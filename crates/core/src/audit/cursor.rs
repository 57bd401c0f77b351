//! Opaque paging cursors.
//!
//! A cursor is `"{created_at_millis}:{seq}"`, base64url-encoded without
//! padding, so clients cannot depend on its shape.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use meetsync_domain::{ChangeCursor, MeetSyncError, Result};

pub fn encode_cursor(cursor: &ChangeCursor) -> String {
    URL_SAFE_NO_PAD.encode(format!("{}:{}", cursor.created_at.timestamp_millis(), cursor.seq))
}

pub fn decode_cursor(raw: &str) -> Result<ChangeCursor> {
    let invalid = || MeetSyncError::InvalidInput("invalid cursor".to_string());
    let bytes = URL_SAFE_NO_PAD.decode(raw).map_err(|_| invalid())?;
    let text = String::from_utf8(bytes).map_err(|_| invalid())?;
    let (millis, seq) = text.split_once(':').ok_or_else(invalid)?;
    let millis = millis.parse::<i64>().map_err(|_| invalid())?;
    let seq = seq.parse::<i64>().map_err(|_| invalid())?;
    let created_at = DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(invalid)?;
    Ok(ChangeCursor { created_at, seq })
}
