//! Webhook signature verification and payload decoding.
//!
//! The provider signs `"{timestamp}.{body}"` with HMAC-SHA256 using the
//! shared secret and sends `sha256=<hex>` in the signature header, with the
//! unix timestamp in its own header. Deliveries outside the tolerance window
//! are rejected to limit replay.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use meetsync_domain::constants::WEBHOOK_SIGNATURE_PREFIX;
use meetsync_domain::{MeetSyncError, Result, WebhookConfig, WebhookDelivery};
use sha2::Sha256;
use thiserror::Error;

use super::types::WebhookEnvelope;

type HmacSha256 = Hmac<Sha256>;

/// Why a delivery failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookRejection {
    #[error("webhook secret is not configured")]
    NotConfigured,
    #[error("missing signature header")]
    MissingSignature,
    #[error("missing timestamp header")]
    MissingTimestamp,
    #[error("timestamp header is not a unix timestamp")]
    InvalidTimestamp,
    #[error("timestamp outside the tolerance window")]
    Expired,
    #[error("signature does not match")]
    BadSignature,
}

impl From<WebhookRejection> for MeetSyncError {
    fn from(value: WebhookRejection) -> Self {
        MeetSyncError::Security(value.to_string())
    }
}

/// Verifies provider webhook signatures.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
    tolerance: Duration,
}

impl fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"[REDACTED]")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance: Duration) -> Self {
        Self { secret: secret.into().into_bytes(), tolerance }
    }

    pub fn from_config(config: &WebhookConfig) -> Self {
        Self::new(config.secret.clone(), Duration::seconds(config.tolerance_secs))
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> std::result::Result<HmacSha256, WebhookRejection> {
        if self.secret.is_empty() {
            return Err(WebhookRejection::NotConfigured);
        }
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret)
            .map_err(|_| WebhookRejection::NotConfigured)?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(mac)
    }

    /// Header value for `body` sent at `timestamp`.
    pub fn sign(&self, timestamp: i64, body: &[u8]) -> std::result::Result<String, WebhookRejection> {
        let mac = self.mac(&timestamp.to_string(), body)?;
        Ok(format!("{WEBHOOK_SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes())))
    }

    /// Check the signature and timestamp headers against `body`.
    pub fn verify(
        &self,
        signature: Option<&str>,
        timestamp: Option<&str>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> std::result::Result<(), WebhookRejection> {
        if self.secret.is_empty() {
            return Err(WebhookRejection::NotConfigured);
        }
        let signature = signature.map(str::trim).ok_or(WebhookRejection::MissingSignature)?;
        let timestamp = timestamp.map(str::trim).ok_or(WebhookRejection::MissingTimestamp)?;

        let sent_at = timestamp
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or(WebhookRejection::InvalidTimestamp)?;
        if (now - sent_at).abs() > self.tolerance {
            return Err(WebhookRejection::Expired);
        }

        let expected = signature
            .strip_prefix(WEBHOOK_SIGNATURE_PREFIX)
            .and_then(|digest| hex::decode(digest).ok())
            .ok_or(WebhookRejection::BadSignature)?;
        self.mac(timestamp, body)?
            .verify_slice(&expected)
            .map_err(|_| WebhookRejection::BadSignature)
    }
}

/// Decode a verified body into a delivery plus the raw JSON payload.
///
/// # Errors
/// `InvalidInput` when the body is not a well-formed provider webhook.
pub fn decode_delivery(body: &[u8]) -> Result<(WebhookDelivery, serde_json::Value)> {
    let raw: serde_json::Value = serde_json::from_slice(body)
        .map_err(|err| MeetSyncError::InvalidInput(format!("webhook body is not JSON: {err}")))?;
    let envelope: WebhookEnvelope = serde_json::from_value(raw.clone())
        .map_err(|err| MeetSyncError::InvalidInput(format!("unrecognised webhook: {err}")))?;
    if envelope.event.id.trim().is_empty() {
        return Err(MeetSyncError::InvalidInput("webhook event id is empty".into()));
    }
    Ok((envelope.into_delivery()?, raw))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const BODY: &[u8] = br#"{"type":"event.updated","event":{"id":"evt-1","title":"Sync","start_time":"2024-03-04T10:00:00Z","end_time":"2024-03-04T10:30:00Z"}}"#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
    }

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new("whsec_test", Duration::minutes(5))
    }

    #[test]
    fn accepts_valid_signature() {
        let ts = now().timestamp();
        let signature = verifier().sign(ts, BODY).unwrap();
        assert!(signature.starts_with("sha256="));

        verifier().verify(Some(&signature), Some(&ts.to_string()), BODY, now()).unwrap();
    }

    #[test]
    fn rejects_tampered_body() {
        let ts = now().timestamp();
        let signature = verifier().sign(ts, BODY).unwrap();
        let tampered = String::from_utf8(BODY.to_vec()).unwrap().replace("Sync", "Hack");

        let err = verifier()
            .verify(Some(&signature), Some(&ts.to_string()), tampered.as_bytes(), now())
            .unwrap_err();
        assert_eq!(err, WebhookRejection::BadSignature);
    }

    #[test]
    fn rejects_other_secret_and_missing_headers() {
        let ts = now().timestamp();
        let foreign = WebhookVerifier::new("other", Duration::minutes(5)).sign(ts, BODY).unwrap();
        let stamp = ts.to_string();

        assert_eq!(
            verifier().verify(Some(&foreign), Some(&stamp), BODY, now()),
            Err(WebhookRejection::BadSignature)
        );
        assert_eq!(
            verifier().verify(None, Some(&stamp), BODY, now()),
            Err(WebhookRejection::MissingSignature)
        );
        assert_eq!(
            verifier().verify(Some(&foreign), None, BODY, now()),
            Err(WebhookRejection::MissingTimestamp)
        );
        assert_eq!(
            verifier().verify(Some("sha256=zz"), Some(&stamp), BODY, now()),
            Err(WebhookRejection::BadSignature)
        );
    }

    #[test]
    fn rejects_stale_timestamp() {
        let ts = (now() - Duration::minutes(10)).timestamp();
        let signature = verifier().sign(ts, BODY).unwrap();

        assert_eq!(
            verifier().verify(Some(&signature), Some(&ts.to_string()), BODY, now()),
            Err(WebhookRejection::Expired)
        );
        assert_eq!(
            verifier().verify(Some(&signature), Some("yesterday"), BODY, now()),
            Err(WebhookRejection::InvalidTimestamp)
        );
    }

    #[test]
    fn empty_secret_rejects_everything() {
        let open = WebhookVerifier::new("", Duration::minutes(5));
        assert_eq!(open.sign(0, BODY), Err(WebhookRejection::NotConfigured));
        assert_eq!(
            open.verify(Some("sha256=00"), Some("0"), BODY, now()),
            Err(WebhookRejection::NotConfigured)
        );
    }

    #[test]
    fn decodes_delivery_and_keeps_raw_payload() {
        let (delivery, raw) = decode_delivery(BODY).unwrap();
        assert_eq!(delivery.event_id(), "evt-1");
        assert_eq!(raw["event"]["title"], "Sync");
    }

    #[test]
    fn malformed_bodies_are_invalid_input() {
        assert!(matches!(decode_delivery(b"not json"), Err(MeetSyncError::InvalidInput(_))));
        assert!(matches!(
            decode_delivery(br#"{"type":"event.updated","event":{"id":"evt-1"}}"#),
            Err(MeetSyncError::InvalidInput(_))
        ));
        assert!(matches!(
            decode_delivery(br#"{"type":"event.updated","event":{"id":" "}}"#),
            Err(MeetSyncError::InvalidInput(_))
        ));
    }

    #[test]
    fn debug_output_hides_secret() {
        assert!(!format!("{:?}", verifier()).contains("whsec_test"));
    }
}
