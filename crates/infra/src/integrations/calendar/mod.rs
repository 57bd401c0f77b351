//! Calendar provider integration
//!
//! REST client for the provider's event API and verification/decoding of
//! the webhooks it sends.

pub mod client;
pub mod types;
pub mod webhook;

pub use client::CalendarApiClient;
pub use types::{EventPage, ProviderEvent, WebhookEnvelope};
pub use webhook::{decode_delivery, WebhookRejection, WebhookVerifier};
