//! Domain types and models

pub mod change;
pub mod external;
pub mod integration;
pub mod meeting;
pub mod reconcile;
pub mod webhook;

pub use change::{ChangeData, ChangeProposal, ChangeType, FieldChange, MeetingChange, Provenance};
pub use external::{ExternalEventSnapshot, RemoteObservation, RevisionMarker, TimeWindow};
pub use integration::{
    CalendarIntegration, IntegrationStatusView, IntegrationSyncState, NewIntegration,
};
pub use meeting::{LocalEdit, Meeting, MeetingFields, MeetingSnapshot, MeetingStatus, NewMeeting};
pub use reconcile::{
    ApplyOutcome, ApplyRequest, ChangeCursor, ChangeOrder, ChangePage, ChangeQuery,
};
pub use webhook::{InboxEntry, InboxStatus, WebhookDelivery, WebhookEventKind};
