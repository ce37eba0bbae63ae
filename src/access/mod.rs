//! Access control: credentials, their persisted layout and the store.
//!
//! The [`CredentialStore`] is owned by the
//! [`DeviceService`](crate::app::service::DeviceService); its only mutators
//! are the sync-channel command dispatcher and the periodic purge.

pub mod credential;
pub mod records;
pub mod store;

pub use credential::{AccessGrant, Credential, CredentialDraft, CredentialId, TimeBound, MASTER_ID};
pub use store::{CredentialStore, ReplaceSummary, MAX_CREDENTIALS};
