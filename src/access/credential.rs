//! Credential value types.

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::dates;

/// Backend-assigned credential identifier.
pub type CredentialId = i64;

/// Identifier reported for the master credential in events and acks.
pub const MASTER_ID: CredentialId = -1;

/// Longest secret the store accepts, in bytes.
pub const MAX_SECRET_LEN: usize = 32;

/// A temporary credential with an inclusive validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub secret: String,
    pub valid_from: Timestamp,
    pub valid_until: Timestamp,
}

impl Credential {
    /// Whether `t` lies inside `[valid_from, valid_until]`.
    pub fn is_active_at(&self, t: Timestamp) -> bool {
        self.valid_from <= t && t <= self.valid_until
    }

    pub fn is_expired_at(&self, t: Timestamp) -> bool {
        self.valid_until < t
    }
}

/// Which credential granted access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessGrant {
    Master,
    Temporary(CredentialId),
}

impl AccessGrant {
    /// Numeric id as reported on the wire (`-1` for the master credential).
    pub fn wire_id(self) -> CredentialId {
        match self {
            Self::Master => MASTER_ID,
            Self::Temporary(id) => id,
        }
    }
}

// ── Unresolved input ──────────────────────────────────────────

/// One end of a validity window as the backend delivered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeBound {
    Epoch(Timestamp),
    Text(String),
    Missing,
}

impl TimeBound {
    /// Prefer the epoch form when both were supplied.
    pub fn from_parts(epoch: Option<Timestamp>, text: Option<String>) -> Self {
        match (epoch, text) {
            (Some(e), _) => Self::Epoch(e),
            (None, Some(t)) => Self::Text(t),
            (None, None) => Self::Missing,
        }
    }

    fn resolve(&self) -> Option<Timestamp> {
        match self {
            Self::Epoch(e) => Some(*e),
            Self::Text(t) => dates::parse_utc(t),
            Self::Missing => None,
        }
    }
}

/// A credential whose window has not been resolved yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialDraft {
    pub id: Option<CredentialId>,
    pub secret: String,
    pub start: TimeBound,
    pub end: TimeBound,
}

impl CredentialDraft {
    /// Turn the draft into a storable credential.
    ///
    /// Fails when the id is missing, or for any reason [`Self::resolve_as`]
    /// fails.
    pub fn resolve(&self) -> Option<Credential> {
        self.resolve_as(self.id?)
    }

    /// Like [`Self::resolve`] but stores the credential under `id`,
    /// ignoring whatever id the draft carried.
    ///
    /// Fails when the secret is empty, too long or contains control
    /// characters, either bound does not parse, or the window is inverted.
    pub fn resolve_as(&self, id: CredentialId) -> Option<Credential> {
        if self.secret.is_empty()
            || self.secret.len() > MAX_SECRET_LEN
            || self.secret.chars().any(char::is_control)
        {
            return None;
        }
        let valid_from = self.start.resolve()?;
        let valid_until = self.end.resolve()?;
        if valid_from > valid_until {
            return None;
        }
        Some(Credential {
            id,
            secret: self.secret.clone(),
            valid_from,
            valid_until,
        })
    }
}
