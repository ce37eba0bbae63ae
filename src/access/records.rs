//! Versioned persisted layout of the credential list.
//!
//! ```text
//!   v2 (current)  {"version":2,"credentials":[{"id","secret","start_epoch","end_epoch"}, ..]}
//!   v1 (legacy)   [{"code","start_epoch","end_epoch"}, ..]        ids assigned 1..=n
//! ```
//!
//! The decoder dispatches on the top-level JSON shape and the `version`
//! field; the encoder only ever writes the current layout.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::credential::{Credential, CredentialId};
use crate::clock::Timestamp;

pub const CURRENT_VERSION: u64 = 2;

#[derive(Serialize, Deserialize)]
struct RecordFile {
    version: u64,
    credentials: Vec<StoredCredential>,
}

#[derive(Serialize, Deserialize)]
struct StoredCredential {
    id: CredentialId,
    secret: String,
    start_epoch: Timestamp,
    end_epoch: Timestamp,
}

#[derive(Deserialize)]
struct LegacyRecord {
    code: String,
    start_epoch: Timestamp,
    end_epoch: Timestamp,
}

/// Successfully decoded record file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Already in the current layout.
    Current(Vec<Credential>),
    /// Read from an older layout; the caller should rewrite it.
    Migrated {
        from_version: u64,
        credentials: Vec<Credential>,
    },
}

impl Decoded {
    pub fn into_credentials(self) -> Vec<Credential> {
        match self {
            Self::Current(c) | Self::Migrated { credentials: c, .. } => c,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    /// Not JSON, or JSON of an unexpected shape.
    Corrupt,
    /// A versioned file from a newer (or unknown) firmware.
    UnsupportedVersion(u64),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupt => write!(f, "corrupt record file"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported record version {v}"),
        }
    }
}

/// Serialise `credentials` in the current layout.
pub fn encode(credentials: &[Credential]) -> Result<Vec<u8>, serde_json::Error> {
    let file = RecordFile {
        version: CURRENT_VERSION,
        credentials: credentials
            .iter()
            .map(|c| StoredCredential {
                id: c.id,
                secret: c.secret.clone(),
                start_epoch: c.valid_from,
                end_epoch: c.valid_until,
            })
            .collect(),
    };
    serde_json::to_vec(&file)
}

/// Decode any known layout.
pub fn decode(bytes: &[u8]) -> Result<Decoded, RecordError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|_| RecordError::Corrupt)?;
    if value.is_array() {
        let legacy: Vec<LegacyRecord> =
            serde_json::from_value(value).map_err(|_| RecordError::Corrupt)?;
        let credentials = legacy
            .into_iter()
            .zip(1..)
            .map(|(r, id)| Credential {
                id,
                secret: r.code,
                valid_from: r.start_epoch,
                valid_until: r.end_epoch,
            })
            .collect();
        return Ok(Decoded::Migrated {
            from_version: 1,
            credentials,
        });
    }

    let version = value
        .get("version")
        .and_then(Value::as_u64)
        .ok_or(RecordError::Corrupt)?;
    if version != CURRENT_VERSION {
        return Err(RecordError::UnsupportedVersion(version));
    }
    let file: RecordFile = serde_json::from_value(value).map_err(|_| RecordError::Corrupt)?;
    Ok(Decoded::Current(
        file.credentials
            .into_iter()
            .map(|s| Credential {
                id: s.id,
                secret: s.secret,
                valid_from: s.start_epoch,
                valid_until: s.end_epoch,
            })
            .collect(),
    ))
}
