//! Time-windowed credential store.
//!
//! ```text
//!   presented ──▶ master? ──yes──▶ Grant::Master
//!                   │ no
//!                   ▼
//!              clock synced? ──no──▶ None (fail closed)
//!                   │ yes
//!                   ▼
//!              first credential with equal secret AND now ∈ [from, until]
//! ```
//!
//! The list lives in RAM and is written back through the
//! [`StoragePort`] after every mutation that changed something.

use log::{info, warn};

use super::credential::{AccessGrant, Credential, CredentialDraft, CredentialId};
use super::records::{self, Decoded};
use crate::app::ports::{StorageError, StoragePort};
use crate::clock::Timestamp;
use crate::error::StoreError;

/// Upper bound on stored temporary credentials.
pub const MAX_CREDENTIALS: usize = 48;

/// NVS namespace of the credential record file.
pub const RECORD_NAMESPACE: &str = "access";
/// NVS key of the credential record file.
pub const RECORD_KEY: &str = "codes";

/// Largest record file the loader will read.
const MAX_RECORD_BYTES: usize = 12 * 1024;

/// Outcome of [`CredentialStore::replace_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceSummary {
    pub accepted: usize,
    pub skipped: usize,
}

pub struct CredentialStore<S: StoragePort> {
    storage: S,
    credentials: Vec<Credential>,
}

impl<S: StoragePort> CredentialStore<S> {
    /// Load the persisted list (any known layout) from `storage`.
    ///
    /// Missing, corrupt or unsupported files yield an empty store.  A
    /// legacy file is rewritten in the current layout immediately.
    pub fn load(storage: S) -> Self {
        let mut store = Self {
            storage,
            credentials: Vec::new(),
        };

        let mut buf = vec![0u8; MAX_RECORD_BYTES];
        let len = match store.storage.read(RECORD_NAMESPACE, RECORD_KEY, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => {
                info!("Access: no stored credentials");
                return store;
            }
            Err(e) => {
                warn!("Access: credential read failed ({}), starting empty", e);
                return store;
            }
        };

        let mut migrated = false;
        match records::decode(&buf[..len]) {
            Ok(decoded) => {
                if let Decoded::Migrated { from_version, .. } = &decoded {
                    info!("Access: migrating credential records from v{}", from_version);
                    migrated = true;
                }
                store.credentials = decoded.into_credentials();
            }
            Err(e) => {
                warn!("Access: {} ({} bytes), starting empty", e, len);
                return store;
            }
        }

        if store.credentials.len() > MAX_CREDENTIALS {
            warn!(
                "Access: {} stored credentials exceed capacity, keeping first {}",
                store.credentials.len(),
                MAX_CREDENTIALS
            );
            store.credentials.truncate(MAX_CREDENTIALS);
        }

        if migrated {
            if let Err(e) = store.persist() {
                warn!("Access: rewriting migrated records failed: {}", e);
            }
        }

        info!("Access: loaded {} credentials", store.credentials.len());
        store
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    pub fn get(&self, id: CredentialId) -> Option<&Credential> {
        self.credentials.iter().find(|c| c.id == id)
    }

    /// Backing storage (tests inspect write counts through this).
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Check `presented` against the master PIN and then the temporary
    /// credentials valid at `now`.
    ///
    /// An empty `master` disables the master credential.  With `now ==
    /// None` only the master can match.  A secret match outside its window
    /// does not end the scan; a later entry with the same secret may still
    /// be valid.
    pub fn validate(
        &self,
        presented: &str,
        master: &str,
        now: Option<Timestamp>,
    ) -> Option<AccessGrant> {
        if !master.is_empty() && presented == master {
            return Some(AccessGrant::Master);
        }
        let now = now?;
        self.credentials
            .iter()
            .filter(|c| c.secret == presented)
            .find(|c| c.is_active_at(now))
            .map(|c| AccessGrant::Temporary(c.id))
    }

    // ── Mutations ─────────────────────────────────────────────

    /// Create or overwrite the credential with `credential.id`.
    pub fn upsert(&mut self, credential: Credential) -> Result<(), StoreError> {
        if credential.valid_from > credential.valid_until {
            return Err(StoreError::InvalidWindow);
        }
        match self.credentials.iter_mut().find(|c| c.id == credential.id) {
            Some(existing) => *existing = credential,
            None => {
                if self.credentials.len() >= MAX_CREDENTIALS {
                    return Err(StoreError::Full);
                }
                self.credentials.push(credential);
            }
        }
        self.persist()
    }

    /// Remove `id`.  Returns whether anything was removed; unknown ids do
    /// not touch storage.
    pub fn remove(&mut self, id: CredentialId) -> Result<bool, StoreError> {
        let before = self.credentials.len();
        self.credentials.retain(|c| c.id != id);
        if self.credentials.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    /// Replace the whole list, skipping drafts that do not resolve and
    /// anything beyond [`MAX_CREDENTIALS`].  Persists once.
    ///
    /// Drafts without an id are numbered after the largest id in the batch,
    /// in list order.  A later draft with an id already accepted overwrites
    /// the earlier one.
    pub fn replace_all(
        &mut self,
        drafts: impl IntoIterator<Item = CredentialDraft>,
    ) -> Result<ReplaceSummary, StoreError> {
        let drafts: Vec<CredentialDraft> = drafts.into_iter().collect();
        let mut generated = drafts
            .iter()
            .filter_map(|d| d.id)
            .max()
            .unwrap_or(0)
            .max(0);

        let mut next: Vec<Credential> = Vec::new();
        let mut summary = ReplaceSummary::default();

        for draft in drafts {
            let id = match draft.id {
                Some(id) => id,
                None => {
                    generated = generated.saturating_add(1);
                    generated
                }
            };
            let Some(credential) = draft.resolve_as(id) else {
                warn!("Access: skipping unresolvable entry id={}", id);
                summary.skipped += 1;
                continue;
            };
            if let Some(existing) = next.iter_mut().find(|c| c.id == credential.id) {
                *existing = credential;
                continue;
            }
            if next.len() >= MAX_CREDENTIALS {
                warn!("Access: capacity reached, skipping id={}", credential.id);
                summary.skipped += 1;
                continue;
            }
            next.push(credential);
        }
        summary.accepted = next.len();

        self.credentials = next;
        self.persist()?;
        info!(
            "Access: replaced list, {} accepted / {} skipped",
            summary.accepted, summary.skipped
        );
        Ok(summary)
    }

    /// Drop every credential that ended before `now`.  No-op without a
    /// clock.  Returns how many were removed.
    pub fn purge(&mut self, now: Option<Timestamp>) -> Result<usize, StoreError> {
        let Some(now) = now else {
            return Ok(0);
        };
        let before = self.credentials.len();
        self.credentials.retain(|c| !c.is_expired_at(now));
        let removed = before - self.credentials.len();
        if removed > 0 {
            info!("Access: purged {} expired credentials", removed);
            self.persist()?;
        }
        Ok(removed)
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        let bytes = records::encode(&self.credentials).map_err(|_| StoreError::Encode)?;
        if bytes.len() > MAX_RECORD_BYTES {
            warn!("Access: record file of {} bytes would not load back", bytes.len());
            return Err(StoreError::TooLarge);
        }
        self.storage
            .write(RECORD_NAMESPACE, RECORD_KEY, &bytes)
            .map_err(|e| {
                warn!("Access: persist failed: {}", e);
                StoreError::from(e)
            })
    }
}
