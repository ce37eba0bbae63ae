//! Unified error types for the Portatec firmware.
//!
//! Each subsystem owns a small `Copy` error enum; all of them convert into
//! the top-level [`Error`] so the control loop handles failures uniformly.
//! Transport errors only ever drive connection-state transitions, protocol
//! errors are logged (and acknowledged where the backend can act on them),
//! and store errors surface to whoever mutated the credential list.

use core::fmt;

use crate::app::ports::StorageError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The broker connection failed or is unavailable.
    Transport(TransportError),
    /// An inbound payload could not be decoded.
    Protocol(ProtocolError),
    /// The credential store rejected a mutation or could not persist it.
    Store(StoreError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Store(e) => write!(f, "store: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The broker client could not start a session.
    ConnectFailed,
    /// An operation needed an established session.
    NotConnected,
    /// A publish was rejected by the client.
    PublishFailed,
    /// A subscribe was rejected by the client.
    SubscribeFailed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "broker connect failed"),
            Self::NotConnected => write!(f, "not connected"),
            Self::PublishFailed => write!(f, "publish failed"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload bytes are not UTF-8.
    InvalidUtf8,
    /// Payload is not a JSON object.
    MalformedJson,
    /// The `action` field is missing or not a string.
    MissingAction,
    /// A known action carried parameters that failed to decode.
    InvalidParams(&'static str),
    /// The message arrived on a subject the device does not consume.
    UnknownTopic,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUtf8 => write!(f, "payload is not UTF-8"),
            Self::MalformedJson => write!(f, "payload is not a JSON object"),
            Self::MissingAction => write!(f, "missing action"),
            Self::InvalidParams(what) => write!(f, "invalid parameters: {what}"),
            Self::UnknownTopic => write!(f, "unknown topic"),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Credential store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The store already holds the maximum number of credentials.
    Full,
    /// The credential window could not be resolved to timestamps.
    InvalidWindow,
    /// The record file could not be encoded.
    Encode,
    /// The encoded record file exceeds what the loader reads back.
    TooLarge,
    /// The storage backend rejected the write.
    Persist(StorageError),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "credential store full"),
            Self::InvalidWindow => write!(f, "invalid validity window"),
            Self::Encode => write!(f, "record encoding failed"),
            Self::TooLarge => write!(f, "record file too large"),
            Self::Persist(e) => write!(f, "persist failed: {e}"),
        }
    }
}

impl From<StorageError> for StoreError {
    fn from(e: StorageError) -> Self {
        Self::Persist(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
