//! Wire messages of the sync channel.
//!
//! Inbound payloads are JSON objects carrying an `action`, an optional
//! `command_id` (string or integer, defaulting to `"local"`) and
//! action-specific parameters.  They are decoded exactly once into the
//! closed [`Command`] enum; everything after that matches on variants,
//! never on strings.
//!
//! Outbound payloads are plain `Serialize` structs with optional fields
//! omitted when unset.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::access::{CredentialDraft, CredentialId, TimeBound};
use crate::clock::Timestamp;
use crate::error::ProtocolError;

/// `command_id` used when the backend did not supply one.
pub const LOCAL_COMMAND_ID: &str = "local";

// ── Inbound ───────────────────────────────────────────────────

/// The action name and correlation id every acknowledgment echoes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandHeader {
    pub action: String,
    pub command_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseAction {
    Pulse,
    Toggle,
    PushButton,
}

/// Every command the device understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Energise the relay for the configured pulse length.
    Pulse(PulseAction),
    /// Replace the running firmware.
    UpdateFirmware {
        url: Option<String>,
        version: Option<String>,
    },
    /// Replace the whole credential list.
    SyncAccessCodes {
        entries: Vec<CredentialDraft>,
        server_time: Option<Timestamp>,
    },
    /// `create_access_code` / `update_access_code`.
    UpsertAccessCode(CredentialDraft),
    DeleteAccessCode { id: CredentialId },
    /// Anything else; acknowledged with its name and otherwise ignored.
    Unrecognized,
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub header: CommandHeader,
    pub command: Command,
}

/// A payload that could not be decoded.
///
/// `header` is present when the action was recognised but its parameters
/// were not, so the backend can still be told about the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub error: ProtocolError,
    pub header: Option<CommandHeader>,
}

impl Rejected {
    fn bare(error: ProtocolError) -> Self {
        Self {
            error,
            header: None,
        }
    }
}

/// Decode one inbound payload.
pub fn decode(payload: &[u8]) -> Result<Envelope, Rejected> {
    let text = core::str::from_utf8(payload).map_err(|_| Rejected::bare(ProtocolError::InvalidUtf8))?;
    let value: Value =
        serde_json::from_str(text).map_err(|_| Rejected::bare(ProtocolError::MalformedJson))?;
    let Value::Object(obj) = value else {
        return Err(Rejected::bare(ProtocolError::MalformedJson));
    };
    let action = obj
        .get("action")
        .and_then(Value::as_str)
        .ok_or(Rejected::bare(ProtocolError::MissingAction))?;

    let header = CommandHeader {
        action: action.to_owned(),
        command_id: obj
            .get("command_id")
            .and_then(scalar_text)
            .unwrap_or_else(|| LOCAL_COMMAND_ID.to_owned()),
    };

    match decode_command(&header.action, &obj) {
        Ok(command) => Ok(Envelope { header, command }),
        Err(error) => Err(Rejected {
            error,
            header: Some(header),
        }),
    }
}

fn decode_command(action: &str, obj: &Map<String, Value>) -> Result<Command, ProtocolError> {
    let command = match action {
        "pulse" => Command::Pulse(PulseAction::Pulse),
        "toggle" => Command::Pulse(PulseAction::Toggle),
        "push_button" => Command::Pulse(PulseAction::PushButton),
        "update_firmware" => Command::UpdateFirmware {
            url: optional_text(obj, "url")?,
            version: match obj.get("version") {
                None | Some(Value::Null) => None,
                Some(v) => Some(scalar_text(v).ok_or(ProtocolError::InvalidParams("version"))?),
            },
        },
        "sync_access_codes" => {
            let list = obj
                .get("access_codes")
                .and_then(Value::as_array)
                .ok_or(ProtocolError::InvalidParams("access_codes"))?;
            Command::SyncAccessCodes {
                entries: list.iter().map(entry_draft).collect(),
                server_time: obj
                    .get("server_time")
                    .and_then(Value::as_u64)
                    .filter(|t| *t > 0),
            }
        }
        "create_access_code" | "update_access_code" => {
            let draft = entry_draft(&Value::Object(obj.clone()));
            if draft.id.is_none() {
                return Err(ProtocolError::InvalidParams("id"));
            }
            Command::UpsertAccessCode(draft)
        }
        "delete_access_code" => Command::DeleteAccessCode {
            id: obj
                .get("id")
                .and_then(Value::as_i64)
                .ok_or(ProtocolError::InvalidParams("id"))?,
        },
        _ => Command::Unrecognized,
    };
    Ok(command)
}

/// Build a draft from one access-code object.  Anything missing or
/// mistyped leaves the draft unresolvable rather than failing the list.
fn entry_draft(v: &Value) -> CredentialDraft {
    CredentialDraft {
        id: v.get("id").and_then(Value::as_i64),
        secret: v
            .get("pin")
            .or_else(|| v.get("code"))
            .and_then(scalar_text)
            .unwrap_or_default(),
        start: bound(v, "start_unix", "start"),
        end: bound(v, "end_unix", "end"),
    }
}

fn bound(v: &Value, epoch_key: &str, text_key: &str) -> TimeBound {
    let text = v.get(text_key);
    let epoch = v
        .get(epoch_key)
        .and_then(Value::as_u64)
        .or_else(|| text.and_then(Value::as_u64));
    TimeBound::from_parts(epoch, text.and_then(Value::as_str).map(str::to_owned))
}

/// Strings pass through; integers are rendered in decimal.
fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

fn optional_text(obj: &Map<String, Value>, key: &'static str) -> Result<Option<String>, ProtocolError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ProtocolError::InvalidParams(key)),
    }
}

// ── Outbound ──────────────────────────────────────────────────

/// Acknowledgment on the general ack topic.
#[derive(Debug, Serialize)]
pub struct Ack<'a> {
    pub action: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<u8>,
    pub command_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_heap: Option<u32>,
}

impl<'a> Ack<'a> {
    pub fn new(header: &'a CommandHeader) -> Self {
        Self {
            action: &header.action,
            pin: None,
            command_id: &header.command_id,
            status: None,
            error: None,
            free_heap: None,
        }
    }

    pub fn with_pin(mut self, pin: u8) -> Self {
        self.pin = Some(pin);
        self
    }

    pub fn with_status(mut self, status: &'a str) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_error(mut self, error: &'a str) -> Self {
        self.status = Some("error");
        self.error = Some(error);
        self
    }

    pub fn with_free_heap(mut self, free_heap: u32) -> Self {
        self.free_heap = Some(free_heap);
        self
    }
}

/// Acknowledgment on the access-codes ack topic.
#[derive(Debug, Serialize)]
pub struct AccessCodesAck<'a> {
    pub action: &'a str,
    pub command_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<CredentialId>,
    pub status: &'a str,
}

/// Periodic status snapshot.
#[derive(Debug, Serialize)]
pub struct StatusReport<'a> {
    pub device_id: &'a str,
    /// Seconds since boot.
    pub uptime: u64,
    pub rssi: Option<i8>,
    pub firmware_version: &'a str,
    pub device_name: &'a str,
    pub pulse_pin: u8,
    pub sensor_pin: u8,
    pub pulse_inverted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_value: Option<u8>,
    pub clock_synced: bool,
    pub access_codes: usize,
}

/// One access attempt at the keypad.
#[derive(Debug, Serialize)]
pub struct AccessEventReport<'a> {
    pub pin: &'a str,
    pub result: &'static str,
    /// Estimated absolute time, `null` while the clock is unsynchronised.
    pub timestamp_device: Option<Timestamp>,
}
