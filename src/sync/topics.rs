//! Per-device topic names.
//!
//! | Direction | Topic                          |
//! |-----------|--------------------------------|
//! | in        | `device/D/command`             |
//! | in        | `device/D/access-codes/sync`   |
//! | out       | `device/D/ack`                 |
//! | out       | `device/D/access-codes/ack`    |
//! | out       | `device/D/status`              |
//! | out       | `device/D/event`               |

use core::fmt::Write;

/// Fixed-capacity topic string.
pub type Topic = heapless::String<64>;

/// Subjects the device consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    Command,
    AccessSync,
}

/// Subjects the device produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outbound {
    Ack,
    AccessAck,
    Status,
    Event,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    command: Topic,
    access_sync: Topic,
    ack: Topic,
    access_ack: Topic,
    status: Topic,
    event: Topic,
}

fn topic(device_id: &str, suffix: &str) -> Topic {
    let mut t = Topic::new();
    let _ = write!(t, "device/{}/{}", device_id, suffix);
    t
}

impl Topics {
    pub fn for_device(device_id: &str) -> Self {
        Self {
            command: topic(device_id, "command"),
            access_sync: topic(device_id, "access-codes/sync"),
            ack: topic(device_id, "ack"),
            access_ack: topic(device_id, "access-codes/ack"),
            status: topic(device_id, "status"),
            event: topic(device_id, "event"),
        }
    }

    pub fn inbound(&self, kind: Inbound) -> &str {
        match kind {
            Inbound::Command => &self.command,
            Inbound::AccessSync => &self.access_sync,
        }
    }

    pub fn outbound(&self, kind: Outbound) -> &str {
        match kind {
            Outbound::Ack => &self.ack,
            Outbound::AccessAck => &self.access_ack,
            Outbound::Status => &self.status,
            Outbound::Event => &self.event,
        }
    }

    /// Map a received topic back to the subject it belongs to.
    pub fn classify(&self, topic: &str) -> Option<Inbound> {
        if topic == self.command.as_str() {
            Some(Inbound::Command)
        } else if topic == self.access_sync.as_str() {
            Some(Inbound::AccessSync)
        } else {
            None
        }
    }
}
