//! Default GPIO assignments for the Portatec controller board.
//!
//! These are only factory defaults; the pins actually driven come from
//! [`DeviceConfig`](crate::config::DeviceConfig) so one image serves
//! several board revisions.  The level sensor has no default and stays
//! disabled until configured.

// ---------------------------------------------------------------------------
// Strike relay
// ---------------------------------------------------------------------------

/// Relay coil driver (via transistor).  Active HIGH unless `pulse_inverted`.
pub const RELAY_GPIO: u8 = 4;
