//! Fuzz target: inbound command decoder
//!
//! Feeds arbitrary bytes to `messages::decode` and verifies:
//! - No panics on any input (invalid UTF-8, deep JSON, huge numbers)
//! - A rejection with a header always carries a known action name
//! - Decoded upserts always carry an id; sync never carries a zero time
//!
//! cargo fuzz run fuzz_command_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use portatec::sync::messages::{self, Command};

const KNOWN_WITH_PARAMS: &[&str] = &[
    "update_firmware",
    "sync_access_codes",
    "create_access_code",
    "update_access_code",
    "delete_access_code",
];

fuzz_target!(|data: &[u8]| {
    match messages::decode(data) {
        Ok(envelope) => {
            match envelope.command {
                Command::SyncAccessCodes { server_time, .. } => {
                    assert_ne!(server_time, Some(0), "zero server time must be filtered");
                }
                Command::UpsertAccessCode(draft) => assert!(draft.id.is_some()),
                _ => {}
            }
        }
        Err(rejected) => {
            if let Some(header) = rejected.header {
                assert!(
                    KNOWN_WITH_PARAMS.contains(&header.action.as_str()),
                    "header returned for unexpected action '{}'",
                    header.action
                );
            }
        }
    }
});
