//! Fuzz target: persisted credential records
//!
//! Decodes arbitrary blobs with `records::decode` and verifies:
//! - No panics on corrupt or truncated files
//! - Anything that decodes re-encodes and decodes to the same list
//! - Migrated legacy files get ids `1..=n`
//!
//! cargo fuzz run fuzz_credential_records

#![no_main]

use libfuzzer_sys::fuzz_target;
use portatec::access::records::{self, Decoded};

fuzz_target!(|data: &[u8]| {
    let Ok(decoded) = records::decode(data) else {
        return;
    };
    if let Decoded::Migrated { credentials, .. } = &decoded {
        for (i, c) in credentials.iter().enumerate() {
            assert_eq!(c.id, i as i64 + 1);
        }
    }
    let credentials = decoded.into_credentials();
    let bytes = records::encode(&credentials).expect("encode");
    let again = records::decode(&bytes).expect("re-decode").into_credentials();
    assert_eq!(credentials, again);
});
