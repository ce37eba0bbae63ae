//! Fuzz target: calendar date parser
//!
//! Drives `dates::parse_utc` with arbitrary strings and verifies:
//! - No panics on any input (multi-byte chars at the slice boundary included)
//! - Every accepted timestamp lies between 1970 and the end of 2100
//!
//! cargo fuzz run fuzz_date_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use portatec::dates::parse_utc;

/// 2101-01-01T00:00:00Z
const END_OF_2100: u64 = 4_133_980_800;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    if let Some(ts) = parse_utc(text) {
        assert!(ts < END_OF_2100, "{} parsed beyond 2100: {}", text, ts);
    }
});
