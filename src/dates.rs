//! Calendar date parsing for credential validity windows.
//!
//! Accepted form: `YYYY-MM-DDTHH:MM:SS` optionally followed by `Z` or a
//! `±HH:MM` offset.  The offset is syntax-checked but otherwise ignored;
//! every date is read as UTC.  Years outside 1970–2100 are rejected.

use chrono::{Datelike, NaiveDateTime};

use crate::clock::Timestamp;

const BASE_LEN: usize = 19;
const BASE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse an ISO-8601-style date into epoch seconds.
pub fn parse_utc(text: &str) -> Option<Timestamp> {
    let base = text.get(..BASE_LEN)?;
    if !has_fixed_layout(base.as_bytes()) || !is_valid_suffix(&text[BASE_LEN..]) {
        return None;
    }
    let dt = NaiveDateTime::parse_from_str(base, BASE_FORMAT).ok()?;
    if !(1970..=2100).contains(&dt.year()) {
        return None;
    }
    u64::try_from(dt.and_utc().timestamp()).ok()
}

/// Digits and separators exactly where `YYYY-MM-DDTHH:MM:SS` puts them.
fn has_fixed_layout(b: &[u8]) -> bool {
    b.iter().enumerate().all(|(i, &c)| match i {
        4 | 7 => c == b'-',
        10 => c == b'T',
        13 | 16 => c == b':',
        _ => c.is_ascii_digit(),
    })
}

fn is_valid_suffix(s: &str) -> bool {
    match s.as_bytes() {
        [] | [b'Z'] => true,
        [sign, h1, h2, b':', m1, m2] if *sign == b'+' || *sign == b'-' => {
            [h1, h2, m1, m2].iter().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}
