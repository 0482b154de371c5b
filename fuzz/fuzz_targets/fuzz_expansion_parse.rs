//! Fuzz target for expansion rule parsing.
//!
//! Arbitrary input must parse or fail cleanly, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use warden_core::util::parse_expansion;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok((op, target)) = parse_expansion(s) {
            // A parsed rule always round-trips to itself.
            let rebuilt = format!("{}:{}", op.as_str(), target);
            assert_eq!(rebuilt, s);
            assert!(!target.is_empty());
        }
    }
});
