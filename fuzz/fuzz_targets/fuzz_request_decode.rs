//! Fuzz target for RPC request decoding.
//!
//! Arbitrary bytes off the wire must decode or fail cleanly; anything
//! that decodes must re-encode.

#![no_main]

use libfuzzer_sys::fuzz_target;
use warden_proto::Request;

fuzz_target!(|data: &[u8]| {
    if let Ok(request) = serde_json::from_slice::<Request>(data) {
        let encoded = serde_json::to_string(&request).expect("decoded requests re-encode");
        let again: Request = serde_json::from_str(&encoded).expect("re-encoded requests decode");
        assert_eq!(request, again);
    }
});
