//! Fuzz target for Frame::decode
//!
//! Feeds arbitrary byte sequences to the frame decoder to find:
//! - Parser crashes or panics
//! - Integer overflows in the length accounting
//! - Buffer over-reads on truncated bodies
//! - Malformed header lines that bypass validation
//!
//! The fuzzer should NEVER panic. All invalid inputs must return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use weft_proto::Frame;

fuzz_target!(|data: &[u8]| {
    // Decoding arbitrary bytes must never panic, only return Err.
    // When it succeeds, re-encoding the canonical form must round-trip.
    if let Ok(frame) = Frame::decode(data) {
        let mut wire = Vec::new();
        if frame.encode(&mut wire).is_ok() {
            let again = Frame::decode(&wire).expect("canonical form must decode");
            assert_eq!(again, frame);
        }
    }
});
