//! Fuzz target for the payload-object constructor registry
//!
//! Runs arbitrary content through every interesting type tag: the typed
//! constructors (text, metadata tuple) must reject malformed content with
//! an error, never a panic, and successful loads must preserve the
//! (tag, bytes) pair exactly.

#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use weft_proto::{PayloadObject, ponum};

fuzz_target!(|data: &[u8]| {
    let tags = [
        ponum::BASE,
        ponum::BLOB,
        ponum::MSGPACK,
        ponum::SMETADATA,
        ponum::TEXT,
        ponum::STRING,
    ];
    for tag in tags {
        if let Ok(po) = PayloadObject::load(tag, Bytes::copy_from_slice(data)) {
            assert_eq!(po.ponum(), tag);
            assert_eq!(po.content().as_ref(), data);
        }
    }
});
