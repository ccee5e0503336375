//! Property-based tests for the wire codec.
//!
//! These verify the codec for ALL valid inputs, not just examples: frame
//! encode/decode round trips, agreement between the incremental length
//! counter and the emitted wire form, and the dotted-form and header
//! string-form round-trip laws.

use bytes::Bytes;
use proptest::prelude::*;
use weft_proto::{Frame, HeaderLine, RoutingObject, commands, keys, ponum};

/// Strategy for command codes drawn from the protocol vocabulary.
fn arbitrary_cmd() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just(commands::HELLO),
        Just(commands::PUBLISH),
        Just(commands::PERSIST),
        Just(commands::SUBSCRIBE),
        Just(commands::QUERY),
        Just(commands::BUILD_CHAIN),
        Just(commands::RESPONSE),
        Just(commands::RESULT),
    ]
}

/// Strategy for header keys: non-empty, no spaces or newlines.
fn arbitrary_key() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,15}"
}

/// Strategy for arbitrary frames with mixed item kinds.
fn arbitrary_frame() -> impl Strategy<Value = Frame> {
    (
        arbitrary_cmd(),
        any::<u32>(),
        prop::collection::vec((arbitrary_key(), prop::collection::vec(any::<u8>(), 0..256)), 0..6),
        prop::collection::vec((any::<u8>(), prop::collection::vec(any::<u8>(), 0..256)), 0..4),
        prop::collection::vec((any::<u32>(), prop::collection::vec(any::<u8>(), 0..256)), 0..4),
    )
        .prop_map(|(cmd, seqno, kvs, ros, pos)| {
            let mut frame = Frame::new(cmd, seqno);
            for (key, value) in kvs {
                frame.add_header_bytes(&key, value);
            }
            for (ronum, content) in ros {
                frame.add_routing_object(RoutingObject::new(ronum, content));
            }
            for (ponum, content) in pos {
                frame.add_payload(ponum, content);
            }
            frame
        })
}

proptest! {
    #[test]
    fn frame_round_trip(frame in arbitrary_frame()) {
        let mut wire = Vec::new();
        frame.encode(&mut wire).expect("should encode");

        let parsed = Frame::decode(&wire).expect("should decode");
        prop_assert_eq!(parsed, frame);
    }

    #[test]
    fn declared_length_is_exact(frame in arbitrary_frame()) {
        let mut wire = Vec::new();
        frame.encode(&mut wire).expect("should encode");

        // The ten-digit length equals the byte count between the header
        // line's LF and the end of `end\n`, inclusive.
        let head: &[u8; 27] = wire[..27].try_into().expect("header line");
        let line = HeaderLine::parse(head).expect("should parse");
        prop_assert_eq!(line.length, wire.len() - 27);
        prop_assert_eq!(line.length, frame.wire_length());
        prop_assert_eq!(line.seqno, frame.seqno());
    }

    #[test]
    fn decode_ignores_trailing_stream_bytes(frame in arbitrary_frame(), tail in prop::collection::vec(any::<u8>(), 0..64)) {
        let mut wire = Vec::new();
        frame.encode(&mut wire).expect("should encode");
        wire.extend_from_slice(&tail);

        let parsed = Frame::decode(&wire).expect("should decode");
        prop_assert_eq!(parsed, frame);
    }

    #[test]
    fn dot_form_round_trip(n in any::<u32>()) {
        prop_assert_eq!(ponum::from_dot_form(&ponum::dot_form(n)).expect("should parse"), n);
    }

    #[test]
    fn key_form_round_trip(bytes in prop::collection::vec(any::<u8>(), 32)) {
        prop_assert_eq!(keys::unfmt_key(&keys::fmt_key(&bytes)).expect("should decode"), bytes.clone());
        prop_assert_eq!(keys::unfmt_hash(&keys::fmt_hash(&bytes)).expect("should decode"), bytes);
    }

    #[test]
    fn sig_form_round_trip(bytes in prop::collection::vec(any::<u8>(), 64)) {
        prop_assert_eq!(keys::unfmt_sig(&keys::fmt_sig(&bytes)).expect("should decode"), bytes);
    }

    #[test]
    fn payload_identity(ponum in any::<u32>(), content in prop::collection::vec(any::<u8>(), 0..256)) {
        // Constructors may reject malformed typed content, but whenever a
        // load succeeds it must preserve the (tag, bytes) pair exactly.
        let bytes = Bytes::from(content.clone());
        if let Ok(po) = weft_proto::PayloadObject::load(ponum, bytes) {
            prop_assert_eq!(po.ponum(), ponum);
            prop_assert_eq!(po.content().as_ref(), content.as_slice());
        }
    }
}
