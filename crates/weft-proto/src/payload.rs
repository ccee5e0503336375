//! Typed payload objects and the constructor registry.
//!
//! The wire form of a payload object is always `(tag, bytes)`. Inbound
//! pairs resolve to a typed variant through a declaration-ordered table of
//! constructors keyed on tag prefix masks: the first constructor whose
//! masked tag bits agree wins, and the mask-0 base constructor is a
//! universal fallback. Every variant retains the exact tag and content it
//! was loaded from.
//!
//! # Invariants
//!
//! - Identity: for any tag `t`, `load(t, bytes)` yields an object with
//!   `ponum() == t` and `content() == bytes`.
//!
//! - Partial Decode: a constructor failure is an error for that object
//!   only; the enclosing frame and its sibling objects are unaffected.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{WireError, ponum};

/// A metadata value with its write timestamp, as attached to `!meta` URIs.
///
/// Travels as a MessagePack map `{"val": …, "ts": …}`, the encoding the
/// router applies when materializing metadata queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataTuple {
    /// Stored value.
    #[serde(rename = "val")]
    pub value: String,
    /// Write time, nanoseconds since the epoch.
    #[serde(rename = "ts")]
    pub timestamp: i64,
}

impl MetadataTuple {
    /// Encode to the wire map form.
    pub fn to_bytes(&self) -> Result<Bytes, WireError> {
        rmp_serde::to_vec_named(self)
            .map(Bytes::from)
            .map_err(|e| WireError::BadMetadataTuple(e.to_string()))
    }

    /// Decode from the wire map form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        rmp_serde::from_slice(bytes).map_err(|e| WireError::BadMetadataTuple(e.to_string()))
    }
}

/// A typed payload object.
///
/// Specializations are discriminated by type tag and expose typed
/// accessors; the wire form is always the retained `(tag, content)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadObject {
    /// Any tag without a more specific constructor.
    Base {
        /// Type tag.
        ponum: u32,
        /// Raw content.
        content: Bytes,
    },
    /// Human-readable family (`64.0.0.0/4`); content is valid UTF-8.
    Text {
        /// Type tag.
        ponum: u32,
        /// Raw content, UTF-8 validated at load.
        content: Bytes,
    },
    /// Metadata tuple (`2.0.3.1/32`).
    Metadata {
        /// Type tag.
        ponum: u32,
        /// Raw content the tuple was decoded from.
        content: Bytes,
        /// Decoded tuple.
        tuple: MetadataTuple,
    },
}

/// One registry row: tag, prefix mask in bits, and the loader to run.
struct Constructor {
    tag: u32,
    mask: u32,
    load: fn(u32, Bytes) -> Result<PayloadObject, WireError>,
}

/// Declaration-ordered, specific-first constructor table.
const CONSTRUCTORS: &[Constructor] = &[
    Constructor { tag: ponum::SMETADATA, mask: 32, load: load_metadata },
    Constructor { tag: ponum::TEXT, mask: 4, load: load_text },
    Constructor { tag: ponum::BASE, mask: 0, load: load_base },
];

fn load_base(ponum: u32, content: Bytes) -> Result<PayloadObject, WireError> {
    Ok(PayloadObject::Base { ponum, content })
}

fn load_text(ponum: u32, content: Bytes) -> Result<PayloadObject, WireError> {
    if std::str::from_utf8(&content).is_err() {
        return Err(WireError::BadUtf8);
    }
    Ok(PayloadObject::Text { ponum, content })
}

fn load_metadata(ponum: u32, content: Bytes) -> Result<PayloadObject, WireError> {
    let tuple = MetadataTuple::from_bytes(&content)?;
    Ok(PayloadObject::Metadata { ponum, content, tuple })
}

impl PayloadObject {
    /// Resolve `(tag, bytes)` through the constructor registry.
    pub fn load(ponum: u32, content: Bytes) -> Result<Self, WireError> {
        for c in CONSTRUCTORS {
            if ponum::prefix_matches(ponum, c.tag, c.mask) {
                return (c.load)(ponum, content);
            }
        }
        // The mask-0 base row matches every tag.
        load_base(ponum, content)
    }

    /// Wrap raw bytes under an arbitrary tag.
    pub fn base(ponum: u32, content: impl Into<Bytes>) -> Self {
        Self::Base { ponum, content: content.into() }
    }

    /// A human-readable object under a tag in the text family.
    pub fn text(ponum: u32, value: &str) -> Self {
        Self::Text { ponum, content: Bytes::copy_from_slice(value.as_bytes()) }
    }

    /// A plain string object (`64.0.1.0`).
    pub fn string(value: &str) -> Self {
        Self::text(ponum::STRING, value)
    }

    /// A metadata tuple object (`2.0.3.1`).
    pub fn metadata(tuple: MetadataTuple) -> Result<Self, WireError> {
        let content = tuple.to_bytes()?;
        Ok(Self::Metadata { ponum: ponum::SMETADATA, content, tuple })
    }

    /// Type tag.
    pub fn ponum(&self) -> u32 {
        match self {
            Self::Base { ponum, .. } | Self::Text { ponum, .. } | Self::Metadata { ponum, .. } => {
                *ponum
            }
        }
    }

    /// Dotted-quad form of the type tag.
    pub fn dot_form(&self) -> String {
        ponum::dot_form(self.ponum())
    }

    /// Raw content bytes, exactly as on the wire.
    pub fn content(&self) -> &Bytes {
        match self {
            Self::Base { content, .. }
            | Self::Text { content, .. }
            | Self::Metadata { content, .. } => content,
        }
    }

    /// Text value, when this is a text-family object.
    pub fn text_value(&self) -> Option<&str> {
        match self {
            Self::Text { content, .. } => std::str::from_utf8(content).ok(),
            _ => None,
        }
    }

    /// Decoded tuple, when this is a metadata object.
    pub fn metadata_tuple(&self) -> Option<&MetadataTuple> {
        match self {
            Self::Metadata { tuple, .. } => Some(tuple),
            _ => None,
        }
    }

    /// One-line human description, content included for text objects.
    pub fn text_representation(&self) -> String {
        match self {
            Self::Text { content, .. } => format!(
                "PO {} len {}:\n{}",
                self.dot_form(),
                content.len(),
                String::from_utf8_lossy(content)
            ),
            _ => format!("PO {} len {}", self.dot_form(), self.content().len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_preserves_tag_and_content() {
        let cases: &[(u32, &[u8])] = &[
            (ponum::BASE, b"raw"),
            (ponum::BLOB, b"\x00\x01\x02"),
            (ponum::STRING, b"hello"),
            (ponum::TEXT, b""),
        ];
        for (tag, bytes) in cases {
            let po = PayloadObject::load(*tag, Bytes::copy_from_slice(bytes)).unwrap();
            assert_eq!(po.ponum(), *tag);
            assert_eq!(po.content().as_ref(), *bytes);
        }
    }

    #[test]
    fn text_family_resolves_by_prefix() {
        let po = PayloadObject::load(0x4f00_0000, Bytes::from_static(b"still text")).unwrap();
        assert_eq!(po.text_value(), Some("still text"));
    }

    #[test]
    fn invalid_utf8_text_is_an_object_error() {
        let err = PayloadObject::load(ponum::STRING, Bytes::from_static(b"\xff\xfe"));
        assert_eq!(err, Err(WireError::BadUtf8));
    }

    #[test]
    fn metadata_round_trip() {
        let tuple = MetadataTuple { value: "building-7".to_owned(), timestamp: 1_500_000_000_000_000_000 };
        let po = PayloadObject::metadata(tuple.clone()).unwrap();
        assert_eq!(po.ponum(), ponum::SMETADATA);

        let reloaded = PayloadObject::load(po.ponum(), po.content().clone()).unwrap();
        assert_eq!(reloaded.metadata_tuple(), Some(&tuple));
    }

    #[test]
    fn damaged_metadata_is_an_object_error() {
        let err = PayloadObject::load(ponum::SMETADATA, Bytes::from_static(b"\xc1"));
        assert!(matches!(err, Err(WireError::BadMetadataTuple(_))));
    }

    #[test]
    fn base_fallback_matches_anything() {
        let po = PayloadObject::load(0xdead_beef, Bytes::from_static(b"?")).unwrap();
        assert!(matches!(po, PayloadObject::Base { .. }));
        assert_eq!(po.dot_form(), "222.173.190.239");
    }
}
