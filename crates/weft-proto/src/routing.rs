//! Routing objects.
//!
//! Routing objects carry delegation material (entities, DOTs, chains,
//! designated-router advertisements). The client core treats them as
//! opaque: content bytes travel to and from the router verbatim, and only
//! the numeric tag is interpreted, by the router.

use bytes::Bytes;

/// Well-known routing-object type tags.
pub mod ronum {
    /// Full access d-chain.
    pub const ACCESS_DCHAIN: u8 = 0x01;
    /// Access d-chain identified by hash.
    pub const ACCESS_DCHAIN_HASH: u8 = 0x02;
    /// Full permission d-chain.
    pub const PERMISSION_DCHAIN: u8 = 0x11;
    /// Permission d-chain identified by hash.
    pub const PERMISSION_DCHAIN_HASH: u8 = 0x12;
    /// Access declaration of trust.
    pub const ACCESS_DOT: u8 = 0x20;
    /// Permission declaration of trust.
    pub const PERMISSION_DOT: u8 = 0x21;
    /// Entity (verifying key only).
    pub const ENTITY: u8 = 0x30;
    /// Verifying key of a message origin.
    pub const ORIGIN_VK: u8 = 0x31;
    /// Entity including its signing key.
    pub const ENTITY_WKEY: u8 = 0x32;
    /// Designated-router verifying key.
    pub const DESIGNATED_ROUTER_VK: u8 = 0x33;
    /// Expiry marker.
    pub const EXPIRY: u8 = 0x40;
}

/// A numeric tag plus opaque content, transported verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingObject {
    /// Type tag; meaningful to the router, not to this library.
    pub ronum: u8,
    /// Raw object bytes.
    pub content: Bytes,
}

impl RoutingObject {
    /// Wrap raw bytes under a routing-object tag.
    pub fn new(ronum: u8, content: impl Into<Bytes>) -> Self {
        Self { ronum, content: content.into() }
    }
}
