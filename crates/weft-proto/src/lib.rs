//! Wire protocol for the Weft messaging fabric.
//!
//! A Weft frame is a text-prefixed binary unit: a fixed-width ASCII header
//! line carrying the command, total body length, and sequence number,
//! followed by a sequence of length-prefixed items (`kv` headers, `ro`
//! routing objects, `po` payload objects) and an `end` terminator. The
//! format is self-describing and bit-exact against the router peer.
//!
//! # Components
//!
//! - [`Frame`]: the request/reply unit, with incremental length accounting
//! - [`PayloadObject`]: tagged payload variants resolved through a
//!   prefix-mask constructor registry
//! - [`RoutingObject`]: opaque delegation material transported verbatim
//! - [`ponum`]: dotted-quad type-tag arithmetic
//! - [`keys`]: URL-safe base64 forms for keys, signatures, and hashes

mod error;
mod frame;
pub mod keys;
mod payload;
pub mod ponum;
mod routing;

pub use error::WireError;
pub use frame::{Frame, HEADER_LINE_LEN, Header, HeaderLine, PayloadEntry, commands, headers};
pub use payload::{MetadataTuple, PayloadObject};
pub use routing::{RoutingObject, ronum};
