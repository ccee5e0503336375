//! Client error types.
//!
//! Errors are grouped the way they reach callers: connection faults
//! (dialing, handshake, read-loop teardown), wire faults bubbled up from
//! the codec, application failures relayed verbatim from the router's
//! `reason` header, and usage faults caught before anything hits the wire.

use thiserror::Error;
use weft_proto::WireError;

/// Errors surfaced by client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Dialing or socket-level failure.
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    /// The peer's first frame was not a well-formed HELLO.
    #[error("Bad router")]
    BadRouter,

    /// The peer sent nothing within the handshake deadline.
    #[error("Timeout on HELO")]
    HelloTimeout,

    /// Frame-level damage on the connection.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The router rejected an operation; the reason travels verbatim.
    #[error("{reason}")]
    App {
        /// Router-supplied failure text.
        reason: String,
    },

    /// The reply violated the protocol in a way the codec cannot express.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The connection died with streams still in flight.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// A streaming operation completed without producing anything.
    #[error("no result")]
    NoResult,

    /// The caller supplied arguments that cannot be sent.
    #[error("{0}")]
    Usage(String),
}
