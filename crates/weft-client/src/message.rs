//! User-facing projections of reply frames.
//!
//! Streaming operations deliver raw frames; this module shapes them into
//! [`SimpleMessage`] (inbound publish data), `child` strings (list mode),
//! and [`SimpleChain`] (build-chain results). A frame carrying
//! `finished: true` is a stream delimiter and is never surfaced as data.

use bytes::Bytes;
use tokio::sync::mpsc;
use weft_proto::{Frame, MetadataTuple, PayloadObject, RoutingObject, WireError, headers};

use crate::error::ClientError;

/// Capacity of projected consumer streams.
const MESSAGE_CAPACITY: usize = 10;

/// An inbound message delivered by subscribe or query.
///
/// Payload objects decode independently: a malformed object lands in
/// `po_errors` while its well-formed siblings stay in `pos`.
#[derive(Debug, Clone)]
pub struct SimpleMessage {
    /// Verifying key of the origin entity.
    pub from: String,
    /// URI the message was published to.
    pub uri: String,
    /// Successfully decoded payload objects, in wire order.
    pub pos: Vec<PayloadObject>,
    /// Decode failures for the objects missing from `pos`.
    pub po_errors: Vec<WireError>,
    /// Routing objects, transported verbatim.
    pub ros: Vec<RoutingObject>,
}

impl SimpleMessage {
    /// Project a data frame.
    pub(crate) fn from_frame(frame: &Frame) -> Self {
        let (pos, po_errors) = frame.payload_objects();
        Self {
            from: frame.first_header(headers::FROM).unwrap_or_default(),
            uri: frame.first_header(headers::URI).unwrap_or_default(),
            pos,
            po_errors,
            ros: frame.routing_objects().to_vec(),
        }
    }

    /// First payload object with the given type tag.
    pub fn one_po(&self, ponum: u32) -> Option<&PayloadObject> {
        self.pos.iter().find(|po| po.ponum() == ponum)
    }

    /// First metadata tuple among the payload objects, if any.
    pub fn first_metadata(&self) -> Option<&MetadataTuple> {
        self.pos.iter().find_map(PayloadObject::metadata_tuple)
    }
}

/// One authorization chain discovered by build-chain.
#[derive(Debug, Clone)]
pub struct SimpleChain {
    /// Chain hash.
    pub hash: String,
    /// Permissions the chain grants.
    pub permissions: String,
    /// Verifying key of the grantee.
    pub to: String,
    /// URI the chain grants on.
    pub uri: String,
    /// Raw chain content.
    pub content: Bytes,
}

impl SimpleChain {
    /// Project a build-chain result frame. `None` when the frame carries
    /// no hash (delimiters and keepalives).
    pub(crate) fn from_frame(frame: &Frame) -> Option<Self> {
        let hash = frame.first_header(headers::HASH).filter(|h| !h.is_empty())?;
        Some(Self {
            hash,
            permissions: frame.first_header("permissions").unwrap_or_default(),
            to: frame.first_header("to").unwrap_or_default(),
            uri: frame.first_header(headers::URI).unwrap_or_default(),
            content: frame.payloads().first().map(|p| p.content.clone()).unwrap_or_default(),
        })
    }
}

/// Whether a frame is the stream delimiter rather than data.
fn is_delimiter(frame: &Frame) -> bool {
    frame.header_is(headers::FINISHED, "true")
}

/// Project a frame stream into messages on a fresh channel.
pub(crate) fn spawn_messages(
    mut rx: mpsc::Receiver<Result<Frame, ClientError>>,
) -> mpsc::Receiver<Result<SimpleMessage, ClientError>> {
    let (tx, out) = mpsc::channel(MESSAGE_CAPACITY);
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            let forwarded = match item {
                Ok(frame) if is_delimiter(&frame) => continue,
                Ok(frame) => tx.send(Ok(SimpleMessage::from_frame(&frame))).await,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            if forwarded.is_err() {
                return;
            }
        }
    });
    out
}

/// Project a frame stream into `child` header strings.
pub(crate) fn spawn_children(
    mut rx: mpsc::Receiver<Result<Frame, ClientError>>,
) -> mpsc::Receiver<Result<String, ClientError>> {
    let (tx, out) = mpsc::channel(MESSAGE_CAPACITY);
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            let forwarded = match item {
                Ok(frame) if is_delimiter(&frame) => continue,
                Ok(frame) => match frame.first_header(headers::CHILD) {
                    Some(child) => tx.send(Ok(child)).await,
                    None => continue,
                },
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            if forwarded.is_err() {
                return;
            }
        }
    });
    out
}

/// Project a frame stream into chains, skipping hashless frames.
pub(crate) fn spawn_chains(
    mut rx: mpsc::Receiver<Result<Frame, ClientError>>,
) -> mpsc::Receiver<Result<SimpleChain, ClientError>> {
    let (tx, out) = mpsc::channel(MESSAGE_CAPACITY);
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            let forwarded = match item {
                Ok(frame) => match SimpleChain::from_frame(&frame) {
                    Some(chain) => tx.send(Ok(chain)).await,
                    None => continue,
                },
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            if forwarded.is_err() {
                return;
            }
        }
    });
    out
}
