//! Client for the Weft publish/subscribe messaging fabric.
//!
//! A process links this crate to speak the framed router protocol over
//! TCP: publish to hierarchical URIs, subscribe to URI patterns, issue
//! registry queries, manage entities and delegation chains, and build
//! live [`view::View`]s over metadata-annotated URI space.
//!
//! # Architecture
//!
//! One [`Client`] owns one TCP connection. Every operation allocates a
//! sequence number and runs through the transaction multiplexer, which
//! shares the connection across all in-flight requests and fans reply
//! frames out to per-request streams. Replies stream over bounded
//! channels; a `finished` delimiter, cancellation, or connection loss
//! closes them.
//!
//! # Example
//!
//! ```no_run
//! use weft_client::{Client, PublishParams};
//! use weft_proto::PayloadObject;
//!
//! # async fn demo() -> Result<(), weft_client::ClientError> {
//! let client = Client::connect("").await?;
//! client
//!     .publish(PublishParams {
//!         uri: "scratch.ns/test".to_owned(),
//!         payload_objects: vec![PayloadObject::string("hello")],
//!         auto_chain: true,
//!         ..Default::default()
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod message;
mod metadata;
mod ops;
mod params;
mod registry;
mod session;
pub mod view;

pub use config::render_config;
pub use error::ClientError;
pub use message::{SimpleChain, SimpleMessage};
pub use metadata::META_INFIX;
pub use params::{
    BcParams, CreateChainParams, CreateDotParams, CreateEntityParams, ElaboratePac, ListParams,
    PublishParams, QueryParams, SubscribeParams,
};
pub use registry::{BalanceInfo, ChainState, RegistryValidity};
pub use session::{Client, DEFAULT_PORT};
pub use weft_proto::{Frame, MetadataTuple, PayloadObject, RoutingObject, WireError};
