//! High-level session operations: publish, subscribe, query, list,
//! entity and DOT management, and chain building.
//!
//! Every operation allocates a sequence number, assembles a request frame
//! from its parameter struct, and runs it through the multiplexer. The
//! first reply is always a status frame; streaming operations hand the
//! rest of the stream through a projection.

use bytes::Bytes;
use tokio::sync::mpsc;
use weft_proto::{Frame, RoutingObject, commands, headers, ponum};

use crate::{
    error::ClientError,
    message::{self, SimpleChain, SimpleMessage},
    params::{
        CreateChainParams, CreateDotParams, CreateEntityParams, ListParams, PublishParams,
        QueryParams, SubscribeParams, duration_header, expiry_header,
    },
    session::Client,
};

fn bool_str(v: bool) -> &'static str {
    if v { "true" } else { "false" }
}

fn add_expiry(
    frame: &mut Frame,
    expiry: Option<&chrono::DateTime<chrono::Utc>>,
    delta: Option<std::time::Duration>,
) {
    if let Some(t) = expiry {
        frame.add_header("expiry", &expiry_header(t));
    }
    if let Some(d) = delta {
        frame.add_header("expirydelta", &duration_header(d));
    }
}

impl Client {
    /// Publish payload objects to a URI; `persist` routes through the
    /// persistence command instead.
    pub async fn publish(&self, p: PublishParams) -> Result<(), ClientError> {
        let cmd = if p.persist { commands::PERSIST } else { commands::PUBLISH };
        let mut req = Frame::new(cmd, self.next_seqno());
        if self.auto_chain(p.auto_chain) {
            req.add_header("autochain", "true");
        }
        add_expiry(&mut req, p.expiry.as_ref(), p.expiry_delta);
        req.add_header(headers::URI, &p.uri);
        if !p.primary_access_chain.is_empty() {
            req.add_header("primary_access_chain", &p.primary_access_chain);
        }
        for ro in p.routing_objects {
            req.add_routing_object(ro);
        }
        for po in &p.payload_objects {
            req.add_payload_object(po);
        }
        req.add_header("elaborate_pac", p.elaborate_pac.as_str());
        req.add_header("doverify", bool_str(!p.do_not_verify));
        req.add_header("persist", bool_str(p.persist));
        self.round_trip(req).await.map(|_| ())
    }

    /// Subscribe to a URI pattern, streaming matching messages until the
    /// router ends the subscription or the stream is dropped.
    pub async fn subscribe(
        &self,
        p: SubscribeParams,
    ) -> Result<mpsc::Receiver<Result<SimpleMessage, ClientError>>, ClientError> {
        let req = self.sub_query_frame(commands::SUBSCRIBE, &p);
        let rx = self.streaming(req).await?;
        Ok(message::spawn_messages(rx))
    }

    /// Query persisted messages matching a URI pattern.
    pub async fn query(
        &self,
        p: QueryParams,
    ) -> Result<mpsc::Receiver<Result<SimpleMessage, ClientError>>, ClientError> {
        let req = self.sub_query_frame(commands::QUERY, &p);
        let rx = self.streaming(req).await?;
        Ok(message::spawn_messages(rx))
    }

    /// Query and keep only the first result, draining the rest in the
    /// background. `None` when nothing matched.
    pub async fn query_one(&self, p: QueryParams) -> Result<Option<SimpleMessage>, ClientError> {
        let mut rx = self.query(p).await?;
        match rx.recv().await {
            Some(Ok(msg)) => {
                tokio::spawn(async move { while rx.recv().await.is_some() {} });
                Ok(Some(msg))
            }
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    fn sub_query_frame(&self, cmd: &str, p: &SubscribeParams) -> Frame {
        let mut req = Frame::new(cmd, self.next_seqno());
        if self.auto_chain(p.auto_chain) {
            req.add_header("autochain", "true");
        }
        add_expiry(&mut req, p.expiry.as_ref(), p.expiry_delta);
        req.add_header(headers::URI, &p.uri);
        if !p.primary_access_chain.is_empty() {
            req.add_header("primary_access_chain", &p.primary_access_chain);
        }
        for ro in &p.routing_objects {
            req.add_routing_object(ro.clone());
        }
        req.add_header("elaborate_pac", p.elaborate_pac.as_str());
        if !p.leave_packed {
            req.add_header("unpack", "true");
        }
        req.add_header("doverify", bool_str(!p.do_not_verify));
        req
    }

    /// Enumerate the children of a URI. List-mode requests travel under
    /// the query command and stream one `child` header per result.
    pub async fn list(
        &self,
        p: ListParams,
    ) -> Result<mpsc::Receiver<Result<String, ClientError>>, ClientError> {
        let mut req = Frame::new(commands::QUERY, self.next_seqno());
        if self.auto_chain(p.auto_chain) {
            req.add_header("autochain", "true");
        }
        add_expiry(&mut req, p.expiry.as_ref(), p.expiry_delta);
        req.add_header(headers::URI, &p.uri);
        if !p.primary_access_chain.is_empty() {
            req.add_header("primary_access_chain", &p.primary_access_chain);
        }
        for ro in p.routing_objects {
            req.add_routing_object(ro);
        }
        req.add_header("elaborate_pac", p.elaborate_pac.as_str());
        req.add_header("doverify", bool_str(!p.do_not_verify));
        let rx = self.streaming(req).await?;
        Ok(message::spawn_children(rx))
    }

    /// Mint a new entity. Returns its verifying key and the
    /// entity-with-key blob.
    pub async fn create_entity(
        &self,
        p: CreateEntityParams,
    ) -> Result<(String, Bytes), ClientError> {
        let mut req = Frame::new(commands::MAKE_ENTITY, self.next_seqno());
        add_expiry(&mut req, p.expiry.as_ref(), p.expiry_delta);
        req.add_header("contact", &p.contact);
        req.add_header("comment", &p.comment);
        for rvk in &p.revokers {
            req.add_header("revoker", rvk);
        }
        if p.omit_creation_date {
            req.add_header("omitcreationdate", "true");
        }
        let reply = self.round_trip(req).await?;
        let [po] = reply.payloads() else {
            return Err(ClientError::Protocol("bad make-entity response".to_owned()));
        };
        let vk = reply.first_header(headers::VK).unwrap_or_default();
        Ok((vk, po.content.clone()))
    }

    /// Mint an access DOT. Returns its hash and the DOT blob.
    pub async fn create_dot(&self, p: CreateDotParams) -> Result<(String, Bytes), ClientError> {
        if p.is_permission {
            return Err(ClientError::Usage("permission DOTs are not supported".to_owned()));
        }
        let mut req = Frame::new(commands::MAKE_DOT, self.next_seqno());
        add_expiry(&mut req, p.expiry.as_ref(), p.expiry_delta);
        req.add_header("contact", &p.contact);
        req.add_header("comment", &p.comment);
        for rvk in &p.revokers {
            req.add_header("revoker", rvk);
        }
        if p.omit_creation_date {
            req.add_header("omitcreationdate", "true");
        }
        req.add_header("ttl", &p.ttl.to_string());
        req.add_header("to", &p.to);
        req.add_header("ispermission", bool_str(p.is_permission));
        req.add_header(headers::URI, &p.uri);
        req.add_header("accesspermissions", &p.access_permissions);
        let reply = self.round_trip(req).await?;
        let [po] = reply.payloads() else {
            return Err(ClientError::Protocol("bad make-dot response".to_owned()));
        };
        let hash = reply.first_header(headers::HASH).unwrap_or_default();
        Ok((hash, po.content.clone()))
    }

    /// Assemble a delegation chain from DOT hashes. Returns the chain
    /// hash and its routing object.
    pub async fn create_dot_chain(
        &self,
        p: CreateChainParams,
    ) -> Result<(String, RoutingObject), ClientError> {
        let mut req = Frame::new(commands::MAKE_CHAIN, self.next_seqno());
        req.add_header("ispermission", bool_str(p.is_permission));
        req.add_header("unelaborate", bool_str(p.unelaborate));
        for dot in &p.dots {
            req.add_header("dot", dot);
        }
        let reply = self.round_trip(req).await?;
        let [ro] = reply.routing_objects() else {
            return Err(ClientError::Protocol("bad make-chain response".to_owned()));
        };
        let hash = reply.first_header(headers::HASH).unwrap_or_default();
        Ok((hash, ro.clone()))
    }

    /// Set the entity this session operates as, from an entity-with-key
    /// blob. Returns the entity's verifying key.
    pub async fn set_entity(&self, keyfile: &[u8]) -> Result<String, ClientError> {
        let mut req = Frame::new(commands::SET_ENTITY, self.next_seqno());
        req.add_payload(ponum::RO_ENTITY_WKEY, Bytes::copy_from_slice(keyfile));
        let reply = self.round_trip(req).await?;
        Ok(reply.first_header(headers::VK).unwrap_or_default())
    }

    /// Set the session entity from a persisted entity file. The file's
    /// leading framing byte is stripped before transmission.
    pub async fn set_entity_file(&self, path: &str) -> Result<String, ClientError> {
        let contents = tokio::fs::read(path).await?;
        let Some(blob) = contents.get(1..) else {
            return Err(ClientError::Usage(format!("entity file {path} is empty")));
        };
        self.set_entity(blob).await
    }

    /// Ask the router to discover chains granting `permissions` on `uri`
    /// to entity `to`, streaming each chain found.
    pub async fn build_chain(
        &self,
        uri: &str,
        permissions: &str,
        to: &str,
    ) -> Result<mpsc::Receiver<Result<SimpleChain, ClientError>>, ClientError> {
        let mut req = Frame::new(commands::BUILD_CHAIN, self.next_seqno());
        req.add_header(headers::URI, uri);
        req.add_header("to", to);
        req.add_header("accesspermissions", permissions);
        let rx = self.streaming(req).await?;
        Ok(message::spawn_chains(rx))
    }

    /// Build-chain, keeping the first discovered chain and draining the
    /// rest in the background.
    pub async fn build_any_chain(
        &self,
        uri: &str,
        permissions: &str,
        to: &str,
    ) -> Result<SimpleChain, ClientError> {
        let mut rx = self.build_chain(uri, permissions, to).await?;
        match rx.recv().await {
            Some(Ok(chain)) => {
                tokio::spawn(async move { while rx.recv().await.is_some() {} });
                Ok(chain)
            }
            Some(Err(e)) => Err(e),
            None => Err(ClientError::NoResult),
        }
    }
}
