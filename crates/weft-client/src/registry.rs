//! Registry, alias, account, and designated-router operations.
//!
//! These upload delegation material to the router's registry, resolve
//! aliases and registry objects, inspect account balances and chain
//! interaction parameters, and manage designated-router offers for a
//! namespace.

use bytes::Bytes;
use weft_proto::{Frame, RoutingObject, commands, headers, keys, ponum};

use crate::{error::ClientError, session::Client};

/// Registry resolution states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryValidity {
    /// The object exists and is currently valid.
    Valid,
    /// The object exists but has expired.
    Expired,
    /// The object exists but was revoked.
    Revoked,
    /// The registry has no such object.
    Unknown,
}

impl RegistryValidity {
    /// Wire token for this state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::Unknown => "unknown",
        }
    }

    fn parse(token: &str) -> Result<Self, ClientError> {
        match token {
            "valid" => Ok(Self::Valid),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            "unknown" => Ok(Self::Unknown),
            other => Err(ClientError::Protocol(format!("unknown validity token {other:?}"))),
        }
    }
}

/// One account balance as reported by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceInfo {
    /// Account address, hex without the `0x` prefix.
    pub addr: String,
    /// Balance as a decimal string in wei.
    pub decimal: String,
    /// Human-readable rendering.
    pub human: String,
}

impl BalanceInfo {
    fn parse(content: &[u8]) -> Result<Self, ClientError> {
        let text = std::str::from_utf8(content)
            .map_err(|_| ClientError::Protocol("balance payload is not utf-8".to_owned()))?;
        let mut parts = text.splitn(3, ',');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(addr), Some(decimal), Some(human)) => Ok(Self {
                addr: addr.to_owned(),
                decimal: decimal.to_owned(),
                human: human.to_owned(),
            }),
            _ => Err(ClientError::Protocol(format!("bad balance payload {text:?}"))),
        }
    }
}

/// Chain-interaction parameters currently in force, plus chain state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainState {
    /// Confirmations required before an operation is final.
    pub confirmations: i64,
    /// Seconds to wait for confirmations.
    pub timeout: i64,
    /// Maximum acceptable registry age in seconds.
    pub max_age: i64,
    /// Age of the current block in seconds.
    pub current_age: i64,
    /// Current block number.
    pub current_block: u64,
    /// Connected peer count.
    pub peers: i64,
    /// Highest block seen on the network.
    pub highest_block: i64,
    /// Current difficulty.
    pub difficulty: i64,
}

fn header_i64(frame: &Frame, key: &str) -> i64 {
    frame.first_header(key).and_then(|v| v.parse().ok()).unwrap_or_default()
}

impl Client {
    /// Upload an access DOT blob to the registry. Returns its hash.
    pub async fn publish_dot(&self, blob: &[u8]) -> Result<String, ClientError> {
        self.publish_dot_with_account(blob, 0).await
    }

    /// Upload an access DOT, bank-rolled by `account`.
    pub async fn publish_dot_with_account(
        &self,
        blob: &[u8],
        account: u32,
    ) -> Result<String, ClientError> {
        let mut req = Frame::new(commands::PUT_DOT, self.next_seqno());
        req.add_payload(ponum::RO_ACCESS_DOT, Bytes::copy_from_slice(blob));
        req.add_header("account", &account.to_string());
        let reply = self.round_trip(req).await?;
        Ok(reply.first_header(headers::HASH).unwrap_or_default())
    }

    /// Upload an entity blob to the registry. Returns its verifying key.
    pub async fn publish_entity(&self, blob: &[u8]) -> Result<String, ClientError> {
        self.publish_entity_with_account(blob, 0).await
    }

    /// Upload an entity, bank-rolled by `account`.
    pub async fn publish_entity_with_account(
        &self,
        blob: &[u8],
        account: u32,
    ) -> Result<String, ClientError> {
        let mut req = Frame::new(commands::PUT_ENTITY, self.next_seqno());
        req.add_payload(ponum::RO_ENTITY, Bytes::copy_from_slice(blob));
        req.add_header("account", &account.to_string());
        let reply = self.round_trip(req).await?;
        Ok(reply.first_header(headers::VK).unwrap_or_default())
    }

    /// Upload an access chain blob to the registry. Returns its hash.
    pub async fn publish_chain(&self, blob: &[u8]) -> Result<String, ClientError> {
        self.publish_chain_with_account(blob, 0).await
    }

    /// Upload an access chain, bank-rolled by `account`.
    pub async fn publish_chain_with_account(
        &self,
        blob: &[u8],
        account: u32,
    ) -> Result<String, ClientError> {
        let mut req = Frame::new(commands::PUT_CHAIN, self.next_seqno());
        req.add_payload(ponum::RO_ACCESS_DCHAIN, Bytes::copy_from_slice(blob));
        req.add_header("account", &account.to_string());
        let reply = self.round_trip(req).await?;
        Ok(reply.first_header(headers::HASH).unwrap_or_default())
    }

    /// Resolve a long alias. `None` when the alias is unset (the router
    /// reports absence as an all-zero 32-byte value).
    pub async fn resolve_long_alias(&self, alias: &str) -> Result<Option<Bytes>, ClientError> {
        self.resolve_alias_key("longkey", alias).await
    }

    /// Resolve a short alias; absence semantics match the long form.
    pub async fn resolve_short_alias(&self, alias: &str) -> Result<Option<Bytes>, ClientError> {
        self.resolve_alias_key("shortkey", alias).await
    }

    async fn resolve_alias_key(
        &self,
        kind: &str,
        alias: &str,
    ) -> Result<Option<Bytes>, ClientError> {
        let mut req = Frame::new(commands::RESOLVE_ALIAS, self.next_seqno());
        req.add_header(kind, alias);
        let reply = self.round_trip(req).await?;
        let value = reply.first_header_bytes(headers::VALUE).cloned().unwrap_or_default();
        if value.len() == keys::KEY_LEN && value.iter().all(|b| *b == 0) {
            return Ok(None);
        }
        Ok(Some(value))
    }

    /// Reverse resolution: find the alias key whose value is `value`.
    pub async fn unresolve_alias(&self, value: &[u8]) -> Result<String, ClientError> {
        let mut req = Frame::new(commands::RESOLVE_ALIAS, self.next_seqno());
        req.add_header_bytes("unresolve", Bytes::copy_from_slice(value));
        let reply = self.round_trip(req).await?;
        Ok(reply.first_header(headers::VALUE).unwrap_or_default())
    }

    /// Resolve an alias embedded in a URI or header, as text.
    pub async fn resolve_embedded_alias(&self, alias: &str) -> Result<String, ClientError> {
        let mut req = Frame::new(commands::RESOLVE_ALIAS, self.next_seqno());
        req.add_header("longkey", alias);
        let reply = self.round_trip(req).await?;
        Ok(reply.first_header(headers::VALUE).unwrap_or_default())
    }

    /// Resolve a registry object by key (VK, hash, or alias). Returns the
    /// object, when known, and its validity.
    pub async fn resolve_registry(
        &self,
        key: &str,
    ) -> Result<(Option<RoutingObject>, RegistryValidity), ClientError> {
        let mut req = Frame::new(commands::RESOLVE_REGISTRY, self.next_seqno());
        req.add_header("key", key);
        let reply = self.round_trip(req).await?;
        let Some(ro) = reply.routing_objects().first() else {
            return Ok((None, RegistryValidity::Unknown));
        };
        let token = reply.first_header(headers::VALIDITY).unwrap_or_default();
        Ok((Some(ro.clone()), RegistryValidity::parse(&token)?))
    }

    /// Balances of every account owned by the session entity.
    pub async fn entity_balances(&self) -> Result<Vec<BalanceInfo>, ClientError> {
        let req = Frame::new(commands::ENTITY_BALANCES, self.next_seqno());
        let reply = self.round_trip(req).await?;
        let mut balances = Vec::new();
        for entry in reply.payloads() {
            if entry.ponum == ponum::ACCOUNT_BALANCE {
                balances.push(BalanceInfo::parse(&entry.content)?);
            }
        }
        Ok(balances)
    }

    /// Balance of an arbitrary address, given as 40 hex characters with
    /// an optional `0x` prefix.
    pub async fn address_balance(&self, addr: &str) -> Result<BalanceInfo, ClientError> {
        let addr = addr.strip_prefix("0x").unwrap_or(addr);
        if addr.len() != 40 || !addr.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ClientError::Usage("address must be 40 hex characters".to_owned()));
        }
        let mut req = Frame::new(commands::ADDRESS_BALANCE, self.next_seqno());
        req.add_header("address", addr);
        let reply = self.round_trip(req).await?;
        let [entry] = reply.payloads() else {
            return Err(ClientError::Protocol("bad balance response".to_owned()));
        };
        BalanceInfo::parse(&entry.content)
    }

    /// Read the chain-interaction parameters currently in force.
    pub async fn bc_interaction_params(&self) -> Result<ChainState, ClientError> {
        self.set_bc_interaction_params(None).await
    }

    /// Update chain-interaction parameters and return the resulting state.
    pub async fn set_bc_interaction_params(
        &self,
        to: Option<crate::params::BcParams>,
    ) -> Result<ChainState, ClientError> {
        let mut req = Frame::new(commands::BC_PARAMS, self.next_seqno());
        if let Some(p) = to {
            if let Some(c) = p.confirmations {
                req.add_header("confirmations", &c.to_string());
            }
            if let Some(t) = p.timeout {
                req.add_header("timeout", &t.to_string());
            }
            if let Some(m) = p.max_age {
                req.add_header("maxage", &m.to_string());
            }
        }
        let reply = self.round_trip(req).await?;
        Ok(ChainState {
            confirmations: header_i64(&reply, "confirmations"),
            timeout: header_i64(&reply, "timeout"),
            max_age: header_i64(&reply, "maxage"),
            current_age: header_i64(&reply, "currentage"),
            current_block: header_i64(&reply, "currentblock") as u64,
            peers: header_i64(&reply, "peers"),
            highest_block: header_i64(&reply, "highest"),
            difficulty: header_i64(&reply, "difficulty"),
        })
    }

    /// Transfer `wei` (a decimal string) from an account to an address.
    pub async fn transfer_wei(
        &self,
        from_account: u32,
        to: &str,
        wei: &str,
    ) -> Result<(), ClientError> {
        let mut req = Frame::new(commands::TRANSFER, self.next_seqno());
        req.add_header("account", &from_account.to_string());
        req.add_header("address", to);
        req.add_header("valuewei", wei);
        self.round_trip(req).await.map(|_| ())
    }

    /// Offer to act as designated router for namespace `nsvk`. An
    /// entity-with-key blob selects which router entity makes the offer.
    pub async fn new_dr_offer(
        &self,
        account: u32,
        nsvk: &str,
        dr: Option<&[u8]>,
    ) -> Result<(), ClientError> {
        let mut req = Frame::new(commands::NEW_DR_OFFER, self.next_seqno());
        req.add_header("account", &account.to_string());
        req.add_header("nsvk", nsvk);
        if let Some(blob) = dr {
            req.add_payload(ponum::RO_ENTITY_WKEY, Bytes::copy_from_slice(blob));
        }
        self.round_trip(req).await.map(|_| ())
    }

    /// Designated-router offers outstanding for a namespace: the active
    /// router VK, its SRV record, and every offering router's VK.
    pub async fn dr_offers(
        &self,
        nsvk: &str,
    ) -> Result<(String, String, Vec<String>), ClientError> {
        let mut req = Frame::new(commands::LIST_DR_OFFERS, self.next_seqno());
        req.add_header("nsvk", nsvk);
        let reply = self.round_trip(req).await?;
        let mut drvks = Vec::new();
        for entry in reply.payloads() {
            if entry.ponum == ponum::RO_DESIGNATED_ROUTER_VK {
                drvks.push(keys::fmt_key(&entry.content));
            }
        }
        let active = reply.first_header("active").unwrap_or_default();
        let srv = reply.first_header("srv").unwrap_or_default();
        Ok((active, srv, drvks))
    }

    /// Accept a designated-router offer on behalf of a namespace. An
    /// entity-with-key blob selects which namespace entity accepts.
    pub async fn accept_dr_offer(
        &self,
        account: u32,
        drvk: &str,
        ns: Option<&[u8]>,
    ) -> Result<(), ClientError> {
        let mut req = Frame::new(commands::ACCEPT_DR_OFFER, self.next_seqno());
        req.add_header("account", &account.to_string());
        req.add_header("drvk", drvk);
        if let Some(blob) = ns {
            req.add_payload(ponum::RO_ENTITY_WKEY, Bytes::copy_from_slice(blob));
        }
        self.round_trip(req).await.map(|_| ())
    }

    /// Update the SRV record advertised for a designated router.
    pub async fn set_dr_srv_record(
        &self,
        account: u32,
        srv: &str,
        dr: Option<&[u8]>,
    ) -> Result<(), ClientError> {
        let mut req = Frame::new(commands::UPDATE_SRV_RECORD, self.next_seqno());
        req.add_header("account", &account.to_string());
        req.add_header("srv", srv);
        if let Some(blob) = dr {
            req.add_payload(ponum::RO_ENTITY_WKEY, Bytes::copy_from_slice(blob));
        }
        self.round_trip(req).await.map(|_| ())
    }

    /// Create a long alias mapping `key` to `value`; both are capped at
    /// 32 bytes.
    pub async fn create_long_alias(
        &self,
        account: u32,
        key: &[u8],
        value: &[u8],
    ) -> Result<(), ClientError> {
        if key.len() > 32 || value.len() > 32 {
            return Err(ClientError::Usage(
                "alias key and value must be at most 32 bytes".to_owned(),
            ));
        }
        let mut req = Frame::new(commands::MAKE_LONG_ALIAS, self.next_seqno());
        req.add_header("account", &account.to_string());
        req.add_header_bytes("content", Bytes::copy_from_slice(value));
        req.add_header_bytes("key", Bytes::copy_from_slice(key));
        self.round_trip(req).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_tokens_parse() {
        assert_eq!(RegistryValidity::parse("valid").unwrap(), RegistryValidity::Valid);
        assert_eq!(RegistryValidity::parse("expired").unwrap(), RegistryValidity::Expired);
        assert_eq!(RegistryValidity::parse("revoked").unwrap(), RegistryValidity::Revoked);
        assert_eq!(RegistryValidity::parse("unknown").unwrap(), RegistryValidity::Unknown);
        assert!(matches!(RegistryValidity::parse("fresh"), Err(ClientError::Protocol(_))));
    }

    #[test]
    fn balance_payloads_parse() {
        let b = BalanceInfo::parse(b"ab12,1000000000,1 gigawei").unwrap();
        assert_eq!(b.addr, "ab12");
        assert_eq!(b.decimal, "1000000000");
        assert_eq!(b.human, "1 gigawei");
        assert!(BalanceInfo::parse(b"justaddr").is_err());
    }
}
