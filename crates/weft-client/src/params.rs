//! Operation parameter types.
//!
//! Every transact-based operation takes a parameter struct with sensible
//! `Default`s, mirroring the headers it will emit. Expiry can be given as
//! an absolute instant (`expiry` header, RFC 3339) or a relative delta
//! (`expirydelta` header); deadlines are enforced router-side.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use weft_proto::{PayloadObject, RoutingObject};

/// How the router should re-materialize the primary access chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElaboratePac {
    /// Send the chain fully elaborated.
    Full,
    /// Send the chain partially elaborated.
    #[default]
    Partial,
    /// Send the chain as hashes only.
    None,
}

impl ElaboratePac {
    /// Header value for the `elaborate_pac` key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Partial => "partial",
            Self::None => "none",
        }
    }
}

/// Parameters for [`crate::Client::publish`].
#[derive(Debug, Clone, Default)]
pub struct PublishParams {
    /// Target URI.
    pub uri: String,
    /// Hash of the primary access chain, when not autochaining.
    pub primary_access_chain: String,
    /// Routing objects attached to the request.
    pub routing_objects: Vec<RoutingObject>,
    /// Payload objects to deliver.
    pub payload_objects: Vec<PayloadObject>,
    /// Absolute message expiry.
    pub expiry: Option<DateTime<Utc>>,
    /// Relative message expiry.
    pub expiry_delta: Option<Duration>,
    /// Chain elaboration level.
    pub elaborate_pac: ElaboratePac,
    /// Skip router-side verification.
    pub do_not_verify: bool,
    /// Persist the message instead of routing it live.
    pub persist: bool,
    /// Ask the router to build the access chain.
    pub auto_chain: bool,
}

/// Parameters for [`crate::Client::subscribe`].
#[derive(Debug, Clone, Default)]
pub struct SubscribeParams {
    /// URI pattern to subscribe to.
    pub uri: String,
    /// Hash of the primary access chain, when not autochaining.
    pub primary_access_chain: String,
    /// Routing objects attached to the request.
    pub routing_objects: Vec<RoutingObject>,
    /// Absolute subscription expiry.
    pub expiry: Option<DateTime<Utc>>,
    /// Relative subscription expiry.
    pub expiry_delta: Option<Duration>,
    /// Chain elaboration level.
    pub elaborate_pac: ElaboratePac,
    /// Skip router-side verification.
    pub do_not_verify: bool,
    /// Deliver packed messages instead of unpacked objects.
    pub leave_packed: bool,
    /// Ask the router to build the access chain.
    pub auto_chain: bool,
}

/// Parameters for [`crate::Client::query`]; shape matches subscribe.
pub type QueryParams = SubscribeParams;

/// Parameters for [`crate::Client::list`].
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    /// URI whose children to enumerate.
    pub uri: String,
    /// Hash of the primary access chain, when not autochaining.
    pub primary_access_chain: String,
    /// Routing objects attached to the request.
    pub routing_objects: Vec<RoutingObject>,
    /// Absolute expiry.
    pub expiry: Option<DateTime<Utc>>,
    /// Relative expiry.
    pub expiry_delta: Option<Duration>,
    /// Chain elaboration level.
    pub elaborate_pac: ElaboratePac,
    /// Skip router-side verification.
    pub do_not_verify: bool,
    /// Ask the router to build the access chain.
    pub auto_chain: bool,
}

/// Parameters for [`crate::Client::create_entity`].
#[derive(Debug, Clone, Default)]
pub struct CreateEntityParams {
    /// Absolute entity expiry.
    pub expiry: Option<DateTime<Utc>>,
    /// Relative entity expiry.
    pub expiry_delta: Option<Duration>,
    /// Contact information embedded in the entity.
    pub contact: String,
    /// Free-form comment embedded in the entity.
    pub comment: String,
    /// Verifying keys allowed to revoke this entity.
    pub revokers: Vec<String>,
    /// Leave the creation date out of the entity.
    pub omit_creation_date: bool,
}

/// Parameters for [`crate::Client::create_dot`].
#[derive(Debug, Clone, Default)]
pub struct CreateDotParams {
    /// Mint a permission DOT instead of an access DOT.
    pub is_permission: bool,
    /// Verifying key of the recipient.
    pub to: String,
    /// Remaining delegation hops.
    pub ttl: u8,
    /// Absolute DOT expiry.
    pub expiry: Option<DateTime<Utc>>,
    /// Relative DOT expiry.
    pub expiry_delta: Option<Duration>,
    /// Contact information embedded in the DOT.
    pub contact: String,
    /// Free-form comment embedded in the DOT.
    pub comment: String,
    /// Verifying keys allowed to revoke this DOT.
    pub revokers: Vec<String>,
    /// Leave the creation date out of the DOT.
    pub omit_creation_date: bool,
    /// URI the access DOT grants on.
    pub uri: String,
    /// Granted permission string, e.g. `PC*`.
    pub access_permissions: String,
}

/// Parameters for [`crate::Client::create_dot_chain`].
#[derive(Debug, Clone, Default)]
pub struct CreateChainParams {
    /// DOT hashes, granter to grantee order.
    pub dots: Vec<String>,
    /// Build a permission chain instead of an access chain.
    pub is_permission: bool,
    /// Keep the chain as hashes rather than elaborating it.
    pub unelaborate: bool,
}

/// Chain-interaction parameters to apply; unset fields are left unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct BcParams {
    /// Confirmations required before an operation is final.
    pub confirmations: Option<i64>,
    /// Seconds to wait for confirmations.
    pub timeout: Option<i64>,
    /// Maximum acceptable registry age in seconds.
    pub max_age: Option<i64>,
}

/// Render a duration the way the router's duration parser expects,
/// seconds with an optional fractional part.
pub(crate) fn duration_header(d: Duration) -> String {
    if d.subsec_nanos() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}.{:09}s", d.as_secs(), d.subsec_nanos())
    }
}

/// Render an absolute expiry for the `expiry` header.
pub(crate) fn expiry_header(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_render_in_router_syntax() {
        assert_eq!(duration_header(Duration::from_secs(90)), "90s");
        assert_eq!(duration_header(Duration::from_millis(1500)), "1.500000000s");
        assert_eq!(duration_header(Duration::ZERO), "0s");
    }

    #[test]
    fn elaborate_pac_defaults_to_partial() {
        assert_eq!(ElaboratePac::default().as_str(), "partial");
    }
}
