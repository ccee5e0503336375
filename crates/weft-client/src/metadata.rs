//! Metadata attached to URIs.
//!
//! Metadata lives at `<base>/!meta/<key>` as persisted metadata tuples and
//! inherits down the hierarchy: the effective map for a URI is the merge
//! of every prefix's map, deeper prefixes overriding shallower ones.

use std::collections::HashMap;

use chrono::Utc;
use weft_proto::{MetadataTuple, PayloadObject};

use crate::{
    error::ClientError,
    params::{PublishParams, QueryParams},
    session::Client,
};

/// Reserved URI infix separating a base URI from its metadata keys.
pub const META_INFIX: &str = "!meta";

/// Metadata URI for `(base, key)`.
pub(crate) fn meta_uri(base: &str, key: &str) -> String {
    format!("{}/{META_INFIX}/{key}", base.trim_end_matches('/'))
}

/// Split a `!meta` message URI into its base URI and key.
pub(crate) fn split_meta_uri(uri: &str) -> Option<(&str, &str)> {
    let (base, key) = uri.rsplit_once(&format!("/{META_INFIX}/"))?;
    if key.contains('/') {
        return None;
    }
    Some((base, key))
}

impl Client {
    /// Set metadata `key` on a URI. The value is persisted with the
    /// current time so deeper writes win deterministically on merge.
    pub async fn set_metadata(&self, uri: &str, key: &str, value: &str) -> Result<(), ClientError> {
        let tuple = MetadataTuple {
            value: value.to_owned(),
            timestamp: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        };
        self.publish(PublishParams {
            uri: meta_uri(uri, key),
            payload_objects: vec![PayloadObject::metadata(tuple)?],
            persist: true,
            auto_chain: true,
            ..Default::default()
        })
        .await
    }

    /// Delete metadata `key` from a URI by persisting an empty payload
    /// list at its metadata URI.
    pub async fn del_metadata(&self, uri: &str, key: &str) -> Result<(), ClientError> {
        self.publish(PublishParams {
            uri: meta_uri(uri, key),
            persist: true,
            auto_chain: true,
            ..Default::default()
        })
        .await
    }

    /// Inherited metadata for a URI: the union over every prefix, deeper
    /// prefixes winning collisions. Returns the merged map and, per key,
    /// the prefix the winning value came from.
    ///
    /// Prefix queries are issued concurrently; merging walks prefixes
    /// shortest to longest so later inserts overwrite earlier ones.
    pub async fn get_metadata(
        &self,
        uri: &str,
    ) -> Result<(HashMap<String, MetadataTuple>, HashMap<String, String>), ClientError> {
        let uri = uri.trim_end_matches('/');
        let parts: Vec<&str> = uri.split('/').collect();
        let mut queries = Vec::with_capacity(parts.len());
        for depth in 1..=parts.len() {
            let prefix = parts[..depth].join("/");
            let client = self.clone();
            let pattern = format!("{prefix}/{META_INFIX}/+");
            let handle = tokio::spawn(async move {
                let mut rx = client
                    .query(QueryParams { uri: pattern, auto_chain: true, ..Default::default() })
                    .await?;
                let mut messages = Vec::new();
                while let Some(item) = rx.recv().await {
                    messages.push(item?);
                }
                Ok::<_, ClientError>(messages)
            });
            queries.push((prefix, handle));
        }

        let mut data = HashMap::new();
        let mut origin = HashMap::new();
        for (prefix, handle) in queries {
            let messages = handle
                .await
                .map_err(|e| ClientError::ConnectionLost(format!("metadata query failed: {e}")))??;
            for msg in messages {
                let Some((_, key)) = split_meta_uri(&msg.uri) else { continue };
                if let Some(tuple) = msg.first_metadata() {
                    data.insert(key.to_owned(), tuple.clone());
                    origin.insert(key.to_owned(), prefix.clone());
                }
            }
        }
        Ok((data, origin))
    }

    /// Value of metadata `key` for a URI from the deepest prefix carrying
    /// it, or `None` when no prefix does.
    pub async fn get_metadata_key(
        &self,
        uri: &str,
        key: &str,
    ) -> Result<Option<MetadataTuple>, ClientError> {
        let uri = uri.trim_end_matches('/');
        let parts: Vec<&str> = uri.split('/').collect();
        for depth in (1..=parts.len()).rev() {
            let prefix = parts[..depth].join("/");
            let found = self
                .query_one(QueryParams {
                    uri: meta_uri(&prefix, key),
                    auto_chain: true,
                    ..Default::default()
                })
                .await?;
            if let Some(tuple) = found.as_ref().and_then(|m| m.first_metadata()) {
                return Ok(Some(tuple.clone()));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_uris_compose_and_split() {
        assert_eq!(meta_uri("a/b/", "k"), "a/b/!meta/k");
        assert_eq!(split_meta_uri("a/b/!meta/k"), Some(("a/b", "k")));
        assert_eq!(split_meta_uri("a/b/!meta/"), Some(("a/b", "")));
        assert_eq!(split_meta_uri("a/b/k"), None);
        // A key may not span segments.
        assert_eq!(split_meta_uri("a/!meta/k/extra"), None);
    }
}
