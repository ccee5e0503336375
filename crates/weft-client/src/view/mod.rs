//! Live views over metadata-annotated URI space.
//!
//! A view compiles a boolean [`Expression`] over a set of namespace
//! roots, keeps a metadata store live through subscriptions, and answers
//! membership, metadata, and interface-discovery queries. Construction
//! follows the barrier protocol: subscribe to every root's metadata
//! first, snapshot it with queries, then flip the loaded flag; every
//! observer waits on that barrier.

mod expr;
mod pattern;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use regex::Regex;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};
use weft_proto::{MetadataTuple, PayloadObject};

pub use expr::Expression;
pub use pattern::restrict_by;

use crate::{
    error::ClientError,
    message::SimpleMessage,
    metadata::{META_INFIX, split_meta_uri},
    params::{PublishParams, QueryParams, SubscribeParams},
    session::Client,
};

/// Capacity of the fanned-in signal stream.
const SIGNAL_CAPACITY: usize = 10;

/// Parse of interface URIs:
/// namespace, optional prefix, service, selector, interface.
const INTERFACE_PATTERN: &str = r"^(([^/]+)(/.*)?/(s\.[^/]+)/([^/]+)/(i\.[^/]+)).*$";

fn lock_plain<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Base URI → (key → tuple).
type MetaMap = HashMap<String, HashMap<String, MetadataTuple>>;

/// Metadata store shared between a view and its update tasks.
///
/// Maps base URI to its metadata map. Lookups apply inheritance: the
/// effective metadata of a URI merges every prefix's map, deeper
/// prefixes overriding shallower ones.
pub struct MetaStore {
    namespaces: Vec<String>,
    map: RwLock<MetaMap>,
}

impl MetaStore {
    pub(crate) fn new(namespaces: Vec<String>) -> Self {
        Self { namespaces, map: RwLock::new(HashMap::new()) }
    }

    /// Namespace roots this store covers.
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// Value of `key` for `uri`, from the deepest prefix carrying it.
    pub fn meta(&self, uri: &str, key: &str) -> Option<MetadataTuple> {
        let parts: Vec<&str> = uri.split('/').collect();
        let map = self.read();
        let mut found = None;
        for depth in 1..=parts.len() {
            let prefix = parts[..depth].join("/");
            if let Some(tuple) = map.get(&prefix).and_then(|m| m.get(key)) {
                found = Some(tuple.clone());
            }
        }
        found
    }

    /// Merged metadata for `uri`, deeper prefixes overriding shallower.
    pub fn all_meta(&self, uri: &str) -> HashMap<String, MetadataTuple> {
        let parts: Vec<&str> = uri.split('/').collect();
        let map = self.read();
        let mut merged = HashMap::new();
        for depth in 1..=parts.len() {
            let prefix = parts[..depth].join("/");
            if let Some(m) = map.get(&prefix) {
                for (k, v) in m {
                    merged.insert(k.clone(), v.clone());
                }
            }
        }
        merged
    }

    pub(crate) fn set(&self, base: &str, key: &str, tuple: MetadataTuple) {
        self.write().entry(base.to_owned()).or_default().insert(key.to_owned(), tuple);
    }

    pub(crate) fn remove(&self, base: &str, key: &str) {
        if let Some(m) = self.write().get_mut(base) {
            m.remove(key);
        }
    }

    /// Apply one `!meta` message: a metadata payload stores the value, an
    /// empty payload list deletes the key. Returns the base URI touched,
    /// or `None` when the message URI is not a metadata URI.
    pub(crate) fn apply(&self, msg: &SimpleMessage) -> Option<String> {
        let (base, key) = split_meta_uri(&msg.uri)?;
        match msg.first_metadata() {
            Some(tuple) => self.set(base, key, tuple.clone()),
            None => self.remove(base, key),
        }
        Some(base.to_owned())
    }

    /// Every base URI currently known to the store.
    pub(crate) fn uris(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MetaMap> {
        self.map.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MetaMap> {
        self.map.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One interface discovered by [`View::interfaces`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescription {
    /// Full interface URI, up to and including the `i.` segment.
    pub uri: String,
    /// Namespace root.
    pub namespace: String,
    /// Path between the namespace and the service, without its slashes.
    pub prefix: String,
    /// Service segment (`s.…`).
    pub service: String,
    /// Interface segment (`i.…`).
    pub interface: String,
}

struct ViewShared {
    callbacks: Mutex<Vec<Arc<dyn Fn() + Send + Sync>>>,
    load_error: Mutex<Option<String>>,
}

/// A live, declarative query over metadata-annotated URI space.
pub struct View {
    client: Client,
    expr: Expression,
    store: Arc<MetaStore>,
    loaded: watch::Receiver<bool>,
    shared: Arc<ViewShared>,
    iface_re: Regex,
}

impl View {
    /// Build a view of `expr` over the given namespaces (only their root
    /// segments matter), subscribe to their metadata, and start the
    /// snapshot load. Returns before the snapshot completes; observers
    /// block on the first-load barrier.
    pub async fn new(
        client: Client,
        namespaces: &[&str],
        expr: Expression,
    ) -> Result<Self, ClientError> {
        let mut roots: Vec<String> = Vec::new();
        for ns in namespaces {
            let root = ns.split('/').next().unwrap_or_default().to_owned();
            if !root.is_empty() && !roots.contains(&root) {
                roots.push(root);
            }
        }
        let store = Arc::new(MetaStore::new(roots.clone()));
        let shared = Arc::new(ViewShared {
            callbacks: Mutex::new(Vec::new()),
            load_error: Mutex::new(None),
        });
        let iface_re = Regex::new(INTERFACE_PATTERN)
            .map_err(|e| ClientError::Usage(format!("bad interface pattern: {e}")))?;
        let (loaded_tx, loaded) = watch::channel(false);

        // Subscribe before snapshotting so no update can fall between.
        let mut subscriptions = Vec::with_capacity(roots.len());
        for root in &roots {
            let rx = client
                .subscribe(SubscribeParams {
                    uri: format!("{root}/*/{META_INFIX}/+"),
                    auto_chain: true,
                    ..Default::default()
                })
                .await?;
            subscriptions.push(rx);
        }

        // Snapshot task: drain one query per root, then lift the barrier.
        {
            let client = client.clone();
            let store = Arc::clone(&store);
            let shared = Arc::clone(&shared);
            let roots = roots.clone();
            tokio::spawn(async move {
                for root in &roots {
                    if let Err(e) = snapshot_root(&client, &store, root).await {
                        warn!(root = %root, error = %e, "metadata snapshot failed");
                        *lock_plain(&shared.load_error) = Some(e.to_string());
                        break;
                    }
                }
                let _ = loaded_tx.send(true);
            });
        }

        // Live update tasks, one per subscription.
        for mut rx in subscriptions {
            let store = Arc::clone(&store);
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                while let Some(item) = rx.recv().await {
                    match item {
                        Ok(msg) => {
                            if store.apply(&msg).is_some() {
                                fire_callbacks(&shared);
                            } else {
                                debug!(uri = %msg.uri, "ignoring non-metadata update");
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "metadata subscription lost");
                            return;
                        }
                    }
                }
            });
        }

        Ok(Self { client, expr, store, loaded, shared, iface_re })
    }

    /// Block until the initial metadata snapshot has been absorbed.
    pub async fn wait_loaded(&self) -> Result<(), ClientError> {
        let mut rx = self.loaded.clone();
        rx.wait_for(|loaded| *loaded)
            .await
            .map_err(|_| ClientError::ConnectionLost("view loader died".to_owned()))?;
        if let Some(reason) = lock_plain(&self.shared.load_error).clone() {
            return Err(ClientError::Protocol(format!("view load failed: {reason}")));
        }
        Ok(())
    }

    /// Register a callback fired (asynchronously) on every metadata
    /// change observed by the view.
    pub fn on_change(&self, callback: impl Fn() + Send + Sync + 'static) {
        lock_plain(&self.shared.callbacks).push(Arc::new(callback));
    }

    /// The expression this view was compiled from.
    pub fn expression(&self) -> &Expression {
        &self.expr
    }

    /// The metadata store backing this view.
    pub fn store(&self) -> &MetaStore {
        &self.store
    }

    /// Whether `uri` is in the view.
    pub async fn matches(&self, uri: &str) -> Result<bool, ClientError> {
        self.wait_loaded().await?;
        Ok(self.expr.matches(uri, &self.store))
    }

    /// Inherited metadata value of `key` for `uri`.
    pub async fn meta(&self, uri: &str, key: &str) -> Result<Option<MetadataTuple>, ClientError> {
        self.wait_loaded().await?;
        Ok(self.store.meta(uri, key))
    }

    /// Merged inherited metadata for `uri`.
    pub async fn all_meta(&self, uri: &str) -> Result<HashMap<String, MetadataTuple>, ClientError> {
        self.wait_loaded().await?;
        Ok(self.store.all_meta(uri))
    }

    /// Interfaces visible in the view: URIs in the metastore that match
    /// the expression, parse as interface URIs, and are alive (non-empty
    /// `lastalive` metadata). Sorted by URI.
    pub async fn interfaces(&self) -> Result<Vec<InterfaceDescription>, ClientError> {
        self.wait_loaded().await?;
        let mut found: HashMap<String, InterfaceDescription> = HashMap::new();
        for uri in self.store.uris() {
            if !self.expr.matches(&uri, &self.store) {
                continue;
            }
            let Some(caps) = self.iface_re.captures(&uri) else { continue };
            let desc = InterfaceDescription {
                uri: caps[1].to_owned(),
                namespace: caps[2].to_owned(),
                prefix: caps
                    .get(3)
                    .map(|m| m.as_str().trim_start_matches('/').to_owned())
                    .unwrap_or_default(),
                service: caps[4].to_owned(),
                interface: caps[6].to_owned(),
            };
            let alive =
                self.store.meta(&desc.uri, "lastalive").is_some_and(|t| !t.value.is_empty());
            if alive {
                found.insert(desc.uri.clone(), desc);
            }
        }
        let mut list: Vec<InterfaceDescription> = found.into_values().collect();
        list.sort_by(|a, b| a.uri.cmp(&b.uri));
        Ok(list)
    }

    /// Publish `payloads` to `<iface-uri>/slot/<slot>` on every listed
    /// interface whose interface segment equals `iface`.
    pub async fn pub_slot(
        &self,
        iface: &str,
        slot: &str,
        payloads: Vec<PayloadObject>,
    ) -> Result<(), ClientError> {
        for desc in self.interfaces().await? {
            if desc.interface != iface {
                continue;
            }
            self.client
                .publish(PublishParams {
                    uri: format!("{}/slot/{slot}", desc.uri),
                    payload_objects: payloads.clone(),
                    auto_chain: true,
                    ..Default::default()
                })
                .await?;
        }
        Ok(())
    }

    /// Subscribe to `<iface-uri>/signal/<signal>` on every matching
    /// interface, multiplexed onto one stream. The stream closes only
    /// when every contributing subscription has closed.
    pub async fn sub_signal(
        &self,
        iface: &str,
        signal: &str,
    ) -> Result<mpsc::Receiver<Result<SimpleMessage, ClientError>>, ClientError> {
        let (tx, out) = mpsc::channel(SIGNAL_CAPACITY);
        for desc in self.interfaces().await? {
            if desc.interface != iface {
                continue;
            }
            let mut sub = self
                .client
                .subscribe(SubscribeParams {
                    uri: format!("{}/signal/{signal}", desc.uri),
                    auto_chain: true,
                    ..Default::default()
                })
                .await?;
            let tx = tx.clone();
            tokio::spawn(async move {
                while let Some(item) = sub.recv().await {
                    if tx.send(item).await.is_err() {
                        return;
                    }
                }
            });
        }
        // The output closes when the last forwarding task drops its
        // sender clone.
        drop(tx);
        Ok(out)
    }
}

async fn snapshot_root(
    client: &Client,
    store: &MetaStore,
    root: &str,
) -> Result<(), ClientError> {
    let mut rx = client
        .query(QueryParams {
            uri: format!("{root}/*/{META_INFIX}/+"),
            auto_chain: true,
            ..Default::default()
        })
        .await?;
    while let Some(item) = rx.recv().await {
        store.apply(&item?);
    }
    Ok(())
}

/// Snapshot the callback list under the lock, dispatch outside it.
fn fire_callbacks(shared: &ViewShared) {
    let snapshot: Vec<Arc<dyn Fn() + Send + Sync>> = lock_plain(&shared.callbacks).clone();
    for cb in snapshot {
        tokio::spawn(async move { cb() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple(value: &str, ts: i64) -> MetadataTuple {
        MetadataTuple { value: value.to_owned(), timestamp: ts }
    }

    #[test]
    fn deeper_prefixes_win_inheritance() {
        let store = MetaStore::new(vec!["a".to_owned()]);
        store.set("a", "k", tuple("v1", 1));
        store.set("a/b", "k", tuple("v2", 2));

        assert_eq!(store.meta("a/b/c", "k").map(|t| t.value), Some("v2".to_owned()));
        assert_eq!(store.meta("a/d", "k").map(|t| t.value), Some("v1".to_owned()));
        assert_eq!(store.meta("other", "k"), None);
    }

    #[test]
    fn all_meta_merges_prefix_maps() {
        let store = MetaStore::new(vec!["a".to_owned()]);
        store.set("a", "shared", tuple("shallow", 1));
        store.set("a", "only_root", tuple("root", 1));
        store.set("a/b", "shared", tuple("deep", 2));

        let merged = store.all_meta("a/b/c");
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["shared"].value, "deep");
        assert_eq!(merged["only_root"].value, "root");
    }

    #[test]
    fn apply_stores_and_deletes() {
        let store = MetaStore::new(vec!["ns".to_owned()]);
        let set = SimpleMessage {
            from: String::new(),
            uri: "ns/dev/!meta/owner".to_owned(),
            pos: vec![PayloadObject::metadata(tuple("ops", 7)).unwrap()],
            po_errors: vec![],
            ros: vec![],
        };
        assert_eq!(store.apply(&set), Some("ns/dev".to_owned()));
        assert_eq!(store.meta("ns/dev", "owner").map(|t| t.value), Some("ops".to_owned()));

        let del = SimpleMessage {
            from: String::new(),
            uri: "ns/dev/!meta/owner".to_owned(),
            pos: vec![],
            po_errors: vec![],
            ros: vec![],
        };
        assert_eq!(store.apply(&del), Some("ns/dev".to_owned()));
        assert_eq!(store.meta("ns/dev", "owner"), None);

        let not_meta = SimpleMessage {
            from: String::new(),
            uri: "ns/dev/plain".to_owned(),
            pos: vec![],
            po_errors: vec![],
            ros: vec![],
        };
        assert_eq!(store.apply(&not_meta), None);
    }

    #[test]
    fn interface_pattern_parses_canonical_uris() {
        let re = Regex::new(INTERFACE_PATTERN).unwrap();
        let caps = re
            .captures("ns/flat/floor2/s.lights/room1/i.dimmer/signal/level")
            .expect("should parse");
        assert_eq!(&caps[1], "ns/flat/floor2/s.lights/room1/i.dimmer");
        assert_eq!(&caps[2], "ns");
        assert_eq!(caps.get(3).map(|m| m.as_str()), Some("/flat/floor2"));
        assert_eq!(&caps[4], "s.lights");
        assert_eq!(&caps[6], "i.dimmer");

        assert!(re.captures("ns/no/interface/here").is_none());
    }
}
