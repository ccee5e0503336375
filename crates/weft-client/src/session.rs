//! Client session and transaction multiplexer.
//!
//! One TCP connection to the router is shared by every in-flight request.
//! Each request carries a freshly allocated sequence number; a single
//! reader task fans reply frames out to per-request channels, and one
//! mutex covers both the route map and the writer so that a registered
//! sequence number always refers to a request that has been flushed.
//!
//! # Invariants
//!
//! - Registered Before Written: `transact` inserts the reply route and
//!   writes the frame inside one critical section, in that order.
//!
//! - Closed Exactly Once: a reply stream terminates on the `finished`
//!   delimiter, on [`Client::cancel`], or on connection teardown, and its
//!   registration is removed at most once.
//!
//! - Bounded Fan-Out: reply channels are small and bounded. A consumer
//!   that stops draining eventually blocks the reader, which blocks every
//!   stream on the connection; acceptable for interactive clients.
//!
//! On a read-side failure the reference implementation exits the process;
//! this implementation instead fails every in-flight stream with
//! [`ClientError::ConnectionLost`] and rejects new transactions.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use bytes::BytesMut;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex, mpsc},
    time::timeout,
};
use tracing::{debug, info, warn};
use weft_proto::{Frame, HEADER_LINE_LEN, HeaderLine, commands, headers};

use crate::error::ClientError;

/// Default router port; bare hosts get it appended.
pub const DEFAULT_PORT: u16 = 28589;

/// Hard deadline for the router's HELLO frame.
const HELLO_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the per-request reply channels.
const ROUTE_CAPACITY: usize = 3;

/// A session with a router.
///
/// Cheap to clone; all clones share the connection, the sequence-number
/// allocator, and the reply routes.
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    shared: Mutex<Shared>,
    seqno: AtomicU32,
    remote_version: String,
    auto_chain: std::sync::Mutex<Option<bool>>,
}

/// State guarded by the write lock: route registration and the TCP
/// writer, together, so registration order matches write order.
#[derive(Debug)]
struct Shared {
    writer: BufWriter<OwnedWriteHalf>,
    routes: HashMap<u32, mpsc::Sender<Frame>>,
    /// Teardown reason once the reader has died.
    dead: Option<String>,
}

impl Shared {
    async fn send_frame(&mut self, frame: &Frame) -> Result<(), ClientError> {
        let mut buf = BytesMut::with_capacity(HEADER_LINE_LEN + frame.wire_length());
        frame.encode(&mut buf)?;
        self.writer.write_all(&buf).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

impl Client {
    /// Connect to a router and perform the HELLO handshake.
    ///
    /// `addr` may be empty (use `localhost:28589`), a bare host (default
    /// port appended), or a full `host:port`.
    ///
    /// # Errors
    ///
    /// [`ClientError::HelloTimeout`] when the router stays silent for the
    /// handshake deadline; [`ClientError::BadRouter`] when its first frame
    /// is not a HELLO carrying a `version` header.
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let addr = normalize_addr(addr);
        let stream = TcpStream::connect(&addr).await?;
        let (read_half, write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let hello = timeout(HELLO_TIMEOUT, read_frame(&mut reader))
            .await
            .map_err(|_| ClientError::HelloTimeout)?
            .map_err(|e| {
                warn!(error = %e, "malformed HELLO frame");
                ClientError::BadRouter
            })?;
        if hello.cmd() != commands::HELLO {
            return Err(ClientError::BadRouter);
        }
        let Some(remote_version) = hello.first_header(headers::VERSION) else {
            return Err(ClientError::BadRouter);
        };
        info!(router = %addr, version = %remote_version, "connected");

        let inner = Arc::new(Inner {
            shared: Mutex::new(Shared {
                writer: BufWriter::new(write_half),
                routes: HashMap::new(),
                dead: None,
            }),
            seqno: AtomicU32::new(0),
            remote_version,
            auto_chain: std::sync::Mutex::new(None),
        });
        tokio::spawn(read_loop(Arc::clone(&inner), reader));
        Ok(Self { inner })
    }

    /// Version string the router reported in its HELLO.
    pub fn remote_version(&self) -> &str {
        &self.inner.remote_version
    }

    /// Force the autochain flag on or off for every subsequent operation,
    /// overriding per-operation settings.
    pub fn override_auto_chain(&self, v: bool) {
        *lock_plain(&self.inner.auto_chain) = Some(v);
    }

    /// Return autochain control to per-operation settings.
    pub fn clear_auto_chain_override(&self) {
        *lock_plain(&self.inner.auto_chain) = None;
    }

    /// Effective autochain flag for an operation that requested `requested`.
    pub(crate) fn auto_chain(&self, requested: bool) -> bool {
        lock_plain(&self.inner.auto_chain).unwrap_or(requested)
    }

    /// Allocate the next sequence number. The first value is 1; wraparound
    /// is modulo 2³².
    pub fn next_seqno(&self) -> u32 {
        self.inner.seqno.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Submit a request and stream its replies.
    ///
    /// The returned channel yields frames in arrival order and closes
    /// after the `finished: true` delimiter (which is itself delivered, so
    /// status-bearing terminal frames stay observable), after
    /// [`Client::cancel`], or with a terminal
    /// [`ClientError::ConnectionLost`] on teardown. Dropping the receiver
    /// cancels the stream.
    pub async fn transact(
        &self,
        frame: Frame,
    ) -> Result<mpsc::Receiver<Result<Frame, ClientError>>, ClientError> {
        let seqno = frame.seqno();
        let (in_tx, mut in_rx) = mpsc::channel::<Frame>(ROUTE_CAPACITY);
        let (out_tx, out_rx) = mpsc::channel::<Result<Frame, ClientError>>(ROUTE_CAPACITY);
        {
            let mut shared = self.inner.shared.lock().await;
            if let Some(reason) = &shared.dead {
                return Err(ClientError::ConnectionLost(reason.clone()));
            }
            // Register before the first byte is written, under one lock.
            shared.routes.insert(seqno, in_tx);
            if let Err(e) = shared.send_frame(&frame).await {
                shared.routes.remove(&seqno);
                return Err(e);
            }
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                match in_rx.recv().await {
                    Some(frame) => {
                        let finished = frame.header_is(headers::FINISHED, "true");
                        let delivered = out_tx.send(Ok(frame)).await.is_ok();
                        if finished || !delivered {
                            close_seqno(&inner, seqno).await;
                            return;
                        }
                    }
                    // Route dropped: cancellation, or teardown when a
                    // reason was recorded.
                    None => {
                        let reason = inner.shared.lock().await.dead.clone();
                        if let Some(reason) = reason {
                            let _ = out_tx.send(Err(ClientError::ConnectionLost(reason))).await;
                        }
                        return;
                    }
                }
            }
        });
        Ok(out_rx)
    }

    /// Abandon the stream registered under `seqno`. Frames still in
    /// flight for it are dropped by the reader.
    pub async fn cancel(&self, seqno: u32) {
        close_seqno(&self.inner, seqno).await;
    }

    /// Submit a request expecting exactly one status-checked reply.
    pub(crate) async fn round_trip(&self, frame: Frame) -> Result<Frame, ClientError> {
        let mut rx = self.transact(frame).await?;
        match rx.recv().await {
            Some(Ok(reply)) => {
                check_response(&reply)?;
                Ok(reply)
            }
            Some(Err(e)) => Err(e),
            None => Err(ClientError::ConnectionLost("reply stream closed".to_owned())),
        }
    }

    /// Submit a request, consume and check the leading status frame, and
    /// hand back the remainder of the stream.
    pub(crate) async fn streaming(
        &self,
        frame: Frame,
    ) -> Result<mpsc::Receiver<Result<Frame, ClientError>>, ClientError> {
        let mut rx = self.transact(frame).await?;
        match rx.recv().await {
            Some(Ok(first)) => {
                check_response(&first)?;
                Ok(rx)
            }
            Some(Err(e)) => Err(e),
            None => Err(ClientError::ConnectionLost("reply stream closed".to_owned())),
        }
    }
}

/// Fail an operation whose status frame is missing or not okay.
pub(crate) fn check_response(frame: &Frame) -> Result<(), ClientError> {
    match frame.first_header(headers::STATUS) {
        Some(status) if status == "okay" => Ok(()),
        Some(_) => Err(ClientError::App {
            reason: frame.first_header(headers::REASON).unwrap_or_default(),
        }),
        None => Err(ClientError::Protocol("response missing status header".to_owned())),
    }
}

async fn close_seqno(inner: &Inner, seqno: u32) {
    inner.shared.lock().await.routes.remove(&seqno);
}

/// Read frames forever, fanning each out to its registered route. On a
/// read error, record the reason and drop every route so in-flight
/// streams terminate with a connection-lost error.
async fn read_loop(inner: Arc<Inner>, mut reader: BufReader<OwnedReadHalf>) {
    loop {
        match read_frame(&mut reader).await {
            Ok(frame) => {
                let dest = inner.shared.lock().await.routes.get(&frame.seqno()).cloned();
                match dest {
                    // Send outside the lock: a full route must not wedge
                    // writers, only the reader. A failed send means the
                    // route was cancelled mid-flight; the frame is dropped.
                    Some(tx) => {
                        let _ = tx.send(frame).await;
                    }
                    None => debug!(seqno = frame.seqno(), "dropping frame for unknown seqno"),
                }
            }
            Err(e) => {
                warn!(error = %e, "read loop terminated, failing in-flight streams");
                let mut shared = inner.shared.lock().await;
                shared.dead = Some(e.to_string());
                shared.routes.clear();
                return;
            }
        }
    }
}

/// Read one frame: the fixed header line, then exactly the declared body.
pub(crate) async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame, ClientError> {
    let mut head = [0u8; HEADER_LINE_LEN];
    reader.read_exact(&mut head).await?;
    let line = HeaderLine::parse(&head)?;
    let mut body = vec![0u8; line.length];
    reader.read_exact(&mut body).await?;
    Ok(Frame::decode_body(&line, &body)?)
}

fn normalize_addr(addr: &str) -> String {
    if addr.is_empty() {
        format!("localhost:{DEFAULT_PORT}")
    } else if addr.contains(':') {
        addr.to_owned()
    } else {
        format!("{addr}:{DEFAULT_PORT}")
    }
}

fn lock_plain<T>(m: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::normalize_addr;

    #[test]
    fn address_normalization() {
        assert_eq!(normalize_addr(""), "localhost:28589");
        assert_eq!(normalize_addr("router.local"), "router.local:28589");
        assert_eq!(normalize_addr("10.0.0.7:1234"), "10.0.0.7:1234");
    }
}
