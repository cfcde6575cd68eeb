//! One TCP session to the daemon.
//!
//! A session owns two tasks: the receive loop, the only reader of the socket,
//! and a writer task that owns the write half. Callers hand complete packets
//! to the writer through a channel, so a caller that is cancelled mid-request
//! can never leave half a packet on the wire.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use brickwire_frame::{FrameError, Header, Packet, PacketReader, PacketWriter, SequenceNumber};
use brickwire_transport::BrickStream;
use bytes::Bytes;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::ConnectionConfig;
use crate::enumeration::EnumerationEvent;
use crate::error::{ConnectionError, Result};
use crate::events::EventQueue;
use crate::pending::{PendingRequests, ReplyError};
use crate::registry::DeviceRegistry;
use crate::router::Router;
use crate::sequence::SequencePool;

/// The sequence pool already bounds outstanding packets.
const OUTBOUND_CAPACITY: usize = SequenceNumber::MAX as usize;

/// How long teardown waits for the socket tasks before aborting them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

struct Outbound {
    header: Header,
    payload: Bytes,
    done: oneshot::Sender<brickwire_frame::Result<()>>,
}

/// State shared between the session handle and its tasks.
#[derive(Debug)]
struct Shared {
    addr: String,
    sequences: SequencePool,
    pending: PendingRequests,
    enumerations: EventQueue<EnumerationEvent>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl Shared {
    /// Stop both tasks and fail everything still waiting. Idempotent.
    fn teardown(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.cancel.cancel();
        self.sequences.close();
        let failed = self.pending.close(ReplyError::NotConnected);
        self.enumerations.close();
        debug!(addr = %self.addr, failed, "session closed");
        true
    }
}

pub(crate) struct Session {
    shared: Arc<Shared>,
    outbound: mpsc::Sender<Outbound>,
    timeout: Duration,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    /// Connect and start the socket tasks.
    pub(crate) async fn open(
        config: &ConnectionConfig,
        registry: Arc<DeviceRegistry>,
    ) -> Result<Self> {
        let stream = BrickStream::connect(&config.host, config.port, config.timeout).await?;
        let addr = stream.addr().to_string();
        let (read_half, write_half) = stream.into_split();

        let shared = Arc::new(Shared {
            addr,
            sequences: SequencePool::new(),
            pending: PendingRequests::new(),
            enumerations: EventQueue::new(config.enumeration_capacity),
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
        });
        let router = Router::new(
            registry,
            shared.pending.clone(),
            shared.enumerations.clone(),
        );
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);

        let writer = tokio::spawn(write_loop(
            PacketWriter::new(write_half),
            rx,
            Arc::clone(&shared),
        ));
        let reader = tokio::spawn(receive_loop(
            PacketReader::new(read_half),
            router,
            Arc::clone(&shared),
            config.read_timeout,
        ));

        Ok(Self {
            shared,
            outbound: tx,
            timeout: config.timeout,
            tasks: Mutex::new(vec![reader, writer]),
        })
    }

    pub(crate) fn addr(&self) -> &str {
        &self.shared.addr
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    pub(crate) fn enumerations(&self) -> EventQueue<EnumerationEvent> {
        self.shared.enumerations.clone()
    }

    /// Send one request and, if `response_expected`, wait for its reply.
    pub(crate) async fn request(
        &self,
        uid: u32,
        function_id: u8,
        payload: &[u8],
        response_expected: bool,
    ) -> Result<Option<Packet>> {
        if self.is_closed() {
            return Err(ConnectionError::NotConnected);
        }
        let mut header = Header::request(uid, function_id, None, response_expected, payload.len())?;

        let lease = self
            .shared
            .sequences
            .acquire()
            .await
            .ok_or(ConnectionError::NotConnected)?;
        let sequence_number = lease.number();
        header.sequence_number = Some(sequence_number);

        // Register before transmitting so a fast reply always finds its waiter.
        let handle = response_expected
            .then(|| self.shared.pending.register(sequence_number, uid, function_id));

        debug!(
            uid,
            function_id,
            sequence = sequence_number.get(),
            response_expected,
            len = payload.len(),
            "sending request"
        );
        self.transmit(header, Bytes::copy_from_slice(payload)).await?;

        let Some(mut handle) = handle else {
            return Ok(None);
        };

        // The handle is dropped before the lease, so the table entry is gone
        // by the time the sequence number can be reused.
        match tokio::time::timeout(self.timeout, handle.recv()).await {
            Ok(Ok(reply)) => {
                trace!(
                    uid,
                    function_id,
                    sequence = sequence_number.get(),
                    len = reply.payload.len(),
                    "received reply"
                );
                Ok(Some(reply))
            }
            Ok(Err(ReplyError::InvalidParameter)) => {
                Err(ConnectionError::InvalidParameter { function_id })
            }
            Ok(Err(ReplyError::FunctionNotSupported)) => {
                Err(ConnectionError::FunctionNotSupported { function_id })
            }
            Ok(Err(ReplyError::NotConnected)) => Err(ConnectionError::NotConnected),
            Err(_) => {
                debug!(
                    uid,
                    function_id,
                    sequence = sequence_number.get(),
                    timeout = ?self.timeout,
                    "request timed out"
                );
                Err(ConnectionError::Timeout(self.timeout))
            }
        }
    }

    /// Hand a packet to the writer and wait until it is on the socket.
    ///
    /// Bounded by the request timeout so a peer that stops reading cannot
    /// block the caller once the send buffer is full.
    async fn transmit(&self, header: Header, payload: Bytes) -> Result<()> {
        let (done, written) = oneshot::channel();
        let outbound = Outbound {
            header,
            payload,
            done,
        };
        let delivered = async {
            self.outbound
                .send(outbound)
                .await
                .map_err(|_| ConnectionError::NotConnected)?;
            match written.await {
                Ok(Ok(())) => Ok(()),
                // The writer already logged the failure and closed the session.
                Ok(Err(_)) | Err(_) => Err(ConnectionError::NotConnected),
            }
        };

        match tokio::time::timeout(self.timeout, delivered).await {
            Ok(result) => result,
            Err(_) => {
                debug!(
                    uid = header.uid,
                    function_id = header.function_id.raw(),
                    timeout = ?self.timeout,
                    "write timed out"
                );
                Err(ConnectionError::Timeout(self.timeout))
            }
        }
    }

    /// Close the session without waiting for the tasks.
    pub(crate) fn teardown(&self) -> bool {
        self.shared.teardown()
    }

    /// Close the session and wait for both tasks to finish.
    pub(crate) async fn shutdown(&self) {
        self.teardown();

        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for mut task in tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(addr = %self.shared.addr, error = %err, "session task failed"),
                Err(_) => {
                    warn!(addr = %self.shared.addr, "session task did not stop, aborting");
                    task.abort();
                }
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.teardown();
    }
}

async fn write_loop(
    mut writer: PacketWriter<OwnedWriteHalf>,
    mut outbound: mpsc::Receiver<Outbound>,
    shared: Arc<Shared>,
) {
    loop {
        let next = tokio::select! {
            biased;
            () = shared.cancel.cancelled() => break,
            next = outbound.recv() => next,
        };
        let Some(Outbound {
            header,
            payload,
            done,
        }) = next
        else {
            break;
        };

        let result = writer.write_packet(&header, &payload).await;
        let failed = result.is_err();
        if let Err(err) = &result {
            warn!(addr = %shared.addr, error = %err, "write failed, closing session");
        }
        let _ = done.send(result);
        if failed {
            shared.teardown();
            break;
        }
    }

    outbound.close();
    if let Err(err) = writer.shutdown().await {
        debug!(addr = %shared.addr, error = %err, "closing write half failed");
    }
}

async fn receive_loop(
    mut reader: PacketReader<OwnedReadHalf>,
    router: Router,
    shared: Arc<Shared>,
    read_timeout: Duration,
) {
    loop {
        let next = tokio::select! {
            biased;
            () = shared.cancel.cancelled() => break,
            next = reader.read_packet_timeout(read_timeout) => next,
        };

        match next {
            Ok(Some(packet)) => {
                let outcome = router.dispatch(packet);
                trace!(?outcome, "dispatched packet");
            }
            // Idle socket.
            Ok(None) => continue,
            Err(FrameError::InvalidPacketSize { size }) => {
                debug!(addr = %shared.addr, size, "discarding header with invalid packet size");
            }
            Err(FrameError::ConnectionClosed) => {
                warn!(addr = %shared.addr, "connection closed by daemon");
                break;
            }
            Err(err) => {
                warn!(addr = %shared.addr, error = %err, "connection lost");
                break;
            }
        }
    }

    shared.teardown();
}
