//! Pending request table.
//!
//! Maps an in-flight sequence number to the completion handle of the caller
//! waiting for the reply. Every registration carries a generation so that
//! cleanup of an abandoned request never removes a later registration that
//! reused the same sequence number. A reply is only accepted when its UID and
//! function ID match the request, so a late reply to an abandoned request is
//! never delivered to a newer request holding the same number.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use brickwire_frame::{Header, Packet, SequenceNumber};
use tokio::sync::oneshot;
use tracing::debug;

/// Failure outcomes delivered to a waiting caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyError {
    InvalidParameter,
    FunctionNotSupported,
    NotConnected,
}

pub type ReplyResult = std::result::Result<Packet, ReplyError>;

#[derive(Debug)]
struct Entry {
    generation: u64,
    uid: u32,
    function_id: u8,
    tx: oneshot::Sender<ReplyResult>,
}

#[derive(Debug, Default)]
struct Table {
    entries: Mutex<HashMap<SequenceNumber, Entry>>,
    next_generation: AtomicU64,
    closed: AtomicBool,
}

impl Table {
    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<SequenceNumber, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared table of requests awaiting a reply.
#[derive(Debug, Clone, Default)]
pub struct PendingRequests {
    table: Arc<Table>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for the reply to `function_id` on `uid`, sent with
    /// `sequence_number`.
    ///
    /// After [`close`](Self::close) the returned handle resolves to
    /// `NotConnected` immediately.
    pub fn register(
        &self,
        sequence_number: SequenceNumber,
        uid: u32,
        function_id: u8,
    ) -> PendingHandle {
        let (tx, rx) = oneshot::channel();
        let generation = self.table.next_generation.fetch_add(1, Ordering::Relaxed);

        let mut entries = self.table.entries();
        if self.table.closed.load(Ordering::Acquire) {
            let _ = tx.send(Err(ReplyError::NotConnected));
        } else if let Some(stale) = entries.insert(
            sequence_number,
            Entry {
                generation,
                uid,
                function_id,
                tx,
            },
        ) {
            debug!(
                sequence = sequence_number.get(),
                generation = stale.generation,
                "replaced stale pending request"
            );
        }

        PendingHandle {
            sequence_number,
            generation,
            rx,
            table: Arc::clone(&self.table),
        }
    }

    /// Complete the waiter the reply described by `reply` answers.
    ///
    /// Returns `false` if nobody is waiting for it (late, unknown, or a reply
    /// whose UID or function ID differs from the request holding its
    /// sequence number). A mismatched reply leaves the waiter registered.
    pub fn resolve(&self, reply: &Header, result: ReplyResult) -> bool {
        let Some(sequence_number) = reply.sequence_number else {
            return false;
        };
        let function_id = reply.function_id.raw();

        let entry = {
            let mut entries = self.table.entries();
            let expected = entries
                .get(&sequence_number)
                .map(|entry| (entry.uid, entry.function_id));
            match expected {
                Some((uid, expected_function_id))
                    if uid == reply.uid && expected_function_id == function_id =>
                {
                    entries.remove(&sequence_number)
                }
                Some((uid, expected_function_id)) => {
                    debug!(
                        sequence = sequence_number.get(),
                        uid = reply.uid,
                        function_id,
                        expected_uid = uid,
                        expected_function_id,
                        "reply does not match pending request"
                    );
                    None
                }
                None => None,
            }
        };
        match entry {
            Some(entry) => entry.tx.send(result).is_ok(),
            None => false,
        }
    }

    /// Fail every waiter with `error`. Returns how many were failed.
    pub fn cancel_all(&self, error: ReplyError) -> usize {
        let drained: Vec<Entry> = self.table.entries().drain().map(|(_, e)| e).collect();
        let count = drained.len();
        for entry in drained {
            let _ = entry.tx.send(Err(error));
        }
        count
    }

    /// Fail every waiter and reject future registrations.
    pub fn close(&self, error: ReplyError) -> usize {
        {
            let _entries = self.table.entries();
            self.table.closed.store(true, Ordering::Release);
        }
        self.cancel_all(error)
    }

    pub fn len(&self) -> usize {
        self.table.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Completion handle of one pending request.
///
/// Dropping the handle removes its table entry unless the entry already
/// belongs to a newer registration.
#[derive(Debug)]
pub struct PendingHandle {
    sequence_number: SequenceNumber,
    generation: u64,
    rx: oneshot::Receiver<ReplyResult>,
    table: Arc<Table>,
}

impl PendingHandle {
    pub fn sequence_number(&self) -> SequenceNumber {
        self.sequence_number
    }

    /// Wait for the reply. Cancel safe.
    pub async fn recv(&mut self) -> ReplyResult {
        match (&mut self.rx).await {
            Ok(result) => result,
            Err(_) => Err(ReplyError::NotConnected),
        }
    }
}

impl Drop for PendingHandle {
    fn drop(&mut self) {
        let mut entries = self.table.entries();
        if entries
            .get(&self.sequence_number)
            .is_some_and(|entry| entry.generation == self.generation)
        {
            entries.remove(&self.sequence_number);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use brickwire_frame::Flags;
    use bytes::Bytes;

    use super::*;

    fn seq(n: u8) -> SequenceNumber {
        SequenceNumber::new(n).unwrap()
    }

    fn reply_from(uid: u32, function_id: u8, n: u8, payload: &'static [u8]) -> Packet {
        let mut header =
            Header::request(uid, function_id, Some(seq(n)), true, payload.len()).unwrap();
        header.flags = Flags::Ok;
        Packet {
            header,
            payload: Bytes::from_static(payload),
        }
    }

    fn reply(n: u8, payload: &'static [u8]) -> Packet {
        reply_from(42, 7, n, payload)
    }

    fn register(pending: &PendingRequests, n: u8) -> PendingHandle {
        pending.register(seq(n), 42, 7)
    }

    fn resolve(pending: &PendingRequests, packet: Packet) -> bool {
        let header = packet.header;
        pending.resolve(&header, Ok(packet))
    }

    #[tokio::test]
    async fn resolve_delivers_payload() {
        let pending = PendingRequests::new();
        let mut handle = register(&pending, 3);
        assert_eq!(pending.len(), 1);

        assert!(resolve(&pending, reply(3, &[0x0A])));
        let packet = handle.recv().await.unwrap();
        assert_eq!(packet.payload.as_ref(), &[0x0A]);
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn resolve_without_waiter_is_reported() {
        let pending = PendingRequests::new();
        assert!(!resolve(&pending, reply(5, b"")));
    }

    #[tokio::test]
    async fn dropped_handle_removes_entry() {
        let pending = PendingRequests::new();
        let handle = register(&pending, 4);
        drop(handle);
        assert!(pending.is_empty());
        assert!(!resolve(&pending, reply(4, b"")));
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_handle_does_not_remove_newer_registration() {
        let pending = PendingRequests::new();
        let mut old = register(&pending, 2);
        let waited = tokio::time::timeout(Duration::from_millis(10), old.recv()).await;
        assert!(waited.is_err());

        // The number is reused before the abandoned handle is dropped.
        let mut fresh = register(&pending, 2);
        drop(old);
        assert_eq!(pending.len(), 1);

        assert!(resolve(&pending, reply(2, b"new")));
        assert_eq!(fresh.recv().await.unwrap().payload.as_ref(), b"new");
    }

    #[tokio::test]
    async fn reply_for_other_request_leaves_waiter_pending() {
        let pending = PendingRequests::new();
        let mut handle = pending.register(seq(1), 2, 5);

        assert!(!resolve(&pending, reply_from(1, 5, 1, b"uid")));
        assert!(!resolve(&pending, reply_from(2, 9, 1, b"fid")));
        assert_eq!(pending.len(), 1);

        assert!(resolve(&pending, reply_from(2, 5, 1, b"ok")));
        assert_eq!(handle.recv().await.unwrap().payload.as_ref(), b"ok");
    }

    #[tokio::test]
    async fn unsequenced_header_resolves_nothing() {
        let pending = PendingRequests::new();
        let _handle = register(&pending, 1);
        let header = Header::request(42, 7, None, false, 0).unwrap();
        assert!(!pending.resolve(&header, Err(ReplyError::InvalidParameter)));
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn protocol_errors_are_delivered() {
        let pending = PendingRequests::new();
        let mut a = register(&pending, 1);
        let mut b = register(&pending, 2);
        pending.resolve(&reply(1, b"").header, Err(ReplyError::InvalidParameter));
        pending.resolve(&reply(2, b"").header, Err(ReplyError::FunctionNotSupported));
        assert_eq!(a.recv().await.unwrap_err(), ReplyError::InvalidParameter);
        assert_eq!(b.recv().await.unwrap_err(), ReplyError::FunctionNotSupported);
    }

    #[tokio::test]
    async fn cancel_all_fails_every_waiter() {
        let pending = PendingRequests::new();
        let mut handles: Vec<_> = (1..=3).map(|n| register(&pending, n)).collect();

        assert_eq!(pending.cancel_all(ReplyError::NotConnected), 3);
        for handle in &mut handles {
            assert_eq!(handle.recv().await.unwrap_err(), ReplyError::NotConnected);
        }
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn register_after_close_fails_fast() {
        let pending = PendingRequests::new();
        pending.close(ReplyError::NotConnected);

        let mut handle = register(&pending, 9);
        assert_eq!(handle.recv().await.unwrap_err(), ReplyError::NotConnected);
        assert!(pending.is_empty());
    }
}
