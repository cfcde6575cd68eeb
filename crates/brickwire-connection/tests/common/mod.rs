//! Scripted brick daemon for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use brickwire_connection::{ConnectionConfig, Header, Packet};
use brickwire_frame::{Flags, PacketReader, PacketWriter, SequenceNumber};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What the daemon does next.
#[derive(Debug, Clone)]
pub enum Action {
    Send { header: Header, payload: Vec<u8> },
    /// Drop the client connection.
    Close,
}

/// Reply to `request` with `payload`.
pub fn reply(request: &Packet, payload: &[u8]) -> Action {
    reply_with_flags(request, Flags::Ok, payload)
}

pub fn reply_with_flags(request: &Packet, flags: Flags, payload: &[u8]) -> Action {
    let mut header = Header::request(
        request.header.uid,
        request.header.function_id.raw(),
        request.header.sequence_number,
        true,
        payload.len(),
    )
    .expect("reply header");
    header.flags = flags;
    Action::Send {
        header,
        payload: payload.to_vec(),
    }
}

/// Unsolicited packet from `uid`.
pub fn callback(uid: u32, function_id: u8, payload: &[u8]) -> Action {
    let header =
        Header::request(uid, function_id, None, false, payload.len()).expect("callback header");
    Action::Send {
        header,
        payload: payload.to_vec(),
    }
}

/// A 26-byte `CALLBACK_ENUMERATE` payload.
pub fn enumeration(uid: &str, connected: &str, position: u8, device_identifier: u16, kind: u8) -> Vec<u8> {
    let mut out = vec![0u8; 26];
    out[..uid.len()].copy_from_slice(uid.as_bytes());
    out[8..8 + connected.len()].copy_from_slice(connected.as_bytes());
    out[16] = position;
    out[17..20].copy_from_slice(&[1, 0, 0]);
    out[20..23].copy_from_slice(&[2, 0, 1]);
    out[23..25].copy_from_slice(&device_identifier.to_le_bytes());
    out[25] = kind;
    out
}

pub type Handler = Box<dyn FnMut(&Packet) -> Vec<Action> + Send>;

/// Daemon listening on `127.0.0.1:0`, serving one client at a time.
pub struct MockDaemon {
    pub port: u16,
    received: mpsc::UnboundedReceiver<Packet>,
    inject: mpsc::UnboundedSender<Action>,
    task: JoinHandle<()>,
}

impl MockDaemon {
    /// Start a daemon that answers each request with `handler`'s actions.
    pub async fn start<F>(handler: F) -> Self
    where
        F: FnMut(&Packet) -> Vec<Action> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let (received_tx, received) = mpsc::unbounded_channel();
        let (inject, mut inject_rx) = mpsc::unbounded_channel::<Action>();
        let mut handler: Handler = Box::new(handler);

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let (read_half, write_half) = stream.into_split();
                let mut reader = PacketReader::new(read_half);
                let mut writer = PacketWriter::new(write_half);

                'session: loop {
                    // Injected actions win so they are ordered before replies
                    // to requests sent after the injection.
                    let actions = tokio::select! {
                        biased;
                        Some(action) = inject_rx.recv() => vec![action],
                        packet = reader.read_packet() => match packet {
                            Ok(packet) => {
                                let actions = handler(&packet);
                                let _ = received_tx.send(packet);
                                actions
                            }
                            Err(_) => break 'session,
                        },
                    };
                    for action in actions {
                        match action {
                            Action::Send { header, payload } => {
                                if writer.write_packet(&header, &payload).await.is_err() {
                                    break 'session;
                                }
                            }
                            Action::Close => break 'session,
                        }
                    }
                }
            }
        });

        Self {
            port,
            received,
            inject,
            task,
        }
    }

    /// Daemon that never answers.
    pub async fn silent() -> Self {
        Self::start(|_| Vec::new()).await
    }

    pub fn config(&self) -> ConnectionConfig {
        ConnectionConfig::new("127.0.0.1", self.port).with_timeout(Duration::from_millis(500))
    }

    /// Next packet the client sent.
    pub async fn next_packet(&mut self) -> Packet {
        tokio::time::timeout(Duration::from_secs(5), self.received.recv())
            .await
            .expect("daemon received nothing")
            .expect("daemon stopped")
    }

    /// Packets received so far without waiting.
    pub fn received(&mut self) -> Vec<Packet> {
        let mut out = Vec::new();
        while let Ok(packet) = self.received.try_recv() {
            out.push(packet);
        }
        out
    }

    /// Run `action` outside of any request.
    pub fn inject(&self, action: Action) {
        self.inject.send(action).expect("daemon stopped");
    }
}

impl Drop for MockDaemon {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn seq(packet: &Packet) -> u8 {
    packet
        .header
        .sequence_number
        .map(SequenceNumber::get)
        .unwrap_or(0)
}
