use std::sync::{Arc, Mutex, PoisonError, RwLock};

use brickwire_frame::{Packet, ProtocolFunction, BROADCAST_UID};
use tracing::{debug, info, warn};

use crate::auth::{self, AuthState};
use crate::config::ConnectionConfig;
use crate::enumeration::EnumerationEvent;
use crate::error::{ConnectionError, Result};
use crate::events::{EventQueue, EventRecord};
use crate::registry::{Device, DeviceRegistry};
use crate::session::Session;

/// Lifecycle state of an [`IpConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// A connection to a brick daemon.
///
/// Cheap to clone; all clones share one session. Requests may be issued
/// concurrently from any number of tasks.
#[derive(Clone)]
pub struct IpConnection {
    inner: Arc<Inner>,
}

struct Inner {
    config: ConnectionConfig,
    /// Serializes connect and disconnect.
    lifecycle: tokio::sync::Mutex<()>,
    phase: Mutex<ConnectionState>,
    session: RwLock<Option<Arc<Session>>>,
    auth: Mutex<AuthState>,
    registry: Arc<DeviceRegistry>,
}

impl Inner {
    fn set_phase(&self, phase: ConnectionState) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    fn phase(&self) -> ConnectionState {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_auth(&self, state: AuthState) {
        *self.auth.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn take_session(&self) -> Option<Arc<Session>> {
        self.session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn live_session(&self) -> Option<Arc<Session>> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|session| !session.is_closed())
            .cloned()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let session = self
            .session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(session) = session {
            session.teardown();
        }
    }
}

/// Resets the phase to `Disconnected` if a connect attempt is abandoned.
struct PhaseReset<'a> {
    inner: &'a Inner,
    armed: bool,
}

impl Drop for PhaseReset<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.set_phase(ConnectionState::Disconnected);
        }
    }
}

impl std::fmt::Debug for IpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpConnection")
            .field("addr", &self.inner.config.addr())
            .field("state", &self.state())
            .field("devices", &self.inner.registry)
            .finish()
    }
}

impl IpConnection {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                lifecycle: tokio::sync::Mutex::new(()),
                phase: Mutex::new(ConnectionState::Disconnected),
                session: RwLock::new(None),
                auth: Mutex::new(AuthState::Idle),
                registry: Arc::new(DeviceRegistry::new()),
            }),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Devices receiving callbacks through this connection.
    pub fn registry(&self) -> &DeviceRegistry {
        &self.inner.registry
    }

    pub fn state(&self) -> ConnectionState {
        match self.inner.phase() {
            // The session may have died underneath us.
            ConnectionState::Connected if self.inner.live_session().is_none() => {
                ConnectionState::Disconnected
            }
            phase => phase,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn auth_state(&self) -> AuthState {
        if !self.is_connected() {
            return AuthState::Idle;
        }
        *self.inner.auth.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open the TCP session and authenticate if a secret is configured.
    ///
    /// Does nothing if already connected. An authentication failure closes
    /// the session again.
    pub async fn connect(&self) -> Result<()> {
        self.inner.config.validate()?;
        let _lifecycle = self.inner.lifecycle.lock().await;

        if self.inner.live_session().is_some() {
            debug!(addr = %self.inner.config.addr(), "already connected");
            return Ok(());
        }
        if let Some(stale) = self.inner.take_session() {
            stale.shutdown().await;
        }

        self.inner.set_phase(ConnectionState::Connecting);
        self.inner.set_auth(AuthState::Idle);
        let mut reset = PhaseReset {
            inner: &self.inner,
            armed: true,
        };

        let session = Session::open(&self.inner.config, Arc::clone(&self.inner.registry)).await?;

        if let Some(secret) = &self.inner.config.secret {
            if let Err(err) = auth::authenticate(&session, secret).await {
                warn!(addr = session.addr(), error = %err, "authentication failed");
                session.shutdown().await;
                return Err(err);
            }
            self.inner.set_auth(AuthState::Authenticated);
        }

        if session.is_closed() {
            session.shutdown().await;
            return Err(ConnectionError::NotConnected);
        }

        let addr = session.addr().to_string();
        *self
            .inner
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(session));
        self.inner.set_phase(ConnectionState::Connected);
        reset.armed = false;

        info!(
            %addr,
            authenticated = self.inner.config.secret.is_some(),
            "connected"
        );
        Ok(())
    }

    /// Close the session. Pending requests fail with `NotConnected`.
    ///
    /// Safe to call repeatedly.
    pub async fn disconnect(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;

        let Some(session) = self.inner.take_session() else {
            self.inner.set_phase(ConnectionState::Disconnected);
            return;
        };

        self.inner.set_phase(ConnectionState::Disconnecting);
        let was_live = !session.is_closed();
        session.shutdown().await;
        self.inner.set_auth(AuthState::Idle);
        self.inner.set_phase(ConnectionState::Disconnected);

        if was_live {
            info!(addr = session.addr(), "disconnected");
        } else {
            debug!(addr = session.addr(), "cleaned up lost session");
        }
    }

    /// Send a request to `uid`.
    ///
    /// With `response_expected` the reply packet is returned; otherwise the
    /// call completes once the packet is written and returns `None`.
    pub async fn send_request(
        &self,
        uid: u32,
        function_id: u8,
        payload: &[u8],
        response_expected: bool,
    ) -> Result<Option<Packet>> {
        let session = self
            .inner
            .live_session()
            .ok_or(ConnectionError::NotConnected)?;
        session
            .request(uid, function_id, payload, response_expected)
            .await
    }

    /// Send a request and wait for its reply.
    pub async fn request(&self, uid: u32, function_id: u8, payload: &[u8]) -> Result<Packet> {
        self.send_request(uid, function_id, payload, true)
            .await?
            .ok_or(ConnectionError::NotConnected)
    }

    /// Send a request without waiting for a reply.
    pub async fn send(&self, uid: u32, function_id: u8, payload: &[u8]) -> Result<()> {
        self.send_request(uid, function_id, payload, false)
            .await
            .map(|_| ())
    }

    /// Ask every device to announce itself on the enumeration queue.
    pub async fn enumerate(&self) -> Result<()> {
        debug!("enumerating devices");
        self.send(BROADCAST_UID, ProtocolFunction::Enumerate.id(), &[])
            .await
    }

    /// Send a disconnect probe. The daemon does not answer.
    pub async fn ping(&self) -> Result<()> {
        debug!(addr = %self.inner.config.addr(), "sending disconnect probe");
        self.send(BROADCAST_UID, ProtocolFunction::DisconnectProbe.id(), &[])
            .await
    }

    /// Enumeration events of the current session.
    ///
    /// The queue is closed when the session ends.
    pub fn enumerations(&self) -> Result<EventQueue<EnumerationEvent>> {
        self.inner
            .live_session()
            .map(|session| session.enumerations())
            .ok_or(ConnectionError::NotConnected)
    }

    /// Route events of `event_kind` from `device` to `queue`, or stop
    /// routing them with `None`.
    pub fn register_event_destination(
        &self,
        device: &dyn Device,
        event_kind: u8,
        queue: Option<EventQueue<EventRecord>>,
    ) -> Option<EventQueue<EventRecord>> {
        debug!(
            uid = device.uid(),
            event_kind,
            enabled = queue.is_some(),
            "event destination changed"
        );
        device.event_destinations().set(event_kind, queue)
    }

    /// Build a device bound to this connection and register it for callbacks.
    pub fn attach<D, F>(&self, build: F) -> Arc<D>
    where
        D: Device + 'static,
        F: FnOnce(IpConnection) -> D,
    {
        let device = Arc::new(build(self.clone()));
        self.inner.registry.add(&device);
        device
    }
}
