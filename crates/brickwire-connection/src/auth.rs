//! Challenge/response authentication.
//!
//! After connecting, the client fetches a 4-byte server nonce, derives
//! `HMAC-SHA1(secret, server_nonce || client_nonce)` and sends
//! `client_nonce || digest` to the daemon. The daemon never acknowledges the
//! exchange; a wrong secret only shows up as refused requests later on.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use brickwire_frame::{ProtocolFunction, AUTHENTICATION_UID};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::Sha1;
use tokio::sync::OnceCell;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{ConnectionError, Result};
use crate::session::Session;

type HmacSha1 = Hmac<Sha1>;

pub const NONCE_SIZE: usize = 4;
pub const DIGEST_SIZE: usize = 20;

/// Payload of the `AUTHENTICATE` request: client nonce followed by digest.
pub const AUTHENTICATE_PAYLOAD_SIZE: usize = NONCE_SIZE + DIGEST_SIZE;

/// Shared authentication secret.
///
/// The bytes are wiped on drop and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Zeroizing<Vec<u8>>);

impl Secret {
    /// Secrets entered as text must be ASCII.
    pub fn new(text: &str) -> Result<Self> {
        if !text.is_ascii() {
            return Err(ConnectionError::InvalidConfig(
                "authentication secret must be ASCII".into(),
            ));
        }
        Ok(Self::from_bytes(text.as_bytes().to_vec()))
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Authentication progress of a connection.
///
/// `Authenticated` means the exchange completed on the wire. The daemon does
/// not confirm it, so it is a best-effort state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Idle,
    Authenticated,
}

/// Process-wide client nonce source.
#[derive(Debug)]
struct NonceCounter(AtomicU32);

impl NonceCounter {
    fn new(seed: u32) -> Self {
        Self(AtomicU32::new(seed))
    }

    fn next(&self) -> [u8; NONCE_SIZE] {
        self.0.fetch_add(1, Ordering::Relaxed).to_le_bytes()
    }
}

static NONCE_COUNTER: OnceCell<NonceCounter> = OnceCell::const_new();

/// Next client nonce.
///
/// The counter is seeded from the OS RNG once per process, off the async
/// runtime since the entropy pool can block early after boot.
pub async fn client_nonce() -> Result<[u8; NONCE_SIZE]> {
    let counter = NONCE_COUNTER
        .get_or_try_init(|| async {
            tokio::task::spawn_blocking(|| {
                let mut seed = [0u8; NONCE_SIZE];
                OsRng.fill_bytes(&mut seed);
                NonceCounter::new(u32::from_le_bytes(seed))
            })
            .await
            .map_err(|err| ConnectionError::Authentication(format!("nonce seeding failed: {err}")))
        })
        .await?;
    Ok(counter.next())
}

/// `HMAC-SHA1(secret, server_nonce || client_nonce)`.
pub fn digest(
    secret: &Secret,
    server_nonce: &[u8; NONCE_SIZE],
    client_nonce: &[u8; NONCE_SIZE],
) -> Result<[u8; DIGEST_SIZE]> {
    hmac_sha1(
        secret.as_bytes(),
        &[server_nonce.as_slice(), client_nonce.as_slice()],
    )
}

fn hmac_sha1(key: &[u8], parts: &[&[u8]]) -> Result<[u8; DIGEST_SIZE]> {
    let mut mac = HmacSha1::new_from_slice(key)
        .map_err(|err| ConnectionError::Authentication(err.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().into())
}

pub fn authenticate_payload(
    client_nonce: &[u8; NONCE_SIZE],
    digest: &[u8; DIGEST_SIZE],
) -> [u8; AUTHENTICATE_PAYLOAD_SIZE] {
    let mut payload = [0u8; AUTHENTICATE_PAYLOAD_SIZE];
    payload[..NONCE_SIZE].copy_from_slice(client_nonce);
    payload[NONCE_SIZE..].copy_from_slice(digest);
    payload
}

/// Run the exchange on a freshly opened session.
pub(crate) async fn authenticate(session: &Session, secret: &Secret) -> Result<()> {
    debug!(addr = session.addr(), "authenticating");

    let (client_nonce, reply) = tokio::try_join!(
        client_nonce(),
        session.request(
            AUTHENTICATION_UID,
            ProtocolFunction::GetAuthenticationNonce.id(),
            &[],
            true,
        ),
    )?;

    let reply = reply
        .ok_or_else(|| ConnectionError::Authentication("no server nonce received".into()))?;
    let server_nonce: [u8; NONCE_SIZE] = reply.payload.as_ref().try_into().map_err(|_| {
        ConnectionError::Authentication(format!(
            "server nonce has {} bytes, expected {NONCE_SIZE}",
            reply.payload.len()
        ))
    })?;

    let digest = Zeroizing::new(digest(secret, &server_nonce, &client_nonce)?);
    let payload = authenticate_payload(&client_nonce, &digest);

    session
        .request(
            AUTHENTICATION_UID,
            ProtocolFunction::Authenticate.id(),
            &payload,
            false,
        )
        .await?;

    debug!(addr = session.addr(), "authentication sent");
    Ok(())
}
