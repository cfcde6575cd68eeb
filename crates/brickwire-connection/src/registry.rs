//! Device registry used for callback routing.
//!
//! The registry does not own devices. It maps a UID to a weak reference so a
//! device object can be dropped by the application at any time; dead entries
//! are pruned lazily.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::debug;

use crate::error::UnknownEvent;
use crate::events::EventDestinations;

/// An event decoded by a device from an unsolicited packet.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub event_kind: u8,
    pub value: serde_json::Value,
}

/// The contract device bindings implement to receive callbacks.
pub trait Device: Send + Sync {
    /// Wire UID of the device.
    fn uid(&self) -> u32;

    /// Device type identifier as reported by enumeration.
    fn device_identifier(&self) -> u16;

    /// Decode an unsolicited packet.
    ///
    /// Return [`UnknownEvent`] for function IDs that are not callbacks of this
    /// device; the router then tries connection-level broadcasts.
    fn decode_event(&self, function_id: u8, payload: &[u8]) -> Result<DecodedEvent, UnknownEvent>;

    /// Where decoded events of each kind are delivered.
    fn event_destinations(&self) -> &EventDestinations;
}

#[derive(Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<u32, Weak<dyn Device>>>,
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let devices = self.devices.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("DeviceRegistry")
            .field("uids", &devices.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `device` under its UID, replacing any previous registration.
    pub fn add<D: Device + 'static>(&self, device: &Arc<D>) {
        let uid = device.uid();
        let weak: Weak<D> = Arc::downgrade(device);
        let replaced = self
            .devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(uid, weak as Weak<dyn Device>)
            .is_some();
        debug!(uid, replaced, "registered device");
    }

    /// Find the live device registered under `uid`.
    pub fn lookup(&self, uid: u32) -> Option<Arc<dyn Device>> {
        let weak = self
            .devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&uid)
            .cloned()?;

        match weak.upgrade() {
            Some(device) => Some(device),
            None => {
                let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
                if devices.get(&uid).is_some_and(|w| w.strong_count() == 0) {
                    devices.remove(&uid);
                    debug!(uid, "pruned dropped device");
                }
                None
            }
        }
    }

    /// Remove the registration for `uid`. Returns whether one existed.
    pub fn remove(&self, uid: u32) -> bool {
        self.devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&uid)
            .is_some()
    }

    /// Number of live registrations. Prunes dead ones.
    pub fn len(&self) -> usize {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        devices.retain(|_, device| device.strong_count() > 0);
        devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
