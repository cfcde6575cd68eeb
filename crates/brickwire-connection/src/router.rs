//! Classification and routing of received packets.
//!
//! Unsolicited packets (no sequence number) go to the registered device
//! first, then fall back to connection-level broadcasts. Replies resolve the
//! pending request holding their sequence number, UID and function ID.

use std::sync::Arc;
use std::time::SystemTime;

use brickwire_frame::{Flags, Packet, ProtocolFunction, SequenceNumber};
use tracing::{debug, info, trace};

use crate::enumeration::{decode_enumeration, EnumerationEvent, EnumerationKind};
use crate::events::{EventQueue, EventRecord};
use crate::pending::{PendingRequests, ReplyError};
use crate::registry::DeviceRegistry;

/// What the router did with a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Decoded by a registered device. `delivered` is false when no
    /// destination is registered for the event kind.
    DeviceEvent {
        uid: u32,
        event_kind: u8,
        delivered: bool,
    },
    /// Enumeration broadcast pushed onto the enumeration queue.
    Enumeration { uid: u32, kind: EnumerationKind },
    /// Reply to a request. `resolved` is false for late, unknown or
    /// mismatched replies.
    Reply {
        sequence_number: SequenceNumber,
        resolved: bool,
    },
    /// Unsolicited packet nobody recognized.
    Unrecognized { uid: u32, function_id: u8 },
    /// Packet with a sequence number that was not sent expecting a reply.
    Unexpected {
        uid: u32,
        function_id: u8,
        sequence_number: SequenceNumber,
    },
}

/// Routes packets of one session.
#[derive(Debug, Clone)]
pub struct Router {
    registry: Arc<DeviceRegistry>,
    pending: PendingRequests,
    enumerations: EventQueue<EnumerationEvent>,
}

impl Router {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        pending: PendingRequests,
        enumerations: EventQueue<EnumerationEvent>,
    ) -> Self {
        Self {
            registry,
            pending,
            enumerations,
        }
    }

    pub fn dispatch(&self, packet: Packet) -> Dispatch {
        let header = packet.header;
        match header.sequence_number {
            None => self.dispatch_unsolicited(&packet),
            Some(sequence_number) if header.response_expected => {
                let result = match header.flags {
                    Flags::InvalidParameter => Err(ReplyError::InvalidParameter),
                    Flags::FunctionNotSupported => Err(ReplyError::FunctionNotSupported),
                    Flags::Ok | Flags::Other(_) => Ok(packet),
                };
                let resolved = self.pending.resolve(&header, result);
                if !resolved {
                    debug!(
                        uid = header.uid,
                        function_id = header.function_id.raw(),
                        sequence = sequence_number.get(),
                        "dropping reply without matching pending request"
                    );
                }
                Dispatch::Reply {
                    sequence_number,
                    resolved,
                }
            }
            Some(sequence_number) => {
                info!(
                    uid = header.uid,
                    function_id = header.function_id.raw(),
                    sequence = sequence_number.get(),
                    len = packet.payload.len(),
                    "unexpected packet"
                );
                Dispatch::Unexpected {
                    uid: header.uid,
                    function_id: header.function_id.raw(),
                    sequence_number,
                }
            }
        }
    }

    fn dispatch_unsolicited(&self, packet: &Packet) -> Dispatch {
        let uid = packet.header.uid;
        let function_id = packet.header.function_id;

        if let Some(device) = self.registry.lookup(uid) {
            match device.decode_event(function_id.raw(), &packet.payload) {
                Ok(event) => {
                    let delivered = match device.event_destinations().get(event.event_kind) {
                        Some(queue) => {
                            let record = EventRecord {
                                timestamp: SystemTime::now(),
                                uid,
                                device_identifier: device.device_identifier(),
                                event_kind: event.event_kind,
                                value: event.value,
                            };
                            if queue.push(record).is_some() {
                                trace!(uid, event_kind = event.event_kind, "event queue full, dropped oldest");
                            }
                            true
                        }
                        None => false,
                    };
                    return Dispatch::DeviceEvent {
                        uid,
                        event_kind: event.event_kind,
                        delivered,
                    };
                }
                Err(err) => trace!(%err, "falling back to broadcast handling"),
            }
        }

        if function_id.is(ProtocolFunction::CallbackEnumerate) {
            match decode_enumeration(&packet.payload) {
                Ok(event) => {
                    let kind = event.kind;
                    let uid = event.uid;
                    debug!(uid, %kind, "received enumeration");
                    if self.enumerations.push(event).is_some() {
                        trace!("enumeration queue full, dropped oldest");
                    }
                    return Dispatch::Enumeration { uid, kind };
                }
                Err(err) => debug!(%err, "invalid enumeration payload"),
            }
        } else {
            debug!(uid, function_id = function_id.raw(), "dropping unsolicited packet");
        }

        Dispatch::Unrecognized {
            uid,
            function_id: function_id.raw(),
        }
    }
}
