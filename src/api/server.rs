//! The multi-client socket role: partial-message state is scoped per
//! sender, and completed messages carry the sender's identity.

use std::{sync::Arc, time::Instant};

use super::{Destination, RoleCore, SendError, Transport};
use crate::{
    buffers::{MessageBuffer, pool::BufferPool},
    codec::EncodeError,
    partial::{Progress, ReassemblyFailure},
    protocol::{PeerId, ProtocolConfig, SendMode},
};

/// Server-side role context.
///
/// Mirrors [`Client`](super::Client) with two differences: the assembler
/// registry is keyed by `(sender, logical id)` so concurrent splits from
/// different clients with colliding logical ids never mix, and completion
/// handlers receive the sender's identity.
pub struct Server {
    core: RoleCore,
}

impl Server {
    /// Creates a server role sharing `pool`.
    pub fn new(pool: Arc<BufferPool>, config: ProtocolConfig) -> Self {
        Self {
            core: RoleCore::new(pool, config),
        }
    }

    /// The shared buffer pool.
    pub fn pool(&self) -> &Arc<BufferPool> {
        self.core.pool()
    }

    /// Retrieves a send buffer with the header byte and `type_id` written.
    pub fn compose(&self, type_id: u16, mode: SendMode) -> Result<MessageBuffer, EncodeError> {
        self.core.compose(type_id, mode)
    }

    /// Sends a built message to one client, splitting it when oversized.
    pub fn send<T: Transport>(
        &mut self,
        transport: &mut T,
        message: MessageBuffer,
        target: PeerId,
    ) -> Result<(), SendError> {
        self.core.send(transport, message, Destination::One(Some(target)))
    }

    /// Sends a built message to every connected client, splitting it when
    /// oversized.
    pub fn broadcast<T: Transport>(&mut self, transport: &mut T, message: MessageBuffer) -> Result<(), SendError> {
        self.core.send(transport, message, Destination::All)
    }

    /// Feeds one datagram received from `sender`.
    pub fn handle_datagram(&mut self, bytes: &[u8], sender: PeerId) {
        self.core.ingest(bytes, Some(sender));
    }

    /// Registers the completion handler for `type_id`; it receives the
    /// decodable message and the peer that sent it.
    pub fn on_complete<F>(&mut self, type_id: u16, mut handler: F)
    where
        F: FnMut(&mut MessageBuffer, PeerId) + Send + 'static,
    {
        self.core.set_complete_handler(
            type_id,
            Box::new(move |buffer, sender| {
                // The server role only ingests with a sender attached.
                if let Some(sender) = sender {
                    handler(buffer, sender);
                }
            }),
        );
    }

    /// Registers the reassembly-progress observer for `type_id`.
    pub fn on_progress<F>(&mut self, type_id: u16, handler: F)
    where
        F: FnMut(&Progress) + Send + 'static,
    {
        self.core.set_progress_handler(type_id, Box::new(handler));
    }

    /// Registers the observer for reassemblies abandoned by the retention
    /// sweep.
    pub fn on_failure<F>(&mut self, handler: F)
    where
        F: FnMut(&ReassemblyFailure) + Send + 'static,
    {
        self.core.set_failure_handler(Box::new(handler));
    }

    /// Drops partial-message state older than the configured retention
    /// window, reporting abandoned reassemblies to the failure observer.
    pub fn reclaim_expired(&mut self, now: Instant) {
        self.core.reclaim_expired(now);
    }
}
