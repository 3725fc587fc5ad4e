//! The single-peer socket role: one connection to a server.

use std::{sync::Arc, time::Instant};

use super::{Destination, RoleCore, SendError, Transport};
use crate::{
    buffers::{MessageBuffer, pool::BufferPool},
    codec::EncodeError,
    partial::{Progress, ReassemblyFailure},
    protocol::{ProtocolConfig, SendMode},
};

/// Client-side role context.
///
/// Owns its logical-id counter, splitter records, assembler registry and
/// handler table; shares the [`BufferPool`] it was given (the role is
/// registered on construction and deregistered on drop).
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use slipwire::{BufferPool, Client, MessageBuffer, PeerId, ProtocolConfig, SendMode, Transport};
///
/// struct Loopback(Vec<Vec<u8>>);
///
/// impl Transport for Loopback {
///     fn send(&mut self, buffer: &MessageBuffer, _target: Option<PeerId>) {
///         self.0.push(buffer.as_datagram().to_vec());
///     }
///     fn broadcast(&mut self, buffer: &MessageBuffer) {
///         self.0.push(buffer.as_datagram().to_vec());
///     }
/// }
///
/// let pool = Arc::new(BufferPool::new());
/// let mut client = Client::new(pool, ProtocolConfig::default());
/// let mut transport = Loopback(Vec::new());
///
/// let mut message = client.compose(17, SendMode::Reliable)?;
/// message.add_str("state sync")?;
/// client.send(&mut transport, message)?;
/// assert_eq!(transport.0.len(), 1);
/// # Ok::<(), slipwire::SendError>(())
/// ```
pub struct Client {
    core: RoleCore,
}

impl Client {
    /// Creates a client role sharing `pool`.
    pub fn new(pool: Arc<BufferPool>, config: ProtocolConfig) -> Self {
        Self {
            core: RoleCore::new(pool, config),
        }
    }

    /// The shared buffer pool.
    pub fn pool(&self) -> &Arc<BufferPool> {
        self.core.pool()
    }

    /// Retrieves a send buffer with the header byte and `type_id` written;
    /// typed payload fields chain on with the `add_*` family.
    pub fn compose(&self, type_id: u16, mode: SendMode) -> Result<MessageBuffer, EncodeError> {
        self.core.compose(type_id, mode)
    }

    /// Sends a built message to the server: directly when it fits one
    /// datagram, split into begin + slices otherwise.
    pub fn send<T: Transport>(&mut self, transport: &mut T, message: MessageBuffer) -> Result<(), SendError> {
        self.core.send(transport, message, Destination::One(None))
    }

    /// Feeds one datagram received from the server.
    pub fn handle_datagram(&mut self, bytes: &[u8]) {
        self.core.ingest(bytes, None);
    }

    /// Registers the completion handler for `type_id`. The handler receives
    /// the decodable message with the read cursor past the type id.
    pub fn on_complete<F>(&mut self, type_id: u16, mut handler: F)
    where
        F: FnMut(&mut MessageBuffer) + Send + 'static,
    {
        self.core
            .set_complete_handler(type_id, Box::new(move |buffer, _sender| handler(buffer)));
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
