//! User-facing socket-role contexts and the seams they plug into.
//!
//! A role context ([`Client`] or [`Server`]) owns everything the source
//! design kept in process-wide statics: the buffer pool handle, the
//! logical-id counter, the splitter's in-flight records, the assembler
//! registry and the handler table. Independent instances therefore cannot
//! interfere, and tests construct as many as they like.

mod client;
mod server;

pub use client::Client;
pub use server::Server;

use std::{collections::HashMap, sync::Arc, time::Instant};

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    buffers::{MessageBuffer, pool::BufferPool},
    codec::EncodeError,
    partial::{
        Progress, ReassemblyFailure,
        assembler::{AssemblyRegistry, PartialKey, SliceOutcome},
        splitter::Splitter,
    },
    protocol::{
        self, BeginHeader, Category, HEADER_LEN, PeerId, ProtocolConfig, SendMode, SliceHeader,
    },
};

/// Datagram delivery consumed by this core, implemented by the host's
/// reliable-UDP transport.
///
/// Calls are fire-and-forget: the send mode and attempt budget travel on the
/// buffer, and "reliable" means at-least-once eventual delivery with **no**
/// ordering guarantee between distinct datagrams.
pub trait Transport {
    /// Delivers one datagram. `target` is `None` on the single-peer role
    /// (the client talks to its server) and `Some` on the multi-client role.
    fn send(&mut self, buffer: &MessageBuffer, target: Option<PeerId>);

    /// Delivers one datagram to every connected peer.
    fn broadcast(&mut self, buffer: &MessageBuffer);
}

/// Error raised by a role context's send path.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// A partial-message datagram did not fit its buffer. The configured
    /// slice capacity must leave room for the slice header within the
    /// pool's payload size.
    #[error("failed to encode datagram: {0}")]
    Encode(#[from] EncodeError),
}

type CompleteFn = Box<dyn FnMut(&mut MessageBuffer, Option<PeerId>) + Send>;
type ProgressFn = Box<dyn FnMut(&Progress) + Send>;
type FailureFn = Box<dyn FnMut(&ReassemblyFailure) + Send>;

/// Per-application-type observer table.
#[derive(Default)]
pub(crate) struct Handlers {
    complete: HashMap<u16, CompleteFn>,
    progress: HashMap<u16, ProgressFn>,
    failure: Option<FailureFn>,
}

/// Where a split or direct send is addressed.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Destination {
    One(Option<PeerId>),
    All,
}

impl Destination {
    fn emit<T: Transport>(self, transport: &mut T, buffer: &MessageBuffer) {
        match self {
            Destination::One(target) => transport.send(buffer, target),
            Destination::All => transport.broadcast(buffer),
        }
    }
}

/// State shared by both socket roles.
pub(crate) struct RoleCore {
    pool: Arc<BufferPool>,
    config: ProtocolConfig,
    splitter: Splitter,
    assembly: AssemblyRegistry,
    handlers: Handlers,
}

impl RoleCore {
    pub(crate) fn new(pool: Arc<BufferPool>, config: ProtocolConfig) -> Self {
        pool.register_role();
        Self {
            pool,
            config,
            splitter: Splitter::default(),
            assembly: AssemblyRegistry::default(),
            handlers: Handlers::default(),
        }
    }

    pub(crate) fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Retrieves a send buffer with the application type id already written.
    pub(crate) fn compose(&self, type_id: u16, mode: SendMode) -> Result<MessageBuffer, EncodeError> {
        let mut buffer = self.pool.retrieve_for_send(mode, Category::Data);
        buffer.add_u16(type_id)?;
        Ok(buffer)
    }

    /// Sends a built message: directly when its payload fits one slice
    /// worth of datagram, through the splitter otherwise. The buffer goes
    /// back to the pool either way.
    pub(crate) fn send<T: Transport>(
        &mut self,
        transport: &mut T,
        buffer: MessageBuffer,
        dest: Destination,
    ) -> Result<(), SendError> {
        let payload_len = buffer.written().saturating_sub(HEADER_LEN);
        if payload_len <= self.config.slice_capacity {
            dest.emit(transport, &buffer);
            self.pool.release(buffer);
            return Ok(());
        }

        let datagram = buffer.as_datagram();
        let Some(type_id) = protocol::embedded_type_id(datagram) else {
            // A buffer below HEADER_LEN bytes cannot be oversized; not reachable
            // through compose(), but never panic on it.
            warn!("refusing to split a buffer without a datagram prelude");
            self.pool.release(buffer);
            return Ok(());
        };

        let result = self.splitter.split(
            &self.pool,
            &self.config,
            &datagram[HEADER_LEN..],
            type_id,
            Instant::now(),
            |slice| {
                dest.emit(transport, &slice);
                self.pool.release(slice);
            },
        );
        self.pool.release(buffer);
        result?;
        Ok(())
    }

    /// Feeds one received datagram into the role. Malformed or truncated
    /// input is logged and dropped, never a panic.
    pub(crate) fn ingest(&mut self, bytes: &[u8], sender: Option<PeerId>) {
        let Some(&header) = bytes.first() else {
            warn!("dropping empty datagram");
            return;
        };
        let Some(category) = Category::from_header(header) else {
            warn!(header, "dropping datagram with unknown category");
            return;
        };

        let mut buffer = self.pool.retrieve_for_receive(bytes);
        let type_id = buffer.get_u16();
        if type_id.is_truncated() {
            warn!("dropping datagram without a type id");
            self.pool.release(buffer);
            return;
        }
        let type_id = type_id.value();

        match category {
            Category::Data => {
                self.deliver(&mut buffer, type_id, sender);
                self.pool.release(buffer);
            }
            Category::PartialBegin => {
                let begin = BeginHeader::read(&mut buffer);
                self.pool.release(buffer);
                self.ingest_begin(begin, sender);
            }
            Category::PartialSlice => {
                let slice = SliceHeader::read(&mut buffer);
                let payload = buffer.get_remaining_bytes();
                self.pool.release(buffer);
                self.ingest_slice(slice, payload, sender);
            }
        }
    }

    fn ingest_begin(&mut self, begin: Option<BeginHeader>, sender: Option<PeerId>) {
        let Some(begin) = begin else {
            warn!("dropping truncated begin-descriptor");
            return;
        };
        let Ok(declared) = u32::try_from(begin.slice_count) else {
            warn!(slice_count = begin.slice_count, "dropping begin-descriptor with negative slice count");
            return;
        };
        if declared == 0 {
            warn!("dropping begin-descriptor declaring zero slices");
            return;
        }

        let key = PartialKey {
            sender,
            logical_id: begin.logical_id,
        };
        let entry = self.assembly.entry(key, Instant::now());
        debug!(
            logical_id = begin.logical_id,
            declared, "begin-descriptor observed"
        );
        if entry.describe(begin.original_type_id, declared) {
            self.finalize(key);
        }
    }

    fn ingest_slice(&mut self, slice: Option<SliceHeader>, payload: Vec<u8>, sender: Option<PeerId>) {
        let Some(slice) = slice else {
            warn!("dropping truncated slice datagram");
            return;
        };
        if slice.ordinal == 0 {
            warn!(logical_id = slice.logical_id, "dropping slice with ordinal zero");
            return;
        }

        let key = PartialKey {
            sender,
            logical_id: slice.logical_id,
        };
        let entry = self.assembly.entry(key, Instant::now());
        match entry.add_slice(slice.ordinal, payload) {
            SliceOutcome::Stored => self.report_progress(key),
            SliceOutcome::Completed => {
                self.report_progress(key);
                self.finalize(key);
            }
            // Resent ordinals are overwritten without re-raising progress.
            SliceOutcome::Duplicate | SliceOutcome::AlreadyComplete => {}
        }
    }

    fn report_progress(&mut self, key: PartialKey) {
        let entry = self.assembly.entry(key, Instant::now());
        let Some(type_id) = entry.type_id() else {
            // No begin-descriptor yet: the observer cannot be resolved.
            return;
        };
        let progress = entry.progress();
        if let Some(observer) = self.handlers.progress.get_mut(&type_id) {
            observer(&progress);
        }
    }

    /// Reconstructs a completed message and delivers it.
    fn finalize(&mut self, key: PartialKey) {
        let entry = self.assembly.entry(key, Instant::now());
        debug_assert!(entry.is_complete());
        // Completion implies the begin-descriptor arrived, so the type id is
        // known.
        let Some(type_id) = entry.type_id() else {
            return;
        };
        let sender = entry.sender();
        let payload = entry.assemble();
        debug!(
            logical_id = key.logical_id,
            type_id,
            payload_len = payload.len(),
            "partial message complete"
        );

        let mut datagram = Vec::with_capacity(HEADER_LEN + payload.len());
        datagram.push(protocol::compose_header(SendMode::Reliable, Category::Data));
        datagram.extend_from_slice(&type_id.to_le_bytes());
        datagram.extend_from_slice(&payload);

        let pooled = datagram.len() <= HEADER_LEN + self.pool.max_payload();
        let mut buffer = if pooled {
            self.pool.retrieve_for_receive(&datagram)
        } else {
            // Reassembled payloads can outgrow pooled buffers; a one-off
            // allocation keeps the pool's capacities uniform.
            let mut buffer = MessageBuffer::with_capacity(payload.len());
            buffer.load_datagram(&datagram);
            buffer
        };
        let _ = buffer.get_u16();

        self.deliver(&mut buffer, type_id, sender);
        if pooled {
            self.pool.release(buffer);
        }
    }

    fn deliver(&mut self, buffer: &mut MessageBuffer, type_id: u16, sender: Option<PeerId>) {
        match self.handlers.complete.get_mut(&type_id) {
            Some(handler) => handler(buffer, sender),
            None => warn!(type_id, "no handler registered for message type"),
        }
    }

    pub(crate) fn set_complete_handler(&mut self, type_id: u16, handler: CompleteFn) {
        self.handlers.complete.insert(type_id, handler);
    }

    pub(crate) fn set_progress_handler(&mut self, type_id: u16, handler: ProgressFn) {
        self.handlers.progress.insert(type_id, handler);
    }

    pub(crate) fn set_failure_handler(&mut self, handler: FailureFn) {
        self.handlers.failure = Some(handler);
    }

    /// Runs the retention sweep on both registries. The host owns the clock
    /// and calls this periodically with `Instant::now()`.
    pub(crate) fn reclaim_expired(&mut self, now: Instant) {
        let failure_handler = &mut self.handlers.failure;
        self.assembly
            .reclaim_expired(now, self.config.retention, |failure| {
                if let Some(handler) = failure_handler {
                    handler(&failure);
                }
            });
        self.splitter.reclaim_expired(now, self.config.retention);
    }
}

impl Drop for RoleCore {
    fn drop(&mut self) {
        self.pool.deregister_role();
    }
}
