//! Shared store of idle [`MessageBuffer`] instances.
//!
//! Retrieving a buffer pops an idle instance (or allocates one when the
//! store is empty) and runs the matching prepare step; releasing hands
//! ownership back. Move semantics make aliased double-release
//! unrepresentable: a released buffer cannot also be held by a caller, and
//! an instance can therefore never appear in the store twice.

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use super::MessageBuffer;
use crate::protocol::{Category, SendMode};

/// Idle instances kept per registered socket role; the pool capacity is
/// twice this per role, matching a role's typical send + receive churn.
const BUFFERS_PER_ROLE: usize = 4;

/// Default maximum payload carried by pooled buffers.
pub const DEFAULT_MAX_PAYLOAD: usize = 1247;

/// Error raised by pool reconfiguration.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// The maximum payload size cannot change while roles are active, as
    /// buffers of mixed capacity must never coexist in the store.
    #[error("cannot change the payload size while {0} socket role(s) are active")]
    RolesActive(usize),
}

struct PoolInner {
    idle: Vec<MessageBuffer>,
    active_roles: usize,
    max_payload: usize,
}

impl PoolInner {
    const fn capacity(&self) -> usize {
        BUFFERS_PER_ROLE * 2 * self.active_roles
    }

    fn trim(&mut self) {
        let capacity = self.capacity();
        if self.idle.len() > capacity {
            self.idle.truncate(capacity);
        }
    }
}

/// Process-level store of idle buffers, shared across socket roles.
///
/// Retrieve and release are mutually exclusive across threads; contention is
/// short-lived (a vec push or pop under the lock). Capacity scales with the
/// number of registered roles and shrinks to zero when none are active.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use slipwire::{BufferPool, Category, SendMode};
///
/// let pool = Arc::new(BufferPool::new());
/// pool.register_role();
///
/// let mut buffer = pool.retrieve_for_send(SendMode::Reliable, Category::Data);
/// buffer.add_u16(42).unwrap();
/// pool.release(buffer);
///
/// pool.deregister_role();
/// ```
pub struct BufferPool {
    inner: Mutex<PoolInner>,
}

impl BufferPool {
    /// Creates an empty pool with [`DEFAULT_MAX_PAYLOAD`].
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    /// Creates an empty pool whose buffers carry up to `max_payload` bytes
    /// of typed data each.
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                idle: Vec::new(),
                active_roles: 0,
                max_payload,
            }),
        }
    }

    /// Maximum payload size of pooled buffers.
    pub fn max_payload(&self) -> usize {
        self.inner.lock().max_payload
    }

    /// Number of idle instances currently stored.
    pub fn idle_count(&self) -> usize {
        self.inner.lock().idle.len()
    }

    /// Registers an active socket role, growing the pool capacity.
    pub fn register_role(&self) {
        let mut inner = self.inner.lock();
        inner.active_roles += 1;
        debug!(active_roles = inner.active_roles, "socket role registered");
    }

    /// Deregisters a socket role, shrinking the pool capacity and trimming
    /// excess idle instances.
    pub fn deregister_role(&self) {
        let mut inner = self.inner.lock();
        inner.active_roles = inner.active_roles.saturating_sub(1);
        inner.trim();
        debug!(active_roles = inner.active_roles, "socket role deregistered");
    }

    /// Reconfigures the maximum payload size.
    ///
    /// Rejected while any role is active; otherwise the idle store is purged
    /// so buffers of mixed capacity never coexist.
    pub fn set_max_payload(&self, max_payload: usize) -> Result<(), PoolError> {
        let mut inner = self.inner.lock();
        if inner.active_roles != 0 {
            return Err(PoolError::RolesActive(inner.active_roles));
        }
        inner.max_payload = max_payload;
        inner.idle.clear();
        Ok(())
    }

    /// Retrieves a buffer in the in-use-for-send state: cursors at
    /// `(read = 0, write = 1)`, header byte written.
    pub fn retrieve_for_send(&self, mode: SendMode, category: Category) -> MessageBuffer {
        let mut buffer = self.retrieve();
        buffer.prepare_for_send(mode, category);
        buffer
    }

    /// Retrieves a buffer pre-populated with a received datagram, read
    /// cursor past the header byte.
    pub fn retrieve_for_receive(&self, datagram: &[u8]) -> MessageBuffer {
        let mut buffer = self.retrieve();
        buffer.load_datagram(datagram);
        buffer
    }

    fn retrieve(&self) -> MessageBuffer {
        let mut inner = self.inner.lock();
        match inner.idle.pop() {
            Some(buffer) => buffer,
            None => MessageBuffer::with_capacity(inner.max_payload),
        }
    }

    /// Returns a buffer to the idle store. A no-op (the instance is dropped)
    /// when the pool is already at capacity. Contents are not cleared; the
    /// next prepare step repositions the cursors.
    pub fn release(&self, buffer: MessageBuffer) {
        let mut inner = self.inner.lock();
        if inner.idle.len() < inner.capacity() {
            inner.idle.push(buffer);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}
