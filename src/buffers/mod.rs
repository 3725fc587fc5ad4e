//! Reusable datagram buffers with independent read and write cursors.

pub(crate) mod pool;

use core::fmt;

use tracing::warn;

use crate::protocol::{Category, HEADER_LEN, SendMode, compose_header};

/// Default number of transport-level send attempts for reliable datagrams.
const DEFAULT_MAX_SEND_ATTEMPTS: u8 = 15;

/// A fixed-capacity byte buffer holding exactly one datagram.
///
/// The buffer owns a `Box<[u8]>` of capacity `HEADER_LEN + max payload` and
/// tracks two cursors with the invariant `0 <= read <= write <= capacity`.
/// Typed values are appended at the write cursor with the `add_*` family and
/// consumed from the read cursor with the `get_*` family (see the
/// [`codec`](crate::codec) module for the encode/decode contracts).
///
/// A buffer is exclusively owned between retrieval from a
/// [`BufferPool`](pool::BufferPool) and release back to it. Contents are stale
/// immediately after release; the prepare steps reposition the cursors without
/// clearing old bytes.
///
/// # Examples
///
/// ```
/// use slipwire::{Category, MessageBuffer, SendMode};
///
/// let mut buffer = MessageBuffer::with_capacity(64);
/// buffer.prepare_for_send(SendMode::Reliable, Category::Data);
/// buffer.add_u16(42)?.add_i32(-7)?.add_str("hello")?;
///
/// buffer.prepare_for_receive(buffer.written());
/// assert_eq!(buffer.get_u16().value(), 42);
/// assert_eq!(buffer.get_i32().value(), -7);
/// assert_eq!(buffer.get_string().value(), "hello");
/// # Ok::<(), slipwire::EncodeError>(())
/// ```
#[derive(PartialEq)]
pub struct MessageBuffer {
    data: Box<[u8]>,
    read: usize,
    write: usize,
    mode: SendMode,
    max_send_attempts: u8,
}

impl MessageBuffer {
    /// Allocates a buffer able to hold `max_payload` bytes of typed data on
    /// top of the 3-byte datagram prelude.
    pub fn with_capacity(max_payload: usize) -> Self {
        Self {
            data: vec![0u8; HEADER_LEN + max_payload].into_boxed_slice(),
            read: 0,
            write: 0,
            mode: SendMode::Unreliable,
            max_send_attempts: DEFAULT_MAX_SEND_ATTEMPTS,
        }
    }

    /// Total capacity in bytes, prelude included.
    pub const fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Position of the write cursor; for a send buffer this is the datagram
    /// length so far.
    pub const fn written(&self) -> usize {
        self.write
    }

    /// Bytes still writable before the capacity is reached.
    pub const fn remaining_write(&self) -> usize {
        self.capacity() - self.write
    }

    /// Bytes between the read cursor and the write cursor.
    pub const fn unread(&self) -> usize {
        self.write - self.read
    }

    /// Send mode stamped into the header byte at prepare time.
    pub const fn mode(&self) -> SendMode {
        self.mode
    }

    /// Maximum number of transport send attempts for this datagram.
    pub const fn max_send_attempts(&self) -> u8 {
        self.max_send_attempts
    }

    /// Overrides the transport send-attempt budget.
    pub fn set_max_send_attempts(&mut self, attempts: u8) {
        self.max_send_attempts = attempts;
    }

    /// Transitions the buffer into the in-use-for-send state: cursors reset
    /// to `(read = 0, write = 1)` with the header byte written at offset 0.
    ///
    /// The application type id occupies bytes 1-2 and is appended by the
    /// caller as the first typed value.
    pub fn prepare_for_send(&mut self, mode: SendMode, category: Category) {
        self.data[0] = compose_header(mode, category);
        self.read = 0;
        self.write = 1;
        self.mode = mode;
        self.max_send_attempts = DEFAULT_MAX_SEND_ATTEMPTS;
    }

    /// Transitions the buffer into the in-use-for-receive state: the buffer
    /// is treated as pre-populated with `content_len` bytes, the read cursor
    /// skips the header byte.
    ///
    /// A declared length beyond the capacity is clamped so the cursor
    /// invariant survives malformed input.
    pub fn prepare_for_receive(&mut self, content_len: usize) {
        let len = if content_len > self.capacity() {
            warn!(
                declared = content_len,
                capacity = self.capacity(),
                "declared content length exceeds buffer capacity, clamping"
            );
            self.capacity()
        } else {
            content_len
        };
        self.read = 1.min(len);
        self.write = len;
        self.mode = SendMode::from_header(self.data[0]);
    }

    /// Copies a received datagram into the buffer and prepares it for
    /// decoding. Bytes beyond the capacity are dropped with a warning.
    pub fn load_datagram(&mut self, datagram: &[u8]) {
        let len = datagram.len().min(self.capacity());
        if len < datagram.len() {
            warn!(
                received = datagram.len(),
                capacity = self.capacity(),
                "datagram larger than buffer capacity, truncating"
            );
        }
        self.data[..len].copy_from_slice(&datagram[..len]);
        self.prepare_for_receive(len);
    }

    /// The datagram view handed to the transport: all bytes up to the write
    /// cursor.
    pub fn as_datagram(&self) -> &[u8] {
        &self.data[..self.write]
    }

    /// Header byte of the datagram, valid after either prepare step.
    pub(crate) fn header_byte(&self) -> u8 {
        self.data[0]
    }

    // Cursor-level primitives used by the codec. These are the only places
    // that move the cursors.

    /// Appends `bytes` at the write cursor. Capacity is verified before any
    /// byte is written, so a failed append leaves the buffer untouched.
    pub(crate) fn put_slice(&mut self, bytes: &[u8]) -> Result<(), crate::codec::EncodeError> {
        self.reserve(bytes.len())?;
        self.data[self.write..self.write + bytes.len()].copy_from_slice(bytes);
        self.write += bytes.len();
        Ok(())
    }

    /// Verifies that `len` more bytes fit, without writing.
    pub(crate) fn reserve(&self, len: usize) -> Result<(), crate::codec::EncodeError> {
        if self.remaining_write() < len {
            return Err(crate::codec::EncodeError::CapacityExceeded {
                needed: len,
                remaining: self.remaining_write(),
            });
        }
        Ok(())
    }

    /// Reads exactly `N` bytes from the read cursor. On underflow the read
    /// cursor is advanced to the write cursor and `None` is returned.
    pub(crate) fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        if self.unread() < N {
            self.read = self.write;
            return None;
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.read..self.read + N]);
        self.read += N;
        Some(out)
    }

    /// Reads exactly `len` bytes from the read cursor. On underflow the read
    /// cursor is advanced to the write cursor and `None` is returned.
    pub(crate) fn read_slice(&mut self, len: usize) -> Option<&[u8]> {
        if self.unread() < len {
            self.read = self.write;
            return None;
        }
        let start = self.read;
        self.read += len;
        Some(&self.data[start..start + len])
    }

    /// Current read cursor, used by the codec to undo a speculative length
    /// read.
    pub(crate) const fn read_mark(&self) -> usize {
        self.read
    }

    /// Rewinds the read cursor to a previously taken mark.
    pub(crate) fn read_rewind(&mut self, mark: usize) {
        debug_assert!(mark <= self.write);
        self.read = mark;
    }
}

impl fmt::Debug for MessageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBuffer")
            .field("capacity", &self.capacity())
            .field("read", &self.read)
            .field("write", &self.write)
            .field("mode", &self.mode)
            .field("data", &format_args!("{:02x?}", self.as_datagram()))
            .finish()
    }
}
