//! Typed encode/decode on top of [`MessageBuffer`].
//!
//! # Encode contract
//!
//! Every `add_*` method writes the value's fixed-width little-endian
//! representation at the write cursor and advances it by exactly that width.
//! Capacity is verified **before** any byte is written: a failed `add_*`
//! leaves the buffer untouched. Each method returns `&mut MessageBuffer` on
//! success so construction chains with `?`:
//!
//! ```
//! use slipwire::{Category, MessageBuffer, SendMode};
//!
//! let mut buffer = MessageBuffer::with_capacity(32);
//! buffer.prepare_for_send(SendMode::Reliable, Category::Data);
//! buffer.add_u16(7)?.add_bool(true)?.add_f32(1.5)?;
//! # Ok::<(), slipwire::EncodeError>(())
//! ```
//!
//! # Decode contract
//!
//! Every `get_*` method returns a [`Decoded<T>`] and **never fails the
//! caller**: on underflow it yields the type's zero value (0 / `false` /
//! empty string / empty vec) tagged [`ReadStatus::Truncated`], logs a
//! warning, and advances the read cursor by the bytes actually available, so
//! a truncated or malformed datagram can never crash a receive path.
//! Subsequent reads stay self-consistent (they see an empty buffer).
//! Semantic validation of the values is the application's business.
//!
//! # Array length prefix
//!
//! Arrays and strings are length-prefixed by a variable-width prefix:
//! 0-127 elements take one byte; 128-32767 take two bytes with the top bit
//! of the first byte set as the wide-length flag. Longer arrays fail with
//! [`EncodeError::LengthOverflow`]; callers must switch to the `_raw`
//! variants and carry the count out-of-band.

mod array;
mod num;
mod string;

use thiserror::Error;

use crate::buffers::MessageBuffer;

/// Largest element count the automatic length prefix can describe.
pub const MAX_AUTO_LEN: usize = 0x7FFF;

/// Wide-length flag on the first prefix byte.
const WIDE_LEN: u8 = 0x80;

/// Error raised by the `add_*` encode family.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// The value does not fit in the buffer's remaining writable capacity.
    /// Nothing was written; the caller must shrink the payload or route it
    /// through the partial-message splitter.
    #[error("write capacity exceeded: needed {needed} bytes, {remaining} remaining")]
    CapacityExceeded { needed: usize, remaining: usize },

    /// The array exceeds the automatic length-prefix limit of
    /// [`MAX_AUTO_LEN`] elements.
    #[error("array length {len} exceeds the {MAX_AUTO_LEN}-element length-prefix limit")]
    LengthOverflow { len: usize },
}

/// Error raised when decoding into a caller-supplied destination.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The output buffer cannot hold the declared amount. The read cursor is
    /// left where it was.
    #[error("destination too small: {needed} bytes declared, {capacity} available")]
    DestinationTooSmall { needed: usize, capacity: usize },
}

/// Whether a decoded value was backed by enough bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// The full fixed-width representation was present.
    Complete,
    /// The buffer ran out of bytes; the value is the type's zero value.
    Truncated,
}

/// A decoded value paired with its [`ReadStatus`].
///
/// The status lets callers distinguish a legitimately-zero value from one
/// degraded by a truncated datagram, without giving up the never-failing
/// read contract.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct Decoded<T> {
    value: T,
    status: ReadStatus,
}

impl<T> Decoded<T> {
    pub(crate) fn complete(value: T) -> Self {
        Self {
            value,
            status: ReadStatus::Complete,
        }
    }

    pub(crate) fn truncated(value: T) -> Self {
        Self {
            value,
            status: ReadStatus::Truncated,
        }
    }

    /// Consumes the wrapper, yielding the value.
    pub fn value(self) -> T {
        self.value
    }

    /// The decode status.
    pub const fn status(&self) -> ReadStatus {
        self.status
    }

    /// `true` when the value degraded to its zero value because the buffer
    /// ran out of bytes.
    pub fn is_truncated(&self) -> bool {
        self.status == ReadStatus::Truncated
    }

    /// Splits into value and status.
    pub fn into_parts(self) -> (T, ReadStatus) {
        (self.value, self.status)
    }
}

/// Width in bytes of the length prefix describing `len` elements.
pub(crate) const fn len_prefix_size(len: usize) -> usize {
    if len < WIDE_LEN as usize { 1 } else { 2 }
}

impl MessageBuffer {
    /// Writes the variable-width length prefix. The caller has already
    /// reserved capacity and checked `len <= MAX_AUTO_LEN`.
    pub(crate) fn put_len_prefix(&mut self, len: usize) -> Result<(), EncodeError> {
        debug_assert!(len <= MAX_AUTO_LEN);
        if len < WIDE_LEN as usize {
            self.put_slice(&[len as u8])
        } else {
            self.put_slice(&[WIDE_LEN | (len >> 8) as u8, len as u8])
        }
    }

    /// Reads the variable-width length prefix.
    pub(crate) fn get_len_prefix(&mut self) -> Decoded<usize> {
        let Some([first]) = self.read_array::<1>() else {
            return Decoded::truncated(0);
        };
        if first & WIDE_LEN == 0 {
            return Decoded::complete(first as usize);
        }
        let Some([second]) = self.read_array::<1>() else {
            return Decoded::truncated(0);
        };
        Decoded::complete((((first & !WIDE_LEN) as usize) << 8) | second as usize)
    }
}
