//! Datagram wire layout shared by both socket roles.
//!
//! Every datagram starts with a fixed 3-byte prelude:
//!
//! ```text
//!  byte 0          bytes 1-2           bytes 3..
//! +---------------+-------------------+----------------+
//! | header byte   | app type id (u16) | payload        |
//! +---------------+-------------------+----------------+
//! ```
//!
//! The header byte encodes the send mode and the message category:
//!
//! ```text
//!  7 6 5 4 3 2 1 0
//! +-+-+-+-+-+-+-+-+
//! |R|X|X|X|X| CAT |
//! +-+-+-+-+-+-----+
//! ```
//!
//! Where:
//! - R: reliable flag ([`SendMode::Reliable`] when set)
//! - CAT: message category (bits 0-2)
//! - X: reserved, zero on the wire

mod partial;

pub(crate) use partial::*;

/// Number of bytes reserved at the front of every datagram: one header byte
/// plus the 16-bit application type id.
pub const HEADER_LEN: usize = 3;

/// Identity of a connected peer, assigned by the transport layer.
pub type PeerId = u16;

/// Host-supplied parameters of the partial-message protocol.
///
/// The reserved type ids must be distinct from every application message
/// type and identical on both peers; the slice capacity is the
/// transport-imposed usable payload per slice datagram.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Reserved application type id carried by begin-descriptor datagrams.
    pub begin_type_id: u16,
    /// Reserved application type id carried by slice datagrams.
    pub slice_type_id: u16,
    /// Usable payload bytes per slice datagram.
    pub slice_capacity: usize,
    /// How long incomplete reassemblies and sender-side in-flight records
    /// are retained before the sweep drops them.
    pub retention: std::time::Duration,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            begin_type_id: u16::MAX,
            slice_type_id: u16::MAX - 1,
            slice_capacity: 1237,
            retention: std::time::Duration::from_secs(10),
        }
    }
}

/// Offset of the application type id within a datagram.
pub(crate) const TYPE_ID_OFFSET: usize = 1;

pub(crate) mod header {
    /// Number of bits used for the message category.
    pub(crate) const CATEGORY_BITS: u32 = 3;

    /// Bit mask extracting the category from the header byte.
    pub(crate) const CATEGORY_MASK: u8 = !(u8::MAX << CATEGORY_BITS);

    /// Reliable-delivery flag.
    pub(crate) const RELIABLE: u8 = 0b1000_0000;
}

/// Delivery classification handed to the transport alongside each datagram.
///
/// `Reliable` datagrams are assumed to eventually arrive at least once, but
/// **not** in order relative to other reliable datagrams. That is the reason
/// every slice of a split payload carries an explicit ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendMode {
    /// Fire-and-forget, may be lost.
    #[default]
    Unreliable,
    /// Retransmitted by the transport until acknowledged.
    Reliable,
}

impl SendMode {
    pub(crate) const fn as_u8(self) -> u8 {
        match self {
            SendMode::Unreliable => 0,
            SendMode::Reliable => header::RELIABLE,
        }
    }

    pub(crate) const fn from_header(byte: u8) -> Self {
        if byte & header::RELIABLE != 0 {
            SendMode::Reliable
        } else {
            SendMode::Unreliable
        }
    }
}

/// Message category carried in the low bits of the header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Category {
    /// A self-contained application payload.
    Data = 0,
    /// Begin-descriptor of a split payload: `{original type id, logical id,
    /// slice count}`.
    PartialBegin = 1,
    /// One slice of a split payload: `{logical id, ordinal, raw bytes}`.
    PartialSlice = 2,
}

impl Category {
    /// Extracts the category from a header byte. Returns `None` for values
    /// outside the known range, which a receive path treats as malformed.
    pub(crate) const fn from_header(byte: u8) -> Option<Self> {
        match byte & header::CATEGORY_MASK {
            0 => Some(Category::Data),
            1 => Some(Category::PartialBegin),
            2 => Some(Category::PartialSlice),
            _ => None,
        }
    }
}

/// Composes the header byte from its two fields.
pub(crate) const fn compose_header(mode: SendMode, category: Category) -> u8 {
    mode.as_u8() | category as u8
}

/// Reads the application type id embedded at bytes 1-2 of a datagram view.
pub(crate) fn embedded_type_id(datagram: &[u8]) -> Option<u16> {
    let raw = datagram.get(TYPE_ID_OFFSET..TYPE_ID_OFFSET + 2)?;
    Some(u16::from_le_bytes([raw[0], raw[1]]))
}
