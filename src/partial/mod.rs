//! Segmentation and reassembly of payloads too large for one datagram.
//!
//! The sender side ([`splitter`]) turns an oversized payload into one
//! begin-descriptor plus N ordinal-tagged slices. The receiver side
//! ([`assembler`]) accumulates slices in any arrival order, detects
//! completion, and reconstructs the original bytes ordered by ordinal.
//! Neither side assumes the begin-descriptor arrives before the slices:
//! reliable sends are at-least-once but unordered across datagrams.

pub(crate) mod assembler;
pub(crate) mod splitter;

use crate::protocol::PeerId;

/// Reassembly progress for one logical message, reported to the observer
/// registered for the original application type on every newly stored slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Correlates the report with one split payload.
    pub logical_id: u32,
    /// Slice count declared by the begin-descriptor, when it has arrived.
    pub declared: Option<u32>,
    /// Number of distinct ordinals stored so far.
    pub received: u32,
    /// The distinct ordinals stored so far, ascending.
    pub ordinals: Vec<u32>,
}

/// Report of a reassembly abandoned by the retention sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassemblyFailure {
    pub logical_id: u32,
    /// Original application type, unknown when the begin-descriptor never
    /// arrived.
    pub type_id: Option<u16>,
    /// Sending peer, on the multi-client role.
    pub sender: Option<PeerId>,
    /// Distinct ordinals stored before the entry expired.
    pub received: u32,
    pub declared: Option<u32>,
}
