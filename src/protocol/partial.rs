//! Wire structs for the partial-message protocol.
//!
//! A payload too large for one datagram travels as one begin-descriptor
//! followed by N slices, all reliable. Begin and slices may arrive in any
//! relative order; the logical id correlates them.
//!
//! ```text
//! begin payload:  u16 original type id | u32 logical id | i32 slice count
//! slice payload:  u32 logical id | u32 ordinal | raw bytes (rest of datagram)
//! ```

use crate::{
    buffers::MessageBuffer,
    codec::EncodeError,
};

/// Begin-descriptor of a split payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BeginHeader {
    /// Type id of the original application message embedded in the slices.
    pub(crate) original_type_id: u16,
    /// Correlates this descriptor with its slices.
    pub(crate) logical_id: u32,
    /// Number of slices the sender emitted.
    pub(crate) slice_count: i32,
}

impl BeginHeader {
    pub(crate) fn write(&self, buffer: &mut MessageBuffer) -> Result<(), EncodeError> {
        buffer
            .add_u16(self.original_type_id)?
            .add_u32(self.logical_id)?
            .add_i32(self.slice_count)?;
        Ok(())
    }

    /// Decodes a begin payload. Returns `None` when the datagram is truncated.
    pub(crate) fn read(buffer: &mut MessageBuffer) -> Option<Self> {
        let original_type_id = buffer.get_u16();
        let logical_id = buffer.get_u32();
        let slice_count = buffer.get_i32();
        if original_type_id.is_truncated() || logical_id.is_truncated() || slice_count.is_truncated() {
            return None;
        }
        Some(Self {
            original_type_id: original_type_id.value(),
            logical_id: logical_id.value(),
            slice_count: slice_count.value(),
        })
    }

    #[cfg(test)]
    pub(crate) fn rand() -> Self {
        Self {
            original_type_id: rand::random(),
            logical_id: rand::random(),
            slice_count: rand::random_range(1..=i32::MAX),
        }
    }
}

/// Per-slice header; the raw slice bytes consume the rest of the datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SliceHeader {
    pub(crate) logical_id: u32,
    /// 1-based position of this slice within the split payload.
    pub(crate) ordinal: u32,
}

impl SliceHeader {
    pub(crate) fn write(&self, buffer: &mut MessageBuffer) -> Result<(), EncodeError> {
        buffer.add_u32(self.logical_id)?.add_u32(self.ordinal)?;
        Ok(())
    }

    /// Decodes a slice header. Returns `None` when the datagram is truncated.
    pub(crate) fn read(buffer: &mut MessageBuffer) -> Option<Self> {
        let logical_id = buffer.get_u32();
        let ordinal = buffer.get_u32();
        if logical_id.is_truncated() || ordinal.is_truncated() {
            return None;
        }
        Some(Self {
            logical_id: logical_id.value(),
            ordinal: ordinal.value(),
        })
    }

    #[cfg(test)]
    pub(crate) fn rand() -> Self {
        Self {
            logical_id: rand::random(),
            ordinal: rand::random_range(1..=u32::MAX),
        }
    }
}
