//! Sender-side segmentation of oversized payloads.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use tracing::debug;

use crate::{
    buffers::pool::BufferPool,
    codec::EncodeError,
    protocol::{BeginHeader, Category, ProtocolConfig, SendMode, SliceHeader},
};

/// Record of an emitted split, retained so a resend-on-request capability
/// can be layered on later. Pruned by the retention sweep.
#[derive(Debug)]
pub(crate) struct OutboundPartial {
    pub(crate) type_id: u16,
    pub(crate) slices: Vec<Vec<u8>>,
    created_at: Instant,
}

/// Splits payloads into begin + slice datagrams and retains what it sent.
///
/// The logical-id counter lives here, one per socket role, so ids are unique
/// within the role that allocated them and cross-role collisions cannot
/// happen.
#[derive(Debug, Default)]
pub(crate) struct Splitter {
    next_logical_id: u32,
    sent: HashMap<u32, OutboundPartial>,
}

impl Splitter {
    /// Number of slices needed for `len` payload bytes at `capacity` bytes
    /// per slice. An empty payload still takes one slice.
    pub(crate) fn slice_count(len: usize, capacity: usize) -> usize {
        len.div_ceil(capacity).max(1)
    }

    /// Splits `payload` and hands each built datagram buffer to `emit`, in
    /// order: the begin-descriptor first, then the slices with 1-based
    /// strictly increasing ordinals. All datagrams are reliable.
    ///
    /// Returns the logical id allocated for this split.
    pub(crate) fn split<F>(
        &mut self,
        pool: &BufferPool,
        config: &ProtocolConfig,
        payload: &[u8],
        original_type_id: u16,
        now: Instant,
        mut emit: F,
    ) -> Result<u32, EncodeError>
    where
        F: FnMut(crate::buffers::MessageBuffer),
    {
        let capacity = config.slice_capacity;
        let count = Self::slice_count(payload.len(), capacity);

        self.next_logical_id = self.next_logical_id.wrapping_add(1);
        let logical_id = self.next_logical_id;

        debug!(
            logical_id,
            payload_len = payload.len(),
            slice_count = count,
            "splitting oversized payload"
        );

        let mut begin = pool.retrieve_for_send(SendMode::Reliable, Category::PartialBegin);
        begin.add_u16(config.begin_type_id)?;
        BeginHeader {
            original_type_id,
            logical_id,
            slice_count: count as i32,
        }
        .write(&mut begin)?;
        emit(begin);

        let mut retained = Vec::with_capacity(count);
        for (index, chunk) in payload.chunks(capacity).enumerate() {
            let mut slice = pool.retrieve_for_send(SendMode::Reliable, Category::PartialSlice);
            slice.add_u16(config.slice_type_id)?;
            SliceHeader {
                logical_id,
                ordinal: index as u32 + 1,
            }
            .write(&mut slice)?;
            slice.add_bytes_raw(chunk)?;
            retained.push(chunk.to_vec());
            emit(slice);
        }
        if payload.is_empty() {
            // ceil(0 / U) is zero but the protocol still carries one slice.
            let mut slice = pool.retrieve_for_send(SendMode::Reliable, Category::PartialSlice);
            slice.add_u16(config.slice_type_id)?;
            SliceHeader { logical_id, ordinal: 1 }.write(&mut slice)?;
            retained.push(Vec::new());
            emit(slice);
        }

        self.sent.insert(
            logical_id,
            OutboundPartial {
                type_id: original_type_id,
                slices: retained,
                created_at: now,
            },
        );
        Ok(logical_id)
    }

    /// The retained record for a logical id, while it has not been pruned.
    pub(crate) fn sent_record(&self, logical_id: u32) -> Option<&OutboundPartial> {
        self.sent.get(&logical_id)
    }

    /// Prunes in-flight records older than `retention`.
    pub(crate) fn reclaim_expired(&mut self, now: Instant, retention: Duration) {
        self.sent
            .retain(|_, record| now.duration_since(record.created_at) < retention);
    }

    #[cfg(test)]
    pub(crate) fn sent_len(&self) -> usize {
        self.sent.len()
    }
}
