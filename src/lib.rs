//! Slipwire: the wire-encoding and message-segmentation core of a
//! real-time networking stack.
//!
//! Slipwire sits between application code, which produces and consumes
//! typed messages, and a reliable-UDP transport, which delivers raw
//! datagrams under its own retry policy. It owns two tightly coupled jobs:
//!
//! - **Buffer/codec**: a reusable, cursor-based [`MessageBuffer`] with
//!   precise typed encode/decode for primitives, arrays, bit-packed
//!   booleans and strings. Encoding fails atomically when capacity runs
//!   out; decoding **never** fails the caller — truncated input degrades to
//!   zero values with an explicit [`ReadStatus`], so a malformed datagram
//!   cannot crash a receive path.
//! - **Partial messages**: payloads too large for one datagram are split
//!   into one begin-descriptor plus N ordinal-tagged slices, reassembled on
//!   the peer in whatever order the transport delivers them.
//!
//! # Overview
//!
//! ```text
//!  APPLICATION SEND                              slipwire
//! ┌───────────────────┐   fits one datagram   ┌───────────┐
//! │ typed add_* calls ├──────────────────────►│ Transport │
//! └─────────┬─────────┘                       └───────────┘
//!           │ oversized                             ▲
//!           ▼                                       │
//!   ┌───────────────┐   [begin][s1][s2]...[sN]      │
//!   │   Splitter    ├───────────────────────────────┘
//!   └───────────────┘        all reliable, ordinal-tagged
//!
//!  APPLICATION RECEIVE
//!   ┌───────────────┐  s2, s4, begin, s1, ...  (any arrival order)
//!   │   Assembler   │  reorders by ordinal, detects completion,
//!   └───────┬───────┘  reports progress per application type
//!           ▼
//!   on_complete(type_id): decodable message [+ sender on the server role]
//! ```
//!
//! # Quick start
//!
//! ```
//! use std::sync::Arc;
//!
//! use slipwire::{
//!     BufferPool, Client, MessageBuffer, PeerId, ProtocolConfig, SendMode, Server, Transport,
//! };
//!
//! // A transport that loops client datagrams straight into a server role.
//! #[derive(Default)]
//! struct Pipe(Vec<Vec<u8>>);
//!
//! impl Transport for Pipe {
//!     fn send(&mut self, buffer: &MessageBuffer, _target: Option<PeerId>) {
//!         self.0.push(buffer.as_datagram().to_vec());
//!     }
//!     fn broadcast(&mut self, buffer: &MessageBuffer) {
//!         self.0.push(buffer.as_datagram().to_vec());
//!     }
//! }
//!
//! let pool = Arc::new(BufferPool::new());
//! let mut client = Client::new(pool.clone(), ProtocolConfig::default());
//! let mut server = Server::new(pool.clone(), ProtocolConfig::default());
//!
//! const POSITION: u16 = 5;
//! server.on_complete(POSITION, |message, sender| {
//!     let x = message.get_f32().value();
//!     let y = message.get_f32().value();
//!     println!("peer {sender} moved to ({x}, {y})");
//! });
//!
//! let mut pipe = Pipe::default();
//! let mut message = client.compose(POSITION, SendMode::Unreliable)?;
//! message.add_f32(1.0)?.add_f32(-2.0)?;
//! client.send(&mut pipe, message)?;
//!
//! for datagram in pipe.0.drain(..) {
//!     server.handle_datagram(&datagram, 3);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Concurrency model
//!
//! Every operation is synchronous and bounded-time: no I/O, no blocking, no
//! timers. The [`BufferPool`] is the one shared seam and guards
//! retrieve/release with a mutex; a retrieved buffer is exclusively owned
//! until released. Role contexts ([`Client`], [`Server`]) own their
//! registries and counters outright — nothing in this crate is process-wide
//! state. The host drives time by calling `reclaim_expired` with
//! `Instant::now()`, which bounds how long abandoned reassemblies and
//! sender-side in-flight records are retained.

mod api;
mod buffers;
mod codec;
mod partial;
mod protocol;

pub use api::{Client, SendError, Server, Transport};
pub use buffers::{
    MessageBuffer,
    pool::{BufferPool, DEFAULT_MAX_PAYLOAD, PoolError},
};
pub use codec::{DecodeError, Decoded, EncodeError, MAX_AUTO_LEN, ReadStatus};
pub use partial::{Progress, ReassemblyFailure};
pub use protocol::{Category, HEADER_LEN, PeerId, ProtocolConfig, SendMode};
