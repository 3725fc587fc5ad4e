//! Strings travel as length-prefixed UTF-8 bytes.
//!
//! The prefix counts bytes, not characters, and shares the limits of
//! [`add_bytes`](crate::MessageBuffer::add_bytes).

use tracing::warn;

use super::{Decoded, EncodeError};
use crate::buffers::MessageBuffer;

impl MessageBuffer {
    /// Appends a length-prefixed UTF-8 string.
    pub fn add_str(&mut self, value: &str) -> Result<&mut Self, EncodeError> {
        self.add_bytes(value.as_bytes())
    }

    /// Reads a length-prefixed UTF-8 string; empty when truncated or when
    /// the bytes are not valid UTF-8.
    pub fn get_string(&mut self) -> Decoded<String> {
        let (bytes, status) = self.get_bytes().into_parts();
        match String::from_utf8(bytes) {
            Ok(value) => Decoded { value, status },
            Err(_) => {
                warn!("string payload is not valid UTF-8, returning empty");
                Decoded::truncated(String::new())
            }
        }
    }
}
