//! Length-prefixed arrays, raw byte runs and bit-packed boolean arrays.

use tracing::warn;

use super::{Decoded, DecodeError, EncodeError, MAX_AUTO_LEN, len_prefix_size};
use crate::buffers::MessageBuffer;

impl MessageBuffer {
    /// Appends a length-prefixed byte array.
    ///
    /// The whole write (prefix plus payload) is checked against the
    /// remaining capacity before a single byte lands, so failure is atomic.
    pub fn add_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self, EncodeError> {
        if bytes.len() > MAX_AUTO_LEN {
            return Err(EncodeError::LengthOverflow { len: bytes.len() });
        }
        self.reserve(len_prefix_size(bytes.len()) + bytes.len())?;
        self.put_len_prefix(bytes.len())?;
        self.put_slice(bytes)?;
        Ok(self)
    }

    /// Reads a length-prefixed byte array; empty when truncated.
    pub fn get_bytes(&mut self) -> Decoded<Vec<u8>> {
        let len = self.get_len_prefix();
        if len.is_truncated() {
            return Decoded::truncated(Vec::new());
        }
        let len = len.value();
        match self.read_slice(len) {
            Some(bytes) => Decoded::complete(bytes.to_vec()),
            None => {
                warn!(declared = len, "byte array truncated, returning empty");
                Decoded::truncated(Vec::new())
            }
        }
    }

    /// Appends bytes without a length prefix. The receiver must know the
    /// count out-of-band and use [`get_bytes_raw`](Self::get_bytes_raw).
    pub fn add_bytes_raw(&mut self, bytes: &[u8]) -> Result<&mut Self, EncodeError> {
        self.put_slice(bytes)?;
        Ok(self)
    }

    /// Reads exactly `amount` unprefixed bytes; empty when truncated.
    pub fn get_bytes_raw(&mut self, amount: usize) -> Decoded<Vec<u8>> {
        match self.read_slice(amount) {
            Some(bytes) => Decoded::complete(bytes.to_vec()),
            None => {
                warn!(requested = amount, "raw byte read underflow, returning empty");
                Decoded::truncated(Vec::new())
            }
        }
    }

    /// Reads all bytes between the read cursor and the write cursor.
    pub fn get_remaining_bytes(&mut self) -> Vec<u8> {
        let len = self.unread();
        match self.read_slice(len) {
            Some(bytes) => bytes.to_vec(),
            None => Vec::new(),
        }
    }

    /// Decodes a length-prefixed byte array into a caller-supplied slice,
    /// returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// [`DecodeError::DestinationTooSmall`] when the declared amount exceeds
    /// `dst.len()`; the read cursor is left where it was.
    pub fn get_bytes_into(&mut self, dst: &mut [u8]) -> Result<Decoded<usize>, DecodeError> {
        let mark = self.read_mark();
        let len = self.get_len_prefix();
        if len.is_truncated() {
            return Ok(Decoded::truncated(0));
        }
        let len = len.value();
        if len > dst.len() {
            self.read_rewind(mark);
            return Err(DecodeError::DestinationTooSmall {
                needed: len,
                capacity: dst.len(),
            });
        }
        match self.read_slice(len) {
            Some(bytes) => {
                dst[..len].copy_from_slice(bytes);
                Ok(Decoded::complete(len))
            }
            None => {
                warn!(declared = len, "byte array truncated, destination untouched");
                Ok(Decoded::truncated(0))
            }
        }
    }

    /// Appends a length-prefixed boolean array, bit-packed eight per byte.
    ///
    /// Bit 0 of each byte is the least significant; unused high bits of the
    /// final byte are zero on the wire.
    pub fn add_bools(&mut self, values: &[bool]) -> Result<&mut Self, EncodeError> {
        if values.len() > MAX_AUTO_LEN {
            return Err(EncodeError::LengthOverflow { len: values.len() });
        }
        let packed_len = values.len().div_ceil(8);
        self.reserve(len_prefix_size(values.len()) + packed_len)?;
        self.put_len_prefix(values.len())?;

        let mut packed = vec![0u8; packed_len];
        for (i, &bit) in values.iter().enumerate() {
            if bit {
                packed[i / 8] |= 1 << (i % 8);
            }
        }
        self.put_slice(&packed)?;
        Ok(self)
    }

    /// Reads a bit-packed boolean array; empty when truncated.
    pub fn get_bools(&mut self) -> Decoded<Vec<bool>> {
        let len = self.get_len_prefix();
        if len.is_truncated() {
            return Decoded::truncated(Vec::new());
        }
        let len = len.value();
        match self.read_slice(len.div_ceil(8)) {
            Some(packed) => {
                let mut values = Vec::with_capacity(len);
                for i in 0..len {
                    values.push(packed[i / 8] & (1 << (i % 8)) != 0);
                }
                Decoded::complete(values)
            }
            None => {
                warn!(declared = len, "boolean array truncated, returning empty");
                Decoded::truncated(Vec::new())
            }
        }
    }
}

macro_rules! num_array_impl {
    ($ty:ty, $add:ident, $get:ident) => {
        impl MessageBuffer {
            #[doc = concat!("Appends a length-prefixed `", stringify!($ty), "` array (elements little-endian).")]
            pub fn $add(&mut self, values: &[$ty]) -> Result<&mut Self, EncodeError> {
                if values.len() > MAX_AUTO_LEN {
                    return Err(EncodeError::LengthOverflow { len: values.len() });
                }
                let payload = values.len() * size_of::<$ty>();
                self.reserve(len_prefix_size(values.len()) + payload)?;
                self.put_len_prefix(values.len())?;
                for value in values {
                    self.put_slice(&value.to_le_bytes())?;
                }
                Ok(self)
            }

            #[doc = concat!("Reads a length-prefixed `", stringify!($ty), "` array; empty when truncated.")]
            pub fn $get(&mut self) -> Decoded<Vec<$ty>> {
                let len = self.get_len_prefix();
                if len.is_truncated() {
                    return Decoded::truncated(Vec::new());
                }
                let len = len.value();
                const N: usize = size_of::<$ty>();
                if self.unread() < len * N {
                    warn!(
                        ty = stringify!($ty),
                        declared = len,
                        "numeric array truncated, returning empty"
                    );
                    let _ = self.read_slice(self.unread());
                    return Decoded::truncated(Vec::new());
                }
                let mut values = Vec::with_capacity(len);
                for _ in 0..len {
                    // Availability checked above, so this cannot drain.
                    let raw = self.read_array::<N>().unwrap_or([0u8; N]);
                    values.push(<$ty>::from_le_bytes(raw));
                }
                Decoded::complete(values)
            }
        }
    };
}

num_array_impl!(u16, add_u16s, get_u16s);
num_array_impl!(i16, add_i16s, get_i16s);
num_array_impl!(u32, add_u32s, get_u32s);
num_array_impl!(i32, add_i32s, get_i32s);
num_array_impl!(u64, add_u64s, get_u64s);
num_array_impl!(i64, add_i64s, get_i64s);
num_array_impl!(f32, add_f32s, get_f32s);
num_array_impl!(f64, add_f64s, get_f64s);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Category, SendMode};

    fn send_buffer(max_payload: usize) -> MessageBuffer {
        let mut buffer = MessageBuffer::with_capacity(max_payload);
        buffer.prepare_for_send(SendMode::Unreliable, Category::Data);
        buffer
    }

    #[test]
    fn test_bytes_round_trip_boundary_lengths() {
        for len in [0usize, 1, 127, 128, 32767] {
            let bytes: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let mut buffer = send_buffer(len + 8);
            buffer.add_bytes(&bytes).unwrap();
            buffer.prepare_for_receive(buffer.written());
            let decoded = buffer.get_bytes();
            assert!(!decoded.is_truncated());
            assert_eq!(decoded.value(), bytes, "len {len}");
        }
    }

    #[test]
    fn test_length_overflow() {
        let bytes = vec![0u8; MAX_AUTO_LEN + 1];
        let mut buffer = send_buffer(MAX_AUTO_LEN + 64);
        let before = buffer.written();
        assert_eq!(
            buffer.add_bytes(&bytes),
            Err(EncodeError::LengthOverflow { len: MAX_AUTO_LEN + 1 })
        );
        assert_eq!(buffer.written(), before);

        // The raw variant takes the same payload.
        buffer.add_bytes_raw(&bytes).unwrap();
        buffer.prepare_for_receive(buffer.written());
        assert_eq!(buffer.get_bytes_raw(bytes.len()).value(), bytes);
    }

    #[test]
    fn test_add_bytes_atomic_on_capacity() {
        let mut buffer = send_buffer(4);
        let before = buffer.written();
        let err = buffer.add_bytes(&[0u8; 32]).unwrap_err();
        assert!(matches!(err, EncodeError::CapacityExceeded { .. }));
        assert_eq!(buffer.written(), before);
    }

    #[test]
    fn test_bools_bit_for_bit() {
        for len in [0usize, 1, 7, 8, 9, 100] {
            let values: Vec<bool> = (0..len).map(|i| i % 3 == 0).collect();
            let mut buffer = send_buffer(64);
            buffer.add_bools(&values).unwrap();

            // Wire size: prefix + ceil(len / 8) bytes.
            assert_eq!(buffer.written(), 1 + len_prefix_size(len) + len.div_ceil(8));

            buffer.prepare_for_receive(buffer.written());
            let decoded = buffer.get_bools();
            assert!(!decoded.is_truncated());
            assert_eq!(decoded.value(), values, "len {len}");
        }
    }

    #[test]
    fn test_bools_final_byte_zero_padded() {
        let mut buffer = send_buffer(16);
        buffer.add_bools(&[true, false, true]).unwrap();
        // 0b0000_0101: bit 0 is the first element.
        assert_eq!(buffer.as_datagram()[2], 0b0000_0101);
    }

    #[test]
    fn test_numeric_array_round_trip() {
        let mut buffer = send_buffer(256);
        let u16s = [0u16, 1, u16::MAX];
        let i32s = [i32::MIN, -1, 0, i32::MAX];
        let f64s = [0.0f64, -2.5, f64::MAX];
        buffer.add_u16s(&u16s).unwrap().add_i32s(&i32s).unwrap().add_f64s(&f64s).unwrap();

        buffer.prepare_for_receive(buffer.written());
        assert_eq!(buffer.get_u16s().value(), u16s);
        assert_eq!(buffer.get_i32s().value(), i32s);
        assert_eq!(buffer.get_f64s().value(), f64s);
    }

    #[test]
    fn test_truncated_array_degrades_to_empty() {
        let mut buffer = send_buffer(64);
        buffer.add_u32s(&[1, 2, 3, 4]).unwrap();
        // Chop the last element off.
        buffer.prepare_for_receive(buffer.written() - 2);
        let decoded = buffer.get_u32s();
        assert!(decoded.is_truncated());
        assert!(decoded.value().is_empty());
        assert_eq!(buffer.unread(), 0);
    }

    #[test]
    fn test_get_bytes_into() {
        let mut buffer = send_buffer(64);
        buffer.add_bytes(&[9, 8, 7]).unwrap();
        buffer.prepare_for_receive(buffer.written());

        let mut small = [0u8; 2];
        assert_eq!(
            buffer.get_bytes_into(&mut small),
            Err(DecodeError::DestinationTooSmall { needed: 3, capacity: 2 })
        );

        // Cursor untouched, a large enough destination still succeeds.
        let mut dst = [0u8; 8];
        let written = buffer.get_bytes_into(&mut dst).unwrap();
        assert_eq!(written.value(), 3);
        assert_eq!(&dst[..3], &[9, 8, 7]);
    }
}
