//! Fixed-width primitive paths, generated per type.

use tracing::warn;

use super::{Decoded, EncodeError};
use crate::buffers::MessageBuffer;

macro_rules! num_impl {
    ($ty:ty, $add:ident, $get:ident) => {
        impl MessageBuffer {
            #[doc = concat!("Appends a `", stringify!($ty), "` (little-endian) at the write cursor.")]
            pub fn $add(&mut self, value: $ty) -> Result<&mut Self, EncodeError> {
                self.put_slice(&value.to_le_bytes())?;
                Ok(self)
            }

            #[doc = concat!("Reads a `", stringify!($ty), "` from the read cursor; zero when truncated.")]
            pub fn $get(&mut self) -> Decoded<$ty> {
                const N: usize = size_of::<$ty>();
                match self.read_array::<N>() {
                    Some(raw) => Decoded::complete(<$ty>::from_le_bytes(raw)),
                    None => {
                        warn!(ty = stringify!($ty), "read underflow, returning zero value");
                        Decoded::truncated(<$ty>::default())
                    }
                }
            }
        }
    };
}

num_impl!(u8, add_u8, get_u8);
num_impl!(i8, add_i8, get_i8);
num_impl!(u16, add_u16, get_u16);
num_impl!(i16, add_i16, get_i16);
num_impl!(u32, add_u32, get_u32);
num_impl!(i32, add_i32, get_i32);
num_impl!(u64, add_u64, get_u64);
num_impl!(i64, add_i64, get_i64);
num_impl!(f32, add_f32, get_f32);
num_impl!(f64, add_f64, get_f64);

impl MessageBuffer {
    /// Appends a `bool` as a single byte (0 or 1).
    pub fn add_bool(&mut self, value: bool) -> Result<&mut Self, EncodeError> {
        self.add_u8(value as u8)
    }

    /// Reads a `bool`; any non-zero byte is `true`, underflow is `false`.
    pub fn get_bool(&mut self) -> Decoded<bool> {
        let (value, status) = self.get_u8().into_parts();
        Decoded { value: value != 0, status }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Category, SendMode};

    const NUM_ITER: usize = 100;

    fn send_buffer() -> MessageBuffer {
        let mut buffer = MessageBuffer::with_capacity(64);
        buffer.prepare_for_send(SendMode::Unreliable, Category::Data);
        buffer
    }

    macro_rules! run {
        ($ty:ty, $add:ident, $get:ident, $value:expr) => {{
            let x: $ty = $value;
            let mut buffer = send_buffer();
            buffer.$add(x).unwrap();
            buffer.prepare_for_receive(buffer.written());
            let decoded = buffer.$get();
            assert!(!decoded.is_truncated());
            assert_eq!(decoded.value(), x);
            assert_eq!(buffer.unread(), 0);
        }};
    }

    macro_rules! run_boundaries {
        ($ty:ty, $add:ident, $get:ident) => {
            run!($ty, $add, $get, <$ty>::MIN);
            run!($ty, $add, $get, <$ty>::MAX);
            run!($ty, $add, $get, 0);
            for _ in 0..NUM_ITER {
                run!($ty, $add, $get, rand::random::<$ty>());
            }
        };
    }

    #[test]
    fn test_unsigned_round_trip() {
        run_boundaries!(u8, add_u8, get_u8);
        run_boundaries!(u16, add_u16, get_u16);
        run_boundaries!(u32, add_u32, get_u32);
        run_boundaries!(u64, add_u64, get_u64);
    }

    #[test]
    fn test_signed_round_trip() {
        run_boundaries!(i8, add_i8, get_i8);
        run_boundaries!(i16, add_i16, get_i16);
        run_boundaries!(i32, add_i32, get_i32);
        run_boundaries!(i64, add_i64, get_i64);
        run!(i8, add_i8, get_i8, -1);
        run!(i16, add_i16, get_i16, -1);
        run!(i32, add_i32, get_i32, -1);
        run!(i64, add_i64, get_i64, -1);
    }

    #[test]
    fn test_float_round_trip() {
        run!(f32, add_f32, get_f32, 0.0);
        run!(f32, add_f32, get_f32, f32::MIN);
        run!(f32, add_f32, get_f32, f32::MAX);
        run!(f64, add_f64, get_f64, 0.0);
        run!(f64, add_f64, get_f64, f64::MIN);
        run!(f64, add_f64, get_f64, f64::MAX);
        for _ in 0..NUM_ITER {
            run!(f32, add_f32, get_f32, rand::random::<f32>());
            run!(f64, add_f64, get_f64, rand::random::<f64>());
        }
    }

    #[test]
    fn test_bool_round_trip() {
        for x in [false, true] {
            let mut buffer = send_buffer();
            buffer.add_bool(x).unwrap();
            buffer.prepare_for_receive(buffer.written());
            assert_eq!(buffer.get_bool().value(), x);
        }
    }

    #[test]
    fn test_underflow_returns_zero_and_drains() {
        let mut buffer = send_buffer();
        buffer.add_u16(0xABCD).unwrap();
        buffer.prepare_for_receive(buffer.written());

        // First read consumes the two bytes; the second has nothing left.
        let _ = buffer.get_u16();
        let decoded = buffer.get_u64();
        assert!(decoded.is_truncated());
        assert_eq!(decoded.value(), 0);
        assert_eq!(buffer.unread(), 0);

        // A partially available value also drains to the write position.
        let mut buffer = send_buffer();
        buffer.add_u8(9).unwrap().add_u8(7).unwrap();
        buffer.prepare_for_receive(buffer.written());
        let decoded = buffer.get_u32();
        assert!(decoded.is_truncated());
        assert_eq!(decoded.value(), 0);
        assert_eq!(buffer.unread(), 0);
    }

    #[test]
    fn test_chained_encode() {
        let mut buffer = send_buffer();
        buffer
            .add_u8(1)
            .unwrap()
            .add_i16(-2)
            .unwrap()
            .add_u32(3)
            .unwrap()
            .add_f64(4.5)
            .unwrap();
        buffer.prepare_for_receive(buffer.written());
        assert_eq!(buffer.get_u8().value(), 1);
        assert_eq!(buffer.get_i16().value(), -2);
        assert_eq!(buffer.get_u32().value(), 3);
        assert_eq!(buffer.get_f64().value(), 4.5);
    }
}
