//! Element types of signal payloads.
//!
//! Every Sync or Async signal stores an N-dimensional array of a single
//! fixed-width element type. [`ElementType`] is the runtime tag persisted in
//! the dataset descriptor; [`Element`] connects a Rust primitive to its tag
//! and its little-endian encoding for typed writes and reads.

use serde::{Deserialize, Serialize};

/// Runtime tag of a payload element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    /// Signed 8-bit integer.
    I8,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 8-bit integer.
    U8,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 32-bit integer.
    U32,
    /// Unsigned 64-bit integer.
    U64,
    /// IEEE 754 single precision float.
    F32,
    /// IEEE 754 double precision float.
    F64,
}

impl ElementType {
    /// Size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Lowercase name as used in descriptors and CLI output.
    pub const fn name(self) -> &'static str {
        match self {
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A Rust primitive that can be stored as a payload element.
///
/// Encoding is always little endian, independent of the host.
pub trait Element: Copy + sealed::Sealed {
    /// The runtime tag for this type.
    const TYPE: ElementType;

    /// Writes `self` into `out`, which is exactly `Self::TYPE.size()` bytes.
    fn write_le(self, out: &mut [u8]);

    /// Reads a value from `bytes`, which is exactly `Self::TYPE.size()` bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

mod sealed {
    pub trait Sealed {}
}

macro_rules! impl_element {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Element for $ty {
                const TYPE: ElementType = ElementType::$tag;

                #[inline]
                fn write_le(self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_element! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
}

/// Encodes `values` into `out`, element by element.
///
/// `out` must be exactly `values.len() * T::TYPE.size()` bytes.
pub(crate) fn encode_slice<T: Element>(values: &[T], out: &mut [u8]) {
    for (value, slot) in values.iter().zip(out.chunks_exact_mut(T::TYPE.size())) {
        value.write_le(slot);
    }
}

/// Decodes a little-endian byte run into elements.
pub(crate) fn decode_slice<T: Element>(bytes: &[u8]) -> Vec<T> {
    bytes.chunks_exact(T::TYPE.size()).map(T::read_le).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_match_rust_types() {
        assert_eq!(ElementType::I8.size(), std::mem::size_of::<i8>());
        assert_eq!(ElementType::U16.size(), std::mem::size_of::<u16>());
        assert_eq!(ElementType::F32.size(), std::mem::size_of::<f32>());
        assert_eq!(ElementType::I64.size(), std::mem::size_of::<i64>());
        assert_eq!(<u32 as Element>::TYPE, ElementType::U32);
    }

    #[test]
    fn test_encode_decode_is_little_endian() {
        let mut out = [0u8; 8];
        encode_slice(&[0x0102_i16, -2_i16, 7, 0], &mut out);
        assert_eq!(&out[..4], &[0x02, 0x01, 0xfe, 0xff]);

        let back: Vec<i16> = decode_slice(&out);
        assert_eq!(back, vec![0x0102, -2, 7, 0]);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ElementType::F64).unwrap();
        assert_eq!(json, "\"f64\"");
        let parsed: ElementType = serde_json::from_str("\"u8\"").unwrap();
        assert_eq!(parsed, ElementType::U8);
        assert_eq!(ElementType::I32.to_string(), "i32");
    }
}
