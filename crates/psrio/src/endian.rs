//! Byte-order aware conversion for pulsar binary data.
//!
//! SIGPROC and PRESTO write their binary headers and payloads in the byte
//! order of the machine that produced them, which in practice is always
//! little-endian. The codecs nevertheless take a [`ByteOrder`] so that a
//! big-endian file decodes through the same code path.
//!
//! Single values are converted with the `read_*`/`*_bytes` methods; whole
//! arrays go through the `collect_*`/`extend_*` helpers, which cast the raw
//! bytes with `bytemuck` and then fix up each element.

use bytemuck::pod_collect_to_vec;

/// The byte order of multi-byte values in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Least-significant byte first (the default for every supported format).
    #[default]
    Little,
    /// Most-significant byte first.
    Big,
}

macro_rules! scalar_conversions {
    ($($read:ident, $bytes:ident, $ty:ty, $n:expr;)*) => {
        impl ByteOrder {
            $(
                #[doc = concat!("Read a `", stringify!($ty), "` from the first ", stringify!($n), " bytes of `buf`.")]
                ///
                /// # Panics
                /// Panics if `buf` is too short.
                #[inline]
                pub fn $read(self, buf: &[u8]) -> $ty {
                    let mut raw = [0u8; $n];
                    raw.copy_from_slice(&buf[..$n]);
                    match self {
                        ByteOrder::Little => <$ty>::from_le_bytes(raw),
                        ByteOrder::Big => <$ty>::from_be_bytes(raw),
                    }
                }

                #[doc = concat!("Serialize a `", stringify!($ty), "` in this byte order.")]
                #[inline]
                pub fn $bytes(self, val: $ty) -> [u8; $n] {
                    match self {
                        ByteOrder::Little => val.to_le_bytes(),
                        ByteOrder::Big => val.to_be_bytes(),
                    }
                }
            )*
        }
    };
}

scalar_conversions! {
    read_i16, i16_bytes, i16, 2;
    read_u16, u16_bytes, u16, 2;
    read_i32, i32_bytes, i32, 4;
    read_u32, u32_bytes, u32, 4;
    read_i64, i64_bytes, i64, 8;
    read_u64, u64_bytes, u64, 8;
    read_f32, f32_bytes, f32, 4;
    read_f64, f64_bytes, f64, 8;
}

// --- Bulk conversions ---
//
// The raw slice length must be a multiple of the element size; callers check
// the shape before converting.

impl ByteOrder {
    /// Convert a buffer of `u16` values in this byte order to native values.
    pub fn collect_u16(self, raw: &[u8]) -> Vec<u16> {
        let mut vals: Vec<u16> = pod_collect_to_vec(raw);
        for v in &mut vals {
            *v = match self {
                ByteOrder::Little => u16::from_le(*v),
                ByteOrder::Big => u16::from_be(*v),
            };
        }
        vals
    }

    /// Convert a buffer of `f32` values in this byte order to native values.
    ///
    /// The conversion only reorders bytes, so every bit pattern (including
    /// NaN payloads) survives unchanged.
    pub fn collect_f32(self, raw: &[u8]) -> Vec<f32> {
        let mut vals: Vec<f32> = pod_collect_to_vec(raw);
        for v in &mut vals {
            let bits = v.to_bits();
            *v = f32::from_bits(match self {
                ByteOrder::Little => u32::from_le(bits),
                ByteOrder::Big => u32::from_be(bits),
            });
        }
        vals
    }

    /// Convert a buffer of `f64` values in this byte order to native values.
    pub fn collect_f64(self, raw: &[u8]) -> Vec<f64> {
        let mut vals: Vec<f64> = pod_collect_to_vec(raw);
        for v in &mut vals {
            let bits = v.to_bits();
            *v = f64::from_bits(match self {
                ByteOrder::Little => u64::from_le(bits),
                ByteOrder::Big => u64::from_be(bits),
            });
        }
        vals
    }

    /// Append `u16` values to `out` in this byte order.
    pub fn extend_u16(self, out: &mut Vec<u8>, vals: &[u16]) {
        out.reserve(vals.len() * 2);
        for &v in vals {
            out.extend_from_slice(&self.u16_bytes(v));
        }
    }

    /// Append `f32` values to `out` in this byte order.
    pub fn extend_f32(self, out: &mut Vec<u8>, vals: &[f32]) {
        out.reserve(vals.len() * 4);
        for &v in vals {
            out.extend_from_slice(&self.f32_bytes(v));
        }
    }

    /// Append `f64` values to `out` in this byte order.
    pub fn extend_f64(self, out: &mut Vec<u8>, vals: &[f64]) {
        out.reserve(vals.len() * 8);
        for &v in vals {
            out.extend_from_slice(&self.f64_bytes(v));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_u32_both_orders() {
        let buf = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(ByteOrder::Little.read_u32(&buf), 0x0403_0201);
        assert_eq!(ByteOrder::Big.read_u32(&buf), 0x0102_0304);
    }

    #[test]
    fn i32_bytes_little() {
        assert_eq!(ByteOrder::Little.i32_bytes(-2), [0xFE, 0xFF, 0xFF, 0xFF]);
        assert_eq!(ByteOrder::Big.i32_bytes(-2), [0xFF, 0xFF, 0xFF, 0xFE]);
    }

    #[test]
    fn f64_scalar_roundtrip() {
        for order in [ByteOrder::Little, ByteOrder::Big] {
            let bytes = order.f64_bytes(-1234.5678e-9);
            assert_eq!(order.read_f64(&bytes), -1234.5678e-9);
        }
    }

    #[test]
    fn read_ignores_trailing_bytes() {
        let buf = [0x34, 0x12, 0xFF, 0xFF];
        assert_eq!(ByteOrder::Little.read_u16(&buf), 0x1234);
    }

    #[test]
    #[should_panic]
    fn read_short_buffer_panics() {
        let buf = [0u8; 3];
        let _ = ByteOrder::Little.read_f32(&buf);
    }

    #[test]
    fn collect_f32_preserves_bits() {
        let vals = [1.5f32, -0.0, f32::from_bits(0x7FC0_1234), f32::MIN_POSITIVE];
        let mut raw = Vec::new();
        ByteOrder::Little.extend_f32(&mut raw, &vals);
        let back = ByteOrder::Little.collect_f32(&raw);
        let bits: Vec<u32> = back.iter().map(|v| v.to_bits()).collect();
        let want: Vec<u32> = vals.iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits, want);
    }

    #[test]
    fn collect_f64_big_endian() {
        let mut raw = Vec::new();
        ByteOrder::Big.extend_f64(&mut raw, &[2.0, -3.25]);
        assert_eq!(&raw[..8], &2.0f64.to_be_bytes());
        assert_eq!(ByteOrder::Big.collect_f64(&raw), vec![2.0, -3.25]);
    }

    #[test]
    fn collect_u16_little() {
        let raw = [0x01, 0x00, 0xFF, 0xFF];
        assert_eq!(ByteOrder::Little.collect_u16(&raw), vec![1, 65535]);
        let mut out = Vec::new();
        ByteOrder::Little.extend_u16(&mut out, &[1, 65535]);
        assert_eq!(out, raw);
    }

    #[test]
    fn default_is_little() {
        assert_eq!(ByteOrder::default(), ByteOrder::Little);
    }
}
