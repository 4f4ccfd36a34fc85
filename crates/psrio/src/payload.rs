//! Bulk homogeneous sample payloads.
//!
//! The on-disk element type is chosen from the header's bit width and every
//! sample is widened to `f32` on read. Writes narrow back to the on-disk
//! type.

use crate::endian::ByteOrder;
use crate::error::{Error, Result};

/// On-disk element type of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    UInt8,
    UInt16,
    Float32,
}

impl Dtype {
    /// `1, 2, 4, 8 → UInt8`, `16 → UInt16`, `32 → Float32`; no bit width
    /// means `Float32`.
    pub fn for_nbits(nbits: Option<u32>) -> Result<Self> {
        match nbits {
            None | Some(32) => Ok(Dtype::Float32),
            Some(1 | 2 | 4 | 8) => Ok(Dtype::UInt8),
            Some(16) => Ok(Dtype::UInt16),
            Some(other) => Err(Error::UnsupportedBits(other)),
        }
    }

    /// Bytes per stored element.
    pub const fn width(self) -> usize {
        match self {
            Dtype::UInt8 => 1,
            Dtype::UInt16 => 2,
            Dtype::Float32 => 4,
        }
    }
}

/// How 1, 2 and 4-bit samples are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubByteMode {
    /// Several samples per byte, least-significant sample first.
    #[default]
    Unpack,
    /// One sample per byte, read as a whole `u8`.
    Raw,
}

/// Options for payload decoding and encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadOptions {
    pub order: ByteOrder,
    pub sub_byte: SubByteMode,
}

/// A decoded payload widened to `f32`.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub dtype: Dtype,
    pub data: Vec<f32>,
}

fn packed_bits(nbits: Option<u32>, options: &PayloadOptions) -> Option<u32> {
    match (nbits, options.sub_byte) {
        (Some(n @ (1 | 2 | 4)), SubByteMode::Unpack) => Some(n),
        _ => None,
    }
}

/// Number of samples stored in `nbytes` bytes.
pub fn sample_count(nbytes: usize, nbits: Option<u32>, options: &PayloadOptions) -> Result<usize> {
    let dtype = Dtype::for_nbits(nbits)?;
    if let Some(bits) = packed_bits(nbits, options) {
        return Ok(nbytes * (8 / bits as usize));
    }
    Ok(nbytes / dtype.width())
}

/// Bytes occupied by `samples` samples.
pub fn byte_count(samples: usize, nbits: Option<u32>, options: &PayloadOptions) -> Result<usize> {
    let dtype = Dtype::for_nbits(nbits)?;
    if let Some(bits) = packed_bits(nbits, options) {
        return Ok(samples * bits as usize / 8);
    }
    Ok(samples * dtype.width())
}

/// Decode a payload, which must hold a whole number of elements.
pub fn decode_payload(bytes: &[u8], nbits: Option<u32>, options: &PayloadOptions) -> Result<Payload> {
    let dtype = Dtype::for_nbits(nbits)?;
    let width = dtype.width();
    if bytes.len() % width != 0 {
        return Err(Error::ShapeMismatch {
            expected: (bytes.len() - bytes.len() % width) as u64,
            found: bytes.len() as u64,
            context: "payload".into(),
        });
    }

    let data = match dtype {
        Dtype::UInt8 => match packed_bits(nbits, options) {
            Some(bits) => unpack(bytes, bits),
            None => bytes.iter().map(|&b| b as f32).collect(),
        },
        Dtype::UInt16 => options
            .order
            .collect_u16(bytes)
            .into_iter()
            .map(f32::from)
            .collect(),
        Dtype::Float32 => options.order.collect_f32(bytes),
    };
    Ok(Payload { dtype, data })
}

/// Encode samples, narrowing with saturation to the on-disk type.
pub fn encode_payload(samples: &[f32], nbits: Option<u32>, options: &PayloadOptions) -> Result<Vec<u8>> {
    let dtype = Dtype::for_nbits(nbits)?;
    let mut out = Vec::with_capacity(byte_count(samples.len(), nbits, options)?);
    match dtype {
        Dtype::UInt8 => match packed_bits(nbits, options) {
            Some(bits) => {
                let per_byte = 8 / bits as usize;
                if samples.len() % per_byte != 0 {
                    return Err(Error::ShapeMismatch {
                        expected: (samples.len().div_ceil(per_byte) * per_byte) as u64,
                        found: samples.len() as u64,
                        context: format!("{bits}-bit samples"),
                    });
                }
                pack(samples, bits, &mut out);
            }
            None => out.extend(samples.iter().map(|&v| v as u8)),
        },
        Dtype::UInt16 => {
            let vals: Vec<u16> = samples.iter().map(|&v| v as u16).collect();
            options.order.extend_u16(&mut out, &vals);
        }
        Dtype::Float32 => options.order.extend_f32(&mut out, samples),
    }
    Ok(out)
}

fn unpack(bytes: &[u8], bits: u32) -> Vec<f32> {
    let per_byte = 8 / bits;
    let mask = (1u8 << bits) - 1;
    let mut out = Vec::with_capacity(bytes.len() * per_byte as usize);
    for &b in bytes {
        for k in 0..per_byte {
            out.push(((b >> (k * bits)) & mask) as f32);
        }
    }
    out
}

fn pack(samples: &[f32], bits: u32, out: &mut Vec<u8>) {
    let mask = (1u8 << bits) - 1;
    for chunk in samples.chunks(8 / bits as usize) {
        let mut byte = 0u8;
        for (k, &v) in chunk.iter().enumerate() {
            byte |= (v as u8).min(mask) << (k as u32 * bits);
        }
        out.push(byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some(1), Dtype::UInt8)]
    #[case(Some(2), Dtype::UInt8)]
    #[case(Some(4), Dtype::UInt8)]
    #[case(Some(8), Dtype::UInt8)]
    #[case(Some(16), Dtype::UInt16)]
    #[case(Some(32), Dtype::Float32)]
    #[case(None, Dtype::Float32)]
    fn dtype_table(#[case] nbits: Option<u32>, #[case] want: Dtype) {
        assert_eq!(Dtype::for_nbits(nbits).unwrap(), want);
    }

    #[test]
    fn unsupported_bits() {
        assert!(matches!(Dtype::for_nbits(Some(12)), Err(Error::UnsupportedBits(12))));
    }

    #[test]
    fn eight_bit_widens() {
        let p = decode_payload(&[0, 1, 255], Some(8), &PayloadOptions::default()).unwrap();
        assert_eq!(p.dtype, Dtype::UInt8);
        assert_eq!(p.data, vec![0.0, 1.0, 255.0]);
    }

    #[test]
    fn float_payload_is_bit_identical() {
        let vals = [0.1f32, -7.5e-30, f32::MAX, f32::from_bits(0x7FC0_0001)];
        let opts = PayloadOptions::default();
        let bytes = encode_payload(&vals, Some(32), &opts).unwrap();
        let back = decode_payload(&bytes, Some(32), &opts).unwrap();
        let a: Vec<u32> = vals.iter().map(|v| v.to_bits()).collect();
        let b: Vec<u32> = back.data.iter().map(|v| v.to_bits()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn sixteen_bit_roundtrip() {
        let opts = PayloadOptions::default();
        let bytes = encode_payload(&[1.0, 65535.0, 70000.0], Some(16), &opts).unwrap();
        assert_eq!(bytes, [1, 0, 255, 255, 255, 255]);
        let back = decode_payload(&bytes, Some(16), &opts).unwrap();
        assert_eq!(back.data, vec![1.0, 65535.0, 65535.0]);
    }

    #[test]
    fn ragged_payload_is_shape_mismatch() {
        let err = decode_payload(&[0; 7], Some(32), &PayloadOptions::default()).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { expected: 4, found: 7, .. }));
    }

    #[test]
    fn two_bit_unpacks_lsb_first() {
        // 0b11_10_01_00 holds samples 0, 1, 2, 3 from the low bits up.
        let p = decode_payload(&[0b1110_0100], Some(2), &PayloadOptions::default()).unwrap();
        assert_eq!(p.data, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn sub_byte_pack_roundtrip() {
        let opts = PayloadOptions::default();
        let samples = [1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let bytes = encode_payload(&samples, Some(1), &opts).unwrap();
        assert_eq!(bytes, [0b1000_1101]);
        assert_eq!(decode_payload(&bytes, Some(1), &opts).unwrap().data, samples);

        let bytes = encode_payload(&[3.0, 20.0], Some(4), &opts).unwrap();
        assert_eq!(bytes, [0xF3]);
    }

    #[test]
    fn sub_byte_count_must_fill_bytes() {
        let err = encode_payload(&[1.0, 2.0, 3.0], Some(2), &PayloadOptions::default()).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn raw_mode_reads_whole_bytes() {
        let opts = PayloadOptions {
            sub_byte: SubByteMode::Raw,
            ..Default::default()
        };
        let p = decode_payload(&[0b1110_0100], Some(2), &opts).unwrap();
        assert_eq!(p.data, vec![228.0]);
        assert_eq!(sample_count(10, Some(2), &opts).unwrap(), 10);
        assert_eq!(sample_count(10, Some(2), &PayloadOptions::default()).unwrap(), 40);
    }
}
