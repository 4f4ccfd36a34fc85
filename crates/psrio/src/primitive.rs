//! Cursor-based decoding and encoding of fixed-width scalars and strings.
//!
//! [`Decoder`] walks an in-memory byte slice and reports the absolute byte
//! offset of every failure. [`Encoder`] appends to a growable buffer. Both
//! are parametrized by a [`ByteOrder`].

use crate::endian::ByteOrder;
use crate::error::{Error, Result};
use crate::value::{FieldSpec, PrimitiveType, Value};

/// Value stored for a PRESTO coordinate field that was omitted from the file.
pub const UNKNOWN: &str = "Unknown";

/// A read cursor over a byte slice.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    base: u64,
    order: ByteOrder,
}

macro_rules! decoder_scalars {
    ($($name:ident -> $ty:ty, $n:expr, $conv:ident;)*) => {
        $(
            #[inline]
            pub fn $name(&mut self) -> Result<$ty> {
                let order = self.order;
                let raw = self.take($n)?;
                Ok(order.$conv(raw))
            }
        )*
    };
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8], order: ByteOrder) -> Self {
        Decoder {
            data,
            pos: 0,
            base: 0,
            order,
        }
    }

    /// A decoder whose reported offsets start at `base` instead of zero.
    ///
    /// Used when `data` is a window into a larger file.
    pub fn with_base(data: &'a [u8], order: ByteOrder, base: u64) -> Self {
        Decoder {
            data,
            pos: 0,
            base,
            order,
        }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Absolute byte offset of the cursor.
    pub fn position(&self) -> u64 {
        self.base + self.pos as u64
    }

    /// Bytes consumed from the start of this decoder's slice.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// The unread tail of the slice.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Take the next `n` bytes, failing with the current offset if fewer remain.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::truncated(self.position(), n, self.remaining()));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Move the cursor back by `n` bytes.
    pub fn rewind(&mut self, n: usize) {
        self.pos = self.pos.saturating_sub(n);
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    decoder_scalars! {
        read_i16 -> i16, 2, read_i16;
        read_u16 -> u16, 2, read_u16;
        read_i32 -> i32, 4, read_i32;
        read_u32 -> u32, 4, read_u32;
        read_i64 -> i64, 8, read_i64;
        read_u64 -> u64, 8, read_u64;
        read_f32 -> f32, 4, read_f32;
        read_f64 -> f64, 8, read_f64;
    }

    /// Read a 4-byte length prefix and exactly that many UTF-8 bytes.
    pub fn read_pascal_string(&mut self) -> Result<String> {
        let start = self.position();
        let len = self.read_u32()? as usize;
        let raw = self.take(len)?;
        utf8(raw, start + 4)
    }

    /// Read a fixed-width field and return the bytes before the first NUL.
    ///
    /// A field with no NUL terminator reads as [`UNKNOWN`].
    pub fn read_padded_string(&mut self, width: usize) -> Result<String> {
        let start = self.position();
        let raw = self.take(width)?;
        match raw.iter().position(|&b| b == 0) {
            Some(end) => utf8(&raw[..end], start),
            None => Ok(UNKNOWN.to_string()),
        }
    }

    /// Read a PRESTO coordinate field.
    ///
    /// The field exists only if its `width` bytes contain a `:`. Otherwise
    /// the cursor is rewound and `None` is returned, meaning the writer
    /// omitted the field.
    pub fn read_optional_coordinate(&mut self, width: usize) -> Result<Option<String>> {
        let start = self.pos;
        let raw = self.take(width)?;
        if !raw.contains(&b':') {
            self.pos = start;
            return Ok(None);
        }
        self.pos = start;
        self.read_padded_string(width).map(Some)
    }

    /// Decode one field according to its spec.
    ///
    /// `Pad` consumes its byte and yields [`Value::Null`].
    pub fn decode(&mut self, spec: &FieldSpec) -> Result<Value> {
        Ok(match spec.ty {
            PrimitiveType::Pad => {
                self.skip(1)?;
                Value::Null
            }
            PrimitiveType::Bool => Value::Bool(self.read_u8()? != 0),
            PrimitiveType::Char => Value::Char(self.read_u8()?),
            PrimitiveType::Int8 => Value::Int8(self.read_i8()?),
            PrimitiveType::UInt8 => Value::UInt8(self.read_u8()?),
            PrimitiveType::Int16 => Value::Int16(self.read_i16()?),
            PrimitiveType::UInt16 => Value::UInt16(self.read_u16()?),
            PrimitiveType::Int32 => Value::Int32(self.read_i32()?),
            PrimitiveType::UInt32 => Value::UInt32(self.read_u32()?),
            PrimitiveType::Int64 => Value::Int64(self.read_i64()?),
            PrimitiveType::UInt64 => Value::UInt64(self.read_u64()?),
            PrimitiveType::Float32 => Value::Float32(self.read_f32()?),
            PrimitiveType::Float64 => Value::Float64(self.read_f64()?),
            PrimitiveType::PascalString => Value::Str(self.read_pascal_string()?),
            PrimitiveType::PaddedString(w) => Value::Str(self.read_padded_string(w)?),
        })
    }

    /// Read `count` little/big-endian `f64` values.
    pub fn read_f64_array(&mut self, count: usize) -> Result<Vec<f64>> {
        let order = self.order;
        let nbytes = count
            .checked_mul(8)
            .ok_or_else(|| Error::truncated(self.position(), usize::MAX, self.remaining()))?;
        let raw = self.take(nbytes)?;
        Ok(order.collect_f64(raw))
    }
}

fn utf8(raw: &[u8], offset: u64) -> Result<String> {
    core::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|e| Error::Decode {
            offset: offset + e.valid_up_to() as u64,
            reason: "invalid UTF-8 in string field".into(),
        })
}

/// An append-only writer.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    buf: Vec<u8>,
    order: ByteOrder,
}

macro_rules! encoder_scalars {
    ($($name:ident($ty:ty) => $conv:ident;)*) => {
        $(
            #[inline]
            pub fn $name(&mut self, val: $ty) {
                let bytes = self.order.$conv(val);
                self.buf.extend_from_slice(&bytes);
            }
        )*
    };
}

impl Encoder {
    pub fn new(order: ByteOrder) -> Self {
        Encoder {
            buf: Vec::new(),
            order,
        }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, val: u8) {
        self.buf.push(val);
    }

    pub fn write_i8(&mut self, val: i8) {
        self.buf.push(val as u8);
    }

    encoder_scalars! {
        write_i16(i16) => i16_bytes;
        write_u16(u16) => u16_bytes;
        write_i32(i32) => i32_bytes;
        write_u32(u32) => u32_bytes;
        write_i64(i64) => i64_bytes;
        write_u64(u64) => u64_bytes;
        write_f32(f32) => f32_bytes;
        write_f64(f64) => f64_bytes;
    }

    pub fn write_f64_array(&mut self, vals: &[f64]) {
        self.order.extend_f64(&mut self.buf, vals);
    }

    /// Write a 4-byte UTF-8 byte length followed by the bytes.
    pub fn write_pascal_string(&mut self, s: &str) -> Result<()> {
        let len = u32::try_from(s.len()).map_err(|_| Error::convert("string", s, None))?;
        self.write_u32(len);
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    /// Write `s` right-padded with NUL to exactly `width` bytes. At least one
    /// NUL must fit, so `s` is limited to `width - 1` bytes.
    pub fn write_padded_string(&mut self, s: &str, width: usize) -> Result<()> {
        if s.len() >= width {
            return Err(Error::convert(&format!("{width}-byte string"), s, None));
        }
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.resize(self.buf.len() + width - s.len(), 0);
        Ok(())
    }

    /// Write a PRESTO coordinate field. An omitted or [`UNKNOWN`] value
    /// writes nothing, which the reader's rewind rule turns back into an
    /// omission.
    pub fn write_optional_coordinate(&mut self, s: Option<&str>, width: usize) -> Result<()> {
        match s {
            None => Ok(()),
            Some(v) if v == UNKNOWN => Ok(()),
            Some(v) => self.write_padded_string(v, width),
        }
    }

    /// Encode `value` as the type declared by `spec`, returning the number
    /// of bytes written.
    ///
    /// Integers are accepted by float fields and integral floats by integer
    /// fields when the conversion is exact; any other mismatch names the
    /// field in a [`Error::TypeConversion`].
    pub fn encode(&mut self, spec: &FieldSpec, value: &Value) -> Result<usize> {
        let before = self.buf.len();
        let mismatch = || Error::convert(spec.name, &value.to_string(), None);
        match spec.ty {
            PrimitiveType::Pad => self.write_u8(0),
            PrimitiveType::Bool => match value {
                Value::Bool(b) => self.write_u8(*b as u8),
                other => match integral(other) {
                    Some(0) => self.write_u8(0),
                    Some(1) => self.write_u8(1),
                    _ => return Err(mismatch()),
                },
            },
            PrimitiveType::Char => self.write_u8(fit::<u8>(value).ok_or_else(mismatch)?),
            PrimitiveType::Int8 => self.write_i8(fit::<i8>(value).ok_or_else(mismatch)?),
            PrimitiveType::UInt8 => self.write_u8(fit::<u8>(value).ok_or_else(mismatch)?),
            PrimitiveType::Int16 => self.write_i16(fit::<i16>(value).ok_or_else(mismatch)?),
            PrimitiveType::UInt16 => self.write_u16(fit::<u16>(value).ok_or_else(mismatch)?),
            PrimitiveType::Int32 => self.write_i32(fit::<i32>(value).ok_or_else(mismatch)?),
            PrimitiveType::UInt32 => self.write_u32(fit::<u32>(value).ok_or_else(mismatch)?),
            PrimitiveType::Int64 => self.write_i64(fit::<i64>(value).ok_or_else(mismatch)?),
            PrimitiveType::UInt64 => self.write_u64(match value {
                Value::UInt64(v) => *v,
                other => fit::<u64>(other).ok_or_else(mismatch)?,
            }),
            PrimitiveType::Float32 => self.write_f32(match value {
                Value::Float32(v) => *v,
                Value::Float64(v) if (*v as f32) as f64 == *v || v.is_nan() => *v as f32,
                other => other
                    .as_i64()
                    .filter(|_| !matches!(other, Value::Bool(_)))
                    .map(|i| i as f32)
                    .ok_or_else(mismatch)?,
            }),
            PrimitiveType::Float64 => self.write_f64(match value {
                Value::Float64(v) => *v,
                Value::Float32(v) => *v as f64,
                Value::UInt64(v) => *v as f64,
                other => other
                    .as_i64()
                    .filter(|_| !matches!(other, Value::Bool(_)))
                    .map(|i| i as f64)
                    .ok_or_else(mismatch)?,
            }),
            PrimitiveType::PascalString => match value {
                Value::Str(s) => self.write_pascal_string(s)?,
                _ => return Err(mismatch()),
            },
            PrimitiveType::PaddedString(w) => match value {
                Value::Str(s) => self
                    .write_padded_string(s, w)
                    .map_err(|_| Error::convert(spec.name, s, None))?,
                _ => return Err(mismatch()),
            },
        }
        Ok(self.buf.len() - before)
    }
}

/// The value as an exact integer: integer variants directly, floats only
/// when they have no fractional part.
fn integral(value: &Value) -> Option<i128> {
    match *value {
        Value::Bool(_) => None,
        Value::UInt64(v) => Some(v as i128),
        Value::Float32(v) => float_integral(v as f64),
        Value::Float64(v) => float_integral(v),
        _ => value.as_i64().map(i128::from),
    }
}

fn float_integral(v: f64) -> Option<i128> {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1.7e38 {
        Some(v as i128)
    } else {
        None
    }
}

fn fit<T: TryFrom<i128>>(value: &Value) -> Option<T> {
    integral(value).and_then(|v| T::try_from(v).ok())
}
