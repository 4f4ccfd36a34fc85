//! Field descriptors and the tagged value type shared by every codec.

use core::fmt;

/// The on-disk representation of a single header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// One ignored byte.
    Pad,
    Bool,
    Char,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    /// A 4-byte unsigned length prefix followed by that many UTF-8 bytes.
    PascalString,
    /// A fixed-width field holding UTF-8 bytes right-padded with NUL.
    PaddedString(usize),
}

impl PrimitiveType {
    /// The `struct`-module style format character for this type.
    pub const fn code(self) -> char {
        match self {
            PrimitiveType::Pad => 'x',
            PrimitiveType::Bool => '?',
            PrimitiveType::Char => 'c',
            PrimitiveType::Int8 => 'b',
            PrimitiveType::UInt8 => 'B',
            PrimitiveType::Int16 => 'h',
            PrimitiveType::UInt16 => 'H',
            PrimitiveType::Int32 => 'i',
            PrimitiveType::UInt32 => 'I',
            PrimitiveType::Int64 => 'q',
            PrimitiveType::UInt64 => 'Q',
            PrimitiveType::Float32 => 'f',
            PrimitiveType::Float64 => 'd',
            PrimitiveType::PascalString => 'p',
            PrimitiveType::PaddedString(_) => 's',
        }
    }

    /// The fixed byte width of the field.
    ///
    /// For length-prefixed strings this is the width of the prefix only.
    pub const fn width(self) -> usize {
        match self {
            PrimitiveType::Pad
            | PrimitiveType::Bool
            | PrimitiveType::Char
            | PrimitiveType::Int8
            | PrimitiveType::UInt8 => 1,
            PrimitiveType::Int16 | PrimitiveType::UInt16 => 2,
            PrimitiveType::Int32
            | PrimitiveType::UInt32
            | PrimitiveType::Float32
            | PrimitiveType::PascalString => 4,
            PrimitiveType::Int64 | PrimitiveType::UInt64 | PrimitiveType::Float64 => 8,
            PrimitiveType::PaddedString(n) => n,
        }
    }

    /// Returns `true` for the integer types (including `Char` and `Bool`).
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            PrimitiveType::Bool
                | PrimitiveType::Char
                | PrimitiveType::Int8
                | PrimitiveType::UInt8
                | PrimitiveType::Int16
                | PrimitiveType::UInt16
                | PrimitiveType::Int32
                | PrimitiveType::UInt32
                | PrimitiveType::Int64
                | PrimitiveType::UInt64
        )
    }
}

/// A named field and its on-disk type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: PrimitiveType,
}

impl FieldSpec {
    pub const fn new(name: &'static str, ty: PrimitiveType) -> Self {
        FieldSpec { name, ty }
    }
}

/// A row-major three-dimensional `f64` array.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cube {
    pub shape: [usize; 3],
    pub data: Vec<f64>,
}

impl Cube {
    /// Create a zero-filled cube.
    pub fn zeros(shape: [usize; 3]) -> Self {
        Cube {
            shape,
            data: vec![0.0; shape[0] * shape[1] * shape[2]],
        }
    }

    /// Total number of elements implied by the shape.
    pub fn len(&self) -> usize {
        self.shape[0] * self.shape[1] * self.shape[2]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The element at `[i][j][k]`.
    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.data[self.offset(i, j, k)]
    }

    /// Mutable access to the element at `[i][j][k]`.
    pub fn get_mut(&mut self, i: usize, j: usize, k: usize) -> &mut f64 {
        let idx = self.offset(i, j, k);
        &mut self.data[idx]
    }

    /// The innermost row `[i][j][..]`.
    pub fn row(&self, i: usize, j: usize) -> &[f64] {
        let start = self.offset(i, j, 0);
        &self.data[start..start + self.shape[2]]
    }

    fn offset(&self, i: usize, j: usize, k: usize) -> usize {
        assert!(
            i < self.shape[0] && j < self.shape[1] && k < self.shape[2],
            "cube index out of bounds"
        );
        (i * self.shape[1] + j) * self.shape[2] + k
    }
}

/// A decoded header value. Every variant knows its own on-disk type, so
/// writers never have to guess from the runtime shape of the data.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Char(u8),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Str(String),
    /// A quantity and its uncertainty (`value +/- error`).
    Measured(f64, f64),
    /// An explicitly absent value (`N/A` in text headers).
    Null,
    Array(Vec<f64>),
    Cube(Cube),
}

impl Value {
    /// The primitive type this value encodes as, if it is a scalar.
    pub fn primitive(&self) -> Option<PrimitiveType> {
        Some(match self {
            Value::Bool(_) => PrimitiveType::Bool,
            Value::Char(_) => PrimitiveType::Char,
            Value::Int8(_) => PrimitiveType::Int8,
            Value::UInt8(_) => PrimitiveType::UInt8,
            Value::Int16(_) => PrimitiveType::Int16,
            Value::UInt16(_) => PrimitiveType::UInt16,
            Value::Int32(_) => PrimitiveType::Int32,
            Value::UInt32(_) => PrimitiveType::UInt32,
            Value::Int64(_) => PrimitiveType::Int64,
            Value::UInt64(_) => PrimitiveType::UInt64,
            Value::Float32(_) => PrimitiveType::Float32,
            Value::Float64(_) => PrimitiveType::Float64,
            Value::Str(_) => PrimitiveType::PascalString,
            _ => return None,
        })
    }

    /// The value as an `i64`, for any integer variant.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Bool(b) => Some(b as i64),
            Value::Char(c) => Some(c as i64),
            Value::Int8(v) => Some(v as i64),
            Value::UInt8(v) => Some(v as i64),
            Value::Int16(v) => Some(v as i64),
            Value::UInt16(v) => Some(v as i64),
            Value::Int32(v) => Some(v as i64),
            Value::UInt32(v) => Some(v as i64),
            Value::Int64(v) => Some(v),
            Value::UInt64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// The value as an `f64`, for any numeric scalar. A measured value
    /// yields its quantity.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float32(v) => Some(v as f64),
            Value::Float64(v) => Some(v),
            Value::Measured(v, _) => Some(v),
            Value::UInt64(v) => Some(v as f64),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    /// Text form used by the text codecs. Floats always carry a decimal
    /// point or exponent so they re-parse as floats.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", if *b { 1 } else { 0 }),
            Value::Char(c) => write!(f, "{}", *c as char),
            Value::Float32(v) => f.write_str(&format_float(*v as f64)),
            Value::Float64(v) => f.write_str(&format_float(*v)),
            Value::Str(s) => f.write_str(s),
            Value::Measured(v, e) => write!(f, "{} +/- {}", format_float(*v), format_float(*e)),
            Value::Null => f.write_str("N/A"),
            Value::Array(vals) => {
                let parts: Vec<String> = vals.iter().map(|v| format_float(*v)).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Cube(c) => write!(f, "<cube {}x{}x{}>", c.shape[0], c.shape[1], c.shape[2]),
            other => match other.as_i64() {
                Some(n) => write!(f, "{n}"),
                None => write!(f, "{other:?}"),
            },
        }
    }
}

/// Parse a float, accepting Fortran `D` exponents (`1.5D-03`).
pub fn parse_float(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.contains(['D', 'd']) {
        s.replace(['D', 'd'], "e").parse().ok()
    } else {
        s.parse().ok()
    }
}

/// Format a float using the shortest representation that re-parses to the
/// same value, guaranteeing a `.` or exponent so it never reads back as an
/// integer.
pub fn format_float(v: f64) -> String {
    if !v.is_finite() {
        return format!("{v}");
    }
    let magnitude = v.abs();
    let s = if magnitude != 0.0 && !(1e-5..1e16).contains(&magnitude) {
        format!("{v:e}")
    } else {
        format!("{v}")
    };
    if s.contains(['.', 'e', 'E']) {
        return s;
    }
    format!("{s}.0")
}
