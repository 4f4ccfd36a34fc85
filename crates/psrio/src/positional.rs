//! Fixed-sequence binary records.
//!
//! A record layout is a static list of [`Slot`]s read strictly in order.
//! Array lengths and cube dimensions refer to integer fields decoded earlier
//! in the same record, so the layout alone determines every byte offset.

use crate::endian::ByteOrder;
use crate::error::{Error, Result};
use crate::primitive::{Decoder, Encoder, UNKNOWN};
use crate::record::HeaderRecord;
use crate::value::{Cube, FieldSpec, Value};

/// Size of one array or cube element (`f64`).
const ELEMENT: usize = 8;

/// A dimension of an array or cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dim {
    /// The value of an integer field decoded earlier.
    Field(&'static str),
    Fixed(usize),
}

/// One step of a record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Field(FieldSpec),
    /// A pair of optional coordinate strings. The pair is present only when
    /// the first field contains a `:`; otherwise both read as
    /// [`UNKNOWN`] and no bytes are consumed.
    Coordinates {
        ra: &'static str,
        dec: &'static str,
        width: usize,
    },
    /// A one-dimensional `f64` array.
    Array { name: &'static str, len: Dim },
    /// A row-major three-dimensional `f64` array.
    Cube { name: &'static str, dims: [Dim; 3] },
}

/// An ordered slot list with its byte order.
#[derive(Debug, Clone, Copy)]
pub struct RecordLayout {
    pub slots: &'static [Slot],
    pub order: ByteOrder,
}

fn resolve(record: &HeaderRecord, dim: Dim) -> Result<usize> {
    match dim {
        Dim::Fixed(n) => Ok(n),
        Dim::Field(name) => {
            let n = record.get_i64(name).ok_or(Error::MissingField(name))?;
            usize::try_from(n).map_err(|_| Error::convert(name, &n.to_string(), None))
        }
    }
}

fn element_bytes(count: usize, context: &str) -> Result<usize> {
    count
        .checked_mul(ELEMENT)
        .ok_or_else(|| Error::ShapeMismatch {
            expected: u64::MAX,
            found: 0,
            context: context.to_string(),
        })
}

fn cube_shape(record: &HeaderRecord, name: &str, dims: &[Dim; 3]) -> Result<([usize; 3], usize)> {
    let shape = [
        resolve(record, dims[0])?,
        resolve(record, dims[1])?,
        resolve(record, dims[2])?,
    ];
    let count = shape[0]
        .checked_mul(shape[1])
        .and_then(|n| n.checked_mul(shape[2]))
        .ok_or_else(|| Error::ShapeMismatch {
            expected: u64::MAX,
            found: 0,
            context: name.to_string(),
        })?;
    Ok((shape, count))
}

fn ensure_available(dec: &Decoder<'_>, nbytes: usize, context: &str) -> Result<()> {
    if dec.remaining() < nbytes {
        return Err(Error::ShapeMismatch {
            expected: nbytes as u64,
            found: dec.remaining() as u64,
            context: context.to_string(),
        });
    }
    Ok(())
}

impl RecordLayout {
    /// Decode a record that must occupy all of `data`.
    pub fn decode(&self, data: &[u8]) -> Result<HeaderRecord> {
        let mut dec = Decoder::new(data, self.order);
        let mut record = HeaderRecord::new();

        for slot in self.slots {
            match *slot {
                Slot::Field(spec) => {
                    let value = dec.decode(&spec)?;
                    record.insert(spec.name, value);
                }
                Slot::Coordinates { ra, dec: de, width } => {
                    match dec.read_optional_coordinate(width)? {
                        Some(ra_str) => {
                            record.insert(ra, Value::Str(ra_str));
                            let de_str = dec.read_padded_string(width)?;
                            record.insert(de, Value::Str(de_str));
                        }
                        None => {
                            record.insert(ra, Value::Str(UNKNOWN.into()));
                            record.insert(de, Value::Str(UNKNOWN.into()));
                        }
                    }
                }
                Slot::Array { name, len } => {
                    let count = resolve(&record, len)?;
                    ensure_available(&dec, element_bytes(count, name)?, name)?;
                    record.insert(name, Value::Array(dec.read_f64_array(count)?));
                }
                Slot::Cube { name, ref dims } => {
                    let (shape, count) = cube_shape(&record, name, dims)?;
                    ensure_available(&dec, element_bytes(count, name)?, name)?;
                    let data = dec.read_f64_array(count)?;
                    record.insert(name, Value::Cube(Cube { shape, data }));
                }
            }
        }

        if dec.remaining() != 0 {
            return Err(Error::ShapeMismatch {
                expected: dec.consumed() as u64,
                found: data.len() as u64,
                context: "record length".into(),
            });
        }
        Ok(record)
    }

    /// Encode `record`, which must hold every slot's field with the shape
    /// its dimension fields declare.
    pub fn encode(&self, record: &HeaderRecord) -> Result<Vec<u8>> {
        let mut enc = Encoder::new(self.order);

        for slot in self.slots {
            match *slot {
                Slot::Field(spec) => {
                    let value = record.get(spec.name).ok_or(Error::MissingField(spec.name))?;
                    enc.encode(&spec, value)?;
                }
                Slot::Coordinates { ra, dec, width } => {
                    let ra_str = record.get_str(ra).ok_or(Error::MissingField(ra))?;
                    if ra_str == UNKNOWN {
                        // Both fields are omitted together, so a known Dec
                        // cannot be written without an RA.
                        match record.get_str(dec) {
                            Some(dec_str) if dec_str != UNKNOWN => {
                                return Err(Error::convert(dec, dec_str, None));
                            }
                            _ => {}
                        }
                    } else {
                        // Without a colon the reader would take the field as omitted.
                        if !ra_str.contains(':') {
                            return Err(Error::convert(ra, ra_str, None));
                        }
                        let dec_str = record.get_str(dec).ok_or(Error::MissingField(dec))?;
                        enc.write_optional_coordinate(Some(ra_str), width)?;
                        enc.write_padded_string(dec_str, width)?;
                    }
                }
                Slot::Array { name, len } => {
                    let count = resolve(record, len)?;
                    let vals = match record.get(name) {
                        Some(Value::Array(v)) => v,
                        Some(_) => return Err(Error::convert(name, "non-array value", None)),
                        None => return Err(Error::MissingField(name)),
                    };
                    if vals.len() != count {
                        return Err(Error::ShapeMismatch {
                            expected: (count * ELEMENT) as u64,
                            found: (vals.len() * ELEMENT) as u64,
                            context: name.to_string(),
                        });
                    }
                    enc.write_f64_array(vals);
                }
                Slot::Cube { name, ref dims } => {
                    let (shape, count) = cube_shape(record, name, dims)?;
                    let cube = match record.get(name) {
                        Some(Value::Cube(c)) => c,
                        Some(_) => return Err(Error::convert(name, "non-cube value", None)),
                        None => return Err(Error::MissingField(name)),
                    };
                    if cube.shape != shape || cube.data.len() != count {
                        return Err(Error::ShapeMismatch {
                            expected: (count * ELEMENT) as u64,
                            found: (cube.data.len() * ELEMENT) as u64,
                            context: name.to_string(),
                        });
                    }
                    enc.write_f64_array(&cube.data);
                }
            }
        }
        Ok(enc.into_bytes())
    }
}
