//! Sentinel-framed key/value binary headers.
//!
//! A keyed header is a sequence of length-prefixed strings: a start
//! sentinel, then `key value` pairs whose value type is looked up in a
//! static table, then an end sentinel. SIGPROC files use this framing with
//! `HEADER_START` and `HEADER_END`.

use log::debug;

use crate::endian::ByteOrder;
use crate::error::{Error, Result};
use crate::primitive::{Decoder, Encoder};
use crate::record::HeaderRecord;
use crate::value::{FieldSpec, PrimitiveType};

/// A static key → type table.
pub type KeyTypeTable = &'static [FieldSpec];

use PrimitiveType::{Float64 as D, Int32 as I, Int8 as B, PascalString as S};

/// Every key a SIGPROC header may carry.
pub static SIGPROC_KEYS: KeyTypeTable = &[
    FieldSpec::new("filename", S),
    FieldSpec::new("telescope_id", I),
    FieldSpec::new("telescope", S),
    FieldSpec::new("machine_id", I),
    FieldSpec::new("data_type", I),
    FieldSpec::new("rawdatafile", S),
    FieldSpec::new("source_name", S),
    FieldSpec::new("barycentric", I),
    FieldSpec::new("pulsarcentric", I),
    FieldSpec::new("az_start", D),
    FieldSpec::new("za_start", D),
    FieldSpec::new("src_raj", D),
    FieldSpec::new("src_dej", D),
    FieldSpec::new("tstart", D),
    FieldSpec::new("tsamp", D),
    FieldSpec::new("nbits", I),
    FieldSpec::new("nsamples", I),
    FieldSpec::new("fch1", D),
    FieldSpec::new("foff", D),
    FieldSpec::new("fchannel", D),
    FieldSpec::new("nchans", I),
    FieldSpec::new("nifs", I),
    FieldSpec::new("refdm", D),
    FieldSpec::new("flux", D),
    FieldSpec::new("period", D),
    FieldSpec::new("nbeams", I),
    FieldSpec::new("ibeam", I),
    FieldSpec::new("hdrlen", I),
    FieldSpec::new("pb", D),
    FieldSpec::new("ecc", D),
    FieldSpec::new("asini", D),
    FieldSpec::new("orig_hdrlen", I),
    FieldSpec::new("new_hdrlen", I),
    FieldSpec::new("sampsize", I),
    FieldSpec::new("bandwidth", D),
    FieldSpec::new("fbottom", D),
    FieldSpec::new("ftop", D),
    FieldSpec::new("obs_date", S),
    FieldSpec::new("obs_time", S),
    FieldSpec::new("signed", B),
    FieldSpec::new("accel", D),
];

/// Look up `key` in `table`.
pub fn lookup(table: KeyTypeTable, key: &str) -> Option<&'static FieldSpec> {
    table.iter().find(|f| f.name == key)
}

/// A decoded header and the number of bytes it occupied, sentinels included.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedHeader {
    pub record: HeaderRecord,
    pub size: usize,
}

/// `found` value of the framing error raised when data ends before the end
/// sentinel.
pub(crate) const END_OF_DATA: &str = "end of data";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitStart,
    ReadingEntries,
    Done,
}

/// A keyed-header codec configured with its table, sentinels and byte order.
#[derive(Debug, Clone, Copy)]
pub struct KeyedCodec {
    pub table: KeyTypeTable,
    pub start: &'static str,
    pub end: &'static str,
    pub order: ByteOrder,
}

impl KeyedCodec {
    /// The SIGPROC header codec.
    pub const fn sigproc() -> Self {
        KeyedCodec {
            table: SIGPROC_KEYS,
            start: "HEADER_START",
            end: "HEADER_END",
            order: ByteOrder::Little,
        }
    }

    /// Decode a header from the start of `data`.
    pub fn decode(&self, data: &[u8]) -> Result<KeyedHeader> {
        let mut dec = Decoder::new(data, self.order);
        let record = self.read(&mut dec)?;
        let size = dec.consumed();
        debug!("decoded {} header keys in {size} bytes", record.len());
        Ok(KeyedHeader { record, size })
    }

    /// Decode a header at the decoder's cursor, leaving the cursor just past
    /// the end sentinel.
    ///
    /// On a wrong start sentinel only that first string has been consumed.
    pub fn read(&self, dec: &mut Decoder<'_>) -> Result<HeaderRecord> {
        let mut record = HeaderRecord::new();
        let mut state = State::AwaitStart;

        while state != State::Done {
            let offset = dec.position();
            // Running out before another length prefix means the end
            // sentinel is missing. Any other failure is a decode error.
            if state == State::ReadingEntries && dec.remaining() < 4 {
                return Err(Error::Framing {
                    expected: self.end.into(),
                    found: END_OF_DATA.into(),
                    offset,
                });
            }
            let word = dec.read_pascal_string()?;
            state = match state {
                State::AwaitStart if word == self.start => State::ReadingEntries,
                State::AwaitStart => {
                    return Err(Error::Framing {
                        expected: self.start.into(),
                        found: word,
                        offset,
                    });
                }
                State::ReadingEntries if word == self.end => State::Done,
                State::ReadingEntries => {
                    let spec = lookup(self.table, &word).ok_or_else(|| Error::UnknownKey {
                        key: word.clone(),
                        offset,
                    })?;
                    let value = dec.decode(spec)?;
                    record.insert(word, value);
                    State::ReadingEntries
                }
                State::Done => State::Done,
            };
        }
        Ok(record)
    }

    /// Encode `record`, writing only the keys present in the table.
    pub fn encode(&self, record: &HeaderRecord) -> Result<Vec<u8>> {
        let mut enc = Encoder::new(self.order);
        enc.write_pascal_string(self.start)?;
        for (key, value) in record {
            let Some(spec) = lookup(self.table, key) else {
                debug!("skipping header key {key:?}: not in key table");
                continue;
            };
            enc.write_pascal_string(key)?;
            enc.encode(spec, value)?;
        }
        enc.write_pascal_string(self.end)?;
        Ok(enc.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn pascal(s: &str) -> Vec<u8> {
        let mut out = (s.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(s.as_bytes());
        out
    }

    fn sample_record() -> HeaderRecord {
        [
            ("source_name", Value::Str("J0534+2200".into())),
            ("telescope_id", Value::Int32(4)),
            ("nbits", Value::Int32(8)),
            ("tsamp", Value::Float64(6.4e-5)),
            ("signed", Value::Int8(1)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn keys_are_unique() {
        for (i, a) in SIGPROC_KEYS.iter().enumerate() {
            assert!(
                SIGPROC_KEYS[i + 1..].iter().all(|b| a.name != b.name),
                "duplicate key {}",
                a.name
            );
        }
    }

    #[test]
    fn roundtrip_and_size() {
        let codec = KeyedCodec::sigproc();
        let rec = sample_record();
        let mut bytes = codec.encode(&rec).unwrap();
        let header_len = bytes.len();
        bytes.extend_from_slice(&[1, 2, 3, 4]);
        let header = codec.decode(&bytes).unwrap();
        assert_eq!(header.record, rec);
        assert_eq!(header.size, header_len);
    }

    #[test]
    fn wrong_start_sentinel() {
        let mut bytes = pascal("HEADER_BEGIN");
        let first_len = bytes.len();
        bytes.extend(pascal("nbits"));
        bytes.extend_from_slice(&8i32.to_le_bytes());

        let mut dec = Decoder::new(&bytes, ByteOrder::Little);
        let err = KeyedCodec::sigproc().read(&mut dec).unwrap_err();
        assert_eq!(dec.consumed(), first_len);

        match err {
            Error::Framing {
                expected,
                found,
                offset,
            } => {
                assert_eq!(expected, "HEADER_START");
                assert_eq!(found, "HEADER_BEGIN");
                assert_eq!(offset, 0);
            }
            other => panic!("expected framing error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_key_is_named() {
        let mut bytes = pascal("HEADER_START");
        let offset = bytes.len() as u64;
        bytes.extend(pascal("frobnicate"));
        bytes.extend_from_slice(&0i32.to_le_bytes());
        bytes.extend(pascal("HEADER_END"));
        match KeyedCodec::sigproc().decode(&bytes) {
            Err(Error::UnknownKey { key, offset: at }) => {
                assert_eq!(key, "frobnicate");
                assert_eq!(at, offset);
            }
            other => panic!("expected unknown key, got {other:?}"),
        }
    }

    #[test]
    fn missing_end_sentinel() {
        let mut bytes = pascal("HEADER_START");
        bytes.extend(pascal("nbits"));
        bytes.extend_from_slice(&8i32.to_le_bytes());
        assert!(matches!(
            KeyedCodec::sigproc().decode(&bytes),
            Err(Error::Framing { ref expected, .. }) if expected == "HEADER_END"
        ));
    }

    #[test]
    fn malformed_key_is_decode_error() {
        let mut bytes = pascal("HEADER_START");
        bytes.extend_from_slice(&[3, 0, 0, 0, 0xC3, 0x28, 0x41]);
        match KeyedCodec::sigproc().decode(&bytes) {
            Err(Error::Decode { offset, reason }) => {
                assert_eq!(offset, 20);
                assert!(reason.contains("UTF-8"), "{reason}");
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn oversized_key_length_is_decode_error() {
        let mut bytes = pascal("HEADER_START");
        bytes.extend_from_slice(&100u32.to_le_bytes());
        bytes.extend_from_slice(b"nbits");
        assert!(matches!(
            KeyedCodec::sigproc().decode(&bytes),
            Err(Error::Decode { offset: 20, .. })
        ));
    }

    #[test]
    fn truncated_value_is_decode_error() {
        let mut bytes = pascal("HEADER_START");
        bytes.extend(pascal("tsamp"));
        bytes.extend_from_slice(&[0, 0, 0]);
        assert!(matches!(
            KeyedCodec::sigproc().decode(&bytes),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn encode_skips_derived_fields() {
        let mut rec = sample_record();
        rec.insert("telescope_name", Value::Str("Parkes".into()));
        let codec = KeyedCodec::sigproc();
        let bytes = codec.encode(&rec).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap().record, sample_record());
    }

    #[test]
    fn encode_uses_table_type() {
        let mut rec = HeaderRecord::new();
        // Integral float stored under an int key is written as Int32.
        rec.insert("nchans", Value::Float64(1024.0));
        let codec = KeyedCodec::sigproc();
        let bytes = codec.encode(&rec).unwrap();
        let back = codec.decode(&bytes).unwrap().record;
        assert_eq!(back.get("nchans"), Some(&Value::Int32(1024)));

        rec.insert("nchans", Value::Float64(10.5));
        assert!(matches!(
            codec.encode(&rec),
            Err(Error::TypeConversion { ref field, .. }) if field == "nchans"
        ));
    }
}
