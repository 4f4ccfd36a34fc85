//! PSRFITS primary headers.
//!
//! Only the primary HDU header is handled: 80-byte `KEYWORD = value / comment`
//! cards packed into 2880-byte blocks, starting with `SIMPLE` and closed by
//! `END`. Subintegration tables are not read.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::debug;

use crate::error::{Error, Result, ResultExt};
use crate::keyed::{lookup, KeyTypeTable, END_OF_DATA};
use crate::record::HeaderRecord;
use crate::value::{format_float, parse_float, FieldSpec, PrimitiveType, Value};

pub const BLOCK_SIZE: usize = 2880;
pub const CARD_SIZE: usize = 80;
pub const CARDS_PER_BLOCK: usize = BLOCK_SIZE / CARD_SIZE;

const KEYWORD_WIDTH: usize = 8;
/// Longest string value that fits in one card.
pub(crate) const MAX_STRING: usize = 68;
pub(crate) const END: &str = "END";
const SIMPLE: &str = "SIMPLE";

use PrimitiveType::{Bool, Float64, Int32, PaddedString};

const S: PrimitiveType = PaddedString(MAX_STRING);

/// Primary-header keys defined by the PSRFITS standard.
pub static PSRFITS_KEYS: &[FieldSpec] = &[
    FieldSpec::new("SIMPLE", Bool),
    FieldSpec::new("BITPIX", Int32),
    FieldSpec::new("NAXIS", Int32),
    FieldSpec::new("EXTEND", Bool),
    FieldSpec::new("HDRVER", S),
    FieldSpec::new("FITSTYPE", S),
    FieldSpec::new("DATE", S),
    FieldSpec::new("OBSERVER", S),
    FieldSpec::new("PROJID", S),
    FieldSpec::new("TELESCOP", S),
    FieldSpec::new("ANT_X", Float64),
    FieldSpec::new("ANT_Y", Float64),
    FieldSpec::new("ANT_Z", Float64),
    FieldSpec::new("FRONTEND", S),
    FieldSpec::new("IBEAM", S),
    FieldSpec::new("NRCVR", Int32),
    FieldSpec::new("FD_POLN", S),
    FieldSpec::new("FD_HAND", Int32),
    FieldSpec::new("FD_SANG", Float64),
    FieldSpec::new("FD_XYPH", Float64),
    FieldSpec::new("BACKEND", S),
    FieldSpec::new("BECONFIG", S),
    FieldSpec::new("BE_PHASE", Int32),
    FieldSpec::new("BE_DCC", Int32),
    FieldSpec::new("BE_DELAY", Float64),
    FieldSpec::new("TCYCLE", Float64),
    FieldSpec::new("OBS_MODE", S),
    FieldSpec::new("DATE-OBS", S),
    FieldSpec::new("OBSFREQ", Float64),
    FieldSpec::new("OBSBW", Float64),
    FieldSpec::new("OBSNCHAN", Int32),
    FieldSpec::new("CHAN_DM", Float64),
    FieldSpec::new("PNT_ID", S),
    FieldSpec::new("SRC_NAME", S),
    FieldSpec::new("COORD_MD", S),
    FieldSpec::new("EQUINOX", Float64),
    FieldSpec::new("RA", S),
    FieldSpec::new("DEC", S),
    FieldSpec::new("BMAJ", Float64),
    FieldSpec::new("BMIN", Float64),
    FieldSpec::new("BPA", Float64),
    FieldSpec::new("STT_CRD1", S),
    FieldSpec::new("STT_CRD2", S),
    FieldSpec::new("TRK_MODE", S),
    FieldSpec::new("STP_CRD1", S),
    FieldSpec::new("STP_CRD2", S),
    FieldSpec::new("SCANLEN", Float64),
    FieldSpec::new("FD_MODE", S),
    FieldSpec::new("FA_REQ", Float64),
    FieldSpec::new("CAL_MODE", S),
    FieldSpec::new("CAL_FREQ", Float64),
    FieldSpec::new("CAL_DCYC", Float64),
    FieldSpec::new("CAL_PHS", Float64),
    FieldSpec::new("CAL_NPHS", Int32),
    FieldSpec::new("STT_IMJD", Int32),
    FieldSpec::new("STT_SMJD", Int32),
    FieldSpec::new("STT_OFFS", Float64),
    FieldSpec::new("STT_LST", Float64),
];

/// One header card.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub keyword: String,
    pub value: Option<Value>,
    pub comment: Option<String>,
}

impl Card {
    pub fn is_end(&self) -> bool {
        self.keyword == END
    }

    pub fn is_commentary(&self) -> bool {
        matches!(self.keyword.as_str(), "COMMENT" | "HISTORY" | "")
    }
}

fn card_str(bytes: &[u8], offset: u64) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| Error::Decode {
        offset: offset + e.valid_up_to() as u64,
        reason: "card is not ASCII".into(),
    })
}

/// Split a value field into value text and comment. The comment starts at
/// the first ` /` outside a quoted string.
fn split_comment(field: &str) -> (&str, Option<&str>) {
    let bytes = field.as_bytes();
    let mut in_string = false;
    for i in 0..bytes.len() {
        match bytes[i] {
            b'\'' => in_string = !in_string,
            b'/' if !in_string => {
                let comment = field[i + 1..].trim();
                return (&field[..i], (!comment.is_empty()).then_some(comment));
            }
            _ => {}
        }
    }
    (field, None)
}

/// Parse a value in its self-described type.
fn parse_raw_value(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Some(inner) = text.strip_prefix('\'') {
        let inner = inner.strip_suffix('\'').unwrap_or(inner);
        return Some(Value::Str(inner.replace("''", "'").trim_end().to_string()));
    }
    match text {
        "T" => return Some(Value::Bool(true)),
        "F" => return Some(Value::Bool(false)),
        _ => {}
    }
    if let Ok(n) = text.parse::<i64>() {
        return Some(Value::Int64(n));
    }
    Some(match parse_float(text) {
        Some(f) => Value::Float64(f),
        None => Value::Str(text.to_string()),
    })
}

/// Parse one 80-byte card found at byte `offset`.
pub fn parse_card(bytes: &[u8], offset: u64) -> Result<Card> {
    if bytes.len() != CARD_SIZE {
        return Err(Error::truncated(offset, CARD_SIZE, bytes.len()));
    }
    let text = card_str(bytes, offset)?;
    let keyword = text[..KEYWORD_WIDTH].trim_end().to_string();
    let rest = &text[KEYWORD_WIDTH..];

    if keyword == END {
        return Ok(Card {
            keyword,
            value: None,
            comment: None,
        });
    }
    let has_value = rest.starts_with("= ") && !matches!(keyword.as_str(), "COMMENT" | "HISTORY" | "");
    if !has_value {
        let comment = rest.trim();
        return Ok(Card {
            keyword,
            value: None,
            comment: (!comment.is_empty()).then(|| comment.to_string()),
        });
    }
    let (value, comment) = split_comment(&rest[2..]);
    Ok(Card {
        keyword,
        value: parse_raw_value(value),
        comment: comment.map(str::to_string),
    })
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Bool(b) => format!("{:>20}", if *b { "T" } else { "F" }),
        Value::Str(s) => {
            let quoted = format!("'{:<8}'", s.replace('\'', "''"));
            format!("{quoted:<20}")
        }
        Value::Float32(_) | Value::Float64(_) | Value::Measured(..) => {
            let f = value.as_f64().unwrap_or_default();
            format!("{:>20}", format_float(f).to_uppercase())
        }
        other => format!("{:>20}", other.to_string()),
    }
}

/// Format one card as exactly 80 bytes.
pub fn format_card(card: &Card) -> Vec<u8> {
    let mut line = format!("{:<8}", card.keyword);
    match &card.value {
        Some(v) => {
            line.push_str("= ");
            line.push_str(&format_value(v));
            if let Some(c) = &card.comment {
                line.push_str(" / ");
                line.push_str(c);
            }
        }
        None => {
            if let Some(c) = &card.comment {
                line.push_str(c);
            }
        }
    }
    let mut bytes = line.into_bytes();
    bytes.resize(CARD_SIZE, b' ');
    bytes
}

/// Convert a self-described value to the type its key declares.
pub(crate) fn coerce(spec: &FieldSpec, value: Value) -> Result<Value> {
    Ok(match (spec.ty, value) {
        (Float64, Value::Int64(n)) => Value::Float64(n as f64),
        (Int32, Value::Int64(n)) => match i32::try_from(n) {
            Ok(n) => Value::Int32(n),
            Err(_) => return Err(Error::convert(spec.name, &n.to_string(), None)),
        },
        (Int32, Value::Float64(f))
            if f.fract() == 0.0 && f >= f64::from(i32::MIN) && f <= f64::from(i32::MAX) =>
        {
            Value::Int32(f as i32)
        }
        (Int32, Value::Float64(f)) => return Err(Error::convert(spec.name, &format_float(f), None)),
        (PaddedString(_), v @ (Value::Int64(_) | Value::Float64(_))) => Value::Str(v.to_string()),
        // Placeholder strings such as '*' are kept as written.
        (_, v) => v,
    })
}

/// Format a valued card, rejecting keywords and strings that do not fit.
pub(crate) fn value_card(key: &str, value: &Value) -> Result<Vec<u8>> {
    if key.len() > KEYWORD_WIDTH {
        return Err(Error::convert("keyword", key, None));
    }
    if let Value::Str(s) = value {
        if s.len() > MAX_STRING {
            return Err(Error::convert(key, s, None));
        }
    }
    Ok(format_card(&Card {
        keyword: key.to_string(),
        value: Some(value.clone()),
        comment: None,
    }))
}

pub(crate) fn end_card() -> Vec<u8> {
    format_card(&Card {
        keyword: END.into(),
        value: None,
        comment: None,
    })
}

/// A decoded PSRFITS primary header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PsrfitsHeader {
    /// Valued cards in file order.
    pub record: HeaderRecord,
    /// `COMMENT`, `HISTORY` and blank-keyword cards as `(keyword, text)`.
    pub commentary: Vec<(String, String)>,
    /// Header length in bytes, a whole number of blocks.
    pub size: usize,
}

impl PsrfitsHeader {
    /// Decode the primary header at the start of `data`.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let table: KeyTypeTable = PSRFITS_KEYS;
        let mut out = PsrfitsHeader::default();
        for (i, chunk) in data.chunks(CARD_SIZE).enumerate() {
            let offset = (i * CARD_SIZE) as u64;
            let card = parse_card(chunk, offset)?;
            if i == 0 && card.keyword != SIMPLE {
                return Err(Error::Framing {
                    expected: SIMPLE.into(),
                    found: card.keyword,
                    offset,
                });
            }
            if card.is_end() {
                out.size = (i / CARDS_PER_BLOCK + 1) * BLOCK_SIZE;
                debug!("psrfits primary header: {} keys, {} bytes", out.record.len(), out.size);
                return Ok(out);
            }
            if card.is_commentary() {
                if card.keyword.is_empty() && card.comment.is_none() {
                    continue;
                }
                out.commentary
                    .push((card.keyword, card.comment.unwrap_or_default()));
                continue;
            }
            let Some(value) = card.value else {
                continue;
            };
            let value = match lookup(table, &card.keyword) {
                Some(spec) => coerce(spec, value)?,
                None => value,
            };
            out.record.insert(card.keyword, value);
        }
        Err(Error::Framing {
            expected: END.into(),
            found: END_OF_DATA.into(),
            offset: data.len() as u64,
        })
    }

    /// Read the primary header of a PSRFITS file, one block at a time.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(Error::from).in_file(path)?;
        let mut data = Vec::new();
        let mut block = vec![0u8; BLOCK_SIZE];
        loop {
            let n = read_block(&mut file, &mut block).in_file(path)?;
            data.extend_from_slice(&block[..n]);
            match Self::decode(&data) {
                Err(Error::Framing { ref found, .. }) if found == END_OF_DATA && n == BLOCK_SIZE => {}
                other => return other.in_file(path),
            }
        }
    }

    /// Encode as whole, space-padded header blocks.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut cards = Vec::new();
        for (key, value) in &self.record {
            cards.push(value_card(key, value)?);
        }
        for (keyword, text) in &self.commentary {
            cards.push(format_card(&Card {
                keyword: keyword.clone(),
                value: None,
                comment: Some(text.clone()),
            }));
        }
        cards.push(end_card());

        let mut out: Vec<u8> = cards.concat();
        out.resize(out.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE, b' ');
        Ok(out)
    }

    /// Write the header as a data-less FITS file.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.encode().in_file(path)?;
        std::fs::write(path, bytes).map_err(Error::from).in_file(path)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.record.get(key)
    }

    pub fn source_name(&self) -> Option<&str> {
        self.record.get_str("SRC_NAME")
    }

    pub fn telescope(&self) -> Option<&str> {
        self.record.get_str("TELESCOP")
    }

    /// Observation start as an MJD, from `STT_IMJD`, `STT_SMJD` and
    /// `STT_OFFS`.
    pub fn start_mjd(&self) -> Option<f64> {
        let imjd = self.record.get_i64("STT_IMJD")? as f64;
        let smjd = self.record.get_i64("STT_SMJD")? as f64;
        let offs = self.record.get_f64("STT_OFFS").unwrap_or(0.0);
        Some(imjd + (smjd + offs) / 86400.0)
    }
}

/// Fill `buf` from `file`, returning fewer bytes only at end of file.
fn read_block(file: &mut File, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn card(text: &str) -> Vec<u8> {
        let mut b = text.as_bytes().to_vec();
        b.resize(CARD_SIZE, b' ');
        b
    }

    fn sample_bytes() -> Vec<u8> {
        let mut data = Vec::new();
        for line in [
            "SIMPLE  =                    T / file does conform to FITS standard",
            "BITPIX  =                    8",
            "NAXIS   =                    0",
            "EXTEND  =                    T",
            "HDRVER  = '6.1     '           / Header version",
            "TELESCOP= 'GMRT    '",
            "OBSERVER= 'O''Brien'",
            "OBSFREQ =                  400 / [MHz] centre frequency",
            "OBSNCHAN=                 4096",
            "CHAN_DM =                 2.885",
            "CAL_FREQ= '*       '",
            "SRC_NAME= 'J2144-3933'",
            "RA      = '21:44:12.06'",
            "STT_IMJD=                58017",
            "STT_SMJD=                51810",
            "STT_OFFS=  1.000000000000D-01",
            "HISTORY written by a test",
            "END",
        ] {
            data.extend(card(line));
        }
        data.resize(BLOCK_SIZE, b' ');
        data
    }

    #[test]
    fn decode_primary() {
        let h = PsrfitsHeader::decode(&sample_bytes()).unwrap();
        assert_eq!(h.size, BLOCK_SIZE);
        assert_eq!(h.get("SIMPLE"), Some(&Value::Bool(true)));
        assert_eq!(h.get("OBSFREQ"), Some(&Value::Float64(400.0)));
        assert_eq!(h.get("OBSNCHAN"), Some(&Value::Int32(4096)));
        assert_eq!(h.record.get_str("OBSERVER"), Some("O'Brien"));
        assert_eq!(h.record.get_str("CAL_FREQ"), Some("*"));
        assert_eq!(h.telescope(), Some("GMRT"));
        assert_eq!(h.source_name(), Some("J2144-3933"));
        assert_eq!(h.get("STT_OFFS"), Some(&Value::Float64(0.1)));
        assert_eq!(h.get("STT_IMJD"), Some(&Value::Int32(58017)));
        assert!((h.start_mjd().unwrap() - 58017.5996539).abs() < 1e-7);
        assert_eq!(
            h.commentary,
            vec![("HISTORY".to_string(), "written by a test".to_string())]
        );
    }

    #[test]
    fn roundtrip() {
        let h = PsrfitsHeader::decode(&sample_bytes()).unwrap();
        let bytes = h.encode().unwrap();
        assert_eq!(bytes.len() % BLOCK_SIZE, 0);
        assert_eq!(&bytes[..30], b"SIMPLE  =                    T");
        assert_eq!(PsrfitsHeader::decode(&bytes).unwrap(), h);
    }

    #[test]
    fn header_spanning_blocks() {
        let mut h = PsrfitsHeader::decode(&sample_bytes()).unwrap();
        for i in 0..40 {
            h.commentary.push(("COMMENT".into(), format!("line {i}")));
        }
        let bytes = h.encode().unwrap();
        assert_eq!(bytes.len(), 2 * BLOCK_SIZE);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obs.sf");
        let mut file_bytes = bytes.clone();
        file_bytes.extend(vec![0u8; BLOCK_SIZE]);
        std::fs::write(&path, file_bytes).unwrap();
        let back = PsrfitsHeader::read(&path).unwrap();
        assert_eq!(back.size, 2 * BLOCK_SIZE);
        assert_eq!(back.record, h.record);
        assert_eq!(back.commentary, h.commentary);
    }

    #[test]
    fn simple_must_come_first() {
        let mut data = card("BITPIX  =                    8");
        data.resize(BLOCK_SIZE, b' ');
        let err = PsrfitsHeader::decode(&data).unwrap_err();
        assert!(matches!(err, Error::Framing { ref found, offset: 0, .. } if found == "BITPIX"));
    }

    #[test]
    fn missing_end() {
        let mut data = sample_bytes();
        let end_at = 17 * CARD_SIZE;
        data[end_at..end_at + 3].copy_from_slice(b"   ");
        let err = PsrfitsHeader::decode(&data).unwrap_err();
        assert!(matches!(err, Error::Framing { ref expected, .. } if expected == "END"));
    }

    #[test]
    fn integer_key_rejects_fraction() {
        let mut data = card("SIMPLE  =                    T");
        data.extend(card("OBSNCHAN=                 12.5"));
        data.extend(card("END"));
        let err = PsrfitsHeader::decode(&data).unwrap_err();
        assert!(matches!(err, Error::TypeConversion { ref field, .. } if field == "OBSNCHAN"));
    }

    #[test]
    fn integer_keys_take_declared_width() {
        let mut data = card("SIMPLE  =                    T");
        data.extend(card("NAXIS   =                  2.0"));
        data.extend(card("BITPIX  =                  -32"));
        data.extend(card("NAXIS1  =                 1024"));
        data.extend(card("END"));
        let h = PsrfitsHeader::decode(&data).unwrap();
        assert_eq!(h.get("NAXIS"), Some(&Value::Int32(2)));
        assert_eq!(h.get("BITPIX"), Some(&Value::Int32(-32)));
        // Keys outside the table keep their self-described type.
        assert_eq!(h.get("NAXIS1"), Some(&Value::Int64(1024)));
    }

    #[test]
    fn integer_key_out_of_range() {
        let mut data = card("SIMPLE  =                    T");
        data.extend(card("OBSNCHAN=          99999999999"));
        data.extend(card("END"));
        let err = PsrfitsHeader::decode(&data).unwrap_err();
        assert!(matches!(
            err,
            Error::TypeConversion { ref field, ref raw, .. } if field == "OBSNCHAN" && raw == "99999999999"
        ));
    }
}
