//! GUPPI raw-data headers.
//!
//! Each data block of a GUPPI `.raw` file is preceded by a header of 80-byte
//! `KEYWORD = value` cards closed by `END`. Unlike FITS there is no block
//! padding after `END`, except that with `DIRECTIO` set the data starts at
//! the next 512-byte boundary.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use log::debug;

use crate::error::{Error, Result, ResultExt};
use crate::keyed::{lookup, KeyTypeTable, END_OF_DATA};
use crate::psrfits::{coerce, end_card, parse_card, value_card, CARD_SIZE, END, MAX_STRING};
use crate::record::HeaderRecord;
use crate::value::{FieldSpec, PrimitiveType};

/// Data alignment when `DIRECTIO` is non-zero.
pub const DIRECTIO_ALIGN: usize = 512;

use PrimitiveType::{Float64, Int32, Int64, PaddedString};

const S: PrimitiveType = PaddedString(MAX_STRING);

/// Keys written by the GUPPI/BL data recorders.
pub static GUPPI_KEYS: &[FieldSpec] = &[
    FieldSpec::new("BACKEND", S),
    FieldSpec::new("TELESCOP", S),
    FieldSpec::new("OBSERVER", S),
    FieldSpec::new("PROJID", S),
    FieldSpec::new("SRC_NAME", S),
    FieldSpec::new("FRONTEND", S),
    FieldSpec::new("PKTFMT", S),
    FieldSpec::new("RA_STR", S),
    FieldSpec::new("DEC_STR", S),
    FieldSpec::new("RA", Float64),
    FieldSpec::new("DEC", Float64),
    FieldSpec::new("OBSFREQ", Float64),
    FieldSpec::new("OBSBW", Float64),
    FieldSpec::new("CHAN_BW", Float64),
    FieldSpec::new("TBIN", Float64),
    FieldSpec::new("OBSNCHAN", Int32),
    FieldSpec::new("NPOL", Int32),
    FieldSpec::new("NBITS", Int32),
    FieldSpec::new("OVERLAP", Int32),
    FieldSpec::new("DIRECTIO", Int32),
    FieldSpec::new("PKTSIZE", Int32),
    FieldSpec::new("BLOCSIZE", Int64),
    FieldSpec::new("PKTIDX", Int64),
    FieldSpec::new("STT_IMJD", Int32),
    FieldSpec::new("STT_SMJD", Int32),
    FieldSpec::new("STT_OFFS", Float64),
];

/// One decoded GUPPI block header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GuppiHeader {
    pub record: HeaderRecord,
    /// Header length in bytes, `END` card included.
    pub size: usize,
}

impl GuppiHeader {
    /// Decode the header at the start of `data`.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let table: KeyTypeTable = GUPPI_KEYS;
        let mut record = HeaderRecord::new();
        for (i, chunk) in data.chunks(CARD_SIZE).enumerate() {
            let card = parse_card(chunk, (i * CARD_SIZE) as u64)?;
            if card.is_end() {
                let size = (i + 1) * CARD_SIZE;
                debug!("guppi header: {} keys, {size} bytes", record.len());
                return Ok(GuppiHeader { record, size });
            }
            let Some(value) = card.value else {
                continue;
            };
            let value = match lookup(table, &card.keyword) {
                Some(spec) => coerce(spec, value)?,
                None => value,
            };
            record.insert(card.keyword, value);
        }
        Err(Error::Framing {
            expected: END.into(),
            found: END_OF_DATA.into(),
            offset: data.len() as u64,
        })
    }

    /// Read the first block header of a raw file, card by card, without
    /// touching the data that follows.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(Error::from).in_file(path)?;
        Self::read_from(&mut BufReader::new(file)).in_file(path)
    }

    /// Read one header from `reader`, leaving it positioned just past `END`.
    pub fn read_from(reader: &mut impl Read) -> Result<Self> {
        let mut data = Vec::new();
        let mut card = [0u8; CARD_SIZE];
        loop {
            match reader.read_exact(&mut card) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(Error::Framing {
                        expected: END.into(),
                        found: END_OF_DATA.into(),
                        offset: data.len() as u64,
                    });
                }
                Err(e) => return Err(e.into()),
            }
            data.extend_from_slice(&card);
            if card.starts_with(END.as_bytes()) && card[END.len()..].iter().all(|&b| b == b' ') {
                return Self::decode(&data);
            }
        }
    }

    /// Encode the cards and `END`, padded with spaces to the data offset.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for (key, value) in &self.record {
            out.extend(value_card(key, value)?);
        }
        out.extend(end_card());
        let size = out.len();
        out.resize(self.data_offset_for(size), b' ');
        Ok(out)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.encode().in_file(path)?;
        std::fs::write(path, bytes).map_err(Error::from).in_file(path)
    }

    pub fn directio(&self) -> bool {
        self.record.get_i64("DIRECTIO").is_some_and(|n| n != 0)
    }

    /// Offset of the block's data from the start of this header.
    pub fn data_offset(&self) -> usize {
        self.data_offset_for(self.size)
    }

    fn data_offset_for(&self, size: usize) -> usize {
        if self.directio() {
            size.div_ceil(DIRECTIO_ALIGN) * DIRECTIO_ALIGN
        } else {
            size
        }
    }

    /// Bytes of sample data that follow the header.
    pub fn block_size(&self) -> Option<u64> {
        self.record.get_i64("BLOCSIZE").and_then(|n| u64::try_from(n).ok())
    }

    pub fn nbits(&self) -> Option<i64> {
        self.record.get_i64("NBITS")
    }

    pub fn nchans(&self) -> Option<i64> {
        self.record.get_i64("OBSNCHAN")
    }

    pub fn npol(&self) -> Option<i64> {
        self.record.get_i64("NPOL")
    }

    pub fn source_name(&self) -> Option<&str> {
        self.record.get_str("SRC_NAME")
    }

    pub fn telescope(&self) -> Option<&str> {
        self.record.get_str("TELESCOP")
    }

    /// Block start as an MJD, from `STT_IMJD`, `STT_SMJD` and `STT_OFFS`.
    pub fn start_mjd(&self) -> Option<f64> {
        let imjd = self.record.get_i64("STT_IMJD")? as f64;
        let smjd = self.record.get_i64("STT_SMJD")? as f64;
        let offs = self.record.get_f64("STT_OFFS").unwrap_or(0.0);
        Some(imjd + (smjd + offs) / 86400.0)
    }
}
