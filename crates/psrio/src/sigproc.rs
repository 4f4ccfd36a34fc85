//! SIGPROC time series (`.tim`), spectra (`.spec`) and filterbanks (`.fil`).
//!
//! Every SIGPROC file starts with a `HEADER_START … HEADER_END` keyed
//! header followed by a flat sample payload whose element type comes from
//! the `nbits` key. Filterbank payloads are spectrum-major: all channels of
//! spectrum 0, then spectrum 1, and so on.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log::debug;

use crate::coords::unpack_sexagesimal;
use crate::error::{Error, Result, ResultExt};
use crate::keyed::{KeyedCodec, END_OF_DATA};
use crate::payload::{byte_count, decode_payload, encode_payload, sample_count, Dtype, PayloadOptions};
use crate::record::HeaderRecord;
use crate::tables::{data_type_name, machine_name, telescope_name, UNKNOWN_NAME};

/// A decoded SIGPROC header with its derived fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SigprocHeader {
    /// Header keys in file order.
    pub record: HeaderRecord,
    /// Header length in bytes, sentinels included; the payload starts here.
    pub size: usize,
    pub telescope_name: &'static str,
    pub machine_name: &'static str,
    pub data_type_name: &'static str,
    /// `src_raj` in decimal hours.
    pub ra_hours: Option<f64>,
    /// `src_dej` in decimal degrees.
    pub dec_degrees: Option<f64>,
}

impl SigprocHeader {
    /// Build a header from raw keys, deriving names and coordinates.
    pub fn new(record: HeaderRecord) -> Result<Self> {
        let size = KeyedCodec::sigproc().encode(&record)?.len();
        Ok(Self::derive(record, size))
    }

    fn derive(record: HeaderRecord, size: usize) -> Self {
        let name = |key: &str, f: fn(i64) -> &'static str| {
            record.get_i64(key).map(f).unwrap_or(UNKNOWN_NAME)
        };
        SigprocHeader {
            telescope_name: name("telescope_id", telescope_name),
            machine_name: name("machine_id", machine_name),
            data_type_name: name("data_type", data_type_name),
            ra_hours: record.get_f64("src_raj").map(unpack_sexagesimal),
            dec_degrees: record.get_f64("src_dej").map(unpack_sexagesimal),
            size,
            record,
        }
    }

    /// Decode the header at the start of `data`.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let keyed = KeyedCodec::sigproc().decode(data)?;
        Ok(Self::derive(keyed.record, keyed.size))
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        KeyedCodec::sigproc().encode(&self.record)
    }

    /// Read only the header of a SIGPROC file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(Error::from).in_file(path)?;
        read_header_prefix(&mut file).in_file(path)
    }

    /// Bits per sample, if the header declares it.
    pub fn nbits(&self) -> Result<Option<u32>> {
        match self.record.get_i64("nbits") {
            None => Ok(None),
            Some(n) => u32::try_from(n)
                .map(Some)
                .map_err(|_| Error::convert("nbits", &n.to_string(), None)),
        }
    }

    pub fn nchans(&self) -> Result<usize> {
        positive(&self.record, "nchans")
    }

    /// Number of IFs (polarisations); defaults to 1.
    pub fn nifs(&self) -> Result<usize> {
        if self.record.contains("nifs") {
            positive(&self.record, "nifs")
        } else {
            Ok(1)
        }
    }

    pub fn tsamp(&self) -> Result<f64> {
        self.record.require_f64("tsamp")
    }

    pub fn source_name(&self) -> Option<&str> {
        self.record.get_str("source_name")
    }
}

fn positive(record: &HeaderRecord, key: &'static str) -> Result<usize> {
    let n = record.require_i64(key)?;
    match usize::try_from(n) {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(Error::convert(key, &n.to_string(), None)),
    }
}

/// Read successively larger prefixes of `file` until the header decodes.
fn read_header_prefix(file: &mut File) -> Result<SigprocHeader> {
    let len = file.metadata()?.len();
    let mut want: u64 = 4096;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        file.seek(SeekFrom::Start(0))?;
        file.by_ref().take(want).read_to_end(&mut buf)?;
        match SigprocHeader::decode(&buf) {
            Ok(header) => return Ok(header),
            Err(Error::Decode { .. }) if (buf.len() as u64) < len => {}
            Err(Error::Framing { ref found, .. }) if found == END_OF_DATA && (buf.len() as u64) < len => {}
            Err(e) => return Err(e),
        }
        want = want.saturating_mul(2);
    }
}

/// A SIGPROC time series or spectrum: a header and a flat payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SigprocSeries {
    pub header: SigprocHeader,
    /// On-disk element type the samples were widened from.
    pub dtype: Dtype,
    pub data: Vec<f32>,
}

/// Read a `.tim` file.
pub fn read_tim(path: impl AsRef<Path>) -> Result<SigprocSeries> {
    read_series(path.as_ref(), &PayloadOptions::default())
}

/// Read a `.spec` file.
pub fn read_spec(path: impl AsRef<Path>) -> Result<SigprocSeries> {
    read_series(path.as_ref(), &PayloadOptions::default())
}

/// Read a `.tim` or `.spec` file with explicit payload options.
pub fn read_series(path: &Path, options: &PayloadOptions) -> Result<SigprocSeries> {
    let bytes = std::fs::read(path).map_err(Error::from).in_file(path)?;
    decode_series(&bytes, options).in_file(path)
}

/// Decode a `.tim` or `.spec` file held in memory.
pub fn decode_series(bytes: &[u8], options: &PayloadOptions) -> Result<SigprocSeries> {
    let header = SigprocHeader::decode(bytes)?;
    let nbits = header.nbits()?;
    let payload = decode_payload(&bytes[header.size..], nbits, options)?;
    debug!(
        "sigproc payload: {} samples of {:?} after {} header bytes",
        payload.data.len(),
        payload.dtype,
        header.size
    );
    Ok(SigprocSeries {
        header,
        dtype: payload.dtype,
        data: payload.data,
    })
}

impl SigprocSeries {
    /// Encode header and payload.
    pub fn encode(&self, options: &PayloadOptions) -> Result<Vec<u8>> {
        let mut out = self.header.encode()?;
        out.extend(encode_payload(&self.data, self.header.nbits()?, options)?);
        Ok(out)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.encode(&PayloadOptions::default()).in_file(path)?;
        std::fs::write(path, bytes).map_err(Error::from).in_file(path)
    }
}

/// A block of consecutive filterbank spectra.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectra {
    /// Channel centre frequencies in MHz.
    pub freqs: Vec<f64>,
    pub tsamp: f64,
    /// Time of the first spectrum relative to the start of the file, in
    /// seconds.
    pub start_time: f64,
    pub nspectra: usize,
    /// Samples per spectrum (`nchans * nifs`).
    pub width: usize,
    /// Spectrum-major samples, `nspectra * width` long.
    pub data: Vec<f32>,
}

impl Spectra {
    /// Samples of spectrum `i`.
    pub fn spectrum(&self, i: usize) -> &[f32] {
        &self.data[i * self.width..(i + 1) * self.width]
    }

    /// Time series of channel `chan` across the block.
    pub fn channel(&self, chan: usize) -> Vec<f32> {
        self.data.iter().skip(chan).step_by(self.width).copied().collect()
    }
}

/// An open filterbank file. Spectra are read on demand.
#[derive(Debug, Clone)]
pub struct Filterbank {
    pub path: PathBuf,
    pub header: SigprocHeader,
    pub options: PayloadOptions,
    pub nchans: usize,
    pub nifs: usize,
    pub nbits: Option<u32>,
    /// `fch1 + foff * i` for each channel.
    pub freqs: Vec<f64>,
    /// Bytes per spectrum (all channels and IFs).
    pub bytes_per_spectrum: usize,
    pub nspectra: usize,
}

impl Filterbank {
    /// Open a filterbank and read its header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, PayloadOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: PayloadOptions) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(Error::from).in_file(path)?;
        let header = read_header_prefix(&mut file).in_file(path)?;
        let file_len = file.metadata().map_err(Error::from).in_file(path)?.len();
        Self::from_header(path.to_path_buf(), header, options, file_len).in_file(path)
    }

    fn from_header(path: PathBuf, header: SigprocHeader, options: PayloadOptions, file_len: u64) -> Result<Self> {
        let nchans = header.nchans()?;
        let nifs = header.nifs()?;
        let nbits = header.nbits()?;
        let fch1 = header.record.require_f64("fch1")?;
        let foff = header.record.require_f64("foff")?;
        let bytes_per_spectrum = spectrum_bytes(nchans * nifs, nbits, &options)?;

        let data_len = file_len.saturating_sub(header.size as u64);
        if data_len % bytes_per_spectrum as u64 != 0 {
            return Err(Error::ShapeMismatch {
                expected: data_len - data_len % bytes_per_spectrum as u64,
                found: data_len,
                context: "filterbank spectra".into(),
            });
        }
        let nspectra = (data_len / bytes_per_spectrum as u64) as usize;
        let freqs = (0..nchans).map(|i| fch1 + foff * i as f64).collect();

        Ok(Filterbank {
            path,
            header,
            options,
            nchans,
            nifs,
            nbits,
            freqs,
            bytes_per_spectrum,
            nspectra,
        })
    }

    /// Read `count` spectra starting at spectrum `start`. The range is
    /// clipped to the end of the file.
    pub fn freq_slice(&self, start: usize, count: usize) -> Result<Spectra> {
        let stop = start.saturating_add(count).min(self.nspectra);
        let n = stop.saturating_sub(start);
        let mut raw = vec![0u8; n * self.bytes_per_spectrum];
        if n > 0 {
            let offset = self.header.size as u64 + (start * self.bytes_per_spectrum) as u64;
            let mut file = File::open(&self.path).map_err(Error::from).in_file(&self.path)?;
            file.seek(SeekFrom::Start(offset))
                .and_then(|_| file.read_exact(&mut raw))
                .map_err(Error::from)
                .in_file(&self.path)?;
        }
        let payload = decode_payload(&raw, self.nbits, &self.options).in_file(&self.path)?;
        Ok(Spectra {
            freqs: self.freqs.clone(),
            tsamp: self.header.tsamp()?,
            start_time: start as f64 * self.header.tsamp()?,
            nspectra: n,
            width: self.nchans * self.nifs,
            data: payload.data,
        })
    }

    /// Read the spectra between `start` and `stop` seconds.
    pub fn time_slice(&self, start: f64, stop: f64) -> Result<Spectra> {
        let tsamp = self.header.tsamp()?;
        let first = (start / tsamp).round().max(0.0) as usize;
        let last = (stop / tsamp).round().max(0.0) as usize;
        self.freq_slice(first, last.saturating_sub(first))
    }

    /// Read every spectrum.
    pub fn read_all(&self) -> Result<Spectra> {
        self.freq_slice(0, self.nspectra)
    }
}

fn spectrum_bytes(samples: usize, nbits: Option<u32>, options: &PayloadOptions) -> Result<usize> {
    let bytes = byte_count(samples, nbits, options)?;
    // Packed spectra must fill whole bytes.
    if sample_count(bytes, nbits, options)? != samples {
        return Err(Error::ShapeMismatch {
            expected: samples as u64,
            found: sample_count(bytes, nbits, options)? as u64,
            context: "samples per spectrum".into(),
        });
    }
    Ok(bytes)
}

/// Write a filterbank file from a header and spectrum-major samples.
pub fn write_filterbank(path: impl AsRef<Path>, header: &SigprocHeader, data: &[f32]) -> Result<()> {
    let path = path.as_ref();
    let options = PayloadOptions::default();
    let width = header.nchans()? * header.nifs()?;
    if data.len() % width != 0 {
        return Err(Error::ShapeMismatch {
            expected: (data.len() - data.len() % width) as u64,
            found: data.len() as u64,
            context: "filterbank samples".into(),
        }
        .in_file(path));
    }
    let mut bytes = header.encode().in_file(path)?;
    bytes.extend(encode_payload(data, header.nbits()?, &options).in_file(path)?);
    std::fs::write(path, bytes).map_err(Error::from).in_file(path)
}
