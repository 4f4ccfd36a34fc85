//! PRESTO time series (`.dat`) and Fourier spectra (`.fft`).
//!
//! Both are raw little-endian `f32` arrays with no header of their own. All
//! metadata lives in the `.inf` file next to them, which is required.

use std::path::Path;

use log::warn;

use crate::companion::{replace_suffix, require};
use crate::error::{Error, Result, ResultExt};
use crate::inf::Inf;
use crate::payload::{decode_payload, encode_payload, PayloadOptions};

const INF_SUFFIX: &str = "inf";

/// A PRESTO time series.
#[derive(Debug, Clone, PartialEq)]
pub struct Dat {
    pub inf: Inf,
    pub data: Vec<f32>,
}

/// A PRESTO Fourier spectrum, stored as interleaved real/imaginary parts.
#[derive(Debug, Clone, PartialEq)]
pub struct Fft {
    pub inf: Inf,
    pub data: Vec<f32>,
}

impl Fft {
    /// Number of complex frequency bins.
    pub fn num_bins(&self) -> usize {
        self.data.len() / 2
    }

    /// The spectrum as `(re, im)` pairs.
    pub fn bins(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.data.chunks_exact(2).map(|c| (c[0], c[1]))
    }

    /// Power (`re² + im²`) in each bin.
    pub fn powers(&self) -> Vec<f32> {
        self.bins().map(|(re, im)| re * re + im * im).collect()
    }
}

fn read_samples(path: &Path, inf: &Inf) -> Result<Vec<f32>> {
    let bytes = std::fs::read(path).map_err(Error::from).in_file(path)?;
    let payload = decode_payload(&bytes, None, &PayloadOptions::default()).in_file(path)?;
    if payload.data.len() as i64 != inf.nsamp {
        warn!(
            "{}: {} samples on disk but the .inf lists {}",
            path.display(),
            payload.data.len(),
            inf.nsamp
        );
    }
    Ok(payload.data)
}

fn write_samples(path: &Path, inf: &Inf, data: &[f32]) -> Result<()> {
    let bytes = encode_payload(data, None, &PayloadOptions::default())?;
    std::fs::write(path, bytes).map_err(Error::from).in_file(path)?;
    inf.write(replace_suffix(path, INF_SUFFIX))
}

fn read_pair(path: &Path, inf_path: &Path) -> Result<(Inf, Vec<f32>)> {
    let inf_path = require(inf_path.to_path_buf()).in_file(path)?;
    let inf = Inf::read(inf_path)?;
    let data = read_samples(path, &inf)?;
    Ok((inf, data))
}

/// Read a `.dat` file and its sibling `.inf`.
pub fn read_dat(path: impl AsRef<Path>) -> Result<Dat> {
    let path = path.as_ref();
    read_dat_with_inf(path, replace_suffix(path, INF_SUFFIX))
}

/// Read a `.dat` file using an explicit `.inf` path.
pub fn read_dat_with_inf(path: impl AsRef<Path>, inf: impl AsRef<Path>) -> Result<Dat> {
    let (inf, data) = read_pair(path.as_ref(), inf.as_ref())?;
    Ok(Dat { inf, data })
}

/// Write a `.dat` file and its sibling `.inf`.
pub fn write_dat(path: impl AsRef<Path>, dat: &Dat) -> Result<()> {
    write_samples(path.as_ref(), &dat.inf, &dat.data)
}

/// Read a `.fft` file and its sibling `.inf`.
pub fn read_fft(path: impl AsRef<Path>) -> Result<Fft> {
    let path = path.as_ref();
    read_fft_with_inf(path, replace_suffix(path, INF_SUFFIX))
}

/// Read a `.fft` file using an explicit `.inf` path.
pub fn read_fft_with_inf(path: impl AsRef<Path>, inf: impl AsRef<Path>) -> Result<Fft> {
    let (inf, data) = read_pair(path.as_ref(), inf.as_ref())?;
    Ok(Fft { inf, data })
}

/// Write a `.fft` file and its sibling `.inf`.
pub fn write_fft(path: impl AsRef<Path>, fft: &Fft) -> Result<()> {
    write_samples(path.as_ref(), &fft.inf, &fft.data)
}
