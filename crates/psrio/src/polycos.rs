//! TEMPO polynomial ephemerides (`polyco.dat`).
//!
//! A file is a sequence of blocks, each valid for `span` minutes around its
//! reference epoch `tmid`:
//!
//! ```text
//! psr  date  utc  tmid  dm  doppler  log10rms
//! rphase  f0  obs  span  ncoeff  obsfreq  [binphase]
//! c1  c2  c3
//! c4  ...
//! ```
//!
//! Within a block,
//! `dt = (t - tmid) * 1440`,
//! `phase = rphase + dt*60*f0 + c1 + c2*dt + c3*dt² + …` and
//! `freq = f0 + (c2 + 2*c3*dt + 3*c4*dt² + …) / 60`.

use std::fmt::Write as _;
use std::path::Path;

use log::{debug, warn};

use crate::error::{Error, Result, ResultExt};
use crate::value::{format_float, parse_float};

/// Scale of the Doppler column.
const DOPPLER_UNIT: f64 = 1e-4;
const MINUTES_PER_DAY: f64 = 1440.0;
const COEFFS_PER_ROW: usize = 3;

/// One polynomial ephemeris block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolycoBlock {
    pub psr: String,
    /// Date as written (`dd-mmm-yy`).
    pub date: String,
    /// UTC as written (`hhmmss.ss`).
    pub utc: String,
    /// Integer part of the reference MJD.
    pub tmid_int: i64,
    /// Fractional part of the reference MJD.
    pub tmid_frac: f64,
    pub dm: f64,
    /// Earth-motion Doppler shift in units of 1e-4.
    pub doppler_raw: f64,
    pub log10rms: f64,
    pub rphase: f64,
    /// Reference rotation frequency in Hz.
    pub f0: f64,
    pub obs: String,
    /// Validity span in minutes.
    pub span: i64,
    pub ncoeff: usize,
    /// Observing frequency in MHz.
    pub obsfreq: f64,
    pub binphase: Option<f64>,
    /// Coefficients with ragged rows padded to three columns.
    pub coeffs: Vec<f64>,
}

fn convert_err(field: &str, raw: &str, line: usize) -> Error {
    Error::convert(field, raw, Some(line))
}

fn float_at(tokens: &[&str], i: usize, field: &str, line: usize) -> Result<f64> {
    let raw = tokens.get(i).copied().unwrap_or("");
    parse_float(raw).ok_or_else(|| convert_err(field, raw, line))
}

fn int_at(tokens: &[&str], i: usize, field: &str, line: usize) -> Result<i64> {
    let raw = tokens.get(i).copied().unwrap_or("");
    raw.parse().map_err(|_| convert_err(field, raw, line))
}

fn str_at(tokens: &[&str], i: usize, field: &str, line: usize) -> Result<String> {
    tokens
        .get(i)
        .map(|s| s.to_string())
        .ok_or_else(|| convert_err(field, "", line))
}

/// Split `tmid` text into integer and fractional parts without going
/// through an `f64` for the whole value.
fn split_tmid(raw: &str, line: usize) -> Result<(i64, f64)> {
    let (int, frac) = raw.split_once('.').unwrap_or((raw, ""));
    let tmid_int = int.parse().map_err(|_| convert_err("tmid", raw, line))?;
    let tmid_frac = if frac.is_empty() {
        0.0
    } else {
        parse_float(&format!("0.{frac}")).ok_or_else(|| convert_err("tmid", raw, line))?
    };
    Ok((tmid_int, tmid_frac))
}

/// Split a glued `doppler-log10rms` token such as `-0.123-6.456`.
fn split_glued(raw: &str) -> Option<(&str, &str)> {
    let bytes = raw.as_bytes();
    let at = (1..bytes.len())
        .rev()
        .find(|&i| bytes[i] == b'-' && !matches!(bytes[i - 1], b'e' | b'E' | b'd' | b'D'))?;
    Some((&raw[..at], &raw[at..]))
}

impl PolycoBlock {
    /// Reference epoch as a single MJD.
    pub fn tmid(&self) -> f64 {
        self.tmid_int as f64 + self.tmid_frac
    }

    /// Doppler factor (dimensionless).
    pub fn doppler(&self) -> f64 {
        self.doppler_raw * DOPPLER_UNIT
    }

    /// Minutes from `tmid` to `mjd`.
    pub fn dt_minutes(&self, mjd: f64) -> f64 {
        let days = (mjd.trunc() - self.tmid_int as f64) + (mjd.fract() - self.tmid_frac);
        days * MINUTES_PER_DAY
    }

    /// Whether `mjd` lies within this block's span.
    pub fn contains(&self, mjd: f64) -> bool {
        self.dt_minutes(mjd).abs() <= self.span as f64 / 2.0
    }

    /// Predicted rotational phase (in turns) at `mjd`.
    pub fn predict_phase(&self, mjd: f64) -> f64 {
        let dt = self.dt_minutes(mjd);
        let poly = self.coeffs.iter().rev().fold(0.0, |acc, c| acc * dt + c);
        self.rphase + dt * 60.0 * self.f0 + poly
    }

    /// Predicted apparent spin frequency (Hz) at `mjd`.
    pub fn predict_freq(&self, mjd: f64) -> f64 {
        let dt = self.dt_minutes(mjd);
        let deriv = self
            .coeffs
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .fold(0.0, |acc, (i, c)| acc * dt + i as f64 * c);
        self.f0 + deriv / 60.0
    }

    fn parse_header(first: &str, second: &str, line: usize) -> Result<Self> {
        let t: Vec<&str> = first.split_whitespace().collect();
        let (tmid_int, tmid_frac) = split_tmid(t.get(3).copied().unwrap_or(""), line)?;
        let (doppler_raw, log10rms) = match t.len() {
            7.. => (float_at(&t, 5, "doppler", line)?, float_at(&t, 6, "log10rms", line)?),
            6 => {
                let (d, r) = split_glued(t[5]).ok_or_else(|| convert_err("doppler", t[5], line))?;
                (
                    parse_float(d).ok_or_else(|| convert_err("doppler", d, line))?,
                    parse_float(r).ok_or_else(|| convert_err("log10rms", r, line))?,
                )
            }
            _ => return Err(convert_err("log10rms", first.trim(), line)),
        };

        let s: Vec<&str> = second.split_whitespace().collect();
        let l2 = line + 1;
        let ncoeff = int_at(&s, 4, "ncoeff", l2)?;
        Ok(PolycoBlock {
            psr: str_at(&t, 0, "psr", line)?,
            date: str_at(&t, 1, "date", line)?,
            utc: str_at(&t, 2, "utc", line)?,
            tmid_int,
            tmid_frac,
            dm: float_at(&t, 4, "dm", line)?,
            doppler_raw,
            log10rms,
            rphase: float_at(&s, 0, "rphase", l2)?,
            f0: float_at(&s, 1, "f0", l2)?,
            obs: str_at(&s, 2, "obs", l2)?,
            span: int_at(&s, 3, "span", l2)?,
            ncoeff: usize::try_from(ncoeff).map_err(|_| convert_err("ncoeff", s[4], l2))?,
            obsfreq: float_at(&s, 5, "obsfreq", l2)?,
            binphase: s.get(6).and_then(|v| parse_float(v)),
            coeffs: Vec::new(),
        })
    }

    fn write_into(&self, out: &mut String) {
        let _ = writeln!(
            out,
            "{:<10}{:>10}{:>12}{:>20} {:>20} {:>6} {:>7}",
            self.psr,
            self.date,
            self.utc,
            self.tmid_text(),
            format_float(self.dm),
            format_float(self.doppler_raw),
            format_float(self.log10rms),
        );
        let _ = write!(
            out,
            "{:>20} {:>17} {:>4} {:>5} {:>4} {:>9}",
            format_float(self.rphase),
            format_float(self.f0),
            self.obs,
            self.span,
            self.ncoeff,
            format_float(self.obsfreq),
        );
        if let Some(bp) = self.binphase {
            let _ = write!(out, " {:>6}", format_float(bp));
        }
        out.push('\n');
        for row in self.coeffs.chunks(COEFFS_PER_ROW) {
            for c in row {
                let _ = write!(out, " {c:>24.17e}");
            }
            out.push('\n');
        }
    }

    /// `tmid` rendered from its two parts.
    fn tmid_text(&self) -> String {
        let frac = format!("{:.11}", self.tmid_frac);
        match frac.strip_prefix('0') {
            Some(rest) => format!("{}{rest}", self.tmid_int),
            // Rounded up to a whole day.
            None => format!("{}.00000000000", self.tmid_int + 1),
        }
    }
}

/// All blocks of a polyco file, in file order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolycoTable {
    pub blocks: Vec<PolycoBlock>,
}

fn is_coeff_row(tokens: &[&str]) -> bool {
    !tokens.is_empty() && tokens.len() <= COEFFS_PER_ROW
}

impl PolycoTable {
    pub fn parse(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text.lines().collect();
        let mut blocks: Vec<PolycoBlock> = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            if lines[i].trim().is_empty() {
                i += 1;
                continue;
            }
            let lineno = i + 1;
            let second = lines.get(i + 1).copied().unwrap_or("");
            let mut block = PolycoBlock::parse_header(lines[i], second, lineno)?;
            i += 2;

            let mut coeffs = Vec::new();
            while let Some(line) = lines.get(i) {
                let tokens: Vec<&str> = line.split_whitespace().collect();
                if !is_coeff_row(&tokens) {
                    break;
                }
                let mut row = tokens
                    .iter()
                    .map(|t| parse_float(t).ok_or_else(|| convert_err("coeff", t, i + 1)))
                    .collect::<Result<Vec<f64>>>()?;
                row.resize(COEFFS_PER_ROW, 0.0);
                coeffs.extend(row);
                i += 1;
            }
            block.coeffs = coeffs;

            if let Some(prev) = blocks.last() {
                if prev.span != block.span {
                    warn!(
                        "polyco data span changes from {} to {} minutes at line {lineno}",
                        prev.span, block.span
                    );
                }
            }
            blocks.push(block);
        }
        debug!("read {} polyco blocks", blocks.len());
        Ok(PolycoTable { blocks })
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(Error::from)
            .in_file(path)?;
        Self::parse(&text).in_file(path)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            block.write_into(&mut out);
        }
        out
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_text())
            .map_err(Error::from)
            .in_file(path)
    }

    /// Pulsar name of the first block.
    pub fn psr(&self) -> Option<&str> {
        self.blocks.first().map(|b| b.psr.as_str())
    }

    /// Reference epochs of every block.
    pub fn tmids(&self) -> Vec<f64> {
        self.blocks.iter().map(PolycoBlock::tmid).collect()
    }

    /// The block covering `mjd`, preferring the one with the closest `tmid`.
    pub fn select(&self, mjd: f64) -> Option<&PolycoBlock> {
        self.blocks
            .iter()
            .filter(|b| b.contains(mjd))
            .min_by(|a, b| a.dt_minutes(mjd).abs().total_cmp(&b.dt_minutes(mjd).abs()))
    }

    pub fn predict_phase(&self, mjd: f64) -> Option<f64> {
        self.select(mjd).map(|b| b.predict_phase(mjd))
    }

    pub fn predict_freq(&self, mjd: f64) -> Option<f64> {
        self.select(mjd).map(|b| b.predict_freq(mjd))
    }
}
