//! TEMPO `.par` timing-model parameter files.
//!
//! Each line is `KEY value [fit] [error]`. Known keys are converted by
//! [`PAR_SCHEMA`]; anything else is classified from the text.

use std::path::Path;

use crate::error::{Error, Result, ResultExt};
use crate::text::{parse_positional, write_positional, ParSchema, PositionalText, ERROR_SUFFIX};
use crate::value::Value;

pub static PAR_SCHEMA: ParSchema = ParSchema {
    strings: &["PSRJ", "PSRB", "PSR", "NAME", "SURVEY", "OSURVEY", "UNITS", "CLK", "EPHEM", "TZRSITE", "BINARY"],
    integers: &["EPHVER", "NTOA", "NITS", "DATE"],
    floats: &[
        "F0", "F1", "F2", "P0", "P1", "DM", "DM1", "PEPOCH", "POSEPOCH", "DMEPOCH", "START", "FINISH",
        "TZRMJD", "TZRFRQ", "PMRA", "PMDEC", "PX", "ELONG", "ELAT", "PB", "A1", "E", "ECC", "OM", "T0",
        "TASC", "EPS1", "EPS2", "S400", "S800", "S1400", "W50", "W10", "RM", "TRES", "CHI2R",
    ],
};

/// Lines starting with this are comments.
const COMMENT: char = '#';

/// Contents of a `.par` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParFile {
    pub params: PositionalText,
}

impl ParFile {
    pub fn parse(text: &str) -> Result<Self> {
        // Blank out comment lines so line numbers in errors stay accurate.
        let cleaned: String = text
            .lines()
            .map(|line| {
                let t = line.trim_start();
                if t.starts_with(COMMENT) || t.starts_with("C ") {
                    ""
                } else {
                    line
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(ParFile {
            params: parse_positional(&cleaned, &PAR_SCHEMA)?,
        })
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(Error::from)
            .in_file(path)?;
        Self::parse(&text).in_file(path)
    }

    pub fn to_text(&self) -> String {
        write_positional(&self.params)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_text())
            .map_err(Error::from)
            .in_file(path)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.record.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.params.record.get_f64(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.params.record.get_str(key)
    }

    /// Uncertainty of `key`, if one was given.
    pub fn error(&self, key: &str) -> Option<f64> {
        self.params.record.get_f64(&format!("{key}{ERROR_SUFFIX}"))
    }

    /// Whether `key` is fitted, if the file says.
    pub fn fit(&self, key: &str) -> Option<bool> {
        self.params.fits.get(key).map(|&f| f != 0)
    }

    /// Set a parameter, replacing any existing value in place.
    pub fn set(&mut self, key: &str, value: Value) {
        self.params.record.insert(key, value);
    }

    /// The pulsar name from `PSRJ`, `PSRB`, `PSR` or `NAME`.
    pub fn name(&self) -> Option<&str> {
        ["PSRJ", "PSRB", "PSR", "NAME"]
            .iter()
            .find_map(|k| self.get_str(k))
    }

    /// Spin frequency in Hz, from `F0` or else `1 / P0`.
    pub fn f0(&self) -> Option<f64> {
        self.get_f64("F0")
            .or_else(|| self.get_f64("P0").filter(|p| *p != 0.0).map(|p| 1.0 / p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "\
PSRJ           J2144-3933
NAME           J2144-3933
RAJ            21:44:12.060404          4.500e-05
DECJ           -39:33:56.88504          3.200e-04
DM             3.35                     1.000e-02
PEPOCH         49016.0000
F0             0.11751119527          1 5.000e-11
F1             -6.85E-18                7.000e-20
SURVEY         pks70
S400           16
W10            65                       1.000e+01
RM             -2                       1.000e+01
DATE           1996
OSURVEY        000000004000
EPHVER         2
UNITS          TDB
";

    #[test]
    fn parse_sample() {
        let par = ParFile::parse(SAMPLE).unwrap();
        assert_eq!(par.name(), Some("J2144-3933"));
        assert_eq!(par.get_str("RAJ"), Some("21:44:12.060404"));
        assert_eq!(par.error("RAJ"), Some(4.5e-5));
        assert_eq!(par.get_f64("DM"), Some(3.35));
        assert_eq!(par.error("DM"), Some(0.01));
        assert_eq!(par.fit("DM"), None);
        assert_eq!(par.get_f64("F0"), Some(0.11751119527));
        assert_eq!(par.fit("F0"), Some(true));
        assert_eq!(par.error("F0"), Some(5e-11));
        assert_eq!(par.get_str("SURVEY"), Some("pks70"));
        assert_eq!(par.get("S400"), Some(&Value::Float64(16.0)));
        assert_eq!(par.get("W10"), Some(&Value::Float64(65.0)));
        assert_eq!(par.get("RM"), Some(&Value::Float64(-2.0)));
        assert_eq!(par.get("DATE"), Some(&Value::Int64(1996)));
        assert_eq!(par.get_str("OSURVEY"), Some("000000004000"));
        assert_eq!(par.get("EPHVER"), Some(&Value::Int64(2)));
        assert_eq!(par.get_str("UNITS"), Some("TDB"));
        assert_eq!(par.f0(), Some(0.11751119527));
    }

    #[test]
    fn comments_are_skipped() {
        let par = ParFile::parse("# generated\nC old style\nF0 2.5\n").unwrap();
        assert_eq!(par.get_f64("F0"), Some(2.5));
        assert!(par.get("#").is_none());
        assert!(par.get("C").is_none());
    }

    #[test]
    fn schema_error_reports_line() {
        let err = ParFile::parse("# header\nEPHVER two\n").unwrap_err();
        assert!(matches!(err, Error::TypeConversion { line: Some(2), .. }));
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("J2144-3933.par");
        let par = ParFile::parse(SAMPLE).unwrap();
        par.write(&path).unwrap();
        let back = ParFile::read(&path).unwrap();
        assert_eq!(back, par);
        assert!(back.to_text().starts_with("PSRJ         J2144-3933\n"));
    }

    #[test]
    fn f0_from_period() {
        let par = ParFile::parse("P0 0.5\n").unwrap();
        assert_eq!(par.f0(), Some(2.0));
    }
}
