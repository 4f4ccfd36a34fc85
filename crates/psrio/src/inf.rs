//! PRESTO `.inf` metadata files.
//!
//! An INF file is a list of ` description  =  value` lines describing a
//! PRESTO time series or spectrum, optionally followed by on/off bin pairs
//! (when the data has breaks) and a free-text notes block.

use std::path::Path;

use crate::error::{Error, Result, ResultExt};
use crate::record::HeaderRecord;
use crate::text::{parse_table, write_table, TextField, TextHeader, TextKind, TextTable};
use crate::value::Value;

use TextKind::{Flag, Float, Int, Str};

/// INF description strings. Where PRESTO versions differ the first
/// spelling is the one written.
pub static INF_FIELDS: &[TextField] = &[
    TextField::new("Data file name without suffix", "bsname", Str),
    TextField::new("Telescope used", "telescope", Str),
    TextField::new("Instrument used", "instrument", Str),
    TextField::new("Object being observed", "object", Str),
    TextField::new("J2000 Right Ascension (hh:mm:ss.ssss)", "rastr", Str),
    TextField::new("J2000 Declination     (dd:mm:ss.ssss)", "decstr", Str),
    TextField::new("Data observed by", "observer", Str),
    TextField::new("Epoch of observation (MJD)", "mjd", Float),
    TextField::new("Barycentered?           (1 yes, 0 no)", "bary", Flag),
    TextField::new("Barycentered?           (1=yes, 0=no)", "bary", Flag),
    TextField::new("Number of bins in the time series", "nsamp", Int),
    TextField::new("Width of each time series bin (sec)", "tsamp", Float),
    TextField::new("Any breaks in the data? (1 yes, 0 no)", "breaks", Flag),
    TextField::new("Any breaks in the data? (1=yes, 0=no)", "breaks", Flag),
    TextField::new("Type of observation (EM band)", "emband", Str),
    TextField::new("Beam diameter (arcsec)", "bdiam", Float),
    TextField::new("Dispersion measure (cm-3 pc)", "dm", Float),
    TextField::new("Central freq of low channel (MHz)", "cfreq", Float),
    TextField::new("Central freq of low channel (Mhz)", "cfreq", Float),
    TextField::new("Total bandwidth (MHz)", "bw", Float),
    TextField::new("Total bandwidth (Mhz)", "bw", Float),
    TextField::new("Number of channels", "nchan", Int),
    TextField::new("Channel bandwidth (MHz)", "chanwid", Float),
    TextField::new("Channel bandwidth (Mhz)", "chanwid", Float),
    TextField::new("Field-of-view diameter (arcsec)", "fov", Float),
    TextField::new("Central energy (kev)", "ce", Float),
    TextField::new("Energy bandpass (kev)", "bpe", Float),
    TextField::new("Photometric filter used", "filter", Str),
    TextField::new("Central wavelength (nm)", "cwaveln", Float),
    TextField::new("Bandpass (nm)", "bandpass", Float),
    TextField::new("Data analyzed by", "analyst", Str),
];

pub static INF_TABLE: TextTable = TextTable {
    fields: INF_FIELDS,
    comment: None,
    width: 37,
    gap: "  ",
    allow_null: false,
    breaks: Some("breaks"),
    notes_heading: Some("Any additional notes:"),
};

/// EM band value for radio observations.
pub const RADIO: &str = "Radio";

/// Contents of an `.inf` file.
///
/// Fields PRESTO writes only for some observation types are optional.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Inf {
    pub bsname: String,
    pub telescope: String,
    pub instrument: Option<String>,
    pub object: Option<String>,
    pub rastr: Option<String>,
    pub decstr: Option<String>,
    pub observer: Option<String>,
    pub mjd: Option<f64>,
    pub bary: Option<bool>,
    pub nsamp: i64,
    pub tsamp: f64,
    pub breaks: bool,
    /// Inclusive sample ranges of valid data when `breaks` is set.
    pub onoffs: Vec<(i64, i64)>,
    pub emband: String,
    pub bdiam: Option<f64>,
    pub dm: Option<f64>,
    pub cfreq: Option<f64>,
    pub bw: Option<f64>,
    pub nchan: Option<i64>,
    pub chanwid: Option<f64>,
    pub fov: Option<f64>,
    pub ce: Option<f64>,
    pub bpe: Option<f64>,
    pub filter: Option<String>,
    pub cwaveln: Option<f64>,
    pub bandpass: Option<f64>,
    pub analyst: String,
    pub notes: Vec<String>,
}

fn take_str(rec: &mut HeaderRecord, key: &str) -> Option<String> {
    match rec.remove(key)? {
        Value::Str(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn take_f64(rec: &mut HeaderRecord, key: &str) -> Option<f64> {
    rec.remove(key).and_then(|v| v.as_f64())
}

fn take_i64(rec: &mut HeaderRecord, key: &str) -> Option<i64> {
    rec.remove(key).and_then(|v| v.as_i64())
}

fn take_bool(rec: &mut HeaderRecord, key: &str) -> Option<bool> {
    rec.remove(key).and_then(|v| v.as_bool())
}

impl Inf {
    /// Parse INF text.
    pub fn parse(text: &str) -> Result<Self> {
        Self::from_header(parse_table(text, &INF_TABLE)?)
    }

    /// Read an `.inf` file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(Error::from)
            .in_file(path)?;
        Self::parse(&text).in_file(path)
    }

    /// Render the INF text.
    pub fn to_text(&self) -> String {
        write_table(&self.to_header(), &INF_TABLE)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_text())
            .map_err(Error::from)
            .in_file(path)
    }

    /// Whether this describes a radio observation.
    pub fn is_radio(&self) -> bool {
        self.emband == RADIO
    }

    fn from_header(header: TextHeader) -> Result<Self> {
        let TextHeader {
            mut record,
            onoffs,
            notes,
        } = header;
        let rec = &mut record;
        Ok(Inf {
            bsname: take_str(rec, "bsname").ok_or(Error::MissingField("bsname"))?,
            telescope: take_str(rec, "telescope").ok_or(Error::MissingField("telescope"))?,
            instrument: take_str(rec, "instrument"),
            object: take_str(rec, "object"),
            rastr: take_str(rec, "rastr"),
            decstr: take_str(rec, "decstr"),
            observer: take_str(rec, "observer"),
            mjd: take_f64(rec, "mjd"),
            bary: take_bool(rec, "bary"),
            nsamp: take_i64(rec, "nsamp").ok_or(Error::MissingField("nsamp"))?,
            tsamp: take_f64(rec, "tsamp").ok_or(Error::MissingField("tsamp"))?,
            breaks: take_bool(rec, "breaks").unwrap_or(false),
            onoffs,
            emband: take_str(rec, "emband").ok_or(Error::MissingField("emband"))?,
            bdiam: take_f64(rec, "bdiam"),
            dm: take_f64(rec, "dm"),
            cfreq: take_f64(rec, "cfreq"),
            bw: take_f64(rec, "bw"),
            nchan: take_i64(rec, "nchan"),
            chanwid: take_f64(rec, "chanwid"),
            fov: take_f64(rec, "fov"),
            ce: take_f64(rec, "ce"),
            bpe: take_f64(rec, "bpe"),
            filter: take_str(rec, "filter"),
            cwaveln: take_f64(rec, "cwaveln"),
            bandpass: take_f64(rec, "bandpass"),
            analyst: take_str(rec, "analyst").unwrap_or_default(),
            notes,
        })
    }

    /// The header in PRESTO's field order.
    fn to_header(&self) -> TextHeader {
        let mut rec = HeaderRecord::new();
        rec.insert("bsname", Value::Str(self.bsname.clone()));
        rec.insert("telescope", Value::Str(self.telescope.clone()));
        put_str(&mut rec, "instrument", &self.instrument);
        put_str(&mut rec, "object", &self.object);
        put_str(&mut rec, "rastr", &self.rastr);
        put_str(&mut rec, "decstr", &self.decstr);
        put_str(&mut rec, "observer", &self.observer);
        put_f64(&mut rec, "mjd", self.mjd);
        if let Some(b) = self.bary {
            rec.insert("bary", Value::Bool(b));
        }
        rec.insert("nsamp", Value::Int64(self.nsamp));
        rec.insert("tsamp", Value::Float64(self.tsamp));
        rec.insert("breaks", Value::Bool(self.breaks));
        rec.insert("emband", Value::Str(self.emband.clone()));
        put_f64(&mut rec, "bdiam", self.bdiam);
        put_f64(&mut rec, "dm", self.dm);
        put_f64(&mut rec, "cfreq", self.cfreq);
        put_f64(&mut rec, "bw", self.bw);
        if let Some(n) = self.nchan {
            rec.insert("nchan", Value::Int64(n));
        }
        put_f64(&mut rec, "chanwid", self.chanwid);
        put_f64(&mut rec, "fov", self.fov);
        put_f64(&mut rec, "ce", self.ce);
        put_f64(&mut rec, "bpe", self.bpe);
        put_str(&mut rec, "filter", &self.filter);
        put_f64(&mut rec, "cwaveln", self.cwaveln);
        put_f64(&mut rec, "bandpass", self.bandpass);
        rec.insert("analyst", Value::Str(self.analyst.clone()));
        TextHeader {
            record: rec,
            onoffs: self.onoffs.clone(),
            notes: self.notes.clone(),
        }
    }
}

fn put_str(rec: &mut HeaderRecord, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        rec.insert(key, Value::Str(v.clone()));
    }
}

fn put_f64(rec: &mut HeaderRecord, key: &str, value: Option<f64>) {
    if let Some(v) = value {
        rec.insert(key, Value::Float64(v));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "\
 Data file name without suffix          =  test
 Telescope used                         =  GMRT
 Instrument used                        =  Unknown
 Object being observed                  =  J2144-3933
 J2000 Right Ascension (hh:mm:ss.ssss)  =  21:44:00.0000
 J2000 Declination     (dd:mm:ss.ssss)  =  -39:33:00.0000
 Data observed by                       =  Unknown
 Epoch of observation (MJD)             =  58017.604258730986
 Barycentered?           (1=yes, 0=no)  =  1
 Number of bins in the time series      =  3600000
 Width of each time series bin (sec)    =  0.00016384
 Any breaks in the data? (1=yes, 0=no)  =  0
 Type of observation (EM band)          =  Radio
 Beam diameter (arcsec)                 =  3600
 Dispersion measure (cm-3 pc)           =  3.35
 Central freq of low channel (Mhz)      =  300.024926
 Total bandwidth (Mhz)                  =  199.999488
 Number of channels                     =  4096
 Channel bandwidth (Mhz)                =  0.048828
 Data analyzed by                       =  guest
 Any additional notes:
    Project ID unset, Date: 2017-09-21T14:23:32.5098.
    2 polns were summed.  Samples have 8 bits.
";

    #[test]
    fn parse_sample() {
        let inf = Inf::parse(SAMPLE).unwrap();
        assert_eq!(inf.bsname, "test");
        assert_eq!(inf.telescope, "GMRT");
        assert_eq!(inf.instrument.as_deref(), Some("Unknown"));
        assert_eq!(inf.rastr.as_deref(), Some("21:44:00.0000"));
        assert_eq!(inf.decstr.as_deref(), Some("-39:33:00.0000"));
        assert_eq!(inf.bary, Some(true));
        assert!(!inf.breaks);
        assert_eq!(inf.nsamp, 3_600_000);
        assert_eq!(inf.nchan, Some(4096));
        assert_eq!(inf.mjd, Some(58017.604258730986));
        assert_eq!(inf.cfreq, Some(300.024926));
        assert_eq!(inf.bdiam, Some(3600.0));
        assert!(inf.is_radio());
        assert_eq!(
            inf.notes,
            vec![
                "Project ID unset, Date: 2017-09-21T14:23:32.5098.",
                "2 polns were summed.  Samples have 8 bits.",
            ]
        );
    }

    #[test]
    fn text_roundtrip() {
        let inf = Inf::parse(SAMPLE).unwrap();
        let text = inf.to_text();
        assert!(text.contains(" Central freq of low channel (MHz)      =  300.024926\n"));
        assert_eq!(Inf::parse(&text).unwrap(), inf);
    }

    #[test]
    fn missing_required_field() {
        let err = Inf::parse(" Telescope used  =  GMRT\n").unwrap_err();
        assert!(matches!(err, Error::MissingField("bsname")));
    }

    #[test]
    fn read_error_carries_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.inf");
        std::fs::write(&path, " Number of channels  =  lots\n").unwrap();
        let err = Inf::read(&path).unwrap_err();
        assert_eq!(err.path(), Some(path.as_path()));
        assert!(matches!(err.root(), Error::TypeConversion { .. }));
    }
}
