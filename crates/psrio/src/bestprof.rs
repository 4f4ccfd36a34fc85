//! PRESTO `.bestprof` fold summaries.
//!
//! A BESTPROF file is a `#`-commented `description = value` header closed
//! by a line of `#` characters, followed by one `index  value` row per
//! profile bin. Periods and their derivatives carry a `+/- error` suffix,
//! and fields PRESTO could not compute are written as `N/A`.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::OnceLock;

use regex_lite::Regex;

use crate::error::{Error, Result, ResultExt};
use crate::record::HeaderRecord;
use crate::text::{parse_table, write_table, TextField, TextHeader, TextKind, TextTable};
use crate::value::{format_float, parse_float, Value};

use TextKind::{Float, Int, Measured, Significance, Str};

pub static BESTPROF_FIELDS: &[TextField] = &[
    TextField::new("Input file", "fname", Str),
    TextField::new("Candidate", "candname", Str),
    TextField::new("Telescope", "telescope", Str),
    TextField::new("Epoch_topo", "eptopo", Float),
    TextField::new("Epoch_bary", "epbary", Float),
    TextField::new("Epoch_bary (MJD)", "epbary", Float),
    TextField::new("T_sample", "tsamp", Float),
    TextField::new("Data Folded", "nsamp", Float),
    TextField::new("Data Avg", "davg", Float),
    TextField::new("Data StdDev", "dstd", Float),
    TextField::new("Profile Bins", "nbins", Int),
    TextField::new("Profile Avg", "profavg", Float),
    TextField::new("Profile StdDev", "profstd", Float),
    TextField::new("Reduced chi-sqr", "chisqr", Float),
    TextField::new("Prob(Noise)", "prob", Significance),
    TextField::new("Best DM", "dm", Float),
    TextField::new("P_topo (ms)", "ptopo", Measured),
    TextField::new("P'_topo (s/s)", "pdtopo", Measured),
    TextField::new("P''_topo (s/s^2)", "pddtopo", Measured),
    TextField::new("P_bary (ms)", "pbary", Measured),
    TextField::new("P'_bary (s/s)", "pdbary", Measured),
    TextField::new("P''_bary (s/s^2)", "pddbary", Measured),
    TextField::new("P_orb (s)", "porb", Float),
    TextField::new("asin(i)/c (s)", "asinc", Float),
    TextField::new("eccentricity", "eccen", Float),
    TextField::new("w (rad)", "wrad", Float),
    TextField::new("T_peri", "tperi", Float),
];

pub static BESTPROF_TABLE: TextTable = TextTable {
    fields: BESTPROF_FIELDS,
    comment: Some('#'),
    width: 17,
    gap: "",
    allow_null: true,
    breaks: None,
    notes_heading: None,
};

const SEPARATOR_WIDTH: usize = 54;

fn row_regex() -> &'static Regex {
    static ROW_ONCE: OnceLock<Regex> = OnceLock::new();
    ROW_ONCE.get_or_init(|| Regex::new(r"^\s+\d+\s+(.+)$").unwrap())
}

/// Contents of a `.bestprof` file. Every header field is optional since
/// PRESTO writes `N/A` for values it did not compute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bestprof {
    pub input_file: Option<String>,
    pub candidate: Option<String>,
    pub telescope: Option<String>,
    pub epoch_topo: Option<f64>,
    pub epoch_bary: Option<f64>,
    pub t_sample: Option<f64>,
    pub data_folded: Option<f64>,
    pub data_avg: Option<f64>,
    pub data_stddev: Option<f64>,
    pub profile_bins: Option<i64>,
    pub profile_avg: Option<f64>,
    pub profile_stddev: Option<f64>,
    pub reduced_chisqr: Option<f64>,
    /// Probability that the profile is noise.
    pub prob_noise: Option<f64>,
    /// Equivalent Gaussian significance of `prob_noise`.
    pub sigma: Option<f64>,
    pub best_dm: Option<f64>,
    /// Topocentric period in ms.
    pub p_topo: Option<f64>,
    pub p_topo_err: Option<f64>,
    pub pd_topo: Option<f64>,
    pub pd_topo_err: Option<f64>,
    pub pdd_topo: Option<f64>,
    pub pdd_topo_err: Option<f64>,
    /// Barycentric period in ms.
    pub p_bary: Option<f64>,
    pub p_bary_err: Option<f64>,
    pub pd_bary: Option<f64>,
    pub pd_bary_err: Option<f64>,
    pub pdd_bary: Option<f64>,
    pub pdd_bary_err: Option<f64>,
    pub p_orb: Option<f64>,
    pub asini_c: Option<f64>,
    pub eccentricity: Option<f64>,
    pub w_rad: Option<f64>,
    pub t_peri: Option<f64>,
    /// The folded profile, one value per bin.
    pub profile: Vec<f32>,
}

impl Bestprof {
    /// Parse BESTPROF text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut header = String::new();
        let mut profile = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if line.starts_with('#') {
                if !line.trim_end().chars().all(|c| c == '#') {
                    header.push_str(line);
                    header.push('\n');
                }
                continue;
            }
            let Some(caps) = row_regex().captures(line) else {
                continue;
            };
            let raw = caps[1].trim();
            let value = parse_float(raw).ok_or_else(|| Error::convert("profile", raw, Some(idx + 1)))?;
            profile.push(value as f32);
        }
        let header = parse_table(&header, &BESTPROF_TABLE)?;
        Ok(Self::from_record(&header.record, profile))
    }

    /// Read a `.bestprof` file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(Error::from)
            .in_file(path)?;
        Self::parse(&text).in_file(path)
    }

    /// Render the BESTPROF text.
    pub fn to_text(&self) -> String {
        let header = TextHeader {
            record: self.to_record(),
            ..Default::default()
        };
        let mut text = write_table(&header, &BESTPROF_TABLE);
        text.push_str(&"#".repeat(SEPARATOR_WIDTH));
        text.push('\n');
        for (ind, point) in self.profile.iter().enumerate() {
            let _ = writeln!(text, "{ind:>5}  {}", format_float(f64::from(*point)));
        }
        text
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_text())
            .map_err(Error::from)
            .in_file(path)
    }

    fn from_record(rec: &HeaderRecord, profile: Vec<f32>) -> Self {
        let f = |key: &str| rec.get_f64(key);
        let s = |key: &str| rec.get_str(key).map(str::to_string);
        Bestprof {
            input_file: s("fname"),
            candidate: s("candname"),
            telescope: s("telescope"),
            epoch_topo: f("eptopo"),
            epoch_bary: f("epbary"),
            t_sample: f("tsamp"),
            data_folded: f("nsamp"),
            data_avg: f("davg"),
            data_stddev: f("dstd"),
            profile_bins: rec.get_i64("nbins"),
            profile_avg: f("profavg"),
            profile_stddev: f("profstd"),
            reduced_chisqr: f("chisqr"),
            prob_noise: f("prob"),
            sigma: f("probsigma"),
            best_dm: f("dm"),
            p_topo: f("ptopo"),
            p_topo_err: f("ptopoerr"),
            pd_topo: f("pdtopo"),
            pd_topo_err: f("pdtopoerr"),
            pdd_topo: f("pddtopo"),
            pdd_topo_err: f("pddtopoerr"),
            p_bary: f("pbary"),
            p_bary_err: f("pbaryerr"),
            pd_bary: f("pdbary"),
            pd_bary_err: f("pdbaryerr"),
            pdd_bary: f("pddbary"),
            pdd_bary_err: f("pddbaryerr"),
            p_orb: f("porb"),
            asini_c: f("asinc"),
            eccentricity: f("eccen"),
            w_rad: f("wrad"),
            t_peri: f("tperi"),
            profile,
        }
    }

    fn to_record(&self) -> HeaderRecord {
        let mut rec = HeaderRecord::new();
        let put_s = |rec: &mut HeaderRecord, key: &str, v: &Option<String>| {
            rec.insert(key, v.clone().map_or(Value::Null, Value::Str));
        };
        put_s(&mut rec, "fname", &self.input_file);
        put_s(&mut rec, "candname", &self.candidate);
        put_s(&mut rec, "telescope", &self.telescope);
        put_f(&mut rec, "eptopo", self.epoch_topo);
        put_f(&mut rec, "epbary", self.epoch_bary);
        put_f(&mut rec, "tsamp", self.t_sample);
        put_f(&mut rec, "nsamp", self.data_folded);
        put_f(&mut rec, "davg", self.data_avg);
        put_f(&mut rec, "dstd", self.data_stddev);
        rec.insert("nbins", self.profile_bins.map_or(Value::Null, Value::Int64));
        put_f(&mut rec, "profavg", self.profile_avg);
        put_f(&mut rec, "profstd", self.profile_stddev);
        put_f(&mut rec, "chisqr", self.reduced_chisqr);
        put_f(&mut rec, "prob", self.prob_noise);
        if let Some(sigma) = self.sigma {
            rec.insert("probsigma", Value::Float64(sigma));
        }
        put_f(&mut rec, "dm", self.best_dm);
        put_measured(&mut rec, "ptopo", self.p_topo, self.p_topo_err);
        put_measured(&mut rec, "pdtopo", self.pd_topo, self.pd_topo_err);
        put_measured(&mut rec, "pddtopo", self.pdd_topo, self.pdd_topo_err);
        put_measured(&mut rec, "pbary", self.p_bary, self.p_bary_err);
        put_measured(&mut rec, "pdbary", self.pd_bary, self.pd_bary_err);
        put_measured(&mut rec, "pddbary", self.pdd_bary, self.pdd_bary_err);
        put_f(&mut rec, "porb", self.p_orb);
        put_f(&mut rec, "asinc", self.asini_c);
        put_f(&mut rec, "eccen", self.eccentricity);
        put_f(&mut rec, "wrad", self.w_rad);
        put_f(&mut rec, "tperi", self.t_peri);
        rec
    }
}

fn put_f(rec: &mut HeaderRecord, key: &str, value: Option<f64>) {
    rec.insert(key, value.map_or(Value::Null, Value::Float64));
}

fn put_measured(rec: &mut HeaderRecord, key: &str, value: Option<f64>, err: Option<f64>) {
    put_f(rec, key, value);
    if let (Some(_), Some(err)) = (value, err) {
        rec.insert(format!("{key}err"), Value::Float64(err));
    }
}
