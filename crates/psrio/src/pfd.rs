//! PRESTO `.pfd` folded-profile archives.
//!
//! A PFD file is a single positional record: twelve dimension counts, four
//! strings, an optional RA/Dec pair, timing scalars, three polynomial blocks,
//! the orbit, the DM/period/pdot search grids and two cubes (the profiles
//! and their per-interval statistics).

use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::bestprof::Bestprof;
use crate::companion::{append_suffix, Companion};
use crate::endian::ByteOrder;
use crate::error::{Error, Result, ResultExt};
use crate::inf::Inf;
use crate::positional::{Dim, RecordLayout, Slot};
use crate::record::HeaderRecord;
use crate::value::{Cube, FieldSpec, PrimitiveType, Value};

use PrimitiveType::{Float32, Float64, PascalString, UInt32};

/// Statistics stored per (part, subband): sample count, data mean, data
/// variance, profile-bin count, profile mean, profile variance, reduced
/// chi-square.
pub const NUM_STATS: usize = 7;

const COORD_WIDTH: usize = 16;

macro_rules! f {
    ($name:literal, $ty:expr) => {
        Slot::Field(FieldSpec::new($name, $ty))
    };
}

pub static PFD_LAYOUT: RecordLayout = RecordLayout {
    slots: &[
        f!("numdms", UInt32),
        f!("numperiods", UInt32),
        f!("numpdots", UInt32),
        f!("nsub", UInt32),
        f!("npart", UInt32),
        f!("proflen", UInt32),
        f!("numchan", UInt32),
        f!("pstep", UInt32),
        f!("pdstep", UInt32),
        f!("dmstep", UInt32),
        f!("ndmfact", UInt32),
        f!("npfact", UInt32),
        f!("filename", PascalString),
        f!("candname", PascalString),
        f!("telescope", PascalString),
        f!("pgdev", PascalString),
        Slot::Coordinates {
            ra: "rastr",
            dec: "decstr",
            width: COORD_WIDTH,
        },
        f!("tsamp", Float64),
        f!("startT", Float64),
        f!("endT", Float64),
        f!("tepoch", Float64),
        f!("bepoch", Float64),
        f!("avgoverc", Float64),
        f!("lofreq", Float64),
        f!("chanwidth", Float64),
        f!("bestdm", Float64),
        f!("topopow", Float32),
        f!("_t", Float32),
        f!("topop1", Float64),
        f!("topop2", Float64),
        f!("topop3", Float64),
        f!("barypow", Float32),
        f!("_b", Float32),
        f!("baryp1", Float64),
        f!("baryp2", Float64),
        f!("baryp3", Float64),
        f!("foldpow", Float32),
        f!("_f", Float32),
        f!("foldp1", Float64),
        f!("foldp2", Float64),
        f!("foldp3", Float64),
        f!("orbp", Float64),
        f!("orbe", Float64),
        f!("orbx", Float64),
        f!("orbw", Float64),
        f!("orbt", Float64),
        f!("orbpd", Float64),
        f!("orbwd", Float64),
        Slot::Array {
            name: "dms",
            len: Dim::Field("numdms"),
        },
        Slot::Array {
            name: "periods",
            len: Dim::Field("numperiods"),
        },
        Slot::Array {
            name: "pdots",
            len: Dim::Field("numpdots"),
        },
        Slot::Cube {
            name: "profs",
            dims: [Dim::Field("npart"), Dim::Field("nsub"), Dim::Field("proflen")],
        },
        Slot::Cube {
            name: "stats",
            dims: [Dim::Field("npart"), Dim::Field("nsub"), Dim::Fixed(NUM_STATS)],
        },
    ],
    order: ByteOrder::Little,
};

/// One `{power, pad, p1, p2, p3}` block. `pad` is carried verbatim so
/// rewrites are byte-identical.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Polynomial {
    pub pow: f32,
    pub pad: f32,
    pub p1: f64,
    pub p2: f64,
    pub p3: f64,
}

/// Binary orbit parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orbit {
    pub p: f64,
    pub e: f64,
    pub x: f64,
    pub w: f64,
    pub t: f64,
    pub pd: f64,
    pub wd: f64,
}

/// The DM search grid. A single trial reads as [`DmTrials::Scalar`].
#[derive(Debug, Clone, PartialEq)]
pub enum DmTrials {
    Scalar(f64),
    Array(Vec<f64>),
}

impl DmTrials {
    pub fn len(&self) -> usize {
        match self {
            DmTrials::Scalar(_) => 1,
            DmTrials::Array(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_vec(&self) -> Vec<f64> {
        match self {
            DmTrials::Scalar(v) => vec![*v],
            DmTrials::Array(v) => v.clone(),
        }
    }
}

impl Default for DmTrials {
    fn default() -> Self {
        DmTrials::Array(Vec::new())
    }
}

/// Values computed from the raw record on read. Never written.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PfdDerived {
    pub numprofs: usize,
    /// Folding frequency times profile length.
    pub bins_per_sec: f64,
    pub chan_per_sub: u32,
    pub sub_delta_freq: f64,
    pub hifreq: f64,
    pub lo_sub_freq: f64,
    /// Centre frequency of each subband in MHz.
    pub sub_freqs: Vec<f64>,
    pub sub_delay_bins: Vec<f64>,
    /// Samples folded into each part.
    pub pts_per_fold: Vec<f64>,
    pub start_secs: Vec<f64>,
    pub mid_secs: Vec<f64>,
    pub start_topo_mjds: Option<Vec<f64>>,
    pub mid_topo_mjds: Option<Vec<f64>>,
    pub start_bary_mjds: Option<Vec<f64>>,
    pub mid_bary_mjds: Option<Vec<f64>>,
    pub nfolded: f64,
    /// Total folded time in seconds.
    pub duration: f64,
    /// DM from the companion `.inf` of a single-channel fold.
    pub resolved_dm: Option<f64>,
    /// Channel count from the companion `.inf` of a single-channel fold.
    pub resolved_numchan: Option<u32>,
}

/// A decoded PFD file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pfd {
    pub numdms: u32,
    pub numperiods: u32,
    pub numpdots: u32,
    pub nsub: u32,
    pub npart: u32,
    pub proflen: u32,
    pub numchan: u32,
    pub pstep: u32,
    pub pdstep: u32,
    pub dmstep: u32,
    pub ndmfact: u32,
    pub npfact: u32,
    /// Name of the file that was folded.
    pub filename: String,
    pub candname: String,
    pub telescope: String,
    pub pgdev: String,
    /// `"Unknown"` when the file omits the coordinates.
    pub rastr: String,
    pub decstr: String,
    pub tsamp: f64,
    pub start_t: f64,
    pub end_t: f64,
    pub tepoch: f64,
    pub bepoch: f64,
    pub avgoverc: f64,
    pub lofreq: f64,
    pub chanwidth: f64,
    pub bestdm: f64,
    pub topo: Polynomial,
    pub bary: Polynomial,
    pub fold: Polynomial,
    pub orbit: Orbit,
    pub dms: DmTrials,
    pub periods: Vec<f64>,
    pub pdots: Vec<f64>,
    /// `[npart][nsub][proflen]`.
    pub profs: Cube,
    /// `[npart][nsub][7]`.
    pub stats: Cube,
    pub derived: PfdDerived,
}

/// Options for [`Pfd::read_with`].
#[derive(Debug, Clone, Default)]
pub struct PfdReadOptions {
    /// Companion `.inf` consulted for single-channel folds.
    pub inf: Companion,
}

fn take_u32(rec: &mut HeaderRecord, key: &'static str) -> Result<u32> {
    let n = rec.remove(key).and_then(|v| v.as_i64()).ok_or(Error::MissingField(key))?;
    u32::try_from(n).map_err(|_| Error::convert(key, &n.to_string(), None))
}

fn take_f64(rec: &mut HeaderRecord, key: &'static str) -> Result<f64> {
    rec.remove(key).and_then(|v| v.as_f64()).ok_or(Error::MissingField(key))
}

fn take_f32(rec: &mut HeaderRecord, key: &'static str) -> Result<f32> {
    match rec.remove(key) {
        Some(Value::Float32(v)) => Ok(v),
        _ => Err(Error::MissingField(key)),
    }
}

fn take_string(rec: &mut HeaderRecord, key: &'static str) -> Result<String> {
    match rec.remove(key) {
        Some(Value::Str(s)) => Ok(s),
        _ => Err(Error::MissingField(key)),
    }
}

fn take_array(rec: &mut HeaderRecord, key: &'static str) -> Result<Vec<f64>> {
    match rec.remove(key) {
        Some(Value::Array(v)) => Ok(v),
        _ => Err(Error::MissingField(key)),
    }
}

fn take_cube(rec: &mut HeaderRecord, key: &'static str) -> Result<Cube> {
    match rec.remove(key) {
        Some(Value::Cube(c)) => Ok(c),
        _ => Err(Error::MissingField(key)),
    }
}

fn take_poly(rec: &mut HeaderRecord, keys: [&'static str; 5]) -> Result<Polynomial> {
    Ok(Polynomial {
        pow: take_f32(rec, keys[0])?,
        pad: take_f32(rec, keys[1])?,
        p1: take_f64(rec, keys[2])?,
        p2: take_f64(rec, keys[3])?,
        p3: take_f64(rec, keys[4])?,
    })
}

fn put_poly(rec: &mut HeaderRecord, keys: [&'static str; 5], poly: &Polynomial) {
    rec.insert(keys[0], Value::Float32(poly.pow));
    rec.insert(keys[1], Value::Float32(poly.pad));
    rec.insert(keys[2], Value::Float64(poly.p1));
    rec.insert(keys[3], Value::Float64(poly.p2));
    rec.insert(keys[4], Value::Float64(poly.p3));
}

const TOPO: [&str; 5] = ["topopow", "_t", "topop1", "topop2", "topop3"];
const BARY: [&str; 5] = ["barypow", "_b", "baryp1", "baryp2", "baryp3"];
const FOLD: [&str; 5] = ["foldpow", "_f", "foldp1", "foldp2", "foldp3"];

impl Pfd {
    /// Decode a PFD held in memory. Single-channel DM recovery needs the
    /// file's location, so it is only done by [`Pfd::read`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        let rec = PFD_LAYOUT.decode(data)?;
        debug!("pfd record: {} fields from {} bytes", rec.len(), data.len());
        let mut pfd = Self::from_record(rec)?;
        pfd.derived = pfd.derive(None);
        Ok(pfd)
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        Self::read_with(path, &PfdReadOptions::default())
    }

    pub fn read_with(path: impl AsRef<Path>, options: &PfdReadOptions) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(Error::from).in_file(path)?;
        let mut pfd = Self::decode(&bytes).in_file(path)?;
        if pfd.numchan == 1 {
            let inf_path = match (&options.inf, pfd.inf_sibling(path)) {
                (Companion::Sibling, None) => {
                    warn!(
                        "single-channel fold {} names no folded file, skipping .inf lookup",
                        path.display()
                    );
                    None
                }
                (policy, sibling) => policy.resolve(sibling.unwrap_or_default()),
            };
            let inf = inf_path.and_then(|inf_path| match Inf::read(&inf_path) {
                    Ok(inf) => Some(inf),
                    Err(e) => {
                        warn!("cannot recover DM for single-channel fold {}: {e}", path.display());
                        None
                    }
                });
            pfd.derived = pfd.derive(inf.as_ref());
        }
        Ok(pfd)
    }

    /// The `.inf` next to `pfd_path` named after the folded file, if the
    /// record names one.
    fn inf_sibling(&self, pfd_path: &Path) -> Option<PathBuf> {
        let mut name = Path::new(&self.filename).file_stem()?.to_os_string();
        if name.is_empty() {
            return None;
        }
        name.push(".inf");
        Some(pfd_path.with_file_name(name))
    }

    /// Load `<pfd>.bestprof` if it exists and parses.
    pub fn read_bestprof_companion(pfd_path: impl AsRef<Path>) -> Option<Bestprof> {
        let path = append_suffix(pfd_path.as_ref(), "bestprof");
        if !path.is_file() {
            return None;
        }
        match Bestprof::read(&path) {
            Ok(b) => Some(b),
            Err(e) => {
                warn!("ignoring unreadable bestprof companion: {e}");
                None
            }
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        PFD_LAYOUT.encode(&self.to_record())
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.encode().in_file(path)?;
        std::fs::write(path, bytes).map_err(Error::from).in_file(path)
    }

    fn from_record(mut rec: HeaderRecord) -> Result<Self> {
        let r = &mut rec;
        let numdms = take_u32(r, "numdms")?;
        let dms = take_array(r, "dms")?;
        let dms = match dms.as_slice() {
            [single] => DmTrials::Scalar(*single),
            _ => DmTrials::Array(dms),
        };
        Ok(Pfd {
            numdms,
            numperiods: take_u32(r, "numperiods")?,
            numpdots: take_u32(r, "numpdots")?,
            nsub: take_u32(r, "nsub")?,
            npart: take_u32(r, "npart")?,
            proflen: take_u32(r, "proflen")?,
            numchan: take_u32(r, "numchan")?,
            pstep: take_u32(r, "pstep")?,
            pdstep: take_u32(r, "pdstep")?,
            dmstep: take_u32(r, "dmstep")?,
            ndmfact: take_u32(r, "ndmfact")?,
            npfact: take_u32(r, "npfact")?,
            filename: take_string(r, "filename")?,
            candname: take_string(r, "candname")?,
            telescope: take_string(r, "telescope")?,
            pgdev: take_string(r, "pgdev")?,
            rastr: take_string(r, "rastr")?,
            decstr: take_string(r, "decstr")?,
            tsamp: take_f64(r, "tsamp")?,
            start_t: take_f64(r, "startT")?,
            end_t: take_f64(r, "endT")?,
            tepoch: take_f64(r, "tepoch")?,
            bepoch: take_f64(r, "bepoch")?,
            avgoverc: take_f64(r, "avgoverc")?,
            lofreq: take_f64(r, "lofreq")?,
            chanwidth: take_f64(r, "chanwidth")?,
            bestdm: take_f64(r, "bestdm")?,
            topo: take_poly(r, TOPO)?,
            bary: take_poly(r, BARY)?,
            fold: take_poly(r, FOLD)?,
            orbit: Orbit {
                p: take_f64(r, "orbp")?,
                e: take_f64(r, "orbe")?,
                x: take_f64(r, "orbx")?,
                w: take_f64(r, "orbw")?,
                t: take_f64(r, "orbt")?,
                pd: take_f64(r, "orbpd")?,
                wd: take_f64(r, "orbwd")?,
            },
            dms,
            periods: take_array(r, "periods")?,
            pdots: take_array(r, "pdots")?,
            profs: take_cube(r, "profs")?,
            stats: take_cube(r, "stats")?,
            derived: PfdDerived::default(),
        })
    }

    fn to_record(&self) -> HeaderRecord {
        let mut rec = HeaderRecord::new();
        let counts = [
            ("numdms", self.numdms),
            ("numperiods", self.numperiods),
            ("numpdots", self.numpdots),
            ("nsub", self.nsub),
            ("npart", self.npart),
            ("proflen", self.proflen),
            ("numchan", self.numchan),
            ("pstep", self.pstep),
            ("pdstep", self.pdstep),
            ("dmstep", self.dmstep),
            ("ndmfact", self.ndmfact),
            ("npfact", self.npfact),
        ];
        for (key, n) in counts {
            rec.insert(key, Value::UInt32(n));
        }
        for (key, s) in [
            ("filename", &self.filename),
            ("candname", &self.candname),
            ("telescope", &self.telescope),
            ("pgdev", &self.pgdev),
            ("rastr", &self.rastr),
            ("decstr", &self.decstr),
        ] {
            rec.insert(key, Value::Str(s.clone()));
        }
        for (key, v) in [
            ("tsamp", self.tsamp),
            ("startT", self.start_t),
            ("endT", self.end_t),
            ("tepoch", self.tepoch),
            ("bepoch", self.bepoch),
            ("avgoverc", self.avgoverc),
            ("lofreq", self.lofreq),
            ("chanwidth", self.chanwidth),
            ("bestdm", self.bestdm),
        ] {
            rec.insert(key, Value::Float64(v));
        }
        put_poly(&mut rec, TOPO, &self.topo);
        put_poly(&mut rec, BARY, &self.bary);
        put_poly(&mut rec, FOLD, &self.fold);
        let o = &self.orbit;
        for (key, v) in [
            ("orbp", o.p),
            ("orbe", o.e),
            ("orbx", o.x),
            ("orbw", o.w),
            ("orbt", o.t),
            ("orbpd", o.pd),
            ("orbwd", o.wd),
        ] {
            rec.insert(key, Value::Float64(v));
        }
        rec.insert("dms", Value::Array(self.dms.to_vec()));
        rec.insert("periods", Value::Array(self.periods.clone()));
        rec.insert("pdots", Value::Array(self.pdots.clone()));
        rec.insert("profs", Value::Cube(self.profs.clone()));
        rec.insert("stats", Value::Cube(self.stats.clone()));
        rec
    }

    /// Compute the derived fields, using `inf` to resolve the DM and
    /// channel count of a single-channel fold.
    pub fn derive(&self, inf: Option<&Inf>) -> PfdDerived {
        let mut d = PfdDerived::default();
        if self.numchan == 1 {
            if let Some(inf) = inf.filter(|i| i.is_radio()) {
                d.resolved_dm = inf.dm;
                d.resolved_numchan = inf.nchan.and_then(|n| u32::try_from(n).ok());
            }
        }
        let numchan = d.resolved_numchan.unwrap_or(self.numchan);

        let nsub = self.nsub as usize;
        let npart = self.npart as usize;
        d.numprofs = nsub * npart;
        d.bins_per_sec = self.fold.p1 * f64::from(self.proflen);
        d.chan_per_sub = numchan.checked_div(self.nsub).unwrap_or(0);
        d.sub_delta_freq = self.chanwidth * f64::from(d.chan_per_sub);
        d.hifreq = self.lofreq + f64::from(numchan.saturating_sub(1)) * self.chanwidth;
        d.lo_sub_freq = self.lofreq + d.sub_delta_freq - self.chanwidth;
        d.sub_freqs = (0..nsub)
            .map(|i| d.lo_sub_freq + i as f64 * d.sub_delta_freq)
            .collect();
        d.sub_delay_bins = vec![0.0; nsub];

        if nsub > 0 && self.stats.shape == [npart, nsub, NUM_STATS] {
            d.pts_per_fold = (0..npart).map(|i| self.stats.get(i, 0, 0)).collect();
        } else {
            d.pts_per_fold = vec![0.0; npart];
        }
        let mut elapsed = 0.0;
        for &pts in &d.pts_per_fold {
            d.start_secs.push(elapsed * self.tsamp);
            d.mid_secs.push((elapsed + 0.5 * pts) * self.tsamp);
            elapsed += pts;
        }
        let to_mjds = |epoch: f64, secs: &[f64]| {
            (epoch != 0.0).then(|| secs.iter().map(|s| epoch + s / 86400.0).collect())
        };
        d.start_topo_mjds = to_mjds(self.tepoch, &d.start_secs);
        d.mid_topo_mjds = to_mjds(self.tepoch, &d.mid_secs);
        d.start_bary_mjds = to_mjds(self.bepoch, &d.start_secs);
        d.mid_bary_mjds = to_mjds(self.bepoch, &d.mid_secs);
        d.nfolded = elapsed;
        d.duration = elapsed * self.tsamp;
        d
    }

    /// The best DM, preferring one recovered from a companion `.inf`.
    pub fn effective_dm(&self) -> f64 {
        self.derived.resolved_dm.unwrap_or(self.bestdm)
    }

    /// The fold summed over parts and subbands.
    pub fn summed_profile(&self) -> Vec<f64> {
        let [npart, nsub, nbin] = self.profs.shape;
        let mut out = vec![0.0; nbin];
        if nbin == 0 {
            return out;
        }
        for i in 0..npart {
            for j in 0..nsub {
                for (acc, v) in out.iter_mut().zip(self.profs.row(i, j)) {
                    *acc += v;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::UNKNOWN;
    use pretty_assertions::assert_eq;

    fn sample(numdms: u32) -> Pfd {
        let (npart, nsub, proflen) = (3usize, 2usize, 4usize);
        let mut profs = Cube::zeros([npart, nsub, proflen]);
        for (i, v) in profs.data.iter_mut().enumerate() {
            *v = i as f64;
        }
        let mut stats = Cube::zeros([npart, nsub, NUM_STATS]);
        for i in 0..npart {
            for j in 0..nsub {
                *stats.get_mut(i, j, 0) = 1000.0;
                *stats.get_mut(i, j, 6) = 1.5;
            }
        }
        let dms: Vec<f64> = (0..numdms).map(|i| 2.0 + f64::from(i) * 0.5).collect();
        let mut pfd = Pfd {
            numdms,
            numperiods: 2,
            numpdots: 2,
            nsub: nsub as u32,
            npart: npart as u32,
            proflen: proflen as u32,
            numchan: 8,
            pstep: 1,
            pdstep: 2,
            dmstep: 1,
            ndmfact: 1,
            npfact: 1,
            filename: "fake.fil".into(),
            candname: "PSR_2144-3933".into(),
            telescope: "GMRT".into(),
            pgdev: "fake_PSR_2144-3933.pfd.ps/CPS".into(),
            rastr: "21:44:00.0000".into(),
            decstr: "-39:33:00.0000".into(),
            tsamp: 0.001,
            start_t: 0.0,
            end_t: 1.0,
            tepoch: 58017.5,
            bepoch: 0.0,
            avgoverc: 0.0,
            lofreq: 300.0,
            chanwidth: 0.5,
            bestdm: 2.885,
            topo: Polynomial {
                pow: 1.25,
                pad: f32::from_bits(0x7FC0_1234),
                p1: 8.5e-3,
                p2: -0.0,
                p3: 0.0,
            },
            bary: Polynomial::default(),
            fold: Polynomial {
                pow: 0.0,
                pad: 3.0,
                p1: 117.5,
                p2: 0.0,
                p3: 0.0,
            },
            orbit: Orbit::default(),
            dms: if numdms == 1 {
                DmTrials::Scalar(dms[0])
            } else {
                DmTrials::Array(dms)
            },
            periods: vec![8.5e-3, 8.6e-3],
            pdots: vec![0.0, 1e-12],
            profs,
            stats,
            derived: PfdDerived::default(),
        };
        pfd.derived = pfd.derive(None);
        pfd
    }

    #[test]
    fn roundtrip_is_byte_identical() {
        let pfd = sample(3);
        let bytes = pfd.encode().unwrap();
        let back = Pfd::decode(&bytes).unwrap();
        assert_eq!(back.topo.pad.to_bits(), 0x7FC0_1234);
        assert_eq!(back.encode().unwrap(), bytes);
        // The NaN pad makes `==` on the whole struct false, so compare the rest.
        assert_eq!(back.dms, pfd.dms);
        assert_eq!(back.profs, pfd.profs);
        assert_eq!(back.derived, pfd.derived);
    }

    #[test]
    fn single_dm_collapses_and_rewraps() {
        let mut pfd = sample(1);
        pfd.topo.pad = 0.0;
        let bytes = pfd.encode().unwrap();
        let back = Pfd::decode(&bytes).unwrap();
        assert_eq!(back.dms, DmTrials::Scalar(2.0));
        assert_eq!(back, pfd);
        assert_eq!(back.encode().unwrap(), bytes);
    }

    #[test]
    fn numdms_must_match_trials() {
        let mut pfd = sample(3);
        pfd.dms = DmTrials::Scalar(1.0);
        let err = pfd.encode().unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { ref context, .. } if context == "dms"));
    }

    #[test]
    fn shape_invariant() {
        let pfd = sample(2);
        let bytes = pfd.encode().unwrap();
        let back = Pfd::decode(&bytes).unwrap();
        let [npart, nsub, proflen] = back.profs.shape;
        assert_eq!((npart, nsub, proflen), (3, 2, 4));
        assert_eq!(back.stats.shape, [3, 2, NUM_STATS]);
        let grids = 8 * (2 + 2 + 2);
        let cubes = npart * nsub * proflen * 8 + npart * nsub * NUM_STATS * 8;
        let empty = Pfd {
            npart: 0,
            nsub: 0,
            numdms: 0,
            numperiods: 0,
            numpdots: 0,
            dms: DmTrials::Array(vec![]),
            periods: vec![],
            pdots: vec![],
            profs: Cube::zeros([0, 0, 4]),
            stats: Cube::zeros([0, 0, NUM_STATS]),
            ..back.clone()
        };
        assert_eq!(bytes.len() - empty.encode().unwrap().len(), grids + cubes);

        let mut truncated = bytes.clone();
        truncated.truncate(bytes.len() - 8);
        let err = Pfd::decode(&truncated).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { ref context, .. } if context == "stats"));
    }

    #[test]
    fn omitted_coordinates() {
        let mut pfd = sample(2);
        pfd.rastr = UNKNOWN.into();
        pfd.decstr = UNKNOWN.into();
        let with = sample(2).encode().unwrap();
        let without = pfd.encode().unwrap();
        assert_eq!(with.len() - without.len(), 32);
        let back = Pfd::decode(&without).unwrap();
        assert_eq!(back.rastr, UNKNOWN);
        assert_eq!(back.decstr, UNKNOWN);
    }

    #[test]
    fn derived_fields() {
        let d = sample(2).derived;
        assert_eq!(d.numprofs, 6);
        assert_eq!(d.chan_per_sub, 4);
        assert_eq!(d.sub_delta_freq, 2.0);
        assert_eq!(d.hifreq, 303.5);
        assert_eq!(d.lo_sub_freq, 301.5);
        assert_eq!(d.sub_freqs, vec![301.5, 303.5]);
        assert_eq!(d.bins_per_sec, 470.0);
        assert_eq!(d.pts_per_fold, vec![1000.0; 3]);
        assert_eq!(d.start_secs, vec![0.0, 1.0, 2.0]);
        assert_eq!(d.mid_secs, vec![0.5, 1.5, 2.5]);
        assert_eq!(d.nfolded, 3000.0);
        assert!((d.duration - 3.0).abs() < 1e-12);
        assert!(d.start_topo_mjds.is_some());
        assert!(d.start_bary_mjds.is_none());
    }

    #[test]
    fn single_channel_recovers_dm_from_inf() {
        let dir = tempfile::tempdir().unwrap();
        let mut pfd = sample(2);
        pfd.numchan = 1;
        pfd.filename = "obs_DM10.00.dat".into();
        let path = dir.path().join("obs_DM10.00_PSR.pfd");
        pfd.write(&path).unwrap();

        let missing = Pfd::read(&path).unwrap();
        assert_eq!(missing.derived.resolved_dm, None);
        assert_eq!(missing.effective_dm(), 2.885);

        Inf {
            bsname: "obs_DM10.00".into(),
            telescope: "GMRT".into(),
            nsamp: 3000,
            tsamp: 0.001,
            emband: "Radio".into(),
            dm: Some(10.0),
            nchan: Some(64),
            analyst: "guest".into(),
            ..Default::default()
        }
        .write(dir.path().join("obs_DM10.00.inf"))
        .unwrap();

        let found = Pfd::read(&path).unwrap();
        assert_eq!(found.numchan, 1);
        assert_eq!(found.derived.resolved_dm, Some(10.0));
        assert_eq!(found.derived.resolved_numchan, Some(64));
        assert_eq!(found.effective_dm(), 10.0);

        let skipped = Pfd::read_with(&path, &PfdReadOptions { inf: Companion::Skip }).unwrap();
        assert_eq!(skipped.derived.resolved_dm, None);
    }

    #[test]
    fn bestprof_companion_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cand.pfd");
        assert!(Pfd::read_bestprof_companion(&path).is_none());
        let b = Bestprof {
            candidate: Some("PSR_2144-3933".into()),
            profile: vec![1.0, 2.0],
            ..Default::default()
        };
        b.write(dir.path().join("cand.pfd.bestprof")).unwrap();
        let back = Pfd::read_bestprof_companion(&path).unwrap();
        assert_eq!(back.candidate.as_deref(), Some("PSR_2144-3933"));
        assert_eq!(back.profile, vec![1.0, 2.0]);
    }

    #[test]
    fn summed_profile() {
        let pfd = sample(2);
        // Rows hold consecutive integers 0..24, four per row.
        assert_eq!(pfd.summed_profile(), vec![60.0, 66.0, 72.0, 78.0]);
    }
}
