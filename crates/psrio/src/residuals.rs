//! TEMPO binary residuals (`resid2.tmp`).
//!
//! The file is a run of Fortran unformatted records. Each holds nine `f64`
//! values framed by a leading and a trailing record-length marker. The
//! marker width (4 or 8 bytes) and the byte order depend on the machine and
//! compiler that ran TEMPO and are not recorded, so both are detected from
//! the first record.

use std::path::Path;

use log::debug;

use crate::endian::ByteOrder;
use crate::error::{Error, Result, ResultExt};
use crate::positional::{RecordLayout, Slot};
use crate::record::HeaderRecord;
use crate::value::{FieldSpec, PrimitiveType, Value};

use PrimitiveType::{Float64, Int32, Int64};

/// Values per record.
pub const RECORD_VALUES: usize = 9;

/// Bytes between the two markers, which is also the value each marker holds.
const PAYLOAD: usize = RECORD_VALUES * 8;

const LEAD: &str = "reclen";
const TRAIL: &str = "reclen_end";

macro_rules! residual_slots {
    ($marker:expr) => {
        &[
            Slot::Field(FieldSpec::new("reclen", $marker)),
            Slot::Field(FieldSpec::new("bary_toa", Float64)),
            Slot::Field(FieldSpec::new("postfit_phase", Float64)),
            Slot::Field(FieldSpec::new("postfit_sec", Float64)),
            Slot::Field(FieldSpec::new("orbit_phase", Float64)),
            Slot::Field(FieldSpec::new("bary_freq", Float64)),
            Slot::Field(FieldSpec::new("weight", Float64)),
            Slot::Field(FieldSpec::new("uncertainty", Float64)),
            Slot::Field(FieldSpec::new("prefit_phase", Float64)),
            Slot::Field(FieldSpec::new("dm_correction", Float64)),
            Slot::Field(FieldSpec::new("reclen_end", $marker)),
        ]
    };
}

static MARKER4_SLOTS: &[Slot] = residual_slots!(Int32);
static MARKER8_SLOTS: &[Slot] = residual_slots!(Int64);

/// Width of the Fortran record-length markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerWidth {
    /// 32-bit markers (`g77`, `gfortran` defaults).
    #[default]
    Four,
    /// 64-bit markers.
    Eight,
}

impl MarkerWidth {
    pub const fn bytes(self) -> usize {
        match self {
            MarkerWidth::Four => 4,
            MarkerWidth::Eight => 8,
        }
    }

    /// Bytes per record, both markers included.
    pub const fn record_len(self) -> usize {
        2 * self.bytes() + PAYLOAD
    }

    fn layout(self, order: ByteOrder) -> RecordLayout {
        let slots = match self {
            MarkerWidth::Four => MARKER4_SLOTS,
            MarkerWidth::Eight => MARKER8_SLOTS,
        };
        RecordLayout { slots, order }
    }

    fn read(self, order: ByteOrder, buf: &[u8]) -> i64 {
        match self {
            MarkerWidth::Four => i64::from(order.read_i32(buf)),
            MarkerWidth::Eight => order.read_i64(buf),
        }
    }

    fn value(self, n: i64) -> Value {
        match self {
            MarkerWidth::Four => Value::Int32(n as i32),
            MarkerWidth::Eight => Value::Int64(n),
        }
    }
}

/// Tried in order; the first whose markers both read 72 wins.
const CANDIDATES: [(ByteOrder, MarkerWidth); 4] = [
    (ByteOrder::Little, MarkerWidth::Four),
    (ByteOrder::Little, MarkerWidth::Eight),
    (ByteOrder::Big, MarkerWidth::Four),
    (ByteOrder::Big, MarkerWidth::Eight),
];

/// One TOA's residual.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Residual {
    /// Barycentric arrival time (MJD).
    pub bary_toa: f64,
    /// Post-fit residual in turns.
    pub postfit_phase: f64,
    /// Post-fit residual in seconds.
    pub postfit_sec: f64,
    /// Orbital phase, zero for isolated pulsars.
    pub orbit_phase: f64,
    /// Barycentric observing frequency (MHz).
    pub bary_freq: f64,
    pub weight: f64,
    /// TOA uncertainty in microseconds, as stored.
    pub uncertainty_us: f64,
    /// Pre-fit residual in turns.
    pub prefit_phase: f64,
    pub dm_correction: f64,
}

impl Residual {
    /// Pre-fit residual in seconds, using the post-fit turns-to-seconds
    /// ratio. `None` when the post-fit phase is zero.
    pub fn prefit_sec(&self) -> Option<f64> {
        (self.postfit_phase != 0.0)
            .then(|| self.postfit_sec / self.postfit_phase * self.prefit_phase)
    }

    pub fn uncertainty_sec(&self) -> f64 {
        self.uncertainty_us * 1e-6
    }

    fn from_record(rec: &HeaderRecord) -> Result<Self> {
        let f = |key: &'static str| rec.get_f64(key).ok_or(Error::MissingField(key));
        Ok(Residual {
            bary_toa: f("bary_toa")?,
            postfit_phase: f("postfit_phase")?,
            postfit_sec: f("postfit_sec")?,
            orbit_phase: f("orbit_phase")?,
            bary_freq: f("bary_freq")?,
            weight: f("weight")?,
            uncertainty_us: f("uncertainty")?,
            prefit_phase: f("prefit_phase")?,
            dm_correction: f("dm_correction")?,
        })
    }

    fn to_record(self, marker: MarkerWidth) -> HeaderRecord {
        let mut rec = HeaderRecord::new();
        rec.insert(LEAD, marker.value(PAYLOAD as i64));
        for (key, v) in [
            ("bary_toa", self.bary_toa),
            ("postfit_phase", self.postfit_phase),
            ("postfit_sec", self.postfit_sec),
            ("orbit_phase", self.orbit_phase),
            ("bary_freq", self.bary_freq),
            ("weight", self.weight),
            ("uncertainty", self.uncertainty_us),
            ("prefit_phase", self.prefit_phase),
            ("dm_correction", self.dm_correction),
        ] {
            rec.insert(key, Value::Float64(v));
        }
        rec.insert(TRAIL, marker.value(PAYLOAD as i64));
        rec
    }
}

/// The contents of a residual file, with the framing it was read with.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Residuals {
    pub order: ByteOrder,
    pub marker: MarkerWidth,
    pub records: Vec<Residual>,
}

impl Residuals {
    /// Find the byte order and marker width of the first record.
    pub fn detect(data: &[u8]) -> Result<(ByteOrder, MarkerWidth)> {
        for (order, marker) in CANDIDATES {
            let (w, len) = (marker.bytes(), marker.record_len());
            if data.len() < len {
                continue;
            }
            let lead = marker.read(order, &data[..w]);
            let trail = marker.read(order, &data[w + PAYLOAD..len]);
            if lead == PAYLOAD as i64 && trail == PAYLOAD as i64 {
                return Ok((order, marker));
            }
        }
        Err(Error::Decode {
            offset: 0,
            reason: format!("no {PAYLOAD}-byte record markers at any width or byte order"),
        })
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::default());
        }
        let (order, marker) = Self::detect(data)?;
        let len = marker.record_len();
        if data.len() % len != 0 {
            return Err(Error::ShapeMismatch {
                expected: ((data.len() / len + 1) * len) as u64,
                found: data.len() as u64,
                context: "residual records".into(),
            });
        }

        let layout = marker.layout(order);
        let mut records = Vec::with_capacity(data.len() / len);
        for (i, chunk) in data.chunks_exact(len).enumerate() {
            let offset = (i * len) as u64;
            let rec = layout.decode(chunk)?;
            for (key, at) in [(LEAD, offset), (TRAIL, offset + (len - marker.bytes()) as u64)] {
                match rec.get_i64(key) {
                    Some(n) if n == PAYLOAD as i64 => {}
                    found => {
                        return Err(Error::Framing {
                            expected: PAYLOAD.to_string(),
                            found: found.map(|n| n.to_string()).unwrap_or_default(),
                            offset: at,
                        });
                    }
                }
            }
            records.push(Residual::from_record(&rec)?);
        }
        debug!(
            "decoded {} residuals ({order:?}, {}-byte markers)",
            records.len(),
            marker.bytes()
        );
        Ok(Residuals {
            order,
            marker,
            records,
        })
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(Error::from).in_file(path)?;
        Self::decode(&bytes).in_file(path)
    }

    /// Encode with the stored byte order and marker width.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let layout = self.marker.layout(self.order);
        let mut out = Vec::with_capacity(self.records.len() * self.marker.record_len());
        for r in &self.records {
            out.extend(layout.encode(&r.to_record(self.marker))?);
        }
        Ok(out)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.encode().in_file(path)?;
        std::fs::write(path, bytes).map_err(Error::from).in_file(path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether any TOA carries a non-zero weight. TEMPO leaves the column
    /// zero when weights were not used.
    pub fn has_weights(&self) -> bool {
        self.records.iter().any(|r| r.weight != 0.0)
    }

    pub fn has_orbit_phase(&self) -> bool {
        self.records.iter().any(|r| r.orbit_phase != 0.0)
    }

    pub fn has_bary_freq(&self) -> bool {
        self.records.iter().any(|r| r.bary_freq != 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn residual(i: usize) -> Residual {
        let x = i as f64;
        Residual {
            bary_toa: 53000.5 + x,
            postfit_phase: 0.001 * (x + 1.0),
            postfit_sec: 0.0005 * (x + 1.0),
            orbit_phase: 0.0,
            bary_freq: 1400.0,
            weight: 0.0,
            uncertainty_us: 2.5,
            prefit_phase: 0.004 * (x + 1.0),
            dm_correction: 0.0,
        }
    }

    fn sample(order: ByteOrder, marker: MarkerWidth) -> Residuals {
        Residuals {
            order,
            marker,
            records: (0..3).map(residual).collect(),
        }
    }

    #[test]
    fn record_lengths() {
        assert_eq!(MarkerWidth::Four.record_len(), 80);
        assert_eq!(MarkerWidth::Eight.record_len(), 88);
    }

    #[test]
    fn detects_every_framing() {
        for (order, marker) in CANDIDATES {
            let res = sample(order, marker);
            let bytes = res.encode().unwrap();
            assert_eq!(bytes.len(), 3 * marker.record_len());
            assert_eq!(Residuals::detect(&bytes).unwrap(), (order, marker));
            assert_eq!(Residuals::decode(&bytes).unwrap(), res);
        }
    }

    #[test]
    fn eight_byte_markers_are_not_mistaken_for_four() {
        // Little-endian 72 as an i64 also reads as 72 in its first four
        // bytes; only the trailing marker tells the widths apart.
        let bytes = sample(ByteOrder::Little, MarkerWidth::Eight).encode().unwrap();
        assert_eq!(&bytes[..8], &72i64.to_le_bytes());
        assert_eq!(Residuals::detect(&bytes).unwrap().1, MarkerWidth::Eight);
    }

    #[test]
    fn fortran_framing_by_hand() {
        let mut bytes = 72i32.to_be_bytes().to_vec();
        for v in [55000.25, 0.01, 0.002, 0.0, 430.0, 1.0, 12.0, 0.03, 0.0f64] {
            bytes.extend(v.to_be_bytes());
        }
        bytes.extend(72i32.to_be_bytes());

        let res = Residuals::decode(&bytes).unwrap();
        assert_eq!(res.order, ByteOrder::Big);
        assert_eq!(res.marker, MarkerWidth::Four);
        let r = res.records[0];
        assert_eq!(r.bary_toa, 55000.25);
        assert_eq!(r.bary_freq, 430.0);
        assert!((r.uncertainty_sec() - 12e-6).abs() < 1e-18);
        assert!((r.prefit_sec().unwrap() - 0.006).abs() < 1e-12);
        assert!(res.has_weights());
        assert!(!res.has_orbit_phase());
    }

    #[test]
    fn zero_postfit_phase_has_no_prefit_seconds() {
        let r = Residual::default();
        assert_eq!(r.prefit_sec(), None);
    }

    #[test]
    fn partial_record_is_shape_mismatch() {
        let mut bytes = sample(ByteOrder::Little, MarkerWidth::Four).encode().unwrap();
        bytes.truncate(bytes.len() - 10);
        match Residuals::decode(&bytes) {
            Err(Error::ShapeMismatch {
                expected, found, ..
            }) => {
                assert_eq!(expected, 240);
                assert_eq!(found, 230);
            }
            other => panic!("expected shape mismatch, got {other:?}"),
        }
    }

    #[test]
    fn bad_marker_in_later_record() {
        let mut bytes = sample(ByteOrder::Little, MarkerWidth::Four).encode().unwrap();
        bytes[80..84].copy_from_slice(&64i32.to_le_bytes());
        match Residuals::decode(&bytes) {
            Err(Error::Framing {
                expected,
                found,
                offset,
            }) => {
                assert_eq!(expected, "72");
                assert_eq!(found, "64");
                assert_eq!(offset, 80);
            }
            other => panic!("expected framing error, got {other:?}"),
        }
    }

    #[test]
    fn unframed_data_is_rejected() {
        assert!(matches!(
            Residuals::decode(&[0u8; 80]),
            Err(Error::Decode { offset: 0, .. })
        ));
    }

    #[test]
    fn empty_file_has_no_records() {
        let res = Residuals::decode(&[]).unwrap();
        assert!(res.is_empty());
        assert!(res.encode().unwrap().is_empty());
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resid2.tmp");
        let res = sample(ByteOrder::Big, MarkerWidth::Eight);
        res.write(&path).unwrap();
        let back = Residuals::read(&path).unwrap();
        assert_eq!(back, res);
        assert_eq!(back.len(), 3);
        assert!(!back.has_weights());
        assert!(back.has_bary_freq());
    }
}
