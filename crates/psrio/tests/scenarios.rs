//! End-to-end behaviour on realistic files: companions, framing and shape
//! errors, and metadata recovery.

use std::path::Path;

use pretty_assertions::assert_eq;

use psrio::companion::Companion;
use psrio::pfd::{DmTrials, PfdReadOptions, NUM_STATS};
use psrio::presto::{read_dat, read_dat_with_inf};
use psrio::primitive::UNKNOWN;
use psrio::sigproc::read_tim;
use psrio::{Bestprof, Cube, Error, Inf, Pfd};

const FAKE_PRESTO_RADIO: &str = "\
 Data file name without suffix          =  fake_presto_radio
 Telescope used                         =  Arecibo
 Instrument used                        =  WAPP
 Object being observed                  =  Fake
 J2000 Right Ascension (hh:mm:ss.ssss)  =  00:00:00.0000
 J2000 Declination     (dd:mm:ss.ssss)  =  00:00:00.0000
 Data observed by                       =  Nobody
 Epoch of observation (MJD)             =  55000.000000000000
 Barycentered?           (1=yes, 0=no)  =  0
 Number of bins in the time series      =  4
 Width of each time series bin (sec)    =  6.4e-05
 Any breaks in the data? (1=yes, 0=no)  =  1
 On/Off bin pair #  1                   =  0          , 1
 On/Off bin pair #  2                   =  3          , 3
 Type of observation (EM band)          =  Radio
 Beam diameter (arcsec)                 =  981
 Dispersion measure (cm-3 pc)           =  12.5
 Central freq of low channel (Mhz)      =  1214.289
 Total bandwidth (Mhz)                  =  300
 Number of channels                     =  1
 Channel bandwidth (Mhz)                =  300
 Data analyzed by                       =  tester
 Any additional notes:
    Synthetic data.
";

fn pascal(s: &str) -> Vec<u8> {
    let mut out = (s.len() as u32).to_le_bytes().to_vec();
    out.extend_from_slice(s.as_bytes());
    out
}

fn write(path: &Path, bytes: impl AsRef<[u8]>) {
    std::fs::write(path, bytes).unwrap();
}

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn single_channel_pfd(filename: &str) -> Pfd {
    let (npart, nsub, proflen) = (1, 1, 4);
    let mut pfd = Pfd {
        numdms: 1,
        numperiods: 1,
        numpdots: 1,
        nsub: nsub as u32,
        npart: npart as u32,
        proflen: proflen as u32,
        numchan: 1,
        filename: filename.into(),
        candname: "Fake".into(),
        telescope: "Arecibo".into(),
        rastr: UNKNOWN.into(),
        decstr: UNKNOWN.into(),
        tsamp: 6.4e-5,
        lofreq: 1214.289,
        chanwidth: 300.0,
        dms: DmTrials::Scalar(0.0),
        periods: vec![0.1],
        pdots: vec![0.0],
        profs: Cube {
            shape: [npart, nsub, proflen],
            data: vec![1.0, 5.0, 2.0, 1.0],
        },
        stats: Cube::zeros([npart, nsub, NUM_STATS]),
        ..Default::default()
    };
    pfd.derived = pfd.derive(None);
    pfd
}

#[test]
fn fake_presto_radio_inf() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fake_presto_radio.inf");
    write(&path, FAKE_PRESTO_RADIO);

    let inf = Inf::read(&path).unwrap();
    assert_eq!(inf.bsname, "fake_presto_radio");
    assert!(inf.breaks);
    assert_eq!(inf.onoffs, vec![(0, 1), (3, 3)]);
    assert_eq!(inf.dm, Some(12.5));
    assert_eq!(inf.nchan, Some(1));
    assert_eq!(inf.notes, vec!["Synthetic data."]);
    assert!(inf.is_radio());
    assert_eq!(Inf::parse(&inf.to_text()).unwrap(), inf);
}

#[test]
fn dat_next_to_its_inf() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("fake_presto_radio.inf"), FAKE_PRESTO_RADIO);
    let dat_path = dir.path().join("fake_presto_radio.dat");
    write(&dat_path, f32_bytes(&[1.0, 2.0, 3.0, 4.0]));

    let dat = read_dat(&dat_path).unwrap();
    assert_eq!(dat.data, vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(dat.inf.tsamp, 6.4e-5);
}

#[test]
fn dat_without_inf_names_the_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let dat_path = dir.path().join("orphan.dat");
    write(&dat_path, f32_bytes(&[0.0; 4]));

    let err = read_dat(&dat_path).unwrap_err();
    assert_eq!(err.path(), Some(dat_path.as_path()));
    match err.root() {
        Error::MissingCompanion { expected } => {
            assert_eq!(expected, &dir.path().join("orphan.inf"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn dat_with_explicit_inf() {
    let dir = tempfile::tempdir().unwrap();
    let inf_path = dir.path().join("elsewhere.inf");
    write(&inf_path, FAKE_PRESTO_RADIO);
    let dat_path = dir.path().join("orphan.dat");
    write(&dat_path, f32_bytes(&[0.5; 4]));

    let dat = read_dat_with_inf(&dat_path, &inf_path).unwrap();
    assert_eq!(dat.inf.bsname, "fake_presto_radio");
    assert_eq!(dat.data.len(), 4);
}

#[test]
fn tim_with_wrong_start_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.tim");
    let mut bytes = pascal("HEADER_BEGIN");
    bytes.extend(pascal("HEADER_END"));
    write(&path, bytes);

    let err = read_tim(&path).unwrap_err();
    match err.root() {
        Error::Framing {
            expected,
            found,
            offset,
        } => {
            assert_eq!(expected, "HEADER_START");
            assert_eq!(found, "HEADER_BEGIN");
            assert_eq!(*offset, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn tim_with_unknown_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.tim");
    let mut bytes = pascal("HEADER_START");
    bytes.extend(pascal("nbits"));
    bytes.extend(8i32.to_le_bytes());
    bytes.extend(pascal("frobnication"));
    bytes.extend(1i32.to_le_bytes());
    bytes.extend(pascal("HEADER_END"));
    write(&path, bytes);

    let err = read_tim(&path).unwrap_err();
    assert!(
        matches!(err.root(), Error::UnknownKey { key, offset: 29 } if key == "frobnication"),
        "{err}"
    );
}

#[test]
fn truncated_pfd_is_a_shape_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.pfd");
    let bytes = single_channel_pfd("fake_presto_radio.dat").encode().unwrap();
    write(&path, &bytes[..bytes.len() - 8]);

    let err = Pfd::read(&path).unwrap_err();
    assert!(matches!(err.root(), Error::ShapeMismatch { .. }), "{err}");
}

#[test]
fn single_channel_pfd_recovers_dm_from_inf() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("fake_presto_radio.inf"), FAKE_PRESTO_RADIO);
    let path = dir.path().join("fake_presto_radio_PSR_Fake.pfd");
    single_channel_pfd("/data/fake_presto_radio.dat").write(&path).unwrap();

    let pfd = Pfd::read(&path).unwrap();
    assert_eq!(pfd.derived.resolved_dm, Some(12.5));
    assert_eq!(pfd.effective_dm(), 12.5);
    // The raw record is left alone.
    assert_eq!(pfd.dms, DmTrials::Scalar(0.0));

    let skipped = Pfd::read_with(
        &path,
        &PfdReadOptions {
            inf: Companion::Skip,
        },
    )
    .unwrap();
    assert_eq!(skipped.derived.resolved_dm, None);
    assert_eq!(skipped.effective_dm(), 0.0);
}

#[test]
fn single_channel_pfd_without_inf_still_reads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lonely.pfd");
    single_channel_pfd("lonely.dat").write(&path).unwrap();

    let pfd = Pfd::read(&path).unwrap();
    assert_eq!(pfd.derived.resolved_dm, None);
    assert_eq!(pfd.summed_profile(), vec![1.0, 5.0, 2.0, 1.0]);
}

#[test]
fn single_channel_pfd_without_filename_skips_inf() {
    let dir = tempfile::tempdir().unwrap();
    // A stray `.inf` with an empty stem must not be picked up.
    write(&dir.path().join(".inf"), FAKE_PRESTO_RADIO);
    let path = dir.path().join("anonymous.pfd");
    single_channel_pfd("").write(&path).unwrap();

    let pfd = Pfd::read(&path).unwrap();
    assert_eq!(pfd.filename, "");
    assert_eq!(pfd.derived.resolved_dm, None);

    let explicit = Pfd::read_with(
        &path,
        &PfdReadOptions {
            inf: Companion::Path(dir.path().join(".inf")),
        },
    )
    .unwrap();
    assert_eq!(explicit.derived.resolved_dm, Some(12.5));
}

#[test]
fn pfd_bestprof_companion() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cand.pfd");
    single_channel_pfd("cand.dat").write(&path).unwrap();
    assert!(Pfd::read_bestprof_companion(&path).is_none());

    let bestprof = Bestprof {
        candidate: Some("Fake".into()),
        best_dm: Some(12.5),
        profile: vec![1.0, 5.0, 2.0, 1.0],
        ..Default::default()
    };
    bestprof.write(dir.path().join("cand.pfd.bestprof")).unwrap();
    let found = Pfd::read_bestprof_companion(&path).unwrap();
    assert_eq!(found.candidate.as_deref(), Some("Fake"));
    assert_eq!(found.profile, bestprof.profile);
}
