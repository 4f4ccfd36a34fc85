use psrio::record::HeaderRecord;
use psrio::sigproc::{self, Filterbank};
use psrio::{
    Bestprof, Dat, Fft, GuppiHeader, Inf, ParFile, Pfd, PolycoTable, PsrfitsHeader, Residuals,
};
use std::fmt::Write as _;
use std::path::Path;
use std::process;

fn format_record(record: &HeaderRecord) -> String {
    let mut out = String::new();
    out.push_str("  Header fields:\n");
    for (key, value) in record {
        let _ = writeln!(out, "    {key} = {value}");
    }
    out
}

fn format_inf(inf: &Inf) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  Basename: {}", inf.bsname);
    let _ = writeln!(out, "  Telescope: {}", inf.telescope);
    if let Some(object) = &inf.object {
        let _ = writeln!(out, "  Object: {object}");
    }
    let _ = writeln!(out, "  Samples: {} x {} s", inf.nsamp, inf.tsamp);
    let _ = writeln!(out, "  Band: {}", inf.emband);
    if let Some(dm) = inf.dm {
        let _ = writeln!(out, "  DM: {dm}");
    }
    if !inf.onoffs.is_empty() {
        let _ = writeln!(out, "  On/off pairs: {:?}", inf.onoffs);
    }
    out
}

fn format_filterbank(fil: &Filterbank) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  Source: {}", fil.header.source_name().unwrap_or("?"));
    let _ = writeln!(out, "  Telescope: {}", fil.header.telescope_name);
    let _ = writeln!(out, "  Machine: {}", fil.header.machine_name);
    let _ = writeln!(out, "  Channels: {} x {} IFs", fil.nchans, fil.nifs);
    if let (Some(first), Some(last)) = (fil.freqs.first(), fil.freqs.last()) {
        let _ = writeln!(out, "  Frequencies: {first} .. {last} MHz");
    }
    let _ = writeln!(out, "  Bits per sample: {}", fil.nbits.unwrap_or(32));
    let _ = writeln!(out, "  Spectra: {}", fil.nspectra);
    let _ = writeln!(out, "  Header size: {} bytes", fil.header.size);
    out
}

fn format_pfd(pfd: &Pfd) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  Candidate: {}", pfd.candname);
    let _ = writeln!(out, "  Telescope: {}", pfd.telescope);
    let _ = writeln!(
        out,
        "  Cube: {} parts x {} subbands x {} bins",
        pfd.npart, pfd.nsub, pfd.proflen
    );
    let _ = writeln!(out, "  Best DM: {}", pfd.effective_dm());
    let _ = writeln!(out, "  DM trials: {}", pfd.dms.len());
    let _ = writeln!(out, "  Period trials: {}", pfd.periods.len());
    let _ = writeln!(out, "  Duration: {} s", pfd.derived.duration);
    out
}

fn format_bestprof(bp: &Bestprof) -> String {
    let mut out = String::new();
    if let Some(c) = &bp.candidate {
        let _ = writeln!(out, "  Candidate: {c}");
    }
    if let Some(p) = bp.p_topo {
        let _ = writeln!(out, "  P_topo: {p} ms");
    }
    if let Some(dm) = bp.best_dm {
        let _ = writeln!(out, "  Best DM: {dm}");
    }
    if let Some(sigma) = bp.sigma {
        let _ = writeln!(out, "  Significance: {sigma} sigma");
    }
    let _ = writeln!(out, "  Profile bins: {}", bp.profile.len());
    out
}

fn format_polycos(table: &PolycoTable) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  Pulsar: {}", table.psr().unwrap_or("?"));
    let _ = writeln!(out, "  Blocks: {}", table.blocks.len());
    let tmids = table.tmids();
    if let (Some(first), Some(last)) = (tmids.first(), tmids.last()) {
        let _ = writeln!(out, "  Midpoints: MJD {first} .. {last}");
    }
    out
}

fn describe(path: &Path, verbose: bool) -> psrio::Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let mut out = String::new();
    match ext.as_str() {
        "inf" => {
            let inf = Inf::read(path)?;
            out.push_str("PRESTO metadata\n");
            out.push_str(&format_inf(&inf));
        }
        "dat" => {
            let dat: Dat = psrio::presto::read_dat(path)?;
            out.push_str("PRESTO time series\n");
            let _ = writeln!(out, "  Samples: {}", dat.data.len());
            out.push_str(&format_inf(&dat.inf));
        }
        "fft" => {
            let fft: Fft = psrio::presto::read_fft(path)?;
            out.push_str("PRESTO spectrum\n");
            let _ = writeln!(out, "  Bins: {}", fft.num_bins());
            out.push_str(&format_inf(&fft.inf));
        }
        "fil" => {
            let fil = Filterbank::open(path)?;
            out.push_str("SIGPROC filterbank\n");
            out.push_str(&format_filterbank(&fil));
            if verbose {
                out.push_str(&format_record(&fil.header.record));
            }
        }
        "tim" | "spec" => {
            let series = if ext == "tim" {
                sigproc::read_tim(path)?
            } else {
                sigproc::read_spec(path)?
            };
            out.push_str("SIGPROC series\n");
            let _ = writeln!(out, "  Source: {}", series.header.source_name().unwrap_or("?"));
            let _ = writeln!(out, "  Samples: {} ({:?})", series.data.len(), series.dtype);
            if verbose {
                out.push_str(&format_record(&series.header.record));
            }
        }
        "pfd" => {
            let pfd = Pfd::read(path)?;
            out.push_str("PRESTO folded candidate\n");
            out.push_str(&format_pfd(&pfd));
        }
        "bestprof" => {
            let bp = Bestprof::read(path)?;
            out.push_str("PRESTO best profile\n");
            out.push_str(&format_bestprof(&bp));
        }
        "par" => {
            let par = ParFile::read(path)?;
            out.push_str("TEMPO parameter file\n");
            let _ = writeln!(out, "  Pulsar: {}", par.name().unwrap_or("?"));
            if let Some(f0) = par.f0() {
                let _ = writeln!(out, "  F0: {f0} Hz");
            }
            let _ = writeln!(out, "  Parameters: {}", par.params.record.len());
            if verbose {
                out.push_str(&format_record(&par.params.record));
            }
        }
        "polycos" => {
            let table = PolycoTable::read(path)?;
            out.push_str("TEMPO polycos\n");
            out.push_str(&format_polycos(&table));
        }
        "fits" | "sf" | "rf" | "cf" => {
            let header = PsrfitsHeader::read(path)?;
            out.push_str("PSRFITS primary header\n");
            let _ = writeln!(out, "  Source: {}", header.source_name().unwrap_or("?"));
            let _ = writeln!(out, "  Telescope: {}", header.telescope().unwrap_or("?"));
            if let Some(mjd) = header.start_mjd() {
                let _ = writeln!(out, "  Start MJD: {mjd}");
            }
            let _ = writeln!(out, "  Header size: {} bytes", header.size);
            if verbose {
                out.push_str(&format_record(&header.record));
            }
        }
        "raw" => {
            let header = GuppiHeader::read(path)?;
            out.push_str("GUPPI raw block header\n");
            let _ = writeln!(out, "  Source: {}", header.source_name().unwrap_or("?"));
            let _ = writeln!(out, "  Telescope: {}", header.telescope().unwrap_or("?"));
            if let (Some(nchans), Some(npol)) = (header.nchans(), header.npol()) {
                let _ = writeln!(out, "  Channels: {nchans} x {npol} pols");
            }
            if let Some(size) = header.block_size() {
                let _ = writeln!(out, "  Block size: {size} bytes");
            }
            let _ = writeln!(out, "  Data offset: {} bytes", header.data_offset());
            if verbose {
                out.push_str(&format_record(&header.record));
            }
        }
        "tmp" => {
            let res = Residuals::read(path)?;
            out.push_str("TEMPO residuals\n");
            let _ = writeln!(out, "  TOAs: {}", res.len());
            let _ = writeln!(
                out,
                "  Framing: {:?}, {}-byte markers",
                res.order,
                res.marker.bytes()
            );
            if let (Some(first), Some(last)) = (res.records.first(), res.records.last()) {
                let _ = writeln!(out, "  MJD: {} .. {}", first.bary_toa, last.bary_toa);
            }
        }
        _ => {
            return Err(psrio::Error::Decode {
                offset: 0,
                reason: format!("unrecognised file extension {ext:?}"),
            })
        }
    }
    Ok(out)
}

fn run(args: &[String]) -> Result<String, String> {
    let mut verbose = false;
    let mut file_path = None;

    for arg in args {
        if arg == "-v" || arg == "--verbose" {
            verbose = true;
        } else if arg.starts_with('-') {
            return Err(format!("Unknown option: {arg}"));
        } else {
            if file_path.is_some() {
                return Err("Too many arguments".to_string());
            }
            file_path = Some(arg.as_str());
        }
    }

    let path = file_path.ok_or_else(|| {
        "Usage: psrinfo [-v] <file>\n\nPrint a summary of a pulsar data file.".to_string()
    })?;

    describe(Path::new(path), verbose).map_err(|e| format!("Error reading '{path}': {e}"))
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(output) => print!("{output}"),
        Err(msg) => {
            eprintln!("{msg}");
            process::exit(1);
        }
    }
}
