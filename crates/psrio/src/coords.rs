//! SIGPROC packed sexagesimal coordinates.
//!
//! SIGPROC stores `src_raj` as the double `HHMMSS.ssss` and `src_dej` as
//! `DDMMSS.ssss` (e.g. `214400.0` for `21:44:00`). The sign applies to the
//! whole angle.

/// Unpack `[-]DDMMSS.ssss` into decimal hours or degrees.
pub fn unpack_sexagesimal(packed: f64) -> f64 {
    let sign = if packed.is_sign_negative() { -1.0 } else { 1.0 };
    let (whole, rest) = divmod(packed.abs(), 10000.0);
    let (minutes, seconds) = divmod(rest, 100.0);
    sign * (whole + minutes / 60.0 + seconds / 3600.0)
}

/// Pack decimal hours or degrees back into `[-]DDMMSS.ssss`.
pub fn pack_sexagesimal(decimal: f64) -> f64 {
    let sign = if decimal.is_sign_negative() { -1.0 } else { 1.0 };
    let (whole, frac) = divmod(decimal.abs(), 1.0);
    let (minutes, frac) = divmod(frac * 60.0, 1.0);
    let seconds = frac * 60.0;
    sign * (whole * 10000.0 + minutes * 100.0 + seconds)
}

/// Render a packed value as `[-]DD:MM:SS.ssss`.
pub fn format_sexagesimal(packed: f64) -> String {
    let sign = if packed.is_sign_negative() { "-" } else { "" };
    let (whole, rest) = divmod(packed.abs(), 10000.0);
    let (minutes, seconds) = divmod(rest, 100.0);
    format!("{sign}{whole:02.0}:{minutes:02.0}:{seconds:07.4}")
}

fn divmod(x: f64, d: f64) -> (f64, f64) {
    let q = (x / d).floor();
    (q, x - q * d)
}
