//! Static telescope, machine and data-type enumerations used by SIGPROC
//! headers.
//!
//! Each table is a slice of `(name, id)` pairs. Several names may share an
//! id; the last one listed is the canonical name returned by id lookups.

/// Name returned for ids that are not in a table.
pub const UNKNOWN_NAME: &str = "Unknown";

pub static TELESCOPES: &[(&str, i64)] = &[
    ("Fake", 0),
    ("Arecibo", 1),
    ("ARECIBO 305m", 1),
    ("Ooty", 2),
    ("Nancay", 3),
    ("Parkes", 4),
    ("Jodrell", 5),
    ("GBT", 6),
    ("GMRT", 7),
    ("Effelsberg", 8),
    ("ATA", 9),
    ("SRT", 10),
    ("LOFAR", 11),
    ("VLA", 12),
    ("CHIME", 20),
    ("FAST", 21),
    ("MeerKAT", 64),
    ("KAT-7", 65),
];

pub static MACHINES: &[(&str, i64)] = &[
    ("FAKE", 0),
    ("PSPM", 1),
    ("Wapp", 2),
    ("WAPP", 2),
    ("AOFTM", 3),
    ("BCPM1", 4),
    ("BPP", 4),
    ("OOTY", 5),
    ("SCAMP", 6),
    ("GBT Pulsar Spigot", 7),
    ("SPIGOT", 7),
    ("BG/P", 11),
    ("PDEV", 12),
    ("CHIME+PSR", 20),
    ("KAT", 64),
    ("KAT-DC2", 65),
];

pub static DATA_TYPES: &[(&str, i64)] = &[("Filterbank file", 1), ("Timeseries file", 2)];

/// Canonical name for `id`, or [`UNKNOWN_NAME`].
pub fn name_for(table: &[(&'static str, i64)], id: i64) -> &'static str {
    table
        .iter()
        .rev()
        .find(|&&(_, i)| i == id)
        .map(|&(n, _)| n)
        .unwrap_or(UNKNOWN_NAME)
}

/// Id for any alias of `name`.
pub fn id_for(table: &[(&'static str, i64)], name: &str) -> Option<i64> {
    table.iter().find(|&&(n, _)| n == name).map(|&(_, i)| i)
}

pub fn telescope_name(id: i64) -> &'static str {
    name_for(TELESCOPES, id)
}

pub fn machine_name(id: i64) -> &'static str {
    name_for(MACHINES, id)
}

pub fn data_type_name(id: i64) -> &'static str {
    name_for(DATA_TYPES, id)
}
