//! Readers and writers for radio pulsar data files.
//!
//! Every format is built from a handful of generic codecs:
//!
//! - [`keyed`]: `HEADER_START ... HEADER_END` binary headers (SIGPROC)
//! - [`text`]: `description = value` tables (INF, BESTPROF) and
//!   whitespace-separated parameter lines (PAR)
//! - [`positional`]: fixed binary record layouts (PFD, TEMPO residuals)
//! - [`payload`]: bulk sample arrays widened to `f32`
//!
//! The format modules supply the tables and layouts and expose one struct
//! per file type.
//!
//! ```no_run
//! use psrio::sigproc::Filterbank;
//!
//! let fil = Filterbank::open("obs.fil")?;
//! let block = fil.time_slice(0.0, 1.0)?;
//! println!("{} spectra of {} channels", block.nspectra, fil.nchans);
//! # Ok::<(), psrio::Error>(())
//! ```

pub mod bestprof;
pub mod companion;
pub mod coords;
pub mod endian;
pub mod error;
pub mod guppi;
pub mod inf;
pub mod keyed;
pub mod par;
pub mod payload;
pub mod pfd;
pub mod polycos;
pub mod positional;
pub mod presto;
pub mod primitive;
pub mod psrfits;
pub mod record;
pub mod residuals;
pub mod sigproc;
pub mod tables;
pub mod text;
pub mod value;

#[cfg(feature = "array")]
mod array;

pub use bestprof::Bestprof;
pub use companion::Companion;
pub use endian::ByteOrder;
pub use error::{Error, Result, ResultExt};
pub use guppi::GuppiHeader;
pub use inf::Inf;
pub use par::ParFile;
pub use payload::{Dtype, PayloadOptions, SubByteMode};
pub use pfd::Pfd;
pub use polycos::PolycoTable;
pub use presto::{Dat, Fft};
pub use psrfits::PsrfitsHeader;
pub use record::HeaderRecord;
pub use residuals::{Residual, Residuals};
pub use sigproc::{Filterbank, SigprocHeader, SigprocSeries};
pub use value::{Cube, FieldSpec, PrimitiveType, Value};
