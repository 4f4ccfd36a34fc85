use std::path::{Path, PathBuf};

/// All errors that can occur while decoding or encoding pulsar data files.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A keyed header did not start (or end) with the expected sentinel.
    #[error("framing error at byte {offset}: expected {expected:?}, found {found:?}")]
    Framing {
        expected: String,
        found: String,
        offset: u64,
    },
    /// A keyed header contained a key missing from its type table.
    #[error("unknown header key {key:?} at byte {offset}")]
    UnknownKey { key: String, offset: u64 },
    /// A value did not convert to the type declared for its field.
    #[error("cannot convert {raw:?} for field {field:?}{}", line_suffix(.line))]
    TypeConversion {
        field: String,
        raw: String,
        line: Option<usize>,
    },
    /// Declared array dimensions disagree with the bytes available.
    #[error("shape mismatch in {context}: expected {expected} bytes, found {found}")]
    ShapeMismatch {
        expected: u64,
        found: u64,
        context: String,
    },
    /// A required sibling metadata file was not found.
    #[error("missing companion file: {}", .expected.display())]
    MissingCompanion { expected: PathBuf },
    /// Truncated or malformed binary data.
    #[error("decode error at byte {offset}: {reason}")]
    Decode { offset: u64, reason: String },
    /// A bit width outside the supported payload table.
    #[error("unsupported number of bits per sample: {0}")]
    UnsupportedBits(u32),
    /// A field required to interpret the file is absent from its header.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    /// An I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Any other error, annotated with the file it came from.
    #[error("{}: {source}", .path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

fn line_suffix(line: &Option<usize>) -> String {
    match line {
        Some(n) => format!(" on line {n}"),
        None => String::new(),
    }
}

impl Error {
    /// Attach the path of the file being processed.
    ///
    /// Errors that already carry a path are returned unchanged.
    pub fn in_file(self, path: &Path) -> Self {
        match self {
            Error::InFile { .. } => self,
            other => Error::InFile {
                path: path.to_path_buf(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying error with any file annotation removed.
    pub fn root(&self) -> &Error {
        match self {
            Error::InFile { source, .. } => source.root(),
            other => other,
        }
    }

    /// The file path attached to this error, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Error::InFile { path, .. } => Some(path),
            _ => None,
        }
    }

    pub(crate) fn truncated(offset: u64, wanted: usize, available: usize) -> Self {
        Error::Decode {
            offset,
            reason: format!("needed {wanted} bytes, only {available} available"),
        }
    }

    pub(crate) fn convert(field: &str, raw: &str, line: Option<usize>) -> Self {
        Error::TypeConversion {
            field: field.to_string(),
            raw: raw.to_string(),
            line,
        }
    }
}

/// Extension used at file boundaries to tag errors with their path.
pub trait ResultExt<T> {
    fn in_file(self, path: &Path) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn in_file(self, path: &Path) -> Result<T> {
        self.map_err(|e| e.in_file(path))
    }
}
