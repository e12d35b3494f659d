use std::{
    io,
    path::PathBuf as StdPathBuf,
};
use thiserror::Error;

/// Why a file couldn't be opened.
///
/// When several drivers were tried, this is the most specific of their
/// failures: any real I/O error beats "not found".
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("{path}: file not found")]
    NotFound { path: String },
    /// Opening for writing, and no mounted driver could create the path.
    #[error("{path}: no writable location")]
    NoWritableLocation { path: String },
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl OpenError {
    pub(crate) fn from_io(path: &str, source: io::Error) -> OpenError {
        match source.kind() {
            io::ErrorKind::NotFound => OpenError::NotFound {
                path: path.to_owned(),
            },
            _ => OpenError::Io { path: path.to_owned(), source },
        }
    }
    /// The logical path that failed to open.
    pub fn path(&self) -> &str {
        match self {
            OpenError::NotFound { path }
            | OpenError::NoWritableLocation { path }
            | OpenError::Io { path, .. } => path,
        }
    }
    /// The closest `io::ErrorKind`.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            OpenError::NotFound { .. } => io::ErrorKind::NotFound,
            OpenError::NoWritableLocation { .. } =>
                io::ErrorKind::ReadOnlyFilesystem,
            OpenError::Io { source, .. } => source.kind(),
        }
    }
}

impl From<OpenError> for io::Error {
    fn from(x: OpenError) -> io::Error {
        io::Error::new(x.kind(), x)
    }
}

#[derive(Debug, Error)]
pub enum MountError {
    #[error("can't mount unknown VFS type {kind:?}")]
    UnknownType { kind: String },
    #[error("can't mount VFS type {kind:?}, root {root:?}: {source}")]
    Driver {
        kind: String,
        root: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum StdPathsError {
    #[error("couldn't find a \"Songs\" directory (looked in {searched:?})")]
    NoGameRoot { searched: Vec<StdPathBuf> },
    #[error(transparent)]
    Mount(#[from] MountError),
}
