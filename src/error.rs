use std::path::{Path, PathBuf};

use thiserror::Error;

/// Library error type for ingestion, dithering and library operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The file could not be decoded as an image (corrupt, truncated, or no codec).
    #[error("cannot decode image {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    /// The file extension is not in the accepted set; no decode was attempted.
    #[error("unsupported image format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    /// A read, write, rename or delete failed.
    #[error("filesystem error on {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Nothing to show: the library is empty and no placeholder is available.
    #[error("library is empty and no placeholder image is available")]
    EmptyLibrary,

    /// Programmer error: empty palette, zero-sized image, and similar.
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// Configuration parse error (YAML via `serde_yaml`).
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn fs(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn decode(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        Self::Decode {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Attach a path to `std::io::Result`s, turning them into [`Error::Filesystem`].
pub(crate) trait IoContext<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|source| Error::fs(path, source))
    }
}
