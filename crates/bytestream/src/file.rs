//! Reading whole files as opaque bytes.

use std::{io, path::Path};

use crate::error::IoError;

/// Reads the file at `path` and returns its contents.
///
/// The bytes are returned untouched; feed them to
/// [`decode`](crate::decode) or [`encode`](crate::encode) as needed.
///
/// # Errors
///
/// Returns [`IoError::NotFound`] if the file does not exist and
/// [`IoError::Other`] for every other failure.
#[tracing::instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, IoError> {
    let path = path.as_ref();

    match std::fs::read(path) {
        Ok(bytes) => {
            tracing::debug!(len = bytes.len(), "loaded file");
            Ok(bytes)
        }
        Err(source) if source.kind() == io::ErrorKind::NotFound => {
            Err(IoError::NotFound { path: path.to_path_buf() })
        }
        Err(source) => Err(IoError::Other { path: path.to_path_buf(), source }),
    }
}
