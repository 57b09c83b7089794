//! Temporary copies of compressed or streamed inputs.

use std::io::{self, Read, Write};

use log::debug;
use tempfile::{Builder, TempPath};

use crate::error::ReadError;

/// Copy `reader` into a fresh temporary file.
///
/// The file is removed when the returned [`TempPath`] drops, and also when
/// copying fails part way.
///
/// # Errors
/// [`ReadError::Spool`] when the file cannot be created or written.
pub fn spool_to_tempfile<R: Read>(mut reader: R, label: &str) -> Result<TempPath, ReadError> {
    let spool_error = |source: io::Error| ReadError::Spool {
        input: label.to_owned(),
        source,
    };
    let mut file = Builder::new()
        .prefix("kartlag-")
        .suffix(".spool")
        .tempfile()
        .map_err(spool_error)?;
    let bytes = io::copy(&mut reader, &mut file).map_err(spool_error)?;
    file.flush().map_err(spool_error)?;
    let path = file.into_temp_path();
    debug!("Spooled {bytes} bytes from {label} to {}", path.display());
    Ok(path)
}
