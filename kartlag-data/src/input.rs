//! Reader inputs: local paths or byte streams.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use bzip2::read::MultiBzDecoder;
use camino::{Utf8Path, Utf8PathBuf};
use kartlag_fs::open_utf8_file;
use tempfile::TempPath;

use crate::error::ReadError;
use crate::spool::spool_to_tempfile;

const BZIP2_SUFFIX: &str = ".bz2";

/// A file path or an already-open byte stream.
///
/// Inputs whose path or label ends in `.bz2` are decompressed transparently.
/// A stream can be read once; later reads see it as empty.
pub enum InputSource {
    /// A file on the local filesystem.
    Path(Utf8PathBuf),
    /// A byte stream with a label used in logs and errors.
    Stream {
        /// Name reported for the stream.
        label: String,
        /// The bytes.
        reader: Box<dyn Read + Send>,
    },
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Stream { label, .. } => f.debug_struct("Stream").field("label", label).finish(),
        }
    }
}

impl From<Utf8PathBuf> for InputSource {
    fn from(path: Utf8PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Utf8Path> for InputSource {
    fn from(path: &Utf8Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl InputSource {
    /// Wrap a byte stream.
    pub fn stream(label: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        Self::Stream {
            label: label.into(),
            reader: Box::new(reader),
        }
    }

    /// Path or stream label.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Path(path) => path.as_str(),
            Self::Stream { label, .. } => label,
        }
    }

    fn is_compressed(&self) -> bool {
        self.label().ends_with(BZIP2_SUFFIX)
    }

    fn open_raw(&mut self) -> Result<Box<dyn Read + Send>, ReadError> {
        match self {
            Self::Path(path) => open_utf8_file(path)
                .map(|file| Box::new(file) as Box<dyn Read + Send>)
                .map_err(|source| ReadError::Open {
                    input: path.to_string(),
                    source,
                }),
            Self::Stream { reader, .. } => Ok(std::mem::replace(reader, Box::new(io::empty()))),
        }
    }

    /// Open for one sequential pass, decompressing when needed.
    pub(crate) fn open(&mut self) -> Result<Box<dyn Read + Send>, ReadError> {
        let compressed = self.is_compressed();
        let raw = BufReader::new(self.open_raw()?);
        Ok(if compressed {
            Box::new(BufReader::new(MultiBzDecoder::new(raw)))
        } else {
            Box::new(raw)
        })
    }

    /// Provide a plain local file for readers that make several passes.
    ///
    /// Uncompressed paths are used in place; anything else is spooled to a
    /// temporary file that is deleted when the returned value drops.
    pub(crate) fn localise(&mut self) -> Result<LocalInput, ReadError> {
        if let Self::Path(path) = self
            && !path.as_str().ends_with(BZIP2_SUFFIX)
        {
            return Ok(LocalInput::Direct(path.clone()));
        }
        let label = self.label().to_owned();
        let reader = self.open()?;
        spool_to_tempfile(reader, &label).map(LocalInput::Spooled)
    }
}

/// A plain file ready for repeated opening.
#[derive(Debug)]
pub(crate) enum LocalInput {
    /// The caller's own file.
    Direct(Utf8PathBuf),
    /// A temporary copy, removed on drop.
    Spooled(TempPath),
}

impl LocalInput {
    pub(crate) fn path(&self) -> &Path {
        match self {
            Self::Direct(path) => path.as_std_path(),
            Self::Spooled(temp) => temp,
        }
    }

    /// Open a fresh handle for one pass; `label` names the original input in errors.
    pub(crate) fn open(&self, label: &str) -> Result<BufReader<Box<dyn Read + Send>>, ReadError> {
        let opened: io::Result<Box<dyn Read + Send>> = match self {
            Self::Direct(path) => open_utf8_file(path).map(|file| Box::new(file) as _),
            Self::Spooled(temp) => File::open(temp).map(|file| Box::new(file) as _),
        };
        opened
            .map(BufReader::new)
            .map_err(|source| ReadError::Open {
                input: label.to_owned(),
                source,
            })
    }
}
