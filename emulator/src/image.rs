//! Program images, as produced by the LC-3 assembler.
//!
//! An image is a sequence of big-endian words. The first one is the address
//! where the rest of the words get loaded.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::constants::{Address, Word, MEMORY_SIZE};

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("could not read image {path}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image is missing its origin word")]
    MissingOrigin,

    #[error("image has an odd length ({len} bytes)")]
    OddLength { len: usize },

    #[error("image of {len} words loaded at {origin:#06x} does not fit in memory")]
    TooLarge { origin: Address, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub origin: Address,
    pub words: Vec<Word>,
}

impl Image {
    /// Decode an image from its raw bytes
    ///
    /// # Errors
    ///
    /// Fails if the image has no origin, has a trailing byte, or would not fit
    /// between its origin and the end of memory.
    pub fn parse(bytes: &[u8]) -> Result<Self, ImageError> {
        if bytes.len() % 2 != 0 {
            return Err(ImageError::OddLength { len: bytes.len() });
        }

        let mut words = bytes
            .chunks_exact(2)
            .map(|pair| Word::from_be_bytes([pair[0], pair[1]]));

        let origin = words.next().ok_or(ImageError::MissingOrigin)?;
        let words: Vec<Word> = words.collect();

        if usize::from(origin) + words.len() > MEMORY_SIZE {
            return Err(ImageError::TooLarge {
                origin,
                len: words.len(),
            });
        }

        Ok(Self { origin, words })
    }

    /// Read and decode an image file
    ///
    /// # Errors
    ///
    /// Fails if the file can't be read or is not a valid image
    pub fn load(path: &Utf8Path) -> Result<Self, ImageError> {
        let bytes = std::fs::read(path).map_err(|source| ImageError::Io {
            path: path.to_owned(),
            source,
        })?;
        let image = Self::parse(&bytes)?;
        debug!(%path, origin = image.origin, len = image.words.len(), "Loaded image");
        Ok(image)
    }

    /// Address one past the last word of the image
    #[must_use]
    pub fn end(&self) -> usize {
        usize::from(self.origin) + self.words.len()
    }
}
