//! LC-3 object image format.
//!
//! An image is a flat big-endian byte stream:
//! - the first word is the origin, the address the program is loaded at
//! - every following word is stored at consecutive addresses
//!
//! Nothing beyond the top of memory is ever consumed: at most
//! `65536 - origin` words are taken and the rest is ignored.

use crate::cpu::memory::MEMORY_SIZE;
use crate::word::Word;
use serde::{Serialize, Deserialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A parsed program image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramImage {
    /// Load address of the first word.
    pub origin: Word,
    /// The program words.
    pub words: Vec<Word>,
}

impl ProgramImage {
    /// Create an image, keeping only the words that fit below 0x10000.
    pub fn new(origin: Word, mut words: Vec<Word>) -> Self {
        let room = MEMORY_SIZE - origin as usize;
        if words.len() > room {
            log::warn!(
                "image at x{:04X} has {} words; only {} fit, the rest is ignored",
                origin,
                words.len(),
                room
            );
            words.truncate(room);
        }
        Self { origin, words }
    }

    /// Parse an image from its on-disk bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
        if bytes.len() < 2 {
            return Err(ImageError::MissingOrigin(bytes.len()));
        }
        let origin = Word::from_be_bytes([bytes[0], bytes[1]]);

        let body = &bytes[2..];
        if body.len() % 2 != 0 {
            log::debug!("ignoring trailing odd byte in image");
        }
        let words = body
            .chunks_exact(2)
            .map(|pair| Word::from_be_bytes([pair[0], pair[1]]))
            .collect();

        Ok(Self::new(origin, words))
    }

    /// Serialize back to the on-disk byte layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        std::iter::once(self.origin)
            .chain(self.words.iter().copied())
            .flat_map(Word::to_be_bytes)
            .collect()
    }

    /// Get the number of words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Load an image file from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ProgramImage, ImageError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| ImageError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let image = ProgramImage::from_bytes(&bytes)?;
    log::debug!(
        "read {}: origin x{:04X}, {} words",
        path.display(),
        image.origin,
        image.len()
    );
    Ok(image)
}

/// Write an image file to disk.
pub fn save_image<P: AsRef<Path>>(path: P, image: &ProgramImage) -> Result<(), ImageError> {
    let path = path.as_ref();
    std::fs::write(path, image.to_bytes()).map_err(|source| ImageError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Errors that can occur while reading or writing images.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("image is {0} bytes long; an origin word needs 2")]
    MissingOrigin(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_big_endian() {
        let image = ProgramImage::from_bytes(&[0x30, 0x00, 0xF0, 0x25, 0x12, 0x34]).unwrap();

        assert_eq!(image.origin, 0x3000);
        assert_eq!(image.words, vec![0xF025, 0x1234]);
    }

    #[test]
    fn test_origin_only() {
        let image = ProgramImage::from_bytes(&[0x40, 0x00]).unwrap();
        assert_eq!(image.origin, 0x4000);
        assert!(image.is_empty());
    }

    #[test]
    fn test_too_short() {
        assert!(matches!(ProgramImage::from_bytes(&[]), Err(ImageError::MissingOrigin(0))));
        assert!(matches!(ProgramImage::from_bytes(&[0x30]), Err(ImageError::MissingOrigin(1))));
    }

    #[test]
    fn test_trailing_byte_ignored() {
        let image = ProgramImage::from_bytes(&[0x30, 0x00, 0x12, 0x34, 0x56]).unwrap();
        assert_eq!(image.words, vec![0x1234]);
    }

    #[test]
    fn test_truncated_at_top_of_memory() {
        let image = ProgramImage::from_bytes(&[0xFF, 0xFE, 0, 1, 0, 2, 0, 3]).unwrap();
        assert_eq!(image.words, vec![1, 2]);
    }

    #[test]
    fn test_to_bytes() {
        let image = ProgramImage::new(0x3000, vec![0xF025]);
        assert_eq!(image.to_bytes(), vec![0x30, 0x00, 0xF0, 0x25]);
    }

    #[test]
    fn test_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("lc3-image-{}.obj", std::process::id()));
        let image = ProgramImage::new(0x3000, vec![0xE002, 0xF022, 0xF025]);

        save_image(&path, &image).unwrap();
        let loaded = load_image(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded, image);
    }

    #[test]
    fn test_missing_file() {
        let err = load_image("/nonexistent/definitely/missing.obj").unwrap_err();
        assert!(matches!(err, ImageError::Io { .. }));
        assert!(err.to_string().contains("missing.obj"));
    }
}
