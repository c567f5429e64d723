//! DCT-based perceptual hashing.
//!
//! # Algorithm
//!
//! The image is reduced to grayscale, passed through a discrete cosine
//! transform, and the 8×8 block of lowest frequencies is thresholded against
//! its mean. The result is a 64-bit fingerprint that survives JPEG
//! recompression, resizing and small crops.
//!
//! # Usage
//!
//! ```no_run
//! use imageguard_core::fingerprint::FingerprintCodec;
//!
//! let codec = FingerprintCodec::new();
//! let a = codec.compute(&std::fs::read("original.png").unwrap()).unwrap();
//! let b = codec.compute(&std::fs::read("repost.jpg").unwrap()).unwrap();
//! let similar = a.distance(&b) <= 5;
//! ```

use std::fmt;
use std::str::FromStr;

use image::DynamicImage;
use image_hasher::{HashAlg, Hasher, HasherConfig};

use crate::error::{GuardError, Result};

/// Fingerprint width in bytes (64 bits).
pub const FINGERPRINT_SIZE: usize = 8;

/// Length of the canonical hex representation.
pub const FINGERPRINT_HEX_LEN: usize = FINGERPRINT_SIZE * 2;

/// A 64-bit perceptual fingerprint.
///
/// Equality is bitwise. Similarity is measured with [`Fingerprint::distance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub const fn from_u64(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn from_bytes(bytes: [u8; FINGERPRINT_SIZE]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    pub const fn to_bytes(&self) -> [u8; FINGERPRINT_SIZE] {
        self.0.to_be_bytes()
    }

    /// Hamming distance: the number of differing bit positions.
    pub const fn distance(&self, other: &Self) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// Canonical fixed-width (16 digit) lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Parse the canonical hex encoding. Surrounding whitespace is ignored,
    /// anything other than exactly 16 hex digits is rejected.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let trimmed = hex_str.trim();
        if trimmed.len() != FINGERPRINT_HEX_LEN {
            return Err(GuardError::Decode(format!(
                "Expected {FINGERPRINT_HEX_LEN} hex digits, got {}",
                trimmed.len()
            )));
        }
        let bytes: [u8; FINGERPRINT_SIZE] = hex::decode(trimmed)
            .map_err(|e| GuardError::Decode(format!("Invalid fingerprint hex: {e}")))?
            .try_into()
            .map_err(|v: Vec<u8>| {
                GuardError::Decode(format!("Expected {FINGERPRINT_SIZE} bytes, got {}", v.len()))
            })?;
        Ok(Self::from_bytes(bytes))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// Computes fingerprints from raw image bytes.
///
/// Cheap to clone; the underlying hasher configuration is rebuilt on demand.
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintCodec;

impl FingerprintCodec {
    pub fn new() -> Self {
        Self
    }

    fn hasher() -> Hasher {
        HasherConfig::new()
            .hash_alg(HashAlg::Mean)
            .hash_size(8, 8)
            .preproc_dct()
            .to_hasher()
    }

    /// Compute a fingerprint from encoded image bytes.
    ///
    /// Supports PNG, JPEG, GIF (first frame) and WebP. Anything else is a
    /// [`GuardError::Decode`].
    pub fn compute(&self, image_data: &[u8]) -> Result<Fingerprint> {
        let image = image::load_from_memory(image_data)
            .map_err(|e| GuardError::Decode(format!("Failed to decode image: {e}")))?;

        self.compute_image(&image)
    }

    /// Compute a fingerprint from an already decoded image.
    pub fn compute_image(&self, image: &DynamicImage) -> Result<Fingerprint> {
        let hash = Self::hasher().hash_image(image);
        let bytes: [u8; FINGERPRINT_SIZE] = hash.as_bytes().try_into().map_err(|_| {
            GuardError::Decode(format!(
                "Hasher produced {} bytes, expected {FINGERPRINT_SIZE}",
                hash.as_bytes().len()
            ))
        })?;
        Ok(Fingerprint::from_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    fn encode_png(img: &DynamicImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_fingerprint_size() {
        assert_eq!(FINGERPRINT_SIZE, 8);
        assert_eq!(FINGERPRINT_HEX_LEN, 16);
    }

    #[test]
    fn test_distance_identical() {
        let fp = Fingerprint::from_u64(0x00FF_AA55_00FF_AA55);
        assert_eq!(fp.distance(&fp), 0);
    }

    #[test]
    fn test_distance_opposite() {
        let a = Fingerprint::from_u64(0);
        let b = Fingerprint::from_u64(u64::MAX);
        assert_eq!(a.distance(&b), 64);
    }

    #[test]
    fn test_distance_single_bit() {
        let a = Fingerprint::from_u64(0);
        let b = Fingerprint::from_u64(1 << 40);
        assert_eq!(a.distance(&b), 1);
        assert_eq!(b.distance(&a), 1);
    }

    #[test]
    fn test_hex_is_fixed_width() {
        let fp = Fingerprint::from_u64(0x1);
        assert_eq!(fp.to_hex(), "0000000000000001");
        assert_eq!(fp.to_string(), fp.to_hex());

        let fp = Fingerprint::from_bytes([0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(fp.to_hex(), "deadbeefcafebabe");
        assert_eq!(Fingerprint::from_hex("deadbeefcafebabe").unwrap(), fp);
    }

    #[test]
    fn test_from_hex_accepts_uppercase_and_whitespace() {
        let fp: Fingerprint = "  DEADBEEFCAFEBABE\n".parse().unwrap();
        assert_eq!(fp.as_u64(), 0xDEAD_BEEF_CAFE_BABE);
    }

    #[test]
    fn test_from_hex_rejects_malformed() {
        assert!(Fingerprint::from_hex("").is_err());
        assert!(Fingerprint::from_hex("deadbeef").is_err());
        assert!(Fingerprint::from_hex("deadbeefcafebabe00").is_err());
        assert!(Fingerprint::from_hex("zzzzzzzzzzzzzzzz").is_err());
    }

    #[test]
    fn test_compute_is_deterministic() {
        let bytes = encode_png(&gradient(64, 48));
        let codec = FingerprintCodec::new();
        let a = codec.compute(&bytes).unwrap();
        let b = codec.compute(&bytes).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_compute_rejects_non_image() {
        let codec = FingerprintCodec::new();
        let err = codec.compute(b"<html>not an image</html>").unwrap_err();
        assert!(matches!(err, GuardError::Decode(_)));
    }
}
