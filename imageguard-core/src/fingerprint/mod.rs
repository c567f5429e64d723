//! Perceptual image fingerprints.
//!
//! A fingerprint is a 64-bit summary of an image's visual content that stays
//! close (in Hamming distance) for re-encoded, resized or lightly edited
//! copies of the same picture. Exact byte hashes are never used here: a
//! repost that went through another JPEG encoder must still match.

pub mod perceptual;

pub use perceptual::*;
