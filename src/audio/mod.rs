//! Audio decoding

pub mod decoder;

pub use decoder::{decode, decode_at, TARGET_SAMPLE_RATE};
