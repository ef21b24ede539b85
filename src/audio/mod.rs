//! # Audio Conversion Module
//!
//! Decodes an uploaded WAV file into memory and re-encodes it across the
//! format × bit depth matrix served by `POST /convert`.
//!
//! ## Key Components:
//! - **Segment**: Decoded PCM audio plus its metadata, with sample width conversion and WAV export
//! - **MP3**: LAME encoder wrapper at a fixed bitrate
//! - **Matrix**: The format/depth combinations and the per-combination transcoder
//!
//! ## Codec crates:
//! - `hound` reads and writes RIFF/WAVE
//! - `mp3lame-encoder` statically links LAME, so no external binary is needed on the host

pub mod matrix;   // Format × depth matrix and per-combination isolation
pub mod mp3;      // MP3 encoding through LAME
pub mod segment;  // In-memory audio representation

pub use matrix::{BitDepth, Combination, CombinationOutcome, ConversionResult, EncodeError, MatrixTranscoder, TargetFormat};
pub use segment::AudioSegment;
