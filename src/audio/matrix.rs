//! # Conversion Matrix
//!
//! Runs every `(format, bit depth)` combination against one decoded segment.
//!
//! ## Failure isolation:
//! Each combination yields its own `CombinationOutcome`. A failed encode is an
//! `Err` in that outcome and nothing else: the loop always runs to the end, and
//! it is up to the caller to decide what to do with failures.

use crate::audio::mp3;
use crate::audio::segment::AudioSegment;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Wav,
    Mp3,
}

impl TargetFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetFormat::Wav => "wav",
            TargetFormat::Mp3 => "mp3",
        }
    }

    /// Always `audio/<format>`.
    pub fn mime_type(&self) -> &'static str {
        match self {
            TargetFormat::Wav => "audio/wav",
            TargetFormat::Mp3 => "audio/mp3",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Nominal bit depth of an output.
///
/// Serialized as the plain number (`8`, `16`, `24`) so it reads naturally in
/// `config.toml` and in the JSON response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum BitDepth {
    Eight,
    Sixteen,
    TwentyFour,
}

impl BitDepth {
    pub fn bits(&self) -> u16 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
            BitDepth::TwentyFour => 24,
        }
    }

    /// Bytes per sample, bits / 8.
    pub fn sample_width(&self) -> u8 {
        (self.bits() / 8) as u8
    }
}

impl TryFrom<u16> for BitDepth {
    type Error = String;

    fn try_from(bits: u16) -> Result<Self, Self::Error> {
        match bits {
            8 => Ok(BitDepth::Eight),
            16 => Ok(BitDepth::Sixteen),
            24 => Ok(BitDepth::TwentyFour),
            other => Err(format!("Unsupported bit depth {} (expected 8, 16 or 24)", other)),
        }
    }
}

impl From<BitDepth> for u16 {
    fn from(depth: BitDepth) -> Self {
        depth.bits()
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// One cell of the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Combination {
    pub format: TargetFormat,
    pub depth: BitDepth,
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.format, self.depth)
    }
}

/// Why a single combination produced no output.
#[derive(Debug)]
pub enum EncodeError {
    Wav(hound::Error),
    Mp3(String),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::Wav(err) => write!(f, "WAV export failed: {}", err),
            EncodeError::Mp3(msg) => write!(f, "MP3 encoding failed: {}", msg),
        }
    }
}

impl std::error::Error for EncodeError {}

impl From<hound::Error> for EncodeError {
    fn from(err: hound::Error) -> Self {
        EncodeError::Wav(err)
    }
}

/// What happened to one combination.
#[derive(Debug)]
pub struct CombinationOutcome {
    pub combination: Combination,
    pub outcome: Result<Vec<u8>, EncodeError>,
}

/// One successful conversion, as sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub format: String,
    pub bit_depth: u16,
    /// Standard base64 with padding
    pub content: String,
    /// Length of the decoded `content`
    pub size: usize,
    pub mime_type: String,
}

impl ConversionResult {
    pub fn from_encoded(combination: Combination, bytes: &[u8]) -> Self {
        Self {
            format: combination.format.as_str().to_string(),
            bit_depth: combination.depth.bits(),
            content: base64::engine::general_purpose::STANDARD.encode(bytes),
            size: bytes.len(),
            mime_type: combination.format.mime_type().to_string(),
        }
    }
}

/// Encodes a segment at every configured combination.
#[derive(Debug, Clone)]
pub struct MatrixTranscoder {
    formats: Vec<TargetFormat>,
    depths: Vec<BitDepth>,
    mp3_bitrate_kbps: u32,
}

impl MatrixTranscoder {
    pub fn new(formats: Vec<TargetFormat>, depths: Vec<BitDepth>, mp3_bitrate_kbps: u32) -> Self {
        Self {
            formats,
            depths,
            mp3_bitrate_kbps,
        }
    }

    /// Format-major order: every depth of the first format, then the next format.
    pub fn combinations(&self) -> impl Iterator<Item = Combination> + '_ {
        self.formats.iter().flat_map(move |&format| {
            self.depths
                .iter()
                .map(move |&depth| Combination { format, depth })
        })
    }

    /// Encode every combination. Never short-circuits.
    pub fn run(&self, segment: &AudioSegment) -> Vec<CombinationOutcome> {
        self.combinations()
            .map(|combination| CombinationOutcome {
                combination,
                outcome: self.encode(segment, combination),
            })
            .collect()
    }

    fn encode(&self, segment: &AudioSegment, combination: Combination) -> Result<Vec<u8>, EncodeError> {
        match combination.format {
            TargetFormat::Wav => Ok(segment
                .set_sample_width(combination.depth.sample_width())
                .to_wav_bytes()?),
            // Depth is metadata only for MP3
            TargetFormat::Mp3 => mp3::encode(segment, self.mp3_bitrate_kbps).map_err(EncodeError::Mp3),
        }
    }
}
