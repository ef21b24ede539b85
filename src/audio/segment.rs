//! # In-Memory Audio Segment
//!
//! Holds decoded PCM samples together with the metadata needed to re-encode
//! them: sample rate, channel count and sample width.
//!
//! ## Sample representation:
//! Samples are stored interleaved as `i32`, scaled to the range of the current
//! sample width. A 16-bit segment holds values in `i16` range, a 24-bit segment
//! values in ±2^23, and so on. Changing the width is a linear rescale by a power
//! of two, the same thing a width-changing PCM conversion does.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::cmp::Ordering;
use std::io::Cursor;
use tracing::debug;

/// Decoded audio ready to be re-encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    /// Interleaved samples (frame 0 channel 0, frame 0 channel 1, ...)
    samples: Vec<i32>,
    sample_rate: u32,
    channels: u16,
    /// Bytes per sample: 1, 2, 3 or 4
    sample_width: u8,
}

impl AudioSegment {
    /// Build a segment from raw parts.
    ///
    /// Samples must already be in the range of `sample_width`.
    pub fn new(samples: Vec<i32>, sample_rate: u32, channels: u16, sample_width: u8) -> Self {
        debug_assert!((1..=4).contains(&sample_width));
        Self {
            samples,
            sample_rate,
            channels,
            sample_width,
        }
    }

    /// Parse a complete RIFF/WAVE file held in memory.
    ///
    /// ## Supported inputs:
    /// - Integer PCM at 8, 16, 24 or 32 bits (hound rejects other widths, which
    ///   surfaces as a decode failure)
    /// - 32-bit IEEE float, mapped onto the full 32-bit integer range
    ///
    /// ## Errors:
    /// Whatever `hound` reports for a malformed file (missing RIFF tag,
    /// unsupported format, truncated data chunk), or a zero channel count.
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self, hound::Error> {
        let reader = WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();

        if spec.channels == 0 {
            return Err(hound::Error::FormatError("WAV file declares zero channels"));
        }

        let (samples, sample_width) = match spec.sample_format {
            SampleFormat::Int => {
                let samples = reader
                    .into_samples::<i32>()
                    .collect::<Result<Vec<_>, _>>()?;
                (samples, container_width(spec.bits_per_sample))
            }
            SampleFormat::Float => {
                let samples = reader
                    .into_samples::<f32>()
                    .map(|sample| sample.map(float_to_i32))
                    .collect::<Result<Vec<_>, _>>()?;
                (samples, 4)
            }
        };

        let segment = Self::new(samples, spec.sample_rate, spec.channels, sample_width);
        debug!(
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            bits_per_sample = spec.bits_per_sample,
            frames = segment.frame_count(),
            "Decoded WAV upload"
        );

        Ok(segment)
    }

    pub fn samples(&self) -> &[i32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_width(&self) -> u8 {
        self.sample_width
    }

    /// Number of frames (one sample per channel).
    pub fn frame_count(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    /// Return a copy of this segment at a different sample width.
    ///
    /// Widening shifts samples left, narrowing shifts them right (arithmetic,
    /// so the sign is preserved and the value rounds toward negative infinity).
    pub fn set_sample_width(&self, sample_width: u8) -> Self {
        debug_assert!((1..=4).contains(&sample_width));
        let shift = 8 * u32::from(self.sample_width.abs_diff(sample_width));
        let samples = match sample_width.cmp(&self.sample_width) {
            Ordering::Equal => self.samples.clone(),
            Ordering::Greater => self.samples.iter().map(|&s| s << shift).collect(),
            Ordering::Less => self.samples.iter().map(|&s| s >> shift).collect(),
        };

        Self::new(samples, self.sample_rate, self.channels, sample_width)
    }

    /// Samples as 16-bit PCM, converting the width first when needed.
    pub fn to_i16_samples(&self) -> Vec<i16> {
        let shift = |s: i32| -> i16 {
            match self.sample_width {
                1 => (s << 8) as i16,
                2 => s as i16,
                width => (s >> (8 * (u32::from(width) - 2))) as i16,
            }
        };
        self.samples.iter().map(|&s| shift(s)).collect()
    }

    /// Export as an integer PCM RIFF/WAVE file at the current sample width.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>, hound::Error> {
        let spec = WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: u16::from(self.sample_width) * 8,
            sample_format: SampleFormat::Int,
        };

        let mut buffer = Vec::with_capacity(44 + self.samples.len() * usize::from(self.sample_width));
        {
            let mut writer = WavWriter::new(Cursor::new(&mut buffer), spec)?;
            for &sample in &self.samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }

        Ok(buffer)
    }
}

/// Bytes needed to store a sample of `bits_per_sample` bits.
fn container_width(bits_per_sample: u16) -> u8 {
    bits_per_sample.div_ceil(8).clamp(1, 4) as u8
}

fn float_to_i32(sample: f32) -> i32 {
    let scaled = f64::from(sample) * 2_147_483_648.0;
    scaled.clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(spec: WavSpec, samples: &[i32]) -> Vec<u8> {
        let mut buffer = Vec::new();
        let mut writer = WavWriter::new(Cursor::new(&mut buffer), spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        buffer
    }

    fn int_spec(channels: u16, bits: u16) -> WavSpec {
        WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: bits,
            sample_format: SampleFormat::Int,
        }
    }

    #[test]
    fn test_decode_16_bit_stereo() {
        let bytes = wav_bytes(int_spec(2, 16), &[100, -100, 32767, -32768]);
        let segment = AudioSegment::from_wav_bytes(&bytes).unwrap();

        assert_eq!(segment.sample_rate(), 8000);
        assert_eq!(segment.channels(), 2);
        assert_eq!(segment.sample_width(), 2);
        assert_eq!(segment.frame_count(), 2);
        assert_eq!(segment.samples(), &[100, -100, 32767, -32768]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let mut text = b"this is definitely not a wav file".to_vec();
        text.resize(100, b' ');
        assert!(AudioSegment::from_wav_bytes(&text).is_err());
    }

    /// 20-bit PCM in 3-byte containers: a header hound parses but whose
    /// samples it will not read.
    #[test]
    fn test_decode_rejects_20_bit_pcm() {
        let data = [0u8; 6];
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&1u16.to_le_bytes()); // channels
        bytes.extend_from_slice(&8000u32.to_le_bytes());
        bytes.extend_from_slice(&24000u32.to_le_bytes()); // byte rate
        bytes.extend_from_slice(&3u16.to_le_bytes()); // block align
        bytes.extend_from_slice(&20u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&data);

        assert!(AudioSegment::from_wav_bytes(&bytes).is_err());
    }

    #[test]
    fn test_decode_float_maps_to_32_bit() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut buffer = Vec::new();
        let mut writer = WavWriter::new(Cursor::new(&mut buffer), spec).unwrap();
        writer.write_sample(0.5f32).unwrap();
        writer.write_sample(-1.0f32).unwrap();
        writer.finalize().unwrap();

        let segment = AudioSegment::from_wav_bytes(&buffer).unwrap();
        assert_eq!(segment.sample_width(), 4);
        assert_eq!(segment.samples(), &[1 << 30, i32::MIN]);
    }

    #[test]
    fn test_sample_width_conversion_scales_by_powers_of_two() {
        let segment = AudioSegment::new(vec![256, -256, 32767, -32768], 8000, 1, 2);

        let eight = segment.set_sample_width(1);
        assert_eq!(eight.samples(), &[1, -1, 127, -128]);

        let twenty_four = segment.set_sample_width(3);
        assert_eq!(twenty_four.samples(), &[65536, -65536, 8388352, -8388608]);

        let back = twenty_four.set_sample_width(2);
        assert_eq!(back.samples(), segment.samples());
    }

    #[test]
    fn test_narrowing_preserves_sign() {
        let segment = AudioSegment::new(vec![-1, 1], 8000, 1, 2);
        assert_eq!(segment.set_sample_width(1).samples(), &[-1, 0]);
    }

    #[test]
    fn test_to_i16_samples_from_each_width() {
        assert_eq!(AudioSegment::new(vec![127, -128], 8000, 1, 1).to_i16_samples(), vec![32512, -32768]);
        assert_eq!(AudioSegment::new(vec![8388607, -8388608], 8000, 1, 3).to_i16_samples(), vec![32767, -32768]);
        assert_eq!(AudioSegment::new(vec![i32::MAX], 8000, 1, 4).to_i16_samples(), vec![32767]);
    }

    #[test]
    fn test_wav_export_uses_sample_width() {
        let segment = AudioSegment::new(vec![0, 1000, -1000], 16000, 1, 2);

        for (width, bits) in [(1u8, 8u16), (2, 16), (3, 24)] {
            let bytes = segment.set_sample_width(width).to_wav_bytes().unwrap();
            let reader = WavReader::new(Cursor::new(&bytes)).unwrap();
            assert_eq!(reader.spec().bits_per_sample, bits);
            assert_eq!(reader.spec().sample_rate, 16000);
            assert_eq!(reader.len(), 3);
        }
    }

    #[test]
    fn test_24_bit_round_trip_is_lossless() {
        let original = AudioSegment::new(vec![8388607, -8388608, 12345], 44100, 1, 3);
        let decoded = AudioSegment::from_wav_bytes(&original.to_wav_bytes().unwrap()).unwrap();
        assert_eq!(decoded, original);
    }
}
