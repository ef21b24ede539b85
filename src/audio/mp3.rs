//! MP3 encoding through LAME.
//!
//! MP3 has no PCM bit depth, so every MP3 output is encoded from 16-bit
//! samples at one fixed bitrate whatever depth the combination nominally has.

use crate::audio::segment::AudioSegment;
use mp3lame_encoder::{Bitrate, Builder, DualPcm, FlushNoGap, MonoPcm};

/// LAME needs at least this much room to flush its last frames.
const FLUSH_RESERVE_BYTES: usize = 7200;

/// Map a bitrate in kbit/s onto one LAME accepts.
pub fn bitrate_from_kbps(kbps: u32) -> Option<Bitrate> {
    let bitrate = match kbps {
        8 => Bitrate::Kbps8,
        16 => Bitrate::Kbps16,
        24 => Bitrate::Kbps24,
        32 => Bitrate::Kbps32,
        40 => Bitrate::Kbps40,
        48 => Bitrate::Kbps48,
        64 => Bitrate::Kbps64,
        80 => Bitrate::Kbps80,
        96 => Bitrate::Kbps96,
        112 => Bitrate::Kbps112,
        128 => Bitrate::Kbps128,
        160 => Bitrate::Kbps160,
        192 => Bitrate::Kbps192,
        224 => Bitrate::Kbps224,
        256 => Bitrate::Kbps256,
        320 => Bitrate::Kbps320,
        _ => return None,
    };
    Some(bitrate)
}

/// Encode a whole segment to an MP3 byte stream.
///
/// Mono and stereo are fed to LAME as-is. LAME cannot take more than two
/// channels, so anything wider is reported as an error.
pub fn encode(segment: &AudioSegment, bitrate_kbps: u32) -> Result<Vec<u8>, String> {
    let bitrate = bitrate_from_kbps(bitrate_kbps)
        .ok_or_else(|| format!("unsupported MP3 bitrate {} kbit/s", bitrate_kbps))?;
    let channels = match segment.channels() {
        1 => 1u8,
        2 => 2u8,
        other => return Err(format!("LAME supports 1 or 2 channels, got {}", other)),
    };

    let mut builder = Builder::new().ok_or_else(|| "could not allocate LAME encoder".to_string())?;
    builder
        .set_num_channels(channels)
        .map_err(|e| format!("set channels: {:?}", e))?;
    builder
        .set_sample_rate(segment.sample_rate())
        .map_err(|e| format!("set sample rate: {:?}", e))?;
    builder
        .set_brate(bitrate)
        .map_err(|e| format!("set bitrate: {:?}", e))?;
    let mut encoder = builder.build().map_err(|e| format!("init LAME: {:?}", e))?;

    let pcm = segment.to_i16_samples();
    let mut output = Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(pcm.len()) + FLUSH_RESERVE_BYTES);

    let encoded = if channels == 1 {
        encoder.encode_to_vec(MonoPcm(&pcm), &mut output)
    } else {
        if pcm.len() % 2 != 0 {
            return Err(format!(
                "stereo input has an unpaired trailing sample ({} samples)",
                pcm.len()
            ));
        }
        let (left, right): (Vec<i16>, Vec<i16>) = pcm
            .chunks_exact(2)
            .map(|frame| (frame[0], frame[1]))
            .unzip();
        encoder.encode_to_vec(DualPcm { left: &left, right: &right }, &mut output)
    };
    encoded.map_err(|e| format!("encode: {:?}", e))?;

    encoder
        .flush_to_vec::<FlushNoGap>(&mut output)
        .map_err(|e| format!("flush: {:?}", e))?;

    Ok(output)
}
