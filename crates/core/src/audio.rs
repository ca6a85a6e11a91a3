//! PCM16 and WAV helpers
//!
//! Inbound audio is raw little-endian PCM16 mono at 16kHz. Transcription
//! backends want a WAV container around it; synthesized audio arrives as
//! normalized `f32` samples and leaves as PCM16 again.

use std::io::Cursor;

use crate::Result;

const PCM16_SCALE: f32 = 32767.0;

/// Client capture rate, what transcription expects
pub const INPUT_SAMPLE_RATE: u32 = 16_000;

/// Bytes per second of mono PCM16 at the input rate
pub const INPUT_PCM16_BYTES_PER_SEC: usize = INPUT_SAMPLE_RATE as usize * 2;

/// Seconds of audio held in `len` bytes of 16kHz mono PCM16
pub fn pcm16_duration_secs(len: usize) -> f64 {
    len as f64 / INPUT_PCM16_BYTES_PER_SEC as f64
}

/// Wrap raw 16kHz mono PCM16 into a WAV container.
///
/// A trailing odd byte is dropped.
pub fn pcm16_to_wav(pcm: &[u8]) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: INPUT_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(pcm.len() + 44));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for chunk in pcm.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Convert normalized samples to little-endian PCM16, clamping to [-1, 1]
pub fn samples_to_pcm16(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&sample| {
            let clamped = sample.clamp(-1.0, 1.0);
            ((clamped * PCM16_SCALE) as i16).to_le_bytes()
        })
        .collect()
}
