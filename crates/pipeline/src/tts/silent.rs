//! Silence generator for development and tests

use voice_duplex_core::{Result, SpeechSegment, SpeechSynthesizer};

/// Roughly 50ms of silence per character, in one segment
#[derive(Debug, Clone)]
pub struct SilentSynthesizer {
    sample_rate: u32,
}

impl SilentSynthesizer {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl SpeechSynthesizer for SilentSynthesizer {
    fn synthesize(&mut self, text: &str) -> Result<Vec<SpeechSegment>> {
        let samples_per_char = self.sample_rate as usize / 20;
        let len = text.chars().count() * samples_per_char;
        if len == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![SpeechSegment::new(vec![0.0; len])])
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn model_name(&self) -> &str {
        "silent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_scales_with_text() {
        let mut tts = SilentSynthesizer::new(24_000);
        let segments = tts.synthesize("Okay.").unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].samples.len(), 5 * 1_200);
        assert!(segments[0].samples.iter().all(|s| *s == 0.0));
        assert!(tts.synthesize("").unwrap().is_empty());
    }
}
