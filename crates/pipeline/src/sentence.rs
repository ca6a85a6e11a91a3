//! Sentence accumulation over a token stream
//!
//! Tokens are appended to a buffer. As soon as the buffer contains a
//! terminal mark (`.`, `?`, `!`), everything up to and including the last
//! mark is released as one unit and the rest carries over.

const TERMINATORS: [char; 3] = ['.', '?', '!'];

/// Text dispatched to synthesis as one piece
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceUnit {
    /// Position within the turn, from 0
    pub index: usize,
    pub text: String,
}

impl SentenceUnit {
    /// Text with surrounding whitespace removed, as sent to synthesis
    pub fn speakable(&self) -> &str {
        self.text.trim()
    }
}

#[derive(Debug, Default)]
pub struct SentenceAccumulator {
    buffer: String,
    emitted: usize,
}

impl SentenceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token; returns a unit if the buffer now closes one
    pub fn push(&mut self, token: &str) -> Option<SentenceUnit> {
        self.buffer.push_str(token);

        // terminators are ASCII, so one past the match is a char boundary
        let cut = self.buffer.rfind(TERMINATORS)? + 1;
        let remainder = self.buffer.split_off(cut);
        let text = std::mem::replace(&mut self.buffer, remainder);
        Some(self.unit(text))
    }

    /// Release whatever is left at end of stream, unless it is blank
    pub fn flush(&mut self) -> Option<SentenceUnit> {
        let text = std::mem::take(&mut self.buffer);
        if text.trim().is_empty() {
            return None;
        }
        Some(self.unit(text))
    }

    pub fn pending(&self) -> &str {
        &self.buffer
    }

    fn unit(&mut self, text: String) -> SentenceUnit {
        let index = self.emitted;
        self.emitted += 1;
        SentenceUnit { index, text }
    }
}
