//! Bounded capture of process output for sniffing and error messages

use crate::defaults::{OUTPUT_BUFFER_BYTES, OUTPUT_TAIL_CHARS};

/// Accumulated output, trimmed from the front once it grows past its cap
#[derive(Debug)]
pub struct OutputBuffer {
    text: String,
    cap: usize,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::with_capacity(OUTPUT_BUFFER_BYTES)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            text: String::new(),
            cap,
        }
    }

    pub fn push_str(&mut self, text: &str) {
        self.text.push_str(text);

        if self.text.len() > self.cap {
            let mut cut = self.text.len() - self.cap;
            while !self.text.is_char_boundary(cut) {
                cut += 1;
            }
            self.text.drain(..cut);
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The last few hundred characters, for error messages.
    pub fn tail(&self) -> String {
        tail_chars(&self.text, OUTPUT_TAIL_CHARS)
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Last `max` characters of `text`, trimmed, prefixed with `...` when cut.
pub fn tail_chars(text: &str, max: usize) -> String {
    let text = text.trim();
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    let tail: String = text.chars().skip(count - max).collect();
    format!("...{tail}")
}
