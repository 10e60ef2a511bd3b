//! Splits raw channel output into lines.

use std::collections::VecDeque;

/// Accumulates output chunks and releases complete lines in order.
///
/// Chunks may end mid-line or mid-character; bytes are held until a newline
/// arrives, so multi-byte characters split across chunks decode correctly.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    partial: Vec<u8>,
    ready: VecDeque<String>,
}

impl LineBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            if byte == b'\n' {
                let line = std::mem::take(&mut self.partial);
                self.ready.push_back(decode(line));
            } else {
                self.partial.push(byte);
            }
        }
    }

    pub(crate) fn pop(&mut self) -> Option<String> {
        self.ready.pop_front()
    }

    /// Release an unterminated trailing fragment as a final line.
    pub(crate) fn finish(&mut self) {
        if !self.partial.is_empty() {
            let line = std::mem::take(&mut self.partial);
            self.ready.push_back(decode(line));
        }
    }

    pub(crate) fn clear(&mut self) {
        self.partial.clear();
        self.ready.clear();
    }
}

fn decode(mut line: Vec<u8>) -> String {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8_lossy(&line).into_owned()
}
