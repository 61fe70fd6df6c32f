//! Record Codec
//!
//! Encoding is one JSON document followed by `\n`. Decoding buffers bytes
//! until a newline arrives, so a record split across network reads is
//! reassembled. Lines that do not parse as a [`StreamEvent`] are skipped and
//! counted; they never abort the stream.

use thiserror::Error;

use super::StreamEvent;

/// Maximum size of one encoded record (1 MB)
///
/// A partial line that grows beyond this without a newline is discarded.
pub const MAX_RECORD_SIZE: usize = 1024 * 1024;

/// Minimum buffer capacity for decoder
const MIN_BUFFER_CAPACITY: usize = 4096;

/// Encoding failure
#[derive(Debug, Error)]
pub enum CodecError {
    /// Event could not be serialized
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Encoded record exceeds [`MAX_RECORD_SIZE`]
    #[error("record too large: {size} bytes (max: {max})")]
    TooLarge {
        /// Encoded size
        size: usize,
        /// Limit
        max: usize,
    },
}

/// Encode one event as a newline-terminated JSON line
///
/// # Errors
///
/// Returns [`CodecError`] if serialization fails or the record is too large.
pub fn encode(event: &StreamEvent) -> Result<Vec<u8>, CodecError> {
    let mut line =
        serde_json::to_vec(event).map_err(|e| CodecError::Serialization(e.to_string()))?;
    if line.len() > MAX_RECORD_SIZE {
        return Err(CodecError::TooLarge {
            size: line.len(),
            max: MAX_RECORD_SIZE,
        });
    }
    line.push(b'\n');
    Ok(line)
}

/// Encoder for streaming record output
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordEncoder;

impl RecordEncoder {
    /// Create a new encoder
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Encode an event to bytes
    ///
    /// # Errors
    ///
    /// See [`encode`].
    pub fn encode(&self, event: &StreamEvent) -> Result<Vec<u8>, CodecError> {
        encode(event)
    }
}

/// Decoder for newline-delimited records
///
/// Buffers incoming bytes and yields complete events.
#[derive(Debug)]
pub struct RecordDecoder {
    buffer: Vec<u8>,
    /// Position where we've consumed up to
    read_pos: usize,
    skipped: usize,
}

impl Default for RecordDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordDecoder {
    /// Create a new decoder
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MIN_BUFFER_CAPACITY),
            read_pos: 0,
            skipped: 0,
        }
    }

    /// Append bytes to the buffer
    pub fn push(&mut self, data: &[u8]) {
        if self.read_pos > self.buffer.len() / 2 && self.read_pos > MIN_BUFFER_CAPACITY {
            self.buffer.drain(..self.read_pos);
            self.read_pos = 0;
        }
        self.buffer.extend_from_slice(data);

        if self.available() > MAX_RECORD_SIZE && !self.buffer[self.read_pos..].contains(&b'\n') {
            tracing::warn!(
                buffered = self.available(),
                "Discarding oversized partial record"
            );
            self.clear();
            self.skipped += 1;
        }
    }

    /// Number of bytes not yet consumed
    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    /// Number of lines dropped because they did not parse
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Decode the next complete record, if one is buffered
    pub fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            let pending = &self.buffer[self.read_pos..];
            let newline = pending.iter().position(|&b| b == b'\n')?;
            let line_end = self.read_pos + newline;
            let parsed = parse_line(&self.buffer[self.read_pos..line_end]);
            self.read_pos = line_end + 1;
            match parsed {
                Line::Event(event) => return Some(event),
                Line::Blank => {}
                Line::Garbage => self.skipped += 1,
            }
        }
    }

    /// Decode every complete record currently buffered
    pub fn drain(&mut self) -> Vec<StreamEvent> {
        std::iter::from_fn(|| self.next_event()).collect()
    }

    /// Decode a final record that was not newline-terminated
    ///
    /// Call once the byte stream has ended.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        let parsed = parse_line(&self.buffer[self.read_pos..]);
        self.clear();
        match parsed {
            Line::Event(event) => Some(event),
            Line::Blank => None,
            Line::Garbage => {
                self.skipped += 1;
                None
            }
        }
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
    }
}

enum Line {
    Event(StreamEvent),
    Blank,
    Garbage,
}

fn parse_line(bytes: &[u8]) -> Line {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    if text.is_empty() {
        return Line::Blank;
    }
    match serde_json::from_str(text) {
        Ok(event) => Line::Event(event),
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparsable stream record");
            Line::Garbage
        }
    }
}
