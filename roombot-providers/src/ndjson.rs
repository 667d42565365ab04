//! Newline-delimited record framing for the chat response stream.
//!
//! The transport hands over chunks of arbitrary size. A record may be split
//! across any number of chunks, including in the middle of a UTF-8 sequence,
//! so the carry-over is kept as raw bytes and only complete lines are decoded.

#[derive(Debug, Default)]
pub struct FrameReader {
    carry: Vec<u8>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every record it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        // Bytes already in the carry hold no newline; only the new chunk is scanned.
        let scanned = self.carry.len();
        self.carry.extend_from_slice(chunk);

        let mut out = Vec::new();
        let mut start = 0;
        for (i, &b) in self.carry[scanned..].iter().enumerate() {
            if b != b'\n' {
                continue;
            }
            let end = scanned + i;
            if let Some(record) = decode_line(&self.carry[start..end]) {
                out.push(record);
            }
            start = end + 1;
        }
        self.carry.drain(..start);
        out
    }

    /// Flushes the last record when the stream ends without a trailing newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.carry);
        decode_line(&rest)
    }

    pub fn has_pending(&self) -> bool {
        !self.carry.is_empty()
    }
}

fn decode_line(bytes: &[u8]) -> Option<String> {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    let text = String::from_utf8_lossy(bytes);
    if text.trim().is_empty() {
        return None;
    }
    Some(text.into_owned())
}

/// Splits a complete body into records. Convenience for buffered responses and tests.
pub fn split_records(body: &[u8]) -> Vec<String> {
    let mut reader = FrameReader::new();
    let mut out = reader.push(body);
    out.extend(reader.finish());
    out
}
