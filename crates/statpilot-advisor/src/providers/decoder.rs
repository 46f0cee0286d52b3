//! Incremental line decoding for chunked HTTP bodies
//!
//! Network chunks split lines, and lines split multi-byte UTF-8 sequences, at
//! arbitrary byte offsets. Bytes are buffered until a newline arrives and only
//! complete lines are decoded.

/// Buffers raw bytes and yields complete lines
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed.
    ///
    /// Lines are returned without their terminator (`\n` or `\r\n`). Invalid
    /// UTF-8 is replaced rather than rejected.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buffer[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            lines.push(decode_line(&self.buffer[start..end]));
            start = end + 1;
        }
        self.buffer.drain(..start);

        lines
    }

    /// Return the trailing unterminated line, if any
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = decode_line(&self.buffer);
        self.buffer.clear();
        Some(line)
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Payload of one server-sent-events line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine<'a> {
    /// A `data:` field
    Data(&'a str),
    /// The `[DONE]` terminator
    Done,
    /// Comments, other fields, blank separators
    Ignored,
}

/// Classify one SSE line
pub fn parse_sse_line(line: &str) -> SseLine<'_> {
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Ignored;
    };
    let data = data.trim();
    if data == "[DONE]" {
        SseLine::Done
    } else if data.is_empty() {
        SseLine::Ignored
    } else {
        SseLine::Data(data)
    }
}
