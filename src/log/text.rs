use bytes::{Bytes, BytesMut};
use serde::Deserialize;
use crate::core::types::LogType;

/// Immutable log text with a line offset table.
///
/// A line is terminated by `\n`; a trailing unterminated run is one more line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogText {
    data: Bytes,
    line_offsets: Vec<usize>,  // line_count + 1 entries, last one == data.len()
}

impl LogText {
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let mut line_offsets = vec![0];
        for (pos, &byte) in data.iter().enumerate() {
            if byte == b'\n' {
                line_offsets.push(pos + 1);
            }
        }
        if line_offsets.last().copied() != Some(data.len()) {
            line_offsets.push(data.len());
        }
        LogText { data, line_offsets }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.line_offsets.len() - 1
    }

    pub fn line_offset(&self, line: usize) -> Option<usize> {
        self.line_offsets.get(line).copied()
    }

    /// Line contents without the terminating newline
    pub fn line(&self, line: usize) -> Option<&[u8]> {
        let start = *self.line_offsets.get(line)?;
        let end = *self.line_offsets.get(line + 1)?;
        let bytes = &self.data[start..end];
        Some(bytes.strip_suffix(b"\n").unwrap_or(bytes))
    }

    pub fn lines(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.line_count()).filter_map(move |idx| self.line(idx))
    }

    /// Reduce to the text a reader sees, one output line per input line
    pub fn to_plain_text(&self, log_type: LogType) -> LogText {
        match log_type {
            LogType::Text => self.clone(),
            LogType::Structured => {
                let mut plain = BytesMut::with_capacity(self.len());
                for line in self.lines() {
                    append_plain_line(&mut plain, line);
                    plain.extend_from_slice(b"\n");
                }
                LogText::new(plain.freeze())
            }
        }
    }
}

#[derive(Deserialize)]
struct StructuredEvent {
    message: Option<String>,
}

/// Appends the event message, or the raw line when it is not a structured event
fn append_plain_line(output: &mut BytesMut, line: &[u8]) {
    match serde_json::from_slice::<StructuredEvent>(line) {
        Ok(StructuredEvent { message: Some(message) }) => {
            // Embedded newlines would shift every following line number
            output.extend(message.bytes().map(|b| if b == b'\n' { b' ' } else { b }));
        }
        _ => output.extend_from_slice(line),
    }
}
