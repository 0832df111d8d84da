use std::sync::Arc;
use bytes::{BufMut, Bytes, BytesMut};
use rayon::prelude::*;
use crate::core::binary::{self, I32_SIZE};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::LogType;
use crate::index::log_index::LogIndex;
use crate::log::subchunk::LogSubChunk;
use crate::log::text::LogText;

pub const CHUNK_VERSION: i32 = 1;

/// Contiguous byte range of one log, stored as consecutive sub-chunks
#[derive(Debug)]
pub struct LogChunk {
    offset: u64,
    line_index: usize,
    sub_chunks: Vec<LogSubChunk>,
}

impl LogChunk {
    /// Sub-chunks must be contiguous in bytes and lines, starting at the chunk
    pub fn new(offset: u64, line_index: usize, sub_chunks: Vec<LogSubChunk>) -> Result<Self> {
        let mut next_offset = offset;
        let mut next_line = line_index;
        for sub_chunk in &sub_chunks {
            if sub_chunk.offset() != next_offset || sub_chunk.line_index() != next_line {
                return Err(Error::new(
                    ErrorKind::InvalidArgument,
                    format!(
                        "sub-chunk at offset {} line {} does not follow offset {} line {}",
                        sub_chunk.offset(),
                        sub_chunk.line_index(),
                        next_offset,
                        next_line
                    ),
                ));
            }
            next_offset += sub_chunk.length() as u64;
            next_line += sub_chunk.line_count();
        }
        Ok(LogChunk { offset, line_index, sub_chunks })
    }

    /// Chunk holding one sub-chunk of fresh text
    pub fn from_text(log_type: LogType, offset: u64, line_index: usize, text: impl Into<Bytes>) -> Self {
        let sub_chunk = LogSubChunk::new(log_type, offset, line_index, LogText::new(text));
        LogChunk { offset, line_index, sub_chunks: vec![sub_chunk] }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn line_index(&self) -> usize {
        self.line_index
    }

    pub fn length(&self) -> usize {
        self.sub_chunks.iter().map(LogSubChunk::length).sum()
    }

    pub fn line_count(&self) -> usize {
        self.sub_chunks.iter().map(LogSubChunk::line_count).sum()
    }

    pub fn sub_chunks(&self) -> &[LogSubChunk] {
        &self.sub_chunks
    }

    /// Full uncompressed text
    pub fn text(&self) -> Result<Bytes> {
        if let [only] = self.sub_chunks.as_slice() {
            return Ok(only.inflate_text()?.data().clone());
        }
        let mut text = BytesMut::with_capacity(self.length());
        for sub_chunk in &self.sub_chunks {
            text.extend_from_slice(sub_chunk.inflate_text()?.data());
        }
        Ok(text.freeze())
    }

    /// Contents of an absolute line number, if this chunk holds it
    pub fn line(&self, line_index: usize) -> Result<Option<Bytes>> {
        let found = self.sub_chunks.iter().find(|s| {
            line_index >= s.line_index() && line_index < s.line_index() + s.line_count()
        });
        let Some(sub_chunk) = found else {
            return Ok(None);
        };

        let text = sub_chunk.inflate_text()?;
        let relative = line_index - sub_chunk.line_index();
        Ok(text.line(relative).map(|line| {
            let start = text.line_offset(relative).unwrap_or(0);
            text.data().slice(start..start + line.len())
        }))
    }

    /// Index over every line of the chunk; sub-chunk indexes build in parallel
    pub fn build_index(&self) -> Result<LogIndex> {
        let indexes = self
            .sub_chunks
            .par_iter()
            .map(LogSubChunk::build_index)
            .collect::<Result<Vec<Arc<LogIndex>>>>()?;
        if indexes.is_empty() {
            return Ok(LogIndex::empty());
        }
        LogIndex::merge(indexes.iter().map(|index| index.as_ref()))
    }

    /// Same position and same sub-chunk text
    pub fn text_matches(&self, other: &LogChunk) -> bool {
        self.offset == other.offset
            && self.line_index == other.line_index
            && self.sub_chunks.len() == other.sub_chunks.len()
            && self
                .sub_chunks
                .iter()
                .zip(&other.sub_chunks)
                .all(|(a, b)| a.text_matches(b))
    }

    pub fn serialized_size(&self) -> Result<usize> {
        let mut size = 2 * I32_SIZE;
        for sub_chunk in &self.sub_chunks {
            size += sub_chunk.serialized_size()?;
        }
        Ok(size)
    }

    pub fn write(&self, output: &mut impl BufMut) -> Result<()> {
        binary::put_i32(output, CHUNK_VERSION);
        binary::put_count(output, self.sub_chunks.len())?;
        for sub_chunk in &self.sub_chunks {
            sub_chunk.write(output)?;
        }
        Ok(())
    }

    /// Serialize into an exactly pre-sized buffer
    pub fn to_bytes(&self) -> Result<Bytes> {
        let size = self.serialized_size()?;
        let mut output = BytesMut::with_capacity(size);
        self.write(&mut output)?;
        if output.len() != size {
            return Err(Error::size_mismatch("chunk", size, output.len()));
        }
        Ok(output.freeze())
    }

    pub fn read(input: &mut Bytes, offset: u64, line_index: usize) -> Result<Self> {
        let version = binary::read_i32(input, "chunk version")?;
        if version != CHUNK_VERSION {
            return Err(Error::format(format!("unknown chunk version {}", version)));
        }
        let count = binary::read_count(input, "sub-chunk count")?;
        if count > input.len() / (4 * I32_SIZE) {
            return Err(Error::corrupt(format!("implausible sub-chunk count {}", count)));
        }

        let mut sub_chunks = Vec::with_capacity(count);
        let mut next_offset = offset;
        let mut next_line = line_index;
        for _ in 0..count {
            let sub_chunk = LogSubChunk::read(input, next_offset, next_line)?;
            next_offset += sub_chunk.length() as u64;
            next_line += sub_chunk.line_count();
            sub_chunks.push(sub_chunk);
        }
        Ok(LogChunk { offset, line_index, sub_chunks })
    }
}

/// Accumulates produced log output and cuts it into sub-chunks on line boundaries
pub struct LogChunkBuilder {
    log_type: LogType,
    offset: u64,
    line_index: usize,
    max_sub_chunk_length: usize,
    pending: BytesMut,
    sub_chunks: Vec<LogSubChunk>,
    next_offset: u64,
    next_line: usize,
}

impl LogChunkBuilder {
    pub fn new(log_type: LogType, offset: u64, line_index: usize, max_sub_chunk_length: usize) -> Self {
        LogChunkBuilder {
            log_type,
            offset,
            line_index,
            max_sub_chunk_length: max_sub_chunk_length.max(1),
            pending: BytesMut::new(),
            sub_chunks: Vec::new(),
            next_offset: offset,
            next_line: line_index,
        }
    }

    /// Bytes appended so far, flushed or not
    pub fn length(&self) -> usize {
        (self.next_offset - self.offset) as usize + self.pending.len()
    }

    pub fn append(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
        while self.pending.len() >= self.max_sub_chunk_length {
            // Cut after the last complete line that fits, or after the first line if none does
            let window = &self.pending[..self.max_sub_chunk_length];
            let cut = match window.iter().rposition(|&b| b == b'\n') {
                Some(pos) => pos + 1,
                None => match self.pending.iter().position(|&b| b == b'\n') {
                    Some(pos) => pos + 1,
                    None => break,
                },
            };
            let text = self.pending.split_to(cut).freeze();
            self.push_sub_chunk(text);
        }
    }

    fn push_sub_chunk(&mut self, text: Bytes) {
        let sub_chunk = LogSubChunk::new(self.log_type, self.next_offset, self.next_line, LogText::new(text));
        self.next_offset += sub_chunk.length() as u64;
        self.next_line += sub_chunk.line_count();
        self.sub_chunks.push(sub_chunk);
    }

    /// Flush remaining text, including an unterminated last line
    pub fn build(mut self) -> LogChunk {
        if !self.pending.is_empty() {
            let text = self.pending.split().freeze();
            self.push_sub_chunk(text);
        }
        LogChunk {
            offset: self.offset,
            line_index: self.line_index,
            sub_chunks: self.sub_chunks,
        }
    }
}
