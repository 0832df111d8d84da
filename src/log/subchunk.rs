use std::sync::{Arc, OnceLock};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::warn;
use crate::analysis::token;
use crate::compression::compress;
use crate::core::binary::{self, I32_SIZE};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::LogType;
use crate::index::block::IndexBlock;
use crate::index::log_index::LogIndex;
use crate::index::trie::ReadOnlyTrie;
use crate::log::text::LogText;

/// Compressed text and a legacy plain-text cache; no index
pub const VERSION_NO_INDEX: i32 = 0;
/// Compressed text, compressed plain text and a single trie
pub const VERSION_INLINE_TRIE: i32 = 1;
/// Compressed text and a full index. Always written.
pub const VERSION_CURRENT: i32 = 2;

/// Serialization unit of a log: a run of whole lines with lazily derived forms.
///
/// Exactly one of the text and the compressed text is supplied at construction.
/// The other, and the index, are derived on first use and cached; a cached value
/// is never replaced. Concurrent first uses may both do the work, and the loser
/// adopts the winner's value.
#[derive(Debug)]
pub struct LogSubChunk {
    log_type: LogType,
    offset: u64,
    length: usize,
    line_index: usize,
    line_count: usize,
    text: OnceLock<Arc<LogText>>,
    compressed_text: OnceLock<Bytes>,
    index: OnceLock<Arc<LogIndex>>,
}

impl LogSubChunk {
    pub fn new(log_type: LogType, offset: u64, line_index: usize, text: LogText) -> Self {
        let sub_chunk = LogSubChunk {
            log_type,
            offset,
            length: text.len(),
            line_index,
            line_count: text.line_count(),
            text: OnceLock::new(),
            compressed_text: OnceLock::new(),
            index: OnceLock::new(),
        };
        let _ = sub_chunk.text.set(Arc::new(text));
        sub_chunk
    }

    pub fn from_parts(
        log_type: LogType,
        offset: u64,
        length: usize,
        line_index: usize,
        line_count: usize,
        compressed_text: Bytes,
        index: Option<LogIndex>,
    ) -> Self {
        let sub_chunk = LogSubChunk {
            log_type,
            offset,
            length,
            line_index,
            line_count,
            text: OnceLock::new(),
            compressed_text: OnceLock::new(),
            index: OnceLock::new(),
        };
        let _ = sub_chunk.compressed_text.set(compressed_text);
        if let Some(index) = index {
            let _ = sub_chunk.index.set(Arc::new(index));
        }
        sub_chunk
    }

    pub fn log_type(&self) -> LogType {
        self.log_type
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Uncompressed length in bytes
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn line_index(&self) -> usize {
        self.line_index
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn has_index(&self) -> bool {
        self.index.get().is_some()
    }

    pub fn inflate_text(&self) -> Result<Arc<LogText>> {
        if let Some(text) = self.text.get() {
            return Ok(text.clone());
        }

        let compressed = self.compressed_text.get().ok_or_else(|| {
            Error::new(ErrorKind::Internal, "sub-chunk has neither text nor compressed text")
        })?;
        let text = LogText::new(compress::decompress(compressed, self.length)?);
        if text.line_count() != self.line_count {
            return Err(Error::corrupt(format!(
                "sub-chunk at offset {} has {} lines, header says {}",
                self.offset,
                text.line_count(),
                self.line_count
            )));
        }

        Ok(self.text.get_or_init(|| Arc::new(text)).clone())
    }

    pub fn deflate_text(&self) -> Result<Bytes> {
        if let Some(compressed) = self.compressed_text.get() {
            return Ok(compressed.clone());
        }

        let text = self.text.get().ok_or_else(|| {
            Error::new(ErrorKind::Internal, "sub-chunk has neither text nor compressed text")
        })?;
        let compressed = compress::compress(text.data())?;
        Ok(self.compressed_text.get_or_init(|| compressed).clone())
    }

    /// Index over `[line_index, line_index + line_count)`
    pub fn build_index(&self) -> Result<Arc<LogIndex>> {
        if let Some(index) = self.index.get() {
            return Ok(index.clone());
        }

        let text = self.inflate_text()?;
        let plain_text = match self.log_type {
            LogType::Text => text,
            other => Arc::new(text.to_plain_text(other)),
        };
        let index = LogIndex::build(self.line_index, plain_text)?;
        Ok(self.index.get_or_init(|| Arc::new(index)).clone())
    }

    /// Same position and same text; used to recognise duplicate writes
    pub fn text_matches(&self, other: &LogSubChunk) -> bool {
        if self.log_type != other.log_type
            || self.offset != other.offset
            || self.length != other.length
            || self.line_index != other.line_index
            || self.line_count != other.line_count
        {
            return false;
        }
        if let (Some(a), Some(b)) = (self.text.get(), other.text.get()) {
            return a.data() == b.data();
        }
        // Compression is deterministic, so equal text means equal compressed bytes
        match (self.deflate_text(), other.deflate_text()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    pub fn read(input: &mut Bytes, offset: u64, line_index: usize) -> Result<Self> {
        let version = binary::read_i32(input, "sub-chunk version")?;
        if !(VERSION_NO_INDEX..=VERSION_CURRENT).contains(&version) {
            return Err(Error::format(format!("unknown sub-chunk version {}", version)));
        }

        let log_type = LogType::from_i32(binary::read_i32(input, "sub-chunk type")?)?;
        let length = binary::read_count(input, "sub-chunk length")?;
        let line_count = binary::read_count(input, "sub-chunk line count")?;
        let compressed_text = binary::read_bytes(input, "compressed text")?;

        let index = match version {
            VERSION_NO_INDEX => {
                binary::read_bytes(input, "legacy plain text")?;
                None
            }
            VERSION_INLINE_TRIE => {
                let compressed_plain_text = binary::read_bytes(input, "compressed plain text")?;
                let trie = ReadOnlyTrie::read(input)?;
                inline_trie_index(line_index, line_count, compressed_plain_text, trie)
            }
            _ => {
                let index = LogIndex::read(input)?.with_base_line_index(line_index);
                if index.line_count() != line_count {
                    return Err(Error::corrupt(format!(
                        "sub-chunk index covers {} lines, header says {}",
                        index.line_count(),
                        line_count
                    )));
                }
                Some(index)
            }
        };

        Ok(LogSubChunk::from_parts(
            log_type,
            offset,
            length,
            line_index,
            line_count,
            compressed_text,
            index,
        ))
    }

    pub fn serialized_size(&self) -> Result<usize> {
        let compressed = self.deflate_text()?;
        let index = self.build_index()?;
        Ok(4 * I32_SIZE + binary::bytes_size(compressed.len()) + index.serialized_size())
    }

    /// Always emits the current layout
    pub fn write(&self, output: &mut impl BufMut) -> Result<()> {
        let compressed = self.deflate_text()?;
        let index = self.build_index()?;

        binary::put_i32(output, VERSION_CURRENT);
        binary::put_i32(output, self.log_type.to_i32());
        binary::put_count(output, self.length)?;
        binary::put_count(output, self.line_count)?;
        binary::put_bytes(output, &compressed);
        index.write(output)?;
        Ok(())
    }

    /// Serialize into an exactly pre-sized buffer
    pub fn to_bytes(&self) -> Result<Bytes> {
        let size = self.serialized_size()?;
        let mut output = BytesMut::with_capacity(size);
        self.write(&mut output)?;
        if output.len() != size {
            return Err(Error::size_mismatch("sub-chunk", size, output.len()));
        }
        Ok(output.freeze())
    }
}

/// Single-block index from a version 1 record.
///
/// The stored trie is only trusted when every key points at block 0; anything
/// else is dropped and the index is rebuilt from the text on demand.
fn inline_trie_index(
    line_index: usize,
    line_count: usize,
    compressed_plain_text: Bytes,
    trie: ReadOnlyTrie,
) -> Option<LogIndex> {
    if let Some(key) = trie.keys().into_iter().find(|&key| token::key_block(key) != 0) {
        warn!(line_index, key, "discarding inline trie with foreign block ordinals");
        return None;
    }
    let block = IndexBlock::new(line_index, line_count, compressed_plain_text);
    Some(LogIndex::new(vec![block], trie))
}
