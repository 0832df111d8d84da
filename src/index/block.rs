use std::sync::{Arc, OnceLock};
use bytes::{BufMut, Bytes};
use crate::compression::compress;
use crate::core::binary::{self, I32_SIZE};
use crate::core::error::{Error, Result};
use crate::log::text::LogText;

/// Line range of an index together with the plain text used to verify matches
#[derive(Debug, Clone)]
pub struct IndexBlock {
    pub line_index: usize,
    pub line_count: usize,
    compressed_plain_text: Bytes,
    plain_text: OnceLock<Arc<LogText>>,
}

impl IndexBlock {
    pub fn new(line_index: usize, line_count: usize, compressed_plain_text: Bytes) -> Self {
        IndexBlock {
            line_index,
            line_count,
            compressed_plain_text,
            plain_text: OnceLock::new(),
        }
    }

    /// Build from plain text already in memory, keeping it as the cached copy
    pub fn from_plain_text(line_index: usize, plain_text: Arc<LogText>) -> Result<Self> {
        let compressed = compress::compress(plain_text.data())?;
        let block = IndexBlock::new(line_index, plain_text.line_count(), compressed);
        let _ = block.plain_text.set(plain_text);
        Ok(block)
    }

    pub fn compressed_plain_text(&self) -> &Bytes {
        &self.compressed_plain_text
    }

    /// Decompressed snapshot, memoized per block
    pub fn plain_text(&self) -> Result<Arc<LogText>> {
        if let Some(text) = self.plain_text.get() {
            return Ok(text.clone());
        }

        // Snapshots carry no length header; decompress and trust the line count
        let data = compress::decompress_unsized(&self.compressed_plain_text)?;
        let text = LogText::new(data);
        if text.line_count() != self.line_count {
            return Err(Error::corrupt(format!(
                "index block at line {} has {} lines, expected {}",
                self.line_index,
                text.line_count(),
                self.line_count
            )));
        }

        Ok(self.plain_text.get_or_init(|| Arc::new(text)).clone())
    }

    pub fn serialized_size(&self) -> usize {
        2 * I32_SIZE + binary::bytes_size(self.compressed_plain_text.len())
    }

    pub fn write(&self, output: &mut impl BufMut) -> Result<()> {
        binary::put_count(output, self.line_index)?;
        binary::put_count(output, self.line_count)?;
        binary::put_bytes(output, &self.compressed_plain_text);
        Ok(())
    }

    pub fn read(input: &mut Bytes) -> Result<Self> {
        let line_index = binary::read_count(input, "block line index")?;
        let line_count = binary::read_count(input, "block line count")?;
        let compressed_plain_text = binary::read_bytes(input, "block plain text")?;
        Ok(IndexBlock::new(line_index, line_count, compressed_plain_text))
    }
}

impl PartialEq for IndexBlock {
    fn eq(&self, other: &Self) -> bool {
        self.line_index == other.line_index
            && self.line_count == other.line_count
            && self.compressed_plain_text == other.compressed_plain_text
    }
}
