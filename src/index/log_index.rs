use std::collections::BTreeSet;
use std::sync::Arc;
use bytes::{BufMut, Bytes};
use tracing::trace;
use crate::analysis::token::{self, TOKEN_MASK};
use crate::analysis::tokenizer;
use crate::core::binary::{self, I32_SIZE};
use crate::core::error::{Error, Result};
use crate::index::block::IndexBlock;
use crate::index::trie::ReadOnlyTrie;
use crate::log::text::LogText;
use crate::search::query::{SearchQuery, TokenPattern};
use crate::search::results::SearchResults;

/// Token index over a contiguous range of log lines.
///
/// Trie keys hold a token in the upper 32 bits and the ordinal of a block
/// containing it in the lower 32 bits. Blocks are ordered and contiguous.
#[derive(Debug, Clone, PartialEq)]
pub struct LogIndex {
    blocks: Vec<IndexBlock>,
    trie: ReadOnlyTrie,
}

impl LogIndex {
    pub fn new(blocks: Vec<IndexBlock>, trie: ReadOnlyTrie) -> Self {
        LogIndex { blocks, trie }
    }

    pub fn empty() -> Self {
        LogIndex::new(Vec::new(), ReadOnlyTrie::empty())
    }

    /// Single-block index over plain text starting at `line_index`
    pub fn build(line_index: usize, plain_text: Arc<LogText>) -> Result<Self> {
        let trie = tokenizer::token_trie(plain_text.data())?;
        let block = IndexBlock::from_plain_text(line_index, plain_text)?;
        Ok(LogIndex::new(vec![block], trie))
    }

    /// Concatenate indexes in line order, renumbering block ordinals
    pub fn merge<'a, I>(indexes: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a LogIndex>,
    {
        let mut blocks = Vec::new();
        let mut keys = Vec::new();
        for index in indexes {
            let base = blocks.len() as u32;
            keys.extend(
                index
                    .trie
                    .keys()
                    .into_iter()
                    .map(|key| token::block_key(key, token::key_block(key) + base)),
            );
            blocks.extend(index.blocks.iter().cloned());
        }

        let mut merged = LogIndex::new(blocks, ReadOnlyTrie::from_keys(keys)?);
        if let Some(first) = merged.blocks.first().map(|b| b.line_index) {
            merged.set_base_line_index(first);
        }
        Ok(merged)
    }

    pub fn blocks(&self) -> &[IndexBlock] {
        &self.blocks
    }

    pub fn trie(&self) -> &ReadOnlyTrie {
        &self.trie
    }

    pub fn line_index(&self) -> usize {
        self.blocks.first().map_or(0, |b| b.line_index)
    }

    pub fn line_count(&self) -> usize {
        self.blocks.iter().map(|b| b.line_count).sum()
    }

    /// Lay blocks out back to back starting at `line_index`
    pub fn set_base_line_index(&mut self, line_index: usize) {
        let mut next = line_index;
        for block in &mut self.blocks {
            block.line_index = next;
            next += block.line_count;
        }
    }

    pub fn with_base_line_index(mut self, line_index: usize) -> Self {
        self.set_base_line_index(line_index);
        self
    }

    /// Ordinals of blocks that may contain the query
    pub fn candidate_blocks(&self, query: &SearchQuery) -> BTreeSet<u32> {
        let mut candidates: BTreeSet<u32> = query
            .leading()
            .iter()
            .flat_map(|pattern| self.matching_blocks(pattern))
            .collect();

        for pattern in query.following() {
            if candidates.is_empty() {
                break;
            }
            let blocks: BTreeSet<u32> = self.matching_blocks(pattern).collect();
            candidates.retain(|block| blocks.contains(block));
        }
        candidates
    }

    fn matching_blocks(&self, pattern: &TokenPattern) -> impl Iterator<Item = u32> {
        self.trie
            .enumerate_masked(pattern.value & TOKEN_MASK, pattern.mask & TOKEN_MASK)
            .into_iter()
            .map(token::key_block)
    }

    /// Lines at or after `first_line` containing the query, case-insensitively
    pub fn search(
        &self,
        query: &SearchQuery,
        first_line: usize,
        max_results: usize,
    ) -> Result<SearchResults> {
        let mut results = SearchResults::default();
        let stats = &mut results.stats;
        stats.num_blocks = self.blocks.len();

        let candidates = self.candidate_blocks(query);
        stats.num_candidate_blocks = candidates.len();

        for ordinal in candidates {
            let block = self.blocks.get(ordinal as usize).ok_or_else(|| {
                Error::corrupt(format!(
                    "trie references block {} of {}",
                    ordinal,
                    self.blocks.len()
                ))
            })?;
            if block.line_index + block.line_count <= first_line {
                stats.num_skipped_blocks += 1;
                continue;
            }

            stats.num_scanned_blocks += 1;
            stats.num_decompressed_bytes += block.compressed_plain_text().len();
            let text = block.plain_text()?;

            let mut found = false;
            for (idx, line) in text.lines().enumerate() {
                let line_index = block.line_index + idx;
                if line_index < first_line || !query.matches_line(line) {
                    continue;
                }
                found = true;
                if results.lines.len() == max_results {
                    results.truncated = true;
                    break;
                }
                results.lines.push(line_index);
            }
            if !found {
                stats.num_false_positive_blocks += 1;
            }
            if results.truncated {
                break;
            }
        }

        trace!(stats = ?results.stats, hits = results.lines.len(), "index search");
        Ok(results)
    }

    pub fn serialized_size(&self) -> usize {
        I32_SIZE
            + self.blocks.iter().map(IndexBlock::serialized_size).sum::<usize>()
            + self.trie.serialized_size()
    }

    pub fn write(&self, output: &mut impl BufMut) -> Result<()> {
        binary::put_count(output, self.blocks.len())?;
        for block in &self.blocks {
            block.write(output)?;
        }
        self.trie.write(output);
        Ok(())
    }

    pub fn read(input: &mut Bytes) -> Result<Self> {
        let block_count = binary::read_count(input, "index block count")?;
        // Each block takes at least nine bytes; reject counts the input cannot hold
        if block_count > input.len() / (2 * I32_SIZE + 1) {
            return Err(Error::corrupt(format!("implausible index block count {}", block_count)));
        }

        let mut blocks = Vec::with_capacity(block_count);
        for _ in 0..block_count {
            blocks.push(IndexBlock::read(input)?);
        }
        let trie = ReadOnlyTrie::read(input)?;
        Ok(LogIndex::new(blocks, trie))
    }
}
