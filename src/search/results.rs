use std::ops::AddAssign;

/// Counters describing how much work a search did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub num_blocks: usize,
    pub num_skipped_blocks: usize,         // Ended before the first requested line
    pub num_candidate_blocks: usize,       // Passed every trie pattern
    pub num_scanned_blocks: usize,
    pub num_false_positive_blocks: usize,  // Scanned without a verified hit
    pub num_decompressed_bytes: usize,
}

impl AddAssign<&SearchStats> for SearchStats {
    fn add_assign(&mut self, other: &SearchStats) {
        self.num_blocks += other.num_blocks;
        self.num_skipped_blocks += other.num_skipped_blocks;
        self.num_candidate_blocks += other.num_candidate_blocks;
        self.num_scanned_blocks += other.num_scanned_blocks;
        self.num_false_positive_blocks += other.num_false_positive_blocks;
        self.num_decompressed_bytes += other.num_decompressed_bytes;
    }
}

/// Matching line numbers, ascending
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub lines: Vec<usize>,
    pub stats: SearchStats,
    /// Set when `max_results` cut the scan short
    pub truncated: bool,
}
