pub mod trie;
pub mod block;
pub mod log_index;
