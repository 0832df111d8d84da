use std::collections::BTreeSet;
use std::ops::Range;
use crate::analysis::token::{self, ByteClass, MAX_TOKEN_BYTES};
use crate::core::error::Result;
use crate::index::trie::ReadOnlyTrie;

/// Byte ranges of consecutive same-class runs, split at four bytes.
///
/// Cloning restarts nothing: a clone continues from the same position, and a
/// fresh call to [`token_runs`] always reproduces the same sequence.
#[derive(Debug, Clone)]
pub struct TokenRuns<'a> {
    text: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for TokenRuns<'a> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Range<usize>> {
        let start = self.pos;
        let first = *self.text.get(start)?;

        let class = ByteClass::of(first);
        let mut end = start + 1;
        if class.merges() {
            while end < self.text.len()
                && end - start < MAX_TOKEN_BYTES
                && ByteClass::of(self.text[end]) == class
            {
                end += 1;
            }
        }

        self.pos = end;
        Some(start..end)
    }
}

/// Lazy token sequence over a byte slice
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    runs: TokenRuns<'a>,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let run = self.runs.next()?;
        Some(token::pack(&self.runs.text[run]))
    }
}

pub fn token_runs(text: &[u8]) -> TokenRuns<'_> {
    TokenRuns { text, pos: 0 }
}

pub fn tokens(text: &[u8]) -> Tokens<'_> {
    Tokens { runs: token_runs(text) }
}

pub fn first_token(text: &[u8]) -> Option<u64> {
    tokens(text).next()
}

pub fn token_set(text: &[u8]) -> BTreeSet<u64> {
    tokens(text).collect()
}

/// Trie of every distinct token in `text`, keyed for block ordinal 0
pub fn token_trie(text: &[u8]) -> Result<ReadOnlyTrie> {
    // BTreeSet iterates in ascending order, which the FST builder requires
    ReadOnlyTrie::from_sorted(token_set(text))
}

/// Length of the same-class run starting at `start`, without the four byte cap
pub fn class_run_len(text: &[u8], start: usize) -> usize {
    let Some(&first) = text.get(start) else {
        return 0;
    };
    let class = ByteClass::of(first);
    if !class.merges() {
        return 1;
    }
    text[start..]
        .iter()
        .take_while(|&&b| ByteClass::of(b) == class)
        .count()
}

/// Case-folded four-byte window of `text` starting at `offset`.
///
/// The window may start before or run past the text; those positions are zero.
pub fn windowed_token_value(text: &[u8], offset: isize) -> u64 {
    let mut value = 0u64;
    for idx in 0..MAX_TOKEN_BYTES {
        value <<= 8;
        if let Some(byte) = byte_at(text, offset + idx as isize) {
            value |= token::fold(byte) as u64;
        }
    }
    value << 32
}

/// Mask companion to [`windowed_token_value`].
///
/// In-range positions are `0xFF`. Positions before the text are `0x00` (any
/// byte). Positions past the end are `0xFF`, requiring the zero padding an
/// exact-length token carries, unless `allow_partial` relaxes them to `0x00`
/// so longer tokens sharing the prefix also match.
pub fn windowed_token_mask(text: &[u8], offset: isize, allow_partial: bool) -> u64 {
    let mut mask = 0u64;
    for idx in 0..MAX_TOKEN_BYTES {
        mask <<= 8;
        let pos = offset + idx as isize;
        if pos < 0 {
            continue;
        }
        if (pos as usize) < text.len() || !allow_partial {
            mask |= 0xFF;
        }
    }
    mask << 32
}

fn byte_at(text: &[u8], pos: isize) -> Option<u8> {
    if pos < 0 {
        return None;
    }
    text.get(pos as usize).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token::{pack, TOKEN_MASK};
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    fn random_text(rng: &mut StdRng, len: usize) -> Vec<u8> {
        const ALPHABET: &[u8] = b"abcXYZ019 \t\n:[]-_./\xc3\xa9";
        (0..len).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())]).collect()
    }

    #[test]
    fn test_runs_split_by_class_and_length() {
        let text = b"Error: abcdefghij 12345\n\n";
        let runs: Vec<&[u8]> = token_runs(text).map(|r| &text[r]).collect();
        assert_eq!(
            runs,
            vec![
                &b"Erro"[..], b"r", b":", b" ", b"abcd", b"efgh", b"ij", b" ", b"1234", b"5",
                b"\n\n",
            ]
        );
    }

    #[test]
    fn test_other_bytes_never_merge() {
        let text = b"[[--";
        assert_eq!(tokens(text).count(), 4);
    }

    #[test]
    fn test_tokenize_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let len = rng.gen_range(0..200);
            let text = random_text(&mut rng, len);
            let first: Vec<u64> = tokens(&text).collect();
            let second: Vec<u64> = tokens(&text).collect();
            assert_eq!(first, second);

            // A cloned iterator replays the remainder identically
            let iter = tokens(&text);
            assert_eq!(iter.clone().collect::<Vec<_>>(), first);

            assert_eq!(first_token(&text), first.first().copied());
            assert_eq!(token_set(&text), first.iter().copied().collect());
        }
    }

    #[test]
    fn test_case_fold_invariance() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let text = random_text(&mut rng, 120);
            let flipped: Vec<u8> = text
                .iter()
                .map(|b| if b.is_ascii_lowercase() { b.to_ascii_uppercase() } else { b.to_ascii_lowercase() })
                .collect();
            assert_eq!(tokens(&text).collect::<Vec<_>>(), tokens(&flipped).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_runs_cover_text_and_respect_cap() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let text = random_text(&mut rng, 150);
            let mut expected_start = 0;
            for run in token_runs(&text) {
                assert_eq!(run.start, expected_start);
                assert!(run.len() >= 1 && run.len() <= MAX_TOKEN_BYTES);
                expected_start = run.end;
            }
            assert_eq!(expected_start, text.len());
        }
    }

    #[test]
    fn test_windowed_value_and_mask_are_consistent() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let len = rng.gen_range(1..40);
            let text = random_text(&mut rng, len);
            for offset in 0..text.len() as isize {
                let value = windowed_token_value(&text, offset);
                assert_eq!(value & windowed_token_mask(&text, offset, false), value);
                assert_eq!(value & windowed_token_mask(&text, offset, true), value);
            }
        }
    }

    #[test]
    fn test_windowed_matches_run_token_at_run_start() {
        let text = b"Build FAILED";
        for run in token_runs(text) {
            let value = windowed_token_value(&text[run.clone()], 0);
            assert_eq!(value, pack(&text[run]));
        }
    }

    #[test]
    fn test_windowed_boundaries() {
        assert_eq!(windowed_token_value(b"ab", -2), pack(b"\0\0ab"));
        assert_eq!(windowed_token_mask(b"ab", -2, false), 0x0000_FFFF_0000_0000);
        assert_eq!(windowed_token_mask(b"ab", 0, false), TOKEN_MASK);
        assert_eq!(windowed_token_mask(b"ab", 0, true), 0xFFFF_0000_0000_0000);
    }

    #[test]
    fn test_token_trie_holds_distinct_tokens() {
        let trie = token_trie(b"ok ok OK\n").unwrap();
        // "ok", " ", "\n"
        assert_eq!(trie.len(), 3);
        assert!(trie.contains(pack(b"ok")));
    }
}
