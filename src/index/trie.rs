use bytes::{BufMut, Bytes};
use fst::{Automaton, IntoStreamer, Set, SetBuilder, Streamer};
use crate::core::binary;
use crate::core::error::Result;

/// Immutable prefix tree over 64-bit keys.
///
/// Keys are stored big-endian in an FST set, so walking the set byte by byte is
/// walking a trie from the most significant byte down. Index keys carry a token
/// in the upper 32 bits and the block ordinal it occurs in below.
#[derive(Clone)]
pub struct ReadOnlyTrie {
    set: Set<Bytes>,
}

impl ReadOnlyTrie {
    pub fn empty() -> Self {
        Self::from_sorted(std::iter::empty()).unwrap_or_else(|_| unreachable!("empty FST"))
    }

    /// Build from ascending keys; duplicates are skipped
    pub fn from_sorted<I>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = u64>,
    {
        let mut builder = SetBuilder::memory();
        let mut last = None;
        for key in keys {
            if last == Some(key) {
                continue;
            }
            builder.insert(key.to_be_bytes())?;
            last = Some(key);
        }
        let data = builder.into_inner()?;
        Ok(ReadOnlyTrie { set: Set::new(Bytes::from(data))? })
    }

    /// Build from keys in any order
    pub fn from_keys<I>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = u64>,
    {
        let mut keys: Vec<u64> = keys.into_iter().collect();
        keys.sort_unstable();
        Self::from_sorted(keys)
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn contains(&self, key: u64) -> bool {
        self.set.contains(key.to_be_bytes())
    }

    pub fn keys(&self) -> Vec<u64> {
        let mut keys = Vec::with_capacity(self.len());
        let mut stream = self.set.stream();
        while let Some(key) = stream.next() {
            keys.push(decode_key(key));
        }
        keys
    }

    /// All keys where `key & mask == value`.
    ///
    /// Masked-out bytes fan out across every child; masked-in bytes follow one edge.
    pub fn enumerate_masked(&self, value: u64, mask: u64) -> Vec<u64> {
        let automaton = MaskedKey {
            value: (value & mask).to_be_bytes(),
            mask: mask.to_be_bytes(),
        };
        let mut keys = Vec::new();
        let mut stream = self.set.search(automaton).into_stream();
        while let Some(key) = stream.next() {
            keys.push(decode_key(key));
        }
        keys
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.set.as_fst().as_bytes()
    }

    pub fn serialized_size(&self) -> usize {
        binary::bytes_size(self.as_bytes().len())
    }

    pub fn write(&self, output: &mut impl BufMut) {
        binary::put_bytes(output, self.as_bytes());
    }

    pub fn read(input: &mut Bytes) -> Result<Self> {
        let data = binary::read_bytes(input, "trie")?;
        Ok(ReadOnlyTrie { set: Set::new(data)? })
    }
}

impl PartialEq for ReadOnlyTrie {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl std::fmt::Debug for ReadOnlyTrie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadOnlyTrie").field("len", &self.len()).finish()
    }
}

// Keys are always 8 bytes when built here; shorter stored keys are zero padded
fn decode_key(key: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let len = key.len().min(8);
    buf[..len].copy_from_slice(&key[..len]);
    u64::from_be_bytes(buf)
}

/// Matches 8-byte keys byte-wise against a value under a mask
struct MaskedKey {
    value: [u8; 8],
    mask: [u8; 8],
}

impl Automaton for MaskedKey {
    // Depth reached so far, or None once a byte disagreed
    type State = Option<usize>;

    fn start(&self) -> Option<usize> {
        Some(0)
    }

    fn is_match(&self, state: &Option<usize>) -> bool {
        *state == Some(8)
    }

    fn can_match(&self, state: &Option<usize>) -> bool {
        state.is_some()
    }

    fn accept(&self, state: &Option<usize>, byte: u8) -> Option<usize> {
        match *state {
            Some(depth) if depth < 8 && byte & self.mask[depth] == self.value[depth] => {
                Some(depth + 1)
            }
            _ => None,
        }
    }
}
