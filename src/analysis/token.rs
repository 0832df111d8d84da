/// Maximum number of source bytes packed into one token
pub const MAX_TOKEN_BYTES: usize = 4;

/// Bits of a 64-bit key occupied by the token itself
pub const TOKEN_MASK: u64 = 0xFFFF_FFFF_0000_0000;

/// Bits of an index key holding the block ordinal
pub const BLOCK_MASK: u64 = 0x0000_0000_FFFF_FFFF;

/// Byte class used to group runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteClass {
    Letter,
    Digit,
    Space,
    Newline,
    /// Punctuation, control and non-ASCII bytes; never merged with neighbours
    Other,
}

impl ByteClass {
    pub fn of(byte: u8) -> Self {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' => ByteClass::Letter,
            b'0'..=b'9' => ByteClass::Digit,
            b' ' | b'\t' => ByteClass::Space,
            b'\n' => ByteClass::Newline,
            _ => ByteClass::Other,
        }
    }

    pub fn merges(self) -> bool {
        self != ByteClass::Other
    }
}

#[inline]
pub fn fold(byte: u8) -> u8 {
    byte.to_ascii_lowercase()
}

/// Pack up to four bytes, case-folded, into the top 32 bits of a key
pub fn pack(bytes: &[u8]) -> u64 {
    let mut value = 0u64;
    for idx in 0..MAX_TOKEN_BYTES {
        value <<= 8;
        if let Some(&byte) = bytes.get(idx) {
            value |= fold(byte) as u64;
        }
    }
    value << 32
}

/// Index key for a token occurring in a given block
pub fn block_key(token: u64, block: u32) -> u64 {
    (token & TOKEN_MASK) | block as u64
}

pub fn key_block(key: u64) -> u32 {
    (key & BLOCK_MASK) as u32
}
