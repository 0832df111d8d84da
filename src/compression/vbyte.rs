use bytes::BufMut;
use crate::core::error::{Error, Result};

/// Variable byte encoding for length prefixes
pub struct VByteEncoder;

impl VByteEncoder {
    /// Values < 128 use 1 byte, < 16384 use 2 bytes, etc.
    pub fn encode_u32(output: &mut impl BufMut, mut value: u32) {
        while value >= 128 {
            output.put_u8((value & 127) as u8 | 128);  // Set continuation bit
            value >>= 7;
        }
        output.put_u8(value as u8);  // Last byte without continuation bit
    }

    /// Number of bytes `encode_u32` emits for `value`
    pub fn encoded_len(value: u32) -> usize {
        let mut len = 1;
        let mut value = value >> 7;
        while value > 0 {
            len += 1;
            value >>= 7;
        }
        len
    }

    /// Decode single u32 value, returns (value, bytes_consumed)
    pub fn decode_u32(input: &[u8]) -> Result<(u32, usize)> {
        let mut value = 0u32;
        let mut shift = 0;
        let mut consumed = 0;

        for &byte in input {
            consumed += 1;
            // Fifth byte carries bits 28..31 only, and never continues
            if shift == 28 && byte & 0xF0 != 0 {
                return Err(Error::corrupt("VByte overflow"));
            }
            value |= ((byte & 127) as u32) << shift;

            if byte & 128 == 0 {  // No continuation bit
                return Ok((value, consumed));
            }

            shift += 7;
        }

        Err(Error::corrupt("Incomplete VByte"))
    }
}
