//! Field-level helpers for the stored binary formats.
//!
//! Integers are little-endian `int32`; byte fields carry a VByte length prefix.
//! Readers consume from a [`Bytes`] cursor so byte fields are sliced, not copied.

use bytes::{Buf, BufMut, Bytes};
use crate::compression::vbyte::VByteEncoder;
use crate::core::error::{Error, ErrorKind, Result};

pub const I32_SIZE: usize = 4;

pub fn put_i32(output: &mut impl BufMut, value: i32) {
    output.put_i32_le(value);
}

/// Write a non-negative count or line number as `int32`
pub fn put_count(output: &mut impl BufMut, value: usize) -> Result<()> {
    let value = i32::try_from(value)
        .map_err(|_| Error::new(ErrorKind::InvalidArgument, format!("count {} does not fit in int32", value)))?;
    output.put_i32_le(value);
    Ok(())
}

pub fn put_bytes(output: &mut impl BufMut, data: &[u8]) {
    VByteEncoder::encode_u32(output, data.len() as u32);
    output.put_slice(data);
}

/// Serialized size of a length-prefixed byte field
pub fn bytes_size(len: usize) -> usize {
    VByteEncoder::encoded_len(len as u32) + len
}

pub fn read_i32(input: &mut Bytes, field: &str) -> Result<i32> {
    if input.remaining() < I32_SIZE {
        return Err(Error::corrupt(format!("truncated {}", field)));
    }
    Ok(input.get_i32_le())
}

pub fn read_count(input: &mut Bytes, field: &str) -> Result<usize> {
    let value = read_i32(input, field)?;
    usize::try_from(value).map_err(|_| Error::corrupt(format!("negative {}: {}", field, value)))
}

pub fn read_bytes(input: &mut Bytes, field: &str) -> Result<Bytes> {
    let (len, consumed) = VByteEncoder::decode_u32(input.chunk())
        .map_err(|e| Error::corrupt(format!("{} length: {}", field, e.context)))?;
    input.advance(consumed);

    let len = len as usize;
    if input.remaining() < len {
        return Err(Error::corrupt(format!(
            "truncated {}: need {} bytes, have {}",
            field,
            len,
            input.remaining()
        )));
    }
    Ok(input.split_to(len))
}

/// Fail unless a reader consumed the whole item
pub fn ensure_consumed(input: &Bytes, item: &str) -> Result<()> {
    if input.has_remaining() {
        return Err(Error::corrupt(format!(
            "{} has {} trailing bytes",
            item,
            input.remaining()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_bytes_field_round_trip_and_size() {
        let payload = vec![7u8; 300];
        let mut out = BytesMut::new();
        put_bytes(&mut out, &payload);
        assert_eq!(out.len(), bytes_size(payload.len()));

        let mut input = out.freeze();
        assert_eq!(read_bytes(&mut input, "payload").unwrap(), Bytes::from(payload));
        ensure_consumed(&input, "payload").unwrap();
    }

    #[test]
    fn test_truncated_fields_are_corrupt() {
        let mut short = Bytes::from_static(&[1, 0]);
        assert!(read_i32(&mut short, "version").unwrap_err().is_corrupt());

        let mut out = BytesMut::new();
        put_bytes(&mut out, b"abcdef");
        let mut cut = out.freeze().slice(..4);
        assert!(read_bytes(&mut cut, "text").unwrap_err().is_corrupt());
    }

    #[test]
    fn test_malformed_length_prefix_is_corrupt() {
        let mut input = Bytes::from_static(&[0x80, 0x80, 0x80, 0x80, 0x10, b'x']);
        assert!(read_bytes(&mut input, "field").unwrap_err().is_corrupt());
    }

    #[test]
    fn test_count_beyond_int32_is_rejected() {
        let mut out = BytesMut::new();
        let err = put_count(&mut out, i32::MAX as usize + 5).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert!(out.is_empty());

        put_count(&mut out, i32::MAX as usize).unwrap();
        assert_eq!(read_count(&mut out.freeze(), "count").unwrap(), i32::MAX as usize);
    }

    #[test]
    fn test_negative_count_is_corrupt() {
        let mut out = BytesMut::new();
        put_i32(&mut out, -3);
        assert!(read_count(&mut out.freeze(), "line count").unwrap_err().is_corrupt());
    }
}
