use bytes::Bytes;
use crate::core::error::{Error, ErrorKind, Result};

/// zstd level used for every stored text block.
///
/// Fixed so identical text always produces identical stored bytes.
pub const COMPRESSION_LEVEL: i32 = 3;

/// Compress a block of log text
pub fn compress(data: &[u8]) -> Result<Bytes> {
    let compressed = zstd::encode_all(data, COMPRESSION_LEVEL)
        .map_err(|e| Error::new(ErrorKind::Compression, e.to_string()))?;
    Ok(Bytes::from(compressed))
}

/// Decompress a block and check it against the length recorded alongside it
pub fn decompress(data: &[u8], expected_len: usize) -> Result<Bytes> {
    let decompressed = zstd::decode_all(data)
        .map_err(|e| Error::corrupt(format!("zstd: {}", e)))?;

    if decompressed.len() != expected_len {
        return Err(Error::corrupt(format!(
            "decompressed {} bytes, expected {}",
            decompressed.len(),
            expected_len
        )));
    }
    Ok(Bytes::from(decompressed))
}

/// Decompress a block whose length is not recorded next to it
pub fn decompress_unsized(data: &[u8]) -> Result<Bytes> {
    zstd::decode_all(data)
        .map(Bytes::from)
        .map_err(|e| Error::corrupt(format!("zstd: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_is_deterministic() {
        let text = b"2024-01-01 Compiling module Core\n".repeat(50);
        assert_eq!(compress(&text).unwrap(), compress(&text).unwrap());
    }

    #[test]
    fn test_length_drift_is_corrupt() {
        let compressed = compress(b"hello\n").unwrap();
        assert_eq!(&decompress(&compressed, 6).unwrap()[..], b"hello\n");
        assert!(decompress(&compressed, 7).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_garbage_is_corrupt() {
        assert!(decompress(b"definitely not zstd", 4).unwrap_err().is_corrupt());
    }
}
