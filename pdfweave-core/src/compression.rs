//! Compression utilities for PDF streams

use crate::error::{PdfError, Result};

/// Compress data using Flate/Zlib compression
#[cfg(feature = "compression")]
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| PdfError::CompressionError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| PdfError::CompressionError(e.to_string()))
}

/// Decompress data using Flate/Zlib decompression
#[cfg(feature = "compression")]
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| PdfError::CompressionError(e.to_string()))?;
    Ok(decompressed)
}

#[cfg(not(feature = "compression"))]
pub fn compress(_data: &[u8]) -> Result<Vec<u8>> {
    Err(PdfError::CompressionError(
        "built without the compression feature".to_string(),
    ))
}

#[cfg(not(feature = "compression"))]
pub fn decompress(_data: &[u8]) -> Result<Vec<u8>> {
    Err(PdfError::CompressionError(
        "built without the compression feature".to_string(),
    ))
}

/// Whether stream compression is available in this build
pub const fn is_available() -> bool {
    cfg!(feature = "compression")
}
