#![forbid(unsafe_code)]

use std::io;

////////////////////////////////////////////////////////////////////////////////

/// Error type for gzip, zlib and raw DEFLATE decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecompressError {
    /// The input does not start with `1f 8b 08`.
    #[error("input does not start with the gzip magic bytes")]
    InvalidMagic,

    /// A code length table can not form a canonical Huffman code.
    #[error("invalid code length table: {0}")]
    InvalidCodeLengthTable(&'static str),

    /// The bits at the cursor do not match any code of the current table.
    #[error("corrupt huffman code at bit {bit_offset}")]
    CorruptHuffmanCode { bit_offset: usize },

    #[error("invalid block type {0}")]
    InvalidBlockType(u16),

    /// Returned for BTYPE=2 when the `dynamic-huffman` feature is disabled.
    #[error("dynamic huffman blocks are not supported in this build")]
    UnsupportedDynamicHuffman,

    #[error("invalid length code {0}")]
    InvalidLengthCode(u16),

    #[error("invalid distance code {0}")]
    InvalidDistanceCode(u16),

    /// A read ran past the end of the input.
    #[error("unexpected end of stream")]
    TruncatedStream,

    /// The input is too short to hold the 8-byte gzip trailer after the header.
    #[error("gzip trailer is missing")]
    TrailerMissing,

    #[error("stored block length {len:#06x} does not match its complement {nlen:#06x}")]
    StoredLengthMismatch { len: u16, nlen: u16 },

    /// A back-reference points before the start of the output.
    #[error("back-reference distance {distance} exceeds {available} bytes of output")]
    InvalidBackReference { distance: usize, available: usize },

    #[error("invalid zlib header: {0}")]
    InvalidZlibHeader(&'static str),

    #[error("header crc16 mismatch: stored {stored:#06x}, computed {computed:#06x}")]
    HeaderChecksumMismatch { stored: u16, computed: u16 },

    #[error("size mismatch: trailer says {expected} bytes, got {actual}")]
    SizeMismatch { expected: u32, actual: u32 },

    #[error("crc32 mismatch: trailer says {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
}

// Reads from in-memory slices only fail when the slice runs out.
impl From<io::Error> for DecompressError {
    fn from(_: io::Error) -> Self {
        DecompressError::TruncatedStream
    }
}

pub type Result<T, E = DecompressError> = std::result::Result<T, E>;
