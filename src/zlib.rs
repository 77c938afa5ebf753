#![forbid(unsafe_code)]

use byteorder::ReadBytesExt;
use log::debug;

use crate::error::{DecompressError, Result};

////////////////////////////////////////////////////////////////////////////////

const CM_DEFLATE: u8 = 8;
const MAX_CINFO: u8 = 7;
const FDICT_OFFSET: u8 = 5;

const HEADER_SIZE: usize = 2;
const ADLER32_SIZE: usize = 4;

/// Decodes an RFC 1950 zlib stream. The Adler-32 trailer is skipped.
pub fn zlib_decompress(data: &[u8], size_hint: usize) -> Result<Vec<u8>> {
    if data.len() < HEADER_SIZE + ADLER32_SIZE {
        return Err(DecompressError::TrailerMissing);
    }

    let mut rdr = data;
    let cmf = rdr.read_u8()?;
    let flg = rdr.read_u8()?;

    if cmf & 0x0f != CM_DEFLATE {
        return Err(DecompressError::InvalidZlibHeader("compression method is not deflate"));
    }
    if cmf >> 4 > MAX_CINFO {
        return Err(DecompressError::InvalidZlibHeader("window size exceeds 32K"));
    }
    if (u16::from(cmf) << 8 | u16::from(flg)) % 31 != 0 {
        return Err(DecompressError::InvalidZlibHeader("header check bits are wrong"));
    }
    if (flg >> FDICT_OFFSET) & 1 != 0 {
        return Err(DecompressError::InvalidZlibHeader("preset dictionaries are not supported"));
    }
    debug!("zlib stream: window {} bytes, level {}", 1u32 << (8 + (cmf >> 4)), flg >> 6);

    crate::inflate(&data[HEADER_SIZE..data.len() - ADLER32_SIZE], size_hint)
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn with_header(cmf: u8, flg: u8) -> Vec<u8> {
        let mut data = vec![cmf, flg];
        data.extend_from_slice(&[0x03, 0x00]);
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
        data
    }

    #[test]
    fn empty_stream() -> Result<()> {
        assert_eq!(zlib_decompress(&with_header(0x78, 0xda), 0)?, b"");
        Ok(())
    }

    #[test]
    fn bad_headers() {
        for (cmf, flg) in [(0x79, 0x18), (0x88, 0x1c), (0x78, 0x9d), (0x78, 0xbb)] {
            assert!(
                matches!(
                    zlib_decompress(&with_header(cmf, flg), 0),
                    Err(DecompressError::InvalidZlibHeader(_))
                ),
                "{:#04x} {:#04x}",
                cmf,
                flg
            );
        }
    }

    #[test]
    fn too_short() {
        assert_eq!(
            zlib_decompress(&[0x78, 0xda, 0x03, 0x00, 0x00], 0),
            Err(DecompressError::TrailerMissing)
        );
    }

    #[cfg(feature = "dynamic-huffman")]
    #[test]
    fn dynamic_stream() -> Result<()> {
        let mut data = vec![0x78, 0xda];
        data.extend_from_slice(crate::tests::DYNAMIC_DEFLATE);
        data.extend_from_slice(&[0xbc, 0x2d, 0x43, 0xe1]);

        let contents = zlib_decompress(&data, crate::tests::DYNAMIC_CONTENTS.len())?;
        assert_eq!(contents, crate::tests::DYNAMIC_CONTENTS);
        Ok(())
    }
}
