#![forbid(unsafe_code)]

use log::debug;

use crate::bit_reader::BitReader;
use crate::deflate::DeflateReader;
use crate::gzip::{MemberReader, CRC};
use crate::tracking_writer::TrackingWriter;

mod bit_reader;
mod deflate;
mod error;
mod gzip;
mod huffman_coding;
mod tracking_writer;
mod zlib;

pub use error::{DecompressError, Result};
pub use gzip::{HeaderCrc, MemberFooter};
pub use zlib::zlib_decompress;

////////////////////////////////////////////////////////////////////////////////

/// A decoded gzip member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decompressed {
    pub name: Option<String>,
    pub comment: Option<String>,
    pub extra: Option<Vec<u8>>,
    pub contents: Vec<u8>,
    /// The FTEXT flag: the contents are probably ASCII text.
    pub is_text: bool,
    pub modification_time: u32,
    pub extra_flags: u8,
    pub os: u8,
    pub header_crc: Option<HeaderCrc>,
    pub footer: MemberFooter,
}

impl Decompressed {
    pub fn crc32(&self) -> u32 {
        CRC.checksum(&self.contents)
    }

    /// Checks the header CRC16 (when present) and the trailer's size and
    /// CRC32 against the decoded contents.
    pub fn verify(&self) -> Result<()> {
        if let Some(header_crc) = &self.header_crc {
            header_crc.check()?;
        }

        let actual = self.contents.len() as u32;
        if actual != self.footer.data_size {
            return Err(DecompressError::SizeMismatch {
                expected: self.footer.data_size,
                actual,
            });
        }

        let actual = self.crc32();
        if actual != self.footer.data_crc32 {
            return Err(DecompressError::ChecksumMismatch {
                expected: self.footer.data_crc32,
                actual,
            });
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Decodes a gzip file held in memory. The trailer is not checked; see
/// [`Decompressed::verify`].
pub fn decompress(input: &[u8]) -> Result<Decompressed> {
    let (header, footer, mut deflate_reader) = MemberReader::new(input).into_deflate_reader()?;
    deflate_reader.read_to_end()?;
    let (bit_reader, writer) = deflate_reader.into_inners();
    let contents = writer.into_inner();
    debug!(
        "decompressed {} bytes from {} payload bytes",
        contents.len(),
        bit_reader.byte_offset()
    );

    Ok(Decompressed {
        name: header.name,
        comment: header.comment,
        extra: header.extra,
        contents,
        is_text: header.flags.is_text(),
        modification_time: header.modification_time,
        extra_flags: header.extra_flags,
        os: header.os,
        header_crc: header.header_crc,
        footer,
    })
}

/// Decodes a raw DEFLATE stream. `size_hint` only pre-sizes the output.
pub fn inflate(data: &[u8], size_hint: usize) -> Result<Vec<u8>> {
    let writer = TrackingWriter::with_size_hint(size_hint, data.len());
    let mut deflate_reader = DeflateReader::new(BitReader::new(data), writer);
    deflate_reader.read_to_end()?;
    let (_, writer) = deflate_reader.into_inners();
    Ok(writer.into_inner())
}

////////////////////////////////////////////////////////////////////////////////
