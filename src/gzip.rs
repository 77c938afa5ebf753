#![forbid(unsafe_code)]

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use crc::{Crc, CRC_32_ISO_HDLC};
use log::debug;

use crate::bit_reader::BitReader;
use crate::deflate::DeflateReader;
use crate::error::{DecompressError, Result};
use crate::tracking_writer::TrackingWriter;

////////////////////////////////////////////////////////////////////////////////

pub const MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

pub const TRAILER_SIZE: usize = 8;

const FTEXT_OFFSET: u8 = 0;
const FHCRC_OFFSET: u8 = 1;
const FEXTRA_OFFSET: u8 = 2;
const FNAME_OFFSET: u8 = 3;
const FCOMMENT_OFFSET: u8 = 4;

pub(crate) static CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberHeader {
    pub flags: MemberFlags,
    pub modification_time: u32,
    pub extra: Option<Vec<u8>>,
    pub name: Option<String>,
    pub comment: Option<String>,
    pub extra_flags: u8,
    pub os: u8,
    pub header_crc: Option<HeaderCrc>,
}

/// The optional header CRC16 together with the value computed over the
/// header bytes that precede it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderCrc {
    pub stored: u16,
    pub computed: u16,
}

impl HeaderCrc {
    pub fn check(&self) -> Result<()> {
        if self.stored != self.computed {
            return Err(DecompressError::HeaderChecksumMismatch {
                stored: self.stored,
                computed: self.computed,
            });
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberFlags(pub u8);

impl MemberFlags {
    fn bit(&self, n: u8) -> bool {
        (self.0 >> n) & 1 != 0
    }

    pub fn is_text(&self) -> bool {
        self.bit(FTEXT_OFFSET)
    }

    pub fn has_crc(&self) -> bool {
        self.bit(FHCRC_OFFSET)
    }

    pub fn has_extra(&self) -> bool {
        self.bit(FEXTRA_OFFSET)
    }

    pub fn has_name(&self) -> bool {
        self.bit(FNAME_OFFSET)
    }

    pub fn has_comment(&self) -> bool {
        self.bit(FCOMMENT_OFFSET)
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberFooter {
    pub data_crc32: u32,
    /// Uncompressed size modulo 2^32.
    pub data_size: u32,
}

////////////////////////////////////////////////////////////////////////////////

/// Parses a single gzip member held entirely in memory. The trailer is taken
/// from the last eight bytes of the input.
pub struct MemberReader<'a> {
    input: &'a [u8],
}

impl<'a> MemberReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input }
    }

    /// Parses header and trailer, and returns a reader positioned at the start
    /// of the DEFLATE payload.
    pub fn into_deflate_reader(self) -> Result<(MemberHeader, MemberFooter, DeflateReader<'a>)> {
        let (header, header_len) = self.read_header()?;

        if self.input.len() - header_len < TRAILER_SIZE {
            return Err(DecompressError::TrailerMissing);
        }
        let trailer_start = self.input.len() - TRAILER_SIZE;
        let footer = Self::read_footer(&self.input[trailer_start..])?;
        debug!(
            "gzip member: header {} bytes, payload {} bytes, isize {}",
            header_len,
            trailer_start - header_len,
            footer.data_size
        );

        let payload = &self.input[header_len..trailer_start];
        let writer = TrackingWriter::with_size_hint(footer.data_size as usize, payload.len());
        let deflate_reader = DeflateReader::new(BitReader::new(payload), writer);
        Ok((header, footer, deflate_reader))
    }

    /// Returns the header and its length in bytes.
    pub fn read_header(&self) -> Result<(MemberHeader, usize)> {
        let mut rdr = self.input;

        // A short input that already diverges from the magic is not gzip at all.
        let prefix = &self.input[..self.input.len().min(MAGIC.len())];
        if prefix != &MAGIC[..prefix.len()] {
            return Err(DecompressError::InvalidMagic);
        }
        let mut magic = [0u8; 3];
        rdr.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(DecompressError::InvalidMagic);
        }
        let flags = MemberFlags(rdr.read_u8()?);
        let modification_time = rdr.read_u32::<LittleEndian>()?;
        let extra_flags = rdr.read_u8()?;
        let os = rdr.read_u8()?;

        let extra = if flags.has_extra() {
            let len = usize::from(rdr.read_u16::<LittleEndian>()?);
            if rdr.len() < len {
                return Err(DecompressError::TruncatedStream);
            }
            let (extra, rest) = rdr.split_at(len);
            rdr = rest;
            Some(extra.to_vec())
        } else {
            None
        };

        let name = if flags.has_name() {
            Some(read_latin1_string(&mut rdr)?)
        } else {
            None
        };

        let comment = if flags.has_comment() {
            Some(read_latin1_string(&mut rdr)?)
        } else {
            None
        };

        let header_crc = if flags.has_crc() {
            let covered = self.input.len() - rdr.len();
            let computed = (CRC.checksum(&self.input[..covered]) & 0xffff) as u16;
            let stored = rdr.read_u16::<LittleEndian>()?;
            Some(HeaderCrc { stored, computed })
        } else {
            None
        };

        let header = MemberHeader {
            flags,
            modification_time,
            extra,
            name,
            comment,
            extra_flags,
            os,
            header_crc,
        };
        Ok((header, self.input.len() - rdr.len()))
    }

    pub fn read_footer(mut rdr: &[u8]) -> Result<MemberFooter> {
        let crc = rdr.read_u32::<LittleEndian>()?;
        let isize = rdr.read_u32::<LittleEndian>()?;
        Ok(MemberFooter {
            data_crc32: crc,
            data_size: isize,
        })
    }
}

/// Reads a NUL-terminated ISO-8859-1 string and advances past the terminator.
fn read_latin1_string<'a>(rdr: &mut &'a [u8]) -> Result<String> {
    let bytes: &'a [u8] = *rdr;
    let end = bytes
        .iter()
        .position(|&byte| byte == 0)
        .ok_or(DecompressError::TruncatedStream)?;
    let value = bytes[..end].iter().map(|&byte| char::from(byte)).collect();
    *rdr = &bytes[end + 1..];
    Ok(value)
}

////////////////////////////////////////////////////////////////////////////////
