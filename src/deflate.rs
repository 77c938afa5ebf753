#![forbid(unsafe_code)]

use log::{debug, trace};

use crate::bit_reader::BitReader;
use crate::error::{DecompressError, Result};
use crate::huffman_coding::{
    FixedTables, HuffmanCoding, DISTANCE_EXTRA_BITS, END_OF_BLOCK, LENGTH_EXTRA_BITS,
};
#[cfg(feature = "dynamic-huffman")]
use crate::huffman_coding::decode_litlen_distance_trees;
use crate::tracking_writer::TrackingWriter;

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub is_final: bool,
    pub compression_type: CompressionType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionType {
    Uncompressed = 0,
    FixedTree = 1,
    DynamicTree = 2,
}

impl TryFrom<u16> for CompressionType {
    type Error = DecompressError;

    fn try_from(value: u16) -> Result<Self> {
        Ok(match value {
            0 => CompressionType::Uncompressed,
            1 => CompressionType::FixedTree,
            2 => CompressionType::DynamicTree,
            _ => return Err(DecompressError::InvalidBlockType(value)),
        })
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    ReadBlockHeader,
    Stored { is_final: bool },
    FixedHuffman { is_final: bool },
    DynamicHuffman { is_final: bool },
    Done,
}

pub struct DeflateReader<'a> {
    bit_reader: BitReader<'a>,
    writer: TrackingWriter,
    state: State,
    fixed_tables: Option<FixedTables>,
}

impl<'a> DeflateReader<'a> {
    pub fn new(bit_reader: BitReader<'a>, writer: TrackingWriter) -> Self {
        Self {
            bit_reader,
            writer,
            state: State::ReadBlockHeader,
            fixed_tables: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Decodes one whole block. Returns `None` once the final block is done.
    /// The reader stops at the first error.
    pub fn next_block(&mut self) -> Option<Result<BlockHeader>> {
        if self.is_done() {
            return None;
        }

        let mut header = None;
        loop {
            match self.step() {
                Ok(Some(read)) => header = Some(read),
                Ok(None) => {}
                Err(err) => {
                    self.state = State::Done;
                    return Some(Err(err));
                }
            }
            if matches!(self.state, State::ReadBlockHeader | State::Done) {
                return header.map(Ok);
            }
        }
    }

    /// Decodes blocks until the final one.
    pub fn read_to_end(&mut self) -> Result<()> {
        while let Some(block) = self.next_block() {
            block?;
        }
        Ok(())
    }

    pub fn into_inners(self) -> (BitReader<'a>, TrackingWriter) {
        (self.bit_reader, self.writer)
    }

    /// Advances the state machine by one state. Returns the header when one
    /// was read.
    fn step(&mut self) -> Result<Option<BlockHeader>> {
        let is_final = match self.state {
            State::ReadBlockHeader => {
                let header = self.read_block_header()?;
                let is_final = header.is_final;
                self.state = match header.compression_type {
                    CompressionType::Uncompressed => State::Stored { is_final },
                    CompressionType::FixedTree => State::FixedHuffman { is_final },
                    CompressionType::DynamicTree => State::DynamicHuffman { is_final },
                };
                return Ok(Some(header));
            }
            State::Done => return Ok(None),
            State::Stored { is_final } => {
                self.read_stored_block()?;
                is_final
            }
            State::FixedHuffman { is_final } => {
                self.read_fixed_block()?;
                is_final
            }
            State::DynamicHuffman { is_final } => {
                self.read_dynamic_block()?;
                is_final
            }
        };
        trace!("block done, {} bytes written", self.writer.byte_count());

        self.state = if is_final {
            State::Done
        } else {
            State::ReadBlockHeader
        };
        Ok(None)
    }

    fn read_block_header(&mut self) -> Result<BlockHeader> {
        let is_final = self.bit_reader.read_bits(1)? == 1;
        let compression_type = CompressionType::try_from(self.bit_reader.read_bits(2)?)?;
        debug!(
            "block at bit {}: final={}, type={:?}",
            self.bit_reader.bit_offset() - 3,
            is_final,
            compression_type
        );
        Ok(BlockHeader {
            is_final,
            compression_type,
        })
    }

    fn read_stored_block(&mut self) -> Result<()> {
        self.bit_reader.align_to_byte();
        let len = self.bit_reader.read_bits(16)?;
        let nlen = self.bit_reader.read_bits(16)?;
        if len != !nlen {
            return Err(DecompressError::StoredLengthMismatch { len, nlen });
        }
        let bytes = self.bit_reader.read_bytes(usize::from(len))?;
        self.writer.write_slice(bytes);
        Ok(())
    }

    fn read_fixed_block(&mut self) -> Result<()> {
        let tables = match self.fixed_tables.take() {
            Some(tables) => tables,
            None => FixedTables::build()?,
        };
        let result = read_compressed_block(
            &mut self.bit_reader,
            &mut self.writer,
            &tables.litlen,
            &tables.distance,
        );
        self.fixed_tables = Some(tables);
        result
    }

    #[cfg(feature = "dynamic-huffman")]
    fn read_dynamic_block(&mut self) -> Result<()> {
        let (litlen, distance) = decode_litlen_distance_trees(&mut self.bit_reader)?;
        read_compressed_block(&mut self.bit_reader, &mut self.writer, &litlen, &distance)
    }

    #[cfg(not(feature = "dynamic-huffman"))]
    fn read_dynamic_block(&mut self) -> Result<()> {
        Err(DecompressError::UnsupportedDynamicHuffman)
    }
}

/// Decodes literal/length and distance symbols until the end-of-block symbol.
fn read_compressed_block(
    bit_reader: &mut BitReader,
    writer: &mut TrackingWriter,
    litlen: &HuffmanCoding,
    distance: &HuffmanCoding,
) -> Result<()> {
    loop {
        let symbol = litlen.read_symbol(bit_reader)?;
        match symbol {
            0..=255 => writer.write_u8(symbol as u8),
            END_OF_BLOCK => return Ok(()),
            _ => {
                let length = LENGTH_EXTRA_BITS
                    .get(usize::from(symbol - 257))
                    .ok_or(DecompressError::InvalidLengthCode(symbol))?
                    .read_value(bit_reader)?;
                let code = distance.read_symbol(bit_reader)?;
                let dist = DISTANCE_EXTRA_BITS
                    .get(usize::from(code))
                    .ok_or(DecompressError::InvalidDistanceCode(code))?
                    .read_value(bit_reader)?;
                trace!("back-reference: length={}, distance={}", length, dist);
                writer.write_previous(usize::from(dist), usize::from(length))?;
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn new_reader(data: &[u8]) -> DeflateReader<'_> {
        DeflateReader::new(BitReader::new(data), TrackingWriter::with_size_hint(0, 0))
    }

    fn inflate(data: &[u8]) -> Result<Vec<u8>> {
        let mut reader = new_reader(data);
        reader.read_to_end()?;
        let (_, writer) = reader.into_inners();
        Ok(writer.into_inner())
    }

    #[test]
    fn stored_block() -> Result<()> {
        let data: &[u8] = &[0x01, 0x03, 0x00, 0xfc, 0xff, b'a', b'b', b'c'];
        assert_eq!(inflate(data)?, b"abc");
        Ok(())
    }

    #[test]
    fn stored_block_bad_nlen() {
        let data: &[u8] = &[0x01, 0x03, 0x00, 0xfc, 0xfe, b'a', b'b', b'c'];
        assert_eq!(
            inflate(data),
            Err(DecompressError::StoredLengthMismatch {
                len: 0x0003,
                nlen: 0xfefc
            })
        );
    }

    #[test]
    fn stored_block_truncated() {
        let data: &[u8] = &[0x01, 0x05, 0x00, 0xfa, 0xff, b'a', b'b', b'c'];
        assert_eq!(inflate(data), Err(DecompressError::TruncatedStream));
    }

    #[test]
    fn overlapping_back_reference() -> Result<()> {
        // "abc", then length 10 at distance 3.
        let data: &[u8] = &[0x4b, 0x4c, 0x4a, 0x46, 0x20, 0x00];
        assert_eq!(inflate(data)?, b"abcabcabcabca");
        Ok(())
    }

    #[test]
    fn extra_bits() -> Result<()> {
        // "abcd", then length 13 + 1 at distance 4.
        let data: &[u8] = &[0x4b, 0x4c, 0x4a, 0x4e, 0x41, 0xc5, 0x00];
        assert_eq!(inflate(data)?, b"abcdabcdabcdabcdab");

        // "hello ", then length 5 at distance 5 + 1.
        let data: &[u8] = &[0xcb, 0x48, 0xcd, 0xc9, 0xc9, 0x57, 0x00, 0x93, 0x00];
        assert_eq!(inflate(data)?, b"hello hello");
        Ok(())
    }

    #[test]
    fn fixed_tables_are_reused() -> Result<()> {
        let data: &[u8] = &[0xaa, 0x00, 0xac, 0x12, 0x00];
        let mut reader = new_reader(data);

        let header = reader.next_block().unwrap()?;
        assert!(!header.is_final);
        assert_eq!(header.compression_type, CompressionType::FixedTree);
        assert!(reader.fixed_tables.is_some());

        let header = reader.next_block().unwrap()?;
        assert!(header.is_final);
        assert!(reader.next_block().is_none());
        assert!(reader.is_done());

        let (bit_reader, writer) = reader.into_inners();
        assert_eq!(writer.into_inner(), b"xy");
        assert_eq!(bit_reader.byte_offset(), data.len());
        Ok(())
    }

    #[test]
    fn state_transitions() -> Result<()> {
        // Two fixed-Huffman blocks, "x" and then the final "y".
        let data: &[u8] = &[0xaa, 0x00, 0xac, 0x12, 0x00];
        let mut reader = new_reader(data);
        assert_eq!(reader.state, State::ReadBlockHeader);

        assert_eq!(
            reader.step()?,
            Some(BlockHeader {
                is_final: false,
                compression_type: CompressionType::FixedTree,
            })
        );
        assert_eq!(reader.state, State::FixedHuffman { is_final: false });
        assert_eq!(reader.step()?, None);
        assert_eq!(reader.state, State::ReadBlockHeader);

        assert_eq!(
            reader.step()?,
            Some(BlockHeader {
                is_final: true,
                compression_type: CompressionType::FixedTree,
            })
        );
        assert_eq!(reader.state, State::FixedHuffman { is_final: true });
        assert_eq!(reader.step()?, None);
        assert_eq!(reader.state, State::Done);

        assert_eq!(reader.step()?, None);
        assert_eq!(reader.state, State::Done);
        assert!(reader.next_block().is_none());
        Ok(())
    }

    #[test]
    fn stored_then_error() {
        // A non-final stored block, then a reserved block type.
        let data: &[u8] = &[0x00, 0x01, 0x00, 0xfe, 0xff, b'z', 0x07];
        let mut reader = new_reader(data);
        assert_eq!(
            reader.next_block(),
            Some(Ok(BlockHeader {
                is_final: false,
                compression_type: CompressionType::Uncompressed,
            }))
        );
        assert_eq!(reader.state, State::ReadBlockHeader);
        assert_eq!(
            reader.next_block(),
            Some(Err(DecompressError::InvalidBlockType(3)))
        );
        assert!(reader.is_done());
        assert!(reader.next_block().is_none());
    }

    #[test]
    fn invalid_codes() {
        // Distance code 30.
        let data: &[u8] = &[0x4b, 0x04, 0x3e, 0x00];
        assert_eq!(inflate(data), Err(DecompressError::InvalidDistanceCode(30)));

        // Literal/length symbol 286.
        let data: &[u8] = &[0x4b, 0x1c, 0x03];
        assert_eq!(inflate(data), Err(DecompressError::InvalidLengthCode(286)));

        // Back-reference into an empty output.
        let data: &[u8] = &[0x03, 0x02, 0x00];
        assert!(matches!(
            inflate(data),
            Err(DecompressError::InvalidBackReference { .. })
        ));
    }

    #[test]
    fn reserved_block_type() {
        let data: &[u8] = &[0x07];
        let mut reader = new_reader(data);
        assert_eq!(
            reader.next_block(),
            Some(Err(DecompressError::InvalidBlockType(3)))
        );
        assert!(reader.next_block().is_none());
    }

    #[test]
    fn empty_input() {
        assert_eq!(inflate(&[]), Err(DecompressError::TruncatedStream));
    }

    #[cfg(feature = "dynamic-huffman")]
    #[test]
    fn dynamic_block() -> Result<()> {
        let contents = inflate(crate::tests::DYNAMIC_DEFLATE)?;
        assert_eq!(contents, crate::tests::DYNAMIC_CONTENTS);
        Ok(())
    }

    #[cfg(not(feature = "dynamic-huffman"))]
    #[test]
    fn dynamic_block_unsupported() {
        assert_eq!(
            inflate(crate::tests::DYNAMIC_DEFLATE),
            Err(DecompressError::UnsupportedDynamicHuffman)
        );
    }
}
