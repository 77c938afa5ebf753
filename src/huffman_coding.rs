#![forbid(unsafe_code)]

use crate::bit_reader::BitReader;
use crate::error::{DecompressError, Result};

////////////////////////////////////////////////////////////////////////////////

pub const MAX_BITS: usize = 15;

pub const END_OF_BLOCK: u16 = 256;

/// Base value plus the number of extra bits following a length or distance code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtraBitsEntry {
    pub extra_bits: u8,
    pub base: u16,
}

impl ExtraBitsEntry {
    const fn new(extra_bits: u8, base: u16) -> Self {
        Self { extra_bits, base }
    }

    pub fn read_value(&self, bit_reader: &mut BitReader) -> Result<u16> {
        Ok(self.base + bit_reader.read_bits(self.extra_bits)?)
    }
}

// See RFC 1951, section 3.2.5.

/// Indexed by `symbol - 257`.
pub const LENGTH_EXTRA_BITS: [ExtraBitsEntry; 29] = [
    ExtraBitsEntry::new(0, 3),
    ExtraBitsEntry::new(0, 4),
    ExtraBitsEntry::new(0, 5),
    ExtraBitsEntry::new(0, 6),
    ExtraBitsEntry::new(0, 7),
    ExtraBitsEntry::new(0, 8),
    ExtraBitsEntry::new(0, 9),
    ExtraBitsEntry::new(0, 10),
    ExtraBitsEntry::new(1, 11),
    ExtraBitsEntry::new(1, 13),
    ExtraBitsEntry::new(1, 15),
    ExtraBitsEntry::new(1, 17),
    ExtraBitsEntry::new(2, 19),
    ExtraBitsEntry::new(2, 23),
    ExtraBitsEntry::new(2, 27),
    ExtraBitsEntry::new(2, 31),
    ExtraBitsEntry::new(3, 35),
    ExtraBitsEntry::new(3, 43),
    ExtraBitsEntry::new(3, 51),
    ExtraBitsEntry::new(3, 59),
    ExtraBitsEntry::new(4, 67),
    ExtraBitsEntry::new(4, 83),
    ExtraBitsEntry::new(4, 99),
    ExtraBitsEntry::new(4, 115),
    ExtraBitsEntry::new(5, 131),
    ExtraBitsEntry::new(5, 163),
    ExtraBitsEntry::new(5, 195),
    ExtraBitsEntry::new(5, 227),
    ExtraBitsEntry::new(0, 258),
];

pub const DISTANCE_EXTRA_BITS: [ExtraBitsEntry; 30] = [
    ExtraBitsEntry::new(0, 1),
    ExtraBitsEntry::new(0, 2),
    ExtraBitsEntry::new(0, 3),
    ExtraBitsEntry::new(0, 4),
    ExtraBitsEntry::new(1, 5),
    ExtraBitsEntry::new(1, 7),
    ExtraBitsEntry::new(2, 9),
    ExtraBitsEntry::new(2, 13),
    ExtraBitsEntry::new(3, 17),
    ExtraBitsEntry::new(3, 25),
    ExtraBitsEntry::new(4, 33),
    ExtraBitsEntry::new(4, 49),
    ExtraBitsEntry::new(5, 65),
    ExtraBitsEntry::new(5, 97),
    ExtraBitsEntry::new(6, 129),
    ExtraBitsEntry::new(6, 193),
    ExtraBitsEntry::new(7, 257),
    ExtraBitsEntry::new(7, 385),
    ExtraBitsEntry::new(8, 513),
    ExtraBitsEntry::new(8, 769),
    ExtraBitsEntry::new(9, 1025),
    ExtraBitsEntry::new(9, 1537),
    ExtraBitsEntry::new(10, 2049),
    ExtraBitsEntry::new(10, 3073),
    ExtraBitsEntry::new(11, 4097),
    ExtraBitsEntry::new(11, 6145),
    ExtraBitsEntry::new(12, 8193),
    ExtraBitsEntry::new(12, 12289),
    ExtraBitsEntry::new(13, 16385),
    ExtraBitsEntry::new(13, 24577),
];

////////////////////////////////////////////////////////////////////////////////

/// Symbols sharing one code length, in ascending symbol order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LengthBucket {
    pub symbols: Vec<u16>,
    pub start_code: u32,
    /// `start_code` left-justified into a 16-bit field. Equals `1 << 16` for an
    /// empty length that follows a complete code.
    pub padded_code: u32,
}

/// Canonical Huffman decode table: one bucket per code length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HuffmanCoding {
    buckets: [LengthBucket; MAX_BITS + 1],
    max_len: u8,
}

impl HuffmanCoding {
    pub fn from_lengths(code_lengths: &[u8]) -> Result<Self> {
        /* 1. Count codes of each length. */

        let mut len_count = [0u32; MAX_BITS + 1];
        for &len in code_lengths {
            if usize::from(len) > MAX_BITS {
                return Err(DecompressError::InvalidCodeLengthTable(
                    "code length exceeds 15 bits",
                ));
            }
            len_count[usize::from(len)] += 1;
        }
        len_count[0] = 0;

        /* 2. Allocate the buckets and fill them in symbol order. */

        let mut buckets: [LengthBucket; MAX_BITS + 1] = Default::default();
        for (len, bucket) in buckets.iter_mut().enumerate() {
            bucket.symbols.reserve_exact(len_count[len] as usize);
        }
        for (symbol, &len) in code_lengths.iter().enumerate() {
            if len != 0 {
                buckets[usize::from(len)].symbols.push(symbol as u16);
            }
        }

        /* 3. Assign the canonical start code of each length. */

        let mut code = 0u32;
        let mut max_len = 0u8;
        for len in 1..=MAX_BITS {
            code = (code + len_count[len - 1]) << 1;
            if code + len_count[len] > 1 << len {
                return Err(DecompressError::InvalidCodeLengthTable(
                    "over-subscribed code lengths",
                ));
            }
            let bucket = &mut buckets[len];
            bucket.start_code = code;
            bucket.padded_code = code << (16 - len);
            if len_count[len] != 0 {
                max_len = len as u8;
            }
        }

        Ok(Self { buckets, max_len })
    }

    /// Decodes one symbol and advances the reader past its code.
    pub fn read_symbol(&self, bit_reader: &mut BitReader) -> Result<u16> {
        let (symbol, len) = self.decode_symbol(bit_reader)?;
        bit_reader.skip_bits(usize::from(len))?;
        Ok(symbol)
    }

    /// Returns the symbol at the cursor and the length of its code, without
    /// advancing.
    pub fn decode_symbol(&self, bit_reader: &BitReader) -> Result<(u16, u8)> {
        let corrupt = DecompressError::CorruptHuffmanCode {
            bit_offset: bit_reader.bit_offset(),
        };

        // Codes are stored most significant bit first.
        let window = u32::from(bit_reader.peek_window().reverse_bits());

        for len in 1..=self.max_len {
            let is_last = len == self.max_len;
            let bucket = &self.buckets[usize::from(len)];
            if is_last || window < self.buckets[usize::from(len) + 1].padded_code {
                let code = window >> (16 - len);
                let index = code
                    .checked_sub(bucket.start_code)
                    .ok_or_else(|| corrupt.clone())? as usize;
                return match bucket.symbols.get(index) {
                    Some(&symbol) => Ok((symbol, len)),
                    None => Err(corrupt),
                };
            }
        }

        Err(corrupt)
    }
}

////////////////////////////////////////////////////////////////////////////////

pub struct FixedTables {
    pub litlen: HuffmanCoding,
    pub distance: HuffmanCoding,
}

impl FixedTables {
    pub fn build() -> Result<Self> {
        let mut litlen_lengths = [0u8; 288];
        litlen_lengths[..144].fill(8);
        litlen_lengths[144..256].fill(9);
        litlen_lengths[256..280].fill(7);
        litlen_lengths[280..].fill(8);

        // Codes 30 and 31 exist in the fixed code but never occur in valid data.
        let distance_lengths = [5u8; 32];

        Ok(Self {
            litlen: HuffmanCoding::from_lengths(&litlen_lengths)?,
            distance: HuffmanCoding::from_lengths(&distance_lengths)?,
        })
    }
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(feature = "dynamic-huffman")]
const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Reads the table definitions at the start of a dynamic block and returns
/// the literal/length and distance tables.
#[cfg(feature = "dynamic-huffman")]
pub fn decode_litlen_distance_trees(
    bit_reader: &mut BitReader,
) -> Result<(HuffmanCoding, HuffmanCoding)> {
    // See RFC 1951, section 3.2.7.
    let hlit = usize::from(bit_reader.read_bits(5)?) + 257;
    let hdist = usize::from(bit_reader.read_bits(5)?) + 1;
    let hclen = usize::from(bit_reader.read_bits(4)?) + 4;

    let mut code_length_lengths = [0u8; 19];
    for &position in &CODE_LENGTH_ORDER[..hclen] {
        code_length_lengths[position] = bit_reader.read_bits(3)? as u8;
    }
    let code_length_coding = HuffmanCoding::from_lengths(&code_length_lengths)?;

    // Literal/length and distance lengths form one sequence; runs may cross
    // from one into the other.
    let total = hlit + hdist;
    let mut lengths = Vec::with_capacity(total);
    while lengths.len() < total {
        let (value, repeat) = match code_length_coding.read_symbol(bit_reader)? {
            len @ 0..=15 => (len as u8, 1),
            16 => {
                let &previous = lengths.last().ok_or(
                    DecompressError::InvalidCodeLengthTable("repeat with no previous length"),
                )?;
                (previous, 3 + usize::from(bit_reader.read_bits(2)?))
            }
            17 => (0, 3 + usize::from(bit_reader.read_bits(3)?)),
            18 => (0, 11 + usize::from(bit_reader.read_bits(7)?)),
            _ => {
                return Err(DecompressError::InvalidCodeLengthTable(
                    "code length symbol out of range",
                ))
            }
        };
        if lengths.len() + repeat > total {
            return Err(DecompressError::InvalidCodeLengthTable(
                "code length run overflows the table",
            ));
        }
        lengths.resize(lengths.len() + repeat, value);
    }

    if lengths[usize::from(END_OF_BLOCK)] == 0 {
        return Err(DecompressError::InvalidCodeLengthTable(
            "end of block has no code",
        ));
    }

    let litlen = HuffmanCoding::from_lengths(&lengths[..hlit])?;
    let distance = HuffmanCoding::from_lengths(&lengths[hlit..])?;
    log::trace!(
        "dynamic tables: hlit={}, hdist={}, hclen={}",
        hlit,
        hdist,
        hclen
    );
    Ok((litlen, distance))
}

////////////////////////////////////////////////////////////////////////////////
