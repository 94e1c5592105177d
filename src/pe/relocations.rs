//! Base relocation codec.
//!
//! The BaseReloc directory is a sequence of blocks, one per 4 KiB page:
//!
//! ```text
//! +0  PageRVA     4 KiB aligned
//! +4  BlockSize   header plus entries, at least 8
//! +8  entries     u16 each: type in the top 4 bits, page offset in the low 12
//! ```
//!
//! Type 0 (`ABSOLUTE`) entries pad a block to a 4-byte boundary and carry no relocation.
//! Decoding stops at the first block that is not page aligned or is shorter than its header.
//! [`relocs_to_bytes`] is the inverse of [`parse_relocations`] for sorted, de-duplicated input.

use std::collections::BTreeSet;

use crate::pe::{
    constants::{
        IMAGE_REL_BASED_ABSOLUTE, IMAGE_REL_BASED_DIR64, IMAGE_REL_BASED_HIGHLOW, RELOC_PAGE_SIZE,
    },
    DataDirectoryType, PeFile,
};

/// One relocation block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationBlock {
    /// Page the entries are relative to
    pub page_rva: u32,
    /// Declared block size in bytes
    pub block_size: u32,
    /// `(type, page offset)` pairs, padding removed
    pub entries: Vec<(u8, u16)>,
}

impl RelocationBlock {
    /// RVAs targeted by the block.
    pub fn rvas(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries
            .iter()
            .map(move |(_, offset)| self.page_rva.wrapping_add(u32::from(*offset)))
    }
}

/// Decodes relocation blocks from raw directory bytes.
#[must_use]
pub fn parse_relocations(data: &[u8]) -> Vec<RelocationBlock> {
    decode_blocks(data, || false)
}

fn decode_blocks(data: &[u8], is_cancelled: impl Fn() -> bool) -> Vec<RelocationBlock> {
    let word = |at: usize| -> Option<u32> {
        let bytes = data.get(at..at + 4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    };

    let mut blocks = Vec::new();
    let mut cursor = 0usize;
    while let (Some(page_rva), Some(block_size)) = (word(cursor), word(cursor + 4)) {
        if is_cancelled() {
            break;
        }
        if page_rva % RELOC_PAGE_SIZE != 0 || block_size < 8 {
            log::debug!(
                "relocation block at +0x{cursor:x} (page 0x{page_rva:x}, size {block_size}) ends the directory"
            );
            break;
        }

        let end = cursor.saturating_add(block_size as usize).min(data.len());
        let entries = data[cursor + 8..end]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .map(|entry| ((entry >> 12) as u8, entry & 0x0FFF))
            .filter(|(kind, _)| *kind != IMAGE_REL_BASED_ABSOLUTE)
            .collect();

        blocks.push(RelocationBlock {
            page_rva,
            block_size,
            entries,
        });
        cursor = cursor.saturating_add(block_size as usize);
    }

    blocks
}

/// Encodes sorted, de-duplicated RVAs as relocation blocks.
///
/// Every entry gets type `HIGHLOW` for 32-bit images and `DIR64` for 64-bit ones. Blocks with
/// an odd entry count are padded with an `ABSOLUTE` entry.
#[must_use]
pub fn relocs_to_bytes(rvas: &[u32], is_64: bool) -> Vec<u8> {
    let kind = u16::from(if is_64 {
        IMAGE_REL_BASED_DIR64
    } else {
        IMAGE_REL_BASED_HIGHLOW
    });

    let mut out = Vec::new();
    let mut index = 0;
    while index < rvas.len() {
        let page = rvas[index] & !(RELOC_PAGE_SIZE - 1);
        let count = rvas[index..]
            .iter()
            .take_while(|rva| *rva & !(RELOC_PAGE_SIZE - 1) == page)
            .count();
        let padded = count + count % 2;

        out.extend_from_slice(&page.to_le_bytes());
        out.extend_from_slice(&(8 + 2 * padded as u32).to_le_bytes());
        for rva in &rvas[index..index + count] {
            let entry = (kind << 12) | (*rva & (RELOC_PAGE_SIZE - 1)) as u16;
            out.extend_from_slice(&entry.to_le_bytes());
        }
        if padded != count {
            out.extend_from_slice(&0u16.to_le_bytes());
        }

        index += count;
    }

    out
}

impl PeFile {
    /// Decodes the base relocation directory.
    #[must_use]
    pub fn relocations(&self) -> Vec<RelocationBlock> {
        let Some(directory) = self.data_directory(DataDirectoryType::BaseReloc) else {
            return Vec::new();
        };
        let Some(offset) = self
            .map()
            .rel_address_to_offset(u64::from(directory.virtual_address))
        else {
            return Vec::new();
        };

        let available = (self.file().len() as u64).saturating_sub(offset);
        let size = u64::from(directory.size).min(available) as usize;
        let Ok(data) = self.file().read_array(offset, size) else {
            return Vec::new();
        };

        decode_blocks(data, || self.is_cancelled())
    }

    /// Every relocated RVA.
    #[must_use]
    pub fn relocs_as_rva_list(&self) -> BTreeSet<u32> {
        self.relocations()
            .iter()
            .flat_map(RelocationBlock::rvas)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{build_relocs, dir, open, TestImage};

    #[test]
    fn page_with_two_offsets() {
        let data = build_relocs(&[(0x1000, &[(3, 0x004), (3, 0x010)])]);
        let pe = open(
            &TestImage::new(false)
                .section(".text", 0x1000, vec![0; 0x20])
                .section(".reloc", 0x2000, data.clone())
                .directory(dir::BASERELOC, 0x2000, data.len() as u32),
        );

        assert_eq!(pe.relocs_as_rva_list(), BTreeSet::from([0x1004, 0x1010]));
        assert_eq!(pe.relocations()[0].entries, vec![(3, 0x004), (3, 0x010)]);
    }

    #[test]
    fn encode_pads_and_splits_pages() {
        let bytes = relocs_to_bytes(&[0x1004, 0x1010, 0x1FFC, 0x3000], false);
        let blocks = parse_relocations(&bytes);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].page_rva, 0x1000);
        assert_eq!(blocks[0].block_size, 8 + 2 * 4);
        assert_eq!(blocks[1].page_rva, 0x3000);
        // one entry padded to two
        assert_eq!(blocks[1].block_size, 12);
        assert_eq!(blocks[1].entries, vec![(IMAGE_REL_BASED_HIGHLOW, 0)]);
        assert_eq!(bytes.len() % 4, 0);
    }

    #[test]
    fn decode_inverts_encode() {
        let inputs: [&[u32]; 4] = [
            &[],
            &[0x1000],
            &[0x1000, 0x1002, 0x1FFF, 0x2000, 0x7_0010],
            &[0x10, 0x20, 0x30],
        ];
        for rvas in inputs {
            for is_64 in [false, true] {
                let decoded: Vec<u32> = parse_relocations(&relocs_to_bytes(rvas, is_64))
                    .iter()
                    .flat_map(RelocationBlock::rvas)
                    .collect();
                assert_eq!(decoded, rvas);
            }
        }
    }

    #[test]
    fn dir64_entries() {
        let blocks = parse_relocations(&relocs_to_bytes(&[0x2008], true));
        assert_eq!(blocks[0].entries, vec![(IMAGE_REL_BASED_DIR64, 8)]);
    }

    #[test]
    fn misaligned_page_stops_walk() {
        let data = build_relocs(&[(0x1000, &[(3, 4)]), (0x1004, &[(3, 8)]), (0x3000, &[(3, 8)])]);
        assert_eq!(parse_relocations(&data).len(), 1);
    }

    #[test]
    fn short_block_stops_walk() {
        let mut data = build_relocs(&[(0x1000, &[(3, 4), (3, 8)])]);
        data.extend_from_slice(&0x2000u32.to_le_bytes());
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(&build_relocs(&[(0x3000, &[(3, 8), (3, 12)])]));

        assert_eq!(parse_relocations(&data).len(), 1);
    }
}
