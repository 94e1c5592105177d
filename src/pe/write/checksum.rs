//! Optional header `CheckSum` computation.
//!
//! The image is summed as little-endian 16-bit words with end-around carry. The stored checksum
//! is part of that sum, so its low and high words are taken back out, each with its own
//! conditional borrow, before the file length is added.

use crate::{pe::PeFile, Error, Result};

use super::plan::RewritePlan;

fn fold(mut sum: u64) -> u16 {
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum as u16
}

/// Computes the image checksum of `data` whose stored checksum is `stored`.
#[must_use]
pub fn compute_checksum(data: &[u8], stored: u32) -> u32 {
    let mut sum: u64 = 0;
    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += u64::from(u16::from_le_bytes([word[0], word[1]]));
        if sum > 0xFFFF {
            sum = (sum & 0xFFFF) + (sum >> 16);
        }
    }
    if let [last] = words.remainder() {
        sum += u64::from(*last);
    }
    let mut partial = fold(sum);

    for half in [stored as u16, (stored >> 16) as u16] {
        partial = partial.wrapping_sub(u16::from(partial < half));
        partial = partial.wrapping_sub(half);
    }

    u32::from(partial).wrapping_add(data.len() as u32)
}

impl PeFile {
    /// Checksum the image should carry, `None` for invalid images.
    #[must_use]
    pub fn compute_checksum(&self) -> Option<u32> {
        let stored = self.headers()?.optional.checksum;
        Some(compute_checksum(self.data(), stored))
    }

    /// Returns `true` if the stored checksum matches.
    #[must_use]
    pub fn checksum_is_valid(&self) -> bool {
        match (self.headers(), self.compute_checksum()) {
            (Some(headers), Some(computed)) => headers.optional.checksum == computed,
            _ => false,
        }
    }

    /// Recomputes and stores the checksum, returning the new value.
    ///
    /// # Errors
    /// Returns [`Error::NotSupported`] for invalid images or read-only backends.
    pub fn fix_checksum(&mut self) -> Result<u32> {
        let headers = self.headers().ok_or(Error::NotSupported)?;
        let offset = headers.offsets.checksum;
        let checksum = compute_checksum(self.data(), headers.optional.checksum);

        let mut plan = RewritePlan::new(self.file().len() as u64);
        plan.patch_u32(offset, checksum);
        self.apply_plan(&plan)?;

        Ok(checksum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{open, TestImage};

    fn image() -> TestImage {
        TestImage::new(false)
            .section(".text", 0x1000, (0..=255u8).cycle().take(0x300).collect())
            .section(".data", 0x2000, vec![0x5A; 0x81])
    }

    #[test]
    fn fix_is_idempotent() {
        let mut pe = open(&image());
        let first = pe.fix_checksum().unwrap();

        assert!(pe.checksum_is_valid());
        assert_eq!(pe.compute_checksum(), Some(first));
        assert_eq!(pe.fix_checksum().unwrap(), first);
    }

    #[test]
    fn independent_of_stored_value() {
        let zero = open(&image().checksum(0)).compute_checksum().unwrap();
        let other = open(&image().checksum(0xDEAD_BEEF)).compute_checksum().unwrap();
        assert_eq!(zero, other);
    }

    #[test]
    fn byte_change_changes_checksum() {
        let mut bytes = image().build();
        let before = compute_checksum(&bytes, 0);
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert_ne!(compute_checksum(&bytes, 0), before);
    }

    #[test]
    fn odd_length_sums_trailing_byte() {
        assert_eq!(compute_checksum(&[0x01, 0x02, 0x03], 0), 0x0201 + 0x03 + 3);
    }

    #[test]
    fn stored_words_are_subtracted() {
        // file bytes include the stored checksum itself
        let data = [0x34, 0x12, 0x78, 0x56];
        assert_eq!(compute_checksum(&data, 0x5678_1234), 4);
    }
}
