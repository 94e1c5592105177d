//! TLS directory reader.
//!
//! The directory stores virtual addresses, not RVAs: the raw data template bounds, the index
//! slot and a zero-terminated array of callback pointers that run before the entry point.

use crate::pe::{
    layout::{LayoutRecord, TLS_DIRECTORY},
    DataDirectoryType, PeFile,
};

/// `IMAGE_TLS_DIRECTORY32` / `IMAGE_TLS_DIRECTORY64` with its callback list.
#[derive(Debug, Clone)]
pub struct TlsDirectory {
    record: LayoutRecord,
    /// Callback virtual addresses in array order
    pub callbacks: Vec<u64>,
}

impl TlsDirectory {
    /// VA of the start of the template data.
    #[must_use]
    pub fn start_address_of_raw_data(&self) -> u64 {
        self.record.get("StartAddressOfRawData")
    }

    /// VA of the end of the template data.
    #[must_use]
    pub fn end_address_of_raw_data(&self) -> u64 {
        self.record.get("EndAddressOfRawData")
    }

    /// VA of the TLS index slot.
    #[must_use]
    pub fn address_of_index(&self) -> u64 {
        self.record.get("AddressOfIndex")
    }

    /// VA of the callback array.
    #[must_use]
    pub fn address_of_callbacks(&self) -> u64 {
        self.record.get("AddressOfCallBacks")
    }

    /// Zero-filled bytes following the template.
    #[must_use]
    pub fn size_of_zero_fill(&self) -> u32 {
        self.record.get_u32("SizeOfZeroFill")
    }

    /// Alignment flags.
    #[must_use]
    pub fn characteristics(&self) -> u32 {
        self.record.get_u32("Characteristics")
    }

    /// The underlying field values.
    #[must_use]
    pub fn record(&self) -> &LayoutRecord {
        &self.record
    }
}

impl PeFile {
    /// Reads the TLS directory and walks its callback array.
    ///
    /// The callback walk stops at a null pointer, an address that does not translate, or after
    /// [`crate::ParseLimits::max_tls_callbacks`] entries.
    #[must_use]
    pub fn tls_directory(&self) -> Option<TlsDirectory> {
        let directory = self.data_directory(DataDirectoryType::Tls)?;
        let map = self.map();
        let is_64 = self.is_64();

        let offset = map.rel_address_to_offset(u64::from(directory.virtual_address))?;
        let record = LayoutRecord::read(self.file(), offset, &TLS_DIRECTORY, is_64, None);

        let mut callbacks = Vec::new();
        let array = record.get("AddressOfCallBacks");
        let pointer_size: u64 = if is_64 { 8 } else { 4 };
        if array != 0 {
            for index in 0..self.options().limits.max_tls_callbacks as u64 {
                if self.is_cancelled() {
                    break;
                }

                let va = array.wrapping_add(index * pointer_size);
                let Some(slot) = map.address_to_offset(va) else {
                    log::debug!("TLS callback slot at 0x{va:x} does not translate");
                    break;
                };
                match self.file().read_native(slot, is_64) {
                    Ok(0) | Err(_) => break,
                    Ok(callback) => callbacks.push(callback),
                }
            }
        }

        Some(TlsDirectory { record, callbacks })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::{ParseLimits, ParserOptions},
        test::{dir, open, open_with, TestImage, DEFAULT_IMAGE_BASE_32, DEFAULT_IMAGE_BASE_64},
    };

    fn tls32(callbacks: &[u32]) -> TestImage {
        let base = DEFAULT_IMAGE_BASE_32 as u32;
        let mut data = vec![0u8; 0x40];
        data[0..4].copy_from_slice(&(base + 0x2100).to_le_bytes());
        data[4..8].copy_from_slice(&(base + 0x2110).to_le_bytes());
        data[8..12].copy_from_slice(&(base + 0x2120).to_le_bytes());
        data[12..16].copy_from_slice(&(base + 0x2020).to_le_bytes());
        data[16..20].copy_from_slice(&0x10u32.to_le_bytes());
        for (index, callback) in callbacks.iter().enumerate() {
            let at = 0x20 + index * 4;
            data[at..at + 4].copy_from_slice(&callback.to_le_bytes());
        }

        TestImage::new(false)
            .section(".tls", 0x2000, data)
            .directory(dir::TLS, 0x2000, 24)
    }

    #[test]
    fn pe32_callbacks() {
        let pe = open(&tls32(&[0x0040_1000, 0x0040_1010]));
        let tls = pe.tls_directory().unwrap();

        assert_eq!(tls.start_address_of_raw_data(), 0x0040_2100);
        assert_eq!(tls.end_address_of_raw_data(), 0x0040_2110);
        assert_eq!(tls.address_of_index(), 0x0040_2120);
        assert_eq!(tls.size_of_zero_fill(), 0x10);
        assert_eq!(tls.callbacks, vec![0x0040_1000, 0x0040_1010]);
    }

    #[test]
    fn callback_limit() {
        let callbacks = vec![0x0040_1000; 6];
        let limits = ParseLimits {
            max_tls_callbacks: 4,
            ..ParseLimits::default()
        };
        let pe = open_with(&tls32(&callbacks), ParserOptions::default().with_limits(limits));

        assert_eq!(pe.tls_directory().unwrap().callbacks.len(), 4);
    }

    #[test]
    fn pe32plus_layout() {
        let base = DEFAULT_IMAGE_BASE_64;
        let mut data = vec![0u8; 0x60];
        data[24..32].copy_from_slice(&(base + 0x2040).to_le_bytes());
        data[36..40].copy_from_slice(&0x0010_0000u32.to_le_bytes());
        data[0x40..0x48].copy_from_slice(&(base + 0x1000).to_le_bytes());

        let pe = open(
            &TestImage::new(true)
                .section(".tls", 0x2000, data)
                .directory(dir::TLS, 0x2000, 40),
        );
        let tls = pe.tls_directory().unwrap();

        assert_eq!(tls.characteristics(), 0x0010_0000);
        assert_eq!(tls.callbacks, vec![base + 0x1000]);
    }
}
