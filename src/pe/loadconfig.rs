//! Load configuration directory reader.
//!
//! The structure grew with nearly every Windows release and its first field records how many
//! bytes the producing linker wrote. Fields past that size are not part of the image and read
//! as zero, whatever bytes happen to follow.

use crate::pe::{
    layout::{LayoutRecord, LOAD_CONFIG_DIRECTORY},
    DataDirectoryType, PeFile,
};

/// `IMAGE_LOAD_CONFIG_DIRECTORY32` / `IMAGE_LOAD_CONFIG_DIRECTORY64`.
#[derive(Debug, Clone)]
pub struct LoadConfigDirectory {
    record: LayoutRecord,
}

impl LoadConfigDirectory {
    /// Structure size declared by the linker.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.record.get_u32("Size")
    }

    /// Timestamp.
    #[must_use]
    pub fn time_date_stamp(&self) -> u32 {
        self.record.get_u32("TimeDateStamp")
    }

    /// VA of the `/GS` security cookie.
    #[must_use]
    pub fn security_cookie(&self) -> u64 {
        self.record.get("SecurityCookie")
    }

    /// VA of the SafeSEH handler table (32-bit images).
    #[must_use]
    pub fn se_handler_table(&self) -> u64 {
        self.record.get("SEHandlerTable")
    }

    /// Number of SafeSEH handlers.
    #[must_use]
    pub fn se_handler_count(&self) -> u64 {
        self.record.get("SEHandlerCount")
    }

    /// VA of the Control Flow Guard function table.
    #[must_use]
    pub fn guard_cf_function_table(&self) -> u64 {
        self.record.get("GuardCFFunctionTable")
    }

    /// Number of Control Flow Guard targets.
    #[must_use]
    pub fn guard_cf_function_count(&self) -> u64 {
        self.record.get("GuardCFFunctionCount")
    }

    /// `IMAGE_GUARD_*` flags.
    #[must_use]
    pub fn guard_flags(&self) -> u32 {
        self.record.get_u32("GuardFlags")
    }

    /// Any field by its Windows SDK name, 0 when absent.
    #[must_use]
    pub fn get(&self, name: &str) -> u64 {
        self.record.get(name)
    }

    /// Fields present in the image, in declaration order.
    pub fn present_fields(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.record
            .layout()
            .fields
            .iter()
            .filter_map(|field| Some((field.name, self.record.try_get(field.name)?)))
    }

    /// The underlying field values.
    #[must_use]
    pub fn record(&self) -> &LayoutRecord {
        &self.record
    }
}

impl PeFile {
    /// Reads the load configuration directory.
    #[must_use]
    pub fn load_config(&self) -> Option<LoadConfigDirectory> {
        let directory = self.data_directory(DataDirectoryType::LoadConfig)?;
        let map = self.map();

        let offset = map.rel_address_to_offset(u64::from(directory.virtual_address))?;
        let declared = self.file().read_u32(offset, false).ok()?;
        if declared == 0 {
            log::debug!("load config directory declares size 0");
            return None;
        }

        let record = LayoutRecord::read(
            self.file(),
            offset,
            &LOAD_CONFIG_DIRECTORY,
            self.is_64(),
            Some(u64::from(declared)),
        );
        Some(LoadConfigDirectory { record })
    }
}

#[cfg(test)]
mod tests {
    use crate::test::{dir, open, TestImage};

    #[test]
    fn fields_past_declared_size_read_zero() {
        let mut data = vec![0xFFu8; 0x140];
        // 64-bit SecurityCookie sits at 88..96, declare only 96 bytes
        data[0..4].copy_from_slice(&96u32.to_le_bytes());
        data[88..96].copy_from_slice(&0x1_4000_3000u64.to_le_bytes());

        let pe = open(
            &TestImage::new(true)
                .section(".rdata", 0x2000, data)
                .directory(dir::LOAD_CONFIG, 0x2000, 0x140),
        );
        let config = pe.load_config().unwrap();

        assert_eq!(config.size(), 96);
        assert_eq!(config.security_cookie(), 0x1_4000_3000);
        assert_eq!(config.guard_flags(), 0);
        assert_eq!(config.guard_cf_function_table(), 0);
        assert!(config.present_fields().all(|(name, _)| name != "GuardFlags"));
    }

    #[test]
    fn pe32_layout() {
        let mut data = vec![0u8; 0xC0];
        data[0..4].copy_from_slice(&0xC0u32.to_le_bytes());
        data[60..64].copy_from_slice(&0x0040_5000u32.to_le_bytes());
        data[64..68].copy_from_slice(&0x0040_6000u32.to_le_bytes());
        data[68..72].copy_from_slice(&3u32.to_le_bytes());
        data[88..92].copy_from_slice(&0x0000_0100u32.to_le_bytes());

        let pe = open(
            &TestImage::new(false)
                .section(".rdata", 0x2000, data)
                .directory(dir::LOAD_CONFIG, 0x2000, 0x40),
        );
        let config = pe.load_config().unwrap();

        assert_eq!(config.security_cookie(), 0x0040_5000);
        assert_eq!(config.se_handler_table(), 0x0040_6000);
        assert_eq!(config.se_handler_count(), 3);
        assert_eq!(config.guard_flags(), 0x100);
        assert_eq!(config.get("NoSuchField"), 0);
    }
}
