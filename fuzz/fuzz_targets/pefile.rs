#![no_main]

use libfuzzer_sys::fuzz_target;
use pescope::{MapMode, PeFile};

fuzz_target!(|data: &[u8]| {
    let Ok(pe) = PeFile::from_mem(data.to_vec()) else {
        return;
    };

    let map = pe.memory_map(MapMode::File);
    for region in &map.regions {
        if let Some(offset) = region.file_offset {
            let _ = map.offset_to_address(offset);
        }
    }
    let _ = pe.memory_map(MapMode::Image);

    let _ = pe.imports();
    let _ = pe.delay_imports();
    let _ = pe.bound_imports();
    let _ = pe.exports(false);
    let _ = pe.resources();
    let _ = pe.resource_tree();
    let _ = pe.version_info();
    let _ = pe.relocations();
    let _ = pe.tls_directory();
    let _ = pe.load_config();
    let _ = pe.debug_directories();
    let _ = pe.pdb_info();
    let _ = pe.signatures();
    if let Some(metadata) = pe.dotnet() {
        if let Some(tables) = metadata.tables() {
            for table in tables.present_tables() {
                let _ = metadata.rows(table);
            }
        }
    }
    let _ = pe.compute_checksum();
});
