pub mod certs;
pub mod checksum;
pub mod common;
pub mod debug;
pub mod dotnet;
pub mod exports;
pub mod imports;
pub mod info;
pub mod loadconfig;
pub mod map;
pub mod relocs;
pub mod resources;
pub mod tls;
