// Adapters layer: concrete implementations for external systems (file formats, storage).

pub mod gridded_csv;
pub mod regions_json;
pub mod storage;
pub mod writers;
