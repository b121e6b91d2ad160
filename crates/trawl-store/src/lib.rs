pub mod csv_store;
pub mod file;
pub mod json_store;
pub mod memory;

pub use csv_store::CsvStore;
pub use file::{FileStore, OutputFormat};
pub use json_store::JsonStore;
pub use memory::MemoryStore;
