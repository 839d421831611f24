mod file;

pub use file::{CatalogPage, CatalogStats, FileRecord};
