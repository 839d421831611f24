pub mod catalog;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use catalog::{FileCatalog, PgFileCatalog};
pub use handlers::FilesState;
pub use routes::routes;
pub use services::{FileQueryService, UploadService};
