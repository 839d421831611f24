mod query_service;
mod upload_service;

pub use query_service::FileQueryService;
pub use upload_service::{UploadItem, UploadService};
