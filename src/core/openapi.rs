use utoipa::{Modify, OpenApi};

use crate::features::files::{dtos as files_dtos, handlers as files_handlers};
use crate::features::health;
use crate::shared::types::{ErrorResponse, MessageResponse, PaginationMeta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health_check,
        // Files
        files_handlers::upload_files,
        files_handlers::list_files,
        files_handlers::get_file,
        files_handlers::download_file,
        files_handlers::delete_file,
        files_handlers::get_stats,
    ),
    components(
        schemas(
            // Shared types
            ErrorResponse,
            MessageResponse,
            PaginationMeta,
            // Health
            health::HealthResponseDto,
            // Files
            files_dtos::UploadFilesDto,
            files_dtos::UploadedFileDto,
            files_dtos::UploadResponseDto,
            files_dtos::FileListResponseDto,
            files_dtos::FileDetailResponseDto,
            files_dtos::StatsDto,
            files_dtos::StatsResponseDto,
        )
    ),
    tags(
        (name = "health", description = "Service liveness"),
        (name = "files", description = "PDF upload, catalog search, download and deletion"),
    ),
    info(
        title = "PDF Vault API",
        version = "0.1.0",
        description = "API documentation for PDF Vault",
    )
)]
pub struct ApiDoc;

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
