mod core;
mod features;
mod modules;
mod shared;

use crate::core::config::{Config, StorageBackend, StorageConfig};
use crate::core::openapi::{ApiDoc, SwaggerInfoModifier};
use crate::core::{database, middleware};
use crate::features::files::{
    routes as files_routes, FileCatalog, FileQueryService, FilesState, PgFileCatalog,
    UploadService,
};
use crate::features::health;
use crate::modules::storage::{BlobStore, LocalBlobStore, MinioBlobStore};
use axum::{middleware::from_fn, Router};
use std::sync::Arc;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn main() -> anyhow::Result<()> {
    // Build Tokio runtime with configurable worker threads
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .max_blocking_threads(worker_threads * 4)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(worker_threads))
}

/// Build the configured blob store and make sure it can accept writes
async fn init_blob_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config.backend {
        StorageBackend::Local => Arc::new(LocalBlobStore::new(config.upload_dir.clone())),
        StorageBackend::Minio => Arc::new(
            MinioBlobStore::new(config.minio.clone())
                .map_err(|e| anyhow::anyhow!("Failed to initialize MinIO client: {}", e))?,
        ),
    };

    store
        .ensure_ready()
        .await
        .map_err(|e| anyhow::anyhow!("Blob store is not ready: {}", e))?;

    Ok(store)
}

async fn async_main(worker_threads: usize) -> anyhow::Result<()> {
    // Load .env file BEFORE initializing logger so RUST_LOG is available
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(
        "System info: available_cpus={}, tokio_worker_threads={}, pid={}",
        std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(1),
        worker_threads,
        std::process::id()
    );
    tracing::info!("Configuration loaded successfully");

    // Blob storage comes up before the catalog so a bad upload dir fails fast
    let blob_store = init_blob_store(&config.storage).await?;
    tracing::info!(
        "Blob store initialized: backend={}",
        blob_store.backend_name()
    );

    let pool = database::create_pool(&config.database).await?;

    tracing::info!("Running database migrations...");
    database::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed successfully");

    let catalog: Arc<dyn FileCatalog> = Arc::new(PgFileCatalog::new(pool.clone()));

    let upload_service = Arc::new(UploadService::new(
        Arc::clone(&catalog),
        Arc::clone(&blob_store),
        config.storage.limits,
    ));
    let query_service = Arc::new(FileQueryService::new(
        Arc::clone(&catalog),
        Arc::clone(&blob_store),
    ));
    tracing::info!(
        "File services initialized (max_file_size={} bytes, max_files_per_upload={})",
        config.storage.limits.max_file_size,
        config.storage.limits.max_files_per_upload
    );

    let app = build_app(&config, FilesState {
        upload_service,
        query_service,
    });

    let addr = config.app.server_address();
    let listener = bind_listener(&addr)?;
    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Swagger UI, health and file routes behind CORS, request-id and trace layers
fn build_app(config: &Config, files_state: FilesState) -> Router {
    let mut openapi = ApiDoc::openapi();
    SwaggerInfoModifier {
        title: config.swagger.title.clone(),
        version: config.swagger.version.clone(),
        description: config.swagger.description.clone(),
    }
    .modify(&mut openapi);

    let mut swagger =
        Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi));
    match config.swagger.credentials() {
        Some(credentials) => {
            tracing::info!("Swagger UI basic auth enabled");
            swagger = swagger.layer(from_fn(middleware::basic_auth_middleware(Arc::new(
                credentials,
            ))));
        }
        None => tracing::info!("Swagger UI basic auth disabled (no credentials configured)"),
    }

    Router::new()
        .merge(swagger)
        .merge(health::routes())
        .merge(files_routes::routes(files_state))
        .layer(middleware::cors_layer(
            config.app.cors_allowed_origins.clone(),
        ))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::MakeSpanWithRequestId)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Outermost, so the id exists before the trace span is made
        .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid))
}

/// Non-blocking TCP listener with address reuse, nodelay and keepalive set
fn bind_listener(addr: &str) -> anyhow::Result<tokio::net::TcpListener> {
    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address {}: {}", addr, e))?;

    let socket = socket2::Socket::new(
        socket2::Domain::for_address(socket_addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nodelay(true)?;
    socket.set_tcp_keepalive(
        &socket2::TcpKeepalive::new().with_time(std::time::Duration::from_secs(60)),
    )?;
    socket.set_nonblocking(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(1024)?;

    Ok(tokio::net::TcpListener::from_std(socket.into())?)
}
