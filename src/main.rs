use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod state;

use oss_adapter::config;
use oss_adapter::drivers::oss::{AccessClass, OssDriverFactory, OssExtensions};
use oss_adapter::storage::StorageManager;
use state::AppState;

/// 表单中除文件外的其他字段预留空间
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oss_adapter=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration / 加载配置
    let app_config = config::load_config().map_err(anyhow::Error::msg)?;
    tracing::info!("Server will listen on {}:{}", app_config.server.host, app_config.server.port);

    // Create upload staging directory if not exists / 创建上传暂存目录
    let upload_dir = app_config.get_upload_dir();
    if !upload_dir.exists() {
        std::fs::create_dir_all(&upload_dir)?;
        tracing::info!("Created upload directory: {:?}", upload_dir);
    }

    let oss = match OssDriverFactory.create_from_config(app_config.oss.clone()) {
        Ok(adapter) => Arc::new(adapter),
        Err(e) => {
            tracing::error!("Failed to initialize OSS adapter: {:#}", e);
            return Err(e);
        }
    };

    let storage_manager = StorageManager::new();
    storage_manager.mount(&app_config.mount_path, oss.clone()).await?;

    // Check bucket ACLs in background, mismatches are only logged / 后台校验存储桶权限
    let checker = oss.clone();
    tokio::spawn(async move {
        for access in [AccessClass::Public, AccessClass::Private] {
            if let Err(e) = checker.verify_bucket_acl(access).await {
                tracing::warn!("Bucket ACL check skipped for {:?}: {}", access, e);
            }
        }
    });

    let body_limit = usize::try_from(app_config.oss.upload.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let state = Arc::new(AppState {
        config: app_config.clone(),
        storage: storage_manager,
        oss,
    });

    let app = Router::new()
        .route("/api/health", get(api::health_check))
        // OSS routes
        .route("/api/oss/signature", get(api::oss::get_signature))
        .route("/api/oss/callback", post(api::oss::upload_callback))
        .route("/api/oss/file", get(api::oss::get_file_url))
        .route("/api/oss/download", get(api::oss::get_download_url))
        .route("/api/oss/upload", post(api::oss::upload_file))
        // File routes
        .route("/api/fs/list", get(api::fs::fs_list))
        .route("/api/fs/meta", get(api::fs::fs_meta))
        .route("/api/fs/remove", post(api::fs::fs_remove))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let bind_addr = app_config.get_bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server running at http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
