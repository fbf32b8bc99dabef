use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use oss_adapter::storage::{DeleteOutcome, DiskBox, Entry, ObjectMetadata};

use super::{error_response, ApiError, ApiResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FsListReq {
    pub path: Option<String>,
    pub recursive: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct FsPathReq {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct FsRemoveReq {
    pub path: String,
    #[serde(default)]
    pub is_dir: bool,
}

/// 按挂载表解析到磁盘和磁盘内路径
async fn resolve(state: &AppState, path: &str) -> Result<(DiskBox, String), ApiError> {
    state.storage.resolve_path(path).await.ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"code": 404, "message": format!("No disk mounted for {}", path)})),
        )
    })
}

/// 列出目录
pub async fn fs_list(
    State(state): State<Arc<AppState>>,
    Query(req): Query<FsListReq>,
) -> Result<Json<ApiResponse<Vec<Entry>>>, ApiError> {
    let path = req.path.unwrap_or_else(|| "/".to_string());
    let (disk, actual) = resolve(&state, &path).await?;
    let entries = disk
        .list_contents(&actual, req.recursive.unwrap_or(false))
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(entries)))
}

/// 获取文件元数据
pub async fn fs_meta(
    State(state): State<Arc<AppState>>,
    Query(req): Query<FsPathReq>,
) -> Result<Json<ApiResponse<ObjectMetadata>>, ApiError> {
    let (disk, actual) = resolve(&state, &req.path).await?;
    let meta = disk.get_metadata(&actual).await.map_err(error_response)?;
    Ok(Json(ApiResponse::success(meta)))
}

/// 删除文件或目录，目录返回逐个对象的删除结果
pub async fn fs_remove(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FsRemoveReq>,
) -> Result<Json<Value>, ApiError> {
    let (disk, actual) = resolve(&state, &req.path).await?;

    if req.is_dir {
        let outcomes: Vec<DeleteOutcome> = disk.delete_dir(&actual).await.map_err(error_response)?;
        let failed = outcomes.iter().filter(|o| !o.deleted).count();
        let (code, message) = if failed == 0 {
            (200, "success")
        } else {
            (207, "partially deleted")
        };
        return Ok(Json(json!({
            "code": code,
            "message": message,
            "data": outcomes,
        })));
    }

    disk.delete(&actual).await.map_err(error_response)?;
    Ok(Json(json!({"code": 200, "message": "success"})))
}
