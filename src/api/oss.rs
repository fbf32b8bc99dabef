use axum::{
    extract::{multipart::MultipartError, Multipart, Query, State},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use oss_adapter::drivers::oss::{
    IncomingFile, OssExtensions, RejectionKind, UploadPolicy, UploadRejection,
};

use super::{error_response, ApiError, ApiResponse};
use crate::state::AppState;

/// 直传policy默认有效期（秒）
const DEFAULT_POLICY_TTL: u64 = 30;
const DEFAULT_DOWNLOAD_EXPIRES: u32 = 3600;

#[derive(Debug, Deserialize)]
pub struct SignatureQuery {
    pub dir: String,
    pub ttl: Option<u64>,
}

/// 获取直传签名
pub async fn get_signature(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SignatureQuery>,
) -> Result<Json<UploadPolicy>, ApiError> {
    let ttl = query.ttl.unwrap_or(DEFAULT_POLICY_TTL);
    state
        .oss
        .direct_upload_signature(&query.dir, ttl)
        .map(Json)
        .map_err(error_response)
}

/// OSS上传回调：记录OSS服务端替换后的参数并应答
pub async fn upload_callback(body: String) -> Json<Value> {
    let params: Vec<(String, String)> = url::form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .collect();
    tracing::info!("OSS upload callback: {:?}", params);
    Json(json!({"Status": "OK"}))
}

#[derive(Debug, Deserialize)]
pub struct FileUrlQuery {
    pub path: String,
    pub ttl: Option<u32>,
}

/// 获取文件访问地址（私有文件返回签名URL）
pub async fn get_file_url(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileUrlQuery>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    let ttl = query.ttl.unwrap_or(state.config.oss.upload.read_url_ttl);
    let url = state
        .oss
        .file_url(&query.path, ttl)
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::with_code(0, "文件读取成功", url)))
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub path: String,
    pub expires: Option<u32>,
    pub host: Option<String>,
    pub ssl: Option<bool>,
}

/// 获取签名下载地址
pub async fn get_download_url(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DownloadQuery>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    let url = state
        .oss
        .signed_download_url(
            &query.path,
            query.expires.unwrap_or(DEFAULT_DOWNLOAD_EXPIRES),
            query.host.as_deref().unwrap_or(""),
            query.ssl.unwrap_or(false),
        )
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(url)))
}

/// 服务端中转上传
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Json<ApiResponse<String>> {
    let result = match read_upload_form(multipart, &state.config.oss.upload.field_name).await {
        Ok((file, dir)) => {
            state
                .oss
                .put_uploaded_file(file.as_ref(), &dir, &state.config.get_upload_dir())
                .await
        }
        Err(rejection) => Err(rejection),
    };

    match result {
        Ok(url) => Json(ApiResponse::with_code(0, "上传成功", url)),
        Err(rejection) => Json(ApiResponse::with_code(
            rejection.code as i32,
            &rejection.message,
            rejection.detail,
        )),
    }
}

/// 读取上传表单：文件字段和目标目录；请求体无法解析时直接拒绝
async fn read_upload_form(
    mut multipart: Multipart,
    field_name: &str,
) -> Result<(Option<IncomingFile>, String), UploadRejection> {
    let malformed = |e: MultipartError| {
        tracing::warn!("Malformed multipart body: {}", e);
        UploadRejection::new(RejectionKind::MalformedRequest, e.body_text())
    };
    let mut file: Option<IncomingFile> = None;
    let mut dir = String::new();

    while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or("").to_string();

        if name == field_name {
            let file_name = field.file_name().unwrap_or("").to_string();
            let content_type = field.content_type().unwrap_or("").to_string();
            let mut data = Vec::new();
            while let Some(chunk) = field.chunk().await.map_err(malformed)? {
                data.extend_from_slice(&chunk);
            }
            file = Some(IncomingFile {
                file_name,
                content_type,
                data: Bytes::from(data),
            });
        } else if name == "dir" {
            dir = field.text().await.map_err(malformed)?;
        }
    }

    Ok((file, dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::{header, Request};

    const BOUNDARY: &str = "X-BOUNDARY";

    async fn multipart(body: &'static str) -> Multipart {
        let request = Request::builder()
            .method("POST")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_read_upload_form() {
        let body = "--X-BOUNDARY\r\n\
            Content-Disposition: form-data; name=\"dir\"\r\n\r\n\
            avatars\r\n\
            --X-BOUNDARY\r\n\
            Content-Disposition: form-data; name=\"photo\"; filename=\"cat.png\"\r\n\
            Content-Type: image/png\r\n\r\n\
            abc\r\n\
            --X-BOUNDARY--\r\n";

        let (file, dir) = read_upload_form(multipart(body).await, "photo").await.unwrap();
        let file = file.unwrap();
        assert_eq!(dir, "avatars");
        assert_eq!(file.file_name, "cat.png");
        assert_eq!(file.content_type, "image/png");
        assert_eq!(file.data, Bytes::from_static(b"abc"));
    }

    #[tokio::test]
    async fn test_truncated_form_is_malformed_not_missing() {
        // 缺少结束边界
        let body = "--X-BOUNDARY\r\n\
            Content-Disposition: form-data; name=\"photo\"; filename=\"cat.png\"\r\n\
            Content-Type: image/png\r\n\r\n\
            abc";

        let rejection = read_upload_form(multipart(body).await, "photo").await.unwrap_err();
        assert_eq!(rejection.code, RejectionKind::MalformedRequest.code());
        assert_eq!(rejection.code, 90008);
    }

    #[tokio::test]
    async fn test_form_without_file_field() {
        let body = "--X-BOUNDARY\r\n\
            Content-Disposition: form-data; name=\"dir\"\r\n\r\n\
            avatars\r\n\
            --X-BOUNDARY--\r\n";

        let (file, dir) = read_upload_form(multipart(body).await, "photo").await.unwrap();
        assert!(file.is_none());
        assert_eq!(dir, "avatars");
    }
}
