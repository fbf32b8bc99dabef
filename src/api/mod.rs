pub mod fs;
pub mod oss;

use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::{json, Value};

use oss_adapter::OssError;

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 200,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn with_code(code: i32, message: &str, data: T) -> Self {
        Self {
            code,
            message: message.to_string(),
            data: Some(data),
        }
    }
}

pub type ApiError = (StatusCode, Json<Value>);

/// Map an adapter error to an HTTP error body / 错误转HTTP响应
pub fn error_response(err: OssError) -> ApiError {
    let status = match &err {
        OssError::NotFound(_) => StatusCode::NOT_FOUND,
        OssError::InvalidArgument(_) | OssError::InvalidUrl(_) | OssError::CrossBucket { .. } => {
            StatusCode::BAD_REQUEST
        }
        OssError::Backend { .. } => StatusCode::BAD_GATEWAY,
        OssError::Config(_) | OssError::Serialize(_) | OssError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(json!({
            "code": status.as_u16(),
            "message": err.to_string(),
        })),
    )
}

/// 健康检查
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "OSS adapter 服务运行正常"
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let (status, body) = error_response(OssError::NotFound("a.txt".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.0["code"], 404);

        let (status, _) = error_response(OssError::CrossBucket {
            from: "pub:a".to_string(),
            to: "pri:b".to_string(),
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = error_response(OssError::Backend {
            op: "read",
            path: "a.txt".to_string(),
            detail: "timeout".to_string(),
        });
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.0["message"], "read failed for 'a.txt': timeout");
    }

    #[test]
    fn test_api_response_omits_empty_data() {
        let resp: ApiResponse<String> = ApiResponse {
            code: 400,
            message: "bad".to_string(),
            data: None,
        };
        assert_eq!(serde_json::to_value(&resp).unwrap(), json!({"code": 400, "message": "bad"}));
    }
}
