//! Error types / 错误类型

use thiserror::Error;

/// Adapter error / 适配器错误
///
/// Every public operation returns `Result<T, OssError>`; backend failures are
/// converted here and never escape as panics.
#[derive(Debug, Error)]
pub enum OssError {
    /// Missing or inconsistent static configuration / 配置缺失
    #[error("configuration error: {0}")]
    Config(String),

    /// The storage client reported a failure / 存储后端调用失败
    #[error("{op} failed for '{path}': {detail}")]
    Backend {
        op: &'static str,
        path: String,
        detail: String,
    },

    #[error("object not found: {0}")]
    NotFound(String),

    /// Source and destination live in different buckets / 跨存储桶复制
    #[error("cross-bucket copy is not supported: {from} -> {to}")]
    CrossBucket { from: String, to: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl OssError {
    /// Wrap a storage client error, logging it on the way / 包装后端错误并记录日志
    pub fn backend(op: &'static str, path: &str, err: anyhow::Error) -> Self {
        let detail = format!("{:#}", err);
        tracing::warn!("OSS {} failed: path={}, error={}", op, path, detail);
        OssError::Backend {
            op,
            path: path.to_string(),
            detail,
        }
    }
}

pub type Result<T> = std::result::Result<T, OssError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_keeps_detail() {
        let err = OssError::backend("copy", "a.txt", anyhow::anyhow!("AccessDenied"));
        match &err {
            OssError::Backend { op, path, detail } => {
                assert_eq!(*op, "copy");
                assert_eq!(path, "a.txt");
                assert_eq!(detail, "AccessDenied");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(err.to_string(), "copy failed for 'a.txt': AccessDenied");
    }
}
