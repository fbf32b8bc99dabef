//! 服务端中转上传的预检
//!
//! 校验顺序：字段存在 -> 文件非空 -> 本地目录可读 -> 大小 -> MIME类型 -> 落盘。
//! 每种失败对应一个独立的错误码，调用方（通常是web handler）直接转给用户。

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use super::config::UploadConfig;
use crate::utils::basename;

/// A file received from a multipart form / 表单上传的文件
#[derive(Debug, Clone)]
pub struct IncomingFile {
    /// Client-side file name
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// 预检失败原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    MissingField,
    EmptyFile,
    LocalDirUnavailable,
    TooLarge,
    TypeNotAllowed,
    SaveFailed,
    BackendWriteFailed,
    MalformedRequest,
}

impl RejectionKind {
    pub fn code(&self) -> u32 {
        match self {
            RejectionKind::MissingField => 90001,
            RejectionKind::EmptyFile => 90002,
            RejectionKind::LocalDirUnavailable => 90003,
            RejectionKind::TooLarge => 90004,
            RejectionKind::TypeNotAllowed => 90005,
            RejectionKind::SaveFailed => 90006,
            RejectionKind::BackendWriteFailed => 90007,
            RejectionKind::MalformedRequest => 90008,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            RejectionKind::MissingField => "未找到上传文件",
            RejectionKind::EmptyFile => "上传文件为空或无效",
            RejectionKind::LocalDirUnavailable => "本地上传目录不存在或不可读",
            RejectionKind::TooLarge => "文件大小超过限制",
            RejectionKind::TypeNotAllowed => "不允许的文件类型",
            RejectionKind::SaveFailed => "保存上传文件失败",
            RejectionKind::BackendWriteFailed => "上传到存储失败",
            RejectionKind::MalformedRequest => "上传请求格式错误",
        }
    }
}

/// Structured upload failure `{code, message, detail}` / 上传失败信息
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("[{code}] {message}: {detail}")]
pub struct UploadRejection {
    pub code: u32,
    pub message: String,
    pub detail: String,
}

impl UploadRejection {
    pub fn new(kind: RejectionKind, detail: impl Into<String>) -> Self {
        Self {
            code: kind.code(),
            message: kind.message().to_string(),
            detail: detail.into(),
        }
    }
}

/// Local name for an accepted upload: `YYYY_MM_DD_<8 digits>_<basename>` / 生成本地文件名
pub fn generate_file_name<R: Rng + ?Sized>(now: DateTime<Utc>, original: &str, rng: &mut R) -> String {
    let serial: u32 = rng.gen_range(0..100_000_000);
    format!("{}_{:08}_{}", now.format("%Y_%m_%d"), serial, basename(original))
}

/// Validate an upload and save it into `local_dir` / 校验并落盘
///
/// Returns the path of the saved file.
pub async fn prepare_upload(
    upload: Option<&IncomingFile>,
    local_dir: &Path,
    rules: &UploadConfig,
) -> Result<PathBuf, UploadRejection> {
    let file = upload.ok_or_else(|| UploadRejection::new(RejectionKind::MissingField, "no file field"))?;

    if file.data.is_empty() || basename(&file.file_name).is_empty() {
        return Err(UploadRejection::new(
            RejectionKind::EmptyFile,
            format!("file '{}' has no content", file.file_name),
        ));
    }

    let readable = match tokio::fs::metadata(local_dir).await {
        Ok(meta) if meta.is_dir() => tokio::fs::read_dir(local_dir).await.is_ok(),
        _ => false,
    };
    if !readable {
        return Err(UploadRejection::new(
            RejectionKind::LocalDirUnavailable,
            local_dir.display().to_string(),
        ));
    }

    let size = file.data.len() as u64;
    if size > rules.max_file_size {
        return Err(UploadRejection::new(
            RejectionKind::TooLarge,
            format!("{} bytes, limit {}", size, rules.max_file_size),
        ));
    }

    let mime = file.content_type.trim().to_ascii_lowercase();
    if !rules.allowed_types.iter().any(|t| t.eq_ignore_ascii_case(&mime)) {
        return Err(UploadRejection::new(RejectionKind::TypeNotAllowed, mime));
    }

    let name = generate_file_name(Utc::now(), &file.file_name, &mut rand::thread_rng());
    let target = local_dir.join(&name);
    tokio::fs::write(&target, &file.data).await.map_err(|e| {
        tracing::warn!("Failed to save upload {:?}: {}", target, e);
        UploadRejection::new(RejectionKind::SaveFailed, e.to_string())
    })?;

    tracing::debug!("Upload accepted: {:?} ({} bytes, {})", target, size, mime);
    Ok(target)
}
