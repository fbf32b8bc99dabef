use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Entry type / 条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

/// Directory listing entry / 目录列表条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Logical path (path prefix removed) / 逻辑路径
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Entry {
    pub fn file(path: String, size: u64, timestamp: Option<i64>) -> Self {
        Self {
            kind: EntryKind::File,
            path,
            timestamp,
            size: Some(size),
        }
    }

    pub fn dir(path: String, timestamp: Option<i64>) -> Self {
        Self {
            kind: EntryKind::Dir,
            path,
            timestamp,
            size: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// Object attributes reported by the backend, rebuilt on every query / 对象元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub dirname: String,
    pub path: String,
    pub timestamp: Option<i64>,
    pub mimetype: String,
    pub size: u64,
}

/// Recognized write options (`mimetype`, `size`) / 写入选项
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl WriteOptions {
    /// Build from an `{option: value}` map, ignoring unknown keys / 从配置映射构建
    pub fn from_map(map: &HashMap<String, Value>) -> Self {
        Self {
            mimetype: map
                .get("mimetype")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            size: map.get("size").and_then(|v| v.as_u64()),
        }
    }

    pub fn mimetype(mut self, val: &str) -> Self {
        self.mimetype = Some(val.to_string());
        self
    }

    pub fn size(mut self, val: u64) -> Self {
        self.size = Some(val);
        self
    }
}

/// Result of a successful write / 写入结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenFile {
    pub path: String,
    pub mimetype: String,
    pub size: u64,
}

/// Result of a successful read / 读取结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContents {
    pub path: String,
    pub contents: Bytes,
}

/// Per-object result of a batch delete / 批量删除的单个对象结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub key: String,
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeleteOutcome {
    pub fn ok(key: &str) -> Self {
        Self {
            key: key.to_string(),
            deleted: true,
            error: None,
        }
    }

    pub fn failed(key: &str, error: String) -> Self {
        Self {
            key: key.to_string(),
            deleted: false,
            error: Some(error),
        }
    }
}

/// Generic filesystem interface (one implementation per backend) / 通用文件系统接口
///
/// Paths are logical, slash-separated and relative to the disk root. A leading
/// `/` is ignored.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Driver name / 驱动名称
    fn name(&self) -> &str;

    /// Write a new file / 写入文件
    async fn write(&self, path: &str, contents: Bytes, options: &WriteOptions) -> Result<WrittenFile>;

    /// Update a file (same as write for object storage) / 更新文件
    async fn update(&self, path: &str, contents: Bytes, options: &WriteOptions) -> Result<WrittenFile> {
        self.write(path, contents, options).await
    }

    /// Upload a local file / 上传本地文件
    async fn put_file(&self, path: &str, local_file: &Path, options: &WriteOptions) -> Result<WrittenFile>;

    /// Read a file / 读取文件
    async fn read(&self, path: &str) -> Result<FileContents>;

    /// Check whether a file exists / 检查文件是否存在
    async fn has(&self, path: &str) -> Result<bool>;

    /// Delete a single file / 删除文件
    async fn delete(&self, path: &str) -> Result<()>;

    /// Delete a directory and everything below it / 删除目录
    async fn delete_dir(&self, dirname: &str) -> Result<Vec<DeleteOutcome>>;

    /// Create a directory / 创建目录
    async fn create_dir(&self, dirname: &str, options: &WriteOptions) -> Result<Entry>;

    /// Copy a file / 复制文件
    async fn copy(&self, path: &str, new_path: &str) -> Result<()>;

    /// Rename a file / 重命名文件
    async fn rename(&self, path: &str, new_path: &str) -> Result<()>;

    /// List directory contents / 列出目录内容
    async fn list_contents(&self, directory: &str, recursive: bool) -> Result<Vec<Entry>>;

    /// Get file metadata / 获取元数据
    async fn get_metadata(&self, path: &str) -> Result<ObjectMetadata>;

    async fn get_size(&self, path: &str) -> Result<u64> {
        Ok(self.get_metadata(path).await?.size)
    }

    async fn get_mimetype(&self, path: &str) -> Result<String> {
        Ok(self.get_metadata(path).await?.mimetype)
    }

    async fn get_timestamp(&self, path: &str) -> Result<Option<i64>> {
        Ok(self.get_metadata(path).await?.timestamp)
    }
}

pub mod manager;

pub use manager::{DiskBox, StorageManager};
