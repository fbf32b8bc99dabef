//! OSS驱动实现
//!
//! 每个操作先按逻辑路径解析出存储桶，再委托给存储客户端；客户端错误统一转换为 `OssError`。
//! rename 是 复制+删除，不是原子操作；delete_dir 是 列表+批量删除，并发修改同一目录时不保证一致。

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::client::{BucketAcl, ListRequest, SignMethod, StorageClient};
use super::config::OssConfig;
use super::policy::{AccessClass, BucketTarget, PathPolicyResolver};
use super::signer::{SignedRequestBuilder, UploadPolicy, UrlRewrite};
use super::upload::{prepare_upload, IncomingFile, RejectionKind, UploadRejection};
use crate::error::{OssError, Result};
use crate::storage::{
    DeleteOutcome, Entry, EntryKind, FileContents, ObjectMetadata, StorageDriver, WriteOptions,
    WrittenFile,
};
use crate::utils::dirname;

const DELIMITER: &str = "/";

/// Provider-specific operations beyond the generic filesystem / OSS扩展操作
#[async_trait]
pub trait OssExtensions: Send + Sync {
    /// Bucket for an access class in the active environment / 选择存储桶
    fn select_bucket(&self, access: AccessClass) -> BucketTarget;

    /// Browser direct-upload policy restricted to `dir` / 直传签名
    fn direct_upload_signature(&self, dir: &str, ttl_secs: u64) -> Result<UploadPolicy>;

    /// Read URL: plain for public paths, signed GET for private ones / 文件访问地址
    async fn file_url(&self, path: &str, ttl_secs: u32) -> Result<String>;

    /// Signed GET URL with optional host/scheme rewrite / 签名下载地址
    async fn signed_download_url(
        &self,
        path: &str,
        expires: u32,
        host_name: &str,
        use_ssl: bool,
    ) -> Result<String>;

    /// Validate a form upload, stage it locally and push it to `oss_dir` / 服务端中转上传
    async fn put_uploaded_file(
        &self,
        upload: Option<&IncomingFile>,
        oss_dir: &str,
        local_dir: &Path,
    ) -> std::result::Result<String, UploadRejection>;

    /// Whether the bucket ACL matches the access class / 校验存储桶权限
    async fn verify_bucket_acl(&self, access: AccessClass) -> Result<bool>;
}

/// OSS存储适配器
pub struct OssAdapter {
    client: Arc<dyn StorageClient>,
    resolver: PathPolicyResolver,
    signer: SignedRequestBuilder,
    config: OssConfig,
    /// 对象key前缀，非空时以 `/` 结尾
    path_prefix: String,
}

impl OssAdapter {
    pub fn new(config: OssConfig, client: Arc<dyn StorageClient>) -> Result<Self> {
        if config.access_id.trim().is_empty() || config.access_key.trim().is_empty() {
            return Err(OssError::Config("access_id and access_key are required".to_string()));
        }
        if config.list_page_size == 0 {
            return Err(OssError::Config("list_page_size must be positive".to_string()));
        }

        let resolver = PathPolicyResolver::new(&config)?;
        let signer = SignedRequestBuilder::new(&config);
        let prefix = config.prefix.trim_matches('/');
        let path_prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", prefix)
        };

        tracing::info!(
            "OSS adapter ready: env={}, public={}, private={}, prefix='{}'",
            resolver.environment().as_str(),
            resolver.target(AccessClass::Public).bucket,
            resolver.target(AccessClass::Private).bucket,
            path_prefix
        );

        Ok(Self {
            client,
            resolver,
            signer,
            config,
            path_prefix,
        })
    }

    pub fn resolver(&self) -> &PathPolicyResolver {
        &self.resolver
    }

    pub fn config(&self) -> &OssConfig {
        &self.config
    }

    /// Logical path -> object key / 逻辑路径转对象key
    pub fn apply_path_prefix(&self, path: &str) -> String {
        format!("{}{}", self.path_prefix, path.trim_start_matches('/'))
    }

    /// Object key -> logical path / 对象key转逻辑路径
    pub fn remove_path_prefix(&self, key: &str) -> String {
        key.strip_prefix(self.path_prefix.as_str())
            .unwrap_or(key)
            .to_string()
    }

    fn bucket_for(&self, path: &str) -> &str {
        &self.resolver.resolve(path).1.bucket
    }

    /// Directory key ending with the delimiter (empty for the root) / 目录key
    fn dir_key(&self, directory: &str) -> String {
        let directory = directory.trim_matches('/');
        if directory.is_empty() {
            return self.path_prefix.clone();
        }
        format!("{}{}/", self.path_prefix, directory)
    }

    /// One directory level, following the continuation marker / 列出一层目录（分页）
    async fn list_level(&self, bucket: &str, prefix: &str, recursive: bool) -> Result<(Vec<Entry>, Vec<String>)> {
        let mut entries = Vec::new();
        let mut sub_prefixes = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let request = ListRequest {
                prefix: prefix.to_string(),
                delimiter: Some(DELIMITER.to_string()),
                marker: marker.take(),
                max_keys: self.config.list_page_size,
            };
            let page = self
                .client
                .list_page(bucket, &request)
                .await
                .map_err(|e| OssError::backend("list", prefix, e))?;

            for object in page.objects {
                if object.size == 0 && object.key == prefix {
                    // 目录占位对象
                    // 先去掉前缀再去掉结尾的 `/`，根目录占位对象得到空路径
                    entries.push(Entry::dir(
                        self.remove_path_prefix(&object.key).trim_end_matches('/').to_string(),
                        object.last_modified,
                    ));
                    continue;
                }
                entries.push(Entry::file(
                    self.remove_path_prefix(&object.key),
                    object.size,
                    object.last_modified,
                ));
            }

            for common in page.prefixes {
                if recursive {
                    sub_prefixes.push(common);
                } else {
                    entries.push(Entry::dir(
                        self.remove_path_prefix(&common).trim_end_matches('/').to_string(),
                        None,
                    ));
                }
            }

            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        Ok((entries, sub_prefixes))
    }

    async fn put(&self, path: &str, contents: Bytes, options: &WriteOptions) -> Result<WrittenFile> {
        let bucket = self.bucket_for(path);
        let key = self.apply_path_prefix(path);
        let size = options.size.unwrap_or(contents.len() as u64);
        let mimetype = options
            .mimetype
            .clone()
            .unwrap_or_else(|| mime_guess::from_path(path).first_or_octet_stream().to_string());

        self.client
            .put_object(bucket, &key, contents, &mimetype)
            .await
            .map_err(|e| OssError::backend("write", path, e))?;

        Ok(WrittenFile {
            path: path.trim_start_matches('/').to_string(),
            mimetype,
            size,
        })
    }
}

#[async_trait]
impl StorageDriver for OssAdapter {
    fn name(&self) -> &str {
        "oss"
    }

    async fn write(&self, path: &str, contents: Bytes, options: &WriteOptions) -> Result<WrittenFile> {
        self.put(path, contents, options).await
    }

    async fn put_file(&self, path: &str, local_file: &Path, options: &WriteOptions) -> Result<WrittenFile> {
        let contents = tokio::fs::read(local_file).await?;
        self.put(path, Bytes::from(contents), options).await
    }

    async fn read(&self, path: &str) -> Result<FileContents> {
        let key = self.apply_path_prefix(path);
        let contents = self
            .client
            .get_object(self.bucket_for(path), &key)
            .await
            .map_err(|e| OssError::backend("read", path, e))?;

        Ok(FileContents {
            path: path.trim_start_matches('/').to_string(),
            contents,
        })
    }

    async fn has(&self, path: &str) -> Result<bool> {
        let key = self.apply_path_prefix(path);
        let head = self
            .client
            .head_object(self.bucket_for(path), &key)
            .await
            .map_err(|e| OssError::backend("has", path, e))?;
        Ok(head.is_some())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let key = self.apply_path_prefix(path);
        self.client
            .delete_object(self.bucket_for(path), &key)
            .await
            .map_err(|e| OssError::backend("delete", path, e))
    }

    async fn delete_dir(&self, dirname: &str) -> Result<Vec<DeleteOutcome>> {
        let entries = self.list_contents(dirname, true).await?;
        let keys: Vec<String> = entries
            .iter()
            .map(|entry| {
                if entry.is_dir() {
                    self.dir_key(&entry.path)
                } else {
                    self.apply_path_prefix(&entry.path)
                }
            })
            .filter(|key| !key.is_empty())
            .collect();

        if keys.is_empty() {
            tracing::debug!("delete_dir: '{}' is empty", dirname);
            return Ok(Vec::new());
        }

        let outcomes = self
            .client
            .delete_objects(self.bucket_for(dirname), &keys)
            .await
            .map_err(|e| OssError::backend("delete_dir", dirname, e))?;

        let failed = outcomes.iter().filter(|o| !o.deleted).count();
        if failed > 0 {
            tracing::warn!(
                "delete_dir '{}': {} of {} objects not deleted",
                dirname,
                failed,
                outcomes.len()
            );
        }
        Ok(outcomes)
    }

    async fn create_dir(&self, dirname: &str, options: &WriteOptions) -> Result<Entry> {
        let key = self.dir_key(dirname);
        let mimetype = options
            .mimetype
            .as_deref()
            .unwrap_or("application/octet-stream");

        self.client
            .put_object(self.bucket_for(dirname), &key, Bytes::new(), mimetype)
            .await
            .map_err(|e| OssError::backend("create_dir", dirname, e))?;

        Ok(Entry::dir(dirname.trim_matches('/').to_string(), None))
    }

    async fn copy(&self, path: &str, new_path: &str) -> Result<()> {
        let from_bucket = self.bucket_for(path);
        let to_bucket = self.bucket_for(new_path);
        if from_bucket != to_bucket {
            return Err(OssError::CrossBucket {
                from: format!("{}:{}", from_bucket, path),
                to: format!("{}:{}", to_bucket, new_path),
            });
        }

        let from = self.apply_path_prefix(path);
        let to = self.apply_path_prefix(new_path);
        self.client
            .copy_object(from_bucket, &from, &to)
            .await
            .map_err(|e| OssError::backend("copy", path, e))
    }

    async fn rename(&self, path: &str, new_path: &str) -> Result<()> {
        self.copy(path, new_path).await?;
        // 复制成功后删除失败会留下两份对象
        if let Err(e) = self.delete(path).await {
            tracing::warn!("rename '{}' -> '{}': copied but source not deleted", path, new_path);
            return Err(e);
        }
        Ok(())
    }

    async fn list_contents(&self, directory: &str, recursive: bool) -> Result<Vec<Entry>> {
        let bucket = self.bucket_for(directory);
        let mut result = Vec::new();
        // 先序深度优先：每个子目录单独发起一次列表请求
        let mut pending = vec![self.dir_key(directory)];

        while let Some(prefix) = pending.pop() {
            let (entries, sub_prefixes) = self.list_level(bucket, &prefix, recursive).await?;
            result.extend(entries);
            pending.extend(sub_prefixes.into_iter().rev());
        }

        Ok(result)
    }

    async fn get_metadata(&self, path: &str) -> Result<ObjectMetadata> {
        let key = self.apply_path_prefix(path);
        let head = self
            .client
            .head_object(self.bucket_for(path), &key)
            .await
            .map_err(|e| OssError::backend("get_metadata", path, e))?
            .ok_or_else(|| OssError::NotFound(path.to_string()))?;

        let path = path.trim_start_matches('/');
        Ok(ObjectMetadata {
            kind: EntryKind::File,
            dirname: dirname(path),
            path: path.to_string(),
            timestamp: head.last_modified,
            mimetype: head
                .content_type
                .unwrap_or_else(|| mime_guess::from_path(path).first_or_octet_stream().to_string()),
            size: head.content_length,
        })
    }
}

#[async_trait]
impl OssExtensions for OssAdapter {
    fn select_bucket(&self, access: AccessClass) -> BucketTarget {
        self.resolver.target(access).clone()
    }

    fn direct_upload_signature(&self, dir: &str, ttl_secs: u64) -> Result<UploadPolicy> {
        if ttl_secs == 0 {
            return Err(OssError::InvalidArgument("ttl must be positive".to_string()));
        }
        let dir = dir.trim_matches('/');
        if dir.is_empty() {
            return Err(OssError::InvalidArgument("upload dir must not be empty".to_string()));
        }

        let logical = format!("{}/", dir);
        let target = self.resolver.resolve(&logical).1;
        let host = self.resolver.upload_host(target);
        self.signer
            .build_upload_policy(&host, &self.apply_path_prefix(&logical), ttl_secs)
    }

    async fn file_url(&self, path: &str, ttl_secs: u32) -> Result<String> {
        let (class, target) = self.resolver.resolve(path);
        let key = self.apply_path_prefix(path);

        match class {
            AccessClass::Public => Ok(format!("{}/{}", target.host.trim_end_matches('/'), key)),
            AccessClass::Private => {
                if ttl_secs == 0 {
                    return Err(OssError::InvalidArgument("ttl must be positive".to_string()));
                }
                self.signer
                    .build_signed_url(
                        self.client.as_ref(),
                        &target.bucket,
                        &key,
                        ttl_secs,
                        SignMethod::Get,
                        &UrlRewrite::default(),
                    )
                    .await
            }
        }
    }

    async fn signed_download_url(
        &self,
        path: &str,
        expires: u32,
        host_name: &str,
        use_ssl: bool,
    ) -> Result<String> {
        if expires == 0 {
            return Err(OssError::InvalidArgument("expires must be positive".to_string()));
        }
        let bucket = self.bucket_for(path);
        let host_name = host_name.trim();
        let rewrite = UrlRewrite {
            host: (!host_name.is_empty()).then(|| format!("{}.{}", bucket, host_name)),
            force_https: use_ssl,
        };

        self.signer
            .build_signed_url(
                self.client.as_ref(),
                bucket,
                &self.apply_path_prefix(path),
                expires,
                SignMethod::Get,
                &rewrite,
            )
            .await
    }

    async fn put_uploaded_file(
        &self,
        upload: Option<&IncomingFile>,
        oss_dir: &str,
        local_dir: &Path,
    ) -> std::result::Result<String, UploadRejection> {
        let local_file = prepare_upload(upload, local_dir, &self.config.upload).await?;
        let file_name = local_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let oss_dir = oss_dir.trim_matches('/');
        let logical = if oss_dir.is_empty() {
            file_name
        } else {
            format!("{}/{}", oss_dir, file_name)
        };
        let (class, target) = self.resolver.resolve(&logical);
        let key = self.apply_path_prefix(&logical);
        let content_type = upload
            .map(|f| f.content_type.clone())
            .unwrap_or_else(|| mime_guess::from_path(&logical).first_or_octet_stream().to_string());

        let result = match tokio::fs::read(&local_file).await {
            Ok(data) => {
                let data = Bytes::from(data);
                match class {
                    AccessClass::Public => self
                        .client
                        .put_object(&target.bucket, &key, data, &content_type)
                        .await
                        .map_err(|e| OssError::backend("put_uploaded_file", &logical, e)),
                    AccessClass::Private => {
                        let signed = self
                            .signer
                            .build_signed_url(
                                self.client.as_ref(),
                                &target.bucket,
                                &key,
                                self.config.upload.private_put_ttl,
                                SignMethod::Put,
                                &UrlRewrite::default(),
                            )
                            .await;
                        match signed {
                            Ok(url) => self
                                .client
                                .upload_to_signed_url(&url, data)
                                .await
                                .map_err(|e| OssError::backend("put_uploaded_file", &logical, e)),
                            Err(e) => Err(e),
                        }
                    }
                }
            }
            Err(e) => Err(OssError::Io(e)),
        };

        if let Err(e) = tokio::fs::remove_file(&local_file).await {
            tracing::warn!("Failed to remove staged upload {:?}: {}", local_file, e);
        }

        result.map_err(|e| UploadRejection::new(RejectionKind::BackendWriteFailed, e.to_string()))?;
        tracing::info!("Uploaded {} to bucket {}", key, target.bucket);
        Ok(format!("{}/{}", target.host.trim_end_matches('/'), key))
    }

    async fn verify_bucket_acl(&self, access: AccessClass) -> Result<bool> {
        let target = self.resolver.target(access);
        let acl = self
            .client
            .bucket_acl(&target.bucket)
            .await
            .map_err(|e| OssError::backend("bucket_acl", &target.bucket, e))?;

        let matches = match access {
            AccessClass::Public => matches!(acl, BucketAcl::PublicRead | BucketAcl::PublicReadWrite),
            AccessClass::Private => acl == BucketAcl::Private,
        };
        if !matches {
            tracing::warn!(
                "Bucket {} ACL is {:?}, expected {:?} access",
                target.bucket,
                acl,
                access
            );
        }
        Ok(matches)
    }
}
