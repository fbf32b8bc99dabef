//! 存储客户端边界
//!
//! `StorageClient` 只提供按 (bucket, key) 寻址的原语，错误原样返回给上层转换。
//! `S3Client` 基于 rust-s3 实现（阿里云OSS兼容S3协议）。

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::Region;

use super::config::OssConfig;
use crate::storage::DeleteOutcome;
use crate::utils::parse_timestamp;

/// HTTP method a signed URL authorizes / 签名URL的请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignMethod {
    Get,
    Put,
}

/// HEAD result / 对象头信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    pub content_length: u64,
    pub content_type: Option<String>,
    /// epoch seconds
    pub last_modified: Option<i64>,
}

/// One page of a delimiter listing request / 列表请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub prefix: String,
    pub delimiter: Option<String>,
    /// Continuation marker from the previous page
    pub marker: Option<String>,
    pub max_keys: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<i64>,
}

/// 列表结果的一页
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<ObjectSummary>,
    /// Common prefixes (sub-directories), each ending with the delimiter
    pub prefixes: Vec<String>,
    /// Set when more pages follow
    pub next_marker: Option<String>,
}

/// Canned bucket ACL / 存储桶读写权限
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketAcl {
    Private,
    PublicRead,
    PublicReadWrite,
    Unknown(String),
}

impl BucketAcl {
    /// Parse a GetBucketAcl XML body (OSS `<Grant>` or S3 grantee list) / 解析ACL响应
    pub fn parse(xml: &str) -> Self {
        if let Some(start) = xml.find("<Grant>") {
            if let Some(end) = xml[start..].find("</Grant>") {
                let grant = xml[start + 7..start + end].trim();
                // OSS格式: <Grant>public-read</Grant>；S3格式的Grant内含Grantee子元素
                if !grant.contains('<') {
                    return match grant {
                        "private" => BucketAcl::Private,
                        "public-read" => BucketAcl::PublicRead,
                        "public-read-write" => BucketAcl::PublicReadWrite,
                        other => BucketAcl::Unknown(other.to_string()),
                    };
                }
            }
        }

        const ALL_USERS: &str = "http://acs.amazonaws.com/groups/global/AllUsers";
        let mut read = false;
        let mut write = false;
        for grant in xml.split("<Grant>").skip(1) {
            if !grant.contains(ALL_USERS) {
                continue;
            }
            if grant.contains("<Permission>READ</Permission>")
                || grant.contains("<Permission>FULL_CONTROL</Permission>")
            {
                read = true;
            }
            if grant.contains("<Permission>WRITE</Permission>")
                || grant.contains("<Permission>FULL_CONTROL</Permission>")
            {
                write = true;
            }
        }
        match (read, write) {
            (true, true) => BucketAcl::PublicReadWrite,
            (true, false) => BucketAcl::PublicRead,
            _ if xml.contains("AccessControlPolicy") => BucketAcl::Private,
            _ => BucketAcl::Unknown(String::new()),
        }
    }
}

/// Storage client primitives / 存储客户端原语
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, bucket: &str, key: &str, content: Bytes, content_type: &str) -> Result<()>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes>;

    /// `None` when the object does not exist
    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectHead>>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Delete many keys in one call, reporting each key separately / 批量删除
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<Vec<DeleteOutcome>>;

    /// Server-side copy inside one bucket / 服务端复制
    async fn copy_object(&self, bucket: &str, from: &str, to: &str) -> Result<()>;

    async fn list_page(&self, bucket: &str, request: &ListRequest) -> Result<ListPage>;

    /// Presigned URL for `method`, valid for `ttl_secs` / 生成预签名URL
    async fn sign_url(&self, bucket: &str, key: &str, ttl_secs: u32, method: SignMethod) -> Result<String>;

    /// Send a body to a presigned PUT URL / 通过预签名URL上传
    async fn upload_to_signed_url(&self, url: &str, content: Bytes) -> Result<()>;

    async fn bucket_acl(&self, bucket: &str) -> Result<BucketAcl>;
}

fn ensure_success(op: &str, key: &str, code: u16) -> Result<()> {
    if (200..300).contains(&code) {
        Ok(())
    } else {
        Err(anyhow!("OSS {}失败: key={}, status={}", op, key, code))
    }
}

/// rust-s3 backed client / 基于rust-s3的客户端
pub struct S3Client {
    region: Region,
    credentials: Credentials,
    path_style: bool,
    http: reqwest::Client,
}

impl S3Client {
    pub fn new(config: &OssConfig) -> Result<Self> {
        let credentials = Credentials::new(
            Some(&config.access_id),
            Some(&config.access_key),
            None,
            None,
            None,
        )
        .map_err(|e| anyhow!("创建OSS凭证失败: {}", e))?;

        let endpoint = if config.endpoint.contains("://") {
            config.endpoint.trim_end_matches('/').to_string()
        } else {
            format!("{}://{}", config.scheme(), config.endpoint.trim_end_matches('/'))
        };
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint,
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            region,
            credentials,
            path_style: config.force_path_style,
            http,
        })
    }

    fn bucket(&self, name: &str) -> Result<Box<Bucket>> {
        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(|e| anyhow!("创建OSS Bucket失败: {}", e))?;
        Ok(if self.path_style {
            bucket.with_path_style()
        } else {
            bucket
        })
    }
}

#[async_trait]
impl StorageClient for S3Client {
    async fn put_object(&self, bucket: &str, key: &str, content: Bytes, content_type: &str) -> Result<()> {
        tracing::debug!("OSS PutObject: bucket={}, key={}, size={}", bucket, key, content.len());
        let response = self
            .bucket(bucket)?
            .put_object_with_content_type(key, &content, content_type)
            .await?;
        ensure_success("PutObject", key, response.status_code())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        tracing::debug!("OSS GetObject: bucket={}, key={}", bucket, key);
        let response = self.bucket(bucket)?.get_object(key).await?;
        ensure_success("GetObject", key, response.status_code())?;
        Ok(Bytes::from(response.bytes().to_vec()))
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectHead>> {
        tracing::debug!("OSS HeadObject: bucket={}, key={}", bucket, key);
        let (head, code) = self.bucket(bucket)?.head_object(key).await?;
        if code == 404 {
            return Ok(None);
        }
        ensure_success("HeadObject", key, code)?;

        Ok(Some(ObjectHead {
            content_length: head.content_length.unwrap_or(0).max(0) as u64,
            content_type: head.content_type,
            last_modified: head.last_modified.as_deref().and_then(parse_timestamp),
        }))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        tracing::debug!("OSS DeleteObject: bucket={}, key={}", bucket, key);
        let response = self.bucket(bucket)?.delete_object(key).await?;
        ensure_success("DeleteObject", key, response.status_code())
    }

    /// rust-s3 has no multi-object delete, so this issues one DeleteObject per key
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<Vec<DeleteOutcome>> {
        let handle = self.bucket(bucket)?;
        let mut outcomes = Vec::with_capacity(keys.len());
        for key in keys {
            let result = match handle.delete_object(key).await {
                Ok(response) => ensure_success("DeleteObject", key, response.status_code()),
                Err(e) => Err(e.into()),
            };
            outcomes.push(match result {
                Ok(()) => DeleteOutcome::ok(key),
                Err(e) => DeleteOutcome::failed(key, e.to_string()),
            });
        }
        Ok(outcomes)
    }

    async fn copy_object(&self, bucket: &str, from: &str, to: &str) -> Result<()> {
        // copy_object_internal的from参数需要URL编码（中文等非ASCII字符）
        let encoded_src = urlencoding::encode(from);
        tracing::debug!("OSS CopyObject: bucket={}, src={}, dst={}", bucket, from, to);

        let code = self
            .bucket(bucket)?
            .copy_object_internal(&encoded_src, to)
            .await?;
        ensure_success("CopyObject", to, code)
    }

    async fn list_page(&self, bucket: &str, request: &ListRequest) -> Result<ListPage> {
        tracing::debug!(
            "OSS ListObjects: bucket={}, prefix={}, marker={:?}",
            bucket,
            request.prefix,
            request.marker
        );
        let (result, code) = self
            .bucket(bucket)?
            .list_page(
                request.prefix.clone(),
                request.delimiter.clone(),
                request.marker.clone(),
                None,
                Some(request.max_keys),
            )
            .await?;
        ensure_success("ListObjects", &request.prefix, code)?;

        let next_marker = if result.is_truncated {
            result.next_continuation_token.clone()
        } else {
            None
        };

        Ok(ListPage {
            objects: result
                .contents
                .into_iter()
                .map(|obj| ObjectSummary {
                    last_modified: parse_timestamp(&obj.last_modified),
                    size: obj.size as u64,
                    key: obj.key,
                })
                .collect(),
            prefixes: result
                .common_prefixes
                .unwrap_or_default()
                .into_iter()
                .map(|cp| cp.prefix)
                .collect(),
            next_marker,
        })
    }

    async fn sign_url(&self, bucket: &str, key: &str, ttl_secs: u32, method: SignMethod) -> Result<String> {
        let handle = self.bucket(bucket)?;
        let url = match method {
            SignMethod::Get => handle.presign_get(key, ttl_secs, None).await,
            SignMethod::Put => handle.presign_put(key, ttl_secs, None, None).await,
        }
        .map_err(|e| anyhow!("生成预签名URL失败: {}", e))?;
        Ok(url)
    }

    async fn upload_to_signed_url(&self, url: &str, content: Bytes) -> Result<()> {
        let resp = self
            .http
            .put(url)
            .header("Content-Type", "")
            .body(content)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("签名URL上传失败: {} - {}", status, text));
        }
        Ok(())
    }

    async fn bucket_acl(&self, bucket: &str) -> Result<BucketAcl> {
        let mut queries = HashMap::new();
        queries.insert("acl".to_string(), String::new());
        let url = self
            .bucket(bucket)?
            .presign_get("/", 60, Some(queries))
            .await
            .map_err(|e| anyhow!("生成ACL查询URL失败: {}", e))?;

        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(anyhow!("获取Bucket ACL失败: {} - {}", status, text));
        }
        Ok(BucketAcl::parse(&text))
    }
}
