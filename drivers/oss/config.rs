//! OSS驱动配置 / OSS driver configuration

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::policy::{AccessClass, BucketTarget, Environment};

/// OSS配置，进程启动时加载一次，之后只读
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OssConfig {
    /// AccessKey ID
    #[serde(default)]
    pub access_id: String,
    /// AccessKey Secret
    #[serde(default)]
    pub access_key: String,
    /// 端点地址，如 oss-cn-hangzhou.aliyuncs.com
    #[serde(default)]
    pub endpoint: String,
    /// 区域
    #[serde(default = "default_region")]
    pub region: String,
    /// 部署环境：local 或 production
    #[serde(default = "default_env")]
    pub env: String,
    /// 存储桶内的根目录前缀
    #[serde(default)]
    pub prefix: String,
    /// 使用 https 访问端点
    #[serde(default)]
    pub use_ssl: bool,
    /// 强制路径风格（MinIO等需要）
    #[serde(default)]
    pub force_path_style: bool,
    /// 环境 -> 访问级别 -> 存储桶
    #[serde(default)]
    pub buckets: HashMap<String, HashMap<AccessClass, BucketTarget>>,
    /// 公共读目录（路径第一段）
    #[serde(default)]
    pub public_prefixes: Vec<String>,
    /// 私有目录（路径第一段）
    #[serde(default)]
    pub private_prefixes: Vec<String>,
    /// 两个列表都未命中时的访问级别
    #[serde(default = "default_unmatched")]
    pub unmatched_access: AccessClass,
    /// 直传policy允许的最大文件大小（字节）
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: u64,
    /// 列目录每页数量
    #[serde(default = "default_page_size")]
    pub list_page_size: usize,
    /// 上传回调
    #[serde(default)]
    pub callback: CallbackConfig,
    /// 服务端中转上传
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Upload callback target / 上传回调配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub host: String,
    /// 回调内容模板，占位符由OSS服务端替换
    #[serde(default = "default_callback_body")]
    pub body: String,
    #[serde(default = "default_callback_body_type")]
    pub body_type: String,
}

/// Server-side relay upload rules / 服务端上传校验规则
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 表单文件字段名
    #[serde(default = "default_field_name")]
    pub field_name: String,
    /// 允许的MIME类型
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
    /// 最大文件大小（字节）
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// 私有桶上传签名URL有效期（秒）
    #[serde(default = "default_private_put_ttl")]
    pub private_put_ttl: u32,
    /// 私有文件读取URL有效期（秒）
    #[serde(default = "default_read_url_ttl")]
    pub read_url_ttl: u32,
}

fn default_region() -> String {
    "oss-cn-hangzhou".to_string()
}

fn default_env() -> String {
    "production".to_string()
}

fn default_unmatched() -> AccessClass {
    AccessClass::Public
}

fn default_max_upload() -> u64 {
    1_048_576_000
}

fn default_page_size() -> usize {
    1000
}

fn default_callback_body() -> String {
    "filename=${object}&size=${size}&mimeType=${mimeType}&height=${imageInfo.height}&width=${imageInfo.width}"
        .to_string()
}

fn default_callback_body_type() -> String {
    "application/x-www-form-urlencoded".to_string()
}

fn default_field_name() -> String {
    "photo".to_string()
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
    ]
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_private_put_ttl() -> u32 {
    3600
}

fn default_read_url_ttl() -> u32 {
    20
}

impl OssConfig {
    /// Active deployment environment / 当前部署环境
    pub fn environment(&self) -> Environment {
        Environment::from_name(&self.env)
    }

    /// Endpoint scheme / 端点协议
    pub fn scheme(&self) -> &'static str {
        if self.use_ssl {
            "https"
        } else {
            "http"
        }
    }
}

impl Default for OssConfig {
    fn default() -> Self {
        Self {
            access_id: String::new(),
            access_key: String::new(),
            endpoint: String::new(),
            region: default_region(),
            env: default_env(),
            prefix: String::new(),
            use_ssl: false,
            force_path_style: false,
            buckets: HashMap::new(),
            public_prefixes: Vec::new(),
            private_prefixes: Vec::new(),
            unmatched_access: default_unmatched(),
            max_upload_bytes: default_max_upload(),
            list_page_size: default_page_size(),
            callback: CallbackConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            host: String::new(),
            body: default_callback_body(),
            body_type: default_callback_body_type(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            field_name: default_field_name(),
            allowed_types: default_allowed_types(),
            max_file_size: default_max_file_size(),
            private_put_ttl: default_private_put_ttl(),
            read_url_ttl: default_read_url_ttl(),
        }
    }
}
