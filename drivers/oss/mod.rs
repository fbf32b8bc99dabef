//! 阿里云OSS驱动
//!
//! 按路径第一段区分公共读/私有存储桶，提供直传签名、签名URL和服务端中转上传。

pub mod client;
pub mod config;
pub mod driver;
pub mod factory;
pub mod policy;
pub mod signer;
pub mod upload;

#[cfg(test)]
pub mod memory;

pub use client::{BucketAcl, S3Client, SignMethod, StorageClient};
pub use config::{CallbackConfig, OssConfig, UploadConfig};
pub use driver::{OssAdapter, OssExtensions};
pub use factory::OssDriverFactory;
pub use policy::{AccessClass, BucketTarget, Environment, PathPolicyResolver};
pub use signer::{SignedRequestBuilder, UploadPolicy, UrlRewrite};
pub use upload::{IncomingFile, RejectionKind, UploadRejection};
