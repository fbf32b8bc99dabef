//! OSS驱动工厂

use std::sync::Arc;

use anyhow::Result;

use super::client::S3Client;
use super::config::OssConfig;
use super::driver::OssAdapter;

/// Builds an `OssAdapter` backed by the rust-s3 client / OSS驱动工厂
pub struct OssDriverFactory;

impl OssDriverFactory {
    /// 从JSON配置创建驱动
    pub fn create_driver(&self, config: serde_json::Value) -> Result<OssAdapter> {
        let config: OssConfig = serde_json::from_value(config)?;
        self.create_from_config(config)
    }

    pub fn create_from_config(&self, config: OssConfig) -> Result<OssAdapter> {
        let client = S3Client::new(&config)?;
        Ok(OssAdapter::new(config, Arc::new(client))?)
    }
}
