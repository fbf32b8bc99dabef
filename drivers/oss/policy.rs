//! 路径访问级别与存储桶路由
//!
//! 逻辑路径的第一段决定访问级别（公共读/私有），访问级别 + 部署环境决定物理存储桶和访问域名。
//! 纯函数，不做任何网络请求。

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::config::OssConfig;
use crate::error::{OssError, Result};
use crate::utils::{first_segment, strip_scheme};

/// Visibility tier of a logical path / 访问级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessClass {
    Public,
    Private,
}

/// Deployment environment selecting the bucket table / 部署环境
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    /// `local` selects the test buckets, anything else is production
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("local") {
            Environment::Local
        } else {
            Environment::Production
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

/// Physical bucket and the host serving it / 物理存储桶及其访问域名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketTarget {
    pub bucket: String,
    /// 访问域名，如 http://img.example.com
    pub host: String,
}

/// 路径策略解析器
#[derive(Debug, Clone)]
pub struct PathPolicyResolver {
    environment: Environment,
    public_prefixes: HashSet<String>,
    private_prefixes: HashSet<String>,
    unmatched: AccessClass,
    public: BucketTarget,
    private: BucketTarget,
    endpoint: String,
    scheme: &'static str,
}

impl PathPolicyResolver {
    /// Validate the bucket table for the active environment / 校验当前环境的存储桶配置
    pub fn new(config: &OssConfig) -> Result<Self> {
        let environment = config.environment();
        let table = config.buckets.get(environment.as_str()).ok_or_else(|| {
            OssError::Config(format!(
                "no bucket table for environment '{}'",
                environment.as_str()
            ))
        })?;

        let lookup = |class: AccessClass| -> Result<BucketTarget> {
            let target = table.get(&class).cloned().ok_or_else(|| {
                OssError::Config(format!(
                    "missing {:?} bucket for environment '{}'",
                    class,
                    environment.as_str()
                ))
            })?;
            if target.bucket.trim().is_empty() {
                return Err(OssError::Config(format!(
                    "empty {:?} bucket name for environment '{}'",
                    class,
                    environment.as_str()
                )));
            }
            Ok(target)
        };

        let public = lookup(AccessClass::Public)?;
        let private = lookup(AccessClass::Private)?;

        let normalize = |list: &[String]| -> HashSet<String> {
            list.iter()
                .map(|p| p.trim_matches('/').to_string())
                .filter(|p| !p.is_empty())
                .collect()
        };
        let public_prefixes = normalize(&config.public_prefixes);
        let private_prefixes = normalize(&config.private_prefixes);

        for both in public_prefixes.intersection(&private_prefixes) {
            tracing::warn!("Prefix '{}' is listed as public and private, resolving as public", both);
        }

        Ok(Self {
            environment,
            public_prefixes,
            private_prefixes,
            unmatched: config.unmatched_access,
            public,
            private,
            endpoint: strip_scheme(&config.endpoint).to_string(),
            scheme: config.scheme(),
        })
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Access class of a logical path / 路径的访问级别
    pub fn classify(&self, path: &str) -> AccessClass {
        let segment = first_segment(path);
        if self.public_prefixes.contains(segment) {
            AccessClass::Public
        } else if self.private_prefixes.contains(segment) {
            AccessClass::Private
        } else {
            self.unmatched
        }
    }

    /// Bucket configured for an access class / 访问级别对应的存储桶
    pub fn target(&self, class: AccessClass) -> &BucketTarget {
        match class {
            AccessClass::Public => &self.public,
            AccessClass::Private => &self.private,
        }
    }

    pub fn resolve(&self, path: &str) -> (AccessClass, &BucketTarget) {
        let class = self.classify(path);
        (class, self.target(class))
    }

    /// Endpoint host used for direct uploads: `scheme://bucket.endpoint` / 直传地址
    pub fn upload_host(&self, target: &BucketTarget) -> String {
        format!("{}://{}.{}", self.scheme, target.bucket, self.endpoint)
    }
}
