//! 签名请求构造
//!
//! - 浏览器直传用的 POST policy：base64(policy JSON) + base64(HMAC-SHA1)
//! - 预签名URL：签名计算交给存储客户端，这里只负责可选的域名/协议改写

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::{json, Value};
use sha1::Sha1;
use url::Url;

use super::client::{SignMethod, StorageClient};
use super::config::{CallbackConfig, OssConfig};
use crate::error::{OssError, Result};

type HmacSha1 = Hmac<Sha1>;

/// policy过期时间格式，严格UTC，无小数秒
const EXPIRATION_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Direct-upload authorization handed to the browser / 直传凭证
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadPolicy {
    #[serde(rename = "accessid")]
    pub access_id: String,
    pub host: String,
    #[serde(rename = "policy")]
    pub policy_document: String,
    pub signature: String,
    /// epoch seconds
    #[serde(rename = "expire")]
    pub expires_at: i64,
    pub callback: String,
    /// 允许上传的key前缀
    #[serde(rename = "dir")]
    pub allowed_prefix: String,
}

#[derive(Serialize)]
struct PolicyDocument {
    expiration: String,
    conditions: Vec<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CallbackDescriptor<'a> {
    callback_url: &'a str,
    callback_host: &'a str,
    callback_body: &'a str,
    callback_body_type: &'a str,
}

/// Scheme/host override applied to a signed URL / 签名URL改写
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlRewrite {
    /// Replacement host (port is kept)
    pub host: Option<String>,
    pub force_https: bool,
}

impl UrlRewrite {
    pub fn is_noop(&self) -> bool {
        self.host.is_none() && !self.force_https
    }
}

/// 签名请求构造器
#[derive(Debug, Clone)]
pub struct SignedRequestBuilder {
    access_id: String,
    access_key: String,
    max_upload_bytes: u64,
    callback: CallbackConfig,
}

impl SignedRequestBuilder {
    pub fn new(config: &OssConfig) -> Self {
        Self {
            access_id: config.access_id.clone(),
            access_key: config.access_key.clone(),
            max_upload_bytes: config.max_upload_bytes,
            callback: config.callback.clone(),
        }
    }

    /// base64(HMAC-SHA1(access_key, string_to_sign))
    pub fn sign(&self, string_to_sign: &str) -> String {
        let mut mac = HmacSha1::new_from_slice(self.access_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(string_to_sign.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }

    /// Build a POST policy valid for `ttl_secs` from now / 生成直传policy
    ///
    /// The caller validates `ttl_secs > 0` and a non-empty prefix.
    pub fn build_upload_policy(&self, host: &str, allowed_prefix: &str, ttl_secs: u64) -> Result<UploadPolicy> {
        self.build_upload_policy_at(Utc::now(), host, allowed_prefix, ttl_secs)
    }

    pub fn build_upload_policy_at(
        &self,
        now: DateTime<Utc>,
        host: &str,
        allowed_prefix: &str,
        ttl_secs: u64,
    ) -> Result<UploadPolicy> {
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| OssError::InvalidArgument(format!("ttl out of range: {}", ttl_secs)))?;
        let end = now + ttl;

        let document = PolicyDocument {
            expiration: end.format(EXPIRATION_FORMAT).to_string(),
            conditions: vec![
                json!(["content-length-range", 0, self.max_upload_bytes]),
                // 限制上传key必须以指定前缀开头，防止写入其他目录
                json!(["starts-with", "$key", allowed_prefix]),
            ],
        };
        let policy_document = BASE64.encode(serde_json::to_string(&document)?);
        let signature = self.sign(&policy_document);

        let callback = CallbackDescriptor {
            callback_url: &self.callback.url,
            callback_host: &self.callback.host,
            callback_body: &self.callback.body,
            callback_body_type: &self.callback.body_type,
        };
        let callback = BASE64.encode(serde_json::to_string(&callback)?);

        tracing::debug!(
            "Upload policy issued: host={}, dir={}, expiration={}",
            host,
            allowed_prefix,
            document.expiration
        );

        Ok(UploadPolicy {
            access_id: self.access_id.clone(),
            host: host.to_string(),
            policy_document,
            signature,
            expires_at: end.timestamp(),
            callback,
            allowed_prefix: allowed_prefix.to_string(),
        })
    }

    /// Presign through the client, then apply the optional rewrite / 生成预签名URL
    pub async fn build_signed_url(
        &self,
        client: &dyn StorageClient,
        bucket: &str,
        key: &str,
        ttl_secs: u32,
        method: SignMethod,
        rewrite: &UrlRewrite,
    ) -> Result<String> {
        let url = client
            .sign_url(bucket, key, ttl_secs, method)
            .await
            .map_err(|e| OssError::backend("sign_url", key, e))?;
        rewrite_url(&url, rewrite)
    }
}

/// Swap scheme and/or host of `url`, copying everything else byte-for-byte / 改写协议和域名
///
/// The query carries the signature, so it must not be re-encoded or reordered.
pub fn rewrite_url(url: &str, rewrite: &UrlRewrite) -> Result<String> {
    if rewrite.is_noop() {
        return Ok(url.to_string());
    }
    Url::parse(url).map_err(|e| OssError::InvalidUrl(format!("{}: {}", url, e)))?;

    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| OssError::InvalidUrl(format!("{}: missing authority", url)))?;
    let authority_end = rest
        .find(|c: char| c == '/' || c == '?' || c == '#')
        .unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);

    let (userinfo, host_port) = match authority.rfind('@') {
        Some(pos) => authority.split_at(pos + 1),
        None => ("", authority),
    };
    let port_start = if host_port.starts_with('[') {
        host_port.find("]:").map(|pos| pos + 1)
    } else {
        host_port.rfind(':')
    };
    let (host, port) = match port_start {
        Some(pos) => host_port.split_at(pos),
        None => (host_port, ""),
    };

    let scheme = if rewrite.force_https { "https" } else { scheme };
    let host = rewrite.host.as_deref().unwrap_or(host);

    Ok(format!("{}://{}{}{}{}", scheme, userinfo, host, port, tail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn builder() -> SignedRequestBuilder {
        let config = OssConfig {
            access_id: "test-id".to_string(),
            access_key: "test-secret".to_string(),
            callback: CallbackConfig {
                url: "http://api.example.com/oss/callback".to_string(),
                host: "api.example.com".to_string(),
                ..CallbackConfig::default()
            },
            ..OssConfig::default()
        };
        SignedRequestBuilder::new(&config)
    }

    fn decode(b64: &str) -> Value {
        let raw = BASE64.decode(b64).unwrap();
        serde_json::from_slice(&raw).unwrap()
    }

    #[test]
    fn test_policy_expiration_format() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + Duration::milliseconds(750);
        let policy = builder()
            .build_upload_policy_at(now, "http://b.oss.example.com", "health_record/", 30)
            .unwrap();

        let document = decode(&policy.policy_document);
        assert_eq!(document["expiration"], "2024-01-01T00:00:30Z");
        assert_eq!(policy.expires_at, 1704067200 + 30);
    }

    #[test]
    fn test_policy_document_shape() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let policy = builder()
            .build_upload_policy_at(now, "http://b.oss.example.com", "avatars/", 60)
            .unwrap();

        let document = decode(&policy.policy_document);
        let keys: Vec<&String> = document.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 2);
        assert!(document.get("expiration").is_some());

        let conditions = document["conditions"].as_array().unwrap();
        assert!(conditions.contains(&json!(["starts-with", "$key", "avatars/"])));
        assert!(conditions.contains(&json!(["content-length-range", 0, 1048576000u64])));
        assert_eq!(policy.allowed_prefix, "avatars/");
        assert_eq!(policy.access_id, "test-id");
        assert_eq!(policy.host, "http://b.oss.example.com");
    }

    #[test]
    fn test_policy_signature_regression_vector() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let policy = builder()
            .build_upload_policy_at(now, "http://b.oss.example.com", "health_record/", 30)
            .unwrap();

        assert_eq!(
            policy.policy_document,
            "eyJleHBpcmF0aW9uIjoiMjAyNC0wMS0wMVQwMDowMDozMFoiLCJjb25kaXRpb25zIjpbWyJjb250ZW50LWxlbmd0aC1yYW5nZSIsMCwxMDQ4NTc2MDAwXSxbInN0YXJ0cy13aXRoIiwiJGtleSIsImhlYWx0aF9yZWNvcmQvIl1dfQ=="
        );
        assert_eq!(policy.signature, "uCRu5et0TXjB4zLEzHfUHgSQp7o=");
    }

    #[test]
    fn test_hmac_sha1_known_vector() {
        let config = OssConfig {
            access_key: "key".to_string(),
            ..OssConfig::default()
        };
        let builder = SignedRequestBuilder::new(&config);
        assert_eq!(
            builder.sign("The quick brown fox jumps over the lazy dog"),
            "3nybhbi3iqa8ino29wqQcBydtNk="
        );
    }

    #[test]
    fn test_callback_placeholders_are_not_resolved() {
        let policy = builder()
            .build_upload_policy("http://b.oss.example.com", "avatars/", 30)
            .unwrap();
        let callback = decode(&policy.callback);

        assert_eq!(callback["callbackUrl"], "http://api.example.com/oss/callback");
        assert_eq!(callback["callbackHost"], "api.example.com");
        assert_eq!(callback["callbackBodyType"], "application/x-www-form-urlencoded");
        let body = callback["callbackBody"].as_str().unwrap();
        for token in ["${object}", "${size}", "${mimeType}", "${imageInfo.height}", "${imageInfo.width}"] {
            assert!(body.contains(token), "missing {}", token);
        }
    }

    #[test]
    fn test_policy_serializes_wire_names() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let policy = builder()
            .build_upload_policy_at(now, "http://b.oss.example.com", "avatars/", 30)
            .unwrap();
        let value = serde_json::to_value(&policy).unwrap();
        for key in ["accessid", "host", "policy", "signature", "expire", "callback", "dir"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
    }

    const SIGNED: &str = "http://pri-prod.oss-cn-hangzhou.aliyuncs.com/health_record/a%20b.pdf?OSSAccessKeyId=test-id&Expires=1704067220&Signature=x%2By%2Fz%3D";

    #[test]
    fn test_rewrite_preserves_query_bytes() {
        let rewrite = UrlRewrite {
            host: Some("pri-prod.cdn.example.com".to_string()),
            force_https: true,
        };
        let url = rewrite_url(SIGNED, &rewrite).unwrap();
        assert_eq!(
            url,
            "https://pri-prod.cdn.example.com/health_record/a%20b.pdf?OSSAccessKeyId=test-id&Expires=1704067220&Signature=x%2By%2Fz%3D"
        );

        let before = Url::parse(SIGNED).unwrap();
        let after = Url::parse(&url).unwrap();
        assert_eq!(before.query(), after.query());
        assert_eq!(before.path(), after.path());
        let pairs_before: Vec<_> = before.query_pairs().collect();
        let pairs_after: Vec<_> = after.query_pairs().collect();
        assert_eq!(pairs_before, pairs_after);
    }

    #[test]
    fn test_rewrite_keeps_userinfo_and_port() {
        let rewrite = UrlRewrite {
            host: Some("cdn.example.com".to_string()),
            force_https: false,
        };
        let url = rewrite_url("http://user:pw@127.0.0.1:9000/bucket/key?X-Amz-Signature=abc", &rewrite).unwrap();
        assert_eq!(url, "http://user:pw@cdn.example.com:9000/bucket/key?X-Amz-Signature=abc");
    }

    #[test]
    fn test_rewrite_only_scheme() {
        let rewrite = UrlRewrite {
            host: None,
            force_https: true,
        };
        assert_eq!(
            rewrite_url("http://b.example.com/k?Signature=a%2Bb", &rewrite).unwrap(),
            "https://b.example.com/k?Signature=a%2Bb"
        );
        assert_eq!(rewrite_url(SIGNED, &UrlRewrite::default()).unwrap(), SIGNED);
    }

    #[test]
    fn test_rewrite_rejects_invalid_url() {
        let rewrite = UrlRewrite {
            host: None,
            force_https: true,
        };
        assert!(matches!(rewrite_url("not a url", &rewrite), Err(OssError::InvalidUrl(_))));
    }
}
