//! In-memory `StorageClient` for tests / 测试用内存存储客户端
//!
//! 模拟带分隔符的列表和marker分页，记录批量删除调用，可指定删除失败的key。

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;

use super::client::{BucketAcl, ListPage, ListRequest, ObjectHead, ObjectSummary, SignMethod, StorageClient};
use crate::storage::DeleteOutcome;

const SIGNED_HOST_SUFFIX: &str = ".oss.example.com";
/// Fixed timestamp reported for every object (2024-01-01T00:00:00Z)
pub const MEMORY_MTIME: i64 = 1_704_067_200;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Default)]
struct State {
    buckets: HashMap<String, BTreeMap<String, StoredObject>>,
    failing_deletes: HashSet<String>,
    acls: HashMap<String, BucketAcl>,
    batch_deletes: Vec<Vec<String>>,
    list_calls: Vec<String>,
    signed_uploads: Vec<String>,
}

#[derive(Default)]
pub struct MemoryClient {
    state: Mutex<State>,
}

enum Item {
    Object(String),
    Prefix(String),
}

impl Item {
    fn name(&self) -> &str {
        match self {
            Item::Object(key) | Item::Prefix(key) => key,
        }
    }
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bucket: &str, key: &str, data: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.buckets.entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                data: Bytes::copy_from_slice(data),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        let state = self.state.lock().unwrap();
        state.buckets.get(bucket).and_then(|b| b.get(key)).cloned()
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.object(bucket, key).is_some()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .buckets
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn fail_delete(&self, key: &str) {
        self.state.lock().unwrap().failing_deletes.insert(key.to_string());
    }

    pub fn set_acl(&self, bucket: &str, acl: BucketAcl) {
        self.state.lock().unwrap().acls.insert(bucket.to_string(), acl);
    }

    pub fn batch_deletes(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().batch_deletes.clone()
    }

    /// Prefix of every list request, in call order
    pub fn list_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().list_calls.clone()
    }

    pub fn signed_uploads(&self) -> Vec<String> {
        self.state.lock().unwrap().signed_uploads.clone()
    }

    fn remove(state: &mut State, bucket: &str, key: &str) -> Result<()> {
        if state.failing_deletes.contains(key) {
            return Err(anyhow!("AccessDenied: cannot delete {}", key));
        }
        if let Some(objects) = state.buckets.get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }
}

#[async_trait]
impl StorageClient for MemoryClient {
    async fn put_object(&self, bucket: &str, key: &str, content: Bytes, content_type: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.buckets.entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                data: content,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.object(bucket, key)
            .map(|o| o.data)
            .ok_or_else(|| anyhow!("NoSuchKey: {}", key))
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectHead>> {
        Ok(self.object(bucket, key).map(|o| ObjectHead {
            content_length: o.data.len() as u64,
            content_type: Some(o.content_type),
            last_modified: Some(MEMORY_MTIME),
        }))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::remove(&mut state, bucket, key)
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<Vec<DeleteOutcome>> {
        let mut state = self.state.lock().unwrap();
        state.batch_deletes.push(keys.to_vec());
        Ok(keys
            .iter()
            .map(|key| match Self::remove(&mut state, bucket, key) {
                Ok(()) => DeleteOutcome::ok(key),
                Err(e) => DeleteOutcome::failed(key, e.to_string()),
            })
            .collect())
    }

    async fn copy_object(&self, bucket: &str, from: &str, to: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let objects = state.buckets.entry(bucket.to_string()).or_default();
        let source = objects
            .get(from)
            .cloned()
            .ok_or_else(|| anyhow!("NoSuchKey: {}", from))?;
        objects.insert(to.to_string(), source);
        Ok(())
    }

    async fn list_page(&self, bucket: &str, request: &ListRequest) -> Result<ListPage> {
        let mut state = self.state.lock().unwrap();
        state.list_calls.push(request.prefix.clone());

        let objects = state.buckets.get(bucket).cloned().unwrap_or_default();
        let mut items: Vec<Item> = Vec::new();
        for key in objects.keys().filter(|k| k.starts_with(&request.prefix)) {
            let rest = &key[request.prefix.len()..];
            let common = request
                .delimiter
                .as_deref()
                .and_then(|d| rest.find(d).map(|pos| pos + d.len()))
                .map(|end| format!("{}{}", request.prefix, &rest[..end]));
            match common {
                Some(prefix) => {
                    if !matches!(items.last(), Some(Item::Prefix(p)) if *p == prefix) {
                        items.push(Item::Prefix(prefix));
                    }
                }
                None => items.push(Item::Object(key.clone())),
            }
        }

        let remaining: Vec<Item> = items
            .into_iter()
            .filter(|item| match request.marker.as_deref() {
                Some(marker) => item.name() > marker,
                None => true,
            })
            .collect();
        let truncated = remaining.len() > request.max_keys;

        let mut page = ListPage::default();
        for item in remaining.into_iter().take(request.max_keys) {
            if truncated {
                page.next_marker = Some(item.name().to_string());
            }
            match item {
                Item::Object(key) => {
                    let size = objects.get(&key).map(|o| o.data.len() as u64).unwrap_or(0);
                    page.objects.push(ObjectSummary {
                        key,
                        size,
                        last_modified: Some(MEMORY_MTIME),
                    });
                }
                Item::Prefix(prefix) => page.prefixes.push(prefix),
            }
        }
        Ok(page)
    }

    async fn sign_url(&self, bucket: &str, key: &str, ttl_secs: u32, method: SignMethod) -> Result<String> {
        let verb = match method {
            SignMethod::Get => "GET",
            SignMethod::Put => "PUT",
        };
        Ok(format!(
            "http://{}{}/{}?OSSAccessKeyId=test-id&Expires={}&Signature={}%2Bsig%3D",
            bucket, SIGNED_HOST_SUFFIX, key, ttl_secs, verb
        ))
    }

    async fn upload_to_signed_url(&self, url: &str, content: Bytes) -> Result<()> {
        let rest = url
            .strip_prefix("http://")
            .ok_or_else(|| anyhow!("unexpected signed url: {}", url))?;
        let (host, path) = rest
            .split_once('/')
            .ok_or_else(|| anyhow!("unexpected signed url: {}", url))?;
        let bucket = host
            .strip_suffix(SIGNED_HOST_SUFFIX)
            .ok_or_else(|| anyhow!("unexpected signed host: {}", host))?;
        let key = path.split('?').next().unwrap_or(path);

        {
            let mut state = self.state.lock().unwrap();
            state.signed_uploads.push(url.to_string());
            state.buckets.entry(bucket.to_string()).or_default().insert(
                key.to_string(),
                StoredObject {
                    data: content,
                    content_type: String::new(),
                },
            );
        }
        Ok(())
    }

    async fn bucket_acl(&self, bucket: &str) -> Result<BucketAcl> {
        let state = self.state.lock().unwrap();
        state
            .acls
            .get(bucket)
            .cloned()
            .ok_or_else(|| anyhow!("NoSuchBucket: {}", bucket))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prefix: &str, marker: Option<&str>, max_keys: usize) -> ListRequest {
        ListRequest {
            prefix: prefix.to_string(),
            delimiter: Some("/".to_string()),
            marker: marker.map(|m| m.to_string()),
            max_keys,
        }
    }

    #[tokio::test]
    async fn test_delimiter_listing_and_markers() {
        let client = MemoryClient::new();
        for key in ["tmp/a", "tmp/b", "tmp/sub/c", "tmp/sub/d", "tmp/z"] {
            client.insert("bkt", key, b"x");
        }

        let first = client.list_page("bkt", &request("tmp/", None, 2)).await.unwrap();
        assert_eq!(first.objects.len(), 2);
        assert_eq!(first.next_marker.as_deref(), Some("tmp/b"));

        let second = client
            .list_page("bkt", &request("tmp/", first.next_marker.as_deref(), 2))
            .await
            .unwrap();
        assert_eq!(second.prefixes, vec!["tmp/sub/".to_string()]);
        assert_eq!(second.objects[0].key, "tmp/z");
        assert_eq!(second.next_marker, None);
    }
}
