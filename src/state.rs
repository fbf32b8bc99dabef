use std::sync::Arc;

use oss_adapter::config::AppConfig;
use oss_adapter::drivers::oss::OssAdapter;
use oss_adapter::storage::StorageManager;

/// Shared handler state / 全局共享状态
pub struct AppState {
    pub config: AppConfig,
    /// Mount table used by the generic file routes / 挂载表
    pub storage: StorageManager,
    /// OSS disk, also mounted in `storage` / OSS驱动
    pub oss: Arc<OssAdapter>,
}
