use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::RwLock;

use super::StorageDriver;
use crate::utils::{fix_and_clean_path, get_actual_path, is_sub_path};

pub type DiskBox = Arc<dyn StorageDriver>;

/// Storage manager (mount table of configured disks) / 存储管理器
#[derive(Clone, Default)]
pub struct StorageManager {
    disks: Arc<RwLock<HashMap<String, DiskBox>>>,
}

impl StorageManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a disk at a path / 挂载磁盘
    pub async fn mount(&self, mount_path: &str, disk: DiskBox) -> Result<()> {
        let mount_path = fix_and_clean_path(mount_path);
        let mut disks = self.disks.write().await;
        if disks.contains_key(&mount_path) {
            return Err(anyhow!("Mount path already in use: {}", mount_path));
        }
        tracing::info!("Disk mounted: {} ({})", mount_path, disk.name());
        disks.insert(mount_path, disk);
        Ok(())
    }

    /// Remove a mounted disk / 卸载磁盘
    pub async fn unmount(&self, mount_path: &str) -> Result<()> {
        let mount_path = fix_and_clean_path(mount_path);
        let mut disks = self.disks.write().await;
        disks
            .remove(&mount_path)
            .ok_or_else(|| anyhow!("Disk not found: {}", mount_path))?;

        tracing::info!("Disk unmounted: {}", mount_path);
        Ok(())
    }

    /// Get disk by mount path / 获取磁盘
    pub async fn get_disk(&self, mount_path: &str) -> Option<DiskBox> {
        let disks = self.disks.read().await;
        disks.get(&fix_and_clean_path(mount_path)).cloned()
    }

    /// List mount paths / 列出挂载点
    pub async fn list_mounts(&self) -> Vec<String> {
        let disks = self.disks.read().await;
        let mut mounts: Vec<String> = disks.keys().cloned().collect();
        mounts.sort();
        mounts
    }

    /// Resolve path to the disk with the longest matching mount point and the
    /// path relative to it / 根据路径解析到对应的磁盘
    pub async fn resolve_path(&self, path: &str) -> Option<(DiskBox, String)> {
        let disks = self.disks.read().await;
        let normalized = fix_and_clean_path(path);

        disks
            .iter()
            .filter(|(mount, _)| is_sub_path(mount, &normalized))
            .max_by_key(|(mount, _)| mount.len())
            .map(|(mount, disk)| (disk.clone(), get_actual_path(mount, &normalized)))
    }
}
