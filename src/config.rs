//! Application configuration module / 应用配置模块
//!
//! Manages application configuration loaded from config.json
//! Creates default config file on first run / 首次运行时创建默认配置文件

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::drivers::oss::OssConfig;

/// Environment variable overriding `oss.env` / 覆盖部署环境的环境变量
pub const APP_ENV: &str = "APP_ENV";

/// Application configuration / 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration / 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// Mount point of the OSS disk / OSS挂载路径
    #[serde(default = "default_mount_path")]
    pub mount_path: String,
    /// Staging directory for relayed uploads / 中转上传的本地暂存目录
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    /// OSS configuration / OSS配置
    #[serde(default)]
    pub oss: OssConfig,
}

/// Server configuration / 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address / 服务器监听地址
    pub host: String,
    /// Server port / 服务器端口
    pub port: u16,
}

fn default_mount_path() -> String {
    "/oss".to_string()
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            mount_path: default_mount_path(),
            upload_dir: default_upload_dir(),
            oss: OssConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8180,
        }
    }
}

impl AppConfig {
    /// Get the server bind address / 获取服务器绑定地址
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn get_upload_dir(&self) -> PathBuf {
        PathBuf::from(&self.upload_dir)
    }

    /// Apply an `APP_ENV` value on top of the file / 应用环境变量覆盖
    pub fn apply_env_override(&mut self, app_env: Option<String>) {
        if let Some(env) = app_env.filter(|v| !v.trim().is_empty()) {
            tracing::info!("OSS environment overridden by {}: {}", APP_ENV, env);
            self.oss.env = env;
        }
    }
}

/// Get the config file path / 获取配置文件路径
fn get_config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config() -> Result<AppConfig, String> {
    let mut config = load_config_from(&get_config_path())?;
    config.apply_env_override(std::env::var(APP_ENV).ok());
    Ok(config)
}

/// Load configuration from an explicit path / 从指定路径加载配置
pub fn load_config_from(config_path: &Path) -> Result<AppConfig, String> {
    if config_path.exists() {
        // Load existing config / 加载现有配置
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        Ok(config)
    } else {
        // Create default config / 创建默认配置
        let config = AppConfig::default();
        save_config_to(&config, config_path)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        Ok(config)
    }
}

/// Save configuration to file / 保存配置到文件
pub fn save_config_to(config: &AppConfig, config_path: &Path) -> Result<(), String> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(config_path, content)
        .map_err(|e| format!("Failed to write config file: {}", e))?;

    Ok(())
}
