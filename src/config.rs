//! TOML 配置文件
//!
//! 默认位置是 `ProjectDirs` 的配置目录下的 `config.toml`，文件不存在时全部使用默认值。

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// 关闭后调度器视为没有通知权限
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u32,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// 倒计时显示刷新间隔
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_socket_name")]
    pub socket_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

fn default_true() -> bool {
    true
}
fn default_timeout_ms() -> u32 {
    5000
}
fn default_icon() -> String {
    "appointment-soon".to_string()
}
fn default_app_name() -> String {
    "notedue".to_string()
}
fn default_tick_interval_ms() -> u64 {
    1000
}
fn default_socket_name() -> String {
    "notedue.sock".to_string()
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: default_timeout_ms(),
            icon: default_icon(),
            app_name: default_app_name(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            socket_name: default_socket_name(),
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("com", "notedue", "notedue")
        .ok_or_else(|| Error::Config("Failed to get project directories".to_string()))
}

impl Config {
    /// 默认配置文件路径
    pub fn default_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// 读取配置，文件不存在则返回默认值
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load_from(&Self::default_path()?),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// 数据库路径：命令行参数 > 配置文件 > 用户数据目录
    pub fn resolve_db_path(&self, cli_override: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = cli_override.or_else(|| self.db_path.clone()) {
            return Ok(path);
        }
        let proj_dirs = project_dirs()?;
        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;
        Ok(data_dir.join("notes.db"))
    }
}
