//! 应用配置模块

use crate::core::CrawlConfig;
use crate::portal::{DEFAULT_ROOT, OP_TIMEOUT_SECS};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

const CONFIG_FILE: &str = "config.json";

/// 门户连接与备份配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalConfig {
    /// 门户主机名（不含协议和末尾斜杠）
    #[serde(default)]
    pub snv_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// 备份时在任意层级跳过的目录名
    #[serde(default)]
    pub backup_exclude: Vec<String>,
    /// 每个目录列完后的等待时间（毫秒）
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    /// 查询请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_root_path")]
    pub root_path: String,
}

fn default_throttle_ms() -> u64 {
    crate::core::crawler::DEFAULT_THROTTLE_MS
}

fn default_request_timeout_secs() -> u64 {
    OP_TIMEOUT_SECS
}

fn default_root_path() -> String {
    DEFAULT_ROOT.to_string()
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            snv_url: String::new(),
            username: String::new(),
            password: String::new(),
            backup_exclude: Vec::new(),
            throttle_ms: default_throttle_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            root_path: default_root_path(),
        }
    }
}

impl PortalConfig {
    /// 从配置文件加载，文件缺失或损坏时使用默认值
    pub fn load(config_dir: &Path) -> Self {
        let mut config = fs::read_to_string(config_dir.join(CONFIG_FILE))
            .ok()
            .and_then(|content| serde_json::from_str::<PortalConfig>(&content).ok())
            .unwrap_or_default();
        config.snv_url = normalize_host(&config.snv_url);
        config
    }

    /// 合并写入配置文件，保留其他键（例如 "log"）
    pub fn save(&self, config_dir: &Path) -> io::Result<()> {
        fs::create_dir_all(config_dir)?;
        let config_file = config_dir.join(CONFIG_FILE);

        let mut config: serde_json::Value = if config_file.exists() {
            let content = fs::read_to_string(&config_file)?;
            serde_json::from_str(&content).unwrap_or_else(|_| serde_json::json!({}))
        } else {
            serde_json::json!({})
        };
        if !config.is_object() {
            config = serde_json::json!({});
        }

        let value = serde_json::to_value(self).map_err(io::Error::other)?;
        if let (Some(target), serde_json::Value::Object(fields)) = (config.as_object_mut(), value) {
            target.extend(fields);
        }

        let content = serde_json::to_string_pretty(&config).map_err(io::Error::other)?;
        fs::write(&config_file, content)
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn crawl_config(&self) -> CrawlConfig {
        CrawlConfig {
            exclusions: self.backup_exclude.iter().cloned().collect::<HashSet<_>>(),
            throttle: Duration::from_millis(self.throttle_ms),
        }
    }
}

fn scheme_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\w+:)?//").ok()).as_ref()
}

/// 去掉协议前缀和末尾斜杠，只保留主机部分
pub fn normalize_host(input: &str) -> String {
    let trimmed = input.trim();
    let without_scheme = match scheme_pattern() {
        Some(re) => re.replace(trimmed, "").into_owned(),
        None => trimmed.to_string(),
    };
    without_scheme.trim_end_matches('/').to_string()
}

/// 默认配置目录 `<系统配置目录>/snvcloud`
pub fn default_config_dir() -> PathBuf {
    crate::dirs::config_dir()
        .map(|p| p.join("snvcloud"))
        .unwrap_or_else(|| PathBuf::from(".snvcloud"))
}
