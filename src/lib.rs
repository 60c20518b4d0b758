pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod portal;

pub use config::PortalConfig;
pub use core::{BackupReport, BackupRunner, DirectoryCrawler, DirectoryTree, Navigator, TransferEngine};
pub use error::{AuthError, ErrorKind, PortalError, Result};
pub use portal::{HttpTransport, PortalClient, PortalTransport, Session, SessionManager};

/// 平台配置目录
pub mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
        } else {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".config"))
                })
        }
    }
}
