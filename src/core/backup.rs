//! 备份：把整个远程存储一次性镜像到一个新的本地目录
//!
//! 备份只是追加式快照，不做双向同步，也不能用来恢复。

use super::crawler::{CrawlConfig, DirectoryCrawler};
use super::mirror;
use super::transfer::TransferEngine;
use crate::error::{PortalError, Result};
use crate::portal::{PortalClient, Session};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// 备份进度事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum BackupProgress {
    Crawling { path: String },
    Materialized { directories: usize, files: usize },
    Downloading { current: usize, total: usize, address: String },
}

/// 备份报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupReport {
    pub root: PathBuf,
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
    pub start_time: i64,
    pub end_time: i64,
}

/// `SNV-Backup_<用户名>_<YYYY-MM-DD>`
pub fn backup_dir_name(username: &str, date: NaiveDate) -> String {
    format!("SNV-Backup_{}_{}", username, date.format("%Y-%m-%d"))
}

pub struct BackupRunner<'a> {
    client: &'a PortalClient,
    session: &'a Session,
    cancel: CancellationToken,
    progress_tx: Option<mpsc::Sender<BackupProgress>>,
}

impl<'a> BackupRunner<'a> {
    pub fn new(client: &'a PortalClient, session: &'a Session) -> Self {
        Self {
            client,
            session,
            cancel: CancellationToken::new(),
            progress_tx: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, tx: mpsc::Sender<BackupProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// 爬取 → 创建目录骨架 → 顺序下载
    ///
    /// `destination_root` 必须不存在；检查在发出任何远程请求之前完成。
    pub async fn run(&self, destination_root: &Path, crawl: CrawlConfig) -> Result<BackupReport> {
        let start_time = chrono::Utc::now().timestamp();
        mirror::ensure_fresh(destination_root)?;
        if let Some(parent) = destination_root.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(PortalError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("备份父目录不存在: {}", parent.display()),
                )));
            }
        }

        info!("开始备份到 {:?}", destination_root);

        let mut crawler = DirectoryCrawler::new(self.client, self.session, crawl)
            .with_cancel(self.cancel.clone());
        if let Some(tx) = &self.progress_tx {
            crawler = crawler.with_progress(tx.clone());
        }
        let tree = crawler.crawl(self.client.root()).await?;

        // 从这里开始本地目录已存在，失败时保留部分镜像并明确告知
        let result = self.mirror_and_download(&tree, destination_root).await;
        match result {
            Ok((directories, files, bytes)) => {
                let report = BackupReport {
                    root: destination_root.to_path_buf(),
                    directories,
                    files,
                    bytes,
                    start_time,
                    end_time: chrono::Utc::now().timestamp(),
                };
                info!(
                    "备份完成: {} 个目录, {} 个文件, {} 字节",
                    report.directories, report.files, report.bytes
                );
                Ok(report)
            }
            Err(PortalError::DestinationExists(path)) if path == destination_root => {
                Err(PortalError::DestinationExists(path))
            }
            Err(e) => {
                error!("备份中断: {}", e);
                Err(PortalError::BackupIncomplete {
                    path: destination_root.to_path_buf(),
                    source: Box::new(e),
                })
            }
        }
    }

    async fn mirror_and_download(
        &self,
        tree: &super::DirectoryTree,
        destination_root: &Path,
    ) -> Result<(usize, usize, u64)> {
        let directories = mirror::materialize(tree, destination_root)?;
        let mut jobs = mirror::download_jobs(tree, destination_root);
        if let Some(tx) = &self.progress_tx {
            let _ = tx
                .send(BackupProgress::Materialized {
                    directories,
                    files: jobs.len(),
                })
                .await;
        }

        let engine = TransferEngine::new(self.client, self.session, destination_root)
            .with_cancel(self.cancel.clone());
        let summary = engine
            .download_all(&mut jobs, self.progress_tx.as_ref())
            .await?;
        Ok((directories, summary.files, summary.bytes))
    }
}
