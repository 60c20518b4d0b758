//! 文件传输：流式下载、整文件上传、顺序批量下载

use super::backup::BackupProgress;
use super::cancellable;
use crate::error::{PortalError, Result};
use crate::portal::{codec, last_segment, PortalClient, Session, UploadDirectives, UploadRequest};
use futures::StreamExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 传输方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Download,
    Upload,
}

/// 传输状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferStatus {
    Pending,
    InFlight,
    Done,
    Failed,
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferStatus::Pending => write!(f, "pending"),
            TransferStatus::InFlight => write!(f, "in_flight"),
            TransferStatus::Done => write!(f, "done"),
            TransferStatus::Failed => write!(f, "failed"),
        }
    }
}

/// 单个文件的传输任务，只存在于本次运行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    pub id: String,
    pub remote_address: String,
    pub local_path: PathBuf,
    pub direction: Direction,
    pub status: TransferStatus,
    pub bytes: u64,
}

impl TransferJob {
    pub fn download(remote_address: &str, local_path: PathBuf) -> Self {
        Self::new(remote_address, local_path, Direction::Download)
    }

    pub fn upload(local_path: PathBuf, remote_address: &str) -> Self {
        Self::new(remote_address, local_path, Direction::Upload)
    }

    fn new(remote_address: &str, local_path: PathBuf, direction: Direction) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            remote_address: remote_address.to_string(),
            local_path,
            direction,
            status: TransferStatus::Pending,
            bytes: 0,
        }
    }
}

/// 批量下载结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferSummary {
    pub files: usize,
    pub bytes: u64,
}

/// 传输引擎
pub struct TransferEngine<'a> {
    client: &'a PortalClient,
    session: &'a Session,
    /// 单文件下载的落地目录
    work_dir: PathBuf,
    cancel: CancellationToken,
}

impl<'a> TransferEngine<'a> {
    pub fn new(client: &'a PortalClient, session: &'a Session, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            session,
            work_dir: work_dir.into(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 下载到工作目录，文件名取地址最后一段（还原转义）
    pub async fn download(&self, remote_address: &str) -> Result<PathBuf> {
        let name = codec::decode(last_segment(remote_address));
        if name.is_empty() || name == "." || name == ".." {
            return Err(PortalError::InvalidRequest(format!(
                "无法从地址推导文件名: {}",
                remote_address
            )));
        }
        let destination = self.work_dir.join(name);
        let bytes = self.fetch_into(remote_address, &destination).await?;
        info!("下载完成: {} -> {:?} ({} 字节)", remote_address, destination, bytes);
        Ok(destination)
    }

    /// 执行一个传输任务并更新其状态
    pub async fn run_job(&self, job: &mut TransferJob) -> Result<u64> {
        job.status = TransferStatus::InFlight;
        let result = match job.direction {
            Direction::Download => self.fetch_into(&job.remote_address, &job.local_path).await,
            Direction::Upload => self.upload(&job.local_path, &job.remote_address).await,
        };
        match result {
            Ok(bytes) => {
                job.status = TransferStatus::Done;
                job.bytes = bytes;
                Ok(bytes)
            }
            Err(e) => {
                job.status = TransferStatus::Failed;
                Err(e)
            }
        }
    }

    /// 严格顺序地执行下载任务，遇到第一个失败即停止
    pub async fn download_all(
        &self,
        jobs: &mut [TransferJob],
        progress_tx: Option<&mpsc::Sender<BackupProgress>>,
    ) -> Result<TransferSummary> {
        let total = jobs.len();
        let mut summary = TransferSummary::default();
        for (index, job) in jobs.iter_mut().enumerate() {
            if let Some(tx) = progress_tx {
                let _ = tx
                    .send(BackupProgress::Downloading {
                        current: index + 1,
                        total,
                        address: job.remote_address.clone(),
                    })
                    .await;
            }
            if let Err(e) = self.run_job(job).await {
                warn!("下载失败: {}: {}", job.remote_address, e);
                return Err(e);
            }
            summary.files += 1;
            summary.bytes += job.bytes;
        }
        Ok(summary)
    }

    /// 把响应体流式写入 `destination` 旁的临时文件，完成后重命名
    ///
    /// 流出错、被取消或 future 被丢弃时，临时文件都会被删除。
    async fn fetch_into(&self, remote_address: &str, destination: &Path) -> Result<u64> {
        let cookie = self.session.cookie_header()?;
        let mut stream = cancellable(
            &self.cancel,
            self.client
                .transport()
                .fetch(remote_address, &cookie, self.session.id()),
        )
        .await?;

        let temp_path = temp_path_for(destination);
        let guard = scopeguard::guard(temp_path.clone(), |path| {
            let _ = std::fs::remove_file(&path);
        });

        let mut file = fs::File::create(&temp_path).await?;
        let mut written: u64 = 0;
        loop {
            let next = cancellable(&self.cancel, async { Ok(stream.next().await) }).await?;
            let Some(chunk) = next else { break };
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        fs::rename(&temp_path, destination).await?;
        scopeguard::ScopeGuard::into_inner(guard);
        debug!("写入 {:?} ({} 字节)", destination, written);
        Ok(written)
    }

    /// 读取整个本地文件并 PUT 到目标地址，不校验远端大小
    pub async fn upload(&self, local_path: &Path, remote_address: &str) -> Result<u64> {
        let body = fs::read(local_path).await?;
        let length = body.len() as u64;
        let directives = UploadDirectives::for_target(remote_address);
        let request = UploadRequest {
            address: remote_address.to_string(),
            cookie: self.session.upload_cookie_header(&directives)?,
            body,
        };

        let response = cancellable(&self.cancel, self.client.transport().put(request)).await?;
        if !response.is_success() {
            return Err(PortalError::HttpStatus {
                status: response.status,
                url: remote_address.to_string(),
            });
        }
        info!("上传完成: {:?} -> {} ({} 字节)", local_path, remote_address, length);
        Ok(length)
    }
}

fn temp_path_for(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}.{}.part", name, uuid::Uuid::new_v4().simple()))
}
