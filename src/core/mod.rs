pub mod backup;
pub mod crawler;
pub mod mirror;
pub mod navigator;
pub mod transfer;

pub use backup::{backup_dir_name, BackupProgress, BackupReport, BackupRunner};
pub use crawler::{list_directory, CrawlConfig, DirectoryCrawler, DirectoryTree, RemoteEntry, TreeNode};
pub use navigator::{Choice, Navigator, NavigatorState, Notice, Prompter, Screen, Target};
pub use transfer::{Direction, TransferEngine, TransferJob, TransferStatus, TransferSummary};

use crate::error::{PortalError, Result};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// 让一个挂起点可以被外部中断立即打断
pub(crate) async fn cancellable<T, F>(token: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(PortalError::Cancelled),
        result = fut => result,
    }
}
