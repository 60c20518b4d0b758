//! 备份命令

use crate::config::PortalConfig;
use crate::core::{backup_dir_name, mirror, BackupProgress, BackupReport, BackupRunner, Notice, Prompter};
use crate::error::Result;
use crate::portal::{PortalClient, Session};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// 进度事件的终端文本
pub fn describe_progress(progress: &BackupProgress) -> String {
    match progress {
        BackupProgress::Crawling { path } => format!("正在读取目录 {}", path),
        BackupProgress::Materialized { directories, files } => {
            format!("已创建 {} 个目录，共 {} 个文件待下载", directories, files)
        }
        BackupProgress::Downloading {
            current,
            total,
            address,
        } => format!("[{}/{}] {}", current, total, address),
    }
}

pub fn describe_report(report: &BackupReport) -> String {
    format!(
        "备份完成: {} 个目录, {} 个文件, {} 字节, 用时 {} 秒 -> {}",
        report.directories,
        report.files,
        report.bytes,
        report.end_time - report.start_time,
        report.root.display()
    )
}

/// 询问保存位置并确认后执行备份
///
/// 用户取消时返回 `Ok(None)`。
pub async fn backup(
    client: &PortalClient,
    session: &Session,
    config: &PortalConfig,
    prompter: &mut dyn Prompter,
    cancel: CancellationToken,
) -> Result<Option<BackupReport>> {
    prompter.notify(Notice::Warning(
        "备份只用于把所有文件下载到本地目录，不能用于恢复文件".to_string(),
    ));

    let validate = |value: &str| {
        if Path::new(value).is_dir() {
            Ok(())
        } else {
            Err("目录不存在".to_string())
        }
    };
    let Some(parent) = prompter.text("备份保存位置（将在其中新建文件夹）", &validate) else {
        return Ok(None);
    };

    let date = chrono::Local::now().date_naive();
    let destination = PathBuf::from(parent).join(backup_dir_name(&config.username, date));
    if let Err(e) = mirror::ensure_fresh(&destination) {
        prompter.notify(Notice::Info(format!(
            "如需重新备份，请先删除 {}",
            destination.display()
        )));
        return Err(e);
    }

    prompter.notify(Notice::Info(format!("将备份到 {}", destination.display())));
    if !prompter.confirm("确定要把所有文件备份到这个位置吗?") {
        return Ok(None);
    }

    let (tx, mut rx) = mpsc::channel::<BackupProgress>(64);
    let runner = BackupRunner::new(client, session)
        .with_cancel(cancel)
        .with_progress(tx);
    let run = runner.run(&destination, config.crawl_config());
    tokio::pin!(run);

    // 在同一任务里边跑备份边输出进度
    let result = loop {
        tokio::select! {
            result = &mut run => break result,
            Some(progress) = rx.recv() => {
                prompter.notify(Notice::Info(describe_progress(&progress)));
            }
        }
    };
    while let Ok(progress) = rx.try_recv() {
        prompter.notify(Notice::Info(describe_progress(&progress)));
    }

    let report = result?;
    prompter.notify(Notice::Success(describe_report(&report)));
    Ok(Some(report))
}
