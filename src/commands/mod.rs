//! 终端命令：主菜单及其子命令

pub mod backup;
pub mod connect;
pub mod info;
pub mod prompt;

pub use prompt::TerminalPrompter;

use crate::config::PortalConfig;
use crate::core::{Navigator, Notice, Prompter};
use crate::error::{PortalError, Result};
use crate::portal::{PortalClient, SchoolInfo, Session};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// 主菜单选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    FileManager,
    Backup,
    Info,
    Exit,
}

impl MenuAction {
    pub const ALL: [MenuAction; 4] = [
        MenuAction::FileManager,
        MenuAction::Backup,
        MenuAction::Info,
        MenuAction::Exit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MenuAction::FileManager => "文件管理器",
            MenuAction::Backup => "创建备份",
            MenuAction::Info => "更多信息",
            MenuAction::Exit => "退出",
        }
    }
}

/// 中止选择视为退出
pub fn main_menu(prompter: &mut dyn Prompter) -> MenuAction {
    let labels: Vec<String> = MenuAction::ALL.iter().map(|a| a.label().to_string()).collect();
    prompter
        .select("要做什么?", &labels)
        .and_then(|index| MenuAction::ALL.get(index).copied())
        .unwrap_or(MenuAction::Exit)
}

/// 登录后的会话上下文
pub struct Workspace<'a> {
    pub client: &'a PortalClient,
    pub session: &'a Session,
    pub school: &'a SchoolInfo,
    pub config: &'a PortalConfig,
    /// 单文件下载的落地目录
    pub work_dir: PathBuf,
    pub cancel: CancellationToken,
}

impl Workspace<'_> {
    /// 主菜单循环，直到用户选择退出
    ///
    /// 子命令的失败只报告不退出；取消会立即向上传播。
    pub async fn run(&self, prompter: &mut dyn Prompter) -> Result<()> {
        loop {
            let result = match main_menu(prompter) {
                MenuAction::FileManager => Navigator::new(self.client, self.session, self.work_dir.clone())
                    .with_cancel(self.cancel.clone())
                    .run(prompter)
                    .await,
                MenuAction::Backup => backup::backup(
                    self.client,
                    self.session,
                    self.config,
                    prompter,
                    self.cancel.clone(),
                )
                .await
                .map(|_| ()),
                MenuAction::Info => {
                    info::show_info(self.client, self.session, self.school, prompter).await
                }
                MenuAction::Exit => return Ok(()),
            };

            match result {
                Ok(()) => {}
                Err(PortalError::Cancelled) => return Err(PortalError::Cancelled),
                Err(e) => {
                    error!("命令失败: {}", e);
                    prompter.notify(Notice::from(&e));
                }
            }
        }
    }
}
