//! 交互式文件管理器状态机
//!
//! ```text
//! Listing ──更多操作──> ActionMenu ──> {重命名, 删除, 上传, 新建文件夹} ──> Listing
//! Listing ──选择文件──> FileMenu   ──> {下载, 重命名, 删除}           ──> Listing
//! Listing ──退出──> Exited
//! ```
//!
//! 每个变更操作只发一次请求。失败时通过 [`Prompter::notify`] 报告，当前路径保持不变。

use super::cancellable;
use super::crawler::{list_directory, RemoteEntry};
use super::transfer::{TransferEngine, TransferJob};
use crate::error::{ErrorKind, PortalError, Result};
use crate::portal::{
    codec, ensure_dir_suffix, is_dir_address, method, parent_address, PortalClient, PortalQuery,
    Session,
};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 菜单选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Parent,
    Directory(String),
    File(String),
    MoreOptions,
    Exit,
    Rename,
    Delete,
    Upload,
    NewFolder,
    Download,
    Back,
}

/// 展示给用户的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Success(String),
    Warning(String),
    Error { kind: ErrorKind, message: String },
}

impl From<&PortalError> for Notice {
    fn from(e: &PortalError) -> Self {
        Notice::Error {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// 交互组件（选择、文本输入、确认、本地文件选择）由外部提供
pub trait Prompter {
    /// 返回所选项的下标；`None` 表示用户中止选择
    fn select(&mut self, message: &str, options: &[String]) -> Option<usize>;

    /// `validate` 返回 `Err(提示)` 时应重新询问；返回 `None` 表示取消
    fn text(
        &mut self,
        message: &str,
        validate: &dyn Fn(&str) -> std::result::Result<(), String>,
    ) -> Option<String>;

    /// 不回显的输入（密码）
    fn secret(&mut self, message: &str) -> Option<String> {
        self.text(message, &|_| Ok(()))
    }

    fn confirm(&mut self, message: &str) -> bool;

    fn choose_local_file(&mut self) -> Option<PathBuf>;

    fn notify(&mut self, notice: Notice);
}

/// 变更操作的对象
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// 当前浏览的目录
    CurrentDirectory,
    /// 当前目录中的一个文件（已转义的地址）
    File(String),
}

/// 等待文本输入的用途
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextPurpose {
    RenameTo(Target),
    FolderName,
}

/// 当前界面
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Listing,
    ActionMenu,
    FileMenu { address: String },
    PromptingText(TextPurpose),
    PromptingConfirm(Target),
    Exited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigatorState {
    pub current_remote_path: String,
    pub screen: Screen,
}

fn folder_name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"^[^<>:"/\\|?*\x00-\x1F]+$"#).ok())
        .as_ref()
}

fn pick(prompter: &mut dyn Prompter, message: &str, options: &[(String, Choice)]) -> Option<Choice> {
    let labels: Vec<String> = options.iter().map(|(label, _)| label.clone()).collect();
    prompter
        .select(message, &labels)
        .and_then(|index| options.get(index))
        .map(|(_, choice)| choice.clone())
}

fn validate_absolute(value: &str) -> std::result::Result<(), String> {
    if value.starts_with('/') {
        Ok(())
    } else {
        Err("路径必须以 '/' 开头".to_string())
    }
}

fn validate_folder_name(value: &str) -> std::result::Result<(), String> {
    if folder_name_pattern().is_some_and(|re| re.is_match(value)) {
        Ok(())
    } else {
        Err("无效的文件夹名称".to_string())
    }
}

pub struct Navigator<'a> {
    client: &'a PortalClient,
    session: &'a Session,
    state: NavigatorState,
    work_dir: PathBuf,
    cancel: CancellationToken,
}

impl<'a> Navigator<'a> {
    pub fn new(client: &'a PortalClient, session: &'a Session, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            session,
            state: NavigatorState {
                current_remote_path: client.root().to_string(),
                screen: Screen::Listing,
            },
            work_dir: work_dir.into(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> &NavigatorState {
        &self.state
    }

    pub fn current_path(&self) -> &str {
        &self.state.current_remote_path
    }

    fn at_root(&self) -> bool {
        self.client.is_root(&self.state.current_remote_path)
    }

    fn transfer(&self) -> TransferEngine<'a> {
        TransferEngine::new(self.client, self.session, self.work_dir.clone())
            .with_cancel(self.cancel.clone())
    }

    fn target_address(&self, target: &Target) -> String {
        match target {
            Target::CurrentDirectory => self.state.current_remote_path.clone(),
            Target::File(address) => address.clone(),
        }
    }

    fn reject_root(&self, target: &Target) -> Result<()> {
        if matches!(target, Target::CurrentDirectory) && self.at_root() {
            return Err(PortalError::InvalidRequest("不能对根目录执行此操作".to_string()));
        }
        Ok(())
    }

    // ============ 浏览 ============

    pub async fn list(&self) -> Result<Vec<RemoteEntry>> {
        cancellable(
            &self.cancel,
            list_directory(self.client, self.session, &self.state.current_remote_path),
        )
        .await
    }

    pub fn enter(&mut self, address: &str) {
        self.state.current_remote_path = ensure_dir_suffix(address);
    }

    pub fn go_up(&mut self) {
        self.state.current_remote_path =
            parent_address(&self.state.current_remote_path, self.client.root());
    }

    // ============ 变更操作 ============

    /// 重命名/移动；`new_display_path` 必须是绝对路径（相对存储根）
    pub async fn rename(&mut self, target: &Target, new_display_path: &str) -> Result<()> {
        validate_absolute(new_display_path).map_err(PortalError::InvalidRequest)?;
        self.reject_root(target)?;

        let old = codec::encode(&self.target_address(target));
        let mut new = self.client.address_for(new_display_path)?;
        if is_dir_address(&old) {
            new = ensure_dir_suffix(&new);
        }
        if self.client.is_root(&new) {
            return Err(PortalError::InvalidRequest("不能移动到存储根本身".to_string()));
        }

        let query = PortalQuery::new(method::MOVE)
            .param("path", old.as_str())
            .param("newpath", new.as_str());
        cancellable(&self.cancel, self.client.command(self.session, query)).await?;
        info!("已移动: {} -> {}", old, new);

        if matches!(target, Target::CurrentDirectory) {
            self.state.current_remote_path = new;
        }
        Ok(())
    }

    /// 删除；确认由调用方完成
    pub async fn delete(&mut self, target: &Target) -> Result<()> {
        self.reject_root(target)?;
        let address = codec::encode(&self.target_address(target));

        let query = PortalQuery::new(method::DELETE).param("path", address.as_str());
        cancellable(&self.cancel, self.client.command(self.session, query)).await?;
        info!("已删除: {}", address);

        if matches!(target, Target::CurrentDirectory) {
            self.go_up();
        }
        Ok(())
    }

    /// 在当前目录下新建文件夹
    pub async fn create_folder(&mut self, name: &str) -> Result<String> {
        validate_folder_name(name).map_err(PortalError::InvalidRequest)?;
        let address = format!(
            "{}{}",
            ensure_dir_suffix(&self.state.current_remote_path),
            codec::encode(name)
        );

        let query = PortalQuery::new(method::CREATE_DIRECTORY).param("path", address.as_str());
        cancellable(&self.cancel, self.client.command(self.session, query)).await?;
        info!("已创建文件夹: {}", address);
        Ok(address)
    }

    /// 上传本地文件到当前目录
    pub async fn upload(&mut self, local_path: &Path) -> Result<String> {
        let name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PortalError::InvalidRequest(format!("无效的本地文件: {:?}", local_path)))?;
        let address = format!(
            "{}{}",
            ensure_dir_suffix(&self.state.current_remote_path),
            codec::encode(name)
        );
        let mut job = TransferJob::upload(local_path.to_path_buf(), &address);
        self.transfer().run_job(&mut job).await?;
        Ok(address)
    }

    pub async fn download(&self, address: &str) -> Result<PathBuf> {
        self.transfer().download(address).await
    }

    // ============ 状态机 ============

    /// 运行直到用户退出
    pub async fn run(&mut self, prompter: &mut dyn Prompter) -> Result<()> {
        self.state.screen = Screen::Listing;
        while self.state.screen != Screen::Exited {
            self.step(prompter).await?;
        }
        Ok(())
    }

    /// 处理当前界面并转移到下一个界面
    pub async fn step(&mut self, prompter: &mut dyn Prompter) -> Result<()> {
        let next = match self.state.screen.clone() {
            Screen::Listing => self.on_listing(prompter).await?,
            Screen::ActionMenu => self.on_action_menu(prompter).await?,
            Screen::FileMenu { address } => self.on_file_menu(prompter, address).await?,
            Screen::PromptingText(purpose) => self.on_text(prompter, purpose).await?,
            Screen::PromptingConfirm(target) => self.on_confirm(prompter, target).await?,
            Screen::Exited => Screen::Exited,
        };
        self.state.screen = next;
        Ok(())
    }

    async fn on_listing(&mut self, prompter: &mut dyn Prompter) -> Result<Screen> {
        let entries = match self.list().await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::Cancelled || self.at_root() => return Err(e),
            Err(e) => {
                prompter.notify(Notice::from(&e));
                self.go_up();
                return Ok(Screen::Listing);
            }
        };

        let mut options = Vec::with_capacity(entries.len() + 3);
        if !self.at_root() {
            options.push(("../".to_string(), Choice::Parent));
        }
        for entry in entries {
            if entry.is_directory {
                options.push((format!("{}/", entry.display_name), Choice::Directory(entry.remote_address)));
            } else {
                options.push((entry.display_name, Choice::File(entry.remote_address)));
            }
        }
        options.push(("更多操作".to_string(), Choice::MoreOptions));
        options.push(("退出文件管理器".to_string(), Choice::Exit));

        let title = format!("当前路径: {}", self.client.display_path(&self.state.current_remote_path));
        let screen = match pick(prompter, &title, &options) {
            Some(Choice::Parent) => {
                self.go_up();
                Screen::Listing
            }
            Some(Choice::Directory(address)) => {
                self.enter(&address);
                Screen::Listing
            }
            Some(Choice::File(address)) => Screen::FileMenu { address },
            Some(Choice::MoreOptions) => Screen::ActionMenu,
            _ => Screen::Exited,
        };
        Ok(screen)
    }

    async fn on_action_menu(&mut self, prompter: &mut dyn Prompter) -> Result<Screen> {
        let options = [
            ("重命名/移动".to_string(), Choice::Rename),
            ("删除".to_string(), Choice::Delete),
            ("上传文件".to_string(), Choice::Upload),
            ("新建文件夹".to_string(), Choice::NewFolder),
            ("返回".to_string(), Choice::Back),
        ];
        let screen = match pick(prompter, "要做什么?", &options) {
            Some(Choice::Rename) | Some(Choice::Delete) if self.at_root() => {
                prompter.notify(Notice::Warning("不能对根目录执行此操作".to_string()));
                Screen::Listing
            }
            Some(Choice::Rename) => Screen::PromptingText(TextPurpose::RenameTo(Target::CurrentDirectory)),
            Some(Choice::Delete) => Screen::PromptingConfirm(Target::CurrentDirectory),
            Some(Choice::NewFolder) => Screen::PromptingText(TextPurpose::FolderName),
            Some(Choice::Upload) => {
                if let Some(local) = prompter.choose_local_file() {
                    let result = self.upload(&local).await.map(|address| {
                        format!("已上传到 {}", self.client.display_path(&address))
                    });
                    self.report(prompter, result)?;
                }
                Screen::Listing
            }
            _ => Screen::Listing,
        };
        Ok(screen)
    }

    async fn on_file_menu(&mut self, prompter: &mut dyn Prompter, address: String) -> Result<Screen> {
        prompter.notify(Notice::Info(format!("当前文件: {}", self.client.display_path(&address))));
        let options = [
            ("下载".to_string(), Choice::Download),
            ("重命名/移动".to_string(), Choice::Rename),
            ("删除".to_string(), Choice::Delete),
            ("返回".to_string(), Choice::Back),
        ];
        let screen = match pick(prompter, "要做什么?", &options) {
            Some(Choice::Download) => {
                let result = self
                    .download(&address)
                    .await
                    .map(|path| format!("已下载到 {}", path.display()));
                self.report(prompter, result)?;
                Screen::Listing
            }
            Some(Choice::Rename) => Screen::PromptingText(TextPurpose::RenameTo(Target::File(address))),
            Some(Choice::Delete) => Screen::PromptingConfirm(Target::File(address)),
            _ => Screen::Listing,
        };
        Ok(screen)
    }

    async fn on_text(&mut self, prompter: &mut dyn Prompter, purpose: TextPurpose) -> Result<Screen> {
        match purpose {
            TextPurpose::RenameTo(target) => {
                let Some(new_path) = prompter.text("输入完整的新路径", &validate_absolute) else {
                    return Ok(Screen::Listing);
                };
                let result = self
                    .rename(&target, &new_path)
                    .await
                    .map(|_| "重命名/移动成功".to_string());
                self.report(prompter, result)?;
            }
            TextPurpose::FolderName => {
                let Some(name) = prompter.text("输入新文件夹名称", &validate_folder_name) else {
                    return Ok(Screen::Listing);
                };
                let result = self
                    .create_folder(&name)
                    .await
                    .map(|_| "文件夹已创建".to_string());
                self.report(prompter, result)?;
            }
        }
        Ok(Screen::Listing)
    }

    async fn on_confirm(&mut self, prompter: &mut dyn Prompter, target: Target) -> Result<Screen> {
        let what = match target {
            Target::CurrentDirectory => "这个文件夹",
            Target::File(_) => "这个文件",
        };
        if prompter.confirm(&format!("确定要删除{}吗?", what)) {
            let result = self.delete(&target).await.map(|_| "删除成功".to_string());
            self.report(prompter, result)?;
        }
        Ok(Screen::Listing)
    }

    /// 成功和普通失败都交给 prompter 展示；取消需要向上传播
    fn report(&self, prompter: &mut dyn Prompter, result: Result<String>) -> Result<()> {
        match result {
            Ok(message) => {
                prompter.notify(Notice::Success(message));
                Ok(())
            }
            Err(PortalError::Cancelled) => Err(PortalError::Cancelled),
            Err(e) => {
                warn!("操作失败: {}", e);
                prompter.notify(Notice::from(&e));
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::testing::{headers, MockTransport};
    use std::collections::VecDeque;
    use std::sync::Arc;

    fn setup() -> (Arc<MockTransport>, PortalClient, Session) {
        let mock = Arc::new(MockTransport::new());
        let client = PortalClient::new(mock.clone());
        let session = Session::restore("S1", "a", "b").unwrap();
        (mock, client, session)
    }

    fn code(value: &str) -> crate::portal::PortalResponse {
        headers(&[("commandresponseno", value)])
    }

    #[derive(Default)]
    struct ScriptedPrompter {
        /// 按标签选择
        selections: VecDeque<&'static str>,
        texts: VecDeque<String>,
        confirms: VecDeque<bool>,
        files: VecDeque<PathBuf>,
        notices: Vec<Notice>,
        menus: Vec<Vec<String>>,
    }

    impl Prompter for ScriptedPrompter {
        fn select(&mut self, _message: &str, options: &[String]) -> Option<usize> {
            self.menus.push(options.to_vec());
            let label = self.selections.pop_front()?;
            options.iter().position(|o| o == label)
        }

        fn text(
            &mut self,
            _message: &str,
            validate: &dyn Fn(&str) -> std::result::Result<(), String>,
        ) -> Option<String> {
            let value = self.texts.pop_front()?;
            validate(&value).ok().map(|_| value)
        }

        fn confirm(&mut self, _message: &str) -> bool {
            self.confirms.pop_front().unwrap_or(false)
        }

        fn choose_local_file(&mut self) -> Option<PathBuf> {
            self.files.pop_front()
        }

        fn notify(&mut self, notice: Notice) {
            self.notices.push(notice);
        }
    }

    #[tokio::test]
    async fn test_rejected_move_keeps_current_path() {
        let (mock, client, session) = setup();
        mock.push_query(code("404"));
        let mut nav = Navigator::new(&client, &session, ".");
        nav.enter("/snvcloud/Home/");

        let err = nav
            .rename(&Target::CurrentDirectory, "/Home2")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(nav.current_path(), "/snvcloud/Home/");
    }

    #[tokio::test]
    async fn test_rejected_delete_and_mkdir_keep_current_path() {
        let (mock, client, session) = setup();
        mock.push_query(code("500"));
        mock.push_query(code("409"));
        let mut nav = Navigator::new(&client, &session, ".");
        nav.enter("/snvcloud/Home/");

        assert_eq!(
            nav.delete(&Target::CurrentDirectory).await.unwrap_err().kind(),
            ErrorKind::Protocol
        );
        assert_eq!(nav.create_folder("Neu").await.unwrap_err().kind(), ErrorKind::Protocol);
        assert_eq!(nav.current_path(), "/snvcloud/Home/");
    }

    #[tokio::test]
    async fn test_rename_current_directory_follows_new_address() {
        let (mock, client, session) = setup();
        mock.push_query(code("201"));
        let mut nav = Navigator::new(&client, &session, ".");
        nav.enter("/snvcloud/Home/Alt/");

        nav.rename(&Target::CurrentDirectory, "/Home/Übung").await.unwrap();
        assert_eq!(nav.current_path(), "/snvcloud/Home/*Uuml;bung/");

        let (query, _) = &mock.queries()[0];
        assert_eq!(query.method(), "move");
        assert_eq!(query.get("path"), Some("/snvcloud/Home/Alt/"));
        assert_eq!(query.get("newpath"), Some("/snvcloud/Home/*Uuml;bung/"));
    }

    #[tokio::test]
    async fn test_rename_file_keeps_location() {
        let (mock, client, session) = setup();
        mock.push_query(code("200"));
        let mut nav = Navigator::new(&client, &session, ".");
        nav.enter("/snvcloud/Home/");

        nav.rename(&Target::File("/snvcloud/Home/a.txt".into()), "/Home/b.txt")
            .await
            .unwrap();
        assert_eq!(nav.current_path(), "/snvcloud/Home/");
        assert_eq!(mock.queries()[0].0.get("newpath"), Some("/snvcloud/Home/b.txt"));
    }

    #[tokio::test]
    async fn test_delete_directory_moves_to_parent() {
        let (mock, client, session) = setup();
        mock.push_query(code("204"));
        let mut nav = Navigator::new(&client, &session, ".");
        nav.enter("/snvcloud/Home/Alt/");

        nav.delete(&Target::CurrentDirectory).await.unwrap();
        assert_eq!(nav.current_path(), "/snvcloud/Home/");
    }

    #[tokio::test]
    async fn test_root_mutation_rejected_locally() {
        let (mock, client, session) = setup();
        let mut nav = Navigator::new(&client, &session, ".");

        let err = nav.delete(&Target::CurrentDirectory).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        let err = nav
            .rename(&Target::CurrentDirectory, "/elsewhere")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_relative_rename_target_rejected_locally() {
        let (mock, client, session) = setup();
        let mut nav = Navigator::new(&client, &session, ".");
        nav.enter("/snvcloud/Home/");
        let err = nav
            .rename(&Target::CurrentDirectory, "Home2")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_create_folder_validates_and_encodes() {
        let (mock, client, session) = setup();
        mock.push_query(code("201"));
        let mut nav = Navigator::new(&client, &session, ".");

        assert_eq!(
            nav.create_folder("a/b").await.unwrap_err().kind(),
            ErrorKind::InvalidRequest
        );
        let address = nav.create_folder("Größe").await.unwrap();
        assert_eq!(address, "/snvcloud/Gr*ouml;*szlig;e");
        assert_eq!(mock.queries().len(), 1);
        assert_eq!(mock.queries()[0].0.method(), "mkcol");
    }

    #[tokio::test]
    async fn test_run_browse_mkdir_and_exit() {
        let (mock, client, session) = setup();
        mock.add_listing("/snvcloud/", &[("Home", "/snvcloud/Home/")]);
        mock.add_listing("/snvcloud/Home/", &[("a.txt", "/snvcloud/Home/a.txt")]);
        mock.push_query(code("201"));

        let mut prompter = ScriptedPrompter {
            selections: VecDeque::from(vec![
                "Home/",
                "更多操作",
                "新建文件夹",
                "退出文件管理器",
            ]),
            texts: VecDeque::from(vec!["Neu".to_string()]),
            ..Default::default()
        };

        let mut nav = Navigator::new(&client, &session, ".");
        nav.run(&mut prompter).await.unwrap();

        assert_eq!(nav.state().screen, Screen::Exited);
        assert_eq!(nav.current_path(), "/snvcloud/Home/");
        assert_eq!(prompter.notices, vec![Notice::Success("文件夹已创建".into())]);
        // 根目录没有 "../"，子目录有
        assert_eq!(prompter.menus[0][0], "Home/");
        assert_eq!(prompter.menus[1][0], "../");
        let mkcol = mock
            .queries()
            .into_iter()
            .find(|(q, _)| q.method() == "mkcol")
            .unwrap();
        assert_eq!(mkcol.0.get("path"), Some("/snvcloud/Home/Neu"));
    }

    #[tokio::test]
    async fn test_run_failed_delete_is_reported_and_location_kept() {
        let (mock, client, session) = setup();
        mock.add_listing("/snvcloud/Home/", &[]);
        mock.push_query(code("403"));

        let mut prompter = ScriptedPrompter {
            selections: VecDeque::from(vec!["更多操作", "删除", "退出文件管理器"]),
            confirms: VecDeque::from(vec![true]),
            ..Default::default()
        };

        let mut nav = Navigator::new(&client, &session, ".");
        nav.enter("/snvcloud/Home/");
        nav.run(&mut prompter).await.unwrap();

        assert_eq!(nav.current_path(), "/snvcloud/Home/");
        assert!(matches!(
            prompter.notices.as_slice(),
            [Notice::Error { kind: ErrorKind::Protocol, .. }]
        ));
    }

    #[tokio::test]
    async fn test_run_declined_delete_sends_nothing() {
        let (mock, client, session) = setup();
        mock.add_listing("/snvcloud/Home/", &[("a.txt", "/snvcloud/Home/a.txt")]);

        let mut prompter = ScriptedPrompter {
            selections: VecDeque::from(vec![
                "a.txt",
                "删除",
                "退出文件管理器",
            ]),
            confirms: VecDeque::from(vec![false]),
            ..Default::default()
        };

        let mut nav = Navigator::new(&client, &session, ".");
        nav.enter("/snvcloud/Home/");
        nav.run(&mut prompter).await.unwrap();

        assert!(mock.queries().iter().all(|(q, _)| q.method() != "delete"));
    }

    #[tokio::test]
    async fn test_run_download_from_file_menu() {
        let (mock, client, session) = setup();
        mock.add_listing("/snvcloud/", &[("a.txt", "/snvcloud/a.txt")]);
        mock.add_file("/snvcloud/a.txt", &[b"abc"]);
        let tmp = tempfile::tempdir().unwrap();

        let mut prompter = ScriptedPrompter {
            selections: VecDeque::from(vec![
                "a.txt",
                "下载",
                "退出文件管理器",
            ]),
            ..Default::default()
        };

        let mut nav = Navigator::new(&client, &session, tmp.path());
        nav.run(&mut prompter).await.unwrap();

        assert_eq!(std::fs::read(tmp.path().join("a.txt")).unwrap(), b"abc");
        assert!(matches!(prompter.notices.last(), Some(Notice::Success(_))));
    }

    #[tokio::test]
    async fn test_run_upload_into_root_is_allowed() {
        let (mock, client, session) = setup();
        mock.add_listing("/snvcloud/", &[]);
        let tmp = tempfile::tempdir().unwrap();
        let local = tmp.path().join("Bericht.pdf");
        std::fs::write(&local, b"%PDF").unwrap();

        let mut prompter = ScriptedPrompter {
            selections: VecDeque::from(vec!["更多操作", "上传文件", "退出文件管理器"]),
            files: VecDeque::from(vec![local]),
            ..Default::default()
        };

        let mut nav = Navigator::new(&client, &session, tmp.path());
        nav.run(&mut prompter).await.unwrap();

        let puts = mock.puts();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].address, "/snvcloud/Bericht.pdf");
        assert!(puts[0].cookie.contains("uploadurl=/snvcloud/;"));
    }

    #[tokio::test]
    async fn test_run_root_rename_is_refused_in_menu() {
        let (mock, client, session) = setup();
        mock.add_listing("/snvcloud/", &[]);

        let mut prompter = ScriptedPrompter {
            selections: VecDeque::from(vec!["更多操作", "重命名/移动", "退出文件管理器"]),
            ..Default::default()
        };

        let mut nav = Navigator::new(&client, &session, ".");
        nav.run(&mut prompter).await.unwrap();

        assert!(matches!(prompter.notices.as_slice(), [Notice::Warning(_)]));
        assert!(mock.queries().iter().all(|(q, _)| q.method() != "move"));
    }
}
