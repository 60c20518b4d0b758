use super::backup::BackupProgress;
use super::cancellable;
use crate::error::{PortalError, Result};
use crate::portal::{codec, is_dir_address, method, PortalClient, PortalQuery, Session};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 默认每个目录列完后的等待时间
pub const DEFAULT_THROTTLE_MS: u64 = 250;

/// 目录列表中的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub display_name: String,
    /// 门户原始地址（已转义）
    pub remote_address: String,
    pub is_directory: bool,
}

#[derive(Debug, Deserialize)]
struct ListingBody {
    rows: Vec<ListingRow>,
}

#[derive(Debug, Deserialize)]
struct ListingRow {
    name: String,
    url: String,
}

impl From<ListingRow> for RemoteEntry {
    fn from(row: ListingRow) -> Self {
        RemoteEntry {
            is_directory: is_dir_address(&row.url),
            display_name: row.name,
            remote_address: row.url,
        }
    }
}

/// 目录树节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    Directory(DirectoryTree),
    File(String),
}

/// 有序的远程目录树：显示名 -> 子树或文件地址，保持爬取顺序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryTree {
    entries: Vec<(String, TreeNode)>,
}

impl DirectoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入节点；同名时追加 ` (2)`、` (3)` 后缀，返回最终使用的键
    pub fn insert(&mut self, name: &str, node: TreeNode) -> String {
        let mut key = name.to_string();
        let mut n = 2;
        while self.get(&key).is_some() {
            key = format!("{} ({})", name, n);
            n += 1;
        }
        self.entries.push((key.clone(), node));
        key
    }

    pub fn with_file(mut self, name: &str, address: &str) -> Self {
        self.insert(name, TreeNode::File(address.to_string()));
        self
    }

    pub fn with_dir(mut self, name: &str, tree: DirectoryTree) -> Self {
        self.insert(name, TreeNode::Directory(tree));
        self
    }

    pub fn get(&self, name: &str) -> Option<&TreeNode> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TreeNode)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 递归统计（目录数, 文件数）
    pub fn counts(&self) -> (usize, usize) {
        self.iter().fold((0, 0), |(dirs, files), (_, node)| match node {
            TreeNode::Directory(sub) => {
                let (d, f) = sub.counts();
                (dirs + 1 + d, files + f)
            }
            TreeNode::File(_) => (dirs, files + 1),
        })
    }
}

/// 列出一个远程目录
pub async fn list_directory(
    client: &PortalClient,
    session: &Session,
    path: &str,
) -> Result<Vec<RemoteEntry>> {
    let query = PortalQuery::new(method::LIST_DIRECTORY).param("path", codec::encode(path));
    let response = client.authed_query(session, query).await?;
    if !response.is_success() {
        return Err(PortalError::HttpStatus {
            status: response.status,
            url: path.to_string(),
        });
    }

    let body: ListingBody = serde_json::from_slice(&response.body)
        .map_err(|e| PortalError::protocol(format!("目录列表无法解析 {}: {}", path, e)))?;

    body.rows
        .into_iter()
        .map(RemoteEntry::from)
        .map(|entry| {
            validate_display_name(&entry.display_name)?;
            Ok(entry)
        })
        .collect()
}

/// 显示名会变成本地目录/文件名，拒绝会越出镜像根目录的名称
fn validate_display_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(PortalError::protocol(format!("非法的条目名称: {:?}", name)));
    }
    Ok(())
}

/// 爬取配置
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// 在任意层级跳过的目录显示名
    pub exclusions: HashSet<String>,
    /// 每个目录处理完后的等待时间
    pub throttle: Duration,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            exclusions: HashSet::new(),
            throttle: Duration::from_millis(DEFAULT_THROTTLE_MS),
        }
    }
}

/// 深度优先的远程目录爬取器
pub struct DirectoryCrawler<'a> {
    client: &'a PortalClient,
    session: &'a Session,
    config: CrawlConfig,
    cancel: CancellationToken,
    progress_tx: Option<mpsc::Sender<BackupProgress>>,
}

impl<'a> DirectoryCrawler<'a> {
    pub fn new(client: &'a PortalClient, session: &'a Session, config: CrawlConfig) -> Self {
        Self {
            client,
            session,
            config,
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

    /// 爬取 `root_path` 下的完整目录树，任何一次列表失败都会中止整个爬取
    pub async fn crawl(&self, root_path: &str) -> Result<DirectoryTree> {
        info!("开始爬取: {}", root_path);
        let tree = self.crawl_dir(root_path.to_string()).await?;
        let (dirs, files) = tree.counts();
        info!("爬取完成: {} 个目录, {} 个文件", dirs, files);
        Ok(tree)
    }

    fn crawl_dir(&self, path: String) -> BoxFuture<'_, Result<DirectoryTree>> {
        async move {
            if let Some(tx) = &self.progress_tx {
                let _ = tx.send(BackupProgress::Crawling { path: path.clone() }).await;
            }
            debug!("列出目录: {}", path);

            let entries = cancellable(
                &self.cancel,
                list_directory(self.client, self.session, &path),
            )
            .await?;

            let mut tree = DirectoryTree::new();
            for entry in entries {
                let node = if entry.is_directory {
                    if self.config.exclusions.contains(&entry.display_name) {
                        debug!("排除目录: {}", entry.remote_address);
                        continue;
                    }
                    TreeNode::Directory(self.crawl_dir(entry.remote_address.clone()).await?)
                } else {
                    TreeNode::File(entry.remote_address.clone())
                };

                let key = tree.insert(&entry.display_name, node);
                if key != entry.display_name {
                    warn!("{} 中存在重名条目 {:?}，重命名为 {:?}", path, entry.display_name, key);
                }
            }

            if !self.config.throttle.is_zero() {
                cancellable(&self.cancel, async {
                    tokio::time::sleep(self.config.throttle).await;
                    Ok(())
                })
                .await?;
            }

            Ok(tree)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::portal::testing::MockTransport;
    use std::sync::Arc;

    fn setup() -> (Arc<MockTransport>, PortalClient, Session) {
        let mock = Arc::new(MockTransport::new());
        let client = PortalClient::new(mock.clone());
        let session = Session::restore("S1", "a", "b").unwrap();
        (mock, client, session)
    }

    fn config(exclusions: &[&str]) -> CrawlConfig {
        CrawlConfig {
            exclusions: exclusions.iter().map(|s| s.to_string()).collect(),
            throttle: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_crawl_builds_ordered_tree() {
        let (mock, client, session) = setup();
        mock.add_listing(
            "/snvcloud/",
            &[("A", "/snvcloud/A/"), ("B.txt", "/snvcloud/B.txt")],
        );
        mock.add_listing("/snvcloud/A/", &[("f1.txt", "/snvcloud/A/f1.txt")]);

        let tree = DirectoryCrawler::new(&client, &session, config(&[]))
            .crawl("/snvcloud/")
            .await
            .unwrap();

        let expected = DirectoryTree::new()
            .with_dir("A", DirectoryTree::new().with_file("f1.txt", "/snvcloud/A/f1.txt"))
            .with_file("B.txt", "/snvcloud/B.txt");
        assert_eq!(tree, expected);
        assert_eq!(mock.listed_paths(), vec!["/snvcloud/", "/snvcloud/A/"]);
    }

    #[tokio::test]
    async fn test_excluded_directory_is_never_listed() {
        let (mock, client, session) = setup();
        mock.add_listing(
            "/snvcloud/",
            &[("Trash", "/snvcloud/Trash/"), ("Home", "/snvcloud/Home/")],
        );
        mock.add_listing(
            "/snvcloud/Home/",
            &[("Trash", "/snvcloud/Home/Trash/"), ("a.txt", "/snvcloud/Home/a.txt")],
        );

        let tree = DirectoryCrawler::new(&client, &session, config(&["Trash"]))
            .crawl("/snvcloud/")
            .await
            .unwrap();

        assert!(tree.get("Trash").is_none());
        let Some(TreeNode::Directory(home)) = tree.get("Home") else {
            panic!("Home missing");
        };
        assert!(home.get("Trash").is_none());
        assert!(mock.listed_paths().iter().all(|p| !p.contains("Trash")));
    }

    #[tokio::test]
    async fn test_excluded_name_only_applies_to_directories() {
        let (mock, client, session) = setup();
        mock.add_listing("/snvcloud/", &[("Trash", "/snvcloud/Trash")]);
        let tree = DirectoryCrawler::new(&client, &session, config(&["Trash"]))
            .crawl("/snvcloud/")
            .await
            .unwrap();
        assert_eq!(tree.get("Trash"), Some(&TreeNode::File("/snvcloud/Trash".into())));
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_crawl() {
        let (mock, client, session) = setup();
        mock.add_listing(
            "/snvcloud/",
            &[("A", "/snvcloud/A/"), ("B", "/snvcloud/B/")],
        );
        mock.add_listing("/snvcloud/A/", &[]);
        mock.fail_listing("/snvcloud/B/");

        let err = DirectoryCrawler::new(&client, &session, config(&[]))
            .crawl("/snvcloud/")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn test_duplicate_names_are_disambiguated() {
        let (mock, client, session) = setup();
        mock.add_listing(
            "/snvcloud/",
            &[
                ("doc.txt", "/snvcloud/doc.txt"),
                ("doc.txt", "/snvcloud/doc.txt;1"),
                ("doc.txt", "/snvcloud/doc.txt;2"),
            ],
        );
        let tree = DirectoryCrawler::new(&client, &session, config(&[]))
            .crawl("/snvcloud/")
            .await
            .unwrap();
        let keys: Vec<_> = tree.keys().collect();
        assert_eq!(keys, vec!["doc.txt", "doc.txt (2)", "doc.txt (3)"]);
    }

    #[tokio::test]
    async fn test_listing_path_is_encoded() {
        let (mock, client, session) = setup();
        mock.add_listing("/snvcloud/Sch*uuml;ler/", &[]);
        DirectoryCrawler::new(&client, &session, config(&[]))
            .crawl("/snvcloud/Schüler/")
            .await
            .unwrap();
        assert_eq!(mock.listed_paths(), vec!["/snvcloud/Sch*uuml;ler/"]);
    }

    #[tokio::test]
    async fn test_rejects_traversal_names() {
        let (mock, client, session) = setup();
        mock.add_listing("/snvcloud/", &[("..", "/snvcloud/../")]);
        let err = DirectoryCrawler::new(&client, &session, config(&[]))
            .crawl("/snvcloud/")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_applies_per_directory() {
        let (mock, client, session) = setup();
        mock.add_listing("/snvcloud/", &[("A", "/snvcloud/A/")]);
        mock.add_listing("/snvcloud/A/", &[]);

        let crawler = DirectoryCrawler::new(
            &client,
            &session,
            CrawlConfig {
                exclusions: HashSet::new(),
                throttle: Duration::from_millis(250),
            },
        );
        let start = tokio::time::Instant::now();
        crawler.crawl("/snvcloud/").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_cancelled_crawl() {
        let (mock, client, session) = setup();
        mock.add_listing("/snvcloud/", &[]);
        let token = CancellationToken::new();
        token.cancel();
        let err = DirectoryCrawler::new(&client, &session, config(&[]))
            .with_cancel(token)
            .crawl("/snvcloud/")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(mock.listed_paths().is_empty());
    }
}
