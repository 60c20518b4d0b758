pub mod codec;
pub mod http;
pub mod info;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

use crate::error::{PortalError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

pub use http::HttpTransport;
pub use info::{AccountInfo, SchoolInfo};
pub use session::{Session, SessionManager, UploadDirectives};

// ============ 公共常量 ============

/// 查询接口路径
pub const ENDPOINT_PATH: &str = "/snvmodules";
/// 存储根地址
pub const DEFAULT_ROOT: &str = "/snvcloud/";
/// 非 IO 操作超时（秒）
pub const OP_TIMEOUT_SECS: u64 = 60;
/// 建立连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// 门户查询操作名（query 参数 `method` 的取值）
pub mod method {
    pub const AUTH: &str = "auth";
    pub const CHECK_SESSION: &str = "checksession";
    pub const LIST_DIRECTORY: &str = "getdirectoryentry";
    pub const MOVE: &str = "move";
    pub const DELETE: &str = "delete";
    pub const CREATE_DIRECTORY: &str = "mkcol";
    pub const LOGOUT: &str = "logout";
    pub const STORED_PROC: &str = "customstoredproc";
}

/// 一次对查询接口的 GET 请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalQuery {
    pub params: Vec<(String, String)>,
}

impl PortalQuery {
    pub fn new(method: &str) -> Self {
        Self {
            params: vec![("method".to_string(), method.to_string())],
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    pub fn method(&self) -> &str {
        self.get("method").unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// 门户响应：结果字段大多放在响应头里，目录列表放在 body 里
#[derive(Debug, Clone, Default)]
pub struct PortalResponse {
    pub status: u16,
    /// 头名统一小写，同名头保留全部取值
    pub headers: HashMap<String, Vec<String>>,
    pub body: Bytes,
}

impl PortalResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn header_all(&self, name: &str) -> &[String] {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn require_header(&self, name: &str) -> Result<&str> {
        self.header(name)
            .ok_or_else(|| PortalError::protocol(format!("响应缺少字段 {}", name)))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 下载流
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// 上传请求
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// 已转义的目标地址
    pub address: String,
    /// 扩展后的 Cookie 头
    pub cookie: String,
    pub body: Vec<u8>,
}

/// 门户传输抽象接口
#[async_trait]
pub trait PortalTransport: Send + Sync {
    /// 对查询接口发起 GET，`cookie` 为空表示未认证请求
    async fn query(&self, query: &PortalQuery, cookie: Option<&str>) -> Result<PortalResponse>;

    /// 流式 GET 一个文件地址
    async fn fetch(&self, address: &str, cookie: &str, session_id: &str) -> Result<ByteStream>;

    /// PUT 整个文件
    async fn put(&self, request: UploadRequest) -> Result<PortalResponse>;

    /// 获取门户名称（用于日志）
    fn name(&self) -> &str;
}

/// 共享的门户客户端：传输层 + 根地址
#[derive(Clone)]
pub struct PortalClient {
    transport: Arc<dyn PortalTransport>,
    root: String,
}

impl PortalClient {
    pub fn new(transport: Arc<dyn PortalTransport>) -> Self {
        Self::with_root(transport, DEFAULT_ROOT)
    }

    pub fn with_root(transport: Arc<dyn PortalTransport>, root: &str) -> Self {
        Self {
            transport,
            root: ensure_dir_suffix(root),
        }
    }

    pub fn transport(&self) -> &dyn PortalTransport {
        self.transport.as_ref()
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// 带会话 Cookie 的查询
    pub async fn authed_query(&self, session: &Session, query: PortalQuery) -> Result<PortalResponse> {
        let cookie = session.cookie_header()?;
        let query = query.param("sessionid", session.id());
        tracing::debug!("{} -> {}", self.transport.name(), query.method());
        self.transport.query(&query, Some(&cookie)).await
    }

    /// 执行变更操作并检查 commandresponseno
    pub async fn command(&self, session: &Session, query: PortalQuery) -> Result<()> {
        let operation = query.method().to_string();
        let response = self.authed_query(session, query).await?;
        check_command(&operation, &response)
    }

    /// 把地址转为去掉存储根的展示路径
    pub fn display_path(&self, address: &str) -> String {
        let decoded = codec::decode(address);
        let root = self.root.trim_end_matches('/');
        match decoded.strip_prefix(root) {
            Some(rest) if rest.is_empty() => "/".to_string(),
            Some(rest) if rest.starts_with('/') => rest.to_string(),
            _ => decoded,
        }
    }

    /// 把用户输入的绝对展示路径转为门户地址
    pub fn address_for(&self, display: &str) -> Result<String> {
        if !display.starts_with('/') {
            return Err(PortalError::InvalidRequest(format!(
                "路径必须以 '/' 开头: {}",
                display
            )));
        }
        let root = self.root.trim_end_matches('/');
        // 只有整段匹配存储根时才剥离，"/snvcloud2/a" 仍是根下的路径
        let relative = match display.strip_prefix(root) {
            Some("") => "/",
            Some(rest) if rest.starts_with('/') => rest,
            _ => display,
        };
        Ok(codec::encode(&format!("{}{}", root, relative)))
    }

    pub fn is_root(&self, address: &str) -> bool {
        ensure_dir_suffix(address) == self.root
    }
}

/// commandresponseno 首位为 2 才表示成功
pub fn check_command(operation: &str, response: &PortalResponse) -> Result<()> {
    let code = response.require_header("commandresponseno")?;
    if code.starts_with('2') {
        Ok(())
    } else {
        Err(PortalError::CommandRejected {
            operation: operation.to_string(),
            code: code.to_string(),
        })
    }
}

/// 目录地址以 `/` 结尾
pub fn is_dir_address(address: &str) -> bool {
    address.ends_with('/')
}

pub fn ensure_dir_suffix(address: &str) -> String {
    if address.ends_with('/') {
        address.to_string()
    } else {
        format!("{}/", address)
    }
}

/// 上一级目录地址，不会越过 `root`
pub fn parent_address(address: &str, root: &str) -> String {
    let trimmed = address.trim_end_matches('/');
    let parent = match trimmed.rfind('/') {
        Some(idx) => &trimmed[..=idx],
        None => "/",
    };
    if parent.len() < root.len() {
        root.to_string()
    } else {
        parent.to_string()
    }
}

/// 地址最后一段（文件名或目录名）
pub fn last_segment(address: &str) -> &str {
    address
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}
