//! 错误类型
//!
//! 所有门户相关操作统一返回 [`PortalError`]，调用方通过 [`PortalError::kind`]
//! 获取稳定的错误类别，通过 `Display` 获取可读信息。

use std::path::PathBuf;
use thiserror::Error;

/// 稳定的错误类别（用于测试和调用方分支判断）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unreachable,
    Auth,
    Network,
    Protocol,
    LocalIo,
    InvalidRequest,
    Cancelled,
}

/// 认证错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// 门户返回 resultcode = -1
    #[error("用户名或密码错误")]
    InvalidCredentials,

    /// 没有可用的会话
    #[error("尚未登录，缺少有效会话")]
    NoSession,
}

/// 门户客户端错误
#[derive(Debug, Error)]
pub enum PortalError {
    /// 门户主机不可达（探测失败）
    #[error("门户不可达: {host}: {reason}")]
    Unreachable { host: String, reason: String },

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// 传输层错误
    #[error("网络请求失败: {0}")]
    Network(String),

    /// 响应缺少字段或格式不符
    #[error("门户响应异常: {0}")]
    Protocol(String),

    /// 变更操作返回的 commandresponseno 不以 2 开头
    #[error("{operation} 失败 (commandresponseno={code})")]
    CommandRejected { operation: String, code: String },

    /// 非 2xx 的 HTTP 状态
    #[error("HTTP {status}: {url}")]
    HttpStatus { status: u16, url: String },

    /// 本地目标已存在
    #[error("本地路径已存在: {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("本地 IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 客户端侧校验失败，请求未发出
    #[error("无效操作: {0}")]
    InvalidRequest(String),

    #[error("操作已取消")]
    Cancelled,

    /// 备份中途失败，已创建的目录不是有效的恢复点
    #[error("备份未完成，{} 中的部分镜像不能用于恢复: {source}", .path.display())]
    BackupIncomplete {
        path: PathBuf,
        #[source]
        source: Box<PortalError>,
    },
}

impl PortalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PortalError::Unreachable { .. } => ErrorKind::Unreachable,
            PortalError::Auth(_) => ErrorKind::Auth,
            PortalError::Network(_) => ErrorKind::Network,
            PortalError::Protocol(_)
            | PortalError::CommandRejected { .. }
            | PortalError::HttpStatus { .. } => ErrorKind::Protocol,
            PortalError::DestinationExists(_) | PortalError::Io(_) => ErrorKind::LocalIo,
            PortalError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            PortalError::Cancelled => ErrorKind::Cancelled,
            PortalError::BackupIncomplete { source, .. } => source.kind(),
        }
    }

    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        PortalError::Protocol(msg.into())
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(e: reqwest::Error) -> Self {
        PortalError::Network(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;
