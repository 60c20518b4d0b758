//! 会话管理：登录握手、Cookie 提取、认证头构造、注销

use super::{method, PortalClient, PortalQuery, PortalTransport};
use crate::error::{AuthError, PortalError, Result};
use tracing::{debug, info, warn};

pub const PORTAL_COOKIE: &str = "SNVWebPortalSessionID";
pub const HASH_COOKIE: &str = "HASH_SNVWebPortalSessionID";

/// 登录失败时 resultcode 的取值
const RESULT_INVALID_CREDENTIALS: &str = "-1";
/// 注销成功时 resultcode 的取值
const RESULT_LOGOUT_OK: &str = "100";

/// 已认证会话
///
/// 登录成功后创建，只在进程内存中存在；注销会消耗掉它。不实现 `Clone`，
/// 同一份 Cookie 不会被复制成两个会话。
#[derive(Debug, PartialEq, Eq)]
pub struct Session {
    session_id: String,
    portal_cookie: String,
    hash_cookie: String,
}

impl Session {
    /// 从已知的三元组恢复会话
    pub fn restore(session_id: &str, portal_cookie: &str, hash_cookie: &str) -> Result<Self> {
        if session_id.is_empty() || portal_cookie.is_empty() || hash_cookie.is_empty() {
            return Err(AuthError::NoSession.into());
        }
        Ok(Self {
            session_id: session_id.to_string(),
            portal_cookie: portal_cookie.to_string(),
            hash_cookie: hash_cookie.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.session_id
    }

    /// 渲染 Cookie 三元组 `k=v;k=v;k=v;`
    pub fn cookie_header(&self) -> Result<String> {
        if self.session_id.is_empty() {
            return Err(AuthError::NoSession.into());
        }
        Ok(format!(
            "sessionid={};{}={};{}={};",
            self.session_id, PORTAL_COOKIE, self.portal_cookie, HASH_COOKIE, self.hash_cookie
        ))
    }

    /// 上传请求使用的扩展 Cookie 头
    pub fn upload_cookie_header(&self, directives: &UploadDirectives) -> Result<String> {
        Ok(format!(
            "{} uploadurl={}; seqid={}; uploadfilename={};",
            self.cookie_header()?,
            directives.upload_url,
            directives.seq_id,
            directives.file_name
        ))
    }
}

/// 上传附加指令，由调用处根据实际目标计算
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadDirectives {
    /// 目标目录地址
    pub upload_url: String,
    pub seq_id: String,
    pub file_name: String,
}

impl UploadDirectives {
    /// 从目标文件地址推导
    pub fn for_target(address: &str) -> Self {
        let (dir, name) = match address.rfind('/') {
            Some(idx) => (&address[..=idx], &address[idx + 1..]),
            None => ("/", address),
        };
        Self {
            upload_url: dir.to_string(),
            seq_id: String::new(),
            file_name: name.to_string(),
        }
    }
}

/// 会话管理器
pub struct SessionManager<'a> {
    client: &'a PortalClient,
}

impl<'a> SessionManager<'a> {
    pub fn new(client: &'a PortalClient) -> Self {
        Self { client }
    }

    fn transport(&self) -> &dyn PortalTransport {
        self.client.transport()
    }

    /// 探测门户是否响应（未认证）
    ///
    /// 响应头必须回显 `method: checksession`，否则视为不是 SNV 门户。
    pub async fn probe(&self) -> Result<super::PortalResponse> {
        let query = PortalQuery::new(method::CHECK_SESSION);
        let host = self.transport().name().to_string();
        match self.transport().query(&query, None).await {
            Ok(resp) if resp.is_success() && resp.header("method") == Some(method::CHECK_SESSION) => {
                Ok(resp)
            }
            Ok(resp) if resp.is_success() => Err(PortalError::Unreachable {
                host,
                reason: "响应未回显 checksession，可能不是 SNV 门户".to_string(),
            }),
            Ok(resp) => Err(PortalError::Unreachable {
                host,
                reason: format!("HTTP {}", resp.status),
            }),
            Err(e) => Err(PortalError::Unreachable {
                host,
                reason: e.to_string(),
            }),
        }
    }

    /// 登录，resultcode = -1 时返回 `AuthError::InvalidCredentials`
    ///
    /// 不在内部重试，由调用方决定是否重新询问凭证。
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let query = PortalQuery::new(method::AUTH)
            .param("username", username)
            .param("password", password);
        let response = self.transport().query(&query, None).await?;

        if response.header("resultcode") == Some(RESULT_INVALID_CREDENTIALS) {
            warn!("登录被拒绝: {}", username);
            return Err(AuthError::InvalidCredentials.into());
        }

        let session_id = response.require_header("sessionid")?.to_string();
        let (portal_cookie, hash_cookie) = extract_cookies(response.header_all("set-cookie"))?;

        info!("登录成功: {}", username);
        Ok(Session {
            session_id,
            portal_cookie,
            hash_cookie,
        })
    }

    /// 注销，resultcode = 100 表示成功
    pub async fn logout(&self, session: Session) -> Result<()> {
        let response = self
            .client
            .authed_query(&session, PortalQuery::new(method::LOGOUT))
            .await?;
        match response.header("resultcode") {
            Some(RESULT_LOGOUT_OK) => {
                info!("已注销会话");
                Ok(())
            }
            other => Err(PortalError::protocol(format!(
                "注销失败 (resultcode={})",
                other.unwrap_or("<missing>")
            ))),
        }
    }
}

/// 从 set-cookie 列表中按名称子串提取两个 Cookie 值
///
/// HASH 名称包含普通名称，必须先匹配。
fn extract_cookies(directives: &[String]) -> Result<(String, String)> {
    let mut portal = None;
    let mut hash = None;
    for directive in directives {
        let slot = if directive.contains(HASH_COOKIE) {
            &mut hash
        } else if directive.contains(PORTAL_COOKIE) {
            &mut portal
        } else {
            debug!("忽略 Cookie 指令");
            continue;
        };
        *slot = Some(cookie_value(directive).to_string());
    }
    match (portal, hash) {
        (Some(p), Some(h)) => Ok((p, h)),
        _ => Err(PortalError::protocol("登录响应缺少会话 Cookie")),
    }
}

/// `name=value; Path=/` -> `value`
fn cookie_value(directive: &str) -> &str {
    let pair = directive.split(';').next().unwrap_or_default();
    pair.split_once('=').map(|(_, v)| v).unwrap_or_default()
}
