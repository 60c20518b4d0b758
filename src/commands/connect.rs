//! 连接门户：地址探测、登录、注销

use crate::config::{normalize_host, PortalConfig};
use crate::core::{Notice, Prompter};
use crate::error::{AuthError, ErrorKind, PortalError, Result};
use crate::portal::info::school_info;
use crate::portal::{HttpTransport, PortalClient, PortalTransport, SchoolInfo, Session, SessionManager};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 凭证错误时最多重新询问的次数
pub const MAX_LOGIN_ATTEMPTS: usize = 3;

/// 按主机名创建传输层
pub type TransportFactory = dyn Fn(&str, Duration) -> Result<Arc<dyn PortalTransport>>;

pub fn http_transport(host: &str, timeout: Duration) -> Result<Arc<dyn PortalTransport>> {
    Ok(Arc::new(HttpTransport::new(host, timeout)?))
}

pub fn describe_school(school: &SchoolInfo) -> String {
    let mut line = school.name.clone();
    if !school.street.is_empty() {
        line.push_str(&format!(", {}", school.street));
    }
    if !school.postcode.is_empty() || !school.city.is_empty() {
        line.push_str(&format!(", {} {}", school.postcode, school.city));
    }
    line.trim_end().to_string()
}

/// 确认门户可达并读取学校信息；不可达时重新询问地址，直到用户取消
pub async fn connect(
    config: &mut PortalConfig,
    prompter: &mut dyn Prompter,
    make_transport: &TransportFactory,
) -> Result<(PortalClient, SchoolInfo)> {
    loop {
        if config.snv_url.is_empty() {
            let validate = |value: &str| {
                if normalize_host(value).is_empty() {
                    Err("地址不能为空".to_string())
                } else {
                    Ok(())
                }
            };
            let Some(url) = prompter.text("输入学校 SNV 门户地址", &validate) else {
                return Err(PortalError::InvalidRequest("未输入门户地址".to_string()));
            };
            config.snv_url = normalize_host(&url);
        }

        let transport = make_transport(&config.snv_url, config.request_timeout())?;
        let client = PortalClient::with_root(transport, &config.root_path);
        match school_info(&client).await {
            Ok(school) => {
                info!("门户可达: {}", config.snv_url);
                prompter.notify(Notice::Info(format!("学校: {}", describe_school(&school))));
                return Ok((client, school));
            }
            Err(e) if e.kind() == ErrorKind::Unreachable => {
                warn!("门户不可达: {}", e);
                prompter.notify(Notice::from(&e));
                prompter.notify(Notice::Warning("请检查门户地址".to_string()));
                config.snv_url.clear();
            }
            Err(e) => return Err(e),
        }
    }
}

/// 登录；凭证被拒绝时重新询问，最多 [`MAX_LOGIN_ATTEMPTS`] 次
///
/// 交互输入的凭证在登录成功后可选择写入配置文件。
pub async fn login(
    client: &PortalClient,
    config: &mut PortalConfig,
    config_dir: &Path,
    prompter: &mut dyn Prompter,
) -> Result<Session> {
    let manager = SessionManager::new(client);
    let mut entered = false;
    let mut last_error = PortalError::Auth(AuthError::NoSession);

    for _ in 0..MAX_LOGIN_ATTEMPTS {
        if !config.has_credentials() {
            let username = prompter.text("用户名", &|_| Ok(()));
            let password = username.as_ref().and_then(|_| prompter.secret("密码"));
            let (Some(username), Some(password)) = (username, password) else {
                return Err(PortalError::InvalidRequest("未输入凭证".to_string()));
            };
            config.username = username;
            config.password = password;
            entered = true;
        }

        match manager.login(&config.username, &config.password).await {
            Ok(session) => {
                prompter.notify(Notice::Success(format!("已登录: {}", config.username)));
                if entered && prompter.confirm("保存凭证以便下次使用?") {
                    config.save(config_dir)?;
                    info!("凭证已保存到 {:?}", config_dir);
                }
                return Ok(session);
            }
            Err(e @ PortalError::Auth(AuthError::InvalidCredentials)) => {
                prompter.notify(Notice::from(&e));
                config.username.clear();
                config.password.clear();
                last_error = e;
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_error)
}

/// 注销并报告结果，失败不影响退出
pub async fn logout(client: &PortalClient, session: Session, prompter: &mut dyn Prompter) {
    match SessionManager::new(client).logout(session).await {
        Ok(()) => prompter.notify(Notice::Success("已注销".to_string())),
        Err(e) => {
            warn!("注销失败: {}", e);
            prompter.notify(Notice::from(&e));
        }
    }
}
