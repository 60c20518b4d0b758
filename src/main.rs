use clap::Parser;
use snvcloud_lib::commands::connect::{self, http_transport};
use snvcloud_lib::commands::{TerminalPrompter, Workspace};
use snvcloud_lib::config::{default_config_dir, PortalConfig};
use snvcloud_lib::core::{Notice, Prompter};
use snvcloud_lib::logging::{init_logging, persist_level};
use snvcloud_lib::PortalError;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 用户中断时的退出码
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Parser)]
#[command(name = "snvcloud", version, about = "SNV 门户文件存储的命令行客户端与备份工具")]
struct Args {
    /// 配置与日志目录
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// 覆盖配置文件中的日志级别
    #[arg(long, value_parser = ["error", "warn", "info", "debug", "trace"])]
    log_level: Option<String>,

    /// 把 --log-level 写入配置文件，作为以后的默认级别
    #[arg(long, requires = "log_level")]
    save_log_level: bool,
}

/// Ctrl+C 时取消当前操作，给清理留一点时间后以 130 退出
fn install_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
            eprintln!("\n用户中断，正在退出");
            tracing::info!("收到中断信号");
            tokio::time::sleep(Duration::from_millis(500)).await;
            std::process::exit(i32::from(EXIT_INTERRUPTED));
        }
    });
}

async fn run(config_dir: PathBuf, cancel: CancellationToken) -> anyhow::Result<()> {
    let mut prompter = TerminalPrompter::stdio();
    let mut config = PortalConfig::load(&config_dir);

    let (client, school) = connect::connect(&mut config, &mut prompter, &http_transport).await?;
    let session = connect::login(&client, &mut config, &config_dir, &mut prompter).await?;

    let work_dir = std::env::current_dir()?;
    let workspace = Workspace {
        client: &client,
        session: &session,
        school: &school,
        config: &config,
        work_dir,
        cancel,
    };
    // 取消时不做注销，直接退出
    workspace.run(&mut prompter).await?;

    connect::logout(&client, session, &mut prompter).await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let config_dir = args.config_dir.unwrap_or_else(default_config_dir);
    let _ = std::fs::create_dir_all(&config_dir);
    if args.save_log_level {
        if let Some(level) = args.log_level.as_deref() {
            if let Err(e) = persist_level(&config_dir, level) {
                eprintln!("无法保存日志级别: {}", e);
            }
        }
    }
    init_logging(&config_dir, args.log_level.as_deref());

    let cancel = CancellationToken::new();
    install_interrupt_handler(cancel.clone());

    match run(config_dir, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(PortalError::Cancelled) = e.downcast_ref::<PortalError>() {
                return ExitCode::from(EXIT_INTERRUPTED);
            }
            tracing::error!("{:#}", e);
            let mut prompter = TerminalPrompter::stdio();
            match e.downcast_ref::<PortalError>() {
                Some(portal_error) => prompter.notify(Notice::from(portal_error)),
                None => prompter.notify(Notice::Error {
                    kind: snvcloud_lib::ErrorKind::LocalIo,
                    message: e.to_string(),
                }),
            }
            ExitCode::FAILURE
        }
    }
}
