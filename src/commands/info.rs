//! 学校与账号信息展示

use super::connect::describe_school;
use crate::core::{Notice, Prompter};
use crate::error::Result;
use crate::portal::info::account_info;
use crate::portal::{AccountInfo, PortalClient, SchoolInfo, Session};

pub fn describe_account(account: &AccountInfo) -> Vec<String> {
    let fields = [
        ("学校", &account.school_custom_name),
        ("账号", &account.account),
        ("教师", &account.is_teacher),
        ("房间", &account.room),
        ("工作站", &account.workspace),
        ("房间分组", &account.group_assigned_to_room),
        ("内网 IP", &account.internal_ip),
    ];
    fields
        .iter()
        .filter_map(|(label, value)| value.as_ref().map(|v| format!("{}: {}", label, v)))
        .collect()
}

pub async fn show_info(
    client: &PortalClient,
    session: &Session,
    school: &SchoolInfo,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    let account = account_info(client, session).await?;
    prompter.notify(Notice::Info(format!("学校: {}", describe_school(school))));
    for line in describe_account(&account) {
        prompter.notify(Notice::Info(line));
    }
    Ok(())
}
