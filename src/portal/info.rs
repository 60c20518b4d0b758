//! 学校与账号信息（展示用元数据，均经过 HTML 实体解码）

use super::codec::html_decode;
use super::{method, PortalClient, PortalResponse, Session};
use crate::error::Result;
use serde::Serialize;

const ROOM_ALLOCATION_PROC: &str = "sp_webservices_GetRoomAllocationInfo";

/// checksession 响应头里的学校信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolInfo {
    pub name: String,
    pub postcode: String,
    pub city: String,
    pub street: String,
}

impl SchoolInfo {
    pub fn from_response(response: &PortalResponse) -> Result<Self> {
        let name = html_decode(response.require_header("lnname")?);
        // lnplzort 形如 "12345-Musterstadt"，城市名本身也可能带 '-'
        let location = html_decode(response.header("lnplzort").unwrap_or_default());
        let (postcode, city) = location
            .split_once('-')
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .unwrap_or_else(|| (String::new(), location.clone()));
        let street = html_decode(response.header("lnstrasse").unwrap_or_default());
        Ok(Self {
            name,
            postcode,
            city,
            street,
        })
    }
}

/// 当前账号/工作站信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub school_custom_name: Option<String>,
    pub room: Option<String>,
    pub workspace: Option<String>,
    pub group_assigned_to_room: Option<String>,
    pub account: Option<String>,
    pub is_teacher: Option<String>,
    pub internal_ip: Option<String>,
}

impl AccountInfo {
    fn from_response(response: &PortalResponse) -> Self {
        let field = |name: &str| {
            response
                .header(name)
                .filter(|v| !v.is_empty())
                .map(html_decode)
        };
        Self {
            school_custom_name: field("schule"),
            room: field("room"),
            workspace: field("wsid"),
            group_assigned_to_room: field("groupassignedtoroom"),
            account: field("account"),
            is_teacher: field("isteacher"),
            internal_ip: field("internalip"),
        }
    }
}

/// 探测门户并读取学校信息
pub async fn school_info(client: &PortalClient) -> Result<SchoolInfo> {
    let response = super::SessionManager::new(client).probe().await?;
    SchoolInfo::from_response(&response)
}

pub async fn account_info(client: &PortalClient, session: &Session) -> Result<AccountInfo> {
    let query = super::PortalQuery::new(method::STORED_PROC).param("procname", ROOM_ALLOCATION_PROC);
    let response = client.authed_query(session, query).await?;
    Ok(AccountInfo::from_response(&response))
}
