//! 测试用的脚本化门户：记录所有请求，按预设回放响应

use super::{method, ByteStream, PortalQuery, PortalResponse, PortalTransport, UploadRequest};
use crate::error::{PortalError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

/// 构造只带响应头的 200 响应
pub fn headers(pairs: &[(&str, &str)]) -> PortalResponse {
    let mut resp = PortalResponse {
        status: 200,
        ..Default::default()
    };
    for (k, v) in pairs {
        resp.headers
            .entry(k.to_ascii_lowercase())
            .or_default()
            .push(v.to_string());
    }
    resp
}

/// 目录列表 body
pub fn listing(rows: &[(&str, &str)]) -> PortalResponse {
    let rows: Vec<_> = rows
        .iter()
        .map(|(name, url)| {
            serde_json::json!({
                "name": name,
                "url": url,
                "type": if url.ends_with('/') { "" } else { "file" },
            })
        })
        .collect();
    PortalResponse {
        status: 200,
        body: Bytes::from(serde_json::json!({ "rows": rows }).to_string()),
        ..Default::default()
    }
}

enum FileScript {
    Chunks(Vec<Bytes>),
    FailAfter(Vec<Bytes>),
}

#[derive(Default)]
pub struct MockTransport {
    queue: Mutex<VecDeque<Result<PortalResponse>>>,
    listings: Mutex<HashMap<String, PortalResponse>>,
    failing_listings: Mutex<HashSet<String>>,
    files: Mutex<HashMap<String, FileScript>>,
    put_status: Mutex<Option<u16>>,
    queries: Mutex<Vec<(PortalQuery, Option<String>)>>,
    fetches: Mutex<Vec<String>>,
    puts: Mutex<Vec<UploadRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 下一个非目录列表查询的响应
    pub fn push_query(&self, response: PortalResponse) {
        self.queue.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_query_error(&self, error: PortalError) {
        self.queue.lock().unwrap().push_back(Err(error));
    }

    /// 为某个（已转义的）目录地址注册列表
    pub fn add_listing(&self, path: &str, rows: &[(&str, &str)]) {
        self.listings
            .lock()
            .unwrap()
            .insert(path.to_string(), listing(rows));
    }

    pub fn fail_listing(&self, path: &str) {
        self.failing_listings.lock().unwrap().insert(path.to_string());
    }

    pub fn add_file(&self, address: &str, chunks: &[&[u8]]) {
        let chunks = chunks.iter().map(|c| Bytes::copy_from_slice(c)).collect();
        self.files
            .lock()
            .unwrap()
            .insert(address.to_string(), FileScript::Chunks(chunks));
    }

    /// 先吐出若干块，然后流报错
    pub fn add_broken_file(&self, address: &str, chunks: &[&[u8]]) {
        let chunks = chunks.iter().map(|c| Bytes::copy_from_slice(c)).collect();
        self.files
            .lock()
            .unwrap()
            .insert(address.to_string(), FileScript::FailAfter(chunks));
    }

    pub fn set_put_status(&self, status: u16) {
        *self.put_status.lock().unwrap() = Some(status);
    }

    pub fn queries(&self) -> Vec<(PortalQuery, Option<String>)> {
        self.queries.lock().unwrap().clone()
    }

    /// 按顺序列出所有目录列表请求的 path 参数
    pub fn listed_paths(&self) -> Vec<String> {
        self.queries()
            .into_iter()
            .filter(|(q, _)| q.method() == method::LIST_DIRECTORY)
            .filter_map(|(q, _)| q.get("path").map(str::to_string))
            .collect()
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn puts(&self) -> Vec<UploadRequest> {
        self.puts.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.queries.lock().unwrap().len()
            + self.fetches.lock().unwrap().len()
            + self.puts.lock().unwrap().len()
    }
}

#[async_trait]
impl PortalTransport for MockTransport {
    async fn query(&self, query: &PortalQuery, cookie: Option<&str>) -> Result<PortalResponse> {
        self.queries
            .lock()
            .unwrap()
            .push((query.clone(), cookie.map(str::to_string)));

        if query.method() == method::LIST_DIRECTORY {
            let path = query.get("path").unwrap_or_default();
            if self.failing_listings.lock().unwrap().contains(path) {
                return Err(PortalError::Network(format!("listing {} failed", path)));
            }
            if let Some(resp) = self.listings.lock().unwrap().get(path) {
                return Ok(resp.clone());
            }
        }

        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PortalError::Network(format!("no scripted response for {}", query.method()))))
    }

    async fn fetch(&self, address: &str, _cookie: &str, _session_id: &str) -> Result<ByteStream> {
        self.fetches.lock().unwrap().push(address.to_string());
        let items: Vec<Result<Bytes>> = match self.files.lock().unwrap().get(address) {
            Some(FileScript::Chunks(chunks)) => chunks.iter().cloned().map(Ok).collect(),
            Some(FileScript::FailAfter(chunks)) => {
                let mut items: Vec<Result<Bytes>> = chunks.iter().cloned().map(Ok).collect();
                items.push(Err(PortalError::Network("stream reset".into())));
                items
            }
            None => {
                return Err(PortalError::HttpStatus {
                    status: 404,
                    url: address.to_string(),
                })
            }
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }

    async fn put(&self, request: UploadRequest) -> Result<PortalResponse> {
        self.puts.lock().unwrap().push(request);
        let status = self.put_status.lock().unwrap().unwrap_or(201);
        Ok(PortalResponse {
            status,
            ..Default::default()
        })
    }

    fn name(&self) -> &str {
        "mock://portal"
    }
}
