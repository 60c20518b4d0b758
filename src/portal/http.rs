use super::{
    ByteStream, PortalQuery, PortalResponse, PortalTransport, UploadRequest, CONNECT_TIMEOUT_SECS,
    ENDPOINT_PATH,
};
use crate::error::{PortalError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE, COOKIE};
use std::collections::HashMap;
use std::time::Duration;

/// 基于 reqwest 的 HTTPS 传输
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    op_timeout: Duration,
    name: String,
}

impl HttpTransport {
    /// `host` 为不带协议的主机名（例如 `portal.schule.de`）
    pub fn new(host: &str, op_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        let base_url = format!("https://{}", host.trim_end_matches('/'));
        Ok(Self {
            client,
            name: base_url.clone(),
            base_url,
            op_timeout,
        })
    }

    fn url_for(&self, address: &str) -> String {
        format!("{}{}", self.base_url, escape_address(address))
    }
}

fn collect_headers(map: &HeaderMap) -> HashMap<String, Vec<String>> {
    let mut headers: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in map {
        // 非 ASCII 的头值按原样丢弃
        if let Ok(v) = value.to_str() {
            headers
                .entry(name.as_str().to_ascii_lowercase())
                .or_default()
                .push(v.to_string());
        }
    }
    headers
}

#[async_trait]
impl PortalTransport for HttpTransport {
    async fn query(&self, query: &PortalQuery, cookie: Option<&str>) -> Result<PortalResponse> {
        let mut request = self
            .client
            .get(format!("{}{}", self.base_url, ENDPOINT_PATH))
            .query(&query.params)
            .timeout(self.op_timeout);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response.bytes().await?;

        Ok(PortalResponse {
            status,
            headers,
            body,
        })
    }

    async fn fetch(&self, address: &str, cookie: &str, session_id: &str) -> Result<ByteStream> {
        let url = self.url_for(address);
        let response = self
            .client
            .get(&url)
            .header(COOKIE, cookie)
            .query(&[("sessionid", session_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PortalError::HttpStatus {
                status: response.status().as_u16(),
                url,
            });
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(PortalError::from));
        Ok(Box::pin(stream))
    }

    async fn put(&self, request: UploadRequest) -> Result<PortalResponse> {
        let url = self.url_for(&request.address);
        let length = request.body.len();
        let response = self
            .client
            .put(&url)
            .header(COOKIE, request.cookie)
            .header(CONTENT_LENGTH, length)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(request.body)
            .send()
            .await?;

        Ok(PortalResponse {
            status: response.status().as_u16(),
            headers: collect_headers(response.headers()),
            body: response.bytes().await?,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 百分号转义地址中的不安全字符，保留 `/` 以及门户转义 token 用到的 `*` 和 `;`
pub fn escape_address(address: &str) -> String {
    let mut out = String::with_capacity(address.len());
    let mut buf = [0u8; 4];
    for c in address.chars() {
        if c.is_ascii_alphanumeric() || "/-._~*;!$&'()+,=:@".contains(c) {
            out.push(c);
        } else {
            out.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        }
    }
    out
}
