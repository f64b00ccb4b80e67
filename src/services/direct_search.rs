//! 直查服务 - 业务能力层
//!
//! 站点提供一个按模板拼接的案件信息地址，命中时比表单搜索快得多。
//! 只在浏览器搜索之前尝试一次。

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA};
use reqwest::{Client, StatusCode};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::config::Config;
use crate::error::AppResult;
use crate::models::{CaseQuery, CaseResult};
use crate::services::result_parser::ResultParser;

/// 响应中出现该标记才视为命中
pub const CASE_DETAILS_MARKER: &str = "Case Details";

/// 直查服务
pub struct DirectSearch {
    client: Client,
    direct_url: String,
    max_retries: usize,
    retry_delay: Duration,
    parser: Arc<ResultParser>,
}

impl DirectSearch {
    /// 创建直查服务
    ///
    /// # 参数
    /// - `config`: 程序配置（地址、超时、重试）
    /// - `parser`: 与浏览器路径共用的结果解析器
    pub fn new(config: &Config, parser: Arc<ResultParser>) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            direct_url: config.direct_url(),
            max_retries: config.max_retries.max(1),
            retry_delay: config.retry_delay(),
            parser,
        })
    }

    /// 直查地址：`{base}{direct_path}?case_no={简码}+{案号}/{年份}`
    ///
    /// 案号按表单规则编码，`+` 和 `/` 分隔符保持原样
    pub fn lookup_url(&self, query: &CaseQuery) -> String {
        let number: String = form_urlencoded::byte_serialize(query.case_number.as_bytes()).collect();
        format!(
            "{}?case_no={}+{}/{}",
            self.direct_url,
            query.case_type.short_code(),
            number,
            query.filing_year
        )
    }

    /// 尝试直查
    ///
    /// # 返回
    /// - `Ok(Some(result))`: 响应含有案件详情标记，返回解析结果（可能是失败信封）
    /// - `Ok(None)`: 响应不含标记
    /// - `Err`: 重试后仍然网络失败
    pub async fn lookup(&self, query: &CaseQuery) -> AppResult<Option<CaseResult>> {
        let url = self.lookup_url(query);
        info!("[案件 {}] 尝试直查: {}", query, url);

        let Some(body) = self.fetch_with_retry(&url).await? else {
            return Ok(None);
        };

        if !body.contains(CASE_DETAILS_MARKER) {
            debug!("[案件 {}] 直查响应中没有案件详情", query);
            return Ok(None);
        }

        info!("[案件 {}] 直查命中，开始解析", query);
        Ok(Some(self.parser.parse(&body, query)))
    }

    /// 获取页面，连接失败和超时按线性退避重试
    ///
    /// # 返回
    /// 非 200 状态返回 `Ok(None)`
    async fn fetch_with_retry(&self, url: &str) -> AppResult<Option<String>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status != StatusCode::OK {
                        debug!("直查返回状态 {}", status);
                        return Ok(None);
                    }
                    return Ok(Some(response.text().await?));
                }
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < self.max_retries => {
                    let delay = self.retry_delay * attempt as u32;
                    warn!(
                        "直查请求失败 (尝试 {}/{}), {:?} 后重试: {}",
                        attempt, self.max_retries, delay, e
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
