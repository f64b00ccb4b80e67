//! 单个变体的浏览器搜索 - 编排层
//!
//! 借出会话 → 打开搜索页 → 填写提交 → 等待结果 → 解析 → 归还会话

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::browser::{BrowserPool, BrowserSession, PageCondition};
use crate::config::Config;
use crate::error::{AppError, AppResult, FormError, SiteError};
use crate::models::{CaseQuery, CaseResult};
use crate::services::{FormFiller, ResultParser};
use crate::utils::logging::truncate_text;

/// 页面中出现该标记（小写）视为验证码
const CAPTCHA_MARKER: &str = "captcha";

/// 把单个变体的失败转换为面向调用方的文字
pub fn failure_message(error: &AppError, query: &CaseQuery) -> String {
    match error {
        AppError::Form(FormError::NoFormFound) | AppError::Form(FormError::NoSearchableControl { .. }) => {
            format!("Could not fill search form for {}", query)
        }
        AppError::Form(FormError::SubmissionFailed) => "Could not submit search form".to_string(),
        AppError::Browser(e) => format!("Browser automation error: {}", e),
        other => other.to_string(),
    }
}

/// 浏览器搜索
pub struct BrowserSearch {
    pool: Arc<BrowserPool>,
    parser: Arc<ResultParser>,
    filler: FormFiller,
    search_url: String,
    form_wait: Duration,
    result_wait: Duration,
}

impl BrowserSearch {
    pub fn new(config: &Config, pool: Arc<BrowserPool>, parser: Arc<ResultParser>) -> Self {
        Self {
            pool,
            parser,
            filler: FormFiller::new(),
            search_url: config.search_url(),
            form_wait: config.form_wait(),
            result_wait: config.result_wait(),
        }
    }

    /// 搜索一个变体
    ///
    /// # 返回
    /// 只有解析成功才返回 `Ok`；会话无论成败都会归还
    pub async fn run(&self, query: &CaseQuery) -> AppResult<CaseResult> {
        let session = self.pool.acquire().await?;
        let outcome = self.drive(&*session, query).await;
        self.pool.release(session).await;

        if let Err(e) = &outcome {
            warn!("[案件 {}] 浏览器搜索失败: {}", query, failure_message(e, query));
        }
        outcome
    }

    async fn drive(&self, session: &dyn BrowserSession, query: &CaseQuery) -> AppResult<CaseResult> {
        debug!("[案件 {}] 打开搜索页: {}", query, self.search_url);
        session.navigate(&self.search_url).await?;

        if !session.wait_for(PageCondition::FormPresent, self.form_wait).await {
            warn!("[案件 {}] 等待表单超时，继续尝试", query);
        }

        self.filler.fill_and_submit(session, query).await?;

        if !session.wait_for(PageCondition::ResultsOrNoRecord, self.result_wait).await {
            let source = session.page_source().await?;
            if source.to_lowercase().contains(CAPTCHA_MARKER) {
                warn!("[案件 {}] ⚠️ 检测到验证码", query);
                return Err(SiteError::CaptchaDetected.into());
            }
            warn!("[案件 {}] 等待结果超时，按当前页面解析", query);
        }

        let html = session.page_source().await?;
        debug!("[案件 {}] 结果页: {}", query, truncate_text(&html, 200));

        let result = self.parser.extract(&html, query)?;
        info!("[案件 {}] ✓ 浏览器搜索成功", query);
        Ok(result)
    }
}
