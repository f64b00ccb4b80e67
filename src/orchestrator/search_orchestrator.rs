//! 案件搜索编排器 - 编排层
//!
//! ## 职责
//!
//! 1. **参数校验**：不合法的查询不触发任何网络访问
//! 2. **直查**：先用模板地址尝试一次
//! 3. **并发搜索**：每个变体一个任务，Semaphore 限制并发
//! 4. **按提交顺序取胜者**：按变体顺序等待，第一个成功的胜出，其余任务中止
//! 5. **备选前缀**：仍未找到时顺序尝试一个备选前缀
//! 6. **失败建议**：全部失败时给出提示

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserPool, ChromeSessionFactory, SessionFactory};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{CaseQuery, CaseResult};
use crate::orchestrator::browser_search::BrowserSearch;
use crate::services::{DirectSearch, ResultParser};

/// 全部变体失败时的错误信息
pub const NOT_FOUND_MESSAGE: &str =
    "Case not found. Please verify the case type, case number, and filing year are correct.";

/// 全部失败时给调用方的建议
pub fn suggestions(query: &CaseQuery) -> Vec<String> {
    let mut suggestions = vec![query.case_type.prefix_hint()];

    if query.is_numeric() {
        suggestions.push("Verify the case number is correct".to_string());
        suggestions.push("Try adding a prefix specific to the case type".to_string());
    } else {
        suggestions.push("Check if the case number format is correct".to_string());
    }

    suggestions.push(
        "Try the case number with different spacing or punctuation (e.g. 'W.P.(C) 123' or 'WP(C)123')".to_string(),
    );
    suggestions.push("The case may not be available online yet; check with the court registry".to_string());
    suggestions
}

/// 并发阶段的结果
enum Outcome {
    Found(CaseResult),
    /// 终止性错误（验证码），不再尝试其他路径
    Terminal(AppError),
    Exhausted,
}

/// 案件搜索编排器
pub struct SearchOrchestrator {
    pool: Arc<BrowserPool>,
    direct: DirectSearch,
    browser: Arc<BrowserSearch>,
    workers: Arc<Semaphore>,
}

impl SearchOrchestrator {
    /// 使用 Chrome 会话创建编排器
    pub fn new(config: Config) -> AppResult<Self> {
        let factory = Arc::new(ChromeSessionFactory::new(config.clone()));
        Self::with_factory(config, factory)
    }

    /// 使用自定义会话工厂创建编排器
    pub fn with_factory(config: Config, factory: Arc<dyn SessionFactory>) -> AppResult<Self> {
        config.validate()?;

        let parser = Arc::new(ResultParser::new(&config.base_url)?);
        let pool = Arc::new(BrowserPool::new(factory, config.max_threads, config.acquire_timeout()));
        let direct = DirectSearch::new(&config, parser.clone())?;
        let browser = Arc::new(BrowserSearch::new(&config, pool.clone(), parser));

        Ok(Self {
            pool,
            direct,
            browser,
            workers: Arc::new(Semaphore::new(config.max_threads)),
        })
    }

    pub fn pool(&self) -> &Arc<BrowserPool> {
        &self.pool
    }

    /// 从原始输入搜索，参数不合法时返回保留原始输入的失败结果
    pub async fn search_raw(&self, case_type: &str, case_number: &str, filing_year: &str) -> CaseResult {
        match CaseQuery::parse(case_type, case_number, filing_year) {
            Ok(query) => self.search(&query).await,
            Err(e) => {
                warn!("查询参数不合法: {}", e);
                CaseResult::invalid(case_type, case_number, filing_year, e.to_string())
            }
        }
    }

    /// 搜索案件
    ///
    /// 任何失败都写进返回的结果信封
    pub async fn search(&self, query: &CaseQuery) -> CaseResult {
        if let Err(e) = query.validate() {
            warn!("[案件 {}] 查询参数不合法: {}", query, e);
            return CaseResult::failure(query, e.to_string());
        }

        info!("[案件 {}] 🔍 开始搜索", query);
        let variations = query.variations();
        debug!(
            "[案件 {}] 搜索变体: {:?}",
            query,
            variations.iter().map(|v| v.case_number.as_str()).collect::<Vec<_>>()
        );

        match self.direct.lookup(query).await {
            Ok(Some(result)) if result.success => {
                info!("[案件 {}] ✓ 直查成功", query);
                return result;
            }
            Ok(Some(result)) => debug!("[案件 {}] 直查未得到数据: {:?}", query, result.error),
            Ok(None) => {}
            Err(e) => warn!("[案件 {}] 直查失败: {}", query, e),
        }

        match self.search_concurrently(variations).await {
            Outcome::Found(result) => return result,
            Outcome::Terminal(e) => return CaseResult::failure(query, e.to_string()),
            Outcome::Exhausted => {}
        }

        for prefix in query.alternate_prefixes() {
            let alternate = query.with_prefix(prefix);
            info!("[案件 {}] 尝试备选前缀: {}", query, alternate.case_number);
            match self.browser.run(&alternate).await {
                Ok(result) => return result,
                Err(e) if e.is_terminal() => return CaseResult::failure(query, e.to_string()),
                Err(_) => {}
            }
        }

        warn!("[案件 {}] ❌ 所有变体均未找到", query);
        CaseResult::failure(query, NOT_FOUND_MESSAGE).with_suggestions(suggestions(query))
    }

    /// 并发搜索所有变体，按提交顺序取第一个成功的结果
    async fn search_concurrently(&self, variations: Vec<CaseQuery>) -> Outcome {
        let mut handles: Vec<(CaseQuery, JoinHandle<AppResult<CaseResult>>)> = Vec::new();

        for variation in variations {
            let permit = match self.workers.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("并发控制已关闭: {}", e);
                    break;
                }
            };

            let browser = self.browser.clone();
            let task_query = variation.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                browser.run(&task_query).await
            });
            handles.push((variation, handle));
        }

        let mut outcome = Outcome::Exhausted;
        let mut pending = handles.into_iter();

        for (variation, handle) in pending.by_ref() {
            match handle.await {
                Ok(Ok(result)) => {
                    info!("[案件 {}] ✓ 变体命中", variation);
                    outcome = Outcome::Found(result);
                    break;
                }
                Ok(Err(e)) if e.is_terminal() => {
                    outcome = Outcome::Terminal(e);
                    break;
                }
                Ok(Err(_)) => {}
                Err(e) => error!("[案件 {}] 搜索任务执行失败: {}", variation, e),
            }
        }

        // 已有结论，剩余任务不再需要
        for (variation, handle) in pending {
            debug!("[案件 {}] 中止剩余搜索任务", variation);
            handle.abort();
        }

        outcome
    }

    /// 关闭浏览器会话池
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}
