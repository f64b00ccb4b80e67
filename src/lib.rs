//! # Court Case Fetch
//!
//! 从没有稳定 API 的法院网站检索案件信息并下载案件文档
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//!
//! ### ② 浏览器层（Browser）
//! - `browser/session` - `BrowserSession` 能力接口，表单填写只依赖它
//! - `browser/matcher` - 元素定位策略
//! - `browser/chrome` - 基于 chromiumoxide 的会话实现
//! - `browser/pool` - 容量受限、可复用的会话池
//!
//! ### ③ 业务能力层（Services）
//! - `FormFiller` - 按定位策略填写并提交搜索表单
//! - `ResultParser` - 从结果页提取案件信息
//! - `DirectSearch` - 模板地址直查
//! - `DocumentFetcher` - 下载、校验文档
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/search_orchestrator` - 变体生成、并发调度、汇总结果
//! - `orchestrator/browser_search` - 单个变体的浏览器搜索流程
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use browser::{BrowserPool, BrowserSession, ChromeSessionFactory, SessionFactory};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::JsExecutor;
pub use models::{CaseQuery, CaseResult, CaseType, DocumentRef, DownloadedDocument, PdfInfo};
pub use orchestrator::SearchOrchestrator;
pub use services::DocumentFetcher;
