//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责搜索流程调度和并发控制，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `search_orchestrator` - 案件搜索编排器
//! - 参数校验、生成搜索变体
//! - 直查快速路径
//! - 并发调度浏览器搜索（Semaphore + tokio::spawn）
//! - 汇总结果、生成失败建议
//! - 持有浏览器会话池
//!
//! ### `browser_search` - 单个变体的浏览器搜索
//! - 借出 / 归还会话
//! - 打开搜索页、填写表单、等待结果、解析
//!
//! ## 层次关系
//!
//! ```text
//! search_orchestrator (处理 Vec<CaseQuery>)
//!     ↓
//! browser_search (处理单个变体)
//!     ↓
//! services (能力层：form_filler / result_parser / direct_search)
//!     ↓
//! browser (会话池、会话能力)
//!     ↓
//! infrastructure (基础设施：JsExecutor)
//! ```

pub mod browser_search;
pub mod search_orchestrator;

// 重新导出主要类型
pub use browser_search::{failure_message, BrowserSearch};
pub use search_orchestrator::{suggestions, SearchOrchestrator, NOT_FOUND_MESSAGE};
