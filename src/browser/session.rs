//! 浏览器会话能力接口
//!
//! 表单填写只依赖这里的 trait，不直接接触 CDP。
//! Chrome 实现见 `chrome.rs`，测试中可以替换为脚本化的假会话。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::browser::matcher::Matcher;
use crate::error::AppResult;

/// 轮询页面状态的间隔
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// 下拉框中的一个选项
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelectOption {
    pub index: usize,
    pub value: String,
    pub text: String,
}

impl SelectOption {
    pub fn new(index: usize, value: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            index,
            value: value.into(),
            text: text.into(),
        }
    }
}

/// 控件种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Select,
    TextInput,
    NumberInput,
    Button,
    Form,
    Other,
}

impl ControlKind {
    /// 根据标签名和 `type` 属性判断控件种类
    pub fn classify(tag: &str, input_type: &str) -> Self {
        match (tag.to_ascii_lowercase().as_str(), input_type.to_ascii_lowercase().as_str()) {
            ("select", _) => ControlKind::Select,
            ("input", "number") => ControlKind::NumberInput,
            ("input", "submit" | "button" | "image") => ControlKind::Button,
            ("input", "hidden" | "checkbox" | "radio" | "file") => ControlKind::Other,
            ("input", _) | ("textarea", _) => ControlKind::TextInput,
            ("button", _) => ControlKind::Button,
            ("form", _) => ControlKind::Form,
            _ => ControlKind::Other,
        }
    }
}

/// 页面上已定位的控件
///
/// `handle` 是会话内部用来再次找到该元素的标识
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub handle: String,
    pub kind: ControlKind,
    pub options: Vec<SelectOption>,
}

impl Control {
    pub fn is_dropdown(&self) -> bool {
        self.kind == ControlKind::Select
    }

    pub fn accepts_text(&self) -> bool {
        matches!(self.kind, ControlKind::TextInput | ControlKind::NumberInput)
    }
}

/// 可以等待的页面状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCondition {
    /// 页面上至少有一个 form
    FormPresent,
    /// 出现表格，或出现"未找到"之类的提示
    ResultsOrNoRecord,
}

/// 浏览器会话
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// 导航到指定地址
    async fn navigate(&self, url: &str) -> AppResult<()>;

    /// 用单个策略查找元素，找不到返回 `Ok(None)`
    async fn find(&self, matcher: &Matcher) -> AppResult<Option<Control>>;

    /// 依次尝试策略，第一个命中的生效
    ///
    /// 单个策略出错只记录日志并视为未命中
    async fn find_first(&self, matchers: &[Matcher]) -> Option<(Matcher, Control)> {
        for matcher in matchers {
            match self.find(matcher).await {
                Ok(Some(control)) => return Some((*matcher, control)),
                Ok(None) => {}
                Err(e) => debug!("定位策略 {} 出错，跳过: {}", matcher, e),
            }
        }
        None
    }

    /// 设置输入框的值
    async fn set_value(&self, control: &Control, value: &str) -> AppResult<()>;

    /// 按下标选中下拉框选项
    async fn select_option(&self, control: &Control, index: usize) -> AppResult<()>;

    async fn click(&self, control: &Control) -> AppResult<()>;

    /// 调用表单自身的提交动作
    async fn submit_form(&self) -> AppResult<()>;

    /// 注入脚本直接提交第一个表单
    async fn submit_via_script(&self) -> AppResult<()>;

    /// 在控件中按下回车
    async fn press_enter(&self, control: &Control) -> AppResult<()>;

    /// 检查一次页面状态
    async fn check(&self, condition: PageCondition) -> AppResult<bool>;

    /// 在超时时间内轮询页面状态
    ///
    /// # 返回
    /// 超时返回 `false`，调用方决定是否继续
    async fn wait_for(&self, condition: PageCondition, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.check(condition).await {
                Ok(true) => return true,
                Ok(false) => {}
                // 导航过程中脚本可能失败，视为尚未就绪
                Err(e) => debug!("检查页面状态 {:?} 失败: {}", condition, e),
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// 当前页面 HTML
    async fn page_source(&self) -> AppResult<String>;

    /// 释放底层浏览器
    async fn close(&mut self) -> AppResult<()>;
}
