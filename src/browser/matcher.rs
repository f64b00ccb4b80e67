//! 元素定位策略
//!
//! 目标站点的字段名事先未知，每个字段用一组按优先级排列的 `Matcher`
//! 逐个尝试，第一个命中的生效。每个策略渲染为一段返回 Element 或 null 的 JS 表达式。

use std::fmt;

/// 单个元素定位策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// `id` 精确匹配
    ById(&'static str),
    /// `name` 精确匹配
    ByName(&'static str),
    /// 指定标签中，任一属性值包含子串（不区分大小写）
    ByAttributeSubstring {
        tag: &'static str,
        attrs: &'static [&'static str],
        needle: &'static str,
    },
    /// CSS 选择器（相当于原先的 XPath 查询）
    ByCss(&'static str),
    /// 指定标签中，可见文本包含子串（不区分大小写）
    ByText {
        tag: &'static str,
        needle: &'static str,
    },
    /// 页面上某类元素的第一个，作为最后兜底
    Positional(&'static str),
}

/// 把 Rust 字符串渲染为 JS 字符串字面量
fn js_str(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

impl Matcher {
    /// 渲染为 JS 表达式，结果为 Element 或 null
    pub fn to_js(&self) -> String {
        match self {
            Matcher::ById(id) => format!("document.getElementById({})", js_str(id)),
            Matcher::ByName(name) => {
                format!("(document.getElementsByName({})[0] || null)", js_str(name))
            }
            Matcher::ByAttributeSubstring { tag, attrs, needle } => {
                let attrs: Vec<String> = attrs.iter().map(|a| js_str(a)).collect();
                format!(
                    "(Array.from(document.querySelectorAll({tag})).find(el => [{attrs}].some(a => (el.getAttribute(a) || '').toLowerCase().includes({needle}))) || null)",
                    tag = js_str(tag),
                    attrs = attrs.join(", "),
                    needle = js_str(&needle.to_lowercase()),
                )
            }
            Matcher::ByCss(selector) | Matcher::Positional(selector) => {
                format!("document.querySelector({})", js_str(selector))
            }
            Matcher::ByText { tag, needle } => format!(
                "(Array.from(document.querySelectorAll({tag})).find(el => (el.innerText || el.textContent || '').toLowerCase().includes({needle})) || null)",
                tag = js_str(tag),
                needle = js_str(&needle.to_lowercase()),
            ),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::ById(id) => write!(f, "ById({})", id),
            Matcher::ByName(name) => write!(f, "ByName({})", name),
            Matcher::ByAttributeSubstring { tag, attrs, needle } => {
                write!(f, "ByAttributeSubstring({}[{}*={}])", tag, attrs.join("|"), needle)
            }
            Matcher::ByCss(selector) => write!(f, "ByCss({})", selector),
            Matcher::ByText { tag, needle } => write!(f, "ByText({} ~ {})", tag, needle),
            Matcher::Positional(selector) => write!(f, "Positional({})", selector),
        }
    }
}
