//! 基于 chromiumoxide 的浏览器会话
//!
//! 每个会话独占一个无头浏览器进程和一个页面，元素操作全部通过 `JsExecutor` 注入脚本完成。
//! 已定位的元素会被打上 `data-cc-handle` 属性，之后的操作据此找回元素。

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::Deserialize;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::browser::matcher::Matcher;
use crate::browser::pool::SessionFactory;
use crate::browser::session::{BrowserSession, Control, ControlKind, PageCondition, SelectOption};
use crate::config::Config;
use crate::error::{AppError, AppResult, BrowserError};
use crate::infrastructure::JsExecutor;

const HANDLE_ATTR: &str = "data-cc-handle";

const PROFILE_PREFIX: &str = "court-case-fetch-";

/// 已启动的浏览器及其附属资源
pub struct LaunchedBrowser {
    pub browser: Browser,
    pub page: Page,
    pub handler_task: JoinHandle<()>,
    /// 浏览器的用户目录，析构时删除
    pub profile: TempDir,
}

/// 在系统临时目录下创建独立的用户目录，同时启动的浏览器不会争用同一个 profile
pub fn create_profile_dir() -> AppResult<TempDir> {
    let base = std::env::temp_dir();
    tempfile::Builder::new()
        .prefix(PROFILE_PREFIX)
        .tempdir_in(&base)
        .map_err(|e| AppError::io(&base, e))
}

/// 删除用户目录，失败只记录日志
fn remove_profile_dir(profile: TempDir) {
    let path = profile.path().to_path_buf();
    match profile.close() {
        Ok(()) => debug!("已删除浏览器用户目录: {}", path.display()),
        Err(e) => warn!("删除浏览器用户目录失败 {}: {}", path.display(), e),
    }
}

/// 启动无头浏览器
///
/// # 返回
/// 浏览器、空白页面、事件处理任务和用户目录
pub async fn launch_headless_browser(config: &Config) -> AppResult<LaunchedBrowser> {
    info!("🚀 启动无头浏览器...");

    let profile = create_profile_dir()?;

    let mut builder = BrowserConfig::builder()
        .window_size(config.window_width, config.window_height)
        .no_sandbox() // 容器内运行需要禁用沙盒
        .user_data_dir(profile.path())
        .args(vec![
            "--disable-gpu".to_string(),
            "--disable-dev-shm-usage".to_string(), // 防止共享内存不足
            "--disable-extensions".to_string(),
            "--disable-notifications".to_string(),
            "--disable-infobars".to_string(),
            format!("--user-agent={}", config.user_agent),
        ]);

    builder = if config.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };

    if let Some(path) = &config.chrome_executable {
        builder = builder.chrome_executable(Path::new(path));
    }

    let browser_config = builder.build().map_err(|e| {
        error!("配置无头浏览器失败: {}", e);
        BrowserError::Launch(e)
    })?;

    let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
        error!("启动无头浏览器失败: {}", e);
        BrowserError::Launch(e.to_string())
    })?;
    debug!("无头浏览器启动成功");

    // 在后台处理浏览器事件
    let handler_task = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建页面失败: {}", e);
        e
    })?;

    Ok(LaunchedBrowser {
        browser,
        page,
        handler_task,
        profile,
    })
}

/// 元素探测脚本的返回值
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ControlProbe {
    found: bool,
    #[serde(default)]
    handle: Option<String>,
    #[serde(default)]
    tag: String,
    #[serde(default)]
    input_type: String,
    #[serde(default)]
    options: Vec<SelectOption>,
}

impl ControlProbe {
    fn into_control(self) -> Option<Control> {
        if !self.found {
            return None;
        }
        Some(Control {
            handle: self.handle?,
            kind: ControlKind::classify(&self.tag, &self.input_type),
            options: self.options,
        })
    }
}

fn probe_script(matcher: &Matcher) -> String {
    format!(
        r#"
        (() => {{
            const el = {expr};
            if (!el) {{
                return {{ found: false }};
            }}
            if (!el.hasAttribute("{attr}")) {{
                window.__ccHandleSeq = (window.__ccHandleSeq || 0) + 1;
                el.setAttribute("{attr}", String(window.__ccHandleSeq));
            }}
            const tag = el.tagName.toLowerCase();
            const options = tag === "select"
                ? Array.from(el.options).map((o, i) => ({{ index: i, value: o.value, text: (o.text || "").trim() }}))
                : [];
            return {{
                found: true,
                handle: el.getAttribute("{attr}"),
                tag: tag,
                inputType: (el.getAttribute("type") || "").toLowerCase(),
                options: options
            }};
        }})()
        "#,
        expr = matcher.to_js(),
        attr = HANDLE_ATTR,
    )
}

fn handle_selector(control: &Control) -> String {
    format!("[{}=\"{}\"]", HANDLE_ATTR, control.handle)
}

/// Chrome 浏览器会话
pub struct ChromeSession {
    browser: Browser,
    executor: JsExecutor,
    handler_task: JoinHandle<()>,
    implicit_wait: Duration,
    /// 放在 `browser` 之后，析构时浏览器先退出再删除目录
    profile: Option<TempDir>,
}

impl ChromeSession {
    pub async fn launch(config: &Config) -> AppResult<Self> {
        let launched = launch_headless_browser(config).await?;
        Ok(Self {
            browser: launched.browser,
            executor: JsExecutor::new(launched.page),
            handler_task: launched.handler_task,
            implicit_wait: config.implicit_wait(),
            profile: Some(launched.profile),
        })
    }

    /// 对已定位元素执行一段脚本，脚本以 `el` 访问元素并返回布尔值
    async fn with_element(&self, control: &Control, body: &str) -> AppResult<()> {
        let script = format!(
            r#"
            (() => {{
                const el = document.querySelector({selector});
                if (!el) {{
                    return false;
                }}
                {body}
                return true;
            }})()
            "#,
            selector = serde_json::Value::String(handle_selector(control)),
            body = body,
        );
        let ok: bool = self.executor.eval_as(script).await?;
        if ok {
            Ok(())
        } else {
            Err(AppError::script(format!("元素 {} 已不在页面上", control.handle)))
        }
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&self, url: &str) -> AppResult<()> {
        debug!("导航到: {}", url);
        self.executor.page().goto(url).await.map_err(|e| {
            error!("导航到 {} 失败: {}", url, e);
            e
        })?;
        Ok(())
    }

    async fn find(&self, matcher: &Matcher) -> AppResult<Option<Control>> {
        let script = probe_script(matcher);
        let deadline = Instant::now() + self.implicit_wait;
        loop {
            let probe: ControlProbe = self.executor.eval_as(script.clone()).await?;
            if let Some(control) = probe.into_control() {
                return Ok(Some(control));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            sleep(Duration::from_millis(100)).await;
        }
    }

    async fn set_value(&self, control: &Control, value: &str) -> AppResult<()> {
        let body = format!(
            r#"
            el.focus();
            el.value = {value};
            el.dispatchEvent(new Event("input", {{ bubbles: true }}));
            el.dispatchEvent(new Event("change", {{ bubbles: true }}));
            "#,
            value = serde_json::Value::String(value.to_string()),
        );
        self.with_element(control, &body).await
    }

    async fn select_option(&self, control: &Control, index: usize) -> AppResult<()> {
        let body = format!(
            r#"
            el.selectedIndex = {index};
            el.dispatchEvent(new Event("change", {{ bubbles: true }}));
            "#,
            index = index,
        );
        self.with_element(control, &body).await
    }

    async fn click(&self, control: &Control) -> AppResult<()> {
        let element = self.executor.page().find_element(handle_selector(control)).await?;
        element.click().await?;
        Ok(())
    }

    async fn submit_form(&self) -> AppResult<()> {
        let ok: bool = self
            .executor
            .eval_as(
                r#"
                (() => {
                    const form = document.querySelector("form");
                    if (!form) {
                        return false;
                    }
                    if (typeof form.requestSubmit === "function") {
                        form.requestSubmit();
                    } else {
                        form.submit();
                    }
                    return true;
                })()
                "#,
            )
            .await?;
        if ok {
            Ok(())
        } else {
            Err(AppError::script("页面上没有可提交的表单"))
        }
    }

    async fn submit_via_script(&self) -> AppResult<()> {
        let ok: bool = self
            .executor
            .eval_as(
                r#"
                (() => {
                    const form = document.forms[0];
                    if (!form) {
                        return false;
                    }
                    HTMLFormElement.prototype.submit.call(form);
                    return true;
                })()
                "#,
            )
            .await?;
        if ok {
            Ok(())
        } else {
            Err(AppError::script("document.forms 为空"))
        }
    }

    async fn press_enter(&self, control: &Control) -> AppResult<()> {
        let element = self.executor.page().find_element(handle_selector(control)).await?;
        element.press_key("Enter").await?;
        Ok(())
    }

    async fn check(&self, condition: PageCondition) -> AppResult<bool> {
        let script = match condition {
            PageCondition::FormPresent => r#"document.querySelector("form") !== null"#,
            PageCondition::ResultsOrNoRecord => {
                r#"
                (() => {
                    if (document.getElementsByTagName("table").length > 0) {
                        return true;
                    }
                    const text = (document.body ? document.body.innerText : "").toLowerCase();
                    return text.includes("no record found")
                        || text.includes("no records found")
                        || text.includes("not found");
                })()
                "#
            }
        };
        self.executor.eval_as(script).await
    }

    async fn page_source(&self) -> AppResult<String> {
        Ok(self.executor.page().content().await?)
    }

    async fn close(&mut self) -> AppResult<()> {
        if let Err(e) = self.browser.close().await {
            warn!("关闭浏览器失败: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("等待浏览器进程退出失败: {}", e);
        }
        self.handler_task.abort();
        if let Some(profile) = self.profile.take() {
            remove_profile_dir(profile);
        }
        debug!("浏览器会话已关闭");
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

/// 按配置启动 Chrome 会话的工厂
pub struct ChromeSessionFactory {
    config: Config,
}

impl ChromeSessionFactory {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn create(&self) -> AppResult<Box<dyn BrowserSession>> {
        let session = ChromeSession::launch(&self.config).await?;
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_into_control() {
        let probe: ControlProbe = serde_json::from_value(serde_json::json!({
            "found": true,
            "handle": "3",
            "tag": "select",
            "inputType": "",
            "options": [
                { "index": 0, "value": "", "text": "Select" },
                { "index": 1, "value": "CRL.A.", "text": "CRL.A." }
            ]
        }))
        .unwrap();
        let control = probe.into_control().unwrap();
        assert_eq!(control.handle, "3");
        assert!(control.is_dropdown());
        assert_eq!(control.options[1].value, "CRL.A.");
    }

    #[test]
    fn test_probe_not_found() {
        let probe: ControlProbe = serde_json::from_value(serde_json::json!({ "found": false })).unwrap();
        assert!(probe.into_control().is_none());
    }

    #[test]
    fn test_probe_script_embeds_matcher() {
        let script = probe_script(&Matcher::ByName("cmbYear"));
        assert!(script.contains(r#"document.getElementsByName("cmbYear")"#));
        assert!(script.contains(HANDLE_ATTR));
    }

    #[test]
    fn test_handle_selector() {
        let control = Control {
            handle: "7".to_string(),
            kind: ControlKind::TextInput,
            options: vec![],
        };
        assert_eq!(handle_selector(&control), r#"[data-cc-handle="7"]"#);
    }

    #[test]
    fn test_profile_dir_is_unique_and_removed() {
        let first = create_profile_dir().unwrap();
        let second = create_profile_dir().unwrap();
        assert_ne!(first.path(), second.path());
        assert!(first
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(PROFILE_PREFIX)));

        // 模拟浏览器写入的 profile 内容
        std::fs::create_dir_all(first.path().join("Default")).unwrap();
        std::fs::write(first.path().join("Default").join("Preferences"), b"{}").unwrap();

        let first_path = first.path().to_path_buf();
        remove_profile_dir(first);
        assert!(!first_path.exists());

        let second_path = second.path().to_path_buf();
        drop(second);
        assert!(!second_path.exists());
    }

    #[tokio::test]
    #[ignore] // 需要本机安装 Chrome：cargo test -- --ignored
    async fn test_launch_and_read_blank_page() {
        let mut session = ChromeSession::launch(&Config::default()).await.expect("启动浏览器失败");
        session.navigate("about:blank").await.unwrap();
        let html = session.page_source().await.unwrap();
        assert!(html.contains("<html"));
        let profile = session.profile.as_ref().map(|p| p.path().to_path_buf()).unwrap();
        assert!(profile.exists());
        session.close().await.unwrap();
        assert!(!profile.exists());
    }
}
