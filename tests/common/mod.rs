//! 集成测试共用的夹具：本地 HTTP 服务和脚本化的浏览器会话
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use court_case_fetch::browser::{
    BrowserSession, Control, ControlKind, Matcher, PageCondition, SelectOption, SessionFactory,
};
use court_case_fetch::{AppError, AppResult};

pub const FAKE_PDF: &[u8] = b"%PDF-1.4\n%fake\n%%EOF\n";

// ========== HTTP 夹具 ==========

/// 一条固定响应
#[derive(Clone)]
pub struct Route {
    status: u16,
    content_type: String,
    body: Vec<u8>,
    send_length: bool,
}

impl Route {
    pub fn html(body: &str) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8".to_string(),
            body: body.as_bytes().to_vec(),
            send_length: true,
        }
    }

    pub fn pdf(body: &[u8]) -> Self {
        Self {
            status: 200,
            content_type: "application/pdf".to_string(),
            body: body.to_vec(),
            send_length: true,
        }
    }

    /// 不发送 Content-Length，靠关闭连接结束响应体
    pub fn without_length(mut self) -> Self {
        self.send_length = false;
        self
    }
}

/// 本地 HTTP 服务，按路径（不含查询串）统计请求次数
pub struct FixtureServer {
    addr: SocketAddr,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    task: JoinHandle<()>,
}

impl FixtureServer {
    pub async fn start(routes: Vec<(&str, Route)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("绑定端口失败");
        let addr = listener.local_addr().expect("读取地址失败");
        let routes: Arc<HashMap<String, Route>> =
            Arc::new(routes.into_iter().map(|(path, route)| (path.to_string(), route)).collect());
        let hits = Arc::new(Mutex::new(HashMap::new()));

        let task_hits = hits.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, routes.clone(), task_hits.clone()));
            }
        });

        Self { addr, hits, task }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(mut stream: TcpStream, routes: Arc<HashMap<String, Route>>, hits: Arc<Mutex<HashMap<String, usize>>>) {
    let mut request = Vec::new();
    let mut buffer = [0u8; 1024];
    loop {
        let read = stream.read(&mut buffer).await.unwrap_or(0);
        if read == 0 {
            break;
        }
        request.extend_from_slice(&buffer[..read]);
        if request.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    let request = String::from_utf8_lossy(&request);
    let target = request.split_whitespace().nth(1).unwrap_or("/");
    let path = target.split('?').next().unwrap_or("/").to_string();
    *hits.lock().unwrap().entry(path.clone()).or_insert(0) += 1;

    let route = routes.get(&path).cloned().unwrap_or(Route {
        status: 404,
        content_type: "text/plain".to_string(),
        body: b"missing".to_vec(),
        send_length: true,
    });

    let reason = if route.status == 200 { "OK" } else { "Not Found" };
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nConnection: close\r\n",
        route.status, reason, route.content_type
    );
    if route.send_length {
        head.push_str(&format!("Content-Length: {}\r\n", route.body.len()));
    }
    head.push_str("\r\n");

    // 客户端可能提前断开（例如拒绝过大的文件），写失败忽略
    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.write_all(&route.body).await;
    let _ = stream.shutdown().await;
}

// ========== 浏览器夹具 ==========

/// 针对某个案号的结果页：延迟 `delay` 后返回 `html`
#[derive(Clone)]
pub struct Scripted {
    pub case_number: String,
    pub delay: Duration,
    pub html: String,
}

impl Scripted {
    pub fn new(case_number: &str, delay: Duration, html: &str) -> Self {
        Self {
            case_number: case_number.to_string(),
            delay,
            html: html.to_string(),
        }
    }
}

/// 假页面：哪些定位策略能命中哪些控件，以及页面状态
#[derive(Clone, Default)]
pub struct FakePage {
    pub controls: Vec<(Matcher, Control)>,
    pub has_form: bool,
    pub results_ready: bool,
    pub fail_submit: bool,
    pub html: String,
    /// 按填写的案号返回不同结果页，未命中时返回 `html`
    pub scripted: Vec<Scripted>,
}

pub fn control(handle: &str, kind: ControlKind, options: &[(&str, &str)]) -> Control {
    Control {
        handle: handle.to_string(),
        kind,
        options: options
            .iter()
            .enumerate()
            .map(|(i, (value, text))| SelectOption::new(i, *value, *text))
            .collect(),
    }
}

impl FakePage {
    /// 与真实站点相同字段名的表单，提交后显示 `html`
    pub fn court_form(html: &str) -> Self {
        Self {
            controls: vec![
                (
                    Matcher::ById("case_type_sel"),
                    control(
                        "case_type_sel",
                        ControlKind::Select,
                        &[("", "Select"), ("CRL.A.", "CRL.A."), ("CS(OS)", "CS(OS)"), ("W.P.(C)", "W.P.(C)")],
                    ),
                ),
                (Matcher::ById("case_no"), control("case_no", ControlKind::TextInput, &[])),
                (
                    Matcher::ByName("cmbYear"),
                    control(
                        "cmbYear",
                        ControlKind::Select,
                        &[("", "Year"), ("2022", "2022"), ("2023", "2023"), ("2024", "2024")],
                    ),
                ),
                (
                    Matcher::ByCss("input[type='submit'], button[type='submit']"),
                    control("submit", ControlKind::Button, &[]),
                ),
            ],
            has_form: true,
            results_ready: true,
            fail_submit: false,
            html: html.to_string(),
            scripted: Vec::new(),
        }
    }

    pub fn with_scripted(mut self, scripted: Vec<Scripted>) -> Self {
        self.scripted = scripted;
        self
    }
}

/// 记录所有操作的假会话
pub struct FakeSession {
    page: FakePage,
    log: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
    case_number: Mutex<Option<String>>,
}

impl FakeSession {
    pub fn new(page: FakePage) -> Self {
        Self {
            page,
            log: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicUsize::new(0)),
            case_number: Mutex::new(None),
        }
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }

    fn submit_result(&self, entry: String) -> AppResult<()> {
        if self.page.fail_submit {
            return Err(AppError::script(format!("{} rejected", entry)));
        }
        self.record(entry);
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&self, url: &str) -> AppResult<()> {
        self.record(format!("navigate {}", url));
        Ok(())
    }

    async fn find(&self, matcher: &Matcher) -> AppResult<Option<Control>> {
        Ok(self
            .page
            .controls
            .iter()
            .find(|(m, _)| m == matcher)
            .map(|(_, c)| c.clone()))
    }

    async fn set_value(&self, control: &Control, value: &str) -> AppResult<()> {
        if control.handle == "case_no" {
            *self.case_number.lock().unwrap() = Some(value.to_string());
        }
        self.record(format!("set {}={}", control.handle, value));
        Ok(())
    }

    async fn select_option(&self, control: &Control, index: usize) -> AppResult<()> {
        self.record(format!("select {}#{}", control.handle, index));
        Ok(())
    }

    async fn click(&self, control: &Control) -> AppResult<()> {
        self.submit_result(format!("click {}", control.handle))
    }

    async fn submit_form(&self) -> AppResult<()> {
        self.submit_result("submit_form".to_string())
    }

    async fn submit_via_script(&self) -> AppResult<()> {
        self.submit_result("submit_via_script".to_string())
    }

    async fn press_enter(&self, control: &Control) -> AppResult<()> {
        self.submit_result(format!("enter {}", control.handle))
    }

    async fn check(&self, condition: PageCondition) -> AppResult<bool> {
        Ok(match condition {
            PageCondition::FormPresent => self.page.has_form,
            PageCondition::ResultsOrNoRecord => self.page.results_ready,
        })
    }

    async fn page_source(&self) -> AppResult<String> {
        let number = self.case_number.lock().unwrap().clone();
        let scripted = self
            .page
            .scripted
            .iter()
            .find(|s| Some(&s.case_number) == number.as_ref())
            .cloned();
        match scripted {
            Some(scripted) => {
                tokio::time::sleep(scripted.delay).await;
                Ok(scripted.html)
            }
            None => Ok(self.page.html.clone()),
        }
    }

    async fn close(&mut self) -> AppResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 每次创建一个共享操作日志的假会话
pub struct FakeFactory {
    page: FakePage,
    delay: Duration,
    pub created: AtomicUsize,
    pub closed: Arc<AtomicUsize>,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl FakeFactory {
    pub fn new(page: FakePage) -> Arc<Self> {
        Self::with_delay(page, Duration::ZERO)
    }

    /// 模拟浏览器启动耗时
    pub fn with_delay(page: FakePage, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            page,
            delay,
            created: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
            log: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// 所有会话填写过的案号
    pub fn submitted_numbers(&self) -> Vec<String> {
        self.log()
            .iter()
            .filter_map(|entry| entry.strip_prefix("set case_no=").map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn create(&self) -> AppResult<Box<dyn BrowserSession>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            page: self.page.clone(),
            log: self.log.clone(),
            closed: self.closed.clone(),
            case_number: Mutex::new(None),
        }))
    }
}
