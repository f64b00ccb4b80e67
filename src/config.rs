use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{AppError, AppResult};

/// 程序配置
///
/// 只在启动时构造一次，之后以值的形式传给各个组件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 法院站点根地址
    pub base_url: String,
    /// 表单搜索页路径
    pub search_path: String,
    /// 直查接口路径
    pub direct_path: String,
    /// 请求与浏览器使用的 User-Agent
    pub user_agent: String,
    /// 并发搜索数量，同时也是会话池容量
    pub max_threads: usize,
    /// 是否无头运行浏览器
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// 浏览器可执行文件（为空时自动探测）
    pub chrome_executable: Option<String>,
    /// 查找元素时的短暂隐式等待（毫秒）
    pub implicit_wait_ms: u64,
    /// 等待表单出现（秒）
    pub form_wait_secs: u64,
    /// 等待搜索结果出现（秒）
    pub result_wait_secs: u64,
    /// 等待空闲浏览器会话（秒）
    pub acquire_timeout_secs: u64,
    /// 直查请求超时（秒）
    pub request_timeout_secs: u64,
    /// 直查请求的最大尝试次数
    pub max_retries: usize,
    /// 线性退避的基础间隔（毫秒）
    pub retry_delay_ms: u64,
    /// 文档下载目录
    pub download_dir: String,
    /// 文档大小上限（字节）
    pub max_file_size: u64,
    /// 文档下载超时（秒）
    pub download_timeout_secs: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://delhihighcourt.nic.in".to_string(),
            search_path: "/dhc/case-status".to_string(),
            direct_path: "/home/caseinfo".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            max_threads: 3,
            headless: true,
            window_width: 1920,
            window_height: 1080,
            chrome_executable: None,
            implicit_wait_ms: 500,
            form_wait_secs: 5,
            result_wait_secs: 8,
            acquire_timeout_secs: 60,
            request_timeout_secs: 10,
            max_retries: 2,
            retry_delay_ms: 1000,
            download_dir: "downloads".to_string(),
            max_file_size: 10 * 1024 * 1024,
            download_timeout_secs: 30,
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            base_url: std::env::var("COURT_BASE_URL").unwrap_or(default.base_url),
            search_path: std::env::var("COURT_SEARCH_PATH").unwrap_or(default.search_path),
            direct_path: std::env::var("COURT_DIRECT_PATH").unwrap_or(default.direct_path),
            user_agent: std::env::var("USER_AGENT").unwrap_or(default.user_agent),
            max_threads: std::env::var("MAX_THREADS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_threads),
            headless: std::env::var("CHROME_HEADLESS").ok().map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(default.headless),
            window_width: default.window_width,
            window_height: default.window_height,
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().or(default.chrome_executable),
            implicit_wait_ms: std::env::var("IMPLICIT_WAIT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.implicit_wait_ms),
            form_wait_secs: default.form_wait_secs,
            result_wait_secs: default.result_wait_secs,
            acquire_timeout_secs: std::env::var("ACQUIRE_TIMEOUT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.acquire_timeout_secs),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.request_timeout_secs),
            max_retries: std::env::var("MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_retries),
            // REQUEST_DELAY 以秒为单位
            retry_delay_ms: std::env::var("REQUEST_DELAY").ok().and_then(|v| v.parse::<u64>().ok()).map(|secs| secs * 1000).unwrap_or(default.retry_delay_ms),
            download_dir: std::env::var("UPLOAD_FOLDER").unwrap_or(default.download_dir),
            max_file_size: std::env::var("MAX_FILE_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_file_size),
            download_timeout_secs: std::env::var("DOWNLOAD_TIMEOUT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.download_timeout_secs),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
        }
    }

    /// 从 TOML 文件加载配置，缺失的字段使用默认值
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 检查配置是否可用
    pub fn validate(&self) -> AppResult<()> {
        if self.max_threads == 0 {
            return Err(AppError::Config("max_threads must be at least 1".to_string()));
        }
        if self.max_file_size == 0 {
            return Err(AppError::Config("max_file_size must be positive".to_string()));
        }
        Url::parse(&self.base_url)
            .map_err(|e| AppError::Config(format!("invalid base_url {:?}: {}", self.base_url, e)))?;
        Ok(())
    }

    /// 站点根地址（去掉末尾斜杠）
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn search_url(&self) -> String {
        format!("{}{}", self.base(), self.search_path)
    }

    pub fn direct_url(&self) -> String {
        format!("{}{}", self.base(), self.direct_path)
    }

    pub fn implicit_wait(&self) -> Duration {
        Duration::from_millis(self.implicit_wait_ms)
    }

    pub fn form_wait(&self) -> Duration {
        Duration::from_secs(self.form_wait_secs)
    }

    pub fn result_wait(&self) -> Duration {
        Duration::from_secs(self.result_wait_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}
