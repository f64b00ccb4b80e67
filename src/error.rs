use std::time::Duration;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 查询参数不合法（不会触发任何网络访问）
    #[error("{0}")]
    Validation(String),
    /// 网络请求失败（连接、超时、HTTP 状态）
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// 浏览器相关错误
    #[error(transparent)]
    Browser(#[from] BrowserError),
    /// 表单定位/提交错误
    #[error(transparent)]
    Form(#[from] FormError),
    /// 站点返回的语义错误
    #[error(transparent)]
    Site(#[from] SiteError),
    /// 文档下载/校验错误
    #[error(transparent)]
    Document(#[from] DocumentError),
    /// 文件操作错误
    #[error("IO error ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 配置错误
    #[error("Config error: {0}")]
    Config(String),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 启动浏览器失败
    #[error("failed to launch browser: {0}")]
    Launch(String),
    /// CDP 协议错误
    #[error("browser protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    /// 页面脚本返回了意外结果
    #[error("page script failed: {0}")]
    Script(String),
    /// 等待空闲会话超时
    #[error("no browser session became available within {waited:?}")]
    PoolExhausted { waited: Duration },
    /// 会话池已关闭
    #[error("browser pool is shut down")]
    PoolClosed,
}

/// 表单错误
#[derive(Debug, Error)]
pub enum FormError {
    /// 页面上没有任何表单
    #[error("no search form found on the page")]
    NoFormFound,
    /// 找不到必填控件
    #[error("could not locate the {field} control")]
    NoSearchableControl { field: &'static str },
    /// 所有提交方式都失败
    #[error("every submit strategy failed")]
    SubmissionFailed,
}

/// 站点语义错误
#[derive(Debug, Error)]
pub enum SiteError {
    /// 提交后出现验证码
    #[error("CAPTCHA detected. Please try again later.")]
    CaptchaDetected,
    /// 站点明确表示没有该案件
    #[error("Case not found: {case}. Please verify the details are correct.")]
    NoRecordFound { case: String },
    /// 页面无法提取出结构化数据
    #[error("{0}")]
    ParseFailure(String),
}

/// 文档错误
#[derive(Debug, Error)]
pub enum DocumentError {
    /// 文件超过大小上限
    #[error("document exceeds the size limit ({size} > {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },
    /// 文件不是有效的 PDF
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    /// 文档 ID 含有非法字符
    #[error("invalid document id: {0:?}")]
    InvalidId(String),
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::Cdp(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Browser(BrowserError::Script(err.to_string()))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io {
            path: String::new(),
            source: err,
        }
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建带路径的 IO 错误
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// 创建页面脚本错误
    pub fn script(message: impl Into<String>) -> Self {
        AppError::Browser(BrowserError::Script(message.into()))
    }

    /// 创建参数校验错误
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    /// 验证码是终止性错误，不再尝试其他变体
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppError::Site(SiteError::CaptchaDetected))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
