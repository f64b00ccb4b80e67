use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 已下载到本地的文档
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedDocument {
    pub local_path: PathBuf,
    pub size_bytes: u64,
    /// 小写十六进制 SHA-256
    pub checksum: String,
    pub valid: bool,
}

/// PDF 文件的基本信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfInfo {
    pub valid: bool,
    pub pages: usize,
    pub size_bytes: u64,
    pub checksum: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
}
