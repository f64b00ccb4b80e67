//! 文档下载服务 - 业务能力层
//!
//! 按调用方给出的文档 ID 下载 PDF：已有有效文件时直接复用，
//! 下载过程中限制大小，写入临时文件，校验通过后再改名到最终位置。

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use lopdf::{Document, Object};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, DocumentError};
use crate::models::{DownloadedDocument, PdfInfo};

/// PDF 文件头
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// 文档下载服务
///
/// 职责：
/// - 下载、限制大小、校验、计算校验和
/// - 不关心文档属于哪个案件
pub struct DocumentFetcher {
    client: Client,
    download_dir: PathBuf,
    max_file_size: u64,
}

impl DocumentFetcher {
    pub fn new(config: &Config) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/pdf,application/octet-stream,*/*"));

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.download_timeout())
            .build()?;

        Ok(Self {
            client,
            download_dir: PathBuf::from(&config.download_dir),
            max_file_size: config.max_file_size,
        })
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// 文档在本地的路径：`{download_dir}/document_{id}.pdf`
    ///
    /// ID 只允许 ASCII 字母、数字、`-` 和 `_`
    pub fn document_path(&self, id: &str) -> AppResult<PathBuf> {
        let valid = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(DocumentError::InvalidId(id.to_string()).into());
        }
        Ok(self.download_dir.join(format!("document_{}.pdf", id)))
    }

    /// 下载文档
    ///
    /// # 参数
    /// - `url`: 文档绝对地址
    /// - `id`: 调用方分配的文档 ID
    ///
    /// # 返回
    /// 本地已有有效文件时不访问网络，直接返回该文件
    pub async fn fetch(&self, url: &str, id: &str) -> AppResult<DownloadedDocument> {
        let path = self.document_path(id)?;

        if fs::try_exists(&path).await.map_err(|e| AppError::io(&path, e))? {
            match validate(&path).await {
                Ok(()) => {
                    info!("📄 文档 {} 已存在且有效，跳过下载", path.display());
                    return describe(&path).await;
                }
                Err(AppError::Document(DocumentError::InvalidDocument(reason))) => {
                    warn!("已有文档 {} 无效 ({})，重新下载", path.display(), reason);
                    fs::remove_file(&path).await.map_err(|e| AppError::io(&path, e))?;
                }
                Err(e) => return Err(e),
            }
        }

        fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|e| AppError::io(&self.download_dir, e))?;

        info!("⬇️  下载文档: {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !content_type.contains("pdf") && !content_type.contains("octet-stream") {
            warn!("文档类型异常: {:?}", content_type);
        }

        if let Some(length) = response.content_length() {
            if length > self.max_file_size {
                error!("文档过大: {} 字节 (上限 {})", length, self.max_file_size);
                return Err(DocumentError::FileTooLarge {
                    size: length,
                    limit: self.max_file_size,
                }
                .into());
            }
        }

        let part_path = path.with_extension("pdf.part");
        let written = match self.stream_to_file(response, &part_path).await {
            Ok(written) => written,
            Err(e) => {
                remove_quietly(&part_path).await;
                return Err(e);
            }
        };

        if let Err(e) = validate(&part_path).await {
            error!("下载的文件不是有效的 PDF: {}", e);
            remove_quietly(&part_path).await;
            return Err(e);
        }

        fs::rename(&part_path, &path).await.map_err(|e| AppError::io(&path, e))?;
        info!("✓ 文档下载完成: {} ({} 字节)", path.display(), written);

        describe(&path).await
    }

    /// 流式写入文件，超过上限立即中止
    async fn stream_to_file(&self, mut response: reqwest::Response, part_path: &Path) -> AppResult<u64> {
        let mut file = fs::File::create(part_path)
            .await
            .map_err(|e| AppError::io(part_path, e))?;

        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            written += chunk.len() as u64;
            if written > self.max_file_size {
                error!("下载过程中超过大小上限 ({} 字节)", self.max_file_size);
                return Err(DocumentError::FileTooLarge {
                    size: written,
                    limit: self.max_file_size,
                }
                .into());
            }
            file.write_all(&chunk).await.map_err(|e| AppError::io(part_path, e))?;
        }

        file.flush().await.map_err(|e| AppError::io(part_path, e))?;
        Ok(written)
    }

    /// 删除修改时间早于 `older_than_days` 天的文件
    ///
    /// # 返回
    /// 删除的文件数量；单个文件删除失败只记录日志
    pub async fn cleanup(&self, older_than_days: u64) -> AppResult<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(Duration::from_secs(older_than_days * SECONDS_PER_DAY))
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut entries = match fs::read_dir(&self.download_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(AppError::io(&self.download_dir, e)),
        };

        let mut deleted = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::io(&self.download_dir, e))?
        {
            let path = entry.path();
            let modified = match entry.metadata().await.and_then(|m| {
                if m.is_file() {
                    m.modified().map(Some)
                } else {
                    Ok(None)
                }
            }) {
                Ok(Some(modified)) => modified,
                Ok(None) => continue,
                Err(e) => {
                    warn!("读取文件信息失败 {}: {}", path.display(), e);
                    continue;
                }
            };

            if modified < cutoff {
                match fs::remove_file(&path).await {
                    Ok(()) => {
                        debug!("已删除过期文件: {}", path.display());
                        deleted += 1;
                    }
                    Err(e) => warn!("删除过期文件失败 {}: {}", path.display(), e),
                }
            }
        }

        info!("🧹 清理完成，删除 {} 个超过 {} 天的文件", deleted, older_than_days);
        Ok(deleted)
    }
}

/// 校验 PDF：非空、以 `%PDF` 开头、结构解析后页数为正
///
/// 结构解析失败视为有效，只有文件头不符、文件为空或解析出零页才判定无效
pub async fn validate(path: &Path) -> AppResult<()> {
    let mut file = fs::File::open(path).await.map_err(|e| AppError::io(path, e))?;
    let size = file.metadata().await.map_err(|e| AppError::io(path, e))?.len();
    if size == 0 {
        return Err(DocumentError::InvalidDocument("empty file".to_string()).into());
    }

    let mut header = [0u8; 4];
    let header_ok = match file.read_exact(&mut header).await {
        Ok(_) => &header == PDF_MAGIC,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => false,
        Err(e) => return Err(AppError::io(path, e)),
    };
    if !header_ok {
        return Err(DocumentError::InvalidDocument("missing %PDF header".to_string()).into());
    }

    match load_pdf(path).await {
        Some(document) if document.get_pages().is_empty() => {
            Err(DocumentError::InvalidDocument("document has no pages".to_string()).into())
        }
        Some(document) => {
            debug!("PDF 结构解析成功，共 {} 页", document.get_pages().len());
            Ok(())
        }
        None => Ok(()),
    }
}

/// 在阻塞线程中解析 PDF 结构，失败返回 `None`
async fn load_pdf(path: &Path) -> Option<Document> {
    let owned = path.to_path_buf();
    match tokio::task::spawn_blocking(move || Document::load(&owned)).await {
        Ok(Ok(document)) => Some(document),
        Ok(Err(e)) => {
            debug!("PDF 结构解析失败，按文件头判定: {}", e);
            None
        }
        Err(e) => {
            warn!("PDF 解析任务异常: {}", e);
            None
        }
    }
}

/// 计算文件的 SHA-256（小写十六进制）
pub async fn checksum(path: &Path) -> AppResult<String> {
    let mut file = fs::File::open(path).await.map_err(|e| AppError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];
    loop {
        let read = file.read(&mut buffer).await.map_err(|e| AppError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// 读取 PDF 的页数、大小、校验和与元数据
///
/// 文件不存在时返回全空的信息
pub async fn pdf_info(path: &Path) -> AppResult<PdfInfo> {
    let metadata = match fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PdfInfo::default()),
        Err(e) => return Err(AppError::io(path, e)),
    };

    let mut info = PdfInfo {
        size_bytes: metadata.len(),
        checksum: Some(checksum(path).await?),
        ..PdfInfo::default()
    };

    if let Some(document) = load_pdf(path).await {
        info.valid = true;
        info.pages = document.get_pages().len();
        info.title = info_string(&document, b"Title");
        info.author = info_string(&document, b"Author");
    }

    Ok(info)
}

/// 从文档 Info 字典中读取字符串字段
fn info_string(document: &Document, key: &[u8]) -> Option<String> {
    let info = match document.trailer.get(b"Info").ok()? {
        Object::Reference(id) => document.get_object(*id).ok()?,
        other => other,
    };
    let bytes = info.as_dict().ok()?.get(key).ok()?.as_str().ok()?;
    let text = decode_pdf_string(bytes);
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// PDF 文本字符串：带 BOM 的为 UTF-16BE，否则按 UTF-8 宽松解码
fn decode_pdf_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// 文件已通过校验，补齐大小和校验和
async fn describe(path: &Path) -> AppResult<DownloadedDocument> {
    let size_bytes = fs::metadata(path).await.map_err(|e| AppError::io(path, e))?.len();
    Ok(DownloadedDocument {
        local_path: path.to_path_buf(),
        size_bytes,
        checksum: checksum(path).await?,
        valid: true,
    })
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("删除临时文件失败 {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAKE_PDF: &[u8] = b"%PDF-1.4\n%fake\n%%EOF\n";

    fn fetcher(dir: &Path) -> DocumentFetcher {
        let config = Config {
            download_dir: dir.display().to_string(),
            ..Config::default()
        };
        DocumentFetcher::new(&config).unwrap()
    }

    #[test]
    fn test_document_path_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(dir.path());
        assert_eq!(
            fetcher.document_path("42").unwrap(),
            dir.path().join("document_42.pdf")
        );
        assert!(fetcher.document_path("case-7_a").is_ok());
        for bad in ["", "../etc", "a/b", "a b", "x.pdf"] {
            assert!(matches!(
                fetcher.document_path(bad),
                Err(AppError::Document(DocumentError::InvalidId(_)))
            ));
        }
    }

    #[tokio::test]
    async fn test_validate_rules() {
        let dir = tempfile::tempdir().unwrap();

        let empty = dir.path().join("empty.pdf");
        std::fs::write(&empty, b"").unwrap();
        assert!(validate(&empty).await.is_err());

        let html = dir.path().join("page.pdf");
        std::fs::write(&html, b"<html>not a pdf</html>").unwrap();
        assert!(matches!(
            validate(&html).await,
            Err(AppError::Document(DocumentError::InvalidDocument(_)))
        ));

        let short = dir.path().join("short.pdf");
        std::fs::write(&short, b"%P").unwrap();
        assert!(validate(&short).await.is_err());

        // 结构解析失败但文件头正确，视为有效
        let fake = dir.path().join("fake.pdf");
        std::fs::write(&fake, FAKE_PDF).unwrap();
        assert!(validate(&fake).await.is_ok());
    }

    #[tokio::test]
    async fn test_checksum_is_lowercase_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.bin");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            checksum(&path).await.unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_pdf_info_on_missing_and_unparsable_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = pdf_info(&dir.path().join("nope.pdf")).await.unwrap();
        assert_eq!(missing, PdfInfo::default());

        let fake = dir.path().join("fake.pdf");
        std::fs::write(&fake, FAKE_PDF).unwrap();
        let info = pdf_info(&fake).await.unwrap();
        assert!(!info.valid);
        assert_eq!(info.pages, 0);
        assert_eq!(info.size_bytes, FAKE_PDF.len() as u64);
        assert_eq!(info.checksum.as_deref().map(str::len), Some(64));
    }

    #[tokio::test]
    async fn test_existing_valid_file_is_reused_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(dir.path());
        std::fs::write(dir.path().join("document_9.pdf"), FAKE_PDF).unwrap();

        // 地址不可达，若发起请求必然失败
        let doc = fetcher.fetch("http://127.0.0.1:9/never.pdf", "9").await.unwrap();
        assert!(doc.valid);
        assert_eq!(doc.size_bytes, FAKE_PDF.len() as u64);
    }

    #[test]
    fn test_decode_pdf_string() {
        assert_eq!(decode_pdf_string(b"Order"), "Order");
        assert_eq!(decode_pdf_string(&[0xFE, 0xFF, 0x00, 0x4F, 0x00, 0x4B]), "OK");
    }
}
