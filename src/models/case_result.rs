//! 对外结果信封
//!
//! 字段集合是持久化层和页面层依赖的契约，不能改变形状

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::query::CaseQuery;

/// 未解析出状态时的默认值
pub const STATUS_UNKNOWN: &str = "Unknown";

pub const ROLE_PETITIONER: &str = "petitioner";
pub const ROLE_RESPONDENT: &str = "respondent";
pub const ROLE_ADVOCATE: &str = "advocate";

/// 案件文档引用（下载之前）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    #[serde(rename = "type")]
    pub doc_type: String,
    pub description: String,
    /// 总是绝对地址
    pub url: String,
    pub date: Option<NaiveDate>,
}

impl DocumentRef {
    /// 由地址派生的本地文档 ID（地址 SHA-256 的前 16 位十六进制）
    ///
    /// 同一地址总是得到同一个 ID，不同案件的文档不会共用本地文件
    pub fn storage_id(&self) -> String {
        let digest = Sha256::digest(self.url.as_bytes());
        digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
    }
}

/// 案件检索结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    pub success: bool,
    pub error: Option<String>,
    pub case_type: String,
    pub case_number: String,
    pub filing_year: Option<i32>,
    /// 角色 -> 名称
    pub parties: BTreeMap<String, String>,
    pub filing_date: Option<NaiveDate>,
    pub next_hearing_date: Option<NaiveDate>,
    pub status: String,
    pub documents: Vec<DocumentRef>,
    pub case_details: BTreeMap<String, String>,
    pub suggestions: Option<Vec<String>>,
}

impl CaseResult {
    /// 为查询创建一个空结果（尚未判定成功）
    pub fn empty(query: &CaseQuery) -> Self {
        Self {
            success: false,
            error: None,
            case_type: query.case_type.name().to_string(),
            case_number: query.case_number.clone(),
            filing_year: Some(query.filing_year),
            parties: BTreeMap::new(),
            filing_date: None,
            next_hearing_date: None,
            status: STATUS_UNKNOWN.to_string(),
            documents: Vec::new(),
            case_details: BTreeMap::new(),
            suggestions: None,
        }
    }

    /// 失败结果
    pub fn failure(query: &CaseQuery, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::empty(query)
        }
    }

    /// 参数校验失败的结果，保留调用方的原始输入
    pub fn invalid(case_type: &str, case_number: &str, filing_year: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            case_type: case_type.to_string(),
            case_number: case_number.to_string(),
            filing_year: filing_year.trim().parse().ok(),
            parties: BTreeMap::new(),
            filing_date: None,
            next_hearing_date: None,
            status: STATUS_UNKNOWN.to_string(),
            documents: Vec::new(),
            case_details: BTreeMap::new(),
            suggestions: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = Some(suggestions);
        self
    }

    /// 是否提取到了足以判定成功的数据
    pub fn has_case_data(&self) -> bool {
        !self.parties.is_empty() || !self.case_details.is_empty() || self.status != STATUS_UNKNOWN
    }

    pub fn petitioner(&self) -> Option<&str> {
        self.parties.get(ROLE_PETITIONER).map(String::as_str)
    }

    pub fn respondent(&self) -> Option<&str> {
        self.parties.get(ROLE_RESPONDENT).map(String::as_str)
    }
}
