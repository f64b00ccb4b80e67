//! 案件查询与搜索变体

use std::fmt::Display;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::case_type::CaseType;

/// 允许的最早立案年份
pub const MIN_FILING_YEAR: i32 = 1950;

/// 案件查询（类型 + 案号 + 立案年份）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseQuery {
    pub case_type: CaseType,
    pub case_number: String,
    pub filing_year: i32,
}

impl CaseQuery {
    /// 创建并校验查询
    pub fn new(case_type: CaseType, case_number: impl Into<String>, filing_year: i32) -> AppResult<Self> {
        let query = Self {
            case_type,
            case_number: case_number.into().trim().to_string(),
            filing_year,
        };
        query.validate()?;
        Ok(query)
    }

    /// 从表单原始输入解析查询
    ///
    /// # 返回
    /// 任一字段缺失、类型未知、年份非数字或越界时返回 `AppError::Validation`
    pub fn parse(case_type: &str, case_number: &str, filing_year: &str) -> AppResult<Self> {
        if case_type.trim().is_empty() || case_number.trim().is_empty() || filing_year.trim().is_empty() {
            return Err(AppError::validation(
                "Missing required parameters. Please provide case type, case number, and filing year.",
            ));
        }

        let year: i32 = filing_year
            .trim()
            .parse()
            .map_err(|_| AppError::validation("Filing year must be a valid number."))?;

        let case_type: CaseType = case_type.parse().map_err(AppError::Validation)?;

        Self::new(case_type, case_number, year)
    }

    /// 校验字段（不做任何网络访问）
    pub fn validate(&self) -> AppResult<()> {
        if self.case_number.trim().is_empty() {
            return Err(AppError::validation(
                "Missing required parameters. Please provide case type, case number, and filing year.",
            ));
        }

        let current_year = chrono::Local::now().year();
        if self.filing_year < MIN_FILING_YEAR || self.filing_year > current_year {
            return Err(AppError::Validation(format!(
                "Invalid filing year. Must be between {} and {}.",
                MIN_FILING_YEAR, current_year
            )));
        }

        Ok(())
    }

    /// 案号是否为纯数字
    pub fn is_numeric(&self) -> bool {
        !self.case_number.is_empty() && self.case_number.chars().all(|c| c.is_ascii_digit())
    }

    /// 案号是否已带本类型的前缀
    pub fn has_prefix(&self) -> bool {
        self.case_type.has_known_prefix(&self.case_number)
    }

    /// 以指定前缀构造新的查询
    pub fn with_prefix(&self, prefix: &str) -> Self {
        Self {
            case_type: self.case_type,
            case_number: format!("{} {}", prefix, self.case_number),
            filing_year: self.filing_year,
        }
    }

    /// 生成搜索变体
    ///
    /// 第一个总是原始查询；当案号为纯数字且不带任何已知前缀时，
    /// 追加一个使用规范前缀的变体
    pub fn variations(&self) -> Vec<CaseQuery> {
        let mut variations = vec![self.clone()];

        if let Some(first) = self.case_type.prefixes().first() {
            if !self.has_prefix() && self.is_numeric() {
                variations.push(self.with_prefix(first));
            }
        }

        variations
    }

    /// 顺序回退时尝试的备选前缀（最多一个）
    pub fn alternate_prefixes(&self) -> &'static [&'static str] {
        let prefixes = self.case_type.prefixes();
        if self.has_prefix() || prefixes.len() < 2 {
            return &[];
        }
        &prefixes[1..2]
    }
}

impl Display for CaseQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.case_type, self.case_number, self.filing_year)
    }
}
