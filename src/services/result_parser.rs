//! 结果页解析服务 - 业务能力层
//!
//! 站点结果页没有固定结构，只能依靠关键词表和正则：
//! 1. 先检查"未找到"类提示，命中即判定失败
//! 2. 没有表格时检查结果关键词，都没有即判定失败
//! 3. 逐行读取表格，首列标签按关键词归类
//! 4. 收集文档链接
//! 5. 表格中没有当事人时用正则从正文兜底
//! 6. 没有提取到任何数据即判定失败

use std::collections::HashSet;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{AppError, AppResult, SiteError};
use crate::models::case_result::{ROLE_ADVOCATE, ROLE_PETITIONER, ROLE_RESPONDENT};
use crate::models::{CaseQuery, CaseResult, DocumentRef};

/// 页面明确表示没有该案件的短语（小写）
pub const NO_RECORD_PHRASES: [&str; 15] = [
    "no record found",
    "no records found",
    "case not found",
    "invalid case number",
    "no matching records",
    "no result found",
    "not available",
    "could not find",
    "record does not exist",
    "please enter valid",
    "no entries found",
    "please search again",
    "no case found",
    "invalid input",
    "incorrect case",
];

/// 没有表格时，说明页面可能含有结果的关键词（小写）
pub const RESULT_INDICATORS: [&str; 15] = [
    "case details",
    "status",
    "petitioner",
    "respondent",
    "advocate",
    "filing date",
    "listing date",
    "hearing date",
    "next date",
    "case number",
    "case status",
    "bench",
    "judge",
    "court no",
    "case type",
];

/// 日期格式，按顺序尝试
const DATE_FORMATS: [&str; 7] = [
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%Y-%m-%d",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
];

const NUMERIC_DATE_PATTERN: &str = r"\b(\d{1,2}[/.\-]\d{1,2}[/.\-]\d{4})\b";

/// 表格标签归类后的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelField {
    Petitioner,
    Respondent,
    Advocate,
    FilingDate,
    NextHearingDate,
    Status,
}

/// 标签关键词 -> 字段，按顺序匹配，第一个命中的生效
const LABEL_RULES: &[(&[&str], LabelField)] = &[
    (
        &["petitioner", "appellant", "applicant", "plaintiff", "complainant"],
        LabelField::Petitioner,
    ),
    (&["respondent", "defendant", "accused"], LabelField::Respondent),
    (&["advocate", "counsel", "lawyer"], LabelField::Advocate),
    (
        &["filing date", "date of filing", "registration date"],
        LabelField::FilingDate,
    ),
    (
        &["next date", "next hearing", "listing date", "hearing date"],
        LabelField::NextHearingDate,
    ),
    (&["status", "case status"], LabelField::Status),
];

/// 按关键词表归类表格首列标签（传入小写、已去空白的标签）
pub fn classify_label(label: &str) -> Option<LabelField> {
    LABEL_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| label.contains(k)))
        .map(|(_, field)| *field)
}

/// 解析日期，依次尝试固定格式；整体不匹配时再从文本中找数字日期
///
/// # 返回
/// 无法解析时返回 `None`，不视为错误
pub fn parse_date(text: &str, numeric_date_re: &Regex) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
    {
        return Some(date);
    }

    let embedded = numeric_date_re.captures(text)?.get(1)?.as_str().to_string();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&embedded, format).ok())
}

/// 根据链接文本给文档分类
pub fn classify_document(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    if lower.contains("judgment") || lower.contains("judgement") {
        "Judgment"
    } else if lower.contains("order") {
        "Order"
    } else if lower.contains("notice") {
        "Notice"
    } else if lower.contains("petition") {
        "Petition"
    } else {
        "Document"
    }
}

/// 合并连续空白并去掉首尾空白
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: &ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

/// 结果页解析服务
///
/// 职责：
/// - 把一段 HTML 变成 `CaseResult`
/// - 不访问网络，不持有页面
pub struct ResultParser {
    base_url: Url,
    row_selector: Selector,
    cell_selector: Selector,
    table_selector: Selector,
    link_selector: Selector,
    versus_re: Regex,
    petitioner_re: Regex,
    respondent_re: Regex,
    numeric_date_re: Regex,
}

fn selector(css: &str) -> AppResult<Selector> {
    Selector::parse(css).map_err(|e| AppError::Config(format!("invalid selector {:?}: {}", css, e)))
}

fn regex(pattern: &str) -> AppResult<Regex> {
    Regex::new(pattern).map_err(|e| AppError::Config(format!("invalid pattern {:?}: {}", pattern, e)))
}

impl ResultParser {
    /// 创建解析器
    ///
    /// # 参数
    /// - `base_url`: 站点根地址，用于把相对链接补全为绝对地址
    pub fn new(base_url: &str) -> AppResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("invalid base_url {:?}: {}", base_url, e)))?;
        Ok(Self {
            base_url,
            row_selector: selector("tr")?,
            cell_selector: selector("th, td")?,
            table_selector: selector("table")?,
            link_selector: selector("a[href]")?,
            versus_re: regex(r"(?im)^\s*(.+?)\s+(?:vs\.?|versus)\s+(.+?)\s*$")?,
            petitioner_re: regex(r"(?im)petitioner\s*:?\s*(.+?)(?:\s+vs\.?\s+|$)")?,
            respondent_re: regex(r"(?im)respondent\s*:?\s*(.+?)\s*$")?,
            numeric_date_re: regex(NUMERIC_DATE_PATTERN)?,
        })
    }

    /// 解析结果页，所有失败都写进结果信封
    pub fn parse(&self, html: &str, query: &CaseQuery) -> CaseResult {
        match self.extract(html, query) {
            Ok(result) => result,
            Err(e) => CaseResult::failure(query, e.to_string()),
        }
    }

    /// 解析结果页
    ///
    /// # 返回
    /// - `SiteError::NoRecordFound`: 页面含有"未找到"类提示
    /// - `SiteError::ParseFailure`: 页面没有可提取的结构或数据
    pub fn extract(&self, html: &str, query: &CaseQuery) -> AppResult<CaseResult> {
        if html.trim().is_empty() {
            return Err(SiteError::ParseFailure("No response received from the court website".to_string()).into());
        }

        let document = Html::parse_document(html);
        let page_text = document.root_element().text().collect::<Vec<_>>().join("\n");
        let flat_text = normalize_whitespace(&page_text).to_lowercase();

        if let Some(phrase) = NO_RECORD_PHRASES.iter().find(|p| flat_text.contains(*p)) {
            info!("[案件 {}] 站点提示未找到: '{}'", query, phrase);
            return Err(SiteError::NoRecordFound {
                case: query.to_string(),
            }
            .into());
        }

        let has_tables = document.select(&self.table_selector).next().is_some();
        if !has_tables {
            match RESULT_INDICATORS.iter().find(|i| flat_text.contains(*i)) {
                Some(indicator) => debug!("页面没有表格，但含有结果关键词 '{}'", indicator),
                None => {
                    warn!("[案件 {}] 页面既没有表格也没有结果关键词", query);
                    return Err(SiteError::ParseFailure("Could not find case data in the court response".to_string()).into());
                }
            }
        }

        let mut result = CaseResult::empty(query);
        self.extract_rows(&document, &mut result);
        result.documents = self.extract_documents(&document);

        if result.petitioner().is_none() && result.respondent().is_none() {
            self.extract_parties_from_text(&page_text, &mut result);
        }

        if !result.has_case_data() {
            warn!("[案件 {}] 收到响应但没有提取到案件数据", query);
            return Err(SiteError::ParseFailure(
                "Could not extract case details from the court website response.".to_string(),
            )
            .into());
        }

        result.success = true;
        info!(
            "[案件 {}] ✓ 解析成功: 当事人 {} 项, 详情 {} 项, 文档 {} 个, 状态 {}",
            query,
            result.parties.len(),
            result.case_details.len(),
            result.documents.len(),
            result.status
        );
        Ok(result)
    }

    /// 逐行读取表格，同一字段后出现的行覆盖先出现的
    fn extract_rows(&self, document: &Html, result: &mut CaseResult) {
        for row in document.select(&self.row_selector) {
            let cells: Vec<ElementRef<'_>> = row.select(&self.cell_selector).collect();
            if cells.len() < 2 {
                continue;
            }

            let label = element_text(&cells[0]).to_lowercase();
            let value = element_text(&cells[1]);
            if label.is_empty() || value.is_empty() {
                continue;
            }

            match classify_label(&label) {
                Some(LabelField::Petitioner) => {
                    result.parties.insert(ROLE_PETITIONER.to_string(), value);
                }
                Some(LabelField::Respondent) => {
                    result.parties.insert(ROLE_RESPONDENT.to_string(), value);
                }
                Some(LabelField::Advocate) => {
                    result.parties.insert(ROLE_ADVOCATE.to_string(), value);
                }
                Some(LabelField::FilingDate) => match parse_date(&value, &self.numeric_date_re) {
                    Some(date) => result.filing_date = Some(date),
                    None => {
                        debug!("无法解析立案日期 '{}'，保留原文", value);
                        result.case_details.insert(clean_label(&label), value);
                    }
                },
                Some(LabelField::NextHearingDate) => match parse_date(&value, &self.numeric_date_re) {
                    Some(date) => result.next_hearing_date = Some(date),
                    None => {
                        debug!("无法解析下次开庭日期 '{}'，保留原文", value);
                        result.case_details.insert(clean_label(&label), value);
                    }
                },
                Some(LabelField::Status) => result.status = value,
                None => {
                    result.case_details.insert(clean_label(&label), value);
                }
            }
        }
    }

    /// 收集文档链接，链接补全为绝对地址并按地址去重
    fn extract_documents(&self, document: &Html) -> Vec<DocumentRef> {
        let mut seen = HashSet::new();
        let mut documents = Vec::new();

        for link in document.select(&self.link_selector) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let lower = href.to_lowercase();
            if !(lower.contains("pdf") || lower.contains("/document/")) {
                continue;
            }

            let url = match self.base_url.join(href.trim()) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => url.to_string(),
                Ok(url) => {
                    debug!("跳过非 HTTP 文档链接: {}", url);
                    continue;
                }
                Err(e) => {
                    debug!("无法补全文档链接 {:?}: {}", href, e);
                    continue;
                }
            };
            if !seen.insert(url.clone()) {
                continue;
            }

            let text = element_text(&link);
            documents.push(DocumentRef {
                doc_type: classify_document(&text).to_string(),
                date: parse_date(&text, &self.numeric_date_re),
                description: if text.is_empty() {
                    "Court Document".to_string()
                } else {
                    text
                },
                url,
            });
        }

        documents
    }

    /// 用正则从正文中兜底提取当事人，"X vs Y" 命中时覆盖两者
    fn extract_parties_from_text(&self, page_text: &str, result: &mut CaseResult) {
        let first_capture = |re: &Regex| {
            re.captures(page_text)
                .and_then(|c| c.get(1))
                .map(|m| normalize_whitespace(m.as_str()))
                .filter(|s| !s.is_empty())
        };

        if let Some(petitioner) = first_capture(&self.petitioner_re) {
            result.parties.insert(ROLE_PETITIONER.to_string(), petitioner);
        }
        if let Some(respondent) = first_capture(&self.respondent_re) {
            result.parties.insert(ROLE_RESPONDENT.to_string(), respondent);
        }

        if let Some(captures) = self.versus_re.captures(page_text) {
            let petitioner = captures.get(1).map(|m| normalize_whitespace(m.as_str()));
            let respondent = captures.get(2).map(|m| normalize_whitespace(m.as_str()));
            if let (Some(petitioner), Some(respondent)) = (petitioner, respondent) {
                debug!("正文兜底匹配: {} vs {}", petitioner, respondent);
                result.parties.insert(ROLE_PETITIONER.to_string(), petitioner);
                result.parties.insert(ROLE_RESPONDENT.to_string(), respondent);
            }
        }
    }
}

fn clean_label(label: &str) -> String {
    label.replace(':', "").trim().to_string()
}
