//! 搜索表单填写服务 - 业务能力层
//!
//! 目标站点的字段名不固定，每个字段按一组定位策略逐个尝试。
//! 选项匹配逻辑是纯函数，可以脱离浏览器单独测试。

use tracing::{debug, info, warn};

use crate::browser::{BrowserSession, Control, Matcher, PageCondition, SelectOption};
use crate::error::{AppResult, FormError};
use crate::models::{CaseQuery, CaseType};

/// 案件类型下拉框
const CASE_TYPE_LADDER: &[Matcher] = &[
    Matcher::ById("case_type_sel"),
    Matcher::ByName("case_type"),
    Matcher::ByName("caseType"),
    Matcher::ByAttributeSubstring {
        tag: "select",
        attrs: &["id", "name"],
        needle: "case",
    },
    Matcher::ByAttributeSubstring {
        tag: "select",
        attrs: &["id", "name"],
        needle: "type",
    },
    Matcher::Positional("select"),
];

/// 案号输入框
const CASE_NUMBER_LADDER: &[Matcher] = &[
    Matcher::ById("case_no"),
    Matcher::ByName("case_no"),
    Matcher::ByName("caseNo"),
    Matcher::ByAttributeSubstring {
        tag: "input",
        attrs: &["id", "name"],
        needle: "case_no",
    },
    Matcher::ByAttributeSubstring {
        tag: "input",
        attrs: &["placeholder"],
        needle: "number",
    },
    Matcher::ByAttributeSubstring {
        tag: "input",
        attrs: &["placeholder"],
        needle: "case",
    },
    Matcher::Positional("input[type='text']"),
];

/// 年份控件（下拉框或输入框）
const YEAR_LADDER: &[Matcher] = &[
    Matcher::ByName("cmbYear"),
    Matcher::ById("case_year"),
    Matcher::ByName("filing_year"),
    Matcher::ByAttributeSubstring {
        tag: "select",
        attrs: &["id", "name"],
        needle: "year",
    },
    Matcher::ByAttributeSubstring {
        tag: "input",
        attrs: &["id", "name"],
        needle: "year",
    },
    Matcher::Positional("input[type='number']"),
];

/// 提交按钮
const SUBMIT_LADDER: &[Matcher] = &[
    Matcher::ByCss("input[type='submit'], button[type='submit']"),
    Matcher::ByText {
        tag: "button",
        needle: "search",
    },
    Matcher::ByAttributeSubstring {
        tag: "input",
        attrs: &["value"],
        needle: "search",
    },
    Matcher::ByAttributeSubstring {
        tag: "button",
        attrs: &["class"],
        needle: "search",
    },
    Matcher::Positional("button"),
];

/// 占位选项文本（小写）
const PLACEHOLDER_TEXTS: &[&str] = &["select", "select type", "choose"];

fn is_placeholder(option: &SelectOption) -> bool {
    let text = option.text.trim().to_lowercase();
    text.is_empty()
        || PLACEHOLDER_TEXTS.contains(&text.as_str())
        || text.starts_with("select")
        || text.starts_with("--")
}

/// 为案件类型挑选下拉框选项
///
/// 顺序：别名与选项文本完全相同 → 选项文本包含别名 → 第一个非占位选项
///
/// # 返回
/// 选中选项的下标
pub fn resolve_case_type_option(options: &[SelectOption], case_type: CaseType) -> Option<usize> {
    let aliases = case_type.aliases();

    for alias in aliases {
        if let Some(option) = options.iter().find(|o| o.text.trim().eq_ignore_ascii_case(alias)) {
            return Some(option.index);
        }
    }

    for option in options {
        let text = option.text.to_uppercase();
        if aliases.iter().any(|alias| text.contains(alias)) {
            return Some(option.index);
        }
    }

    options.iter().find(|o| !is_placeholder(o)).map(|o| o.index)
}

/// 为年份挑选下拉框选项
///
/// 顺序：value 完全相同 → 文本完全相同 → 文本包含年份
pub fn resolve_year_option(options: &[SelectOption], year: i32) -> Option<usize> {
    let year = year.to_string();
    options
        .iter()
        .find(|o| o.value.trim() == year)
        .or_else(|| options.iter().find(|o| o.text.trim() == year))
        .or_else(|| options.iter().find(|o| o.text.contains(&year)))
        .map(|o| o.index)
}

/// 表单填写服务
///
/// 职责：
/// - 定位案件类型、案号、年份控件并填值
/// - 按优先级尝试各种提交方式
/// - 不关心结果页面
#[derive(Debug, Default, Clone, Copy)]
pub struct FormFiller;

impl FormFiller {
    pub fn new() -> Self {
        Self
    }

    /// 填写并提交搜索表单
    ///
    /// # 参数
    /// - `session`: 已打开搜索页的浏览器会话
    /// - `query`: 本次要搜索的变体
    ///
    /// # 返回
    /// 案号或年份控件缺失、或所有提交方式都失败时返回 `FormError`；
    /// 案件类型选择失败不影响提交
    pub async fn fill_and_submit(&self, session: &dyn BrowserSession, query: &CaseQuery) -> AppResult<()> {
        let case_type_control = session.find_first(CASE_TYPE_LADDER).await;

        let Some((number_matcher, number_control)) = session.find_first(CASE_NUMBER_LADDER).await else {
            let has_form = session.check(PageCondition::FormPresent).await.unwrap_or(false);
            warn!("[案件 {}] 找不到案号输入框", query);
            return Err(if has_form {
                FormError::NoSearchableControl { field: "case number" }.into()
            } else {
                FormError::NoFormFound.into()
            });
        };
        debug!("案号输入框: {}", number_matcher);

        let Some((year_matcher, year_control)) = session.find_first(YEAR_LADDER).await else {
            warn!("[案件 {}] 找不到年份控件", query);
            return Err(FormError::NoSearchableControl { field: "filing year" }.into());
        };
        debug!("年份控件: {}", year_matcher);

        match case_type_control {
            Some((matcher, control)) => {
                if let Err(e) = self.fill_case_type(session, &control, query.case_type).await {
                    warn!("[案件 {}] 选择案件类型失败，继续搜索: {}", query, e);
                } else {
                    debug!("案件类型控件: {}", matcher);
                }
            }
            None => warn!("[案件 {}] 找不到案件类型控件，使用页面默认值", query),
        }

        session.set_value(&number_control, &query.case_number).await?;
        self.fill_year(session, &year_control, query.filing_year).await?;
        info!("[案件 {}] ✓ 表单填写完成", query);

        self.submit(session, &number_control).await
    }

    async fn fill_case_type(&self, session: &dyn BrowserSession, control: &Control, case_type: CaseType) -> AppResult<()> {
        if control.is_dropdown() {
            match resolve_case_type_option(&control.options, case_type) {
                Some(index) => {
                    debug!("案件类型选中选项 #{}: {:?}", index, control.options.get(index).map(|o| &o.text));
                    session.select_option(control, index).await
                }
                None => {
                    warn!("案件类型下拉框没有可用选项");
                    Ok(())
                }
            }
        } else if control.accepts_text() {
            session.set_value(control, case_type.short_code()).await
        } else {
            Ok(())
        }
    }

    async fn fill_year(&self, session: &dyn BrowserSession, control: &Control, year: i32) -> AppResult<()> {
        if control.is_dropdown() {
            match resolve_year_option(&control.options, year) {
                Some(index) => session.select_option(control, index).await,
                None => {
                    // 保留页面默认年份，交给站点判断
                    warn!("年份下拉框中没有 {}", year);
                    Ok(())
                }
            }
        } else {
            session.set_value(control, &year.to_string()).await
        }
    }

    /// 依次尝试：点击提交按钮 → 表单自身提交 → 脚本提交 → 在案号框按回车
    async fn submit(&self, session: &dyn BrowserSession, number_control: &Control) -> AppResult<()> {
        if let Some((matcher, button)) = session.find_first(SUBMIT_LADDER).await {
            match session.click(&button).await {
                Ok(()) => {
                    debug!("通过 {} 提交", matcher);
                    return Ok(());
                }
                Err(e) => warn!("点击提交按钮失败: {}", e),
            }
        }

        match session.submit_form().await {
            Ok(()) => {
                debug!("通过表单 submit 提交");
                return Ok(());
            }
            Err(e) => debug!("表单 submit 失败: {}", e),
        }

        match session.submit_via_script().await {
            Ok(()) => {
                debug!("通过脚本提交");
                return Ok(());
            }
            Err(e) => debug!("脚本提交失败: {}", e),
        }

        match session.press_enter(number_control).await {
            Ok(()) => {
                debug!("通过回车提交");
                Ok(())
            }
            Err(e) => {
                warn!("所有提交方式都失败，最后一次错误: {}", e);
                Err(FormError::SubmissionFailed.into())
            }
        }
    }
}
