//! 案件类型及其启发式查找表
//!
//! 所有与案件类型相关的固定表（站点简码、案号前缀、下拉框别名、提示文案）
//! 集中在这里，表单填写和结果解析只依赖这些纯函数。

use serde::{Deserialize, Serialize};

/// 案件类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseType {
    Civil,
    Criminal,
    Writ,
    Company,
    Arbitration,
    Tax,
    Matrimonial,
    MotorAccident,
    Rent,
    Labor,
}

/// 输入字符串（小写）到案件类型的映射，包含常见缩写
static CASE_TYPE_NAMES: phf::Map<&'static str, CaseType> = phf::phf_map! {
    "civil" => CaseType::Civil,
    "criminal" => CaseType::Criminal,
    "writ" => CaseType::Writ,
    "company" => CaseType::Company,
    "arbitration" => CaseType::Arbitration,
    "tax" => CaseType::Tax,
    "matrimonial" => CaseType::Matrimonial,
    "motor_accident" => CaseType::MotorAccident,
    "motor accident" => CaseType::MotorAccident,
    "rent" => CaseType::Rent,
    "labor" => CaseType::Labor,
    "labour" => CaseType::Labor,
    "crl" => CaseType::Criminal,
    "crl." => CaseType::Criminal,
    "crl.a." => CaseType::Criminal,
    "wp" => CaseType::Writ,
    "w.p." => CaseType::Writ,
};

impl CaseType {
    pub const ALL: [CaseType; 10] = [
        CaseType::Civil,
        CaseType::Criminal,
        CaseType::Writ,
        CaseType::Company,
        CaseType::Arbitration,
        CaseType::Tax,
        CaseType::Matrimonial,
        CaseType::MotorAccident,
        CaseType::Rent,
        CaseType::Labor,
    ];

    /// 规范名称（小写，与调用方传入的值一致）
    pub fn name(self) -> &'static str {
        match self {
            CaseType::Civil => "civil",
            CaseType::Criminal => "criminal",
            CaseType::Writ => "writ",
            CaseType::Company => "company",
            CaseType::Arbitration => "arbitration",
            CaseType::Tax => "tax",
            CaseType::Matrimonial => "matrimonial",
            CaseType::MotorAccident => "motor_accident",
            CaseType::Rent => "rent",
            CaseType::Labor => "labor",
        }
    }

    /// 直查 URL 使用的站点简码
    pub fn short_code(self) -> &'static str {
        match self {
            CaseType::Civil => "CS",
            CaseType::Criminal => "CRL",
            CaseType::Writ => "WP",
            CaseType::Company => "CO",
            CaseType::Arbitration => "ARB",
            CaseType::Tax => "ITA",
            CaseType::Matrimonial => "MAT",
            CaseType::MotorAccident => "MAC",
            CaseType::Rent => "RC",
            CaseType::Labor => "LPA",
        }
    }

    /// 案号前缀表，第一个为规范前缀
    pub fn prefixes(self) -> &'static [&'static str] {
        match self {
            CaseType::Tax => &["ITXA", "TA", "ITA", "ITAT", "TAX"],
            CaseType::Criminal => &["CRL", "CRL.A.", "CRL.M.C.", "CRL.REV.P.", "CRIMINAL"],
            CaseType::Civil => &["CS", "C.S.", "CIVIL", "CIVIL SUIT"],
            CaseType::Writ => &["W.P.", "W.P.(C)", "W.P.(CRL)", "WRIT"],
            CaseType::Company => &["CO", "CO.", "COMPANY", "CP"],
            CaseType::Arbitration => &["ARB", "ARB.P.", "ARB.A."],
            CaseType::Matrimonial => &["MAT", "MAT.A."],
            CaseType::MotorAccident => &["MAC", "MAC.APP."],
            CaseType::Rent => &["RC", "R.C.REV."],
            CaseType::Labor => &["LPA", "LAB"],
        }
    }

    /// 下拉框选项别名，按优先级排列
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            CaseType::Civil => &[
                "CIVIL", "CIVIL APPEAL", "CIVIL SUIT", "CS", "C.S.", "CIV", "C.A.", "CIVIL CASE",
                "REGULAR CIVIL SUIT",
            ],
            CaseType::Criminal => &[
                "CRIMINAL", "CRL", "CRL.", "CRL.A.", "CRL.M.C.", "CRIMINAL APPEAL", "CRIMINAL CASE",
                "CRL.REV.P.", "BAIL", "SESSIONS",
            ],
            CaseType::Writ => &[
                "WRIT", "W.P.", "W.P.(C)", "W.P.(CRL)", "WRIT PETITION", "WP", "WPC", "WPCRL",
                "WRIT CASE", "HABEAS CORPUS",
            ],
            CaseType::Company => &[
                "COMPANY", "CO", "CO.", "COMPANY APPEAL", "COMP", "CP", "COMPANY CASE", "CA",
                "COMP.A.", "COMPANY PETITION",
            ],
            CaseType::Arbitration => &[
                "ARB", "ARB.", "ARB.A.", "ARBITRATION", "ARB.P.", "ARBITRATION PETITION",
                "ARBITRATION APPEAL", "ARB. CASE",
            ],
            CaseType::Matrimonial => &[
                "MAT", "MAT.A.", "MATRIMONIAL", "MCA", "MC", "MATRI", "MARRIAGE",
                "MATRIMONIAL CASE", "FAMILY",
            ],
            CaseType::Tax => &[
                "TAX", "ITXA", "TA", "ITA", "ITAT", "TAX APPEAL", "INCOME TAX APPEAL", "TAX CASE",
                "INCOME TAX", "ST", "SERVICE TAX", "GST", "VAT",
            ],
            CaseType::MotorAccident => &[
                "MAC", "MAC.APP.", "MOTOR ACCIDENT", "MACT", "MAC.A.", "MA", "MOTOR", "MOTOR CASE",
                "ACCIDENT CLAIM",
            ],
            CaseType::Rent => &[
                "RC", "R.C.REV.", "RENT CONTROL", "RENT", "RCR", "RCA", "RENT CASE", "TENANCY",
                "EVICTION",
            ],
            CaseType::Labor => &[
                "LPA", "LABOR", "LABOUR", "LAB", "LC", "LCA", "WC", "WORKMEN",
                "INDUSTRIAL DISPUTE", "SERVICE",
            ],
        }
    }

    /// 案号是否已带有本类型的前缀（不区分大小写，锚定开头）
    pub fn has_known_prefix(self, case_number: &str) -> bool {
        let upper = case_number.trim().to_uppercase();
        self.prefixes().iter().any(|prefix| upper.starts_with(prefix))
    }

    /// "未找到"时给出的前缀提示
    pub fn prefix_hint(self) -> String {
        let shown: Vec<String> = self
            .prefixes()
            .iter()
            .take(3)
            .map(|p| format!("'{}'", p))
            .collect();
        match shown.as_slice() {
            [only] => format!("Try adding a prefix like {} before the case number", only),
            [init @ .., last] => format!(
                "Try adding a prefix like {} or {} before the case number",
                init.join(", "),
                last
            ),
            [] => "Try adding a prefix specific to the case type".to_string(),
        }
    }

    /// 解析调用方传入的案件类型（支持缩写，忽略大小写和首尾空白）
    pub fn parse(input: &str) -> Option<Self> {
        let key = input.trim().to_lowercase();
        CASE_TYPE_NAMES.get(key.as_str()).copied()
    }
}

impl std::fmt::Display for CaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for CaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Unknown case type: {}", s.trim()))
    }
}
