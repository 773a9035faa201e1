// ==========================================
// 企业名录系统 - 登録日解析
// ==========================================
// 宽松语法: 核对阶段（按固定顺序尝试多种格式，首个成功者胜出）
// 严格语法: 登録阶段（仅 yyyy/MM/dd）
// 日超出当月天数（≤31）时修正为月末
// ==========================================

use chrono::format::{parse, Parsed, StrftimeItems};
use chrono::{Datelike, Months, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

/// 一种日期格式
///
/// - shape: 位数约束（chrono 的数值项不限定最少位数）
/// - format: chrono strftime 格式
struct DatePattern {
    shape: Regex,
    format: &'static str,
}

impl DatePattern {
    fn new(shape: &str, format: &'static str) -> Self {
        Self {
            shape: Regex::new(shape).expect("valid regex"),
            format,
        }
    }

    /// 解析为年/月/日字段，再按月末修正
    fn parse(&self, text: &str) -> Option<NaiveDate> {
        if !self.shape.is_match(text) {
            return None;
        }

        let mut parsed = Parsed::new();
        parse(&mut parsed, text, StrftimeItems::new(self.format)).ok()?;

        // yy → 20yy
        let year = match parsed.year() {
            Some(year) => year,
            None => 2000 + parsed.year_mod_100()?,
        };
        resolve(year, parsed.month()?, parsed.day()?)
    }
}

/// 宽松语法的尝试顺序
static FLEXIBLE_PATTERNS: LazyLock<Vec<DatePattern>> = LazyLock::new(|| {
    vec![
        DatePattern::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$", "%Y-%m-%d"),
        DatePattern::new(r"^[0-9]{4}/[0-9]{2}/[0-9]{2}$", "%Y/%m/%d"),
        DatePattern::new(r"^[0-9]{4}-[0-9]{1,2}-[0-9]{1,2}$", "%Y-%m-%d"),
        DatePattern::new(r"^[0-9]{4}/[0-9]{1,2}/[0-9]{1,2}$", "%Y/%m/%d"),
        DatePattern::new(r"^[0-9]{4}年[0-9]{2}月[0-9]{2}日$", "%Y年%m月%d日"),
        DatePattern::new(r"^[0-9]{1,2}/[0-9]{1,2}/[0-9]{2}$", "%m/%d/%y"),
        DatePattern::new(r"^[0-9]{2}/[0-9]{2}/[0-9]{2}$", "%m/%d/%y"),
        DatePattern::new(r"^[0-9]{1,2}/[0-9]{1,2}/[0-9]{4}$", "%m/%d/%Y"),
        DatePattern::new(r"^[0-9]{2}/[0-9]{2}/[0-9]{4}$", "%m/%d/%Y"),
    ]
});

static STRICT_PATTERN: LazyLock<DatePattern> =
    LazyLock::new(|| DatePattern::new(r"^[0-9]{4}/[0-9]{2}/[0-9]{2}$", "%Y/%m/%d"));

/// 宽松解析（核对阶段）
///
/// 全部格式失败后回退到 ISO（YYYY-MM-DD）解析
pub fn parse_flexible(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    FLEXIBLE_PATTERNS
        .iter()
        .find_map(|pattern| pattern.parse(text))
        .or_else(|| NaiveDate::parse_from_str(text, "%Y-%m-%d").ok())
}

/// 严格解析（登録阶段，仅 yyyy/MM/dd）
pub fn parse_strict(text: &str) -> Option<NaiveDate> {
    STRICT_PATTERN.parse(text.trim())
}

fn resolve(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    if year < 1 {
        return None;
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last_day = first.checked_add_months(Months::new(1))?.pred_opt()?.day();
    first.with_day(day.min(last_day))
}
