// ==========================================
// 企业名录系统 - 字段校验
// ==========================================
// 职责: 行级硬约束，产出错误消息列表
// 规则: 各项独立判定，不提前退出，全部收集
// ==========================================

use crate::config::ImportConfig;
use crate::domain::RawRow;
use crate::importer::date_grammar::parse_flexible;
use crate::importer::normalizer::{char_len, present};
use crate::importer::reference_index::ReferenceIndex;
use regex::Regex;
use std::sync::LazyLock;

static DIGITS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("valid regex"));

static ZIP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{3}-[0-9]{4}$").expect("valid regex"));

/// 校验一行
///
/// # 返回
/// - 错误消息（按判定顺序）；空表示通过
pub fn validate(raw: &RawRow, index: &ReferenceIndex, config: &ImportConfig) -> Vec<String> {
    let mut errors = Vec::new();

    // 格式与字数按原文判定；空白视为未填写
    let name = present(raw.name.as_deref());
    let address = present(raw.address.as_deref());
    let zip_code = present(raw.zip_code.as_deref());

    // ===== 1. 必须项 =====
    if name.is_none() {
        errors.push("エラー：必須項目が空欄です：企業名を入力してください。".to_string());
    }
    if zip_code.is_none() {
        errors.push("エラー：必須項目が空欄です：郵便番号を入力してください。".to_string());
    }
    if address.is_none() {
        errors.push("エラー：必須項目が空欄です：住所を入力してください。".to_string());
    }

    // ===== 2. 企業ID =====
    if let Some(id_text) = present(raw.external_id.as_deref()) {
        validate_external_id(id_text, raw.row_number, index, &mut errors);
    }

    // ===== 3. 郵便番号形式 =====
    if let Some(zip) = zip_code {
        if !ZIP_PATTERN.is_match(zip) {
            errors.push("エラー：郵便番号の形式が不正です（例：123-4567）。".to_string());
        }
    }

    // ===== 4. 登録日 =====
    if let Some(text) = present(raw.registration_date_text.as_deref()) {
        if parse_flexible(text).is_none() {
            errors.push("エラー：データ形式が不正です：日付として認識できません。".to_string());
        }
    }

    // ===== 5. 字数上限 =====
    if name.map_or(false, |v| char_len(v) > config.name_max_chars) {
        errors.push(format!(
            "エラー：企業名の文字数が上限（{}文字）を超えています。",
            config.name_max_chars
        ));
    }
    if address.map_or(false, |v| char_len(v) > config.address_max_chars) {
        errors.push(format!(
            "エラー：住所の文字数が上限（{}文字）を超えています。",
            config.address_max_chars
        ));
    }
    if zip_code.map_or(false, |v| char_len(v) > config.zip_max_chars) {
        errors.push(format!(
            "エラー：郵便番号の文字数が上限（{}文字）を超えています。",
            config.zip_max_chars
        ));
    }
    let remarks = present(raw.remarks.as_deref());
    if remarks.map_or(false, |v| char_len(v) > config.remarks_max_chars) {
        errors.push(format!(
            "エラー：項目の文字数が上限を超えています（備考は{}文字まで）。",
            config.remarks_max_chars
        ));
    }

    errors
}

/// 企業ID: 形式 / 批次内重复 / 未登録 / 整数 / ≥1，各自独立
fn validate_external_id(
    id_text: &str,
    row_number: usize,
    index: &ReferenceIndex,
    errors: &mut Vec<String>,
) {
    if !DIGITS_PATTERN.is_match(id_text) {
        errors.push("エラー：企業IDが正しい形式ではありません（半角数字のみ）。".to_string());
    }

    if index.is_duplicate_id(id_text, row_number) {
        errors.push("エラー：同一ファイル内で企業IDが重複しています。".to_string());
    }

    // 已登録 ID 按其规范写法（无前导零、无符号）比对
    let parsed = id_text.parse::<i64>().ok();
    let canonical = parsed.filter(|id| id.to_string() == id_text);
    if !canonical.map_or(false, |id| index.is_persisted(id)) {
        errors.push("エラー：企業IDが未登録のため更新できません。".to_string());
    }

    match parsed {
        Some(id) if id < 1 => {
            errors.push("エラー：企業IDは1以上の数値を指定してください。".to_string());
        }
        Some(_) => {}
        None => errors.push("エラー：企業IDは数値（整数）で入力してください。".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn valid_row() -> RawRow {
        RawRow {
            row_number: 1,
            external_id: None,
            name: Some("株式会社A".to_string()),
            address: Some("東京都千代田区丸の内1-1-1".to_string()),
            zip_code: Some("100-0005".to_string()),
            registration_date_text: Some("2024/01/05".to_string()),
            remarks: None,
        }
    }

    fn check(row: &RawRow, persisted: &[i64]) -> Vec<String> {
        let index = ReferenceIndex::build(
            std::slice::from_ref(row),
            persisted.iter().copied().collect::<HashSet<_>>(),
        );
        validate(row, &index, &ImportConfig::default())
    }

    #[test]
    fn test_valid_row_has_no_errors() {
        assert!(check(&valid_row(), &[]).is_empty());
    }

    #[test]
    fn test_required_fields_collected_together() {
        let row = RawRow {
            name: None,
            address: Some("  ".to_string()),
            zip_code: None,
            ..valid_row()
        };
        let errors = check(&row, &[]);
        assert_eq!(
            errors,
            vec![
                "エラー：必須項目が空欄です：企業名を入力してください。",
                "エラー：必須項目が空欄です：郵便番号を入力してください。",
                "エラー：必須項目が空欄です：住所を入力してください。",
            ]
        );
    }

    #[test]
    fn test_unknown_external_id() {
        let row = RawRow {
            external_id: Some("999".to_string()),
            ..valid_row()
        };
        assert_eq!(check(&row, &[1, 2]), vec!["エラー：企業IDが未登録のため更新できません。"]);
        assert!(check(&row, &[999]).is_empty());
    }

    #[test]
    fn test_zero_padded_external_id_is_not_registered() {
        let row = RawRow {
            external_id: Some("001".to_string()),
            ..valid_row()
        };
        assert_eq!(check(&row, &[1]), vec!["エラー：企業IDが未登録のため更新できません。"]);

        let row = RawRow {
            external_id: Some("+1".to_string()),
            ..valid_row()
        };
        assert!(check(&row, &[1])
            .contains(&"エラー：企業IDが未登録のため更新できません。".to_string()));
    }

    #[test]
    fn test_padded_display_text_is_checked_as_written() {
        let row = RawRow {
            zip_code: Some(" 100-0005".to_string()),
            name: Some(format!(" {}", "社".repeat(100))),
            ..valid_row()
        };
        assert_eq!(
            check(&row, &[]),
            vec![
                "エラー：郵便番号の形式が不正です（例：123-4567）。",
                "エラー：企業名の文字数が上限（100文字）を超えています。",
                "エラー：郵便番号の文字数が上限（8文字）を超えています。",
            ]
        );
    }

    #[test]
    fn test_non_numeric_external_id_collects_all_id_errors() {
        let row = RawRow {
            external_id: Some("A12".to_string()),
            ..valid_row()
        };
        assert_eq!(
            check(&row, &[]),
            vec![
                "エラー：企業IDが正しい形式ではありません（半角数字のみ）。",
                "エラー：企業IDが未登録のため更新できません。",
                "エラー：企業IDは数値（整数）で入力してください。",
            ]
        );
    }

    #[test]
    fn test_zero_external_id() {
        let row = RawRow {
            external_id: Some("0".to_string()),
            ..valid_row()
        };
        let errors = check(&row, &[]);
        assert!(errors.contains(&"エラー：企業IDは1以上の数値を指定してください。".to_string()));
    }

    #[test]
    fn test_zip_format_and_length() {
        let row = RawRow {
            zip_code: Some("100-00055".to_string()),
            ..valid_row()
        };
        assert_eq!(
            check(&row, &[]),
            vec![
                "エラー：郵便番号の形式が不正です（例：123-4567）。",
                "エラー：郵便番号の文字数が上限（8文字）を超えています。",
            ]
        );
    }

    #[test]
    fn test_unparsable_date() {
        let row = RawRow {
            registration_date_text: Some("令和6年".to_string()),
            ..valid_row()
        };
        assert_eq!(
            check(&row, &[]),
            vec!["エラー：データ形式が不正です：日付として認識できません。"]
        );
    }

    #[test]
    fn test_length_ceilings_count_characters() {
        let row = RawRow {
            name: Some("社".repeat(100)),
            remarks: Some("あ".repeat(1001)),
            ..valid_row()
        };
        // 100 字以内 OK，备注超限
        assert_eq!(
            check(&row, &[]),
            vec!["エラー：項目の文字数が上限を超えています（備考は1000文字まで）。"]
        );
    }
}
