// ==========================================
// 企业名录系统 - 警告分类
// ==========================================
// 职责: RawRow → ValidatedRow（字段校验 + 提示性检查）
// 规则: 有错误的行不再评估警告；各警告独立收集
// ==========================================

use crate::config::ImportConfig;
use crate::domain::{RawRow, ValidatedRow};
use crate::importer::date_grammar::parse_flexible;
use crate::importer::field_validator::validate;
use crate::importer::normalizer::{char_len, normalize, postal_key, present};
use crate::importer::reference_index::{PersistedFacts, ReferenceIndex};
use crate::repository::{PostalLookup, RepositoryResult};
use chrono::NaiveDate;

/// 町域信息的标记
const TOWN_MARKERS: [&str; 2] = ["町", "丁目"];

/// 分类一行
///
/// # 参数
/// - today: 未来日期判定基准
///
/// # 返回
/// - Err: 仅在点查询（记录库/邮编主数据）失败时
pub fn classify(
    raw: &RawRow,
    index: &ReferenceIndex,
    postal: &dyn PostalLookup,
    facts: &dyn PersistedFacts,
    config: &ImportConfig,
    today: NaiveDate,
) -> RepositoryResult<ValidatedRow> {
    let errors = validate(raw, index, config);
    if !errors.is_empty() {
        return Ok(ValidatedRow {
            raw: raw.clone(),
            errors,
            warnings: Vec::new(),
            is_update: false,
        });
    }

    let warnings = collect_warnings(raw, index, postal, facts, config, today)?;

    Ok(ValidatedRow {
        raw: raw.clone(),
        errors,
        warnings,
        // 通过校验的企業ID 必定已登録
        is_update: !raw.is_new_record(),
    })
}

fn collect_warnings(
    raw: &RawRow,
    index: &ReferenceIndex,
    postal: &dyn PostalLookup,
    facts: &dyn PersistedFacts,
    config: &ImportConfig,
    today: NaiveDate,
) -> RepositoryResult<Vec<String>> {
    let mut warnings = Vec::new();

    let name = normalize(raw.name.as_deref());
    let address = normalize(raw.address.as_deref());
    let is_new = raw.is_new_record();

    // ===== 1. 批次内同名 =====
    if let Some(name) = &name {
        let others = index.other_rows_with_name(name, raw.row_number);
        if !others.is_empty() {
            warnings.push(duplicate_message(
                "アップロードデータ内で同名の企業が複数あります。",
                &others,
            ));
        }
    }

    // ===== 2. 批次内同住所 =====
    if let Some(address) = &address {
        let others = index.other_rows_with_address(address, raw.row_number);
        if !others.is_empty() {
            warnings.push(duplicate_message(
                "アップロードデータ内で同じ住所が複数あります。",
                &others,
            ));
        }
    }

    // ===== 3. 记录库同名（仅新规）=====
    if let Some(name) = name.as_deref().filter(|_| is_new) {
        if facts.exists_by_name(name)? {
            warnings.push("警告：同名の企業が既に登録されています。".to_string());
        }
    }

    // ===== 4. 记录库同住所（仅新规）=====
    if let Some(address) = address.as_deref().filter(|_| is_new) {
        if facts.exists_by_address(address)? {
            warnings.push(
                "警告：既存企業と住所が一致しています。登録済みデータの可能性があります。".to_string(),
            );
        }
    }

    // ===== 5. 未来日期 =====
    if let Some(date) = raw.registration_date_text.as_deref().and_then(parse_flexible) {
        if date > today {
            warnings.push("警告：登録日が未来の日付になっています。".to_string());
        }
    }

    // ===== 6. 住所过短（按原文字数）=====
    if present(raw.address.as_deref())
        .map_or(false, |v| char_len(v) <= config.short_address_max_chars)
    {
        warnings.push("警告：住所が極端に短いため、番地などの入力漏れの可能性があります。".to_string());
    }

    // ===== 7. 邮编与住所一致性 =====
    if let Some(warning) = postal_warning(raw, postal)? {
        warnings.push(warning);
    }

    Ok(warnings)
}

/// 例: "警告：アップロードデータ内で同名の企業が複数あります。（2, 5行目）"
fn duplicate_message(base: &str, rows: &[usize]) -> String {
    let joined = rows
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("警告：{}（{}行目）", base, joined)
}

/// 邮编/住所一致性（至多一条警告）
///
/// 按原文比对前缀（首部空白视为不一致）
///
/// 邮编不存在、或都道府県+市区町村不一致时立即返回，不再检查町域
fn postal_warning(raw: &RawRow, postal: &dyn PostalLookup) -> RepositoryResult<Option<String>> {
    let (Some(zip_code), Some(address)) = (
        present(raw.zip_code.as_deref()),
        present(raw.address.as_deref()),
    ) else {
        return Ok(None);
    };

    let Some(master) = postal.find_by_zip(&postal_key(zip_code))? else {
        return Ok(Some("警告：郵便番号が存在しません".to_string()));
    };

    let expected = master.expected_prefix();
    if !address.starts_with(&expected) {
        return Ok(Some(format!(
            "警告：住所と郵便番号が一致しない可能性があります（郵便番号 {} は {} です）。",
            zip_code, expected
        )));
    }

    let town = master.town.trim();
    if town.is_empty() {
        return Ok(None);
    }

    let town_written = TOWN_MARKERS.iter().any(|m| address.contains(m)) || address.contains(town);
    if town_written && !address.contains(town) {
        return Ok(Some("警告：町名が郵便番号の情報と一致していません。".to_string()));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PostalRecord;
    use std::collections::{HashMap, HashSet};

    // ===== 测试夹具 =====

    #[derive(Default)]
    struct FixturePostal(HashMap<String, PostalRecord>);

    impl PostalLookup for FixturePostal {
        fn find_by_zip(&self, zip_code: &str) -> RepositoryResult<Option<PostalRecord>> {
            Ok(self.0.get(zip_code).cloned())
        }
    }

    #[derive(Default)]
    struct FixtureFacts {
        names: HashSet<String>,
        addresses: HashSet<String>,
    }

    impl PersistedFacts for FixtureFacts {
        fn exists_by_name(&self, name: &str) -> RepositoryResult<bool> {
            Ok(self.names.contains(name))
        }

        fn exists_by_address(&self, address: &str) -> RepositoryResult<bool> {
            Ok(self.addresses.contains(address))
        }
    }

    fn marunouchi() -> FixturePostal {
        let mut map = HashMap::new();
        map.insert(
            "1000005".to_string(),
            PostalRecord {
                zip_code: "1000005".to_string(),
                prefecture: "東京都".to_string(),
                city: "千代田区".to_string(),
                town: "丸の内".to_string(),
            },
        );
        FixturePostal(map)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn row(row_number: usize, name: &str, address: &str) -> RawRow {
        RawRow {
            row_number,
            external_id: None,
            name: Some(name.to_string()),
            address: Some(address.to_string()),
            zip_code: Some("100-0005".to_string()),
            registration_date_text: None,
            remarks: None,
        }
    }

    fn classify_all(rows: &[RawRow], facts: &FixtureFacts) -> Vec<ValidatedRow> {
        let index = ReferenceIndex::build(rows, HashSet::new());
        let postal = marunouchi();
        rows.iter()
            .map(|r| {
                classify(r, &index, &postal, facts, &ImportConfig::default(), today()).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_clean_row_has_no_warnings() {
        let rows = vec![row(1, "株式会社A", "東京都千代田区丸の内1-1-1")];
        let result = classify_all(&rows, &FixtureFacts::default());
        assert!(result[0].is_valid());
        assert!(result[0].warnings.is_empty());
        assert!(!result[0].is_update);
    }

    #[test]
    fn test_duplicate_names_cite_each_other() {
        let rows = vec![
            row(2, "Acme Inc.", "東京都千代田区丸の内1-1-1"),
            row(5, "Acme Inc.", "東京都千代田区丸の内2-2-2"),
        ];
        let result = classify_all(&rows, &FixtureFacts::default());

        assert_eq!(
            result[0].warnings,
            vec!["警告：アップロードデータ内で同名の企業が複数あります。（5行目）"]
        );
        assert_eq!(
            result[1].warnings,
            vec!["警告：アップロードデータ内で同名の企業が複数あります。（2行目）"]
        );
    }

    #[test]
    fn test_store_collisions_only_for_new_rows() {
        let facts = FixtureFacts {
            names: ["株式会社A".to_string()].into_iter().collect(),
            addresses: ["東京都千代田区丸の内1-1-1".to_string()].into_iter().collect(),
        };
        let new_row = row(1, "株式会社A", "東京都千代田区丸の内1-1-1");
        let index = ReferenceIndex::build(std::slice::from_ref(&new_row), HashSet::new());
        let postal = marunouchi();
        let config = ImportConfig::default();

        let classified = classify(&new_row, &index, &postal, &facts, &config, today()).unwrap();
        assert_eq!(
            classified.warnings,
            vec![
                "警告：同名の企業が既に登録されています。",
                "警告：既存企業と住所が一致しています。登録済みデータの可能性があります。",
            ]
        );

        // 更新行不做记录库碰撞检查
        let update_row = RawRow {
            external_id: Some("3".to_string()),
            ..new_row
        };
        let index = ReferenceIndex::build(std::slice::from_ref(&update_row), [3].into_iter().collect());
        let classified = classify(&update_row, &index, &postal, &facts, &config, today()).unwrap();
        assert!(classified.warnings.is_empty());
        assert!(classified.is_update);
    }

    #[test]
    fn test_future_date_and_short_address() {
        let mut r = row(1, "株式会社A", "東京都千代");
        r.zip_code = None;
        r.registration_date_text = Some("2099-01-01".to_string());

        let result = classify_all(&[r.clone()], &FixtureFacts::default());
        // 郵便番号缺失 → 错误，不评估警告
        assert!(result[0].has_error());
        assert!(result[0].warnings.is_empty());

        r.zip_code = Some("100-0005".to_string());
        let result = classify_all(&[r], &FixtureFacts::default());
        assert_eq!(
            result[0].warnings,
            vec![
                "警告：登録日が未来の日付になっています。",
                "警告：住所が極端に短いため、番地などの入力漏れの可能性があります。",
                "警告：住所と郵便番号が一致しない可能性があります（郵便番号 100-0005 は 東京都千代田区 です）。",
            ]
        );
    }

    #[test]
    fn test_unknown_zip_stops_postal_check() {
        let mut r = row(1, "株式会社A", "東京都千代田区丸の内1-1-1");
        r.zip_code = Some("999-9999".to_string());
        let result = classify_all(&[r], &FixtureFacts::default());
        assert_eq!(result[0].warnings, vec!["警告：郵便番号が存在しません"]);
    }

    #[test]
    fn test_prefix_mismatch_skips_town_check() {
        let r = row(1, "株式会社A", "大阪府大阪市北区梅田町1-1-1");
        let result = classify_all(&[r], &FixtureFacts::default());
        assert_eq!(
            result[0].warnings,
            vec!["警告：住所と郵便番号が一致しない可能性があります（郵便番号 100-0005 は 東京都千代田区 です）。"]
        );
    }

    #[test]
    fn test_wrong_town_detected_only_when_town_written() {
        // 写了町名但不一致
        let wrong = row(1, "株式会社A", "東京都千代田区大手町1-1-1");
        let result = classify_all(&[wrong], &FixtureFacts::default());
        assert_eq!(result[0].warnings, vec!["警告：町名が郵便番号の情報と一致していません。"]);

        // 未写町域信息 → 不警告
        let bare = row(1, "株式会社B", "東京都千代田区1-1-1");
        let result = classify_all(&[bare], &FixtureFacts::default());
        assert!(result[0].warnings.is_empty());
    }
}
