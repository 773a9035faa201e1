// ==========================================
// 企业名录系统 - 邮编主数据装载
// ==========================================
// 输入: UTF-8 CSV（可带 BOM），列顺序 zip,prefecture,city,town
// 首行若为表头（首列非数字）则跳过
// ==========================================

use crate::domain::PostalRecord;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::normalizer::{normalize, postal_key};
use tracing::{debug, warn};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// 解析邮编主数据 CSV
///
/// # 返回
/// - Ok(Vec<PostalRecord>): 有效记录（邮编非 7 位数字或缺少都道府県/市区町村的行被跳过）
/// - Err(Io): CSV 无法读取
pub fn parse_postal_csv(bytes: &[u8]) -> ImportResult<Vec<PostalRecord>> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        let field = |i: usize| normalize(record.get(i));

        let Some(zip) = field(0) else {
            continue;
        };
        let zip = postal_key(&zip);
        if !is_postal_key(&zip) {
            // 首行表头不计入跳过
            if idx > 0 {
                skipped += 1;
            }
            continue;
        }

        let (Some(prefecture), Some(city)) = (field(1), field(2)) else {
            skipped += 1;
            continue;
        };

        records.push(PostalRecord {
            zip_code: zip,
            prefecture,
            city,
            town: field(3).unwrap_or_default(),
        });
    }

    if skipped > 0 {
        warn!(skipped, "邮编主数据存在无效行，已跳过");
    }
    debug!(records = records.len(), "邮编主数据解析完成");

    if records.is_empty() {
        return Err(ImportError::Io("有効な郵便番号データがありません。".to_string()));
    }
    Ok(records)
}

fn is_postal_key(zip: &str) -> bool {
    zip.len() == 7 && zip.chars().all(|c| c.is_ascii_digit())
}
