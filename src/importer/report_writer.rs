// ==========================================
// 企业名录系统 - 错误/警告报告输出
// ==========================================
// 职责: 将错误行/警告行连同原因写出，供离线修正
// 格式: Excel（.xlsx，工作表 Errors_Warnings）/ UTF-8 CSV（带 BOM）
// ==========================================

use crate::domain::{ReportTarget, ValidatedRow};
use crate::importer::error::ImportResult;
use chrono::NaiveDate;
use csv::WriterBuilder;
use rust_xlsxwriter::{Format, Workbook};
use std::io::Write;

/// 报告列（原始 6 列 + 原因）
pub const REPORT_HEADERS: [&str; 8] = [
    "行番号",
    "企業ID",
    "企業名",
    "住所",
    "郵便番号",
    "登録日",
    "備考",
    "エラー・警告内容",
];

/// 多条原因的分隔符
pub const REASON_SEPARATOR: &str = " / ";

/// 报告工作表名
pub const REPORT_SHEET_NAME: &str = "Errors_Warnings";

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

// ==========================================
// ReportWriter Trait
// ==========================================
pub trait ReportWriter {
    /// 写出报告
    fn write_report(&self, rows: &[&ValidatedRow], out: &mut dyn Write) -> ImportResult<()>;

    /// 下载文件名（例: import_error_2025-06-01.csv）
    fn file_name(&self, target: ReportTarget, today: NaiveDate) -> String;
}

/// 一行报告的 7 个文本列（行号除外）
fn text_columns(row: &ValidatedRow) -> [String; 7] {
    let raw = &row.raw;
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    [
        text(&raw.external_id),
        text(&raw.name),
        text(&raw.address),
        text(&raw.zip_code),
        text(&raw.registration_date_text),
        text(&raw.remarks),
        row.reasons().join(REASON_SEPARATOR),
    ]
}

// ==========================================
// Excel 实现（默认）
// ==========================================
pub struct XlsxReportWriter;

impl ReportWriter for XlsxReportWriter {
    fn write_report(&self, rows: &[&ValidatedRow], out: &mut dyn Write) -> ImportResult<()> {
        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();

        let sheet = workbook.add_worksheet();
        sheet.set_name(REPORT_SHEET_NAME)?;

        for (col, header) in REPORT_HEADERS.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *header, &header_format)?;
        }

        for (idx, row) in rows.iter().enumerate() {
            let sheet_row = idx as u32 + 1;
            sheet.write_number(sheet_row, 0, row.row_number() as f64)?;
            for (offset, value) in text_columns(row).into_iter().enumerate() {
                if !value.is_empty() {
                    sheet.write_string(sheet_row, offset as u16 + 1, value)?;
                }
            }
        }

        out.write_all(&workbook.save_to_buffer()?)?;
        Ok(())
    }

    fn file_name(&self, target: ReportTarget, today: NaiveDate) -> String {
        format!("import_{}_{}.xlsx", target.as_str(), today.format("%Y-%m-%d"))
    }
}

// ==========================================
// CSV 实现
// ==========================================
pub struct CsvReportWriter;

impl ReportWriter for CsvReportWriter {
    fn write_report(&self, rows: &[&ValidatedRow], out: &mut dyn Write) -> ImportResult<()> {
        out.write_all(UTF8_BOM)?;

        let mut writer = WriterBuilder::new().from_writer(out);
        writer.write_record(REPORT_HEADERS)?;

        for row in rows {
            let mut record = vec![row.row_number().to_string()];
            record.extend(text_columns(row));
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    fn file_name(&self, target: ReportTarget, today: NaiveDate) -> String {
        format!("import_{}_{}.csv", target.as_str(), today.format("%Y-%m-%d"))
    }
}
