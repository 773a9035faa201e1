// ==========================================
// ImportApi 集成测试
// ==========================================
// 测试目标: 上传 / 预览 / 登録 / 报告下载 / 邮编装载 的对外接口
// ==========================================

mod test_helpers;

use company_directory::api::{ApiError, ImportApi};
use company_directory::importer::CsvReportWriter;
use std::io::Cursor;
use test_helpers::{csv_of, valid_row, TestEnv};

#[test]
fn test_upload_rejects_empty_and_unsupported_files() {
    let env = TestEnv::new().unwrap();
    let api = env.api().unwrap();

    let err = api.upload("companies.csv", b"").unwrap_err();
    assert!(matches!(err, ApiError::UploadRejected(_)));
    assert_eq!(err.to_string(), "ファイルが選択されていません。");

    let err = api.upload("companies.pdf", b"%PDF").unwrap_err();
    assert!(matches!(err, ApiError::UploadRejected(_)));
}

#[test]
fn test_upload_and_preview_counts() {
    let env = TestEnv::new().unwrap();
    let api = env.api().unwrap();

    let rows = vec![
        valid_row("A社", "東京都千代田区丸の内1-1-1"),
        ["", "B社", "大阪府大阪市北区1-1-1", "100-0005", "", ""],
        ["", "", "東京都千代田区丸の内3-3-3", "100-0005", "", ""],
    ];
    let preview = api.upload_and_preview("companies.csv", &csv_of(&rows)).unwrap();

    assert_eq!(preview.file_name, "companies.csv");
    assert_eq!(preview.total_count, 3);
    assert_eq!(preview.success_count, 1);
    assert_eq!(preview.warning_count, 1);
    assert_eq!(preview.error_count, 1);
    assert_eq!(preview.strict_plan.describe(), "1件新規, 0件更新, 2件除外");
    assert_eq!(preview.permissive_plan.describe(), "2件新規, 0件更新, 1件除外");
    assert_eq!(preview.rows[0].operation, "新規");
}

#[test]
fn test_preview_unknown_handle_is_not_found() {
    let env = TestEnv::new().unwrap();
    let api = env.api().unwrap();

    let err = api.preview(&"0".repeat(64)).unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    assert_eq!(
        err.to_string(),
        "セッションが切れました。再度ファイルをアップロードしてください。"
    );

    let err = api.preview("not-a-handle").unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[test]
fn test_structural_error_message() {
    let env = TestEnv::new().unwrap();
    let api = env.api().unwrap();

    let content = "企業ID,企業名,住所,郵便番号,登録日,備考\n";
    let err = api.upload_and_preview("companies.csv", content.as_bytes()).unwrap_err();
    assert!(matches!(err, ApiError::StructuralError(_)));
}

#[test]
fn test_commit_returns_message() {
    let env = TestEnv::new().unwrap();
    let api = env.api().unwrap();

    let rows = vec![
        valid_row("A社", "東京都千代田区丸の内1-1-1"),
        valid_row("B社", "東京都千代田区丸の内2-2-2"),
    ];
    let uploaded = api.upload("companies.csv", &csv_of(&rows)).unwrap();
    let response = api.commit(&uploaded.handle, "strict").unwrap();

    assert_eq!(response.message, "2件のデータを登録しました。");
    assert_eq!(response.summary.inserted, 2);
    assert_eq!(env.company_count().unwrap(), 2);
}

#[test]
fn test_commit_rejects_unknown_mode() {
    let env = TestEnv::new().unwrap();
    let api = env.api().unwrap();

    let uploaded = api
        .upload("companies.csv", &csv_of(&[valid_row("A社", "東京都千代田区丸の内1-1-1")]))
        .unwrap();
    let err = api.commit(&uploaded.handle, "partial").unwrap_err();

    assert!(matches!(err, ApiError::InvalidInput(_)));
    assert_eq!(env.company_count().unwrap(), 0);
}

#[test]
fn test_commit_with_nothing_selected() {
    let env = TestEnv::new().unwrap();
    let api = env.api().unwrap();

    let rows = vec![["", "B社", "大阪府大阪市北区1-1-1", "100-0005", "", ""]];
    let uploaded = api.upload("companies.csv", &csv_of(&rows)).unwrap();
    let err = api.commit(&uploaded.handle, "strict").unwrap_err();

    assert!(matches!(err, ApiError::NothingToCommit(_)));
    assert_eq!(err.to_string(), "登録対象のデータがありません。");
}

/// 读取报告工作簿的 Errors_Warnings 工作表（按显示文本）
fn report_rows(content: &[u8]) -> Vec<Vec<String>> {
    use calamine::{Reader, Xlsx};

    let mut workbook = Xlsx::new(Cursor::new(content.to_vec())).unwrap();
    let range = workbook.worksheet_range("Errors_Warnings").unwrap();
    range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

#[test]
fn test_download_report_lists_errors_before_warnings() {
    let env = TestEnv::new().unwrap();
    let api = env.api().unwrap();

    let rows = vec![
        ["", "B社", "大阪府大阪市北区1-1-1", "100-0005", "", "警告行"],
        valid_row("A社", "東京都千代田区丸の内1-1-1"),
        ["", "", "東京都千代田区丸の内3-3-3", "", "", "エラー行"],
    ];
    let uploaded = api.upload("companies.csv", &csv_of(&rows)).unwrap();
    let download = api.download_report(&uploaded.handle, "both").unwrap();

    assert!(download.file_name.starts_with("import_both_"));
    assert!(download.file_name.ends_with(".xlsx"));

    let sheet = report_rows(&download.content);
    assert_eq!(sheet.len(), 3);
    assert_eq!(
        sheet[0],
        vec!["行番号", "企業ID", "企業名", "住所", "郵便番号", "登録日", "備考", "エラー・警告内容"]
    );
    assert_eq!(sheet[1][0], "3");
    assert_eq!(sheet[1][6], "エラー行");
    assert_eq!(
        sheet[1][7],
        "エラー：必須項目が空欄です：企業名を入力してください。 / エラー：必須項目が空欄です：郵便番号を入力してください。"
    );
    assert_eq!(sheet[2][0], "1");
    assert_eq!(sheet[2][3], "大阪府大阪市北区1-1-1");
    assert!(sheet[2][7].contains("東京都千代田区"));
}

#[test]
fn test_download_report_error_only() {
    let env = TestEnv::new().unwrap();
    let api = env.api().unwrap();

    let rows = vec![
        ["", "B社", "大阪府大阪市北区1-1-1", "100-0005", "", ""],
        ["", "", "東京都千代田区丸の内3-3-3", "100-0005", "", ""],
    ];
    let uploaded = api.upload("companies.csv", &csv_of(&rows)).unwrap();
    let download = api.download_report(&uploaded.handle, "error").unwrap();

    assert!(download.file_name.starts_with("import_error_"));
    let sheet = report_rows(&download.content);
    assert_eq!(sheet.len(), 2);
    assert_eq!(sheet[1][0], "2");
}

#[test]
fn test_download_report_as_csv() {
    let env = TestEnv::new().unwrap();
    let api =
        ImportApi::with_report_writer(&env.db_path, env.upload_dir(), Box::new(CsvReportWriter))
            .unwrap();

    let rows = vec![["", "", "東京都千代田区丸の内3-3-3", "100-0005", "", ""]];
    let uploaded = api.upload("companies.csv", &csv_of(&rows)).unwrap();
    let download = api.download_report(&uploaded.handle, "both").unwrap();

    assert!(download.file_name.ends_with(".csv"));
    assert_eq!(&download.content[..3], &[0xEF, 0xBB, 0xBF]);
    let text = String::from_utf8(download.content[3..].to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("1,"));
}

#[test]
fn test_commit_replay_reports_nothing_new() {
    let env = TestEnv::new().unwrap();
    let api = env.api().unwrap();

    let bytes = csv_of(&[valid_row("A社", "東京都千代田区丸の内1-1-1")]);
    let uploaded = api.upload("companies.csv", &bytes).unwrap();
    let first = api.commit(&uploaded.handle, "strict").unwrap();
    assert_eq!(first.message, "1件のデータを登録しました。");

    let uploaded = api.upload("companies.csv", &bytes).unwrap();
    let second = api.commit(&uploaded.handle, "strict").unwrap();
    assert!(second.summary.replayed);
    assert!(!second.message.contains("登録しました"));
    assert_eq!(
        second.message,
        "このファイルは既に登録済みです。新たに登録したデータはありません。"
    );
    assert_eq!(env.company_count().unwrap(), 1);
}

#[test]
fn test_load_postal_then_preview_uses_it() {
    let env = TestEnv::new().unwrap();
    let api = env.api().unwrap();

    let postal = "zip,prefecture,city,town\n060-0001,北海道,札幌市中央区,北一条西\n";
    assert_eq!(api.load_postal(postal.as_bytes()).unwrap(), 1);

    let rows = vec![["", "C社", "北海道札幌市中央区北一条西1-1", "060-0001", "", ""]];
    let preview = api.upload_and_preview("companies.csv", &csv_of(&rows)).unwrap();
    assert_eq!(preview.success_count, 1, "{:?}", preview.rows[0].warnings);
}
