// ==========================================
// 企业导入API
// ==========================================
// 职责: 封装企业导入相关功能（上传 / 预览 / 确定登録 / 报告下载）
// 约定: 预览结果仅供参考，登録时重新核对并以其结果为准
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfig};
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::domain::{CommitMode, CommitPlan, CommitSummary, ImportOutcome, ReportTarget, ValidatedRow};
use crate::importer::{
    parse_postal_csv, CompanyImportService, FsUploadStore, ImportHandle, ReportWriter,
    XlsxReportWriter,
};
use crate::repository::{CompanyImportRepositoryImpl, PostalRepositoryImpl, RepositoryError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// 上传响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// 内容句柄（SHA-256），预览/登録/下载时使用
    pub handle: String,
    pub file_name: String,
}

/// 行预览
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowView {
    pub row_number: usize,
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub zip_code: Option<String>,
    pub registration_date: Option<String>,
    pub remarks: Option<String>,
    /// 新規 / 更新（仅无错误行有意义）
    pub operation: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl From<&ValidatedRow> for RowView {
    fn from(row: &ValidatedRow) -> Self {
        let raw = &row.raw;
        Self {
            row_number: raw.row_number,
            external_id: raw.external_id.clone(),
            name: raw.name.clone(),
            address: raw.address.clone(),
            zip_code: raw.zip_code.clone(),
            registration_date: raw.registration_date_text.clone(),
            remarks: raw.remarks.clone(),
            operation: row.operation_kind().label().to_string(),
            errors: row.errors.clone(),
            warnings: row.warnings.clone(),
        }
    }
}

/// 预览响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub handle: String,
    pub file_name: String,
    pub total_count: usize,
    pub success_count: usize,
    pub warning_count: usize,
    pub error_count: usize,
    pub rows: Vec<RowView>,
    /// 仅登録正常数据时的新规/更新/除外
    pub strict_plan: CommitPlan,
    /// 登録正常 + 警告数据时的新规/更新/除外
    pub permissive_plan: CommitPlan,
}

impl PreviewResponse {
    fn build(handle: String, file_name: String, outcome: &ImportOutcome) -> Self {
        Self {
            handle,
            file_name,
            total_count: outcome.total_count,
            success_count: outcome.success_count,
            warning_count: outcome.warning_count,
            error_count: outcome.error_count,
            rows: outcome.rows.iter().map(RowView::from).collect(),
            strict_plan: outcome.plan(CommitMode::Strict),
            permissive_plan: outcome.plan(CommitMode::Permissive),
        }
    }
}

/// 登録响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResponse {
    pub summary: CommitSummary,
    /// 例: "15件のデータを登録しました。"
    pub message: String,
}

/// 登録结果消息（重放时不报告写入件数）
fn commit_message(summary: &CommitSummary) -> String {
    if summary.replayed {
        "このファイルは既に登録済みです。新たに登録したデータはありません。".to_string()
    } else {
        format!("{}件のデータを登録しました。", summary.saved())
    }
}

/// 报告下载
#[derive(Debug, Clone)]
pub struct ReportDownload {
    pub file_name: String,
    pub content: Vec<u8>,
}

type SqliteImportService =
    CompanyImportService<CompanyImportRepositoryImpl, PostalRepositoryImpl, ConfigManager>;

/// 导入API
pub struct ImportApi {
    service: SqliteImportService,
}

impl ImportApi {
    /// 创建新的ImportApi实例（报告为 .xlsx）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（不存在则建表）
    /// - upload_dir: 上传文件存储目录
    pub fn new(db_path: &str, upload_dir: &Path) -> ApiResult<Self> {
        Self::with_report_writer(db_path, upload_dir, Box::new(XlsxReportWriter))
    }

    /// 指定报告输出格式创建
    pub fn with_report_writer(
        db_path: &str,
        upload_dir: &Path,
        report_writer: Box<dyn ReportWriter>,
    ) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        ensure_schema(&conn).map_err(RepositoryError::from)?;
        let conn = Arc::new(Mutex::new(conn));

        let service = CompanyImportService::new(
            CompanyImportRepositoryImpl::from_connection(conn.clone()),
            PostalRepositoryImpl::from_connection(conn.clone()),
            ConfigManager::from_connection(conn)?,
            Box::new(FsUploadStore::new(upload_dir)?),
            report_writer,
        );

        Ok(Self { service })
    }

    /// 上传文件
    ///
    /// # 返回
    /// - Err(UploadRejected): 空文件 / 不支持的扩展名
    pub fn upload(&self, file_name: &str, bytes: &[u8]) -> ApiResult<UploadResponse> {
        let handle = self.service.upload(file_name, bytes)?;
        Ok(UploadResponse {
            handle: handle.to_string(),
            file_name: file_name.to_string(),
        })
    }

    /// 预览核对结果
    ///
    /// # 返回
    /// - Err(StructuralError): 文件结构不正确（无部分结果）
    pub fn preview(&self, handle: &str) -> ApiResult<PreviewResponse> {
        let handle = ImportHandle::parse(handle)?;
        let report = self.service.preview(&handle)?;

        Ok(PreviewResponse::build(
            report.handle.to_string(),
            report.file_name,
            &report.outcome,
        ))
    }

    /// 上传并立即预览
    pub fn upload_and_preview(&self, file_name: &str, bytes: &[u8]) -> ApiResult<PreviewResponse> {
        let uploaded = self.upload(file_name, bytes)?;
        self.preview(&uploaded.handle)
    }

    /// 确定登録
    ///
    /// # 参数
    /// - mode: "strict"（仅正常数据）/ "all"（正常 + 警告）
    pub fn commit(&self, handle: &str, mode: &str) -> ApiResult<CommitResponse> {
        let handle = ImportHandle::parse(handle)?;
        let mode: CommitMode = mode.parse().map_err(ApiError::InvalidInput)?;

        let summary = self.service.commit(&handle, mode)?;
        let message = commit_message(&summary);
        info!(handle = %handle, saved = summary.saved(), replayed = summary.replayed, "导入登録完成");

        Ok(CommitResponse { summary, message })
    }

    /// 下载错误/警告行
    ///
    /// # 参数
    /// - target: "error" / "warning" / "both"
    pub fn download_report(&self, handle: &str, target: &str) -> ApiResult<ReportDownload> {
        let handle = ImportHandle::parse(handle)?;
        let target: ReportTarget = target.parse().map_err(ApiError::InvalidInput)?;

        let mut content = Vec::new();
        let file_name = self.service.error_report(&handle, target, &mut content)?;
        Ok(ReportDownload { file_name, content })
    }

    /// 装载邮编主数据（zip,prefecture,city,town CSV）
    ///
    /// # 返回
    /// - Ok(usize): 写入条数
    pub fn load_postal(&self, bytes: &[u8]) -> ApiResult<usize> {
        let records = parse_postal_csv(bytes)?;
        let postal = self.service.postal();
        let count = postal.upsert_all(&records)?;
        info!(count, total = postal.count()?, "邮编主数据装载完成");
        Ok(count)
    }

    /// 当前生效的导入配置
    pub fn import_config(&self) -> ApiResult<ImportConfig> {
        Ok(self.service.import_config()?)
    }
}
