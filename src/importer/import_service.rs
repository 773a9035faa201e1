// ==========================================
// 企业名录系统 - 企业导入服务
// ==========================================
// 职责: 整合导入流程（上传 → 预览 → 确定登録 / 报告下载）
// 流程: 读取 → 参照索引 → 逐行分类 → 汇总 → (用户确认) → 重新解析 → 登録
// ==========================================
// 预览与登録之间不持有锁或快照：登録时重新解析，
// 以登録时的结果为准，预览结果仅供参考
// ==========================================

use crate::config::{ImportConfig, ImportConfigReader};
use crate::domain::{
    CommitMode, CommitSummary, ImportBatch, ImportOutcome, ReportTarget, ValidatedRow,
};
use crate::importer::commit::{CommitEngine, CommitTally};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::reference_index::{ReferenceIndex, StoreFacts};
use crate::importer::report_writer::ReportWriter;
use crate::importer::tabular_reader::{reader_for_file_name, TabularReader};
use crate::importer::upload_store::{ImportHandle, StoredUpload, UploadStore};
use crate::importer::warning_classifier::classify;
use crate::repository::{CompanyImportRepository, PostalLookup};
use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 预览结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewReport {
    pub handle: ImportHandle,
    pub file_name: String,
    pub outcome: ImportOutcome,
}

// ==========================================
// CompanyImportService
// ==========================================
pub struct CompanyImportService<R, P, C>
where
    R: CompanyImportRepository,
    P: PostalLookup,
    C: ImportConfigReader,
{
    // 数据访问层
    repo: R,
    postal: P,

    // 配置读取器
    config: C,

    // 导入组件
    upload_store: Box<dyn UploadStore>,
    report_writer: Box<dyn ReportWriter>,

    // 指定读取器（None = 按文件扩展名选择）
    reader: Option<Box<dyn TabularReader>>,
}

impl<R, P, C> CompanyImportService<R, P, C>
where
    R: CompanyImportRepository,
    P: PostalLookup,
    C: ImportConfigReader,
{
    /// 创建新的导入服务
    ///
    /// # 参数
    /// - repo: 企业记录库
    /// - postal: 邮编主数据
    /// - config: 配置读取器
    /// - upload_store: 上传文件存储
    /// - report_writer: 报告输出
    pub fn new(
        repo: R,
        postal: P,
        config: C,
        upload_store: Box<dyn UploadStore>,
        report_writer: Box<dyn ReportWriter>,
    ) -> Self {
        Self {
            repo,
            postal,
            config,
            upload_store,
            report_writer,
            reader: None,
        }
    }

    /// 固定使用指定读取器（忽略文件扩展名）
    pub fn with_reader(mut self, reader: Box<dyn TabularReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn postal(&self) -> &P {
        &self.postal
    }

    // ==========================================
    // 上传
    // ==========================================

    /// 接收上传文件
    ///
    /// # 返回
    /// - Err(EmptyUpload): 内容为空
    /// - Err(UnsupportedFormat): 扩展名不支持
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub fn upload(&self, file_name: &str, bytes: &[u8]) -> ImportResult<ImportHandle> {
        if bytes.is_empty() {
            return Err(ImportError::EmptyUpload);
        }
        if self.reader.is_none() && reader_for_file_name(file_name).is_none() {
            return Err(ImportError::UnsupportedFormat(file_name.to_string()));
        }

        self.upload_store.put(file_name, bytes)
    }

    // ==========================================
    // 核对
    // ==========================================

    /// 核对一批字节（纯读取，不落库）
    ///
    /// 相同输入 + 未变化的记录库 → 相同结果
    pub fn analyze(&self, file_name: &str, bytes: &[u8], today: NaiveDate) -> ImportResult<ImportOutcome> {
        let config = self.config.load_import_config()?;
        let selected;
        let reader: &dyn TabularReader = match &self.reader {
            Some(reader) => reader.as_ref(),
            None => {
                selected = reader_for_file_name(file_name)
                    .ok_or_else(|| ImportError::UnsupportedFormat(file_name.to_string()))?;
                selected.as_ref()
            }
        };

        // === 步骤 1: 读取 ===
        let raw_rows = reader.read_rows(bytes, config.max_rows).map_err(|e| {
            warn!(file_name, error = %e, "文件结构校验失败");
            e
        })?;
        debug!(rows = raw_rows.len(), "文件读取完成");

        // === 步骤 2: 参照索引 ===
        let index = ReferenceIndex::from_store(&raw_rows, &self.repo)?;
        let facts = StoreFacts::new(&self.repo);

        // === 步骤 3: 逐行分类 ===
        let rows = raw_rows
            .iter()
            .map(|raw| classify(raw, &index, &self.postal, &facts, &config, today))
            .collect::<Result<Vec<_>, _>>()?;

        // === 步骤 4: 汇总 ===
        let outcome = ImportOutcome::aggregate(rows);
        info!(
            total = outcome.total_count,
            success = outcome.success_count,
            warning = outcome.warning_count,
            error = outcome.error_count,
            "核对完成"
        );
        Ok(outcome)
    }

    /// 预览（今天为基准）
    pub fn preview(&self, handle: &ImportHandle) -> ImportResult<PreviewReport> {
        self.preview_at(handle, today())
    }

    #[instrument(skip_all, fields(handle = %handle))]
    pub fn preview_at(&self, handle: &ImportHandle, today: NaiveDate) -> ImportResult<PreviewReport> {
        let upload = self.upload_store.load(handle)?;
        let outcome = self.analyze(&upload.meta.file_name, &upload.bytes, today)?;

        Ok(PreviewReport {
            handle: upload.handle,
            file_name: upload.meta.file_name,
            outcome,
        })
    }

    // ==========================================
    // 确定登録
    // ==========================================

    /// 确定登録（今天为基准）
    pub fn commit(&self, handle: &ImportHandle, mode: CommitMode) -> ImportResult<CommitSummary> {
        self.commit_at(handle, mode, today())
    }

    /// 确定登録
    ///
    /// # 说明
    /// - 幂等: 同一内容已按同一模式登録过则返回记录的结果，不再写入
    /// - 同一内容已按其他模式登録过: 仅写入尚未写入的行
    /// - 重新解析上传内容，以本次核对结果选定登録对象
    /// - 全部写入与批次记录在同一事务内
    ///
    /// # 返回
    /// - Err(NothingToCommit): 所选模式下没有可登録行
    /// - Err(CommitFailure / DuplicateData / StaleReference): 已回滚，未保存任何数据
    #[instrument(skip_all, fields(handle = %handle, mode = %mode, batch_id = tracing::field::Empty))]
    pub fn commit_at(
        &self,
        handle: &ImportHandle,
        mode: CommitMode,
        today: NaiveDate,
    ) -> ImportResult<CommitSummary> {
        let start_time = Instant::now();

        let prior = self.repo.find_batches_by_hash(handle.as_str())?;
        if let Some(batch) = prior.iter().find(|b| b.mode == mode) {
            info!(batch_id = %batch.batch_id, "该内容已按此模式登録，返回已记录结果");
            return Ok(CommitSummary::replay_of(batch));
        }

        let upload = self.upload_store.load(handle)?;
        let config = self.config.load_import_config()?;
        let outcome = self.analyze(&upload.meta.file_name, &upload.bytes, today)?;

        let eligible = outcome.commit_set(mode);

        // 其他模式的批次已写入的行不再重复写入
        let already: HashSet<usize> = prior
            .iter()
            .flat_map(|b| b.committed_row_numbers.iter().copied())
            .collect();
        let selected: Vec<&ValidatedRow> = eligible
            .iter()
            .copied()
            .filter(|row| !already.contains(&row.row_number()))
            .collect();

        // 已登録的行重新核对时会与自身冲突，此时同样返回已记录结果
        if selected.is_empty() {
            if let Some(batch) = prior.last() {
                info!(batch_id = %batch.batch_id, mode = %batch.mode, "没有新的可登録行，返回已记录结果");
                return Ok(CommitSummary::replay_of(batch));
            }
            warn!(total = outcome.total_count, "没有可登録的行");
            return Err(ImportError::NothingToCommit);
        }

        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());
        info!(
            batch_id = %batch_id,
            selected = selected.len(),
            previously_committed = eligible.len() - selected.len(),
            "开始确定登録"
        );

        let excluded = outcome.total_count - eligible.len();
        let engine = CommitEngine::new(&config, today);
        let mut finish = |tx: &dyn CompanyImportRepository, tally: &CommitTally| {
            let batch = build_batch(&batch_id, &upload, &outcome, mode, excluded, tally, start_time);
            tx.insert_batch(&batch)
        };
        let tally = engine.commit(&self.repo, &selected, &mut finish)?;

        // 登録成功后清理上传文件（失败不影响结果）
        if let Err(e) = self.upload_store.remove(handle) {
            warn!(error = %e, "上传文件清理失败");
        }

        let summary = CommitSummary {
            batch_id,
            content_hash: handle.to_string(),
            mode,
            inserted: tally.inserted,
            updated: tally.updated,
            skipped_rows: tally.skipped_rows,
            excluded,
            previously_committed: eligible.len() - selected.len(),
            replayed: false,
        };

        info!(
            inserted = summary.inserted,
            updated = summary.updated,
            skipped = summary.skipped_rows.len(),
            excluded = summary.excluded,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "确定登録完成"
        );
        Ok(summary)
    }

    // ==========================================
    // 报告下载
    // ==========================================

    /// 输出错误/警告行报告
    ///
    /// # 返回
    /// - Ok(file_name): 建议的下载文件名
    #[instrument(skip_all, fields(handle = %handle, target = target.as_str()))]
    pub fn error_report(
        &self,
        handle: &ImportHandle,
        target: ReportTarget,
        out: &mut dyn Write,
    ) -> ImportResult<String> {
        let today = today();
        let upload = self.upload_store.load(handle)?;
        let outcome = self.analyze(&upload.meta.file_name, &upload.bytes, today)?;

        let rows: Vec<&ValidatedRow> = outcome.report_rows(target);
        self.report_writer.write_report(&rows, out)?;

        info!(target = target.as_str(), rows = rows.len(), "报告已输出");
        Ok(self.report_writer.file_name(target, today))
    }

    /// 当前生效的导入配置
    pub fn import_config(&self) -> ImportResult<ImportConfig> {
        Ok(self.config.load_import_config()?)
    }
}

fn build_batch(
    batch_id: &str,
    upload: &StoredUpload,
    outcome: &ImportOutcome,
    mode: CommitMode,
    excluded: usize,
    tally: &CommitTally,
    start_time: Instant,
) -> ImportBatch {
    ImportBatch {
        batch_id: batch_id.to_string(),
        content_hash: upload.handle.to_string(),
        file_name: Some(upload.meta.file_name.clone()),
        mode,
        total_rows: outcome.total_count,
        success_rows: outcome.success_count,
        warning_rows: outcome.warning_count,
        error_rows: outcome.error_count,
        inserted_rows: tally.inserted,
        updated_rows: tally.updated,
        excluded_rows: excluded,
        committed_row_numbers: tally.committed_rows.clone(),
        skipped_row_numbers: tally.skipped_rows.clone(),
        committed_at: Utc::now(),
        elapsed_ms: start_time.elapsed().as_millis() as i64,
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
