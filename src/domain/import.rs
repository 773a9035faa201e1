// ==========================================
// 企业名录系统 - 导入领域模型
// ==========================================
// 导入管道: RawRow → ValidatedRow → ImportOutcome → 确定登録
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// RawRow - 表格原始行
// ==========================================
// 由 TabularReader 每个非空行产出一次，之后不可变
// 字段保留单元格原文，仅空白的单元格为 None
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    pub row_number: usize,                     // 数据行号（从 1 开始，不含表头）
    pub external_id: Option<String>,           // 企業ID
    pub name: Option<String>,                  // 企業名
    pub address: Option<String>,               // 住所
    pub zip_code: Option<String>,              // 郵便番号
    pub registration_date_text: Option<String>, // 登録日（原文）
    pub remarks: Option<String>,               // 備考
}

impl RawRow {
    /// 是否为新记录（企業ID 为空）
    pub fn is_new_record(&self) -> bool {
        self.external_id.as_deref().map_or(true, |v| v.trim().is_empty())
    }
}

// ==========================================
// OperationKind - 新规/更新
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Insert,
    Update,
}

impl OperationKind {
    /// 画面显示用标签
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Insert => "新規",
            OperationKind::Update => "更新",
        }
    }
}

// ==========================================
// ValidatedRow - 校验后行
// ==========================================
// 由 classify() 一次性构造；之后只读
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedRow {
    pub raw: RawRow,
    pub errors: Vec<String>,   // 错误（阻断登録）
    pub warnings: Vec<String>, // 警告（宽松模式允许登録）
    pub is_update: bool,       // 企業ID 命中已登録记录
}

impl ValidatedRow {
    pub fn row_number(&self) -> usize {
        self.raw.row_number
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warning(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn operation_kind(&self) -> OperationKind {
        if self.is_update {
            OperationKind::Update
        } else {
            OperationKind::Insert
        }
    }

    /// 错误与警告合并（报告下载用）
    pub fn reasons(&self) -> Vec<&str> {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .map(String::as_str)
            .collect()
    }
}

// ==========================================
// ImportOutcome - 一个批次的核对结果
// ==========================================
// 不变量: 每行恰好属于 error / warning / success 之一
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub rows: Vec<ValidatedRow>,
    pub total_count: usize,
    pub success_count: usize,
    pub warning_count: usize,
    pub error_count: usize,
}

// ==========================================
// CommitMode - 登録模式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitMode {
    /// 仅登録无错误且无警告的行
    Strict,
    /// 登録所有无错误的行（允许警告）
    #[serde(rename = "all")]
    Permissive,
}

impl CommitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitMode::Strict => "strict",
            CommitMode::Permissive => "all",
        }
    }
}

impl fmt::Display for CommitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(CommitMode::Strict),
            "all" | "permissive" => Ok(CommitMode::Permissive),
            other => Err(format!("未知的登録模式: {}（应为 strict/all）", other)),
        }
    }
}

// ==========================================
// ReportTarget - 报告下载对象
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportTarget {
    Error,
    Warning,
    Both,
}

impl ReportTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportTarget::Error => "error",
            ReportTarget::Warning => "warning",
            ReportTarget::Both => "both",
        }
    }
}

impl FromStr for ReportTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(ReportTarget::Error),
            "warning" => Ok(ReportTarget::Warning),
            "both" => Ok(ReportTarget::Both),
            other => Err(format!("未知的下载对象: {}（应为 error/warning/both）", other)),
        }
    }
}

// ==========================================
// CommitPlan - 登録前的新规/更新/除外统计
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPlan {
    pub mode: CommitMode,
    pub insert_rows: Vec<usize>,
    pub update_rows: Vec<usize>,
    pub excluded_rows: Vec<usize>,
}

impl CommitPlan {
    /// 例: "12件新規, 3件更新, 2件除外"
    pub fn describe(&self) -> String {
        format!(
            "{}件新規, {}件更新, {}件除外",
            self.insert_rows.len(),
            self.update_rows.len(),
            self.excluded_rows.len()
        )
    }
}

// ==========================================
// ImportBatch - 已登録批次
// ==========================================
// 用途: 幂等登録（按 内容哈希 + 模式）与审计
// 对齐: import_batch 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBatch {
    pub batch_id: String,               // 批次 ID（UUID）
    pub content_hash: String,           // 上传内容 SHA-256（hex）
    pub file_name: Option<String>,      // 源文件名
    pub mode: CommitMode,               // 登録模式
    pub total_rows: usize,
    pub success_rows: usize,
    pub warning_rows: usize,
    pub error_rows: usize,
    pub inserted_rows: usize,
    pub updated_rows: usize,
    pub excluded_rows: usize,             // 所选模式下未进入登録集合的行数
    pub committed_row_numbers: Vec<usize>, // 本批次实际写入（新规/更新）的行
    pub skipped_row_numbers: Vec<usize>,   // 登録时 ID 已失效而跳过的行
    pub committed_at: DateTime<Utc>,
    pub elapsed_ms: i64,
}

// ==========================================
// CommitSummary - 登録结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub batch_id: String,
    pub content_hash: String,
    pub mode: CommitMode,
    pub inserted: usize,
    pub updated: usize,
    pub skipped_rows: Vec<usize>, // ID 失效被跳过（未回滚）
    pub excluded: usize,          // 因错误/警告未进入登録集合
    pub previously_committed: usize, // 同一内容以其他模式登録时已写入，本次不再写入
    pub replayed: bool,           // 该内容已登録过，本次未写入
}

impl CommitSummary {
    pub fn saved(&self) -> usize {
        self.inserted + self.updated
    }

    /// 由已记录批次重放（幂等登録）
    pub fn replay_of(batch: &ImportBatch) -> Self {
        let accounted = batch.excluded_rows
            + batch.committed_row_numbers.len()
            + batch.skipped_row_numbers.len();
        Self {
            batch_id: batch.batch_id.clone(),
            content_hash: batch.content_hash.clone(),
            mode: batch.mode,
            inserted: batch.inserted_rows,
            updated: batch.updated_rows,
            skipped_rows: batch.skipped_row_numbers.clone(),
            excluded: batch.excluded_rows,
            previously_committed: batch.total_rows.saturating_sub(accounted),
            replayed: true,
        }
    }
}
