// ==========================================
// 企业名录系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、导入中间结构、登録结果
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod company;
pub mod import;

// 重导出核心类型
pub use company::{CompanyRecord, PostalRecord};
pub use import::{
    CommitMode, CommitPlan, CommitSummary, ImportBatch, ImportOutcome, OperationKind, RawRow,
    ReportTarget, ValidatedRow,
};
