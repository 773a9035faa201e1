// ==========================================
// 企業名録系统 - 核心库
// ==========================================
// 职责: 企业记录批量导入（上传 → 核对预览 → 确定登録）
// 技术栈: Rust + SQLite
// 原则: 预览仅供参考，登録时重新核对，全部成功或全部回滚
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 读取/核对/登録
pub mod importer;

// 配置层 - 导入参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域实体
pub use domain::{
    CommitMode, CommitPlan, CommitSummary, CompanyRecord, ImportOutcome, OperationKind,
    PostalRecord, RawRow, ReportTarget, ValidatedRow,
};

// 导入服务
pub use importer::{CompanyImportService, ImportError, PreviewReport, StructuralError};

// API
pub use api::ImportApi;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "企業名録";
