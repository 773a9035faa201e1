// ==========================================
// 企业名录系统 - 导入层
// ==========================================
// 职责: 上传表格 → 核对结果 → 确定登録
// 支持: Excel (.xlsx/.xls), CSV
// ==========================================
// 流程: TabularReader → normalizer → field_validator → reference_index
//       → warning_classifier → outcome → commit
// ==========================================

// 模块声明
pub mod commit;
pub mod date_grammar;
pub mod error;
pub mod field_validator;
pub mod import_service;
pub mod normalizer;
pub mod outcome;
pub mod postal_loader;
pub mod reference_index;
pub mod report_writer;
pub mod tabular_reader;
pub mod upload_store;
pub mod warning_classifier;

// 重导出核心类型
pub use commit::{CommitEngine, CommitTally};
pub use error::{ImportError, ImportResult, StructuralError};
pub use import_service::{CompanyImportService, PreviewReport};
pub use postal_loader::parse_postal_csv;
pub use reference_index::{PersistedFacts, ReferenceIndex, StoreFacts};
pub use report_writer::{CsvReportWriter, XlsxReportWriter};
pub use tabular_reader::{CsvTabularReader, XlsxTabularReader};
pub use upload_store::{FsUploadStore, ImportHandle, StoredUpload, UploadMeta};
pub use warning_classifier::classify;

// 重导出 Trait 接口
pub use report_writer::ReportWriter;
pub use tabular_reader::TabularReader;
pub use upload_store::UploadStore;
