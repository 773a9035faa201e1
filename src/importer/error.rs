// ==========================================
// 企业名录系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分层: StructuralError（批次致命，读取阶段）/ ImportError（引擎）
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

// ==========================================
// StructuralError - 文件结构错误
// ==========================================
// 整个批次失败，不产生部分结果；消息直接展示给用户
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    // ===== 文件相关错误 =====
    #[error("ファイル形式が不正です。Excelファイル（.xlsx/.xls）であることを確認してください。")]
    InvalidFormat,

    #[error("パスワード保護されたファイルは読み込めません。保護を解除してください。")]
    Encrypted,

    #[error("ファイルが破損している可能性があります。正しいExcelファイルをアップロードしてください。")]
    Corrupted,

    #[error("ファイルを読み込めません。Excelファイルが壊れている可能性があります。")]
    Unreadable,

    #[error("CSVファイルを読み込めません：{0}")]
    CsvUnreadable(String),

    // ===== 工作表相关错误 =====
    #[error("シートが存在しません。正しいテンプレートを使用してください。")]
    NoSheet,

    #[error("シートにデータがありません。")]
    NoData,

    #[error("データ量が大きすぎて読み込めません。ファイルを分割してください。")]
    TooManyRows { rows: usize, limit: usize },

    // ===== 表头相关错误 =====
    #[error("ヘッダー行が存在しません。テンプレートを使用してください。")]
    HeaderMissing,

    #[error("ヘッダー行が空です。テンプレートを確認してください。")]
    HeaderEmpty,

    #[error("必須列が不足しています：{0}")]
    MissingColumn(String),

    // ===== 单元格错误 =====
    #[error("セル書式が破損しています。（行: {row}, 列: {col}）セル結合の解除や再保存を試してください。")]
    BrokenCell { row: usize, col: usize },
}

// 实现 From<csv::Error>
impl From<csv::Error> for StructuralError {
    fn from(err: csv::Error) -> Self {
        StructuralError::CsvUnreadable(err.to_string())
    }
}

// ==========================================
// ImportError - 导入引擎错误
// ==========================================
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 上传相关错误 =====
    #[error("ファイルが選択されていません。")]
    EmptyUpload,

    #[error("Excelファイル(.xlsx/.xls)またはCSVファイルのみアップロード可能です。")]
    UnsupportedFormat(String),

    #[error("セッションが切れました。再度ファイルをアップロードしてください。")]
    UploadNotFound(String),

    #[error("アップロードファイルの内容が変更されています: {0}")]
    UploadTampered(String),

    // ===== 读取阶段 =====
    #[error(transparent)]
    Structural(#[from] StructuralError),

    // ===== 登録阶段 =====
    #[error("登録対象のデータがありません。")]
    NothingToCommit,

    #[error("企業ID {id} は既に存在しません（{row}行目）。登録を中止しました。")]
    StaleReference { row: usize, id: i64 },

    #[error("登録処理に失敗しました。データは保存されていません: {0}")]
    CommitFailure(String),

    #[error("データの重複が検出されました。既に登録されているデータがあります。")]
    DuplicateData(String),

    // ===== 基础设施 =====
    #[error("数据访问失败: {0}")]
    Repository(#[from] RepositoryError),

    #[error("文件读写失败: {0}")]
    Io(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::Io(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Io(err.to_string())
    }
}

// 实现 From<rust_xlsxwriter::XlsxError>
impl From<rust_xlsxwriter::XlsxError> for ImportError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ImportError::Io(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
