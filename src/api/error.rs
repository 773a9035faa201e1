// ==========================================
// 企业名录系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，将引擎/仓储错误转换为用户可读的消息
// 规则: 结构错误与登録失败均为单条纠正提示
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入错误
    // ==========================================
    #[error("{0}")]
    InvalidInput(String),

    /// 上传被拒绝（空文件 / 扩展名）
    #[error("{0}")]
    UploadRejected(String),

    /// 上传句柄不存在（会话过期或已登録）
    #[error("{0}")]
    NotFound(String),

    // ==========================================
    // 导入错误
    // ==========================================
    /// 文件结构错误（整个批次失败）
    #[error("{0}")]
    StructuralError(String),

    #[error("{0}")]
    NothingToCommit(String),

    /// 登録失败（已回滚）
    #[error("{0}")]
    CommitFailed(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::SerializationError(msg) | RepositoryError::InternalError(msg) => {
                ApiError::InternalError(msg)
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        let message = err.to_string();
        match err {
            ImportError::EmptyUpload | ImportError::UnsupportedFormat(_) => {
                ApiError::UploadRejected(message)
            }
            ImportError::UploadNotFound(_) | ImportError::UploadTampered(_) => {
                ApiError::NotFound(message)
            }
            ImportError::Structural(_) => ApiError::StructuralError(message),
            ImportError::NothingToCommit => ApiError::NothingToCommit(message),
            ImportError::StaleReference { .. }
            | ImportError::CommitFailure(_)
            | ImportError::DuplicateData(_) => ApiError::CommitFailed(message),
            ImportError::Repository(inner) => ApiError::from(inner),
            ImportError::Io(msg) => {
                ApiError::InternalError(format!("ファイルの読み込みに失敗しました。({})", msg))
            }
            ImportError::Other(inner) => ApiError::Other(inner),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::error::StructuralError;

    #[test]
    fn test_structural_error_keeps_user_message() {
        let err: ApiError = ImportError::Structural(StructuralError::HeaderEmpty).into();
        assert!(matches!(err, ApiError::StructuralError(_)));
        assert_eq!(err.to_string(), "ヘッダー行が空です。テンプレートを確認してください。");
    }

    #[test]
    fn test_commit_errors_map_to_commit_failed() {
        let err: ApiError = ImportError::StaleReference { row: 4, id: 12 }.into();
        assert!(matches!(err, ApiError::CommitFailed(_)));

        let err: ApiError = ImportError::NothingToCommit.into();
        assert_eq!(err.to_string(), "登録対象のデータがありません。");
    }

    #[test]
    fn test_repository_not_found() {
        let err: ApiError = RepositoryError::NotFound {
            entity: "company".to_string(),
            id: "7".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "company(id=7)不存在");
    }
}
