// ==========================================
// 企业名录系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::{CommitDateGrammar, ImportConfig, ImportConfigReader};
use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 配置值
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置的快照
    pub fn get_config_snapshot(&self) -> RepositoryResult<HashMap<String, String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let mut stmt = conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global'")?;
        let snapshot = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(snapshot)
    }

    fn get_usize_or(&self, key: &str, default: usize) -> RepositoryResult<usize> {
        Ok(self
            .get_config_value(key)?
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(default))
    }
}

impl ImportConfigReader for ConfigManager {
    fn load_import_config(&self) -> RepositoryResult<ImportConfig> {
        let defaults = ImportConfig::default();

        let commit_date_grammar = match self
            .get_config_value(config_keys::COMMIT_DATE_GRAMMAR)?
            .map(|v| v.trim().to_uppercase())
            .as_deref()
        {
            Some("FLEXIBLE") => CommitDateGrammar::Flexible,
            Some("STRICT") => CommitDateGrammar::Strict,
            _ => defaults.commit_date_grammar, // 默认 STRICT
        };

        let abort_on_stale_reference = match self
            .get_config_value(config_keys::ABORT_ON_STALE_REFERENCE)?
            .map(|v| v.trim().to_lowercase())
            .as_deref()
        {
            Some("1") | Some("true") => true,
            Some("0") | Some("false") => false,
            _ => defaults.abort_on_stale_reference,
        };

        Ok(ImportConfig {
            max_rows: self.get_usize_or(config_keys::MAX_ROWS, defaults.max_rows)?,
            name_max_chars: self.get_usize_or(config_keys::NAME_MAX_CHARS, defaults.name_max_chars)?,
            address_max_chars: self
                .get_usize_or(config_keys::ADDRESS_MAX_CHARS, defaults.address_max_chars)?,
            zip_max_chars: self.get_usize_or(config_keys::ZIP_MAX_CHARS, defaults.zip_max_chars)?,
            remarks_max_chars: self
                .get_usize_or(config_keys::REMARKS_MAX_CHARS, defaults.remarks_max_chars)?,
            short_address_max_chars: self.get_usize_or(
                config_keys::SHORT_ADDRESS_MAX_CHARS,
                defaults.short_address_max_chars,
            )?,
            commit_date_grammar,
            abort_on_stale_reference,
        })
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 行数上限
    pub const MAX_ROWS: &str = "import/max_rows";

    // 字数上限
    pub const NAME_MAX_CHARS: &str = "import/name_max_chars";
    pub const ADDRESS_MAX_CHARS: &str = "import/address_max_chars";
    pub const ZIP_MAX_CHARS: &str = "import/zip_max_chars";
    pub const REMARKS_MAX_CHARS: &str = "import/remarks_max_chars";

    // 警告阈值
    pub const SHORT_ADDRESS_MAX_CHARS: &str = "import/short_address_max_chars";

    // 登録
    pub const COMMIT_DATE_GRAMMAR: &str = "import/commit_date_grammar";
    pub const ABORT_ON_STALE_REFERENCE: &str = "import/abort_on_stale_reference";
}
