// ==========================================
// 企业名录系统 - 企业导入 Repository 实现
// ==========================================
// 职责: 实现导入相关数据访问（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::{CommitMode, CompanyRecord, ImportBatch};
use crate::repository::company_import_repo::CompanyImportRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

// ==========================================
// CompanyImportRepositoryImpl
// ==========================================
pub struct CompanyImportRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl CompanyImportRepositoryImpl {
    /// 创建新的 Repository 实例
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

    /// 从已有连接创建
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> RepositoryResult<T>) -> RepositoryResult<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        f(&conn)
    }
}

impl CompanyImportRepository for CompanyImportRepositoryImpl {
    fn exists_by_name(&self, name: &str) -> RepositoryResult<bool> {
        self.with_conn(|conn| exists_by_name(conn, name))
    }

    fn exists_by_address(&self, address: &str) -> RepositoryResult<bool> {
        self.with_conn(|conn| exists_by_address(conn, address))
    }

    fn all_ids(&self) -> RepositoryResult<HashSet<i64>> {
        self.with_conn(all_ids)
    }

    fn find_by_id(&self, id: i64) -> RepositoryResult<Option<CompanyRecord>> {
        self.with_conn(|conn| find_by_id(conn, id))
    }

    fn save(&self, record: CompanyRecord) -> RepositoryResult<CompanyRecord> {
        self.with_conn(|conn| save(conn, record))
    }

    fn find_batches_by_hash(&self, content_hash: &str) -> RepositoryResult<Vec<ImportBatch>> {
        self.with_conn(|conn| find_batches_by_hash(conn, content_hash))
    }

    fn insert_batch(&self, batch: &ImportBatch) -> RepositoryResult<()> {
        self.with_conn(|conn| insert_batch(conn, batch))
    }

    /// 在事务中执行 work（失败整体回滚）
    fn in_transaction(
        &self,
        work: &mut dyn FnMut(&dyn CompanyImportRepository) -> RepositoryResult<()>,
    ) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let scope = TransactionScope { conn: &tx };
        // 失败时 tx 被 drop，自动回滚
        work(&scope)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }
}

// ==========================================
// TransactionScope - 事务内仓储句柄
// ==========================================
struct TransactionScope<'a> {
    conn: &'a Connection,
}

impl CompanyImportRepository for TransactionScope<'_> {
    fn exists_by_name(&self, name: &str) -> RepositoryResult<bool> {
        exists_by_name(self.conn, name)
    }

    fn exists_by_address(&self, address: &str) -> RepositoryResult<bool> {
        exists_by_address(self.conn, address)
    }

    fn all_ids(&self) -> RepositoryResult<HashSet<i64>> {
        all_ids(self.conn)
    }

    fn find_by_id(&self, id: i64) -> RepositoryResult<Option<CompanyRecord>> {
        find_by_id(self.conn, id)
    }

    fn save(&self, record: CompanyRecord) -> RepositoryResult<CompanyRecord> {
        save(self.conn, record)
    }

    fn find_batches_by_hash(&self, content_hash: &str) -> RepositoryResult<Vec<ImportBatch>> {
        find_batches_by_hash(self.conn, content_hash)
    }

    fn insert_batch(&self, batch: &ImportBatch) -> RepositoryResult<()> {
        insert_batch(self.conn, batch)
    }

    // 已在事务内：直接执行
    fn in_transaction(
        &self,
        work: &mut dyn FnMut(&dyn CompanyImportRepository) -> RepositoryResult<()>,
    ) -> RepositoryResult<()> {
        work(self)
    }
}

// ==========================================
// SQL 实现（连接/事务共用）
// ==========================================

const EXISTS_BY_NAME_SQL: &str = "SELECT COUNT(*) FROM companies WHERE TRIM(name) = ?1";
const EXISTS_BY_ADDRESS_SQL: &str = "SELECT COUNT(*) FROM companies WHERE TRIM(address) = ?1";

fn exists_by_name(conn: &Connection, name: &str) -> RepositoryResult<bool> {
    let count: i64 = conn.query_row(EXISTS_BY_NAME_SQL, params![name.trim()], |row| row.get(0))?;
    Ok(count > 0)
}

fn exists_by_address(conn: &Connection, address: &str) -> RepositoryResult<bool> {
    let count: i64 = conn.query_row(EXISTS_BY_ADDRESS_SQL, params![address.trim()], |row| row.get(0))?;
    Ok(count > 0)
}

fn all_ids(conn: &Connection) -> RepositoryResult<HashSet<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM companies")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(ids)
}

fn find_by_id(conn: &Connection, id: i64) -> RepositoryResult<Option<CompanyRecord>> {
    let record = conn
        .query_row(
            r#"
            SELECT id, name, address, zip_code, registration_date, remarks
            FROM companies
            WHERE id = ?1
            "#,
            params![id],
            |row| {
                Ok(CompanyRecord {
                    id: Some(row.get(0)?),
                    name: row.get(1)?,
                    address: row.get(2)?,
                    zip_code: row.get(3)?,
                    registration_date: row.get(4)?,
                    remarks: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(record)
}

fn save(conn: &Connection, mut record: CompanyRecord) -> RepositoryResult<CompanyRecord> {
    match record.id {
        Some(id) => {
            let affected = conn.execute(
                r#"
                UPDATE companies
                SET name = ?2, address = ?3, zip_code = ?4,
                    registration_date = ?5, remarks = ?6,
                    updated_at = datetime('now')
                WHERE id = ?1
                "#,
                params![
                    id,
                    record.name,
                    record.address,
                    record.zip_code,
                    record.registration_date,
                    record.remarks,
                ],
            )?;
            if affected == 0 {
                return Err(RepositoryError::NotFound {
                    entity: "company".to_string(),
                    id: id.to_string(),
                });
            }
        }
        None => {
            conn.execute(
                r#"
                INSERT INTO companies (name, address, zip_code, registration_date, remarks)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    record.name,
                    record.address,
                    record.zip_code,
                    record.registration_date,
                    record.remarks,
                ],
            )?;
            record.id = Some(conn.last_insert_rowid());
        }
    }
    Ok(record)
}

fn find_batches_by_hash(conn: &Connection, content_hash: &str) -> RepositoryResult<Vec<ImportBatch>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT batch_id, content_hash, file_name, mode,
               total_rows, success_rows, warning_rows, error_rows,
               inserted_rows, updated_rows, excluded_rows,
               committed_rows_json, skipped_rows_json,
               committed_at, elapsed_ms
        FROM import_batch
        WHERE content_hash = ?1
        ORDER BY committed_at ASC
        "#,
    )?;

    let rows = stmt
        .query_map(params![content_hash], |row| {
            Ok(BatchRow {
                batch_id: row.get(0)?,
                content_hash: row.get(1)?,
                file_name: row.get(2)?,
                mode: row.get(3)?,
                counts: [
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                    row.get(10)?,
                ],
                committed_json: row.get(11)?,
                skipped_json: row.get(12)?,
                committed_at: row.get(13)?,
                elapsed_ms: row.get(14)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(BatchRow::into_batch).collect()
}

/// import_batch 行（解析前）
struct BatchRow {
    batch_id: String,
    content_hash: String,
    file_name: Option<String>,
    mode: String,
    counts: [i64; 7],
    committed_json: String,
    skipped_json: String,
    committed_at: String,
    elapsed_ms: i64,
}

impl BatchRow {
    fn into_batch(self) -> RepositoryResult<ImportBatch> {
        let mode: CommitMode = self.mode.parse().map_err(|message| RepositoryError::FieldValueError {
            field: "mode".to_string(),
            message,
        })?;
        let committed_at = chrono::DateTime::parse_from_rfc3339(&self.committed_at)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .map_err(|e| RepositoryError::FieldValueError {
                field: "committed_at".to_string(),
                message: e.to_string(),
            })?;
        let [total, success, warning, error, inserted, updated, excluded] = self.counts;

        Ok(ImportBatch {
            batch_id: self.batch_id,
            content_hash: self.content_hash,
            file_name: self.file_name,
            mode,
            total_rows: total as usize,
            success_rows: success as usize,
            warning_rows: warning as usize,
            error_rows: error as usize,
            inserted_rows: inserted as usize,
            updated_rows: updated as usize,
            excluded_rows: excluded as usize,
            committed_row_numbers: serde_json::from_str(&self.committed_json)?,
            skipped_row_numbers: serde_json::from_str(&self.skipped_json)?,
            committed_at,
            elapsed_ms: self.elapsed_ms,
        })
    }
}

fn insert_batch(conn: &Connection, batch: &ImportBatch) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT INTO import_batch (
            batch_id, content_hash, file_name, mode,
            total_rows, success_rows, warning_rows, error_rows,
            inserted_rows, updated_rows, excluded_rows,
            committed_rows_json, skipped_rows_json,
            committed_at, elapsed_ms
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
        params![
            batch.batch_id,
            batch.content_hash,
            batch.file_name,
            batch.mode.as_str(),
            batch.total_rows as i64,
            batch.success_rows as i64,
            batch.warning_rows as i64,
            batch.error_rows as i64,
            batch.inserted_rows as i64,
            batch.updated_rows as i64,
            batch.excluded_rows as i64,
            serde_json::to_string(&batch.committed_row_numbers)?,
            serde_json::to_string(&batch.skipped_row_numbers)?,
            batch.committed_at.to_rfc3339(),
            batch.elapsed_ms,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, ensure_schema};
    use chrono::NaiveDate;

    fn setup_repo() -> CompanyImportRepositoryImpl {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        CompanyImportRepositoryImpl::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn company(name: &str, address: &str) -> CompanyRecord {
        CompanyRecord {
            id: None,
            name: name.to_string(),
            address: address.to_string(),
            zip_code: "100-0005".to_string(),
            registration_date: NaiveDate::from_ymd_opt(2024, 4, 1),
            remarks: None,
        }
    }

    #[test]
    fn test_save_insert_then_update() {
        let repo = setup_repo();

        let saved = repo.save(company("Acme Inc.", "東京都千代田区丸の内1-1-1")).unwrap();
        let id = saved.id.expect("插入后应有 ID");
        assert!(repo.all_ids().unwrap().contains(&id));

        let mut changed = saved.clone();
        changed.remarks = Some("更新済み".to_string());
        repo.save(changed).unwrap();

        let found = repo.find_by_id(id).unwrap().unwrap();
        assert_eq!(found.remarks.as_deref(), Some("更新済み"));
    }

    #[test]
    fn test_update_missing_id_is_not_found() {
        let repo = setup_repo();
        let mut ghost = company("Ghost", "どこか");
        ghost.id = Some(999);

        let result = repo.save(ghost);
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }

    #[test]
    fn test_exists_by_name_compares_trimmed() {
        let repo = setup_repo();
        repo.save(company(" Acme Inc. ", "東京都千代田区丸の内1-1-1")).unwrap();

        assert!(repo.exists_by_name("Acme Inc.").unwrap());
        assert!(repo.exists_by_address("東京都千代田区丸の内1-1-1").unwrap());
        assert!(!repo.exists_by_name("Other").unwrap());
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let repo = setup_repo();

        let result = repo.in_transaction(&mut |tx| {
            tx.save(company("A社", "東京都千代田区1"))?;
            Err(RepositoryError::InternalError("模拟失败".to_string()))
        });

        assert!(result.is_err());
        assert!(repo.all_ids().unwrap().is_empty(), "失败事务不应保留任何写入");
    }

    fn batch(batch_id: &str, hash: &str, mode: CommitMode) -> ImportBatch {
        ImportBatch {
            batch_id: batch_id.to_string(),
            content_hash: hash.to_string(),
            file_name: Some("companies.xlsx".to_string()),
            mode,
            total_rows: 5,
            success_rows: 3,
            warning_rows: 1,
            error_rows: 1,
            inserted_rows: 2,
            updated_rows: 1,
            excluded_rows: 1,
            committed_row_numbers: vec![1, 2, 3],
            skipped_row_numbers: vec![4],
            committed_at: chrono::Utc::now(),
            elapsed_ms: 12,
        }
    }

    #[test]
    fn test_batches_by_hash_one_per_mode() {
        let repo = setup_repo();
        repo.insert_batch(&batch("b-1", "abc", CommitMode::Strict)).unwrap();
        repo.insert_batch(&batch("b-2", "abc", CommitMode::Permissive)).unwrap();

        let found = repo.find_batches_by_hash("abc").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].mode, CommitMode::Strict);
        assert_eq!(found[0].committed_row_numbers, vec![1, 2, 3]);
        assert_eq!(found[0].skipped_row_numbers, vec![4]);
        assert!(repo.find_batches_by_hash("zzz").unwrap().is_empty());

        // 同一内容 + 同一模式只能登録一次
        let result = repo.insert_batch(&batch("b-3", "abc", CommitMode::Strict));
        assert!(matches!(result, Err(RepositoryError::UniqueConstraintViolation(_))));
    }

    #[test]
    fn test_existence_queries_use_trim_indexes() {
        let repo = setup_repo();
        let conn = repo.conn.lock().unwrap();

        for (sql, index) in [
            (EXISTS_BY_NAME_SQL, "idx_companies_name_trim"),
            (EXISTS_BY_ADDRESS_SQL, "idx_companies_address_trim"),
        ] {
            let mut stmt = conn.prepare(&format!("EXPLAIN QUERY PLAN {}", sql)).unwrap();
            let plan: Vec<String> = stmt
                .query_map(params!["x"], |row| row.get(3))
                .unwrap()
                .collect::<Result<_, _>>()
                .unwrap();
            assert!(plan.iter().any(|detail| detail.contains(index)), "{:?}", plan);
        }
    }
}
