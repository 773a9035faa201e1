// ==========================================
// 企业名录系统 - 邮编主数据 Repository
// ==========================================
// 职责: zip_master 查询与批量装载
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::PostalRecord;
use crate::repository::company_import_repo::PostalLookup;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct PostalRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl PostalRepositoryImpl {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 批量写入邮编主数据（INSERT OR REPLACE，事务化）
    ///
    /// # 返回
    /// - Ok(usize): 写入条数
    /// - Err: 数据库错误（整个事务回滚）
    pub fn upsert_all(&self, records: &[PostalRecord]) -> RepositoryResult<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn.unchecked_transaction()?;

        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO zip_master (zip_code, prefecture, city, town)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )?;
            for record in records {
                stmt.execute(params![
                    record.zip_code.replace('-', ""),
                    record.prefecture,
                    record.city,
                    record.town,
                ])?;
                count += 1;
            }
        }

        tx.commit()?;
        Ok(count)
    }

    /// 统计 zip_master 记录数
    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM zip_master", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl PostalLookup for PostalRepositoryImpl {
    fn find_by_zip(&self, zip_code: &str) -> RepositoryResult<Option<PostalRecord>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let record = conn
            .query_row(
                "SELECT zip_code, prefecture, city, town FROM zip_master WHERE zip_code = ?1",
                params![zip_code],
                |row| {
                    Ok(PostalRecord {
                        zip_code: row.get(0)?,
                        prefecture: row.get(1)?,
                        city: row.get(2)?,
                        town: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ensure_schema;

    #[test]
    fn test_upsert_and_find() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        let repo = PostalRepositoryImpl::from_connection(Arc::new(Mutex::new(conn)));

        let written = repo
            .upsert_all(&[PostalRecord {
                zip_code: "100-0005".to_string(),
                prefecture: "東京都".to_string(),
                city: "千代田区".to_string(),
                town: "丸の内".to_string(),
            }])
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(repo.count().unwrap(), 1);

        // 主数据键不含连字符
        let found = repo.find_by_zip("1000005").unwrap().unwrap();
        assert_eq!(found.town, "丸の内");
        assert!(repo.find_by_zip("9999999").unwrap().is_none());
    }
}
