// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的临时数据库、上传目录、CSV 构造、主数据装载
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDate;
use company_directory::api::ImportApi;
use company_directory::config::ConfigManager;
use company_directory::db::{configure_sqlite_connection, ensure_schema};
use company_directory::domain::{CompanyRecord, PostalRecord};
use company_directory::importer::{CompanyImportService, CsvReportWriter, FsUploadStore};
use company_directory::repository::{
    CompanyImportRepository, CompanyImportRepositoryImpl, PostalRepositoryImpl,
};
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::{NamedTempFile, TempDir};

/// 导入模板表头
pub const HEADER: &str = "企業ID,企業名,住所,郵便番号,登録日,備考";

pub type TestService =
    CompanyImportService<CompanyImportRepositoryImpl, PostalRepositoryImpl, ConfigManager>;

/// 测试环境（临时数据库 + 临时上传目录，需要保持存活）
pub struct TestEnv {
    _db_file: NamedTempFile,
    upload_dir: TempDir,
    pub db_path: String,
}

impl TestEnv {
    /// 创建临时测试数据库并初始化 schema、邮编主数据
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let db_file = NamedTempFile::new()?;
        let db_path = db_file
            .path()
            .to_str()
            .ok_or("临时文件路径不是 UTF-8")?
            .to_string();

        let conn = Connection::open(&db_path)?;
        configure_sqlite_connection(&conn)?;
        ensure_schema(&conn)?;

        let env = Self {
            _db_file: db_file,
            upload_dir: TempDir::new()?,
            db_path,
        };
        env.postal_repo()?.upsert_all(&default_postal_records())?;
        Ok(env)
    }

    pub fn upload_dir(&self) -> &std::path::Path {
        self.upload_dir.path()
    }

    /// 构造导入服务（独立连接）
    pub fn service(&self) -> Result<TestService, Box<dyn Error>> {
        let conn = Connection::open(&self.db_path)?;
        configure_sqlite_connection(&conn)?;
        let conn = Arc::new(Mutex::new(conn));

        Ok(CompanyImportService::new(
            CompanyImportRepositoryImpl::from_connection(conn.clone()),
            PostalRepositoryImpl::from_connection(conn.clone()),
            ConfigManager::from_connection(conn)?,
            Box::new(FsUploadStore::new(self.upload_dir.path())?),
            Box::new(CsvReportWriter),
        ))
    }

    /// 构造 ImportApi（与服务共用同一数据库与上传目录）
    pub fn api(&self) -> Result<ImportApi, Box<dyn Error>> {
        Ok(ImportApi::new(&self.db_path, self.upload_dir.path())?)
    }

    pub fn repo(&self) -> Result<CompanyImportRepositoryImpl, Box<dyn Error>> {
        Ok(CompanyImportRepositoryImpl::new(&self.db_path)?)
    }

    pub fn postal_repo(&self) -> Result<PostalRepositoryImpl, Box<dyn Error>> {
        Ok(PostalRepositoryImpl::new(&self.db_path)?)
    }

    pub fn config(&self) -> Result<ConfigManager, Box<dyn Error>> {
        Ok(ConfigManager::new(&self.db_path)?)
    }

    /// 预先登録一家企业，返回其 ID
    pub fn seed_company(&self, name: &str, address: &str) -> Result<i64, Box<dyn Error>> {
        let saved = self.repo()?.save(CompanyRecord {
            id: None,
            name: name.to_string(),
            address: address.to_string(),
            zip_code: "100-0005".to_string(),
            registration_date: NaiveDate::from_ymd_opt(2020, 4, 1),
            remarks: None,
        })?;
        Ok(saved.id.ok_or("插入后应有 ID")?)
    }

    pub fn company_count(&self) -> Result<usize, Box<dyn Error>> {
        Ok(self.repo()?.all_ids()?.len())
    }
}

/// 测试用邮编主数据
pub fn default_postal_records() -> Vec<PostalRecord> {
    vec![
        PostalRecord {
            zip_code: "1000005".to_string(),
            prefecture: "東京都".to_string(),
            city: "千代田区".to_string(),
            town: "丸の内".to_string(),
        },
        PostalRecord {
            zip_code: "5300001".to_string(),
            prefecture: "大阪府".to_string(),
            city: "大阪市北区".to_string(),
            town: "梅田".to_string(),
        },
    ]
}

/// 核对基准日
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date")
}

/// 构造导入 CSV（表头 + 行）
///
/// 每行依次为 企業ID,企業名,住所,郵便番号,登録日,備考
pub fn csv_of(rows: &[[&str; 6]]) -> Vec<u8> {
    let mut content = String::from(HEADER);
    content.push('\n');
    for row in rows {
        content.push_str(&row.join(","));
        content.push('\n');
    }
    content.into_bytes()
}

/// 一行正常数据（新规）
pub fn valid_row<'a>(name: &'a str, address: &'a str) -> [&'a str; 6] {
    ["", name, address, "100-0005", "2024/01/05", ""]
}
