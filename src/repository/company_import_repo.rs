// ==========================================
// 企业名录系统 - 企业导入 Repository Trait
// ==========================================
// 职责: 定义导入引擎所需的记录库接口（不包含实现）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::{CompanyRecord, ImportBatch, PostalRecord};
use crate::repository::error::RepositoryResult;
use std::collections::HashSet;

// ==========================================
// CompanyImportRepository Trait
// ==========================================
// 用途: 导入核对与确定登録的数据访问
// 实现者: CompanyImportRepositoryImpl（rusqlite）
pub trait CompanyImportRepository {
    // ===== 存在性事实（核对阶段）=====

    /// 是否存在同名企业（按 TRIM 后比较）
    fn exists_by_name(&self, name: &str) -> RepositoryResult<bool>;

    /// 是否存在同住所企业（按 TRIM 后比较）
    fn exists_by_address(&self, address: &str) -> RepositoryResult<bool>;

    /// 全部已登録企业ID
    fn all_ids(&self) -> RepositoryResult<HashSet<i64>>;

    // ===== 读写（登録阶段）=====

    /// 按 ID 查询企业
    ///
    /// # 返回
    /// - Ok(Some(record)): 找到
    /// - Ok(None): 未找到
    fn find_by_id(&self, id: i64) -> RepositoryResult<Option<CompanyRecord>>;

    /// 保存企业（id 为 None 时插入，否则整体替换）
    ///
    /// # 返回
    /// - Ok(record): 已落库记录（插入时带新 ID）
    /// - Err(NotFound): 更新目标已不存在
    fn save(&self, record: CompanyRecord) -> RepositoryResult<CompanyRecord>;

    // ===== 批次记录 =====

    /// 按上传内容哈希查询已登録批次（每种模式至多一条，按登録时间升序）
    fn find_batches_by_hash(&self, content_hash: &str) -> RepositoryResult<Vec<ImportBatch>>;

    /// 记录已登録批次
    fn insert_batch(&self, batch: &ImportBatch) -> RepositoryResult<()>;

    // ===== 事务 =====

    /// 在单个事务中执行 work
    ///
    /// # 说明
    /// - work 收到的仓储句柄上的所有读写都处于同一事务
    /// - work 返回 Err 时整个事务回滚，错误原样返回
    fn in_transaction(
        &self,
        work: &mut dyn FnMut(&dyn CompanyImportRepository) -> RepositoryResult<()>,
    ) -> RepositoryResult<()>;
}

// ==========================================
// PostalLookup Trait
// ==========================================
// 用途: 邮编主数据查询（zip → 都道府県/市区町村/町域）
// 实现者: PostalRepositoryImpl（rusqlite）
pub trait PostalLookup {
    /// 按 7 位邮编（无连字符）查询
    fn find_by_zip(&self, zip_code: &str) -> RepositoryResult<Option<PostalRecord>>;
}
