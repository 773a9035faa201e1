// ==========================================
// 企业名录系统 - 参照索引
// ==========================================
// 职责: 批次内查找表（名称/住所 → 行号）+ 记录库事实
// 构建时机: 逐行核对之前，全量扫描一次
// ==========================================

use crate::domain::RawRow;
use crate::importer::normalizer::normalize;
use crate::repository::{CompanyImportRepository, RepositoryResult};
use std::collections::{HashMap, HashSet};

// ==========================================
// PersistedFacts Trait
// ==========================================
// 用途: 核对阶段对记录库的按需点查询
// 实现者: StoreFacts（记录库）/ 测试夹具
pub trait PersistedFacts {
    fn exists_by_name(&self, name: &str) -> RepositoryResult<bool>;
    fn exists_by_address(&self, address: &str) -> RepositoryResult<bool>;
}

/// 记录库适配器
pub struct StoreFacts<'a> {
    repo: &'a dyn CompanyImportRepository,
}

impl<'a> StoreFacts<'a> {
    pub fn new(repo: &'a dyn CompanyImportRepository) -> Self {
        Self { repo }
    }
}

impl PersistedFacts for StoreFacts<'_> {
    fn exists_by_name(&self, name: &str) -> RepositoryResult<bool> {
        self.repo.exists_by_name(name)
    }

    fn exists_by_address(&self, address: &str) -> RepositoryResult<bool> {
        self.repo.exists_by_address(address)
    }
}

// ==========================================
// ReferenceIndex
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    name_rows: HashMap<String, Vec<usize>>,
    address_rows: HashMap<String, Vec<usize>>,
    first_id_rows: HashMap<String, usize>, // 企業ID → 首次出现行号
    persisted_ids: HashSet<i64>,
}

impl ReferenceIndex {
    /// 从批次行与已登録 ID 集合构建
    pub fn build(rows: &[RawRow], persisted_ids: HashSet<i64>) -> Self {
        let mut index = Self {
            persisted_ids,
            ..Default::default()
        };

        for row in rows {
            if let Some(name) = normalize(row.name.as_deref()) {
                index.name_rows.entry(name).or_default().push(row.row_number);
            }
            if let Some(address) = normalize(row.address.as_deref()) {
                index
                    .address_rows
                    .entry(address)
                    .or_default()
                    .push(row.row_number);
            }
            if let Some(id) = normalize(row.external_id.as_deref()) {
                index.first_id_rows.entry(id).or_insert(row.row_number);
            }
        }

        index
    }

    /// 从记录库读取已登録 ID 并构建
    pub fn from_store(rows: &[RawRow], repo: &dyn CompanyImportRepository) -> RepositoryResult<Self> {
        Ok(Self::build(rows, repo.all_ids()?))
    }

    /// 同名的其他行（不含本行）
    pub fn other_rows_with_name(&self, name: &str, row_number: usize) -> Vec<usize> {
        Self::others(&self.name_rows, name, row_number)
    }

    /// 同住所的其他行（不含本行）
    pub fn other_rows_with_address(&self, address: &str, row_number: usize) -> Vec<usize> {
        Self::others(&self.address_rows, address, row_number)
    }

    /// 企業ID 在本行之前已出现过
    pub fn is_duplicate_id(&self, id: &str, row_number: usize) -> bool {
        self.first_id_rows
            .get(id.trim())
            .map_or(false, |&first| first != row_number)
    }

    pub fn is_persisted(&self, id: i64) -> bool {
        self.persisted_ids.contains(&id)
    }

    fn others(map: &HashMap<String, Vec<usize>>, key: &str, row_number: usize) -> Vec<usize> {
        map.get(key.trim())
            .map(|rows| rows.iter().copied().filter(|&r| r != row_number).collect())
            .unwrap_or_default()
    }
}
