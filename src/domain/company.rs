// ==========================================
// 企业名录系统 - 企业领域模型
// ==========================================
// 依据: companies 表 / zip_master 表
// 用途: 导入层只读其存在性事实，并整体写入替换
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// CompanyRecord - 企业主数据
// ==========================================
// 红线: 生命周期由记录库拥有，导入引擎不负责删除/回收站
// 对齐: companies 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub id: Option<i64>,               // 企业ID（None = 尚未落库）
    pub name: String,                  // 企业名（≤100）
    pub address: String,               // 住所（≤200）
    pub zip_code: String,              // 郵便番号（123-4567）
    pub registration_date: Option<NaiveDate>, // 登録日（新记录落库前必定补齐）
    pub remarks: Option<String>,       // 備考（≤1000）
}

impl CompanyRecord {
    /// 新记录骨架（尚无 ID、无登録日）
    pub fn new_shell() -> Self {
        Self {
            id: None,
            name: String::new(),
            address: String::new(),
            zip_code: String::new(),
            registration_date: None,
            remarks: None,
        }
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }
}

// ==========================================
// PostalRecord - 邮编主数据
// ==========================================
// 只读参考数据，外部维护
// 对齐: zip_master 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalRecord {
    pub zip_code: String,   // 7 位数字，无连字符（例: 1000005）
    pub prefecture: String, // 都道府県（例: 東京都）
    pub city: String,       // 市区町村（例: 千代田区）
    pub town: String,       // 町域（例: 丸の内），可为空
}

impl PostalRecord {
    /// 住所应当以此前缀开头（都道府県 + 市区町村）
    pub fn expected_prefix(&self) -> String {
        format!("{}{}", self.prefecture, self.city)
    }
}
