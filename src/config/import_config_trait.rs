// ==========================================
// 企业名录系统 - 导入配置
// ==========================================
// 职责: 导入引擎所需的阈值与开关（含默认值）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::repository::error::RepositoryResult;
use serde::{Deserialize, Serialize};

/// 行数上限（不含表头），防止内存溢出
pub const DEFAULT_MAX_ROWS: usize = 50_000;

// ==========================================
// CommitDateGrammar - 登録时的登録日解析规则
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitDateGrammar {
    /// 仅 yyyy/MM/dd，失败回退为今天
    Strict,
    /// 与核对阶段相同的多格式解析
    Flexible,
}

// ==========================================
// ImportConfig - 导入配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    pub max_rows: usize,
    pub name_max_chars: usize,
    pub address_max_chars: usize,
    pub zip_max_chars: usize,
    pub remarks_max_chars: usize,
    /// 住所字数 ≤ 此值时给出警告
    pub short_address_max_chars: usize,
    pub commit_date_grammar: CommitDateGrammar,
    /// true: 登録时企業ID失效则整体回滚；false: 跳过该行并在结果中报告
    pub abort_on_stale_reference: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_rows: DEFAULT_MAX_ROWS,
            name_max_chars: 100,
            address_max_chars: 200,
            zip_max_chars: 8,
            remarks_max_chars: 1000,
            short_address_max_chars: 5,
            commit_date_grammar: CommitDateGrammar::Strict,
            abort_on_stale_reference: false,
        }
    }
}

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait ImportConfigReader {
    /// 读取导入配置（缺失/非法值回退默认）
    fn load_import_config(&self) -> RepositoryResult<ImportConfig>;
}

/// 固定配置（测试/无数据库场景）
impl ImportConfigReader for ImportConfig {
    fn load_import_config(&self) -> RepositoryResult<ImportConfig> {
        Ok(self.clone())
    }
}
