// ==========================================
// 企业名录系统 - 配置层
// ==========================================
// 职责: 导入配置管理,支持 config_kv 覆写; 默认路径解析
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;
pub mod paths;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use import_config_trait::{CommitDateGrammar, ImportConfig, ImportConfigReader, DEFAULT_MAX_ROWS};
pub use paths::{get_default_db_path, get_default_upload_dir};
