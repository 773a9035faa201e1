// ==========================================
// 企业名录系统 - 默认路径
// ==========================================
// 优先级: 环境变量 → 用户数据目录 → 当前目录
// ==========================================

use std::path::PathBuf;

const DB_PATH_ENV: &str = "COMPANY_DIRECTORY_DB_PATH";
const UPLOAD_DIR_ENV: &str = "COMPANY_DIRECTORY_UPLOAD_DIR";
const DB_FILE_NAME: &str = "company_directory.db";

/// 获取默认数据库路径
///
/// # 返回
/// - COMPANY_DIRECTORY_DB_PATH（非空时）
/// - 用户数据目录/company-directory/company_directory.db
/// - 无法获取数据目录时: ./company_directory.db
pub fn get_default_db_path() -> String {
    if let Some(path) = env_path(DB_PATH_ENV) {
        return path.to_string_lossy().to_string();
    }

    let path = match data_dir() {
        Some(dir) => dir.join(DB_FILE_NAME),
        None => PathBuf::from(".").join(DB_FILE_NAME),
    };
    path.to_string_lossy().to_string()
}

/// 获取默认上传文件目录
///
/// # 返回
/// - COMPANY_DIRECTORY_UPLOAD_DIR（非空时）
/// - 用户数据目录/company-directory/uploads
/// - 无法获取数据目录时: ./uploads
pub fn get_default_upload_dir() -> PathBuf {
    if let Some(path) = env_path(UPLOAD_DIR_ENV) {
        return path;
    }

    match data_dir() {
        Some(dir) => dir.join("uploads"),
        None => PathBuf::from("./uploads"),
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    let value = std::env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

fn data_dir() -> Option<PathBuf> {
    let dir = dirs::data_dir()?.join("company-directory");
    // 目录创建失败时退回当前目录
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}
