// ==========================================
// 企业名录系统 - 上传文件存储
// ==========================================
// 职责: 按内容寻址保存上传字节，供预览与登録两次解析
// 句柄: 上传内容的 SHA-256（hex），读取时校验
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

// ==========================================
// ImportHandle - 内容寻址句柄
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportHandle(String);

impl ImportHandle {
    /// 计算内容句柄
    pub fn of(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// 解析外部传入的句柄（64 位小写 hex）
    pub fn parse(value: &str) -> ImportResult<Self> {
        let value = value.trim().to_lowercase();
        let valid = value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit());
        if !valid {
            return Err(ImportError::UploadNotFound(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 上传元数据（与内容一同保存）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMeta {
    pub file_name: String,
    pub size: usize,
    pub uploaded_at: DateTime<Utc>,
}

/// 读取结果
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub handle: ImportHandle,
    pub meta: UploadMeta,
    pub bytes: Vec<u8>,
}

// ==========================================
// UploadStore Trait
// ==========================================
pub trait UploadStore {
    /// 保存上传内容（相同内容覆盖写入同一句柄）
    fn put(&self, file_name: &str, bytes: &[u8]) -> ImportResult<ImportHandle>;

    /// 读取并校验内容
    ///
    /// # 返回
    /// - Err(UploadNotFound): 句柄不存在（已登録并清理，或从未上传）
    /// - Err(UploadTampered): 内容与句柄不符
    fn load(&self, handle: &ImportHandle) -> ImportResult<StoredUpload>;

    /// 删除（不存在视为成功）
    fn remove(&self, handle: &ImportHandle) -> ImportResult<()>;
}

// ==========================================
// 文件系统实现
// ==========================================
pub struct FsUploadStore {
    root: PathBuf,
}

impl FsUploadStore {
    pub fn new(root: impl Into<PathBuf>) -> ImportResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn content_path(&self, handle: &ImportHandle) -> PathBuf {
        self.root.join(format!("{}.bin", handle))
    }

    fn meta_path(&self, handle: &ImportHandle) -> PathBuf {
        self.root.join(format!("{}.json", handle))
    }
}

impl UploadStore for FsUploadStore {
    fn put(&self, file_name: &str, bytes: &[u8]) -> ImportResult<ImportHandle> {
        let handle = ImportHandle::of(bytes);
        let meta = UploadMeta {
            file_name: file_name.to_string(),
            size: bytes.len(),
            uploaded_at: Utc::now(),
        };

        fs::write(self.content_path(&handle), bytes)?;
        let meta_json = serde_json::to_vec_pretty(&meta).map_err(|e| ImportError::Io(e.to_string()))?;
        fs::write(self.meta_path(&handle), meta_json)?;

        info!(handle = %handle, file_name, size = bytes.len(), "上传文件已保存");
        Ok(handle)
    }

    fn load(&self, handle: &ImportHandle) -> ImportResult<StoredUpload> {
        let content_path = self.content_path(handle);
        if !content_path.exists() {
            return Err(ImportError::UploadNotFound(handle.to_string()));
        }

        let bytes = fs::read(&content_path)?;
        if ImportHandle::of(&bytes) != *handle {
            return Err(ImportError::UploadTampered(handle.to_string()));
        }

        let meta_bytes = fs::read(self.meta_path(handle))?;
        let meta: UploadMeta =
            serde_json::from_slice(&meta_bytes).map_err(|e| ImportError::Io(e.to_string()))?;

        debug!(handle = %handle, size = bytes.len(), "上传文件已读取");
        Ok(StoredUpload {
            handle: handle.clone(),
            meta,
            bytes,
        })
    }

    fn remove(&self, handle: &ImportHandle) -> ImportResult<()> {
        for path in [self.content_path(handle), self.meta_path(handle)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        debug!(handle = %handle, "上传文件已清理");
        Ok(())
    }
}
