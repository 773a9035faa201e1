// ==========================================
// 企业名录系统 - 确定登録
// ==========================================
// 职责: 将选定行写入记录库（单一事务）
// 规则: 持久化失败 → 整体回滚；企業ID 失效 → 跳过（或按配置回滚）
// ==========================================

use crate::config::{CommitDateGrammar, ImportConfig};
use crate::domain::{CompanyRecord, ValidatedRow};
use crate::importer::date_grammar::{parse_flexible, parse_strict};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::normalizer::normalize;
use crate::repository::{CompanyImportRepository, RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use tracing::{debug, error, warn};

/// 单个事务内的写入统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitTally {
    pub inserted: usize,
    pub updated: usize,
    pub committed_rows: Vec<usize>, // 已写入（新规/更新）的行号
    pub skipped_rows: Vec<usize>,   // 企業ID 已失效而跳过
}

enum RowEffect {
    Inserted,
    Updated,
    Stale(i64),
}

// ==========================================
// CommitEngine
// ==========================================
pub struct CommitEngine<'a> {
    config: &'a ImportConfig,
    today: NaiveDate,
}

impl<'a> CommitEngine<'a> {
    pub fn new(config: &'a ImportConfig, today: NaiveDate) -> Self {
        Self { config, today }
    }

    /// 在一个事务中写入全部选定行
    ///
    /// # 参数
    /// - rows: 登録对象（已由调用方按模式筛选）
    /// - finish: 写入完成后、提交前在同一事务内执行（记录批次）
    ///
    /// # 返回
    /// - Err(StaleReference): abort_on_stale_reference 开启且有 ID 失效（已回滚）
    /// - Err(CommitFailure): 持久化失败（已回滚）
    pub fn commit(
        &self,
        repo: &dyn CompanyImportRepository,
        rows: &[&ValidatedRow],
        finish: &mut dyn FnMut(&dyn CompanyImportRepository, &CommitTally) -> RepositoryResult<()>,
    ) -> ImportResult<CommitTally> {
        let mut tally = CommitTally::default();
        let mut stale: Option<(usize, i64)> = None;

        let result = repo.in_transaction(&mut |tx| {
            tally = CommitTally::default();

            for row in rows {
                match self.apply_row(tx, row)? {
                    RowEffect::Inserted => {
                        tally.inserted += 1;
                        tally.committed_rows.push(row.row_number());
                    }
                    RowEffect::Updated => {
                        tally.updated += 1;
                        tally.committed_rows.push(row.row_number());
                    }
                    RowEffect::Stale(id) => {
                        if self.config.abort_on_stale_reference {
                            stale = Some((row.row_number(), id));
                            return Err(RepositoryError::NotFound {
                                entity: "company".to_string(),
                                id: id.to_string(),
                            });
                        }
                        warn!(row = row.row_number(), id, "企業ID 已失效，跳过该行");
                        tally.skipped_rows.push(row.row_number());
                    }
                }
            }

            finish(tx, &tally)
        });

        match result {
            Ok(()) => Ok(tally),
            Err(_) if stale.is_some() => {
                let (row, id) = stale.unwrap_or_default();
                warn!(row, id, "企業ID 已失效，登録已整体回滚");
                Err(ImportError::StaleReference { row, id })
            }
            Err(RepositoryError::UniqueConstraintViolation(msg)) => {
                error!(error = %msg, "登録违反唯一约束，事务已回滚");
                Err(ImportError::DuplicateData(msg))
            }
            Err(e) => {
                error!(error = %e, "登録失败，事务已回滚");
                Err(ImportError::CommitFailure(e.to_string()))
            }
        }
    }

    fn apply_row(
        &self,
        tx: &dyn CompanyImportRepository,
        row: &ValidatedRow,
    ) -> RepositoryResult<RowEffect> {
        let raw = &row.raw;

        let mut record = match normalize(raw.external_id.as_deref()) {
            Some(id_text) => {
                let Ok(id) = id_text.parse::<i64>() else {
                    return Ok(RowEffect::Stale(0));
                };
                match tx.find_by_id(id)? {
                    Some(existing) => existing,
                    None => return Ok(RowEffect::Stale(id)),
                }
            }
            None => CompanyRecord::new_shell(),
        };
        let is_new = record.is_new();

        record.name = raw.name.clone().unwrap_or_default();
        record.address = raw.address.clone().unwrap_or_default();
        record.zip_code = raw.zip_code.clone().unwrap_or_default();
        record.remarks = raw.remarks.clone();
        record.registration_date = self.resolve_date(raw.registration_date_text.as_deref(), record.registration_date);

        let saved = tx.save(record)?;
        debug!(row = raw.row_number, id = ?saved.id, is_new, "企业已保存");

        Ok(if is_new {
            RowEffect::Inserted
        } else {
            RowEffect::Updated
        })
    }

    /// 登録日: 有值按登録语法解析（失败 → 今天）；空白 → 保留原值（新规 → 今天）
    fn resolve_date(&self, text: Option<&str>, existing: Option<NaiveDate>) -> Option<NaiveDate> {
        match normalize(text) {
            Some(text) => {
                let parsed = match self.config.commit_date_grammar {
                    CommitDateGrammar::Strict => parse_strict(&text),
                    CommitDateGrammar::Flexible => parse_flexible(&text),
                };
                Some(parsed.unwrap_or(self.today))
            }
            None => Some(existing.unwrap_or(self.today)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn test_resolve_date_strict_grammar() {
        let config = ImportConfig::default();
        let engine = CommitEngine::new(&config, today());
        let existing = NaiveDate::from_ymd_opt(2020, 1, 1);

        assert_eq!(
            engine.resolve_date(Some("2024/01/05"), None),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
        // 核对阶段可识别，但登録语法不识别 → 今天
        assert_eq!(engine.resolve_date(Some("2024-01-05"), existing), Some(today()));
        // 空白 → 保留原值 / 新规为今天
        assert_eq!(engine.resolve_date(None, existing), existing);
        assert_eq!(engine.resolve_date(Some(" "), None), Some(today()));
    }

    #[test]
    fn test_resolve_date_flexible_grammar() {
        let config = ImportConfig {
            commit_date_grammar: CommitDateGrammar::Flexible,
            ..ImportConfig::default()
        };
        let engine = CommitEngine::new(&config, today());
        assert_eq!(
            engine.resolve_date(Some("2024-01-05"), None),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
    }
}
