// ==========================================
// 企业名录系统 - 核对结果汇总
// ==========================================
// 不变量: total = error + warning + success，三者互斥
//         strict ⊆ permissive ⊆ 无错误行
// ==========================================

use crate::domain::{CommitMode, CommitPlan, ImportOutcome, ReportTarget, ValidatedRow};

impl ImportOutcome {
    /// 一次遍历汇总计数
    pub fn aggregate(rows: Vec<ValidatedRow>) -> Self {
        let (mut success_count, mut warning_count, mut error_count) = (0, 0, 0);

        for row in &rows {
            if row.has_error() {
                error_count += 1;
            } else if row.has_warning() {
                warning_count += 1;
            } else {
                success_count += 1;
            }
        }

        Self {
            total_count: rows.len(),
            rows,
            success_count,
            warning_count,
            error_count,
        }
    }

    pub fn error_rows(&self) -> impl Iterator<Item = &ValidatedRow> {
        self.rows.iter().filter(|r| r.has_error())
    }

    pub fn warning_rows(&self) -> impl Iterator<Item = &ValidatedRow> {
        self.rows.iter().filter(|r| !r.has_error() && r.has_warning())
    }

    pub fn success_rows(&self) -> impl Iterator<Item = &ValidatedRow> {
        self.rows.iter().filter(|r| !r.has_error() && !r.has_warning())
    }

    /// 登録对象（strict: 无错误且无警告；permissive: 无错误）
    pub fn commit_set(&self, mode: CommitMode) -> Vec<&ValidatedRow> {
        self.rows
            .iter()
            .filter(|r| Self::is_selected(r, mode))
            .collect()
    }

    pub fn strict_commit_set(&self) -> Vec<&ValidatedRow> {
        self.commit_set(CommitMode::Strict)
    }

    pub fn permissive_commit_set(&self) -> Vec<&ValidatedRow> {
        self.commit_set(CommitMode::Permissive)
    }

    /// 按新规/更新/除外切分行号
    pub fn plan(&self, mode: CommitMode) -> CommitPlan {
        let mut plan = CommitPlan {
            mode,
            insert_rows: Vec::new(),
            update_rows: Vec::new(),
            excluded_rows: Vec::new(),
        };

        for row in &self.rows {
            let bucket = if !Self::is_selected(row, mode) {
                &mut plan.excluded_rows
            } else if row.is_update {
                &mut plan.update_rows
            } else {
                &mut plan.insert_rows
            };
            bucket.push(row.row_number());
        }

        plan
    }

    /// 报告下载对象行（错误行在前，警告行在后）
    pub fn report_rows(&self, target: ReportTarget) -> Vec<&ValidatedRow> {
        let mut rows: Vec<&ValidatedRow> = Vec::new();
        if matches!(target, ReportTarget::Error | ReportTarget::Both) {
            rows.extend(self.error_rows());
        }
        if matches!(target, ReportTarget::Warning | ReportTarget::Both) {
            rows.extend(self.warning_rows());
        }
        rows
    }

    fn is_selected(row: &ValidatedRow, mode: CommitMode) -> bool {
        match mode {
            CommitMode::Strict => row.is_valid() && !row.has_warning(),
            CommitMode::Permissive => row.is_valid(),
        }
    }
}
