// ==========================================
// 企業名録系统 - 命令行入口
// ==========================================
// 子命令: preview / commit / report / load-postal
// 日志输出到 stderr，命令结果输出到 stdout
// ==========================================

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use company_directory::api::{ImportApi, PreviewResponse};
use company_directory::config::{get_default_db_path, get_default_upload_dir};
use company_directory::importer::{CsvReportWriter, ReportWriter, XlsxReportWriter};
use company_directory::logging;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "company-directory",
    version,
    about = "企業名録 - 企业记录批量导入（预览核对 → 确定登録）"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// SQLite 数据库路径（默认: COMPANY_DIRECTORY_DB_PATH 或用户数据目录）
    #[arg(long = "db", value_name = "PATH", global = true)]
    db_path: Option<String>,

    /// 上传文件存储目录（默认: COMPANY_DIRECTORY_UPLOAD_DIR 或 <数据目录>/uploads）
    #[arg(long = "upload-dir", value_name = "DIR", global = true)]
    upload_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// 上传表格并显示核对结果（不写入）
    Preview {
        /// .xlsx / .xls / .csv 文件
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// 按预览句柄确定登録
    Commit {
        #[arg(value_name = "HANDLE")]
        handle: String,

        #[arg(long, value_enum, default_value = "strict")]
        mode: ModeArg,
    },

    /// 下载错误/警告行报告（.xlsx / .csv）
    Report {
        #[arg(value_name = "HANDLE")]
        handle: String,

        #[arg(long, value_enum, default_value = "both")]
        target: TargetArg,

        #[arg(long, value_enum, default_value = "xlsx")]
        format: FormatArg,

        /// 输出路径（默认: 当前目录下的建议文件名）
        #[arg(long = "out", value_name = "PATH")]
        out: Option<PathBuf>,
    },

    /// 装载邮编主数据（zip,prefecture,city,town）
    LoadPostal {
        #[arg(value_name = "CSV")]
        csv: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// 仅正常数据
    Strict,
    /// 正常 + 警告数据
    All,
}

impl ModeArg {
    fn as_str(self) -> &'static str {
        match self {
            ModeArg::Strict => "strict",
            ModeArg::All => "all",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum TargetArg {
    Error,
    Warning,
    Both,
}

impl TargetArg {
    fn as_str(self) -> &'static str {
        match self {
            TargetArg::Error => "error",
            TargetArg::Warning => "warning",
            TargetArg::Both => "both",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Xlsx,
    Csv,
}

impl FormatArg {
    fn writer(self) -> Box<dyn ReportWriter> {
        match self {
            FormatArg::Xlsx => Box::new(XlsxReportWriter),
            FormatArg::Csv => Box::new(CsvReportWriter),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init();

    let db_path = cli.db_path.unwrap_or_else(get_default_db_path);
    let upload_dir = cli.upload_dir.unwrap_or_else(get_default_upload_dir);
    tracing::debug!(db_path = %db_path, upload_dir = %upload_dir.display(), "启动");

    let report_writer: Box<dyn ReportWriter> = match &cli.command {
        Command::Report { format, .. } => format.writer(),
        _ => Box::new(XlsxReportWriter),
    };
    let api = ImportApi::with_report_writer(&db_path, &upload_dir, report_writer)
        .context("初始化失败")?;

    match cli.command {
        Command::Preview { file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("无法读取文件: {}", file.display()))?;
            let preview = api.upload_and_preview(&file_name_of(&file), &bytes)?;
            print_preview(&preview);
        }
        Command::Commit { handle, mode } => {
            let response = api.commit(&handle, mode.as_str())?;
            let summary = &response.summary;
            println!("{}", response.message);
            println!(
                "新規 {} 件 / 更新 {} 件 / 除外 {} 件",
                summary.inserted, summary.updated, summary.excluded
            );
            if summary.previously_committed > 0 {
                println!("他のモードで登録済み: {} 件", summary.previously_committed);
            }
            if !summary.skipped_rows.is_empty() {
                println!("ID 不存在のためスキップ: {:?} 行目", summary.skipped_rows);
            }
            if summary.replayed {
                println!("batch_id={} ({})", summary.batch_id, summary.mode);
            }
        }
        Command::Report {
            handle, target, out, ..
        } => {
            let download = api.download_report(&handle, target.as_str())?;
            let path = out.unwrap_or_else(|| PathBuf::from(&download.file_name));
            std::fs::write(&path, &download.content)
                .with_context(|| format!("无法写入文件: {}", path.display()))?;
            println!("{}", path.display());
        }
        Command::LoadPostal { csv } => {
            let bytes = std::fs::read(&csv)
                .with_context(|| format!("无法读取文件: {}", csv.display()))?;
            let count = api.load_postal(&bytes)?;
            println!("{} 件の郵便番号データを登録しました。", count);
        }
    }

    Ok(())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

fn print_preview(preview: &PreviewResponse) {
    println!("handle: {}", preview.handle);
    println!("file:   {}", preview.file_name);
    println!(
        "全 {} 件 (正常 {} / 警告 {} / エラー {})",
        preview.total_count, preview.success_count, preview.warning_count, preview.error_count
    );
    println!("[strict] {}", preview.strict_plan.describe());
    println!("[all]    {}", preview.permissive_plan.describe());

    for row in preview.rows.iter().filter(|r| !r.errors.is_empty() || !r.warnings.is_empty()) {
        for message in row.errors.iter().chain(row.warnings.iter()) {
            println!("{:>6}行目: {}", row.row_number, message);
        }
    }
}
