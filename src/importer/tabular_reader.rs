// ==========================================
// 企业名录系统 - 表格读取器
// ==========================================
// 职责: 上传字节 → RawRow 序列，并校验文件结构
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 红线: 结构问题返回 StructuralError，不做行级校验
// ==========================================

use crate::domain::RawRow;
use crate::importer::error::StructuralError;
use calamine::{Data, DataType, Range, Reader, Sheets, Xls, Xlsx};
use csv::ReaderBuilder;
use std::io::Cursor;

// ==========================================
// 列标签（按表头文本精确匹配）
// ==========================================
pub mod columns {
    pub const EXTERNAL_ID: &str = "企業ID";
    pub const NAME: &str = "企業名";
    pub const ADDRESS: &str = "住所";
    pub const ZIP_CODE: &str = "郵便番号";
    pub const REGISTRATION_DATE: &str = "登録日";
    pub const REMARKS: &str = "備考";

    /// 必须列（检查顺序即报错顺序）
    pub const REQUIRED: [&str; 3] = [NAME, ADDRESS, ZIP_CODE];
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const CFB_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

// ==========================================
// TabularReader Trait
// ==========================================
// 实现者: XlsxTabularReader / CsvTabularReader
pub trait TabularReader {
    /// 读取全部非空数据行
    ///
    /// # 参数
    /// - bytes: 上传文件内容
    /// - max_rows: 数据行上限（不含表头）
    ///
    /// # 返回
    /// - Ok(rows): 按行号升序
    /// - Err(StructuralError): 文件无法作为导入模板解释
    fn read_rows(&self, bytes: &[u8], max_rows: usize) -> Result<Vec<RawRow>, StructuralError>;
}

// ==========================================
// CellValue - 读取器中间单元格
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Text(String),
    Empty,
    /// 无法解码的单元格（错误值、损坏的日期序列）
    Invalid,
}

impl CellValue {
    /// 原文保留（仅空白的单元格视为空）
    fn text(s: &str) -> Self {
        if s.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

/// 表格网格（第 0 行为表头）
///
/// origin: 网格左上角在工作表中的物理位置（0 起算的行、列）
#[derive(Debug, Clone, Default)]
pub struct Grid {
    pub origin: (usize, usize),
    pub rows: Vec<Vec<CellValue>>,
}

// ==========================================
// 列映射
// ==========================================
#[derive(Debug, Default)]
struct ColumnMap {
    external_id: Option<usize>,
    name: Option<usize>,
    address: Option<usize>,
    zip_code: Option<usize>,
    registration_date: Option<usize>,
    remarks: Option<usize>,
}

impl ColumnMap {
    fn from_header(header: &[CellValue]) -> Self {
        let position = |label: &str| {
            header
                .iter()
                .position(|cell| matches!(cell, CellValue::Text(text) if text.trim() == label))
        };

        Self {
            external_id: position(columns::EXTERNAL_ID),
            name: position(columns::NAME),
            address: position(columns::ADDRESS),
            zip_code: position(columns::ZIP_CODE),
            registration_date: position(columns::REGISTRATION_DATE),
            remarks: position(columns::REMARKS),
        }
    }

    fn has(&self, label: &str) -> bool {
        match label {
            columns::NAME => self.name.is_some(),
            columns::ADDRESS => self.address.is_some(),
            columns::ZIP_CODE => self.zip_code.is_some(),
            _ => false,
        }
    }
}

/// 网格 → RawRow（Excel/CSV 共用的结构校验）
///
/// 检查顺序: 无数据 → 行数上限 → 表头缺失 → 表头为空 → 必须列 → 损坏单元格
pub fn rows_from_grid(grid: Grid, max_rows: usize) -> Result<Vec<RawRow>, StructuralError> {
    let Grid { origin, rows } = grid;

    if rows.len() <= 1 {
        return Err(StructuralError::NoData);
    }

    let data_rows = rows.len() - 1;
    if data_rows > max_rows {
        return Err(StructuralError::TooManyRows {
            rows: data_rows,
            limit: max_rows,
        });
    }

    // 工作表首行为空 → 没有表头
    if origin.0 > 0 {
        return Err(StructuralError::HeaderMissing);
    }

    let mut rows = rows.into_iter();
    let header = rows.next().unwrap_or_default();
    let width = header.len();

    if let Some(col) = header.iter().position(|c| matches!(c, CellValue::Invalid)) {
        return Err(StructuralError::BrokenCell {
            row: origin.0 + 1,
            col: origin.1 + col + 1,
        });
    }
    if header.iter().all(CellValue::is_empty) {
        return Err(StructuralError::HeaderEmpty);
    }

    let map = ColumnMap::from_header(&header);
    if let Some(missing) = columns::REQUIRED.iter().find(|label| !map.has(label)) {
        return Err(StructuralError::MissingColumn((*missing).to_string()));
    }

    let mut records = Vec::new();
    for (idx, cells) in rows.enumerate() {
        let row_number = idx + 1;

        // 仅检查表头范围内的单元格
        let in_header = &cells[..cells.len().min(width)];
        if let Some(col) = in_header.iter().position(|c| matches!(c, CellValue::Invalid)) {
            return Err(StructuralError::BrokenCell {
                row: origin.0 + row_number + 1,
                col: origin.1 + col + 1,
            });
        }

        // 跳过完全空白的行（行号照常递增）
        if in_header.iter().all(CellValue::is_empty) {
            continue;
        }

        let field = |col: Option<usize>| col.and_then(|c| cells.get(c)).and_then(CellValue::as_text);
        records.push(RawRow {
            row_number,
            external_id: field(map.external_id),
            name: field(map.name),
            address: field(map.address),
            zip_code: field(map.zip_code),
            registration_date_text: field(map.registration_date),
            remarks: field(map.remarks),
        });
    }

    Ok(records)
}

// ==========================================
// Excel Reader 实现
// ==========================================
pub struct XlsxTabularReader;

impl XlsxTabularReader {
    fn open(bytes: &[u8]) -> Result<Sheets<Cursor<Vec<u8>>>, StructuralError> {
        let cursor = Cursor::new(bytes.to_vec());

        if bytes.starts_with(ZIP_MAGIC) {
            return Xlsx::new(cursor)
                .map(Sheets::Xlsx)
                .map_err(|e| classify_open_error(&e.to_string(), StructuralError::Corrupted));
        }

        if bytes.starts_with(CFB_MAGIC) {
            // 加密的 xlsx 同样是 CFB 容器（含 EncryptedPackage 流）
            if contains_utf16(bytes, "EncryptedPackage") {
                return Err(StructuralError::Encrypted);
            }
            return Xls::new(cursor)
                .map(Sheets::Xls)
                .map_err(|e| classify_open_error(&e.to_string(), StructuralError::Corrupted));
        }

        Err(StructuralError::InvalidFormat)
    }

    fn grid_from_range(range: &Range<Data>) -> Grid {
        let origin = range
            .start()
            .map(|(row, col)| (row as usize, col as usize))
            .unwrap_or((0, 0));

        let rows = range
            .rows()
            .map(|cells| cells.iter().map(cell_value).collect())
            .collect();

        Grid { origin, rows }
    }
}

impl TabularReader for XlsxTabularReader {
    fn read_rows(&self, bytes: &[u8], max_rows: usize) -> Result<Vec<RawRow>, StructuralError> {
        let mut workbook = Self::open(bytes)?;

        // 读取第一个 sheet
        let sheet_names = workbook.sheet_names();
        let sheet_name = sheet_names.first().ok_or(StructuralError::NoSheet)?.clone();

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| classify_open_error(&e.to_string(), StructuralError::Unreadable))?;

        if range.height() > max_rows.saturating_add(1) {
            return Err(StructuralError::TooManyRows {
                rows: range.height() - 1,
                limit: max_rows,
            });
        }

        rows_from_grid(Self::grid_from_range(&range), max_rows)
    }
}

/// 单元格 → CellValue（日期统一为 YYYY-MM-DD）
fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::Error(_) => CellValue::Invalid,
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_date() {
            Some(date) => CellValue::Text(date.format("%Y-%m-%d").to_string()),
            None => CellValue::Invalid,
        },
        Data::String(s) => CellValue::text(s),
        other => CellValue::text(&other.to_string()),
    }
}

fn classify_open_error(message: &str, fallback: StructuralError) -> StructuralError {
    let lower = message.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        StructuralError::Encrypted
    } else if lower.contains("cannot detect") {
        StructuralError::InvalidFormat
    } else {
        fallback
    }
}

fn contains_utf16(haystack: &[u8], needle: &str) -> bool {
    let pattern: Vec<u8> = needle.encode_utf16().flat_map(u16::to_le_bytes).collect();
    haystack.windows(pattern.len()).any(|w| w == pattern.as_slice())
}

// ==========================================
// CSV Reader 实现
// ==========================================
// UTF-8（可带 BOM），第一条记录为表头
// csv 会跳过完全空白的行：按记录起始行号补回空行，保持行号与文件一致
pub struct CsvTabularReader;

/// 记录实际起始的物理行号（1 起算）
///
/// csv 记录的 position 指向被跳过的空行之前，需越过其后的换行
fn record_start_line(body: &[u8], pos: &csv::Position) -> u64 {
    let from = (pos.byte() as usize).min(body.len());
    let breaks = body[from..]
        .iter()
        .take_while(|b| matches!(b, b'\r' | b'\n'))
        .filter(|&&b| b == b'\n')
        .count() as u64;
    pos.line() + breaks
}

impl TabularReader for CsvTabularReader {
    fn read_rows(&self, bytes: &[u8], max_rows: usize) -> Result<Vec<RawRow>, StructuralError> {
        let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(body);

        let mut grid = Grid::default();
        let mut next_line: u64 = 1; // 下一条记录若紧接上一条，应从此行开始
        for result in reader.records() {
            let record = result?;

            let line = record
                .position()
                .map_or(next_line, |pos| record_start_line(body, pos));
            let skipped = line.saturating_sub(next_line) as usize;
            if grid.rows.is_empty() {
                // 表头之前的空行
                grid.origin.0 = skipped;
            } else {
                grid.rows.extend(std::iter::repeat_with(Vec::new).take(skipped));
            }

            // 引号内换行使一条记录跨多行
            let embedded_breaks = record.iter().map(|f| f.matches('\n').count() as u64).sum::<u64>();
            next_line = line + 1 + embedded_breaks;

            grid.rows.push(record.iter().map(CellValue::text).collect());

            if grid.rows.len() > max_rows.saturating_add(1) {
                return Err(StructuralError::TooManyRows {
                    rows: grid.rows.len() - 1,
                    limit: max_rows,
                });
            }
        }

        rows_from_grid(grid, max_rows)
    }
}

/// 按文件名扩展选择读取器
///
/// # 返回
/// - None: 不支持的扩展名
pub fn reader_for_file_name(file_name: &str) -> Option<Box<dyn TabularReader>> {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xlsx" | "xls" => Some(Box::new(XlsxTabularReader)),
        "csv" => Some(Box::new(CsvTabularReader)),
        _ => None,
    }
}
