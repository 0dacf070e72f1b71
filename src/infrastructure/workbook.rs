//! 表格文件读写
//!
//! 支持 csv 与 Excel（xlsx / xls / xlsm / ods 读取，xlsx 写入）

use calamine::{open_workbook_auto, Data, Reader};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{AppResult, InputError, PersistenceError};
use crate::models::sheet::{Cell, Sheet};

/// xlsx 单元格允许的最大字符数
const XLSX_MAX_CELL_CHARS: usize = 32_767;

/// 表格文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Csv,
    Workbook,
}

impl SheetFormat {
    /// 按扩展名判断格式
    pub fn from_path(path: &Path) -> AppResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(SheetFormat::Csv),
            Some("xlsx") | Some("xls") | Some("xlsm") | Some("xlsb") | Some("ods") => {
                Ok(SheetFormat::Workbook)
            }
            _ => Err(InputError::UnsupportedFormat {
                path: path.to_path_buf(),
            }
            .into()),
        }
    }

    /// 写出文件时使用的扩展名
    pub fn output_extension(&self) -> &'static str {
        match self {
            SheetFormat::Csv => "csv",
            SheetFormat::Workbook => "xlsx",
        }
    }
}

/// 读取第一个工作表，第一行作为表头
pub fn read_sheet(path: &Path) -> AppResult<Sheet> {
    if !path.exists() {
        return Err(InputError::FileNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    let sheet = match SheetFormat::from_path(path)? {
        SheetFormat::Csv => read_csv(path)?,
        SheetFormat::Workbook => read_workbook(path)?,
    };
    debug!(
        "读取表格 {}: {} 列, {} 行",
        path.display(),
        sheet.column_count(),
        sheet.row_count()
    );
    Ok(sheet)
}

/// 写出表格
///
/// 先写临时文件再重命名，失败时不会留下写了一半的目标文件
pub fn write_sheet(sheet: &Sheet, path: &Path) -> AppResult<()> {
    let format = SheetFormat::from_path(path)?;
    let partial = partial_path(path);

    let result = match format {
        SheetFormat::Csv => write_csv(sheet, &partial),
        SheetFormat::Workbook => write_xlsx(sheet, &partial),
    };
    if let Err(e) = result {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }

    fs::rename(&partial, path).map_err(|e| PersistenceError::write(path, e))?;
    debug!("表格已保存: {}", path.display());
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.partial", file_name))
}

fn read_csv(path: &Path) -> AppResult<Sheet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| PersistenceError::read(path, e))?;

    let mut headers: Vec<String> = reader
        .headers()
        .map_err(|e| PersistenceError::read(path, e))?
        .iter()
        .map(String::from)
        .collect();
    // Excel 导出的 csv 带 BOM
    if let Some(first) = headers.first_mut() {
        if let Some(stripped) = first.strip_prefix('\u{feff}') {
            *first = stripped.to_string();
        }
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| PersistenceError::read(path, e))?;
        rows.push(record.iter().map(Cell::from).collect());
    }

    Ok(Sheet { headers, rows })
}

fn read_workbook(path: &Path) -> AppResult<Sheet> {
    let mut workbook = open_workbook_auto(path).map_err(|e| PersistenceError::read(path, e))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| PersistenceError::read(path, e))?,
        None => return Ok(Sheet::default()),
    };

    // Range 从第一个非空单元格开始，左侧的空列需要补回来
    let column_offset = range.start().map(|(_, col)| col as usize).unwrap_or(0);

    let mut rows = range.rows().map(|row| {
        let mut cells = vec![Cell::Empty; column_offset];
        cells.extend(row.iter().map(convert_cell));
        cells
    });

    let headers = rows
        .next()
        .map(|cells| cells.iter().map(Cell::to_text).collect())
        .unwrap_or_default();
    let rows: Vec<Vec<Cell>> = rows.collect();

    Ok(Sheet { headers, rows })
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::from(s.as_str()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        other => Cell::Text(other.to_string()),
    }
}

fn write_csv(sheet: &Sheet, path: &Path) -> AppResult<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| PersistenceError::write(path, e))?;

    writer
        .write_record(&sheet.headers)
        .map_err(|e| PersistenceError::write(path, e))?;
    for row in &sheet.rows {
        writer
            .write_record(row.iter().map(Cell::to_text))
            .map_err(|e| PersistenceError::write(path, e))?;
    }
    writer.flush().map_err(|e| PersistenceError::write(path, e))?;
    Ok(())
}

fn write_xlsx(sheet: &Sheet, path: &Path) -> AppResult<()> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, header) in sheet.headers.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, clip_cell_text(header))
            .map_err(|e| PersistenceError::write(path, e))?;
    }

    for (row_index, row) in sheet.rows.iter().enumerate() {
        let row_num = (row_index + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Empty => {}
                Cell::Text(text) => {
                    worksheet
                        .write_string(row_num, col, clip_cell_text(text))
                        .map_err(|e| PersistenceError::write(path, e))?;
                }
                Cell::Number(n) => {
                    worksheet
                        .write_number(row_num, col, *n)
                        .map_err(|e| PersistenceError::write(path, e))?;
                }
            }
        }
    }

    workbook
        .save(path)
        .map_err(|e| PersistenceError::write(path, e))?;
    Ok(())
}

/// 超长文本按 xlsx 上限截断
fn clip_cell_text(text: &str) -> String {
    if text.chars().count() > XLSX_MAX_CELL_CHARS {
        text.chars().take(XLSX_MAX_CELL_CHARS).collect()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_sheet() -> Sheet {
        Sheet {
            headers: vec!["Q".into(), "Score".into()],
            rows: vec![
                vec!["Translate hello".into(), Cell::Number(0.5)],
                vec![Cell::Empty, Cell::Number(1.0)],
                vec!["2+2=?".into(), Cell::Empty],
            ],
        }
    }

    #[test]
    fn test_csv_round_trip_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.csv");
        write_sheet(&sample_sheet(), &path).unwrap();

        let sheet = read_sheet(&path).unwrap();
        assert_eq!(sheet.headers, vec!["Q", "Score"]);
        assert_eq!(sheet.row_count(), 3);
        assert_eq!(sheet.rows[0][0], Cell::from("Translate hello"));
        assert_eq!(sheet.rows[0][1].as_number(), Some(0.5));
        assert!(sheet.rows[1][0].is_blank());
    }

    #[test]
    fn test_xlsx_round_trip_keeps_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.xlsx");
        write_sheet(&sample_sheet(), &path).unwrap();
        assert!(!partial_path(&path).exists());

        let sheet = read_sheet(&path).unwrap();
        assert_eq!(sheet.headers, vec!["Q", "Score"]);
        assert_eq!(sheet.rows[0][1], Cell::Number(0.5));
        assert_eq!(sheet.rows[2][0], Cell::from("2+2=?"));
    }

    #[test]
    fn test_csv_strips_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bom.csv");
        fs::write(&path, "\u{feff}问题\n你好\n").unwrap();
        let sheet = read_sheet(&path).unwrap();
        assert_eq!(sheet.headers, vec!["问题"]);
    }

    #[test]
    fn test_unsupported_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "x").unwrap();
        assert!(read_sheet(&path).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = read_sheet(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert_eq!(err.stage_label(), "input");
    }
}
