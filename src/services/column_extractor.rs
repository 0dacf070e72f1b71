//! 列提取 - 业务能力层
//!
//! 从上传的表格中取出一列，另存为只有这一列的新表格

use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{AppResult, InputError};
use crate::infrastructure::files::{ensure_dir, unique_file_name};
use crate::infrastructure::workbook::{read_sheet, write_sheet, SheetFormat};

/// 把列字母解析为从 0 开始的列号
pub fn column_index(selector: &str) -> AppResult<(char, usize)> {
    let mut chars = selector.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => {
            let letter = c.to_ascii_uppercase();
            Ok((letter, (letter as u8 - b'A') as usize))
        }
        _ => Err(InputError::InvalidColumn {
            selector: selector.to_string(),
        }
        .into()),
    }
}

/// 提取指定列
///
/// 表头和空单元格都保留，行顺序不变。输出文件名形如
/// `extracted_A_20240101_120000_1a2b3c4d.xlsx`，原文件为 csv 时输出 csv。
/// 列号超出范围时不写任何文件。
pub fn extract_column(input_path: &Path, selector: &str, output_dir: &Path) -> AppResult<PathBuf> {
    let (letter, index) = column_index(selector)?;
    let format = SheetFormat::from_path(input_path)?;
    let sheet = read_sheet(input_path)?;

    if index >= sheet.column_count() {
        return Err(InputError::ColumnOutOfRange {
            column: letter,
            column_count: sheet.column_count(),
        }
        .into());
    }

    ensure_dir(output_dir)?;
    let file_name = unique_file_name(&format!("extracted_{}", letter), format.output_extension());
    let output_path = output_dir.join(file_name);
    write_sheet(&sheet.select_column(index), &output_path)?;

    info!(
        "📄 已提取第 {} 列（共 {} 行）到 {}",
        letter,
        sheet.row_count(),
        output_path.display()
    );
    Ok(output_path)
}
