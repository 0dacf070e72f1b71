//! 内存中的表格
//!
//! 第一行是表头，其余为数据行。只负责数据，不关心文件格式。

use std::fmt;

/// 单元格
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// 是否为空（空字符串和纯空白也算空）
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(n) => n.is_nan(),
        }
    }

    /// 转成文本，空单元格返回空字符串
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse().ok(),
            Cell::Empty => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            // 整数值不带小数点，和表格软件的显示一致
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Cell::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

/// 表格
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// 列数（按表头和最长的数据行取较大值）
    pub fn column_count(&self) -> usize {
        let widest_row = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        self.headers.len().max(widest_row)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 按位置取一整列，缺失的单元格视为空
    pub fn column(&self, index: usize) -> Vec<Cell> {
        self.rows
            .iter()
            .map(|row| row.get(index).cloned().unwrap_or(Cell::Empty))
            .collect()
    }

    /// 只保留一列，行顺序不变（空行也保留）
    pub fn select_column(&self, index: usize) -> Sheet {
        let header = self.headers.get(index).cloned().unwrap_or_default();
        Sheet {
            headers: vec![header],
            rows: self.column(index).into_iter().map(|c| vec![c]).collect(),
        }
    }

    /// 在末尾追加一列
    ///
    /// 数据行不足时补空行，保证每一行的列数一致
    pub fn push_column(&mut self, header: impl Into<String>, cells: Vec<Cell>) {
        let width = self.column_count();
        while self.rows.len() < cells.len() {
            self.rows.push(Vec::new());
        }
        for (row_index, row) in self.rows.iter_mut().enumerate() {
            row.resize(width, Cell::Empty);
            row.push(cells.get(row_index).cloned().unwrap_or(Cell::Empty));
        }
        self.headers.resize(width, String::new());
        self.headers.push(header.into());
    }

    /// 按表头查找列位置
    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }
}
