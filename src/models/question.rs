//! 题目集合

use crate::models::sheet::Cell;

/// 有序的题目集合
///
/// 第 i 条题目对应下游每张表的第 i 行
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionSet {
    questions: Vec<String>,
}

impl QuestionSet {
    /// 由字符串创建，空白题目会被丢弃
    pub fn new<I, S>(questions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            questions: questions
                .into_iter()
                .map(Into::<String>::into)
                .filter(|q| !q.trim().is_empty())
                .collect(),
        }
    }

    /// 由一列单元格创建，数字等非文本单元格转换为文本
    pub fn from_cells(cells: &[Cell]) -> Self {
        Self::new(
            cells
                .iter()
                .filter(|c| !c.is_blank())
                .map(Cell::to_text),
        )
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.questions.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.questions
    }
}

impl<'a> IntoIterator for &'a QuestionSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.questions.iter()
    }
}
