//! 评估结果表
//!
//! 固定列顺序：题目、外部模型回答、内部模型回答、（可选）首 token 耗时，之后是指标列。
//! 指标只按位置读取第 1、2 列，不按列名。

use crate::error::{AppResult, ModelError, ScoringError};
use crate::models::model_config::ModelRole;
use crate::models::question::QuestionSet;
use crate::models::response::ResponseRecord;
use crate::models::sheet::{Cell, Sheet};

pub const QUESTIONS_COLUMN: &str = "Questions";
/// 外部模型回答所在列（参考答案）
pub const EXTERNAL_RESPONSE_INDEX: usize = 1;
/// 内部模型回答所在列（被评估答案）
pub const INTERNAL_RESPONSE_INDEX: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationTable {
    sheet: Sheet,
}

impl EvaluationTable {
    /// 按行位置合并两组回答
    ///
    /// 任意一组回答条数与题目数不一致时直接报错，不生成残缺的表
    pub fn from_responses(
        questions: &QuestionSet,
        external: &[ResponseRecord],
        internal: &[ResponseRecord],
        external_first_token: bool,
        internal_first_token: bool,
    ) -> AppResult<Self> {
        for (role, records) in [(ModelRole::External, external), (ModelRole::Internal, internal)] {
            if records.len() != questions.len() {
                return Err(ModelError::RowCountMismatch {
                    model_label: role.to_string(),
                    expected: questions.len(),
                    actual: records.len(),
                }
                .into());
            }
        }

        let mut headers = vec![
            QUESTIONS_COLUMN.to_string(),
            ModelRole::External.response_column().to_string(),
            ModelRole::Internal.response_column().to_string(),
        ];
        if external_first_token {
            headers.push(ModelRole::External.first_token_column().to_string());
        }
        if internal_first_token {
            headers.push(ModelRole::Internal.first_token_column().to_string());
        }

        let mut sheet = Sheet::new(headers);
        for ((question, ext), int) in questions.iter().zip(external).zip(internal) {
            let mut row = vec![
                Cell::from(question.as_str()),
                Cell::from(ext.response.as_str()),
                Cell::from(int.response.as_str()),
            ];
            if external_first_token {
                row.push(ext.first_token_latency.map(Cell::Number).unwrap_or(Cell::Empty));
            }
            if internal_first_token {
                row.push(int.first_token_latency.map(Cell::Number).unwrap_or(Cell::Empty));
            }
            sheet.rows.push(row);
        }

        Ok(Self { sheet })
    }

    /// 从已有表格恢复（例如读取中间文件）
    pub fn from_sheet(sheet: Sheet) -> Self {
        Self { sheet }
    }

    pub fn sheet(&self) -> &Sheet {
        &self.sheet
    }

    pub fn into_sheet(self) -> Sheet {
        self.sheet
    }

    pub fn row_count(&self) -> usize {
        self.sheet.row_count()
    }

    /// 按位置读取（参考答案, 被评估答案）对，空单元格视为空字符串
    pub fn response_pairs(&self) -> AppResult<Vec<(String, String)>> {
        let column_count = self.sheet.column_count();
        if column_count <= INTERNAL_RESPONSE_INDEX {
            return Err(ScoringError::MissingResponseColumns { column_count }.into());
        }
        let references = self.sheet.column(EXTERNAL_RESPONSE_INDEX);
        let candidates = self.sheet.column(INTERNAL_RESPONSE_INDEX);
        Ok(references
            .iter()
            .zip(candidates.iter())
            .map(|(r, c)| (r.to_text(), c.to_text()))
            .collect())
    }

    /// 追加一列分数，行数必须与表一致
    pub fn append_scores(&mut self, column_name: &str, scores: Vec<f64>) {
        debug_assert_eq!(scores.len(), self.row_count());
        self.sheet
            .push_column(column_name, scores.into_iter().map(Cell::Number).collect());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(question: &str, response: &str, latency: Option<f64>) -> ResponseRecord {
        ResponseRecord {
            question: question.to_string(),
            response: response.to_string(),
            content: response.to_string(),
            first_token_latency: latency,
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_by_position() {
        let questions = QuestionSet::new(["q1", "q2"]);
        let external = vec![record("q1", "e1", Some(0.5)), record("q2", "e2", Some(0.7))];
        let internal = vec![record("q1", "i1", None), record("q2", "i2", None)];

        let table = EvaluationTable::from_responses(&questions, &external, &internal, true, false).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(
            table.sheet().headers,
            vec![
                "Questions",
                "External_Model_Response",
                "Internal_Model_Response",
                "External_Model_First_Token"
            ]
        );
        assert_eq!(
            table.response_pairs().unwrap(),
            vec![
                ("e1".to_string(), "i1".to_string()),
                ("e2".to_string(), "i2".to_string())
            ]
        );
        assert_eq!(table.sheet().rows[1][3], Cell::Number(0.7));
    }

    #[test]
    fn test_length_mismatch_is_fatal() {
        let questions = QuestionSet::new(["q1", "q2"]);
        let external = vec![record("q1", "e1", None)];
        let internal = vec![record("q1", "i1", None), record("q2", "i2", None)];
        let err = EvaluationTable::from_responses(&questions, &external, &internal, false, false)
            .unwrap_err();
        assert!(err.to_string().contains("外部模型"));
    }

    #[test]
    fn test_pairs_require_response_columns() {
        let table = EvaluationTable::from_sheet(Sheet::new(vec!["Questions".into()]));
        assert!(table.response_pairs().is_err());
    }
}
