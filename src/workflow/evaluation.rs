//! 评估流程 - 流程层
//!
//! 定义"一次评估"的完整流程：
//! 1. 读取题目列
//! 2. 双模型并发回答
//! 3. 写出中间结果
//! 4. 按固定顺序计算指标，每算完一个就重新写出一次

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::{AppResult, InputError};
use crate::infrastructure::files::{ensure_dir, unique_file_name};
use crate::infrastructure::workbook::{read_sheet, write_sheet, SheetFormat};
use crate::models::{Metric, ModelConfig, QuestionSet};
use crate::services::ScoringEngine;
use crate::workflow::dual_model::run_dual;
use crate::workflow::task_ctx::TaskCtx;

/// 一次评估所需的全部参数
#[derive(Debug, Clone)]
pub struct EvaluationJob {
    /// 只含题目列的表格（列提取的输出）
    pub questions_path: PathBuf,
    /// 结果输出目录
    pub output_dir: PathBuf,
    /// 系统提示词，空白时不发送
    pub prompt: Option<String>,
    pub external: ModelConfig,
    pub internal: ModelConfig,
    pub metrics: Vec<Metric>,
}

/// 读取题目：第一列、去掉空白单元格
pub fn load_questions(path: &Path) -> AppResult<QuestionSet> {
    let sheet = read_sheet(path)?;
    let questions = if sheet.column_count() == 0 {
        QuestionSet::default()
    } else {
        QuestionSet::from_cells(&sheet.column(0))
    };
    if questions.is_empty() {
        return Err(InputError::EmptyInput {
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(questions)
}

/// 评估流程
///
/// 不持有任务状态，只返回结果文件路径或错误
pub struct EvaluationFlow {
    scoring: Arc<ScoringEngine>,
    request_timeout: Duration,
}

impl EvaluationFlow {
    pub fn new(scoring: Arc<ScoringEngine>, request_timeout: Duration) -> Self {
        Self {
            scoring,
            request_timeout,
        }
    }

    pub async fn process_and_evaluate(&self, job: &EvaluationJob, ctx: &TaskCtx) -> AppResult<PathBuf> {
        let questions = load_questions(&job.questions_path)?;
        info!("{} 📋 读取到 {} 道题目", ctx, questions.len());

        let mut table = run_dual(
            &questions,
            job.external.clone(),
            job.internal.clone(),
            job.prompt.as_deref(),
            self.request_timeout,
            ctx,
        )
        .await?;

        let extension = SheetFormat::from_path(&job.questions_path)?.output_extension();
        ensure_dir(&job.output_dir)?;
        let output_path = job
            .output_dir
            .join(unique_file_name("evaluation", extension));
        write_sheet(table.sheet(), &output_path)?;
        info!("{} 💾 模型回答已写入 {}", ctx, output_path.display());

        let mut metrics = job.metrics.clone();
        metrics.sort();
        metrics.dedup();

        let label = ctx.to_string();
        for metric in metrics {
            self.scoring.apply(metric, &mut table, &label).await?;
            write_sheet(table.sheet(), &output_path)?;
        }

        info!("{} ✅ 评估完成: {}", ctx, output_path.display());
        Ok(output_path)
    }
}
