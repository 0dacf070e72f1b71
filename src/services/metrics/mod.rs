//! 指标计算 - 业务能力层
//!
//! 对评估表中的（外部模型回答, 内部模型回答）逐行打分，
//! 每个指标追加一列分数。
//!
//! - `similarity` - 语义相似度（ASS 值），依赖向量模型
//! - `rouge` - ROUGE-1 / ROUGE-2 / ROUGE-L（F1）
//! - `chinese_f1` - jieba 分词后的集合 F1

pub mod chinese_f1;
#[cfg(feature = "embeddings")]
pub mod embedding;
pub mod rouge;
pub mod similarity;

pub use chinese_f1::chinese_f1;
pub use rouge::{rouge_l, rouge_n, RougeScore};
pub use similarity::{answer_similarity, cosine_similarity, TextEmbedder};

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{AppResult, ScoringError};
use crate::models::{EvaluationTable, Metric};
use crate::utils::logging::log_metric_elapsed;

/// 指标计算器
///
/// 向量模型在第一次计算语义相似度时才加载，之后所有任务共用
pub struct ScoringEngine {
    embedding_model_id: String,
    embedder: OnceCell<Arc<dyn TextEmbedder>>,
}

impl ScoringEngine {
    pub fn new(embedding_model_id: impl Into<String>) -> Self {
        Self {
            embedding_model_id: embedding_model_id.into(),
            embedder: OnceCell::new(),
        }
    }

    /// 使用指定的向量模型
    pub fn with_embedder(embedder: Arc<dyn TextEmbedder>) -> Self {
        Self {
            embedding_model_id: "custom".to_string(),
            embedder: OnceCell::new_with(Some(embedder)),
        }
    }

    async fn embedder(&self) -> AppResult<Arc<dyn TextEmbedder>> {
        let embedder = self
            .embedder
            .get_or_try_init(|| async {
                let model_id = self.embedding_model_id.clone();
                info!("📦 加载向量模型: {}", model_id);
                let loaded: AppResult<Arc<dyn TextEmbedder>> =
                    match tokio::task::spawn_blocking(move || load_embedder(&model_id)).await {
                        Ok(result) => result,
                        Err(e) => Err(ScoringError::WorkerPanicked {
                            reason: e.to_string(),
                        }
                        .into()),
                    };
                loaded
            })
            .await?;
        Ok(Arc::clone(embedder))
    }

    /// 计算一个指标并把分数列追加到表末尾
    pub async fn apply(
        &self,
        metric: Metric,
        table: &mut EvaluationTable,
        task_label: &str,
    ) -> AppResult<()> {
        let pairs = table.response_pairs()?;
        let started = Instant::now();
        info!(
            "{} 📐 开始计算 {}，共 {} 条数据",
            task_label,
            metric.column_name(),
            pairs.len()
        );

        let embedder = match metric {
            Metric::Similarity => Some(self.embedder().await?),
            _ => None,
        };

        let label = task_label.to_string();
        let scores = tokio::task::spawn_blocking(move || score_rows(metric, &pairs, embedder.as_deref(), &label))
            .await
            .map_err(|e| ScoringError::WorkerPanicked {
                reason: e.to_string(),
            })??;

        table.append_scores(metric.column_name(), scores);
        log_metric_elapsed(task_label, metric.column_name(), started.elapsed());
        Ok(())
    }
}

/// 逐行打分（阻塞）
pub fn score_rows(
    metric: Metric,
    pairs: &[(String, String)],
    embedder: Option<&dyn TextEmbedder>,
    task_label: &str,
) -> AppResult<Vec<f64>> {
    let total = pairs.len();
    let mut scores = Vec::with_capacity(total);

    for (index, (reference, generated)) in pairs.iter().enumerate() {
        let score = match metric {
            Metric::Similarity => {
                let embedder = embedder.ok_or_else(|| ScoringError::EmbeddingFailed {
                    reason: "未提供向量模型".to_string(),
                })?;
                answer_similarity(embedder, reference, generated)?
            }
            Metric::Rouge1 | Metric::Rouge2 | Metric::RougeL => {
                let score = match metric {
                    Metric::Rouge1 => rouge_n(reference, generated, 1),
                    Metric::Rouge2 => rouge_n(reference, generated, 2),
                    _ => rouge_l(reference, generated),
                };
                debug!(
                    "{} {} 第 {}/{} 条: precision={:.4} recall={:.4}",
                    task_label,
                    metric.column_name(),
                    index + 1,
                    total,
                    score.precision,
                    score.recall
                );
                score.f1
            }
            Metric::ChineseF1 => chinese_f1(reference, generated),
        };
        debug!(
            "{} {} 第 {}/{} 条得分: {:.4}",
            task_label,
            metric.column_name(),
            index + 1,
            total,
            score
        );
        scores.push(score);
    }

    Ok(scores)
}

#[cfg(feature = "embeddings")]
fn load_embedder(model_id: &str) -> AppResult<Arc<dyn TextEmbedder>> {
    Ok(Arc::new(embedding::BertEmbedder::load(model_id)?))
}

#[cfg(not(feature = "embeddings"))]
fn load_embedder(model_id: &str) -> AppResult<Arc<dyn TextEmbedder>> {
    Err(ScoringError::EmbedderUnavailable {
        model_id: model_id.to_string(),
        reason: "编译时未启用 embeddings 特性".to_string(),
    }
    .into())
}
