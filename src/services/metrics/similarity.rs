//! 语义相似度（ASS 值）

use crate::error::AppResult;

/// 文本向量化能力
///
/// 默认实现为本地 BERT 向量模型（`embeddings` 特性），测试中可以注入桩实现
pub trait TextEmbedder: Send + Sync {
    fn embed(&self, text: &str) -> AppResult<Vec<f32>>;
}

/// 余弦相似度，维度不一致或零向量返回 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
    }
}

/// 计算一对回答的相似度
///
/// 两段都为空视为完全一致，只有一段为空视为完全不同，此时不调用向量模型
pub fn answer_similarity(embedder: &dyn TextEmbedder, reference: &str, generated: &str) -> AppResult<f64> {
    match (reference.trim().is_empty(), generated.trim().is_empty()) {
        (true, true) => return Ok(1.0),
        (true, false) | (false, true) => return Ok(0.0),
        (false, false) => {}
    }

    let reference_vec = embedder.embed(reference)?;
    let generated_vec = embedder.embed(generated)?;
    Ok(cosine_similarity(&reference_vec, &generated_vec))
}
