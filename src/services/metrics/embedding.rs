//! 本地 BERT 向量模型（candle + sentence-transformers）

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use hf_hub::{api::sync::Api, Repo, RepoType};
use tokenizers::{Tokenizer, TruncationParams};

use super::similarity::TextEmbedder;
use crate::error::{AppResult, ScoringError};

/// 平均池化 + L2 归一化的句向量模型
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
}

/// config.json 缺少该字段时的位置编码长度
const DEFAULT_MAX_POSITION_EMBEDDINGS: usize = 512;

fn unavailable(model_id: &str, reason: impl ToString) -> ScoringError {
    ScoringError::EmbedderUnavailable {
        model_id: model_id.to_string(),
        reason: reason.to_string(),
    }
}

fn embedding_failed(reason: impl ToString) -> ScoringError {
    ScoringError::EmbeddingFailed {
        reason: reason.to_string(),
    }
}

impl BertEmbedder {
    /// 从 Hugging Face Hub 下载并加载模型
    pub fn load(model_id: &str) -> AppResult<Self> {
        let device = Device::Cpu;

        let api = Api::new().map_err(|e| unavailable(model_id, e))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo.get("config.json").map_err(|e| unavailable(model_id, e))?;
        let tokenizer_path = repo.get("tokenizer.json").map_err(|e| unavailable(model_id, e))?;
        // 只支持 safetensors 权重
        let weights_path = repo
            .get("model.safetensors")
            .map_err(|e| unavailable(model_id, e))?;

        let config_text =
            std::fs::read_to_string(&config_path).map_err(|e| unavailable(model_id, e))?;
        let config: BertConfig =
            serde_json::from_str(&config_text).map_err(|e| unavailable(model_id, e))?;

        let max_len = serde_json::from_str::<serde_json::Value>(&config_text)
            .ok()
            .and_then(|v| v.get("max_position_embeddings")?.as_u64())
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_POSITION_EMBEDDINGS);

        // 超出位置编码长度的部分截断，保留首尾特殊 token
        let mut tokenizer =
            Tokenizer::from_file(&tokenizer_path).map_err(|e| unavailable(model_id, e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_len,
                ..Default::default()
            }))
            .map_err(|e| unavailable(model_id, e))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)
                .map_err(|e| unavailable(model_id, e))?
        };
        let model = BertModel::load(vb, &config).map_err(|e| unavailable(model_id, e))?;

        tracing::info!("向量模型加载完成: {}", model_id);

        Ok(Self {
            model,
            tokenizer,
            device,
            max_len,
        })
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>, candle_core::Error> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| candle_core::Error::Msg(e.to_string()))?;

        let (ids, mask) = clip_sequence(encoding.get_ids(), encoding.get_attention_mask(), self.max_len);
        let len = ids.len();
        let types = vec![0u32; len];

        let input_ids = Tensor::from_vec(ids, (1, len), &self.device)?;
        let attention_mask = Tensor::from_vec(mask, (1, len), &self.device)?;
        let token_type_ids = Tensor::from_vec(types, (1, len), &self.device)?;

        let output = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        // 按注意力掩码做平均池化
        let mask_expanded = attention_mask
            .unsqueeze(2)?
            .to_dtype(output.dtype())?
            .broadcast_as(output.shape())?;
        let summed = (output * &mask_expanded)?.sum(1)?;
        let counts = mask_expanded.sum(1)?.clamp(1e-9, f64::MAX)?;
        let mean = (summed / counts)?;

        let norms = mean.sqr()?.sum_keepdim(1)?.sqrt()?;
        let shape = mean.shape().clone();
        let normalized = (mean / norms.broadcast_as(&shape)?)?;

        Ok(normalized.squeeze(0)?.to_vec1::<f32>()?)
    }
}

/// 把 token 序列截到模型能处理的长度
fn clip_sequence(ids: &[u32], mask: &[u32], max_len: usize) -> (Vec<u32>, Vec<u32>) {
    let len = ids.len().min(mask.len()).min(max_len);
    (ids[..len].to_vec(), mask[..len].to_vec())
}

impl TextEmbedder for BertEmbedder {
    fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        Ok(self.encode(text).map_err(embedding_failed)?)
    }
}
