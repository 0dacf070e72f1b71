//! 连通性检测
//!
//! 提交评估前先发一条最小的非流式请求，区分超时、错误状态码和网络错误

use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::error::{AppResult, ModelError};
use crate::models::ModelConfig;
use crate::utils::logging::truncate_text;

/// 检测结果
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// 接口可用
    Reachable { status: u16, elapsed: Duration },
    /// 请求超时
    Timeout,
    /// 接口返回非成功状态码
    HttpStatus { status: u16, body: String },
    /// 连接失败等网络错误
    Transport(String),
}

impl ProbeOutcome {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeOutcome::Reachable { .. })
    }
}

/// 向模型发送 "hello"，只看能否拿到成功响应
///
/// 构建请求失败时返回错误，其余情况都归入 [`ProbeOutcome`]
pub async fn probe_model(config: &ModelConfig, timeout: Duration) -> AppResult<ProbeOutcome> {
    let model = config.model_name();
    let invalid = |e: async_openai::error::OpenAIError| ModelError::InvalidRequest {
        model: model.to_string(),
        reason: e.to_string(),
    };

    let user_msg = ChatCompletionRequestUserMessageArgs::default()
        .content("hello")
        .build()
        .map_err(invalid)?;
    let request = CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages(vec![ChatCompletionRequestMessage::User(user_msg)])
        .build()
        .map_err(invalid)?;

    let http = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ModelError::from_reqwest(model, e))?;

    let start = Instant::now();
    let result = http
        .post(config.chat_completions_url())
        .bearer_auth(config.api_key())
        .json(&request)
        .send()
        .await;

    let outcome = match result {
        Ok(response) => {
            let status = response.status();
            if status.is_success() {
                ProbeOutcome::Reachable {
                    status: status.as_u16(),
                    elapsed: start.elapsed(),
                }
            } else {
                let body = response.text().await.unwrap_or_default();
                ProbeOutcome::HttpStatus {
                    status: status.as_u16(),
                    body: truncate_text(&body, 200),
                }
            }
        }
        Err(e) if e.is_timeout() => ProbeOutcome::Timeout,
        Err(e) => ProbeOutcome::Transport(e.to_string()),
    };

    if outcome.is_reachable() {
        info!("[{}] ✅ 连通性检测通过: {:?}", model, outcome);
    } else {
        warn!("[{}] ⚠️ 连通性检测失败: {:?}", model, outcome);
    }
    Ok(outcome)
}
