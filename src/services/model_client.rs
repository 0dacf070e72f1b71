//! 流式模型调用 - 业务能力层
//!
//! 只负责"把一批题目发给一个模型并收集回答"，不关心另一个模型和指标
//!
//! ## 技术栈
//! - 请求体使用 `async-openai` 的类型构建
//! - 通过 `reqwest` 读取 SSE 流，同时收集正文和推理内容（reasoning_content）
//! - 兼容 OpenAI API 的服务

use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs,
};
use futures::StreamExt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{AppResult, ModelError};
use crate::infrastructure::sse::{parse_chat_event, ChatStreamEvent, SseDecoder, StreamDelta};
use crate::models::{ModelConfig, QuestionSet, ResponseRecord};
use crate::utils::logging::truncate_text;

/// 单个模型的流式客户端
///
/// 每个客户端持有自己的 HTTP 连接池，两个模型并发时互不共享
pub struct ModelClient {
    http: reqwest::Client,
    config: ModelConfig,
}

impl ModelClient {
    /// 创建客户端
    ///
    /// `timeout` 作用于单个题目的整个请求（包括读完流）
    pub fn new(config: ModelConfig, timeout: Duration) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::from_reqwest(config.model_name(), e))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// 按顺序逐题提问
    ///
    /// 任意一题失败即中止整批，调用方只能整体重试
    pub async fn query_all(
        &self,
        questions: &QuestionSet,
        system_prompt: Option<&str>,
    ) -> AppResult<Vec<ResponseRecord>> {
        let total = questions.len();
        let mut records = Vec::with_capacity(total);

        for (index, question) in questions.iter().enumerate() {
            info!(
                "[{}] 💬 第 {}/{} 题: {}",
                self.config.model_name(),
                index + 1,
                total,
                truncate_text(question, 30)
            );
            let record = self.query_one(question, system_prompt).await.map_err(|e| {
                warn!(
                    "[{}] ❌ 第 {}/{} 题调用失败: {}",
                    self.config.model_name(),
                    index + 1,
                    total,
                    e
                );
                e
            })?;
            records.push(record);
        }

        Ok(records)
    }

    /// 单个题目的流式请求
    pub async fn query_one(
        &self,
        question: &str,
        system_prompt: Option<&str>,
    ) -> AppResult<ResponseRecord> {
        let model = self.config.model_name();
        let request = self.build_request(question, system_prompt)?;

        let start = Instant::now();
        let response = self
            .http
            .post(self.config.chat_completions_url())
            .bearer_auth(self.config.api_key())
            .header("Accept", "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::from_reqwest(model, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::BadStatus {
                model: model.to_string(),
                status: status.as_u16(),
                body: truncate_text(&body, 200),
            }
            .into());
        }

        let mut record = ResponseRecord::new(question);
        let mut decoder = SseDecoder::new();
        let mut stream = response.bytes_stream();
        let mut done = false;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ModelError::from_reqwest(model, e))?;
            decoder.push_bytes(&chunk);
            while let Some(event) = decoder.next_event() {
                if self.handle_event(&event, &mut record, start)? {
                    done = true;
                }
            }
            if done {
                break;
            }
        }
        if !done {
            if let Some(event) = decoder.finish() {
                self.handle_event(&event, &mut record, start)?;
            }
        }

        debug!(
            "[{}] ✓ 回答完成，{} 字符，首 token: {:?}",
            model,
            record.response.chars().count(),
            record.first_token_latency
        );

        Ok(record)
    }

    /// 处理一个事件，返回是否已收到结束标记
    fn handle_event(
        &self,
        event: &str,
        record: &mut ResponseRecord,
        start: Instant,
    ) -> AppResult<bool> {
        let parsed = parse_chat_event(event).map_err(|reason| ModelError::MalformedStream {
            model: self.config.model_name().to_string(),
            reason,
        })?;

        match parsed {
            ChatStreamEvent::Done => Ok(true),
            ChatStreamEvent::Ignored => Ok(false),
            ChatStreamEvent::Delta(delta) => {
                self.apply_delta(delta, record, start);
                Ok(false)
            }
        }
    }

    fn apply_delta(&self, delta: StreamDelta, record: &mut ResponseRecord, start: Instant) {
        if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
            // 只有正文通道触发首 token 计时
            if self.config.capture_first_token() && record.first_token_latency.is_none() {
                record.first_token_latency = Some(start.elapsed().as_secs_f64());
            }
            record.push_content(&content);
        }
        if let Some(reasoning) = delta.reasoning.filter(|r| !r.is_empty()) {
            record.push_reasoning(&reasoning);
        }
    }

    /// 构建流式请求体：可选的 system 消息 + 用户题目
    fn build_request(
        &self,
        question: &str,
        system_prompt: Option<&str>,
    ) -> AppResult<CreateChatCompletionRequest> {
        let model = self.config.model_name();
        let invalid = |e: async_openai::error::OpenAIError| ModelError::InvalidRequest {
            model: model.to_string(),
            reason: e.to_string(),
        };

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_prompt.filter(|p| !p.trim().is_empty()) {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(invalid)?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(question)
            .build()
            .map_err(invalid)?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .stream(true)
            .build()
            .map_err(invalid)?;

        Ok(request)
    }
}

/// 用一个模型回答整批题目，结果与题目顺序一致
pub async fn query_model(
    questions: &QuestionSet,
    config: ModelConfig,
    system_prompt: Option<&str>,
    timeout: Duration,
) -> AppResult<Vec<ResponseRecord>> {
    ModelClient::new(config, timeout)?
        .query_all(questions, system_prompt)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelRole;
    use mockito::Matcher;

    fn sse_body(chunks: &[&str]) -> String {
        let mut body = String::new();
        for chunk in chunks {
            body.push_str("data: ");
            body.push_str(chunk);
            body.push_str("\n\n");
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    fn config(base_url: &str, capture: bool) -> ModelConfig {
        ModelConfig::new(ModelRole::External, "test-key", base_url, "test-model", capture).unwrap()
    }

    #[test]
    fn test_build_request_with_system_prompt() {
        let client = ModelClient::new(config("http://localhost/v1", false), Duration::from_secs(5)).unwrap();
        let request = client.build_request("1+1=?", Some("简洁回答")).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "test-model");
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "简洁回答");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "1+1=?");
    }

    #[test]
    fn test_build_request_skips_blank_system_prompt() {
        let client = ModelClient::new(config("http://localhost/v1", false), Duration::from_secs(5)).unwrap();
        let request = client.build_request("q", Some("  ")).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stream_collects_reasoning_and_content() {
        let mut server = mockito::Server::new_async().await;
        let body = sse_body(&[
            r#"{"choices":[{"delta":{"reasoning_content":"先想想。"}}]}"#,
            r#"{"choices":[]}"#,
            r#"{"choices":[{"delta":{"content":"答案"}}]}"#,
            r#"{"choices":[{"delta":{"content":"是4"}}]}"#,
        ]);
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::Regex("\"stream\":true".to_string()))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let base = format!("{}/v1", server.url());
        let client = ModelClient::new(config(&base, true), Duration::from_secs(5)).unwrap();
        let record = client.query_one("2+2=?", None).await.unwrap();

        mock.assert_async().await;
        assert_eq!(record.question, "2+2=?");
        assert_eq!(record.response, "先想想。答案是4");
        assert_eq!(record.reasoning, "先想想。");
        assert_eq!(record.content, "答案是4");
        assert!(record.first_token_latency.is_some());
    }

    #[tokio::test]
    async fn test_first_token_not_captured_when_disabled() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(sse_body(&[r#"{"choices":[{"delta":{"content":"ok"}}]}"#]))
            .create_async()
            .await;

        let base = format!("{}/v1", server.url());
        let client = ModelClient::new(config(&base, false), Duration::from_secs(5)).unwrap();
        let record = client.query_one("q", None).await.unwrap();
        assert_eq!(record.response, "ok");
        assert_eq!(record.first_token_latency, None);
    }

    #[tokio::test]
    async fn test_reasoning_only_stream_has_no_first_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(sse_body(&[r#"{"choices":[{"delta":{"reasoning_content":"r"}}]}"#]))
            .create_async()
            .await;

        let base = format!("{}/v1", server.url());
        let client = ModelClient::new(config(&base, true), Duration::from_secs(5)).unwrap();
        let record = client.query_one("q", None).await.unwrap();
        assert_eq!(record.response, "r");
        assert_eq!(record.first_token_latency, None);
    }

    #[tokio::test]
    async fn test_bad_status_aborts_whole_batch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"invalid key"}}"#)
            .create_async()
            .await;

        let base = format!("{}/v1", server.url());
        let questions = QuestionSet::new(["q1", "q2"]);
        let err = query_model(&questions, config(&base, false), None, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.stage_label(), "model");
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_malformed_chunk_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body("data: {broken\n\n")
            .create_async()
            .await;

        let base = format!("{}/v1", server.url());
        let client = ModelClient::new(config(&base, false), Duration::from_secs(5)).unwrap();
        let err = client.query_one("q", None).await.unwrap_err();
        assert!(err.to_string().contains("流式响应解析失败"));
    }

    #[tokio::test]
    async fn test_stream_without_done_marker() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body("data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}")
            .create_async()
            .await;

        let base = format!("{}/v1", server.url());
        let client = ModelClient::new(config(&base, false), Duration::from_secs(5)).unwrap();
        let record = client.query_one("q", None).await.unwrap();
        assert_eq!(record.response, "tail");
    }
}
