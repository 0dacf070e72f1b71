//! 双模型调用 - 流程层
//!
//! 外部模型和内部模型并发回答同一批题目，按行位置合并成评估表

use std::time::Duration;
use tracing::info;

use crate::error::AppResult;
use crate::models::{EvaluationTable, ModelConfig, QuestionSet};
use crate::services::ModelClient;
use crate::workflow::task_ctx::TaskCtx;

/// 并发调用两个模型
///
/// 两个客户端各自持有独立的 HTTP 连接；任意一方失败整个调用失败
pub async fn run_dual(
    questions: &QuestionSet,
    external: ModelConfig,
    internal: ModelConfig,
    prompt: Option<&str>,
    timeout: Duration,
    ctx: &TaskCtx,
) -> AppResult<EvaluationTable> {
    let external_first_token = external.capture_first_token();
    let internal_first_token = internal.capture_first_token();

    let external_client = ModelClient::new(external, timeout)?;
    let internal_client = ModelClient::new(internal, timeout)?;

    info!(
        "{} 🤖 并发调用模型: 外部 {} / 内部 {}，共 {} 题",
        ctx,
        external_client.config().model_name(),
        internal_client.config().model_name(),
        questions.len()
    );

    let (external_records, internal_records) = tokio::try_join!(
        external_client.query_all(questions, prompt),
        internal_client.query_all(questions, prompt),
    )?;

    info!("{} ✓ 两个模型均已回答完毕", ctx);

    EvaluationTable::from_responses(
        questions,
        &external_records,
        &internal_records,
        external_first_token,
        internal_first_token,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cell, ModelRole};
    use mockito::{Matcher, ServerGuard};

    fn sse_echo(text: &str) -> String {
        let chunk = serde_json::json!({"choices": [{"delta": {"content": text}}]});
        format!("data: {}\n\ndata: [DONE]\n\n", chunk)
    }

    async fn echo_server(questions: &[&str], prefix: &str) -> ServerGuard {
        let mut server = mockito::Server::new_async().await;
        for q in questions {
            server
                .mock("POST", "/chat/completions")
                .match_body(Matcher::Regex(regex::escape(q)))
                .with_status(200)
                .with_header("content-type", "text/event-stream")
                .with_body(sse_echo(&format!("{}{}", prefix, q)))
                .create_async()
                .await;
        }
        server
    }

    #[tokio::test]
    async fn test_run_dual_keeps_row_order() {
        let questions = ["first question", "second question", "third question"];
        let external = echo_server(&questions, "E:").await;
        let internal = echo_server(&questions, "I:").await;

        let table = run_dual(
            &QuestionSet::new(questions),
            ModelConfig::new(ModelRole::External, "k", &external.url(), "ext", true).unwrap(),
            ModelConfig::new(ModelRole::Internal, "k", &internal.url(), "int", false).unwrap(),
            None,
            Duration::from_secs(5),
            &TaskCtx::new("t"),
        )
        .await
        .unwrap();

        let sheet = table.sheet();
        assert_eq!(sheet.row_count(), 3);
        assert_eq!(sheet.column_count(), 4);
        for (i, q) in questions.iter().enumerate() {
            assert_eq!(sheet.rows[i][0], Cell::from(*q));
            assert_eq!(sheet.rows[i][1], Cell::from(format!("E:{}", q)));
            assert_eq!(sheet.rows[i][2], Cell::from(format!("I:{}", q)));
            assert!(sheet.rows[i][3].as_number().is_some());
        }
    }

    #[tokio::test]
    async fn test_run_dual_fails_when_one_model_fails() {
        let questions = ["only question"];
        let external = echo_server(&questions, "").await;
        let mut internal = mockito::Server::new_async().await;
        internal
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = run_dual(
            &QuestionSet::new(questions),
            ModelConfig::new(ModelRole::External, "k", &external.url(), "ext", false).unwrap(),
            ModelConfig::new(ModelRole::Internal, "k", &internal.url(), "int", false).unwrap(),
            Some("be brief"),
            Duration::from_secs(5),
            &TaskCtx::new("t"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.stage_label(), "model");
    }
}
