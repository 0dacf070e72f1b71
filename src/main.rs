use anyhow::{Context, Result};
use dual_model_eval::utils::logging;
use dual_model_eval::{
    probe_model, Config, EvaluationRequest, ModelRole, ModelSettings, TaskRunner, TaskStatus,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

const DEFAULT_METRICS: &str = "similarity,rouge-1,rouge-2,rouge-l,chinese-f1";

fn model_settings(prefix: &str) -> ModelSettings {
    let var = |name: &str| std::env::var(format!("{}_{}", prefix, name)).unwrap_or_default();
    ModelSettings {
        api_key: var("API_KEY"),
        base_url: var("BASE_URL"),
        model_name: var("MODEL"),
        capture_first_token: var("FIRST_TOKEN").parse().unwrap_or(false),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init_with_file(config.verbose_logging, &config.output_log_file)?;
    logging::log_startup(config.max_concurrent_tasks);

    let source_path = std::env::var("QUESTIONS_FILE")
        .map(PathBuf::from)
        .context("缺少环境变量 QUESTIONS_FILE")?;
    let request = EvaluationRequest {
        source_path,
        question_column: std::env::var("QUESTION_COLUMN").unwrap_or_else(|_| "A".to_string()),
        prompt: std::env::var("PROMPT").ok(),
        external: model_settings("EXTERNAL_MODEL"),
        internal: model_settings("INTERNAL_MODEL"),
        metrics: std::env::var("METRICS")
            .unwrap_or_else(|_| DEFAULT_METRICS.to_string())
            .split(',')
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect(),
    };

    // 连通性检测只做提示，不阻止提交
    for (role, settings) in [
        (ModelRole::External, &request.external),
        (ModelRole::Internal, &request.internal),
    ] {
        if let Ok(model) = settings.validate(role) {
            match probe_model(&model, Duration::from_secs(10)).await {
                Ok(outcome) if outcome.is_reachable() => {}
                Ok(outcome) => warn!("⚠️ {} 连通性检测未通过: {:?}", role, outcome),
                Err(e) => warn!("⚠️ {} 连通性检测出错: {}", role, e),
            }
        }
    }

    let runner = TaskRunner::new(config);
    let task = runner.submit(request).await?;
    info!("📝 任务已提交: {} (进度 {}%)", task.task_id, task.progress);

    let task = runner.wait(&task.task_id, Duration::from_secs(2)).await?;
    match task.status {
        TaskStatus::Completed => {
            let output = runner
                .config()
                .processed_files_folder
                .join(task.processed_filename.unwrap_or_default());
            info!("🎉 评估完成，结果文件: {}", output.display());
            println!("{}", output.display());
        }
        _ => {
            let message = task.message.unwrap_or_default();
            error!("❌ 评估失败: {}", message);
            anyhow::bail!(message);
        }
    }

    Ok(())
}
