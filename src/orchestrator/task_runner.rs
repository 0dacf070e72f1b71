//! 评估任务调度器 - 编排层
//!
//! ## 职责
//!
//! 1. **同步准备**：保存上传文件、提取题目列、校验配置，失败立即返回给提交者
//! 2. **后台执行**：每次评估一个 tokio 任务，由 Semaphore 限制同时运行的数量
//! 3. **状态跟踪**：通过 [`TaskRegistry`] 暴露进度，终态不再变化
//!
//! 不提供取消接口，已提交的任务一定会运行到终态。

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppResult, InputError, PersistenceError, TaskError};
use crate::infrastructure::files::{ensure_dir, sanitize_file_name};
use crate::models::{Metric, ModelRole, ModelSettings, Task};
use crate::orchestrator::task_registry::TaskRegistry;
use crate::services::{extract_column, ScoringEngine};
use crate::workflow::{EvaluationFlow, EvaluationJob, TaskCtx};

/// 阶段检查点
const PROGRESS_UPLOAD_SAVED: u8 = 10;
const PROGRESS_COLUMN_EXTRACTED: u8 = 30;
const PROGRESS_CONFIG_PARSED: u8 = 50;
const PROGRESS_PIPELINE_STARTED: u8 = 60;

/// 一次评估提交
#[derive(Clone, Default)]
pub struct EvaluationRequest {
    /// 用户上传的表格
    pub source_path: PathBuf,
    /// 题目所在列的字母
    pub question_column: String,
    /// 系统提示词
    pub prompt: Option<String>,
    pub external: ModelSettings,
    pub internal: ModelSettings,
    /// 指标键，如 `similarity`、`rouge-1`
    pub metrics: Vec<String>,
}

struct RunnerInner {
    config: Config,
    registry: TaskRegistry,
    semaphore: Arc<Semaphore>,
    flow: EvaluationFlow,
    running: AtomicUsize,
    queued: AtomicUsize,
}

/// 评估任务调度器，可以廉价 clone 后在多处使用
#[derive(Clone)]
pub struct TaskRunner {
    inner: Arc<RunnerInner>,
}

impl TaskRunner {
    pub fn new(config: Config) -> Self {
        let scoring = Arc::new(ScoringEngine::new(config.embedding_model_id.clone()));
        Self::with_scoring(config, scoring)
    }

    /// 使用指定的指标计算器（测试中注入桩向量模型）
    pub fn with_scoring(config: Config, scoring: Arc<ScoringEngine>) -> Self {
        let permits = config.max_concurrent_tasks.max(1);
        let flow = EvaluationFlow::new(scoring, config.request_timeout());
        Self {
            inner: Arc::new(RunnerInner {
                config,
                registry: TaskRegistry::new(),
                semaphore: Arc::new(Semaphore::new(permits)),
                flow,
                running: AtomicUsize::new(0),
                queued: AtomicUsize::new(0),
            }),
        }
    }

    /// 提交评估
    ///
    /// 准备阶段的错误直接返回，同时任务被标记为失败；
    /// 成功时返回 processing 状态的快照，评估在后台继续
    pub async fn submit(&self, request: EvaluationRequest) -> AppResult<Task> {
        let task = self.inner.registry.create();
        let ctx = TaskCtx::new(task.task_id.clone());
        info!("{} 📥 收到评估请求: {}", ctx, request.source_path.display());

        let job = match self.prepare(&ctx, &request) {
            Ok(job) => job,
            Err(e) => {
                error!("{} ❌ 准备阶段失败 [{}]: {}", ctx, e.stage_label(), e);
                self.inner
                    .registry
                    .update(&ctx.task_id, |t| t.fail(e.to_string()))?;
                return Err(e);
            }
        };

        self.inner
            .registry
            .update(&ctx.task_id, Task::mark_processing)?;
        self.launch(ctx.clone(), job);

        self.inner.registry.get(&ctx.task_id)
    }

    fn prepare(&self, ctx: &TaskCtx, request: &EvaluationRequest) -> AppResult<EvaluationJob> {
        let registry = &self.inner.registry;
        let config = &self.inner.config;

        let upload_path = save_upload(&request.source_path, &config.uploads_folder, &ctx.task_id)?;
        registry.update(&ctx.task_id, |t| t.checkpoint(PROGRESS_UPLOAD_SAVED))?;
        info!("{} 💾 上传文件已保存: {}", ctx, upload_path.display());

        let questions_path = extract_column(
            &upload_path,
            &request.question_column,
            &config.processed_files_folder,
        )?;
        registry.update(&ctx.task_id, |t| t.checkpoint(PROGRESS_COLUMN_EXTRACTED))?;

        let external = request.external.validate(ModelRole::External)?;
        let internal = request.internal.validate(ModelRole::Internal)?;
        let metrics = Metric::parse_selection(request.metrics.as_slice())?;
        registry.update(&ctx.task_id, |t| t.checkpoint(PROGRESS_CONFIG_PARSED))?;
        info!(
            "{} ⚙️ 配置校验通过，指标: {:?}",
            ctx,
            metrics.iter().map(Metric::key).collect::<Vec<_>>()
        );

        Ok(EvaluationJob {
            questions_path,
            output_dir: config.processed_files_folder.clone(),
            prompt: request.prompt.clone(),
            external,
            internal,
            metrics,
        })
    }

    /// 启动后台评估，排队等待许可
    fn launch(&self, ctx: TaskCtx, job: EvaluationJob) {
        let inner = Arc::clone(&self.inner);
        inner.queued.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            let permit = Arc::clone(&inner.semaphore).acquire_owned().await;
            inner.queued.fetch_sub(1, Ordering::SeqCst);

            let _permit = match permit {
                Ok(permit) => permit,
                Err(e) => {
                    error!("{} ❌ 获取执行许可失败: {}", ctx, e);
                    let _ = inner.registry.update(&ctx.task_id, |t| t.fail(e.to_string()));
                    return;
                }
            };

            inner.running.fetch_add(1, Ordering::SeqCst);
            let _ = inner
                .registry
                .update(&ctx.task_id, |t| t.checkpoint(PROGRESS_PIPELINE_STARTED));
            info!("{} 🚀 开始评估", ctx);

            let result = run_guarded(inner.flow.process_and_evaluate(&job, &ctx)).await;
            inner.running.fetch_sub(1, Ordering::SeqCst);

            let update = match result {
                Ok(output_path) => {
                    let file_name = output_path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    info!("{} ✅ 任务完成: {}", ctx, file_name);
                    inner.registry.update(&ctx.task_id, |t| t.complete(file_name))
                }
                Err(e) => {
                    error!("{} ❌ 评估失败 [{}]: {}", ctx, e.stage_label(), e);
                    inner.registry.update(&ctx.task_id, |t| t.fail(e.to_string()))
                }
            };
            if let Err(e) = update {
                warn!("{} ⚠️ 更新任务状态失败: {}", ctx, e);
            }
        });
    }

    /// 查询任务快照
    pub fn get(&self, task_id: &str) -> AppResult<Task> {
        self.inner.registry.get(task_id)
    }

    /// 客户端轮询
    pub fn poll(&self, task_id: &str) -> AppResult<Task> {
        self.inner.registry.poll(task_id)
    }

    /// 轮询直到任务进入终态
    pub async fn wait(&self, task_id: &str, interval: Duration) -> AppResult<Task> {
        loop {
            let task = self.poll(task_id)?;
            if task.is_terminal() {
                return Ok(task);
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// 正在运行的评估数量
    pub fn running_count(&self) -> usize {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// 等待许可的评估数量
    pub fn queued_count(&self) -> usize {
        self.inner.queued.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}

/// 把上传文件复制到上传目录，命名为 `{task_id}_{清洗后的文件名}`
fn save_upload(source: &Path, uploads_folder: &Path, task_id: &str) -> AppResult<PathBuf> {
    if !source.is_file() {
        return Err(InputError::FileNotFound {
            path: source.to_path_buf(),
        }
        .into());
    }
    let original = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let safe_name = sanitize_file_name(&original);
    if safe_name.is_empty() {
        return Err(InputError::UnsafeFileName {
            file_name: original,
        }
        .into());
    }

    ensure_dir(uploads_folder)?;
    let target = uploads_folder.join(format!("{}_{}", task_id, safe_name));
    std::fs::copy(source, &target).map_err(|e| PersistenceError::write(&target, e))?;
    Ok(target)
}

/// 执行评估流水线，异常退出转换为任务错误，保证计数与终态更新照常进行
async fn run_guarded<F>(pipeline: F) -> AppResult<PathBuf>
where
    F: Future<Output = AppResult<PathBuf>>,
{
    match AssertUnwindSafe(pipeline).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(TaskError::Panicked {
            reason: panic_reason(payload.as_ref()),
        }
        .into()),
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "未知原因".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;

    fn test_config(root: &Path) -> Config {
        Config {
            uploads_folder: root.join("uploads"),
            processed_files_folder: root.join("processed"),
            output_log_file: root.join("app.log"),
            max_concurrent_tasks: 1,
            request_timeout_secs: 5,
            ..Config::default()
        }
    }

    fn settings(base_url: &str) -> ModelSettings {
        ModelSettings {
            api_key: "k".to_string(),
            base_url: base_url.to_string(),
            model_name: "m".to_string(),
            capture_first_token: false,
        }
    }

    #[tokio::test]
    async fn test_run_guarded_turns_panic_into_task_error() {
        let result = run_guarded(async {
            let rows: Vec<usize> = Vec::new();
            if rows.is_empty() {
                panic!("结果表为空");
            }
            Ok(PathBuf::from("never.csv"))
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.stage_label(), "task");
        assert!(err.to_string().contains("结果表为空"));
    }

    #[tokio::test]
    async fn test_run_guarded_passes_result_through() {
        let ok = run_guarded(async { Ok(PathBuf::from("out.csv")) }).await;
        assert_eq!(ok.unwrap(), PathBuf::from("out.csv"));

        let formatted = run_guarded(async {
            let row = 3;
            if row > 0 {
                panic!("第 {} 行出错", row);
            }
            Ok(PathBuf::new())
        })
        .await;
        assert!(formatted.unwrap_err().to_string().contains("第 3 行出错"));
    }

    #[test]
    fn test_save_upload_sanitizes_name() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("my questions.csv");
        std::fs::write(&source, "Q\nhi\n").unwrap();

        let saved = save_upload(&source, &dir.path().join("up"), "abc").unwrap();
        assert_eq!(saved.file_name().unwrap(), "abc_my_questions.csv");
        assert!(saved.is_file());
    }

    #[tokio::test]
    async fn test_submit_out_of_range_column_marks_failed() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("q.csv");
        std::fs::write(&source, "Q\nhello\n").unwrap();
        let runner = TaskRunner::new(test_config(dir.path()));

        let err = runner
            .submit(EvaluationRequest {
                source_path: source,
                question_column: "C".to_string(),
                external: settings("http://localhost:1"),
                internal: settings("http://localhost:1"),
                metrics: vec!["rouge-1".to_string()],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.stage_label(), "input");
        assert!(!dir.path().join("processed").exists());
        assert_eq!(runner.running_count(), 0);
        assert_eq!(runner.queued_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_invalid_config_marks_failed() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("q.csv");
        std::fs::write(&source, "Q\nhello\n").unwrap();
        let runner = TaskRunner::new(test_config(dir.path()));

        let err = runner
            .submit(EvaluationRequest {
                source_path: source,
                question_column: "A".to_string(),
                external: settings("http://localhost:1"),
                internal: ModelSettings::default(),
                metrics: vec!["rouge-1".to_string()],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("内部模型"));
    }

    #[tokio::test]
    async fn test_model_failure_reaches_failed_state() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("q.csv");
        std::fs::write(&source, "Q\nhello\n").unwrap();

        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;

        let runner = TaskRunner::new(test_config(dir.path()));
        let submitted = runner
            .submit(EvaluationRequest {
                source_path: source,
                question_column: "A".to_string(),
                external: settings(&server.url()),
                internal: settings(&server.url()),
                metrics: vec!["rouge-l".to_string()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(submitted.status, TaskStatus::Processing);
        assert!(submitted.progress >= 50);

        let done = runner
            .wait(&submitted.task_id, Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Failed);
        assert_eq!(done.progress, 100);
        assert!(done.message.unwrap().contains("401"));

        // 终态不再变化
        assert_eq!(runner.poll(&submitted.task_id).unwrap().status, TaskStatus::Failed);
        assert_eq!(runner.running_count(), 0);
    }
}
