//! # Dual Model Eval
//!
//! 一个用于双模型对比评估的 Rust 库：同一批题目分别交给外部模型和内部模型回答，
//! 以外部模型的回答为参考，对内部模型的回答计算多种文本指标，输出结果表格。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 表格读写、SSE 解码、文件命名，只暴露能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `ModelClient` - 流式调用单个模型，记录首 token 耗时
//! - `extract_column` - 从表格中提取题目列
//! - `ScoringEngine` - 语义相似度 / ROUGE / 中文 F1
//! - `probe_model` - 连通性检测
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次评估"的完整流程
//! - `run_dual` - 两个模型并发回答，按行合并
//! - `EvaluationFlow` - 读取题目 → 双模型 → 写出 → 逐个指标计算并写出
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/task_runner` - 提交、后台执行、并发限制
//! - `orchestrator/task_registry` - 任务状态与进度
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::resolve_download;
pub use models::{EvaluationTable, Metric, ModelConfig, ModelRole, ModelSettings, QuestionSet, Task, TaskStatus};
pub use orchestrator::{EvaluationRequest, TaskRunner};
pub use services::{extract_column, probe_model, query_model, ProbeOutcome, ScoringEngine, TextEmbedder};
pub use workflow::{run_dual, EvaluationFlow, EvaluationJob};
