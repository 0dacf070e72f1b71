//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责评估任务的调度和状态跟踪，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `task_runner` - 评估任务调度器
//! - 同步完成上传保存、列提取、配置校验
//! - 后台启动评估流程，Semaphore 限制同时运行的数量
//! - 统计运行中 / 排队中的任务数
//!
//! ### `task_registry` - 任务表
//! - 内存中的任务状态，单个互斥锁保护
//! - 新建 / 查询 / 更新 / 轮询
//!
//! ## 层次关系
//!
//! ```text
//! task_runner (处理一次提交)
//!     ↓
//! workflow::EvaluationFlow (双模型调用 + 指标计算)
//!     ↓
//! services (能力层：模型调用 / 列提取 / 指标)
//!     ↓
//! infrastructure (基础设施：表格读写 / SSE 解析 / 文件命名)
//! ```

pub mod task_registry;
pub mod task_runner;

pub use task_registry::TaskRegistry;
pub use task_runner::{EvaluationRequest, TaskRunner};
