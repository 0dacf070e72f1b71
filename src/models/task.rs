//! 后台任务状态

use serde::Serialize;
use std::fmt;

/// 轮询模拟进度的上限
pub const POLL_PROGRESS_CAP: u8 = 90;
/// 每次轮询模拟增加的进度
pub const POLL_PROGRESS_STEP: u8 = 5;

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Submitted,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Submitted => "submitted",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 一次评估任务
///
/// 状态机：submitted → processing → completed | failed，终态不再变化
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub task_id: String,
    pub status: TaskStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_filename: Option<String>,
}

impl Task {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Submitted,
            progress: 0,
            message: None,
            processed_filename: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 推进到阶段检查点，进度只增不减
    pub fn checkpoint(&mut self, progress: u8) {
        if self.is_terminal() {
            return;
        }
        self.progress = self.progress.max(progress.min(100));
    }

    /// 后台任务已启动
    pub fn mark_processing(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.status = TaskStatus::Processing;
    }

    pub fn complete(&mut self, processed_filename: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = TaskStatus::Completed;
        self.progress = 100;
        self.processed_filename = Some(processed_filename.into());
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = TaskStatus::Failed;
        self.progress = 100;
        self.message = Some(message.into());
    }

    /// 轮询时的进度模拟：处理中且低于上限时增加，最多到上限
    pub fn simulate_poll_progress(&mut self) {
        if self.status == TaskStatus::Processing && self.progress < POLL_PROGRESS_CAP {
            self.progress = (self.progress + POLL_PROGRESS_STEP).min(POLL_PROGRESS_CAP);
        }
    }
}
