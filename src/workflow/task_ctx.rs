//! 任务上下文
//!
//! 封装"我正在处理哪个评估任务"这一信息，只用于日志前缀

use std::fmt::Display;

#[derive(Debug, Clone)]
pub struct TaskCtx {
    /// 任务ID
    pub task_id: String,
}

impl TaskCtx {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
        }
    }
}

impl Display for TaskCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[任务 {}]", self.task_id)
    }
}
