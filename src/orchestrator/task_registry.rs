//! 任务表
//!
//! 所有任务状态保存在内存中，进程重启后丢失。
//! 只暴露新建、查询、更新、轮询四种操作。

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{AppResult, TaskError};
use crate::models::Task;

#[derive(Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // 持锁期间不会 panic，中毒的锁照常使用
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Task>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 新建任务，状态为 submitted
    pub fn create(&self) -> Task {
        let task = Task::new(uuid::Uuid::new_v4().to_string());
        self.lock().insert(task.task_id.clone(), task.clone());
        task
    }

    /// 查询任务快照
    pub fn get(&self, task_id: &str) -> AppResult<Task> {
        self.lock()
            .get(task_id)
            .cloned()
            .ok_or_else(|| not_found(task_id))
    }

    /// 修改任务并返回修改后的快照
    pub fn update<F>(&self, task_id: &str, f: F) -> AppResult<Task>
    where
        F: FnOnce(&mut Task),
    {
        let mut tasks = self.lock();
        let task = tasks.get_mut(task_id).ok_or_else(|| not_found(task_id))?;
        f(task);
        Ok(task.clone())
    }

    /// 客户端轮询：处理中的任务进度模拟增长
    pub fn poll(&self, task_id: &str) -> AppResult<Task> {
        self.update(task_id, Task::simulate_poll_progress)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn not_found(task_id: &str) -> crate::error::AppError {
    TaskError::NotFound {
        task_id: task_id.to_string(),
    }
    .into()
}
