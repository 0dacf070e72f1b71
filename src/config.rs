use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{AppResult, PersistenceError};

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 上传文件存放目录
    pub uploads_folder: PathBuf,
    /// 处理结果存放目录
    pub processed_files_folder: PathBuf,
    /// 输出日志文件
    pub output_log_file: PathBuf,
    /// 同时运行的评估任务数量
    pub max_concurrent_tasks: usize,
    /// 单次模型请求超时（秒）
    pub request_timeout_secs: u64,
    /// 语义相似度使用的向量模型
    pub embedding_model_id: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            uploads_folder: PathBuf::from("instance/uploads"),
            processed_files_folder: PathBuf::from("instance/processed_files"),
            output_log_file: PathBuf::from("instance/app.log"),
            max_concurrent_tasks: 4,
            request_timeout_secs: 300,
            embedding_model_id: "BAAI/bge-small-zh-v1.5".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().merge_env()
    }

    /// 先读取 TOML 配置文件，再用环境变量覆盖
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PersistenceError::read(path, e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| PersistenceError::read(path, e))?;
        Ok(config.merge_env())
    }

    fn merge_env(self) -> Self {
        Self {
            uploads_folder: std::env::var("UPLOADS_FOLDER").map(PathBuf::from).unwrap_or(self.uploads_folder),
            processed_files_folder: std::env::var("PROCESSED_FILES_FOLDER").map(PathBuf::from).unwrap_or(self.processed_files_folder),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").map(PathBuf::from).unwrap_or(self.output_log_file),
            max_concurrent_tasks: std::env::var("MAX_CONCURRENT_TASKS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.max_concurrent_tasks),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.request_timeout_secs),
            embedding_model_id: std::env::var("EMBEDDING_MODEL_ID").unwrap_or(self.embedding_model_id),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(self.verbose_logging),
        }
    }

    /// 请求超时
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}
