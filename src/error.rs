use std::path::PathBuf;
use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 输入错误（文件、列、题目、配置）
    #[error("输入错误: {0}")]
    Input(#[from] InputError),
    /// 模型调用错误
    #[error("模型调用错误: {0}")]
    Model(#[from] ModelError),
    /// 指标计算错误
    #[error("指标计算错误: {0}")]
    Scoring(#[from] ScoringError),
    /// 文件读写错误
    #[error("文件错误: {0}")]
    Persistence(#[from] PersistenceError),
    /// 任务错误
    #[error("任务错误: {0}")]
    Task(#[from] TaskError),
}

/// 输入错误
///
/// 在后台任务启动之前同步返回给提交者
#[derive(Debug, Error)]
pub enum InputError {
    /// 文件不存在
    #[error("文件不存在: {}", .path.display())]
    FileNotFound { path: PathBuf },
    /// 列字母不合法
    #[error("列 '{selector}' 不是单个英文字母")]
    InvalidColumn { selector: String },
    /// 列超出表格范围
    #[error("指定的列 '{column}' 超出了表格的列范围 (共 {column_count} 列)")]
    ColumnOutOfRange { column: char, column_count: usize },
    /// 表格中没有题目
    #[error("表格中没有可用的题目: {}", .path.display())]
    EmptyInput { path: PathBuf },
    /// 模型配置不完整
    #[error("模型配置无效 ({model_label}): {reason}")]
    InvalidModelConfig { model_label: String, reason: String },
    /// 未知的评估指标
    #[error("未知的评估指标: {key}")]
    UnknownMetric { key: String },
    /// 不支持的文件格式
    #[error("不支持的文件格式: {}", .path.display())]
    UnsupportedFormat { path: PathBuf },
    /// 不安全的文件名
    #[error("无效的文件名: {file_name}")]
    UnsafeFileName { file_name: String },
}

/// 模型调用错误
#[derive(Debug, Error)]
pub enum ModelError {
    /// 网络请求失败
    #[error("请求失败 (模型: {model}): {source}")]
    RequestFailed {
        model: String,
        #[source]
        source: reqwest::Error,
    },
    /// 接口返回非成功状态码
    #[error("接口返回错误状态 (模型: {model}): {status} {body}")]
    BadStatus {
        model: String,
        status: u16,
        body: String,
    },
    /// 请求超时
    #[error("请求超时 (模型: {model})")]
    Timeout { model: String },
    /// 流式响应格式错误
    #[error("流式响应解析失败 (模型: {model}): {reason}")]
    MalformedStream { model: String, reason: String },
    /// 构建请求失败
    #[error("构建请求失败 (模型: {model}): {reason}")]
    InvalidRequest { model: String, reason: String },
    /// 返回条数与题目数量不一致
    #[error("{model_label} 返回 {actual} 条结果，题目共 {expected} 条")]
    RowCountMismatch {
        model_label: String,
        expected: usize,
        actual: usize,
    },
}

/// 指标计算错误
#[derive(Debug, Error)]
pub enum ScoringError {
    /// 向量模型不可用
    #[error("向量模型不可用 ({model_id}): {reason}")]
    EmbedderUnavailable { model_id: String, reason: String },
    /// 向量计算失败
    #[error("向量计算失败: {reason}")]
    EmbeddingFailed { reason: String },
    /// 表格缺少回答列
    #[error("表格只有 {column_count} 列，缺少模型回答列")]
    MissingResponseColumns { column_count: usize },
    /// 计算线程异常退出
    #[error("指标计算线程异常: {reason}")]
    WorkerPanicked { reason: String },
}

/// 文件读写错误
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// 读取失败
    #[error("读取文件失败 ({}): {reason}", .path.display())]
    ReadFailed { path: PathBuf, reason: String },
    /// 写入失败
    #[error("写入文件失败 ({}): {reason}", .path.display())]
    WriteFailed { path: PathBuf, reason: String },
    /// 目录创建失败
    #[error("创建目录失败 ({}): {source}", .path.display())]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 任务错误
#[derive(Debug, Error)]
pub enum TaskError {
    /// 任务不存在
    #[error("无效的任务ID: {task_id}")]
    NotFound { task_id: String },
    /// 后台评估异常退出
    #[error("评估任务异常退出: {reason}")]
    Panicked { reason: String },
}

impl AppError {
    /// 错误所属的阶段分类，用于日志
    pub fn stage_label(&self) -> &'static str {
        match self {
            AppError::Input(_) => "input",
            AppError::Model(_) => "model",
            AppError::Scoring(_) => "scoring",
            AppError::Persistence(_) => "persistence",
            AppError::Task(_) => "task",
        }
    }

    /// 是否为任务不存在
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::Task(TaskError::NotFound { .. }))
    }
}

// ========== 便捷构造函数 ==========

impl PersistenceError {
    pub fn read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PersistenceError::ReadFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PersistenceError::WriteFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl ModelError {
    /// 把 reqwest 错误按超时 / 其他网络错误分类
    pub fn from_reqwest(model: impl Into<String>, err: reqwest::Error) -> Self {
        let model = model.into();
        if err.is_timeout() {
            ModelError::Timeout { model }
        } else {
            ModelError::RequestFailed { model, source: err }
        }
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
