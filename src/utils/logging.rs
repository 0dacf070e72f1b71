/// 日志工具模块
///
/// 提供日志初始化和输出的辅助函数
use crate::error::{AppResult, PersistenceError};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 debug / info
fn env_filter(verbose: bool) -> EnvFilter {
    let default_level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// 初始化 tracing 日志（只输出到终端）
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .try_init();
}

/// 构建同时写终端和日志文件的 subscriber
///
/// 日志文件先写入表头，之后的日志追加在后面
pub fn build_subscriber(
    verbose: bool,
    log_file_path: &Path,
) -> AppResult<impl tracing::Subscriber + Send + Sync + 'static> {
    init_log_file(log_file_path)?;
    let file = OpenOptions::new()
        .append(true)
        .open(log_file_path)
        .map_err(|e| PersistenceError::write(log_file_path, e))?;

    Ok(tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(fmt::layer())
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false)))
}

/// 初始化 tracing 日志，终端和日志文件各一份
pub fn init_with_file(verbose: bool, log_file_path: &Path) -> AppResult<()> {
    let subscriber = build_subscriber(verbose, log_file_path)?;
    let _ = tracing::subscriber::set_global_default(subscriber);
    Ok(())
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &Path) -> AppResult<()> {
    if let Some(parent) = log_file_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| PersistenceError::CreateDirFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    let log_header = format!(
        "{}\n模型评估日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header).map_err(|e| PersistenceError::write(log_file_path, e))?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(max_concurrent: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 双模型评估模式");
    info!("📊 最大并发任务数: {}", max_concurrent);
    info!("{}", "=".repeat(60));
}

/// 把秒数拆成 (小时, 分钟, 秒)
pub fn convert_seconds(elapsed: Duration) -> (u64, u64, f64) {
    let total = elapsed.as_secs_f64();
    let hours = (total / 3600.0).floor() as u64;
    let minutes = ((total % 3600.0) / 60.0).floor() as u64;
    let seconds = ((total % 60.0) * 100.0).round() / 100.0;
    (hours, minutes, seconds)
}

/// 记录指标耗时
pub fn log_metric_elapsed(task_label: &str, metric_name: &str, elapsed: Duration) {
    let (hours, minutes, seconds) = convert_seconds(elapsed);
    info!(
        "{} ✓ {} 计算完成，共耗时：{}小时{}分钟{}秒",
        task_label, metric_name, hours, minutes, seconds
    );
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_seconds() {
        let (h, m, s) = convert_seconds(Duration::from_secs_f64(3725.456));
        assert_eq!(h, 1);
        assert_eq!(m, 2);
        assert!((s - 5.46).abs() < 1e-9);
    }

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("你好世界", 2), "你好...");
        assert_eq!(truncate_text("abc", 5), "abc");
    }

    #[test]
    fn test_init_log_file_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("app.log");
        init_log_file(&path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("模型评估日志"));
    }

    #[test]
    fn test_log_lines_reach_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let subscriber = build_subscriber(true, &path).unwrap();

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!("[任务 abc] ❌ 评估失败 [model]: 请求超时");
        });

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(&"=".repeat(60)));
        assert!(content.contains("[任务 abc] ❌ 评估失败 [model]: 请求超时"));
    }
}
