//! 文件命名与路径安全

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::error::{AppResult, InputError, PersistenceError};

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("valid regex"));

/// 生成唯一文件名：`{prefix}_{时间戳}_{8位随机串}.{ext}`
pub fn unique_file_name(prefix: &str, extension: &str) -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let unique_id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}.{}", prefix, timestamp, &unique_id[..8], extension)
}

/// 把任意文件名清洗成只含 ASCII 字母、数字、`_`、`.`、`-` 的安全名称
///
/// 路径分隔符当作空白处理，空白折叠为 `_`，去掉首尾的 `.` 和 `_`
pub fn sanitize_file_name(file_name: &str) -> String {
    let joined = file_name
        .replace(['/', '\\'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    UNSAFE_CHARS
        .replace_all(&joined, "")
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// 确保目录存在
pub fn ensure_dir(dir: &Path) -> AppResult<()> {
    std::fs::create_dir_all(dir).map_err(|source| PersistenceError::CreateDirFailed {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// 解析下载请求的文件路径
///
/// 文件名必须已经是安全名称（清洗前后一致），否则拒绝，防止路径穿越
pub fn resolve_download(output_dir: &Path, file_name: &str) -> AppResult<PathBuf> {
    let safe_name = sanitize_file_name(file_name);
    if safe_name.is_empty() || safe_name != file_name {
        return Err(InputError::UnsafeFileName {
            file_name: file_name.to_string(),
        }
        .into());
    }

    let path = output_dir.join(&safe_name);
    if !path.is_file() {
        return Err(InputError::FileNotFound { path }.into());
    }
    Ok(path)
}
