//! 基础设施层
//!
//! 只暴露能力（读写表格、文件命名、SSE 解码），不认识题目和任务

pub mod files;
pub mod sse;
pub mod workbook;

pub use files::{resolve_download, sanitize_file_name, unique_file_name};
pub use sse::{parse_chat_event, ChatStreamEvent, SseDecoder, StreamDelta};
pub use workbook::{read_sheet, write_sheet, SheetFormat};
