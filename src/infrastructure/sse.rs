//! SSE 流解码
//!
//! 把 chat completions 流式响应的字节块切分为事件，并解析出正文 / 推理增量

use serde::Deserialize;

const SSE_DELIMITER: &str = "\n\n";
const DONE_MARKER: &str = "[DONE]";

/// 单个事件中的增量文本
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamDelta {
    /// 正文通道
    pub content: Option<String>,
    /// 推理通道（reasoning_content / reasoning）
    pub reasoning: Option<String>,
}

/// 解析后的流事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatStreamEvent {
    Delta(StreamDelta),
    Done,
    /// 注释、心跳、没有 choices 的块
    Ignored,
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// 按 SSE 分隔符切分字节流
///
/// 多字节 UTF-8 字符可能被拆在两个块之间，未完整的字节先留在缓冲区
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    utf8_buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.utf8_buffer.extend_from_slice(bytes);
        loop {
            match std::str::from_utf8(&self.utf8_buffer) {
                Ok(text) => {
                    self.buffer.push_str(&text.replace('\r', ""));
                    self.utf8_buffer.clear();
                    return;
                }
                Err(err) => {
                    self.consume_valid_prefix(err.valid_up_to());
                    match err.error_len() {
                        // 非法字节替换为 U+FFFD 后继续解码
                        Some(invalid_len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.utf8_buffer.drain(..invalid_len);
                        }
                        // 末尾不完整的多字节字符，等下一个块
                        None => return,
                    }
                }
            }
        }
    }

    fn consume_valid_prefix(&mut self, valid_up_to: usize) {
        if valid_up_to == 0 {
            return;
        }
        let valid = String::from_utf8_lossy(&self.utf8_buffer[..valid_up_to]);
        self.buffer.push_str(&valid.replace('\r', ""));
        self.utf8_buffer.drain(..valid_up_to);
    }

    /// 取出下一个完整事件
    pub fn next_event(&mut self) -> Option<String> {
        let pos = self.buffer.find(SSE_DELIMITER)?;
        let end = pos + SSE_DELIMITER.len();
        let event = self.buffer[..pos].to_string();
        self.buffer.drain(..end);
        Some(event)
    }

    /// 流结束时取出没有以空行结尾的剩余事件
    pub fn finish(&mut self) -> Option<String> {
        if !self.utf8_buffer.is_empty() {
            let rest = String::from_utf8_lossy(&self.utf8_buffer).to_string();
            self.buffer.push_str(&rest);
            self.utf8_buffer.clear();
        }
        let rest = std::mem::take(&mut self.buffer);
        if rest.trim().is_empty() {
            None
        } else {
            Some(rest)
        }
    }
}

/// 解析一个 SSE 事件
///
/// 多行 `data:` 按换行拼接；返回 Err 时携带可读的原因
pub fn parse_chat_event(event: &str) -> Result<ChatStreamEvent, String> {
    let data = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|line| line.strip_prefix(' ').unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n");

    let data = data.trim();
    if data.is_empty() {
        return Ok(ChatStreamEvent::Ignored);
    }
    if data == DONE_MARKER {
        return Ok(ChatStreamEvent::Done);
    }

    let payload: ChunkPayload =
        serde_json::from_str(data).map_err(|e| format!("{}: {}", e, data))?;

    if let Some(error) = payload.error {
        return Err(format!("流中返回错误: {}", error));
    }

    let Some(choice) = payload.choices.into_iter().next() else {
        return Ok(ChatStreamEvent::Ignored);
    };

    let delta = choice.delta;
    Ok(ChatStreamEvent::Delta(StreamDelta {
        content: delta.content,
        reasoning: delta.reasoning_content.or(delta.reasoning),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(decoder: &mut SseDecoder) -> Vec<String> {
        let mut events = Vec::new();
        while let Some(event) = decoder.next_event() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_split_events_across_chunks() {
        let mut decoder = SseDecoder::new();
        decoder.push_bytes(b"data: {\"choices\":[]}\n\nda");
        assert_eq!(drain(&mut decoder), vec!["data: {\"choices\":[]}"]);
        decoder.push_bytes(b"ta: [DONE]\n\n");
        assert_eq!(drain(&mut decoder), vec!["data: [DONE]"]);
    }

    #[test]
    fn test_split_multibyte_utf8() {
        let bytes = "data: 你好\n\n".as_bytes();
        let mut decoder = SseDecoder::new();
        // “你”占 3 个字节，从中间切开
        decoder.push_bytes(&bytes[..7]);
        assert!(drain(&mut decoder).is_empty());
        decoder.push_bytes(&bytes[7..]);
        assert_eq!(drain(&mut decoder), vec!["data: 你好"]);
    }

    #[test]
    fn test_invalid_byte_does_not_block_later_events() {
        let mut decoder = SseDecoder::new();
        decoder.push_bytes(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\xff\"}}]}\n\n");
        decoder.push_bytes(b"data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\ndata: [DONE]\n\n");

        let events = drain(&mut decoder);
        assert_eq!(events.len(), 3);
        match parse_chat_event(&events[0]).unwrap() {
            ChatStreamEvent::Delta(delta) => assert_eq!(delta.content.as_deref(), Some("a\u{FFFD}")),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(parse_chat_event(&events[2]).unwrap(), ChatStreamEvent::Done);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_crlf_delimiters() {
        let mut decoder = SseDecoder::new();
        decoder.push_bytes(b"data: [DONE]\r\n\r\n");
        assert_eq!(drain(&mut decoder), vec!["data: [DONE]"]);
    }

    #[test]
    fn test_finish_returns_unterminated_event() {
        let mut decoder = SseDecoder::new();
        decoder.push_bytes(b"data: [DONE]");
        assert!(drain(&mut decoder).is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("data: [DONE]"));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_parse_content_and_reasoning() {
        let event = r#"data: {"choices":[{"delta":{"content":"答","reasoning_content":"想"}}]}"#;
        assert_eq!(
            parse_chat_event(event).unwrap(),
            ChatStreamEvent::Delta(StreamDelta {
                content: Some("答".to_string()),
                reasoning: Some("想".to_string()),
            })
        );

        let event = r#"data: {"choices":[{"delta":{"reasoning":"r"}}]}"#;
        assert_eq!(
            parse_chat_event(event).unwrap(),
            ChatStreamEvent::Delta(StreamDelta {
                content: None,
                reasoning: Some("r".to_string()),
            })
        );
    }

    #[test]
    fn test_parse_no_choices_and_comments() {
        assert_eq!(
            parse_chat_event(r#"data: {"choices":[],"usage":{"total_tokens":3}}"#).unwrap(),
            ChatStreamEvent::Ignored
        );
        assert_eq!(parse_chat_event(": keep-alive").unwrap(), ChatStreamEvent::Ignored);
        assert_eq!(parse_chat_event("data: [DONE]").unwrap(), ChatStreamEvent::Done);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse_chat_event("data: {not json").is_err());
        assert!(parse_chat_event(r#"data: {"error":{"message":"quota"}}"#).is_err());
    }
}
