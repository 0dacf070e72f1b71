//! 模型回答记录

/// 单个题目在单个模型上的回答
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseRecord {
    pub question: String,
    /// 完整回答：推理内容与正文按到达顺序拼接
    pub response: String,
    /// 仅推理通道的内容
    pub reasoning: String,
    /// 仅正文通道的内容
    pub content: String,
    /// 首 token 耗时（秒），未开启统计时为 None
    pub first_token_latency: Option<f64>,
}

impl ResponseRecord {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    /// 追加正文增量
    pub fn push_content(&mut self, delta: &str) {
        self.content.push_str(delta);
        self.response.push_str(delta);
    }

    /// 追加推理增量
    pub fn push_reasoning(&mut self, delta: &str) {
        self.reasoning.push_str(delta);
        self.response.push_str(delta);
    }
}
