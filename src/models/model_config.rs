//! 模型配置

use serde::Deserialize;
use std::fmt;

use crate::error::{AppResult, InputError};

/// 参与评估的模型角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelRole {
    /// 外部模型（作为参考答案）
    External,
    /// 内部模型（作为被评估答案）
    Internal,
}

impl ModelRole {
    /// 回答列名
    pub fn response_column(&self) -> &'static str {
        match self {
            ModelRole::External => "External_Model_Response",
            ModelRole::Internal => "Internal_Model_Response",
        }
    }

    /// 首 token 耗时列名
    pub fn first_token_column(&self) -> &'static str {
        match self {
            ModelRole::External => "External_Model_First_Token",
            ModelRole::Internal => "Internal_Model_First_Token",
        }
    }
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRole::External => write!(f, "外部模型"),
            ModelRole::Internal => write!(f, "内部模型"),
        }
    }
}

/// 单个模型的连接配置
///
/// 构造时校验，评估开始后不再修改
#[derive(Clone, PartialEq, Eq)]
pub struct ModelConfig {
    api_key: String,
    base_url: String,
    model_name: String,
    capture_first_token: bool,
}

impl ModelConfig {
    /// 创建模型配置，密钥、地址、模型名均不能为空
    pub fn new(
        role: ModelRole,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model_name: impl Into<String>,
        capture_first_token: bool,
    ) -> AppResult<Self> {
        let api_key = api_key.into();
        let base_url = base_url.into();
        let model_name = model_name.into();

        let invalid = |reason: &str| InputError::InvalidModelConfig {
            model_label: role.to_string(),
            reason: reason.to_string(),
        };

        if api_key.trim().is_empty() {
            return Err(invalid("缺少 API 密钥").into());
        }
        if base_url.trim().is_empty() {
            return Err(invalid("缺少 API 地址").into());
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(invalid("API 地址必须以 http:// 或 https:// 开头").into());
        }
        if model_name.trim().is_empty() {
            return Err(invalid("缺少模型名称").into());
        }

        Ok(Self {
            api_key: api_key.trim().to_string(),
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            model_name: model_name.trim().to_string(),
            capture_first_token,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn capture_first_token(&self) -> bool {
        self.capture_first_token
    }

    /// chat completions 接口地址
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

// 不输出密钥
impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("model_name", &self.model_name)
            .field("capture_first_token", &self.capture_first_token)
            .finish()
    }
}

/// 提交者填写的原始模型设置，尚未校验
#[derive(Clone, Default, Deserialize)]
pub struct ModelSettings {
    pub api_key: String,
    pub base_url: String,
    pub model_name: String,
    #[serde(default)]
    pub capture_first_token: bool,
}

impl ModelSettings {
    /// 校验并转换为 [`ModelConfig`]
    pub fn validate(&self, role: ModelRole) -> AppResult<ModelConfig> {
        ModelConfig::new(
            role,
            self.api_key.as_str(),
            self.base_url.as_str(),
            self.model_name.as_str(),
            self.capture_first_token,
        )
    }
}
