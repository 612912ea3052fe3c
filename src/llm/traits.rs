//! Oracle 抽象
//!
//! 所有决策/生成后端（OpenAI 兼容 / DeepSeek / Mock）实现 Oracle：输入结构化文本与可选图像，返回文本。
//! 请求带有 Purpose，后端可据此选择模型，Mock 可据此返回脚本化回复。

use async_trait::async_trait;
use serde::Serialize;

use crate::memory::Message;

/// 调用目的
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    /// 操作员指令 -> 步骤列表（JSON）
    Plan,
    /// 相机帧 -> 场景描述
    Describe,
    /// 任务步骤 -> 工具调用
    Decide,
    /// 候选动作 -> 结论
    Validate,
}

/// 一帧图像（JPEG/PNG 原始字节）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageFrame {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl ImageFrame {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime: "image/jpeg".to_string(),
        }
    }
}

/// 一次 Oracle 请求
#[derive(Clone, Debug)]
pub struct OracleRequest {
    pub purpose: Purpose,
    pub messages: Vec<Message>,
    pub image: Option<ImageFrame>,
}

impl OracleRequest {
    pub fn new(purpose: Purpose, messages: Vec<Message>) -> Self {
        Self {
            purpose,
            messages,
            image: None,
        }
    }

    pub fn with_image(mut self, image: ImageFrame) -> Self {
        self.image = Some(image);
        self
    }

    /// 最后一条 User 消息内容
    pub fn last_user(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, crate::memory::Role::User))
            .map(|m| m.content.as_str())
    }
}

/// Oracle trait：非流式完成
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(&self, request: &OracleRequest) -> Result<String, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
