//! # AI 接入模块
//!
//! 提供嵌入服务与对话模型的统一接口，均为 OpenAI 兼容的远端 API。
//!
//! ## 功能
//!
//! - 文本向量化（批量、带优先级标记）
//! - 对话补全（检索增强问答使用）
//! - 余弦相似度计算

pub mod chat;
pub mod embedding;

pub use chat::{ChatModel, OpenAIChatService};
pub use embedding::{
    cosine_similarity, EmbedPriority, EmbeddingService, OpenAIEmbeddingService,
};
