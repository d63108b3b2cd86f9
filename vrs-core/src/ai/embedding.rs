//! # Embedding Service
//!
//! 提供文本向量化的统一接口，默认实现调用 OpenAI 兼容的 `/embeddings` API。
//!
//! ## 特性
//!
//! - 批量处理: 一次请求向量化多条文本
//! - 优先级标记: 交互查询与批量摄取区分优先级
//! - L2 归一化: 可选，余弦相似度场景建议开启

use async_trait::async_trait;

use crate::config::EmbedConfig;
use crate::error::{Result, VrsError};

/// 嵌入请求优先级
///
/// 批量摄取走 `Bulk`，交互式查询走 `Interactive`。远端服务若不区分
/// 优先级则忽略此标记。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedPriority {
    #[default]
    Bulk,
    Interactive,
}

/// Embedding Service 统一接口
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// 单个文本向量化
    async fn embed(&self, text: &str, priority: EmbedPriority) -> Result<Vec<f32>>;

    /// 批量文本向量化，输出顺序与输入一致
    async fn batch_embed(&self, texts: &[&str], priority: EmbedPriority) -> Result<Vec<Vec<f32>>>;

    /// 期望的嵌入维度（来自配置，供维度校验使用）
    fn dimension(&self) -> usize;
}

/// OpenAI Embedding Service
///
/// 调用 OpenAI 兼容 API 获取文本嵌入。
pub struct OpenAIEmbeddingService {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    model: String,
    dimension: usize,
    normalize: bool,
}

impl OpenAIEmbeddingService {
    /// 使用配置创建服务
    pub fn with_config(config: &EmbedConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(VrsError::configuration("Embedding API key not provided"));
        }

        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            model: config.model.clone(),
            dimension: config.dimension,
            normalize: config.normalize,
        })
    }

    /// 向量归一化 (L2)
    fn normalize_vec(&self, mut vec: Vec<f32>) -> Vec<f32> {
        if !self.normalize {
            return vec;
        }
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vec {
                *x /= norm;
            }
        }
        vec
    }

    async fn request(&self, input: serde_json::Value) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "input": input,
                "model": self.model,
            }))
            .send()
            .await
            .map_err(|e| VrsError::embedding(format!("Embedding API request failed: {}", e)))?;

        if !response.status().is_success() {
            let error_text: String = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(VrsError::embedding(format!(
                "Embedding API error: {}",
                error_text
            )));
        }

        let result: OpenAIEmbeddingResponse = response
            .json::<OpenAIEmbeddingResponse>()
            .await
            .map_err(|e| VrsError::embedding(format!("Failed to parse embedding response: {}", e)))?;

        let mut embeddings: Vec<_> = result
            .data
            .into_iter()
            .map(|d| (d.index, self.normalize_vec(d.embedding)))
            .collect();

        // 按原始顺序排序
        embeddings.sort_by_key(|(idx, _)| *idx);

        Ok(embeddings.into_iter().map(|(_, emb)| emb).collect())
    }
}

/// OpenAI Embedding API 响应
#[derive(Debug, serde::Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl EmbeddingService for OpenAIEmbeddingService {
    async fn embed(&self, text: &str, priority: EmbedPriority) -> Result<Vec<f32>> {
        tracing::debug!(?priority, "embedding single text");
        let result = self.request(serde_json::json!(text)).await?;
        result
            .into_iter()
            .next()
            .ok_or_else(|| VrsError::embedding("No embedding in response"))
    }

    async fn batch_embed(&self, texts: &[&str], priority: EmbedPriority) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        tracing::debug!(count = texts.len(), ?priority, "embedding batch");
        self.request(serde_json::json!(texts)).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// 计算两个向量的余弦相似度
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot_product / (norm_a * norm_b)
    } else {
        0.0
    }
}
