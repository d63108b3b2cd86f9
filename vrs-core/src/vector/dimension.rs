//! # 嵌入维度校验
//!
//! 嵌入模型输出维度与索引固定维度不一致时的处理。默认直接报错，
//! 因为静默截断或补零会破坏相似度语义；`Coerce` 是显式开启的
//! 有损兼容出口，仅用于解救配置错误的部署，不建议长期使用。

use tracing::warn;

use crate::ai::embedding::{EmbedPriority, EmbeddingService};
use crate::error::{Result, VrsError};

/// 维度不一致的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DimensionPolicy {
    /// 任何不一致都报 [`VrsError::DimensionMismatch`]
    #[default]
    Strict,
    /// 超长截断，不足补零（有损，降低检索质量）
    Coerce,
}

/// 校验并按策略调整一批嵌入向量
///
/// 输出顺序与输入一致。`Coerce` 模式下每个向量被调整到恰好
/// `configured` 维。
pub fn reconcile(
    vectors: Vec<Vec<f32>>,
    configured: usize,
    model: &str,
    policy: DimensionPolicy,
) -> Result<Vec<Vec<f32>>> {
    let mut out = Vec::with_capacity(vectors.len());
    let mut coerced = 0usize;

    for mut vec in vectors {
        let observed = vec.len();
        if observed != configured {
            match policy {
                DimensionPolicy::Strict => {
                    return Err(VrsError::DimensionMismatch {
                        configured,
                        observed,
                        model: model.to_string(),
                    });
                }
                DimensionPolicy::Coerce => {
                    if observed > configured {
                        vec.truncate(configured);
                    } else {
                        vec.resize(configured, 0.0);
                    }
                    coerced += 1;
                }
            }
        }
        out.push(vec);
    }

    if coerced > 0 {
        warn!(
            coerced,
            configured, model, "coerced embedding dimensions; retrieval quality is degraded"
        );
    }

    Ok(out)
}

/// 用一次探测调用获取嵌入模型的实际输出维度
///
/// 启动期开启自动探测时使用，避免配置维度与模型不符导致运行时报错。
pub async fn probe_dimension(embedding: &dyn EmbeddingService) -> Result<usize> {
    let probe = embedding.embed("dimension probe", EmbedPriority::Bulk).await?;
    if probe.is_empty() {
        return Err(VrsError::embedding(
            "dimension probe returned an empty vector",
        ));
    }
    Ok(probe.len())
}
