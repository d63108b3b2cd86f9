//! # 配置加载
//!
//! 从环境变量加载运行配置。缺失必填项在启动时报
//! [`VrsError::Configuration`]，绝不拖到运行时才失败。
//!
//! ## 变量优先级
//!
//! API key / base url 按链式回退解析：
//! `EMBED_API_KEY` → `CHAT_API_KEY` → `OPENAI_API_KEY` → `LLM_BINDING_API_KEY`。

use std::env;
use std::time::Duration;

use crate::error::{Result, VrsError};
use crate::vector::dimension::DimensionPolicy;

/// 默认嵌入批大小
pub const DEFAULT_EMBED_BATCH: usize = 16;

/// 默认嵌入维度 (text-embedding-3-large)
pub const DEFAULT_EMBED_DIM: usize = 3072;

/// 默认请求超时（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// 远端向量索引连接配置
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// 索引数据面端点
    pub url: String,
    /// 访问凭证
    pub api_key: String,
    /// 单次请求超时
    pub timeout: Duration,
}

/// 嵌入服务配置
#[derive(Debug, Clone)]
pub struct EmbedConfig {
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    /// 索引的固定维度，嵌入输出必须与之一致
    pub dimension: usize,
    /// 维度不一致时的处理策略
    pub dim_policy: DimensionPolicy,
    /// 启动时是否用一次探测调用覆盖配置维度
    pub autodetect_dim: bool,
    /// 是否对输出做 L2 归一化
    pub normalize: bool,
}

/// 对话模型配置
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub model: String,
    pub api_key: String,
    pub base_url: String,
}

/// VRS 运行配置
#[derive(Debug, Clone)]
pub struct VrsConfig {
    /// 租户顶层标识
    pub workspace: String,
    /// 查询命中保留的最小相似度
    pub cosine_threshold: f32,
    /// 单次嵌入调用的最大文本数
    pub embed_batch: usize,
    pub index: IndexConfig,
    pub embedding: EmbedConfig,
    pub chat: ChatConfig,
}

fn env_any(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| env::var(k).ok())
        .find(|v| !v.is_empty())
}

fn env_required(key: &str, hint: &str) -> Result<String> {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| VrsError::configuration(format!("{key} not set: {hint}")))
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

impl VrsConfig {
    /// 从环境变量加载完整配置
    pub fn from_env() -> Result<Self> {
        let url = env_required(
            "VECTOR_INDEX_URL",
            "set it to the remote vector index data-plane endpoint",
        )?;
        let index_key = env_required(
            "VECTOR_INDEX_API_KEY",
            "set it to the remote vector index credential",
        )?;
        let threshold = env_required(
            "COSINE_THRESHOLD",
            "set the minimum similarity score for query matches, e.g. 0.2",
        )?;
        let cosine_threshold: f32 = threshold.parse().map_err(|_| {
            VrsError::configuration(format!(
                "COSINE_THRESHOLD must be a float, got '{threshold}'"
            ))
        })?;

        let embed_api_key = env_any(&[
            "EMBED_API_KEY",
            "CHAT_API_KEY",
            "OPENAI_API_KEY",
            "LLM_BINDING_API_KEY",
        ])
        .ok_or_else(|| {
            VrsError::configuration(
                "Missing API key: set EMBED_API_KEY, OPENAI_API_KEY or LLM_BINDING_API_KEY",
            )
        })?;
        let chat_api_key = env_any(&[
            "CHAT_API_KEY",
            "OPENAI_API_KEY",
            "LLM_BINDING_API_KEY",
        ])
        .unwrap_or_else(|| embed_api_key.clone());

        let chat_base_url = env_any(&["CHAT_BASE_URL", "OPENAI_BASE_URL", "LLM_BINDING_HOST"])
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let embed_base_url =
            env_any(&["EMBED_BASE_URL"]).unwrap_or_else(|| chat_base_url.clone());

        let embed_batch = match env::var("EMBED_BATCH_NUM") {
            Ok(v) => v.parse().map_err(|_| {
                VrsError::configuration(format!("EMBED_BATCH_NUM must be an integer, got '{v}'"))
            })?,
            Err(_) => DEFAULT_EMBED_BATCH,
        };
        let dimension = match env::var("EMBED_DIM") {
            Ok(v) => v.parse().map_err(|_| {
                VrsError::configuration(format!("EMBED_DIM must be an integer, got '{v}'"))
            })?,
            Err(_) => DEFAULT_EMBED_DIM,
        };

        let dim_policy = if env_flag("EMBED_DIM_COERCE") {
            DimensionPolicy::Coerce
        } else {
            DimensionPolicy::Strict
        };

        let timeout_secs = match env::var("REQUEST_TIMEOUT_SECS") {
            Ok(v) => v.parse().map_err(|_| {
                VrsError::configuration(format!(
                    "REQUEST_TIMEOUT_SECS must be an integer, got '{v}'"
                ))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            workspace: env::var("WORKSPACE").unwrap_or_default(),
            cosine_threshold,
            embed_batch,
            index: IndexConfig {
                url,
                api_key: index_key,
                timeout: Duration::from_secs(timeout_secs),
            },
            embedding: EmbedConfig {
                model: env::var("EMBED_MODEL")
                    .unwrap_or_else(|_| "text-embedding-3-large".to_string()),
                api_key: embed_api_key,
                base_url: embed_base_url,
                dimension,
                dim_policy,
                autodetect_dim: env_flag("EMBED_DIM_AUTODETECT"),
                normalize: true,
            },
            chat: ChatConfig {
                model: env::var("CHAT_MODEL").unwrap_or_else(|_| "qwen3-vl-plus".to_string()),
                api_key: chat_api_key,
                base_url: chat_base_url,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 环境变量是进程级共享状态，相关断言集中在一个串行测试里
    #[test]
    fn test_from_env() {
        let vars = [
            ("VECTOR_INDEX_URL", "https://index.example.com"),
            ("VECTOR_INDEX_API_KEY", "test-key"),
            ("COSINE_THRESHOLD", "0.2"),
            ("OPENAI_API_KEY", "sk-test"),
            ("WORKSPACE", "hire"),
        ];
        for (k, v) in vars {
            env::set_var(k, v);
        }
        env::remove_var("EMBED_DIM");
        env::remove_var("EMBED_DIM_COERCE");

        let config = VrsConfig::from_env().unwrap();
        assert_eq!(config.workspace, "hire");
        assert_eq!(config.cosine_threshold, 0.2);
        assert_eq!(config.embed_batch, DEFAULT_EMBED_BATCH);
        assert_eq!(config.embedding.dimension, DEFAULT_EMBED_DIM);
        assert_eq!(config.embedding.dim_policy, DimensionPolicy::Strict);
        // 嵌入 key 回退到 OPENAI_API_KEY
        assert_eq!(config.embedding.api_key, "sk-test");

        // 必填项缺失要给出可操作的提示
        env::remove_var("COSINE_THRESHOLD");
        let err = VrsConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("COSINE_THRESHOLD"));
        env::set_var("COSINE_THRESHOLD", "not-a-float");
        let err = VrsConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("must be a float"));

        for (k, _) in vars {
            env::remove_var(k);
        }
    }
}
