//! # 远端向量索引客户端
//!
//! 以能力接口描述远端索引的最小操作面：upsert / query / fetch / delete，
//! 所有调用都显式带分区参数。默认实现 [`HttpIndexClient`] 对接
//! Pinecone 风格的数据面 REST API。

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::IndexConfig;
use crate::error::{Result, VrsError};
use crate::types::{MetaValue, Metadata};

/// 写入远端索引的物理向量
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredVector {
    /// 物理 id（由 [`super::identity::storage_id`] 计算）
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Metadata,
}

/// 查询返回的带分命中
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredVector {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    pub metadata: Option<Metadata>,
}

/// 元数据等值过滤，多个条件取并（`$or`）
///
/// 支撑"删除某实体的全部关系边"这类不知道具体 id 的批量删除。
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    pub any_of: Vec<(String, MetaValue)>,
}

impl MetadataFilter {
    pub fn eq(key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        Self {
            any_of: vec![(key.into(), value.into())],
        }
    }

    pub fn or(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.any_of.push((key.into(), value.into()));
        self
    }

    /// 是否匹配一条元数据（内存实现与测试使用）
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.any_of
            .iter()
            .any(|(k, v)| metadata.get(k) == Some(v))
    }

    /// 转为远端索引的过滤表达式
    pub fn to_wire(&self) -> serde_json::Value {
        let terms: Vec<serde_json::Value> = self
            .any_of
            .iter()
            .map(|(k, v)| json!({ k: v }))
            .collect();
        match terms.len() {
            1 => terms.into_iter().next().unwrap_or_else(|| json!({})),
            _ => json!({ "$or": terms }),
        }
    }
}

/// 删除请求的三种形态
#[derive(Debug, Clone)]
pub enum DeleteRequest {
    /// 按物理 id 批量删除
    ByIds(Vec<String>),
    /// 按元数据过滤删除
    ByFilter(MetadataFilter),
    /// 清空整个分区
    All,
}

/// 索引概要（初始化时的连通性探测）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexDescription {
    #[serde(default)]
    pub dimension: Option<usize>,
    #[serde(default, rename = "totalVectorCount")]
    pub total_vector_count: Option<u64>,
}

/// 远端向量索引的能力接口
#[async_trait]
pub trait RemoteIndexClient: Send + Sync {
    /// 探测索引可达性并返回概要信息
    async fn describe(&self) -> Result<IndexDescription>;

    /// 批量写入（同 id 覆盖，upsert 语义）
    async fn upsert(&self, partition: &str, vectors: Vec<StoredVector>) -> Result<()>;

    /// 最近邻查询
    async fn query(
        &self,
        partition: &str,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<ScoredVector>>;

    /// 按物理 id 批量读取，缺失的 id 不出现在结果中
    async fn fetch(&self, partition: &str, ids: &[String]) -> Result<HashMap<String, StoredVector>>;

    /// 删除（按 id / 按过滤 / 清空分区）
    async fn delete(&self, partition: &str, request: DeleteRequest) -> Result<()>;
}

/// Pinecone 风格数据面 REST 客户端
pub struct HttpIndexClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ScoredVector>,
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    #[serde(default)]
    vectors: HashMap<String, StoredVector>,
}

impl HttpIndexClient {
    /// 使用配置创建客户端
    pub fn with_config(config: &IndexConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(VrsError::configuration(
                "VECTOR_INDEX_URL not set: remote index endpoint is required",
            ));
        }
        if config.api_key.is_empty() {
            return Err(VrsError::configuration(
                "VECTOR_INDEX_API_KEY not set: remote index credential is required",
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VrsError::connection(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VrsError::connection(format!("Index request to {} failed: {}", path, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(VrsError::connection(format!(
                "Index returned {} for {}: {}",
                status, path, text
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl RemoteIndexClient for HttpIndexClient {
    async fn describe(&self) -> Result<IndexDescription> {
        let response = self.post("/describe_index_stats", json!({})).await?;
        response
            .json::<IndexDescription>()
            .await
            .map_err(|e| VrsError::connection(format!("Failed to parse index stats: {}", e)))
    }

    async fn upsert(&self, partition: &str, vectors: Vec<StoredVector>) -> Result<()> {
        self.post(
            "/vectors/upsert",
            json!({ "vectors": vectors, "namespace": partition }),
        )
        .await?;
        Ok(())
    }

    async fn query(
        &self,
        partition: &str,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<ScoredVector>> {
        let response = self
            .post(
                "/query",
                json!({
                    "vector": vector,
                    "topK": top_k,
                    "includeMetadata": include_metadata,
                    "namespace": partition,
                }),
            )
            .await?;
        let result: QueryResponse = response
            .json()
            .await
            .map_err(|e| VrsError::connection(format!("Failed to parse query response: {}", e)))?;
        Ok(result.matches)
    }

    async fn fetch(&self, partition: &str, ids: &[String]) -> Result<HashMap<String, StoredVector>> {
        let mut params: Vec<(&str, &str)> = ids.iter().map(|id| ("ids", id.as_str())).collect();
        params.push(("namespace", partition));

        let response = self
            .client
            .get(format!("{}/vectors/fetch", self.base_url))
            .header("Api-Key", &self.api_key)
            .query(&params)
            .send()
            .await
            .map_err(|e| VrsError::connection(format!("Index fetch failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(VrsError::connection(format!(
                "Index returned {} for /vectors/fetch",
                status
            )));
        }

        let result: FetchResponse = response
            .json()
            .await
            .map_err(|e| VrsError::connection(format!("Failed to parse fetch response: {}", e)))?;
        Ok(result.vectors)
    }

    async fn delete(&self, partition: &str, request: DeleteRequest) -> Result<()> {
        let body = match request {
            DeleteRequest::ByIds(ids) => json!({ "ids": ids, "namespace": partition }),
            DeleteRequest::ByFilter(filter) => {
                json!({ "filter": filter.to_wire(), "namespace": partition })
            }
            DeleteRequest::All => json!({ "deleteAll": true, "namespace": partition }),
        };
        self.post("/vectors/delete", body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches() {
        let filter = MetadataFilter::eq("src_id", "alice").or("tgt_id", "alice");

        let mut edge = Metadata::new();
        edge.insert("src_id".to_string(), "bob".into());
        edge.insert("tgt_id".to_string(), "alice".into());
        assert!(filter.matches(&edge));

        let mut other = Metadata::new();
        other.insert("src_id".to_string(), "bob".into());
        other.insert("tgt_id".to_string(), "carol".into());
        assert!(!filter.matches(&other));
    }

    #[test]
    fn test_filter_wire_format() {
        let single = MetadataFilter::eq("doc_id", "d1");
        assert_eq!(single.to_wire(), serde_json::json!({"doc_id": "d1"}));

        let or = MetadataFilter::eq("src_id", "a").or("tgt_id", "a");
        assert_eq!(
            or.to_wire(),
            serde_json::json!({"$or": [{"src_id": "a"}, {"tgt_id": "a"}]})
        );
    }

    #[test]
    fn test_http_client_requires_config() {
        let config = IndexConfig {
            url: String::new(),
            api_key: "k".to_string(),
            timeout: std::time::Duration::from_secs(5),
        };
        assert!(HttpIndexClient::with_config(&config).is_err());
    }
}
