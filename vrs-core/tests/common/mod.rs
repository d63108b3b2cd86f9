//! 集成测试共享的内存实现：确定性嵌入 + 内存向量索引。

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use vrs_core::ai::embedding::cosine_similarity;
use vrs_core::vector::remote::IndexDescription;
use vrs_core::{
    ChatModel, DeleteRequest, EmbedPriority, EmbeddingService, RemoteIndexClient, Result,
    ScoredVector, StoredVector, VrsError,
};

/// 模拟 embedding service：按文本哈希生成确定性归一化向量
pub struct MockEmbeddingService {
    pub dim: usize,
}

impl MockEmbeddingService {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dim];
        let hash = text
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        for (i, v) in vec.iter_mut().enumerate() {
            *v = ((hash.wrapping_add(i as u64) % 1000) as f32 / 1000.0) * 2.0 - 1.0;
        }
        // 归一化
        let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vec {
                *x /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl EmbeddingService for MockEmbeddingService {
    async fn embed(&self, text: &str, _priority: EmbedPriority) -> Result<Vec<f32>> {
        Ok(self.vector_for(text))
    }

    async fn batch_embed(&self, texts: &[&str], _priority: EmbedPriority) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

/// 内存向量索引：分区到 (物理 id → 向量) 的映射，真实余弦打分
#[derive(Default)]
pub struct MemoryIndexClient {
    partitions: Mutex<HashMap<String, HashMap<String, StoredVector>>>,
}

impl MemoryIndexClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 某分区当前的向量数
    pub fn partition_len(&self, partition: &str) -> usize {
        self.partitions
            .lock()
            .unwrap()
            .get(partition)
            .map(|p| p.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RemoteIndexClient for MemoryIndexClient {
    async fn describe(&self) -> Result<IndexDescription> {
        Ok(IndexDescription::default())
    }

    async fn upsert(&self, partition: &str, vectors: Vec<StoredVector>) -> Result<()> {
        let mut partitions = self.partitions.lock().unwrap();
        let part = partitions.entry(partition.to_string()).or_default();
        for v in vectors {
            part.insert(v.id.clone(), v);
        }
        Ok(())
    }

    async fn query(
        &self,
        partition: &str,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<ScoredVector>> {
        let partitions = self.partitions.lock().unwrap();
        let mut scored: Vec<ScoredVector> = partitions
            .get(partition)
            .map(|part| {
                part.values()
                    .map(|v| ScoredVector {
                        id: v.id.clone(),
                        score: cosine_similarity(vector, &v.values),
                        metadata: include_metadata.then(|| v.metadata.clone()),
                    })
                    .collect()
            })
            .unwrap_or_default();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn fetch(&self, partition: &str, ids: &[String]) -> Result<HashMap<String, StoredVector>> {
        let partitions = self.partitions.lock().unwrap();
        let mut out = HashMap::new();
        if let Some(part) = partitions.get(partition) {
            for id in ids {
                if let Some(v) = part.get(id) {
                    out.insert(id.clone(), v.clone());
                }
            }
        }
        Ok(out)
    }

    async fn delete(&self, partition: &str, request: DeleteRequest) -> Result<()> {
        let mut partitions = self.partitions.lock().unwrap();
        let Some(part) = partitions.get_mut(partition) else {
            return Ok(());
        };
        match request {
            DeleteRequest::ByIds(ids) => {
                for id in ids {
                    part.remove(&id);
                }
            }
            DeleteRequest::ByFilter(filter) => {
                part.retain(|_, v| !filter.matches(&v.metadata));
            }
            DeleteRequest::All => {
                part.clear();
            }
        }
        Ok(())
    }
}

/// 所有调用都失败的索引，验证尽力而为路径不向上抛
pub struct FailingIndexClient;

#[async_trait]
impl RemoteIndexClient for FailingIndexClient {
    async fn describe(&self) -> Result<IndexDescription> {
        Err(VrsError::connection("index down"))
    }

    async fn upsert(&self, _: &str, _: Vec<StoredVector>) -> Result<()> {
        Err(VrsError::connection("index down"))
    }

    async fn query(&self, _: &str, _: &[f32], _: usize, _: bool) -> Result<Vec<ScoredVector>> {
        Err(VrsError::connection("index down"))
    }

    async fn fetch(&self, _: &str, _: &[String]) -> Result<HashMap<String, StoredVector>> {
        Err(VrsError::connection("index down"))
    }

    async fn delete(&self, _: &str, _: DeleteRequest) -> Result<()> {
        Err(VrsError::connection("index down"))
    }
}

/// 把提示原样返回的模拟对话模型
pub struct EchoChatModel;

#[async_trait]
impl ChatModel for EchoChatModel {
    async fn complete(&self, _system: Option<&str>, prompt: &str) -> Result<String> {
        Ok(format!("ANSWER: {}", prompt))
    }

    fn name(&self) -> &str {
        "echo"
    }
}
