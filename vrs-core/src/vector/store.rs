//! # 向量存储适配器
//!
//! 在一个远端索引分区上提供逻辑记录的 CRUD / 查询契约。
//!
//! ## 租户模型
//!
//! 每个实例绑定一个 `(workspace, namespace)`，物理分区名为
//! `<workspace>_<namespace>`（workspace 为空时退化为裸 namespace）。
//! 所有操作只触达自己的分区，逻辑 id 冲突不会跨租户串数据。
//!
//! ## 错误语义
//!
//! upsert / query 失败向上抛（调用方同步依赖其结果）；
//! delete / fetch / drop 族降级为日志加默认值，属于尽力而为路径。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::future;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::ai::embedding::{EmbedPriority, EmbeddingService};
use crate::error::{Result, VrsError};
use crate::types::{DropReport, MetaValue, Metadata, VectorRecord, CREATED_AT_FIELD, ID_FIELD};
use crate::vector::dimension::{reconcile, DimensionPolicy};
use crate::vector::identity::storage_id;
use crate::vector::remote::{DeleteRequest, MetadataFilter, RemoteIndexClient, StoredVector};
use crate::SearchHit;

/// 构造 [`VectorStore`] 的参数
#[derive(Debug, Clone)]
pub struct VectorStoreOptions {
    pub workspace: String,
    pub namespace: String,
    /// 查询命中保留的最小相似度
    pub cosine_threshold: f32,
    /// 单次嵌入调用的最大文本数
    pub max_batch_size: usize,
    /// 索引固定维度
    pub embedding_dim: usize,
    pub dim_policy: DimensionPolicy,
    /// 嵌入模型名（维度报错时的诊断信息）
    pub embed_model: String,
    /// 写入时保留的元数据键（允许列表，之外的键静默丢弃）
    pub meta_fields: HashSet<String>,
}

/// 向量存储适配器主结构
pub struct VectorStore {
    workspace: String,
    namespace: String,
    partition: String,
    cosine_threshold: f32,
    max_batch_size: usize,
    embedding_dim: usize,
    dim_policy: DimensionPolicy,
    embed_model: String,
    meta_fields: HashSet<String>,
    index: Arc<dyn RemoteIndexClient>,
    embedding: Arc<dyn EmbeddingService>,
    /// 初始化一次性保护：并发首调用只有一个真正探测连接
    initialized: Mutex<bool>,
    /// drop 专用的粗粒度锁，破坏性操作不与初始化交错
    storage_lock: Mutex<()>,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("workspace", &self.workspace)
            .field("namespace", &self.namespace)
            .field("partition", &self.partition)
            .field("cosine_threshold", &self.cosine_threshold)
            .finish_non_exhaustive()
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl VectorStore {
    /// 创建适配器实例（不触网，连接在 [`initialize`](Self::initialize) 时建立）
    pub fn new(
        options: VectorStoreOptions,
        index: Arc<dyn RemoteIndexClient>,
        embedding: Arc<dyn EmbeddingService>,
    ) -> Result<Self> {
        if options.namespace.is_empty() {
            return Err(VrsError::configuration("namespace must not be empty"));
        }
        if !options.cosine_threshold.is_finite() {
            return Err(VrsError::configuration(
                "cosine_threshold must be a finite float",
            ));
        }
        if options.max_batch_size == 0 {
            return Err(VrsError::configuration("max_batch_size must be positive"));
        }

        // 分区命名由 (workspace, namespace) 确定性导出，
        // 重新打开同一逻辑存储总是落到同一分区
        let partition = if options.workspace.is_empty() {
            options.namespace.clone()
        } else {
            format!("{}_{}", options.workspace, options.namespace)
        };

        Ok(Self {
            workspace: options.workspace,
            namespace: options.namespace,
            partition,
            cosine_threshold: options.cosine_threshold,
            max_batch_size: options.max_batch_size,
            embedding_dim: options.embedding_dim,
            dim_policy: options.dim_policy,
            embed_model: options.embed_model,
            meta_fields: options.meta_fields,
            index,
            embedding,
            initialized: Mutex::new(false),
            storage_lock: Mutex::new(()),
        })
    }

    /// 初始化连接（幂等，可并发调用）
    ///
    /// 失败不污染状态，调用方可以重试。
    pub async fn initialize(&self) -> Result<()> {
        let mut initialized = self.initialized.lock().await;
        if *initialized {
            return Ok(());
        }

        let stats = self.index.describe().await.map_err(|e| {
            error!(
                "[{}] Failed to initialize index partition '{}': {}",
                self.workspace, self.partition, e
            );
            VrsError::connection(format!("Remote index unreachable: {}", e))
        })?;

        if let Some(dim) = stats.dimension {
            if dim != self.embedding_dim {
                tracing::warn!(
                    "[{}] index reports dimension {} but configured dimension is {}",
                    self.workspace,
                    dim,
                    self.embedding_dim
                );
            }
        }

        *initialized = true;
        info!(
            "[{}] index partition '{}' initialized",
            self.workspace, self.partition
        );
        Ok(())
    }

    /// 批量写入逻辑记录
    ///
    /// 空输入直接返回。内容按 `max_batch_size` 切批并发嵌入，
    /// 结果按输入顺序拼接后与记录一一对应。同 id 重写会刷新
    /// `created_at`。
    pub async fn upsert(&self, records: HashMap<String, VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let created_at = now_secs();

        let entries: Vec<(String, VectorRecord)> = records.into_iter().collect();
        let contents: Vec<&str> = entries.iter().map(|(_, r)| r.content.as_str()).collect();

        // 批内并发，批数很小，不做额外限流；任一批失败整体失败，
        // 部分嵌入结果绝不写入
        let tasks = contents
            .chunks(self.max_batch_size)
            .map(|batch| self.embedding.batch_embed(batch, EmbedPriority::Bulk));
        let batched = future::try_join_all(tasks).await?;
        let embeddings: Vec<Vec<f32>> = batched.into_iter().flatten().collect();

        if embeddings.len() != entries.len() {
            return Err(VrsError::embedding(format!(
                "provider returned {} embeddings for {} texts",
                embeddings.len(),
                entries.len()
            )));
        }
        let embeddings = reconcile(
            embeddings,
            self.embedding_dim,
            &self.embed_model,
            self.dim_policy,
        )?;

        let mut vectors = Vec::with_capacity(entries.len());
        for ((logical_id, record), values) in entries.iter().zip(embeddings) {
            let mut metadata: Metadata = record
                .metadata
                .iter()
                .filter(|(k, _)| self.meta_fields.contains(k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            metadata.insert(ID_FIELD.to_string(), MetaValue::Str(logical_id.clone()));
            metadata.insert(CREATED_AT_FIELD.to_string(), MetaValue::Int(created_at));

            vectors.push(StoredVector {
                id: storage_id(logical_id, &self.workspace),
                values,
                metadata,
            });
        }

        self.index
            .upsert(&self.partition, vectors)
            .await
            .map_err(|e| {
                error!(
                    "[{}] upsert error in {}: {}",
                    self.workspace, self.namespace, e
                );
                VrsError::upsert(e.to_string())
            })
    }

    /// 文本查询：先嵌入再走向量查询
    pub async fn query(&self, text: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        // 交互路径单条嵌入，优先级高于批量摄取
        let vector = self
            .embedding
            .embed(text, EmbedPriority::Interactive)
            .await?;
        let mut reconciled = reconcile(
            vec![vector],
            self.embedding_dim,
            &self.embed_model,
            self.dim_policy,
        )?;
        let vector = reconciled
            .pop()
            .ok_or_else(|| VrsError::embedding("empty embedding result"))?;
        self.query_with_vector(&vector, top_k).await
    }

    /// 向量查询：远端取 top_k 候选，客户端做阈值硬过滤
    pub async fn query_with_vector(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let matches = self
            .index
            .query(&self.partition, vector, top_k, true)
            .await
            .map_err(|e| {
                error!(
                    "[{}] query error in {}: {}",
                    self.workspace, self.namespace, e
                );
                VrsError::query(e.to_string())
            })?;

        Ok(matches
            .into_iter()
            .filter(|m| m.score >= self.cosine_threshold)
            .map(|m| {
                let metadata = m.metadata.unwrap_or_default();
                // 老数据可能没有 created_at，向后兼容为 None
                let created_at = metadata.get(CREATED_AT_FIELD).and_then(MetaValue::as_int);
                SearchHit {
                    metadata,
                    distance: m.score,
                    created_at,
                }
            })
            .collect())
    }

    /// 按逻辑 id 批量删除（尽力而为，失败只记日志）
    pub async fn delete(&self, ids: &[String]) {
        if ids.is_empty() {
            return;
        }
        let storage_ids: Vec<String> = ids
            .iter()
            .map(|id| storage_id(id, &self.workspace))
            .collect();
        if let Err(e) = self
            .index
            .delete(&self.partition, DeleteRequest::ByIds(storage_ids))
            .await
        {
            error!(
                "[{}] delete error in {}: {}",
                self.workspace, self.namespace, e
            );
        }
    }

    /// 删除单个实体（尽力而为）
    pub async fn delete_entity(&self, entity_name: &str) {
        let sid = storage_id(entity_name, &self.workspace);
        if let Err(e) = self
            .index
            .delete(&self.partition, DeleteRequest::ByIds(vec![sid]))
            .await
        {
            error!(
                "[{}] delete_entity error in {}: {}",
                self.workspace, self.namespace, e
            );
        }
    }

    /// 删除触及某实体的全部关系边（按 src_id / tgt_id 过滤，尽力而为）
    pub async fn delete_entity_relation(&self, entity_name: &str) {
        let filter = MetadataFilter::eq("src_id", entity_name).or("tgt_id", entity_name);
        self.delete_by_filter(filter).await;
    }

    /// 按元数据过滤删除（尽力而为）
    pub async fn delete_by_filter(&self, filter: MetadataFilter) {
        if let Err(e) = self
            .index
            .delete(&self.partition, DeleteRequest::ByFilter(filter))
            .await
        {
            error!(
                "[{}] filtered delete error in {}: {}",
                self.workspace, self.namespace, e
            );
        }
    }

    /// 按逻辑 id 读取元数据；不存在返回 None，传输失败降级为 None
    pub async fn get_by_id(&self, id: &str) -> Option<Metadata> {
        let sid = storage_id(id, &self.workspace);
        match self.index.fetch(&self.partition, &[sid.clone()]).await {
            Ok(mut vectors) => vectors.remove(&sid).map(|v| v.metadata),
            Err(e) => {
                error!(
                    "[{}] get_by_id error in {}: {}",
                    self.workspace, self.namespace, e
                );
                None
            }
        }
    }

    /// 批量读取，结果与输入位置对应，缺失的 id 以 None 占位
    pub async fn get_by_ids(&self, ids: &[String]) -> Vec<Option<Metadata>> {
        if ids.is_empty() {
            return vec![];
        }
        let storage_ids: Vec<String> = ids
            .iter()
            .map(|id| storage_id(id, &self.workspace))
            .collect();
        match self.index.fetch(&self.partition, &storage_ids).await {
            Ok(mut vectors) => storage_ids
                .iter()
                .map(|sid| vectors.remove(sid).map(|v| v.metadata))
                .collect(),
            Err(e) => {
                error!(
                    "[{}] get_by_ids error in {}: {}",
                    self.workspace, self.namespace, e
                );
                vec![]
            }
        }
    }

    /// 批量读取原始向量值，键为原始逻辑 id，缺失的 id 不出现在结果中
    pub async fn get_vectors_by_ids(&self, ids: &[String]) -> HashMap<String, Vec<f32>> {
        if ids.is_empty() {
            return HashMap::new();
        }
        let storage_ids: Vec<String> = ids
            .iter()
            .map(|id| storage_id(id, &self.workspace))
            .collect();
        match self.index.fetch(&self.partition, &storage_ids).await {
            Ok(mut vectors) => ids
                .iter()
                .zip(storage_ids.iter())
                .filter_map(|(id, sid)| vectors.remove(sid).map(|v| (id.clone(), v.values)))
                .collect(),
            Err(e) => {
                error!(
                    "[{}] get_vectors_by_ids error in {}: {}",
                    self.workspace, self.namespace, e
                );
                HashMap::new()
            }
        }
    }

    /// 清空分区内全部向量
    ///
    /// 软失败：返回结构化报告而不是异常，管理流程据此提示用户。
    pub async fn drop_data(&self) -> DropReport {
        let _guard = self.storage_lock.lock().await;
        // 占住初始化锁，保证不与进行中的 initialize 交错
        let _init = self.initialized.lock().await;

        match self.index.delete(&self.partition, DeleteRequest::All).await {
            Ok(()) => {
                info!(
                    "[{}] dropped all data in partition {}",
                    self.workspace, self.partition
                );
                DropReport::success("data dropped")
            }
            Err(e) => {
                error!(
                    "[{}] error dropping partition {}: {}",
                    self.workspace, self.partition, e
                );
                DropReport::error(e.to_string())
            }
        }
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// 物理分区名
    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn cosine_threshold(&self) -> f32 {
        self.cosine_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NoopIndex;

    #[async_trait]
    impl RemoteIndexClient for NoopIndex {
        async fn describe(&self) -> Result<crate::vector::remote::IndexDescription> {
            Ok(Default::default())
        }
        async fn upsert(&self, _: &str, _: Vec<StoredVector>) -> Result<()> {
            Ok(())
        }
        async fn query(
            &self,
            _: &str,
            _: &[f32],
            _: usize,
            _: bool,
        ) -> Result<Vec<crate::vector::remote::ScoredVector>> {
            Ok(vec![])
        }
        async fn fetch(&self, _: &str, _: &[String]) -> Result<HashMap<String, StoredVector>> {
            Ok(HashMap::new())
        }
        async fn delete(&self, _: &str, _: DeleteRequest) -> Result<()> {
            Ok(())
        }
    }

    struct NoopEmbedding;

    #[async_trait]
    impl EmbeddingService for NoopEmbedding {
        async fn embed(&self, _: &str, _: EmbedPriority) -> Result<Vec<f32>> {
            Ok(vec![0.0; 4])
        }
        async fn batch_embed(&self, texts: &[&str], _: EmbedPriority) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0; 4]).collect())
        }
        fn dimension(&self) -> usize {
            4
        }
    }

    fn options(workspace: &str, namespace: &str) -> VectorStoreOptions {
        VectorStoreOptions {
            workspace: workspace.to_string(),
            namespace: namespace.to_string(),
            cosine_threshold: 0.2,
            max_batch_size: 16,
            embedding_dim: 4,
            dim_policy: DimensionPolicy::Strict,
            embed_model: "mock".to_string(),
            meta_fields: HashSet::new(),
        }
    }

    fn store(workspace: &str, namespace: &str) -> VectorStore {
        VectorStore::new(
            options(workspace, namespace),
            Arc::new(NoopIndex),
            Arc::new(NoopEmbedding),
        )
        .unwrap()
    }

    #[test]
    fn test_partition_naming() {
        assert_eq!(store("hire", "chunks").partition(), "hire_chunks");
        // workspace 为空时退化为裸 namespace
        assert_eq!(store("", "chunks").partition(), "chunks");
    }

    #[test]
    fn test_new_rejects_invalid_options() {
        let mut opts = options("w", "");
        assert!(VectorStore::new(opts.clone(), Arc::new(NoopIndex), Arc::new(NoopEmbedding)).is_err());

        opts.namespace = "chunks".to_string();
        opts.cosine_threshold = f32::NAN;
        assert!(VectorStore::new(opts.clone(), Arc::new(NoopIndex), Arc::new(NoopEmbedding)).is_err());

        opts.cosine_threshold = 0.2;
        opts.max_batch_size = 0;
        assert!(VectorStore::new(opts, Arc::new(NoopIndex), Arc::new(NoopEmbedding)).is_err());
    }

    #[tokio::test]
    async fn test_initialize_idempotent() {
        let store = store("w", "chunks");
        store.initialize().await.unwrap();
        store.initialize().await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_upsert_and_delete_are_noops() {
        let store = store("w", "chunks");
        store.upsert(HashMap::new()).await.unwrap();
        store.delete(&[]).await;
        assert!(store.get_by_ids(&[]).await.is_empty());
        assert!(store.get_vectors_by_ids(&[]).await.is_empty());
    }
}
