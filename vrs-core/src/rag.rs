//! # RAG 编排层
//!
//! 把嵌入服务、对话模型和三个命名空间的向量存储（chunks / entities /
//! relationships）接到一起的薄编排层。文档解析（PDF/DOCX 抽取）在
//! 系统边界之外，这里只接受纯文本。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::info;

use crate::ai::chat::ChatModel;
use crate::ai::embedding::EmbeddingService;
use crate::config::VrsConfig;
use crate::error::Result;
use crate::types::{DropReport, SearchHit, VectorRecord};
use crate::vector::dimension::probe_dimension;
use crate::vector::remote::{MetadataFilter, RemoteIndexClient};
use crate::vector::store::{VectorStore, VectorStoreOptions};

/// 默认分块长度（字符）
pub const DEFAULT_CHUNK_SIZE: usize = 1200;

/// 默认分块重叠（字符）
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// 检索增强问答的系统提示
const ANSWER_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer the user's question \
using only the provided context. If the context does not contain the answer, say so.";

/// 问答结果：生成的回答加检索到的依据
#[derive(Debug)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<SearchHit>,
}

/// RAG 引擎
///
/// 一个实例对应一个 workspace，内部持有三个命名空间的存储。
pub struct RagEngine {
    workspace: String,
    chat: Arc<dyn ChatModel>,
    chunks: VectorStore,
    entities: VectorStore,
    relationships: VectorStore,
    chunk_size: usize,
    chunk_overlap: usize,
}

/// 文本切块：固定字符窗口加重叠
///
/// 按字符而不是字节切，避免切坏 UTF-8 边界。
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || size == 0 {
        return vec![];
    }
    let step = size.saturating_sub(overlap).max(1);

    let mut out = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        out.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    out
}

fn meta_fields(keys: &[&str]) -> HashSet<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

impl RagEngine {
    /// 构建引擎
    ///
    /// 启用维度自动探测时先发一次探测嵌入，用实际维度覆盖配置值，
    /// 避免模型与配置不符导致后续写入全部失败。
    pub async fn bootstrap(
        config: &VrsConfig,
        index: Arc<dyn RemoteIndexClient>,
        embedding: Arc<dyn EmbeddingService>,
        chat: Arc<dyn ChatModel>,
    ) -> Result<Self> {
        let mut dimension = config.embedding.dimension;
        if config.embedding.autodetect_dim {
            let detected = probe_dimension(embedding.as_ref()).await?;
            if detected != dimension {
                info!(
                    configured = dimension,
                    detected, "embedding dimension autodetect overrides configured value"
                );
                dimension = detected;
            }
        }

        let base = |namespace: &str, fields: HashSet<String>| VectorStoreOptions {
            workspace: config.workspace.clone(),
            namespace: namespace.to_string(),
            cosine_threshold: config.cosine_threshold,
            max_batch_size: config.embed_batch,
            embedding_dim: dimension,
            dim_policy: config.embedding.dim_policy,
            embed_model: config.embedding.model.clone(),
            meta_fields: fields,
        };

        let chunks = VectorStore::new(
            base("chunks", meta_fields(&["content", "doc_id", "chunk_index"])),
            Arc::clone(&index),
            Arc::clone(&embedding),
        )?;
        let entities = VectorStore::new(
            base("entities", meta_fields(&["entity_name", "content"])),
            Arc::clone(&index),
            Arc::clone(&embedding),
        )?;
        let relationships = VectorStore::new(
            base("relationships", meta_fields(&["src_id", "tgt_id", "content"])),
            Arc::clone(&index),
            Arc::clone(&embedding),
        )?;

        Ok(Self {
            workspace: config.workspace.clone(),
            chat,
            chunks,
            entities,
            relationships,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        })
    }

    /// 调整分块参数
    pub fn with_chunking(mut self, size: usize, overlap: usize) -> Self {
        self.chunk_size = size;
        self.chunk_overlap = overlap;
        self
    }

    /// 初始化全部底层存储（幂等）
    pub async fn initialize(&self) -> Result<()> {
        self.chunks.initialize().await?;
        self.entities.initialize().await?;
        self.relationships.initialize().await?;
        Ok(())
    }

    /// 摄取一篇文本文档，返回写入的分块数
    pub async fn insert(&self, doc_id: &str, text: &str) -> Result<usize> {
        let pieces = chunk_text(text, self.chunk_size, self.chunk_overlap);
        if pieces.is_empty() {
            return Ok(0);
        }

        let mut records = HashMap::with_capacity(pieces.len());
        for (i, piece) in pieces.into_iter().enumerate() {
            let record = VectorRecord::new(piece.clone())
                .with_meta("content", piece)
                .with_meta("doc_id", doc_id)
                .with_meta("chunk_index", i as i64);
            records.insert(format!("{}-{}", doc_id, i), record);
        }

        let count = records.len();
        self.chunks.upsert(records).await?;
        info!(
            "[{}] ingested document '{}' as {} chunks",
            self.workspace, doc_id, count
        );
        Ok(count)
    }

    /// 写入实体记录（键为实体名）
    pub async fn upsert_entities(&self, entities: HashMap<String, VectorRecord>) -> Result<()> {
        self.entities.upsert(entities).await
    }

    /// 写入关系记录（元数据需带 src_id / tgt_id）
    pub async fn upsert_relationships(
        &self,
        relationships: HashMap<String, VectorRecord>,
    ) -> Result<()> {
        self.relationships.upsert(relationships).await
    }

    /// 删除实体及触及它的全部关系边（尽力而为）
    pub async fn delete_entity(&self, entity_name: &str) {
        self.entities.delete_entity(entity_name).await;
        self.relationships.delete_entity_relation(entity_name).await;
    }

    /// 删除一篇文档的全部分块（尽力而为）
    pub async fn delete_document(&self, doc_id: &str) {
        self.chunks
            .delete_by_filter(MetadataFilter::eq("doc_id", doc_id))
            .await;
    }

    /// 纯检索：返回阈值之上的分块命中
    pub async fn search(&self, question: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        self.chunks.query(question, top_k).await
    }

    /// 检索增强问答
    pub async fn query(&self, question: &str, top_k: usize) -> Result<RagAnswer> {
        let sources = self.search(question, top_k).await?;

        let context: Vec<&str> = sources.iter().filter_map(SearchHit::content).collect();
        let prompt = if context.is_empty() {
            format!("Question: {}\n\n(No relevant context was found.)", question)
        } else {
            format!(
                "Context:\n{}\n\nQuestion: {}",
                context.join("\n---\n"),
                question
            )
        };

        let answer = self.chat.complete(Some(ANSWER_SYSTEM_PROMPT), &prompt).await?;
        Ok(RagAnswer { answer, sources })
    }

    /// 清空本 workspace 的全部命名空间
    ///
    /// 软失败：逐个分区返回报告，不中断其余分区。
    pub async fn drop_workspace(&self) -> Vec<(String, DropReport)> {
        let mut reports = Vec::with_capacity(3);
        for store in [&self.chunks, &self.entities, &self.relationships] {
            reports.push((store.namespace().to_string(), store.drop_data().await));
        }
        reports
    }

    pub fn chunks(&self) -> &VectorStore {
        &self.chunks
    }

    pub fn entities(&self) -> &VectorStore {
        &self.entities
    }

    pub fn relationships(&self) -> &VectorStore {
        &self.relationships
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_text_windows() {
        let text = "abcdefghij"; // 10 chars
        let chunks = chunk_text(text, 4, 1);
        // 步长 3：abcd, defg, ghij
        assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn test_chunk_text_short_input() {
        assert_eq!(chunk_text("ab", 10, 2), vec!["ab"]);
        assert!(chunk_text("", 10, 2).is_empty());
        assert!(chunk_text("ab", 0, 0).is_empty());
    }

    #[test]
    fn test_chunk_text_multibyte() {
        // 多字节字符按字符窗口切，不会切坏 UTF-8
        let text = "你好世界你好世界";
        let chunks = chunk_text(text, 3, 1);
        assert_eq!(chunks[0], "你好世");
        for c in &chunks {
            assert!(c.chars().count() <= 3);
        }
    }

    #[test]
    fn test_chunk_text_overlap() {
        let chunks = chunk_text("abcdef", 4, 2);
        assert_eq!(chunks, vec!["abcd", "cdef"]);
    }
}
