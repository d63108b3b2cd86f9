//! # Vector Storage
//!
//! 多租户远端向量索引的存储适配层。
//!
//! ## 功能
//!
//! - 逻辑 id 到物理 id 的确定性映射
//! - 分区（workspace + namespace）隔离
//! - 批量嵌入与 upsert 协调
//! - 相似度阈值过滤
//! - 嵌入维度校验与可选纠偏

pub mod dimension;
pub mod identity;
pub mod remote;
pub mod store;

pub use dimension::{probe_dimension, reconcile, DimensionPolicy};
pub use identity::storage_id;
pub use remote::{
    DeleteRequest, HttpIndexClient, IndexDescription, MetadataFilter, RemoteIndexClient,
    ScoredVector, StoredVector,
};
pub use store::VectorStore;
