//! # VRS Core Library
//!
//! Core library for VRS (Vector Retrieval Store).
//!
//! This library provides a uniform CRUD/query contract over a namespaced,
//! multi-tenant remote vector index, plus a thin orchestration layer that
//! wires embeddings, a language model and text ingestion into that store.
//!
//! ## Architecture
//!
//! - **Vector**: storage adapter, identity mapping, dimension reconciliation,
//!   remote index client
//! - **Ai**: embedding service and chat model clients (OpenAI-compatible)
//! - **Rag**: thin orchestration over the chunks / entities / relationships
//!   namespaces of one workspace
//! - **Config**: env-driven configuration with startup-time validation
//!
//! ## Tenancy
//!
//! Many logical workspaces share one physical index. Every operation is
//! scoped to exactly one partition derived from `(workspace, namespace)`;
//! identical logical ids never collide across tenants because the physical
//! id is salted with the workspace.

pub mod ai;
pub mod config;
pub mod error;
pub mod rag;
pub mod types;
pub mod vector;

pub use ai::{ChatModel, EmbedPriority, EmbeddingService, OpenAIChatService, OpenAIEmbeddingService};
pub use config::VrsConfig;
pub use error::{Result, VrsError};
pub use rag::{RagAnswer, RagEngine};
pub use types::{DropReport, DropStatus, MetaValue, Metadata, SearchHit, VectorRecord};
pub use vector::{
    storage_id, DeleteRequest, DimensionPolicy, HttpIndexClient, MetadataFilter,
    RemoteIndexClient, ScoredVector, StoredVector, VectorStore,
};
pub use vector::store::VectorStoreOptions;
