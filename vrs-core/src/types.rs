//! # 核心数据类型
//!
//! 逻辑记录、元数据标量、查询命中结果等跨模块共享的类型。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 元数据中保存逻辑 id 的字段名
pub const ID_FIELD: &str = "id";

/// 元数据中保存写入时间的字段名
pub const CREATED_AT_FIELD: &str = "created_at";

/// 元数据标量值
///
/// 远端索引的 metadata 只接受标量，不接受嵌套结构。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetaValue {
    /// 以整数形式读取（用于 created_at 等时间戳字段）
    pub fn as_int(&self) -> Option<i64> {
        match self {
            MetaValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// 以字符串形式读取
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Str(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::Str(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Int(v)
    }
}

/// 元数据：字符串键到标量值的映射
pub type Metadata = HashMap<String, MetaValue>;

/// 逻辑记录（上层以逻辑 id 为键提交）
#[derive(Debug, Clone)]
pub struct VectorRecord {
    /// 待向量化的文本内容
    pub content: String,
    /// 调用方元数据，写入时按允许列表过滤
    pub metadata: Metadata,
}

impl VectorRecord {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// 查询命中结果
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// 存储时写入的元数据（含逻辑 id）
    pub metadata: Metadata,
    /// 原始相似度分数
    pub distance: f32,
    /// 写入时间（旧数据可能缺失）
    pub created_at: Option<i64>,
}

impl SearchHit {
    /// 命中的逻辑 id
    pub fn id(&self) -> Option<&str> {
        self.metadata.get(ID_FIELD).and_then(MetaValue::as_str)
    }

    /// 命中的内容字段
    pub fn content(&self) -> Option<&str> {
        self.metadata.get("content").and_then(MetaValue::as_str)
    }
}

/// drop 操作状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropStatus {
    Success,
    Error,
}

/// drop 操作的软失败报告（不抛异常，供管理流程检查）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropReport {
    pub status: DropStatus,
    pub message: String,
}

impl DropReport {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: DropStatus::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: DropStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DropStatus::Success
    }
}
