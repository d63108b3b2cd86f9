//! # 存储 id 映射
//!
//! 逻辑 id 到远端索引物理主键的纯函数映射。upsert 与查询两侧各自重算，
//! 不需要单独的 id 翻译表。

use sha2::{Digest, Sha256};

/// 计算逻辑 id 在远端索引中的物理 id
///
/// workspace 作为前缀盐参与映射：同一逻辑 id 在不同 workspace 下
/// 得到不同的物理 id，天然避免跨租户覆盖。
pub fn storage_id(logical_id: &str, workspace: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(logical_id.as_bytes());
    format!("{}{}", workspace, hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_id_deterministic() {
        let a = storage_id("chunk-1", "hire");
        let b = storage_id("chunk-1", "hire");
        assert_eq!(a, b);
        assert!(a.starts_with("hire"));
    }

    #[test]
    fn test_storage_id_workspace_salt() {
        // 相同逻辑 id 在不同 workspace 下映射到不同物理 id
        let a = storage_id("chunk-1", "w1");
        let b = storage_id("chunk-1", "w2");
        assert_ne!(a, b);
    }

    #[test]
    fn test_storage_id_empty_workspace() {
        let id = storage_id("chunk-1", "");
        // 无 workspace 时就是裸哈希（64 位十六进制）
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_storage_id_distinct_inputs() {
        assert_ne!(storage_id("a", "w"), storage_id("b", "w"));
    }
}
