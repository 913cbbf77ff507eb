//! タグごとのビルド状態とログの履歴

use crate::error::{BuildError, Result};
use crate::model::{BuildLogEntry, BuildStatus, LogChunk};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// メモリ上のビルド履歴（タグごとに1件）
///
/// 同じタグで新しいビルドを始めると以前のエントリは置き換わる。
#[derive(Debug, Default)]
pub struct BuildHistory {
    entries: RwLock<HashMap<String, BuildLogEntry>>,
}

impl BuildHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// `tag` のビルド受付を記録
    pub async fn start(&self, tag: &str) {
        let entry = BuildLogEntry {
            tag: tag.to_string(),
            status: BuildStatus::Building,
            log: Some(Vec::new()),
        };
        self.entries.write().await.insert(tag.to_string(), entry);
    }

    /// `tag` のエントリを取得済みログとともに終了状態にする
    pub async fn finish(&self, tag: &str, status: BuildStatus, log: Vec<LogChunk>) {
        debug_assert!(status.is_terminal());

        let mut entries = self.entries.write().await;
        if let Some(previous) = entries.get(tag) {
            if previous.status.is_terminal() {
                tracing::warn!(tag, status = %previous.status, "Build entry already finished");
            }
        }

        entries.insert(
            tag.to_string(),
            BuildLogEntry {
                tag: tag.to_string(),
                status,
                log: Some(log),
            },
        );
    }

    pub async fn succeed(&self, tag: &str, log: Vec<LogChunk>) {
        self.finish(tag, BuildStatus::Success, log).await;
    }

    pub async fn fail(&self, tag: &str, log: Vec<LogChunk>) {
        self.finish(tag, BuildStatus::Error, log).await;
    }

    pub async fn get(&self, tag: &str) -> Result<BuildLogEntry> {
        self.entries
            .read()
            .await
            .get(tag)
            .cloned()
            .ok_or_else(|| BuildError::NotFound(format!("no build recorded for {}", tag)))
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_tag_is_not_found() {
        let history = BuildHistory::new();
        let err = history.get("missing").await.unwrap_err();
        assert!(matches!(err, BuildError::NotFound(_)));
        assert!(history.is_empty().await);
    }

    #[tokio::test]
    async fn test_building_then_success() {
        let history = BuildHistory::new();

        history.start("s:7").await;
        let entry = history.get("s:7").await.unwrap();
        assert_eq!(entry.status, BuildStatus::Building);
        assert_eq!(entry.log, Some(Vec::new()));

        history.succeed("s:7", vec![LogChunk::stream("ok")]).await;
        let entry = history.get("s:7").await.unwrap();
        assert_eq!(entry.status, BuildStatus::Success);
        assert_eq!(entry.log, Some(vec![LogChunk::stream("ok")]));
    }

    #[tokio::test]
    async fn test_rebuild_replaces_terminal_entry() {
        let history = BuildHistory::new();

        history.start("t").await;
        history.fail("t", vec![LogChunk::error("boom")]).await;
        assert_eq!(history.get("t").await.unwrap().status, BuildStatus::Error);

        history.start("t").await;
        let entry = history.get("t").await.unwrap();
        assert_eq!(entry.status, BuildStatus::Building);
        assert_eq!(entry.log, Some(Vec::new()));
        assert_eq!(history.len().await, 1);
    }
}
