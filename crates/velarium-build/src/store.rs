//! タグ → イメージ情報のキャッシュ
//!
//! ファイル版はマップ全体をメモリに持ち、更新のたびにJSONファイルを
//! 一時ファイル + rename で丸ごと書き換える。

use crate::error::Result;
use crate::model::ImageMetadata;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get(&self, tag: &str) -> Result<Option<ImageMetadata>>;

    async fn put(&self, tag: &str, metadata: ImageMetadata) -> Result<()>;

    /// `tag` のエントリを削除（存在しなければ何もしない）
    async fn delete(&self, tag: &str) -> Result<()>;
}

/// プロセス内ストア（再起動で消える）
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    entries: RwLock<HashMap<String, ImageMetadata>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn get(&self, tag: &str) -> Result<Option<ImageMetadata>> {
        Ok(self.entries.read().await.get(tag).cloned())
    }

    async fn put(&self, tag: &str, metadata: ImageMetadata) -> Result<()> {
        self.entries.write().await.insert(tag.to_string(), metadata);
        Ok(())
    }

    async fn delete(&self, tag: &str) -> Result<()> {
        self.entries.write().await.remove(tag);
        Ok(())
    }
}

/// JSONファイルストア: `{"<tag>": {"id": "<image id>"}}`
#[derive(Debug)]
pub struct FileMetadataStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, ImageMetadata>>,
}

impl FileMetadataStore {
    /// キャッシュファイルを読み込む（ファイルが無ければ空）
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let content = fs::read_to_string(&path).await?;
            serde_json::from_str(&content)?
        } else {
            tracing::debug!("Metadata file not found, starting empty: {}", path.display());
            HashMap::new()
        };

        tracing::debug!("Loaded {} cached images from {}", entries.len(), path.display());
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn save(&self, entries: &HashMap<String, ImageMetadata>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
                tracing::debug!("Created metadata directory: {}", parent.display());
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let content = serde_json::to_string_pretty(entries)?;
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &self.path).await?;

        tracing::debug!("Saved {} cached images", entries.len());
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for FileMetadataStore {
    async fn get(&self, tag: &str) -> Result<Option<ImageMetadata>> {
        Ok(self.entries.read().await.get(tag).cloned())
    }

    async fn put(&self, tag: &str, metadata: ImageMetadata) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(tag.to_string(), metadata);
        self.save(&entries).await
    }

    async fn delete(&self, tag: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        if entries.remove(tag).is_some() {
            self.save(&entries).await?;
        }
        Ok(())
    }
}
