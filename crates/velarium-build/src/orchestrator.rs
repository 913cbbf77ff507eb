//! ビルドの統括処理
//!
//! キャッシュ確認からコンテキスト作成、エンジンでのビルド、結果の
//! キャッシュと履歴の記録までを扱う。

use crate::context::ContextBuilder;
use crate::engine::ImageEngine;
use crate::error::{BuildError, Result};
use crate::fetcher::{ContentFetch, ContentSource};
use crate::history::BuildHistory;
use crate::labels;
use crate::lock::TagLocks;
use crate::model::{
    BuildLogEntry, BuildOutcome, BuildRequest, ImageListingEntry, ImageMetadata, LogChunk,
};
use crate::store::MetadataStore;
use crate::template::render_dockerfile;
use futures_util::stream::StreamExt;
use std::sync::Arc;

pub struct BuildOrchestrator {
    engine: Arc<dyn ImageEngine>,
    fetcher: Arc<dyn ContentFetch>,
    store: Arc<dyn MetadataStore>,
    history: Arc<BuildHistory>,
    locks: TagLocks,
}

impl BuildOrchestrator {
    pub fn new(
        engine: Arc<dyn ImageEngine>,
        fetcher: Arc<dyn ContentFetch>,
        store: Arc<dyn MetadataStore>,
        history: Arc<BuildHistory>,
    ) -> Self {
        Self {
            engine,
            fetcher,
            store,
            history,
            locks: TagLocks::new(),
        }
    }

    /// イメージをビルド、またはキャッシュ済みのメタデータを返す
    ///
    /// 同じタグのビルドは直列化される。ビルドを受け付けた後は、
    /// 成功・失敗にかかわらず履歴を終了状態にしてから返る。
    #[tracing::instrument(skip_all, fields(tag = %request.tag))]
    pub async fn build(&self, request: &BuildRequest) -> Result<BuildOutcome> {
        let tag = request.tag.as_str();
        let _guard = self.locks.acquire(tag).await;

        if let Some(metadata) = self.cached(tag).await? {
            tracing::info!(image = %metadata.id, "Image already built, skipping");
            return Ok(BuildOutcome {
                logs: Vec::new(),
                metadata,
                cached: true,
            });
        }

        self.history.start(tag).await;

        let mut log = Vec::new();
        match self.run_build(request, &mut log).await {
            Ok(metadata) => {
                self.history.succeed(tag, log.clone()).await;
                tracing::info!(image = %metadata.id, chunks = log.len(), "Successfully built");
                Ok(BuildOutcome {
                    logs: log,
                    metadata,
                    cached: false,
                })
            }
            Err(err) => {
                self.history.fail(tag, log).await;
                tracing::warn!(error = %err, "Build failed");
                Err(err)
            }
        }
    }

    /// キャッシュを確認し、エンジン側にイメージが無ければ削除する
    async fn cached(&self, tag: &str) -> Result<Option<ImageMetadata>> {
        let Some(metadata) = self.store.get(tag).await? else {
            return Ok(None);
        };

        // 履歴を作る前の失敗なので、空のログでビルド失敗として返す
        let image = self
            .engine
            .inspect_image(tag)
            .await
            .map_err(|e| BuildError::build_failed(e.to_string(), Vec::new()))?;
        if image.is_some() {
            return Ok(Some(metadata));
        }

        tracing::warn!(image = %metadata.id, "Cached image no longer exists, rebuilding");
        self.store.delete(tag).await?;
        Ok(None)
    }

    /// Dockerfileの展開からイメージ解決まで
    ///
    /// `log` には取得したビルドログが順に積まれる。
    async fn run_build(
        &self,
        request: &BuildRequest,
        log: &mut Vec<LogChunk>,
    ) -> Result<ImageMetadata> {
        let tag = request.tag.as_str();
        let dockerfile = render_dockerfile(&request.template, &request.version)?;

        let modpack = match &request.modpack {
            Some(modpack) => {
                let source: ContentSource = modpack.source.parse()?;
                Some(self.fetcher.fetch(&modpack.id, source).await?)
            }
            None => None,
        };

        let context = tokio::task::spawn_blocking(move || {
            ContextBuilder::create_context(&dockerfile, modpack.as_deref())
        })
        .await
        .map_err(|e| BuildError::Io(std::io::Error::other(e)))??;

        let labels = labels::build_labels(
            request.template_name.as_deref(),
            &request.version,
            chrono::Utc::now(),
        );

        let mut stream = self.engine.build(context, tag, labels);
        while let Some(item) = stream.next().await {
            let chunk = item.map_err(|e| BuildError::build_failed(e.to_string(), log.clone()))?;

            // エラーチャンクを受け取った時点で読み取りを止める
            if let Some(message) = chunk.error_message() {
                return Err(BuildError::build_failed(message, log.clone()));
            }
            log.push(chunk);
        }
        drop(stream);

        let metadata = self
            .engine
            .inspect_image(tag)
            .await
            .map_err(|e| BuildError::build_failed(e.to_string(), log.clone()))?
            .ok_or_else(|| {
                BuildError::build_failed(format!("image {} not found after build", tag), log.clone())
            })?;

        self.store.put(tag, metadata.clone()).await?;
        Ok(metadata)
    }

    /// velarium でビルドしたイメージの一覧（エンジンに毎回問い合わせる）
    pub async fn list_images(&self) -> Result<Vec<ImageListingEntry>> {
        let images = self.engine.list_images(&labels::project_filter()).await?;
        Ok(images.iter().map(ImageListingEntry::from).collect())
    }

    pub async fn get_build_log(&self, tag: &str) -> Result<BuildLogEntry> {
        self.history.get(tag).await
    }
}
