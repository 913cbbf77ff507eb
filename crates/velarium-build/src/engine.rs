use crate::error::{BuildError, Result};
use crate::model::{ImageMetadata, LogChunk};
use async_trait::async_trait;
use bollard::Docker;
use futures_util::stream::{BoxStream, StreamExt};
use std::collections::HashMap;

/// イメージ一覧で返されるエンジン側のイメージ情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineImage {
    pub id: String,
    pub tags: Vec<String>,
    pub labels: HashMap<String, String>,
}

/// コンテナエンジンの抽象化
///
/// ビルドは遅延ストリームとして返す。呼び出し側がストリームの
/// 読み取りを止めた時点でビルド出力の消費も止まる。
#[async_trait]
pub trait ImageEngine: Send + Sync {
    /// ビルドコンテキストからイメージをビルドし、ログレコードを順に返す
    fn build<'a>(
        &'a self,
        context: Vec<u8>,
        tag: &'a str,
        labels: HashMap<String, String>,
    ) -> BoxStream<'a, Result<LogChunk>>;

    /// タグに対応するイメージを取得（存在しなければ `None`）
    async fn inspect_image(&self, tag: &str) -> Result<Option<ImageMetadata>>;

    /// `key=value` 形式のラベルフィルタに一致するイメージ一覧
    async fn list_images(&self, label_filter: &str) -> Result<Vec<EngineImage>>;
}

/// Docker Engine API (bollard) によるエンジン実装
#[derive(Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Dockerデーモンに接続
    ///
    /// ソケットパスの指定がなければ DOCKER_HOST などのローカル既定値を使う。
    pub fn connect(socket: Option<&str>) -> Result<Self> {
        let docker = match socket {
            Some(path) => {
                tracing::debug!("Connecting to Docker socket: {}", path);
                Docker::connect_with_socket(path, 120, bollard::API_DEFAULT_VERSION)?
            }
            None => Docker::connect_with_local_defaults()?,
        };
        Ok(Self::new(docker))
    }
}

#[async_trait]
impl ImageEngine for DockerEngine {
    fn build<'a>(
        &'a self,
        context: Vec<u8>,
        tag: &'a str,
        labels: HashMap<String, String>,
    ) -> BoxStream<'a, Result<LogChunk>> {
        tracing::info!("Building image: {}", tag);

        let labels_refs: HashMap<&str, &str> = labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        #[allow(deprecated)]
        let options = bollard::image::BuildImageOptions {
            dockerfile: "Dockerfile",
            t: tag,
            labels: labels_refs,
            rm: true,      // 中間コンテナを削除
            forcerm: true, // ビルド失敗時も中間コンテナを削除
            ..Default::default()
        };

        tracing::debug!("Build options: {:?}", options);
        let options: bollard::query_parameters::BuildImageOptions = options.into();

        // ビルドストリームの開始
        use bytes::Bytes;
        use http_body_util::{Either, Full};
        let body = Full::new(Bytes::from(context));

        let stream = self
            .docker
            .build_image(options, None, Some(Either::Left(body)));

        stream
            .map(|msg| msg.map(LogChunk::from).map_err(BuildError::DockerConnection))
            .boxed()
    }

    async fn inspect_image(&self, tag: &str) -> Result<Option<ImageMetadata>> {
        match self.docker.inspect_image(tag).await {
            Ok(image) => {
                let id = image.id.ok_or_else(|| {
                    BuildError::InvalidConfig(format!("Image {} has no id", tag))
                })?;
                Ok(Some(ImageMetadata::new(id)))
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                ..
            }) => Ok(None),
            Err(e) => Err(BuildError::DockerConnection(e)),
        }
    }

    async fn list_images(&self, label_filter: &str) -> Result<Vec<EngineImage>> {
        let filters = HashMap::from([("label".to_string(), vec![label_filter.to_string()])]);

        let options = bollard::query_parameters::ListImagesOptions {
            filters: Some(filters),
            ..Default::default()
        };

        let images = self.docker.list_images(Some(options)).await?;
        tracing::debug!("Engine reported {} images for {}", images.len(), label_filter);

        Ok(images
            .into_iter()
            .map(|image| EngineImage {
                id: image.id,
                tags: image.repo_tags,
                labels: image.labels,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextBuilder;
    use crate::labels;

    #[tokio::test]
    #[ignore] // Docker接続が必要なため、通常のテストではスキップ
    async fn test_build_simple_image() {
        let engine = DockerEngine::connect(None).unwrap();

        let context_data =
            ContextBuilder::create_context("FROM alpine:latest\nCMD echo 'test'", None).unwrap();
        let labels = labels::build_labels(Some("test"), "1", chrono::Utc::now());

        let chunks: Vec<_> = engine
            .build(context_data, "velarium-test:latest", labels)
            .collect()
            .await;
        assert!(chunks.iter().all(|c| c.as_ref().is_ok_and(|c| !c.is_error())));

        let image = engine.inspect_image("velarium-test:latest").await.unwrap();
        assert!(image.is_some());

        let listed = engine
            .list_images(&labels::project_filter())
            .await
            .unwrap();
        assert!(
            listed
                .iter()
                .any(|i| i.tags.contains(&"velarium-test:latest".to_string()))
        );

        // クリーンアップ
        engine
            .docker
            .remove_image(
                "velarium-test:latest",
                None::<bollard::query_parameters::RemoveImageOptions>,
                None,
            )
            .await
            .ok();
    }

    #[tokio::test]
    #[ignore]
    async fn test_inspect_missing_image() {
        let engine = DockerEngine::connect(None).unwrap();
        let image = engine
            .inspect_image("velarium-missing:does-not-exist")
            .await
            .unwrap();
        assert!(image.is_none());
    }
}
