//! コンテンツホストからの modpack アーカイブ取得
//!
//! メタデータ取得でファイル一覧を得て、先頭のファイルをダウンロードする。
//! 一覧はホストが返した順のまま使い、並べ替えはしない。

use crate::error::{BuildError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::str::FromStr;

pub const MODRINTH_API_BASE: &str = "https://api.modrinth.com/v2";
pub const CURSEFORGE_API_BASE: &str = "https://api.curseforge.com/v1";

/// 対応しているコンテンツホスト
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentSource {
    Modrinth,
    CurseForge,
}

impl ContentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentSource::Modrinth => "modrinth",
            ContentSource::CurseForge => "curseforge",
        }
    }
}

impl FromStr for ContentSource {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "modrinth" => Ok(ContentSource::Modrinth),
            "curseforge" => Ok(ContentSource::CurseForge),
            other => Err(BuildError::UnknownSource(other.to_string())),
        }
    }
}

impl std::fmt::Display for ContentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// オーケストレーターが使う取得処理
#[async_trait]
pub trait ContentFetch: Send + Sync {
    /// `source` から `modpack_id` のアーカイブをダウンロード
    async fn fetch(&self, modpack_id: &str, source: ContentSource) -> Result<Vec<u8>>;
}

/// コンテンツホストのエンドポイントと認証情報
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub modrinth_api_base: String,
    pub curseforge_api_base: String,
    pub curseforge_api_key: Option<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            modrinth_api_base: MODRINTH_API_BASE.to_string(),
            curseforge_api_base: CURSEFORGE_API_BASE.to_string(),
            curseforge_api_key: None,
        }
    }
}

// Modrinth: GET /project/{id}/version
#[derive(Debug, Deserialize)]
struct ModrinthVersion {
    files: Vec<ModrinthFile>,
}

#[derive(Debug, Deserialize)]
struct ModrinthFile {
    url: String,
}

// CurseForge: GET /mods/{id}/files
#[derive(Debug, Deserialize)]
struct CurseForgeFiles {
    data: Vec<CurseForgeFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurseForgeFile {
    download_url: Option<String>,
}

/// メタデータのレスポンスから先頭ファイルのダウンロードURLを取り出す
pub fn download_url(source: ContentSource, body: &[u8]) -> Result<String> {
    let malformed = |e: serde_json::Error| {
        BuildError::Upstream(format!("malformed {} metadata: {}", source, e))
    };

    let url = match source {
        ContentSource::Modrinth => {
            let versions: Vec<ModrinthVersion> = serde_json::from_slice(body).map_err(malformed)?;
            versions
                .into_iter()
                .next()
                .and_then(|version| version.files.into_iter().next())
                .map(|file| file.url)
        }
        ContentSource::CurseForge => {
            let files: CurseForgeFiles = serde_json::from_slice(body).map_err(malformed)?;
            files
                .data
                .into_iter()
                .next()
                .and_then(|file| file.download_url)
        }
    };

    url.ok_or_else(|| BuildError::Upstream(format!("{} listed no downloadable file", source)))
}

/// reqwest による取得処理
pub struct HttpContentFetcher {
    client: reqwest::Client,
    config: FetcherConfig,
}

impl HttpContentFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("velarium/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BuildError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// メタデータ取得先のURL
    ///
    /// `modpack_id` は1つのパスセグメントとしてエンコードする。
    pub fn metadata_url(&self, modpack_id: &str, source: ContentSource) -> Result<reqwest::Url> {
        let (base, segments) = match source {
            ContentSource::Modrinth => (
                &self.config.modrinth_api_base,
                ["project", modpack_id, "version"],
            ),
            ContentSource::CurseForge => (
                &self.config.curseforge_api_base,
                ["mods", modpack_id, "files"],
            ),
        };

        let invalid_base =
            || BuildError::InvalidConfig(format!("invalid {} API base URL: {}", source, base));
        let mut url = reqwest::Url::parse(base).map_err(|_| invalid_base())?;
        url.path_segments_mut()
            .map_err(|_| invalid_base())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// メタデータ取得（CurseForge の API キーはこのリクエストにだけ付ける）
    async fn get_metadata(&self, url: reqwest::Url, source: ContentSource) -> Result<bytes::Bytes> {
        let mut request = self.client.get(url.clone());
        if source == ContentSource::CurseForge {
            if let Some(key) = &self.config.curseforge_api_key {
                request = request.header("x-api-key", key);
            }
        }
        Self::send(request, &url).await
    }

    async fn send(request: reqwest::RequestBuilder, url: &reqwest::Url) -> Result<bytes::Bytes> {
        let response = request
            .send()
            .await
            .map_err(|e| BuildError::Upstream(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BuildError::Upstream(format!(
                "GET {} returned {}",
                url, status
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| BuildError::Upstream(format!("GET {} body: {}", url, e)))
    }
}

#[async_trait]
impl ContentFetch for HttpContentFetcher {
    async fn fetch(&self, modpack_id: &str, source: ContentSource) -> Result<Vec<u8>> {
        let metadata_url = self.metadata_url(modpack_id, source)?;
        tracing::info!(%source, modpack_id, "Resolving modpack download");

        let metadata = self.get_metadata(metadata_url, source).await?;
        let url = download_url(source, &metadata)?;
        let url = reqwest::Url::parse(&url)
            .map_err(|e| BuildError::Upstream(format!("invalid download URL {}: {}", url, e)))?;
        tracing::debug!(%source, modpack_id, url = %url, "Downloading modpack");

        // ダウンロード先には認証ヘッダーを付けない
        let archive = Self::send(self.client.get(url.clone()), &url).await?;
        tracing::info!(%source, modpack_id, bytes = archive.len(), "Modpack downloaded");

        Ok(archive.to_vec())
    }
}
