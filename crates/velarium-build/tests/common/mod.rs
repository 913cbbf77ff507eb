#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use velarium_build::{
    BuildError, BuildResult, ContentFetch, ContentSource, EngineImage, ImageEngine, ImageMetadata,
    LogChunk,
};

/// スクリプト化したビルドストリームの1要素
#[derive(Clone)]
pub enum Step {
    Chunk(LogChunk),
    TransportError(String),
}

impl Step {
    pub fn stream(line: &str) -> Self {
        Step::Chunk(LogChunk::stream(line))
    }

    pub fn error(message: &str) -> Self {
        Step::Chunk(LogChunk::error(message))
    }
}

/// エンジンが受け取ったビルド呼び出し
#[derive(Debug, Clone)]
pub struct CapturedBuild {
    pub context: Vec<u8>,
    pub tag: String,
    pub labels: HashMap<String, String>,
}

impl CapturedBuild {
    /// gzip tar コンテキストのエントリ (パス, 内容)
    pub fn entries(&self) -> Vec<(String, Vec<u8>)> {
        let decoder = flate2::read::GzDecoder::new(self.context.as_slice());
        let mut tar = tar::Archive::new(decoder);
        tar.entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let path = entry.path().unwrap().to_string_lossy().into_owned();
                let mut content = Vec::new();
                entry.read_to_end(&mut content).unwrap();
                (path, content)
            })
            .collect()
    }

    pub fn dockerfile(&self) -> String {
        let (_, content) = self
            .entries()
            .into_iter()
            .find(|(path, _)| path == "Dockerfile")
            .unwrap();
        String::from_utf8(content).unwrap()
    }
}

/// ビルド出力のスクリプトで動くメモリ上のエンジン
#[derive(Default)]
pub struct ScriptedEngine {
    script: Mutex<Vec<Step>>,
    images: Mutex<HashMap<String, String>>,
    listing: Mutex<Vec<EngineImage>>,
    builds: Mutex<Vec<CapturedBuild>>,
    filters: Mutex<Vec<String>>,
    pulled: Arc<AtomicUsize>,
    gate: Option<Arc<Semaphore>>,
    skip_register: AtomicBool,
    inspect_error: Mutex<Option<String>>,
}

impl ScriptedEngine {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(script),
            ..Default::default()
        }
    }

    /// 各チャンクは `gate` の許可を得てから返される
    pub fn gated(script: Vec<Step>, gate: Arc<Semaphore>) -> Self {
        Self {
            script: Mutex::new(script),
            gate: Some(gate),
            ..Default::default()
        }
    }

    pub fn set_script(&self, script: Vec<Step>) {
        *self.script.lock().unwrap() = script;
    }

    pub fn add_image(&self, tag: &str, id: &str) {
        self.images
            .lock()
            .unwrap()
            .insert(tag.to_string(), id.to_string());
    }

    pub fn remove_image(&self, tag: &str) {
        self.images.lock().unwrap().remove(tag);
    }

    /// ビルドが成功してもイメージを登録しない
    pub fn skip_register(&self) {
        self.skip_register.store(true, Ordering::SeqCst);
    }

    /// 以降の `inspect_image` をエンジンエラーにする
    pub fn fail_inspect(&self, message: &str) {
        *self.inspect_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_listing(&self, listing: Vec<EngineImage>) {
        *self.listing.lock().unwrap() = listing;
    }

    pub fn builds(&self) -> Vec<CapturedBuild> {
        self.builds.lock().unwrap().clone()
    }

    pub fn filters(&self) -> Vec<String> {
        self.filters.lock().unwrap().clone()
    }

    /// 呼び出し側がこれまでに読み取ったストリーム要素数
    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageEngine for ScriptedEngine {
    fn build<'a>(
        &'a self,
        context: Vec<u8>,
        tag: &'a str,
        labels: HashMap<String, String>,
    ) -> BoxStream<'a, BuildResult<LogChunk>> {
        let count = {
            let mut builds = self.builds.lock().unwrap();
            builds.push(CapturedBuild {
                context,
                tag: tag.to_string(),
                labels,
            });
            builds.len()
        };

        let script = self.script.lock().unwrap().clone();
        let succeeds = script
            .iter()
            .all(|step| matches!(step, Step::Chunk(chunk) if !chunk.is_error()));
        if succeeds && !self.skip_register.load(Ordering::SeqCst) {
            self.add_image(tag, &format!("sha256:image-{}", count));
        }

        let pulled = self.pulled.clone();
        let gate = self.gate.clone();
        stream::iter(script)
            .then(move |step| {
                let pulled = pulled.clone();
                let gate = gate.clone();
                async move {
                    if let Some(gate) = gate {
                        gate.acquire().await.unwrap().forget();
                    }
                    pulled.fetch_add(1, Ordering::SeqCst);
                    match step {
                        Step::Chunk(chunk) => Ok(chunk),
                        Step::TransportError(message) => Err(BuildError::DockerConnection(
                            bollard::errors::Error::DockerResponseServerError {
                                status_code: 500,
                                message,
                            },
                        )),
                    }
                }
            })
            .boxed()
    }

    async fn inspect_image(&self, tag: &str) -> BuildResult<Option<ImageMetadata>> {
        if let Some(message) = self.inspect_error.lock().unwrap().clone() {
            return Err(BuildError::DockerConnection(
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 500,
                    message,
                },
            ));
        }
        Ok(self
            .images
            .lock()
            .unwrap()
            .get(tag)
            .map(|id| ImageMetadata::new(id.clone())))
    }

    async fn list_images(&self, label_filter: &str) -> BuildResult<Vec<EngineImage>> {
        self.filters.lock().unwrap().push(label_filter.to_string());
        Ok(self.listing.lock().unwrap().clone())
    }
}

/// 決まったバイト列（または失敗）を返す取得処理
pub struct CannedFetcher {
    response: Mutex<Option<BuildResult<Vec<u8>>>>,
    calls: Mutex<Vec<(String, ContentSource)>>,
}

impl CannedFetcher {
    pub fn returning(archive: Vec<u8>) -> Self {
        Self {
            response: Mutex::new(Some(Ok(archive))),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: BuildError) -> Self {
        Self {
            response: Mutex::new(Some(Err(err))),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn unused() -> Self {
        Self {
            response: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, ContentSource)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentFetch for CannedFetcher {
    async fn fetch(&self, modpack_id: &str, source: ContentSource) -> BuildResult<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .push((modpack_id.to_string(), source));
        self.response
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(BuildError::Upstream("no canned response".to_string())))
    }
}

/// 指定したファイルを含むZIPアーカイブ
pub fn zip_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buffer);
        for (name, content) in files {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }
    buffer.into_inner()
}
