//! Velarium イメージビルド機能
//!
//! Dockerfileテンプレートにバージョンを埋め込んでイメージをビルドする。
//! 必要に応じてコンテンツホストから取得した modpack を同梱する。
//! 成功したビルドはタグ単位でキャッシュし、受け付けたビルドはすべて
//! 状態とログを履歴に残す。

pub mod context;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod history;
pub mod labels;
pub mod lock;
pub mod model;
pub mod orchestrator;
pub mod progress;
pub mod store;
pub mod template;

pub use context::ContextBuilder;
pub use engine::{DockerEngine, EngineImage, ImageEngine};
pub use error::{BuildError, BuildResult};
pub use fetcher::{ContentFetch, ContentSource, FetcherConfig, HttpContentFetcher};
pub use history::BuildHistory;
pub use lock::TagLocks;
pub use model::{
    BuildLogEntry, BuildOutcome, BuildRequest, BuildStatus, ImageListingEntry, ImageMetadata,
    LogChunk, ModpackRef, ProgressDetail,
};
pub use orchestrator::BuildOrchestrator;
pub use progress::BuildProgress;
pub use store::{FileMetadataStore, MemoryMetadataStore, MetadataStore};
pub use template::render_dockerfile;
