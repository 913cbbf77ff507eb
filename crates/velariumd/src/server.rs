//! ビルド要求・ビルド履歴・イメージ一覧の HTTP API
//!
//! ルート:
//! - `POST /servers/build` - イメージをビルド（キャッシュ済みならそれを返す）
//! - `GET /servers/build/{tag}` - タグのビルド状態とログ（タグは `/` を含んでよい）
//! - `GET /servers/images` - velarium でビルドしたイメージ一覧
//! - `GET /healthz` - 死活監視

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use velarium_build::{
    BuildError, BuildLogEntry, BuildOrchestrator, BuildOutcome, BuildRequest, ImageListingEntry,
    ModpackRef,
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Build(err) => match err {
                BuildError::Template(_) | BuildError::UnknownSource(_) => StatusCode::BAD_REQUEST,
                BuildError::Upstream(_) => StatusCode::BAD_GATEWAY,
                BuildError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let log = match &self {
            ApiError::Build(err) => err.log().to_vec(),
            _ => Vec::new(),
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = serde_json::json!({
            "detail": self.to_string(),
            "log": log,
        });
        (status, Json(body)).into_response()
    }
}

/// `POST /servers/build` のリクエストボディ
#[derive(Debug, Deserialize)]
pub struct BuildBody {
    pub template: String,
    pub version: String,
    pub tag: String,
    #[serde(default)]
    pub modpack_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub template_name: Option<String>,
}

impl BuildBody {
    fn into_request(self) -> Result<BuildRequest, ApiError> {
        let mut request = BuildRequest::new(self.template, self.version, self.tag);
        if let Some(name) = self.template_name {
            request = request.with_template_name(name);
        }

        match (self.modpack_id, self.source) {
            (Some(id), Some(source)) => Ok(request.with_modpack(ModpackRef::new(id, source))),
            (Some(_), None) => Err(ApiError::BadRequest(
                "modpack_id requires a source".to_string(),
            )),
            // source だけ指定された場合は modpack なし
            (None, _) => Ok(request),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImagesResponse {
    pub images: Vec<ImageListingEntry>,
}

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<BuildOrchestrator>,
}

pub fn router(orchestrator: Arc<BuildOrchestrator>) -> Router {
    Router::new()
        .route("/servers/build", post(build_image))
        .route("/servers/build/{*tag}", get(get_build_log))
        .route("/servers/images", get(list_images))
        .route("/healthz", get(healthz))
        .with_state(AppState { orchestrator })
}

async fn build_image(
    State(state): State<AppState>,
    Json(body): Json<BuildBody>,
) -> Result<Json<BuildOutcome>, ApiError> {
    let request = body.into_request()?;
    tracing::info!(tag = %request.tag, version = %request.version, "Build requested");

    // クライアントが切断しても履歴が building のまま残らないよう、別タスクで最後まで実行する
    let orchestrator = state.orchestrator.clone();
    let outcome = tokio::spawn(async move { orchestrator.build(&request).await })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(outcome))
}

async fn get_build_log(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Json<BuildLogEntry>, ApiError> {
    Ok(Json(state.orchestrator.get_build_log(&tag).await?))
}

async fn list_images(State(state): State<AppState>) -> Result<Json<ImagesResponse>, ApiError> {
    let images = state.orchestrator.list_images().await?;
    Ok(Json(ImagesResponse { images }))
}

async fn healthz() -> &'static str {
    "ok"
}

/// Ctrl-C を受け取るまで HTTP API を提供
pub async fn serve(listen: SocketAddr, orchestrator: Arc<BuildOrchestrator>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
