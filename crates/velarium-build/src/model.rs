//! ビルド要求・結果の型（オーケストレーターと呼び出し側で共有）

use serde::{Deserialize, Serialize};

/// ビルドストリームの1レコード
///
/// Docker の build API が返す JSON オブジェクトをそのまま保持する。
/// 存在しないフィールドはシリアライズしない。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogChunk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_detail: Option<ProgressDetail>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<ErrorDetail>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub aux: Option<serde_json::Value>,
}

/// レイヤー取得などの進捗（バイト数）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LogChunk {
    /// ビルドステップの出力行
    pub fn stream(line: impl Into<String>) -> Self {
        Self {
            stream: Some(line.into()),
            ..Default::default()
        }
    }

    /// エラーレコード
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some() || self.error_detail.is_some()
    }

    /// エラーメッセージ（`error` を優先し、なければ `errorDetail.message`）
    pub fn error_message(&self) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(error.clone());
        }
        self.error_detail.as_ref().map(|detail| {
            detail
                .message
                .clone()
                .unwrap_or_else(|| "Unknown build error".to_string())
        })
    }
}

impl From<bollard::models::BuildInfo> for LogChunk {
    fn from(info: bollard::models::BuildInfo) -> Self {
        Self {
            stream: info.stream,
            status: info.status,
            progress: info.progress,
            progress_detail: info.progress_detail.map(|detail| ProgressDetail {
                current: detail.current,
                total: detail.total,
            }),
            id: info.id,
            error: info.error,
            error_detail: info.error_detail.map(|detail| ErrorDetail {
                code: detail.code,
                message: detail.message,
            }),
            aux: info
                .aux
                .and_then(|aux| serde_json::to_value(aux).ok()),
        }
    }
}

/// ビルド成功時にタグごとにキャッシュされるイメージ情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub id: String,
}

impl ImageMetadata {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// ビルド履歴の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// ビルド受付済み、エンジン呼び出し中
    Building,
    /// ビルド完了、イメージを解決済み
    Success,
    /// 受付後のいずれかの段階で失敗
    Error,
}

impl BuildStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BuildStatus::Building)
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStatus::Building => write!(f, "building"),
            BuildStatus::Success => write!(f, "success"),
            BuildStatus::Error => write!(f, "error"),
        }
    }
}

/// タグごとのビルド履歴
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildLogEntry {
    pub tag: String,
    pub status: BuildStatus,
    pub log: Option<Vec<LogChunk>>,
}

/// エンジン上のイメージ1件（ラベルから復元）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageListingEntry {
    pub tag: Option<String>,
    pub template: String,
    pub version: String,
    pub built: String,
}

/// コンテンツホスト上の modpack への参照
///
/// `source` は受け取った文字列のまま保持し、ビルド時に検証する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModpackRef {
    pub id: String,
    pub source: String,
}

impl ModpackRef {
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    /// `{version}` プレースホルダーを含むDockerfileテンプレート
    pub template: String,
    pub version: String,
    pub tag: String,
    #[serde(default)]
    pub modpack: Option<ModpackRef>,
    /// イメージラベルに記録するテンプレート名
    #[serde(default)]
    pub template_name: Option<String>,
}

impl BuildRequest {
    pub fn new(
        template: impl Into<String>,
        version: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            template: template.into(),
            version: version.into(),
            tag: tag.into(),
            modpack: None,
            template_name: None,
        }
    }

    pub fn with_modpack(mut self, modpack: ModpackRef) -> Self {
        self.modpack = Some(modpack);
        self
    }

    pub fn with_template_name(mut self, name: impl Into<String>) -> Self {
        self.template_name = Some(name.into());
        self
    }
}

/// `build` の結果（取得したログと解決したイメージ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub logs: Vec<LogChunk>,
    pub metadata: ImageMetadata,
    /// キャッシュから返した場合は true（エンジンでのビルドなし）
    #[serde(skip)]
    pub cached: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_chunk_serializes_only_present_fields() {
        let json = serde_json::to_value(LogChunk::stream("step1")).unwrap();
        assert_eq!(json, serde_json::json!({"stream": "step1"}));
    }

    #[test]
    fn test_log_chunk_error_detail() {
        let chunk: LogChunk = serde_json::from_value(serde_json::json!({
            "errorDetail": {"code": 1, "message": "no space left"}
        }))
        .unwrap();

        assert!(chunk.is_error());
        assert_eq!(chunk.error_message().as_deref(), Some("no space left"));
        assert!(!LogChunk::stream("ok").is_error());
    }

    #[test]
    fn test_log_chunk_keeps_progress_detail_from_engine() {
        let record = serde_json::json!({
            "status": "Downloading",
            "id": "abc",
            "progress": "[=>   ] 10B/100B",
            "progressDetail": {"current": 10, "total": 100}
        });
        let info: bollard::models::BuildInfo = serde_json::from_value(record.clone()).unwrap();

        let chunk = LogChunk::from(info);
        assert_eq!(
            chunk.progress_detail,
            Some(ProgressDetail {
                current: Some(10),
                total: Some(100),
            })
        );
        assert_eq!(serde_json::to_value(&chunk).unwrap(), record);
    }

    #[test]
    fn test_build_status_serialization() {
        assert_eq!(
            serde_json::to_string(&BuildStatus::Building).unwrap(),
            "\"building\""
        );
        assert_eq!(BuildStatus::Error.to_string(), "error");
        assert!(BuildStatus::Success.is_terminal());
        assert!(!BuildStatus::Building.is_terminal());
    }
}
