use crate::model::LogChunk;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Template error: {0}")]
    Template(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Build failed: {message}")]
    BuildFailed {
        message: String,
        log: Vec<LogChunk>,
    },

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid build configuration: {0}")]
    InvalidConfig(String),

    #[error("Modpack archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    pub fn build_failed(message: impl Into<String>, log: Vec<LogChunk>) -> Self {
        BuildError::BuildFailed {
            message: message.into(),
            log,
        }
    }

    /// 失敗までに取得できたビルドログ
    pub fn log(&self) -> &[LogChunk] {
        match self {
            BuildError::BuildFailed { log, .. } => log,
            _ => &[],
        }
    }

    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::Template(msg) => {
                format!(
                    "Dockerfileテンプレートを展開できません: {}\n\
                     \n\
                     テンプレートで使用できるプレースホルダーは {{version}} のみです。\n\
                     波括弧そのものを書く場合は {{{{ と }}}} を使用してください。",
                    msg
                )
            }
            BuildError::UnknownSource(source) => {
                format!(
                    "不明なmodpackソースです: {}\n\
                     \n\
                     対応しているソース: modrinth, curseforge",
                    source
                )
            }
            BuildError::BuildFailed { message, .. } => {
                format!(
                    "ビルドに失敗しました: {}\n\
                     \n\
                     Dockerfileの内容を確認してください。",
                    message
                )
            }
            BuildError::DockerConnection(e) => {
                format!(
                    "Dockerデーモンに接続できません: {}\n\
                     \n\
                     Dockerが起動しているか確認してください。",
                    e
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
pub type BuildResult<T> = Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_attached_only_to_build_failures() {
        let err = BuildError::build_failed("disk full", vec![LogChunk::stream("step1")]);
        assert_eq!(err.log(), &[LogChunk::stream("step1")]);

        let err = BuildError::Upstream("503".to_string());
        assert!(err.log().is_empty());
    }

    #[test]
    fn test_user_message_mentions_placeholder() {
        let err = BuildError::Template("unknown placeholder {name}".to_string());
        assert!(err.user_message().contains("{version}"));
    }
}
