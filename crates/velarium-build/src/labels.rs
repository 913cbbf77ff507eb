//! ビルド時に付与し、一覧表示で読み戻すイメージラベル

use crate::engine::EngineImage;
use crate::model::ImageListingEntry;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

pub const PROJECT_LABEL_KEY: &str = "velarium.project";
pub const PROJECT_LABEL_VALUE: &str = "velarium";
pub const TEMPLATE_LABEL_KEY: &str = "velarium.template";
pub const VERSION_LABEL_KEY: &str = "velarium.version";
pub const BUILT_LABEL_KEY: &str = "velarium.built";

/// velarium でビルドしたイメージを選ぶラベルフィルタ
pub fn project_filter() -> String {
    format!("{}={}", PROJECT_LABEL_KEY, PROJECT_LABEL_VALUE)
}

/// ビルド時にイメージへ付与するラベル
pub fn build_labels(
    template_name: Option<&str>,
    version: &str,
    built_at: DateTime<Utc>,
) -> HashMap<String, String> {
    HashMap::from([
        (PROJECT_LABEL_KEY.to_string(), PROJECT_LABEL_VALUE.to_string()),
        (
            TEMPLATE_LABEL_KEY.to_string(),
            template_name.unwrap_or_default().to_string(),
        ),
        (VERSION_LABEL_KEY.to_string(), version.to_string()),
        (BUILT_LABEL_KEY.to_string(), built_at.timestamp().to_string()),
    ])
}

impl From<&EngineImage> for ImageListingEntry {
    fn from(image: &EngineImage) -> Self {
        let label = |key: &str| image.labels.get(key).cloned().unwrap_or_default();

        Self {
            tag: image.tags.first().cloned(),
            template: label(TEMPLATE_LABEL_KEY),
            version: label(VERSION_LABEL_KEY),
            built: label(BUILT_LABEL_KEY),
        }
    }
}
