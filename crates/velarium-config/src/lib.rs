pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "VELARIUM_CONFIG_PATH";
pub const LISTEN_ENV: &str = "VELARIUM_LISTEN";
pub const METADATA_PATH_ENV: &str = "VELARIUM_METADATA_PATH";
pub const DOCKER_SOCKET_ENV: &str = "VELARIUM_DOCKER_SOCKET";
pub const CURSEFORGE_API_KEY_ENV: &str = "CURSEFORGE_API_KEY";

const METADATA_FILE: &str = "build_metadata.json";

/// Velarium の設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelariumConfig {
    /// HTTP サーバーの待ち受けアドレス
    pub listen: SocketAddr,

    /// tag → image id キャッシュの保存先
    pub metadata_path: PathBuf,

    /// Docker ソケットのパス（未指定ならローカル既定値）
    pub docker_socket: Option<String>,

    pub modrinth_api_base: String,

    pub curseforge_api_base: String,

    pub curseforge_api_key: Option<String>,
}

impl Default for VelariumConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8000)),
            metadata_path: default_metadata_path(),
            docker_socket: None,
            modrinth_api_base: "https://api.modrinth.com/v2".to_string(),
            curseforge_api_base: "https://api.curseforge.com/v1".to_string(),
            curseforge_api_key: None,
        }
    }
}

impl VelariumConfig {
    /// YAML ファイルから読み込む（記載のない項目は既定値）
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 環境変数で設定を上書き
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(listen) = std::env::var(LISTEN_ENV) {
            self.listen = listen.parse().map_err(|e: std::net::AddrParseError| {
                ConfigError::InvalidEnv {
                    name: LISTEN_ENV.to_string(),
                    message: e.to_string(),
                }
            })?;
        }
        if let Ok(path) = std::env::var(METADATA_PATH_ENV) {
            self.metadata_path = PathBuf::from(path);
        }
        if let Ok(socket) = std::env::var(DOCKER_SOCKET_ENV) {
            self.docker_socket = Some(socket);
        }
        if let Ok(key) = std::env::var(CURSEFORGE_API_KEY_ENV) {
            self.curseforge_api_key = Some(key);
        }
        Ok(())
    }
}

/// Velariumの設定ディレクトリを取得
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("velarium"))
}

/// キャッシュファイルの既定パス
///
/// データディレクトリが取得できない環境ではカレントディレクトリに置く。
pub fn default_metadata_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("velarium").join(METADATA_FILE))
        .unwrap_or_else(|| PathBuf::from(METADATA_FILE))
}

/// 設定ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 VELARIUM_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: velarium.yaml
/// 3. ./.velarium/velarium.yaml
/// 4. ~/.config/velarium/config.yaml (グローバル設定)
pub fn find_config_file() -> Result<Option<PathBuf>> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        tracing::warn!("{} points to a missing file: {}", CONFIG_PATH_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;

    // 2. カレントディレクトリ
    let path = current_dir.join("velarium.yaml");
    if path.exists() {
        return Ok(Some(path));
    }

    // 3. ./.velarium/ ディレクトリ
    let path = current_dir.join(".velarium").join("velarium.yaml");
    if path.exists() {
        return Ok(Some(path));
    }

    // 4. グローバル設定ファイル
    if let Ok(config_dir) = get_config_dir() {
        let global_config = config_dir.join("config.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

/// 設定を読み込む
///
/// `explicit` が指定されればそのファイルを使い、なければ探索する。
/// どこにも見つからなければ既定値。最後に環境変数で上書きする。
pub fn load_config(explicit: Option<&Path>) -> Result<VelariumConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file()?,
    };

    let mut config = match path {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            VelariumConfig::from_file(&path)?
        }
        None => {
            tracing::debug!("No config file found, using defaults");
            VelariumConfig::default()
        }
    };

    config.apply_env_overrides()?;
    Ok(config)
}
