mod commands;
mod server;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use velarium_build::{
    BuildHistory, BuildOrchestrator, DockerEngine, FetcherConfig, FileMetadataStore,
    HttpContentFetcher, MemoryMetadataStore, MetadataStore,
};
use velarium_config::VelariumConfig;

#[derive(Parser)]
#[command(name = "velariumd")]
#[command(about = "テンプレートとバージョンからサーバーイメージをビルドする", long_about = None)]
struct Cli {
    /// 設定ファイルのパス（省略時は自動検出）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// HTTP API サーバーを起動
    Serve {
        /// 待ち受けアドレス（設定ファイルの listen より優先）
        #[arg(short, long)]
        listen: Option<SocketAddr>,
        /// キャッシュをファイルに保存しない
        #[arg(long)]
        ephemeral: bool,
    },
    /// イメージを1回ビルド
    Build {
        /// Dockerfile テンプレートのパス
        #[arg(short, long)]
        template: PathBuf,
        /// {version} に埋め込むバージョン
        #[arg(short, long)]
        version: String,
        /// イメージタグ
        #[arg(long)]
        tag: String,
        /// 埋め込む modpack の ID
        #[arg(long, requires = "source")]
        modpack_id: Option<String>,
        /// modpack の取得元 (modrinth, curseforge)
        #[arg(short, long)]
        source: Option<String>,
        /// イメージラベルに記録するテンプレート名
        #[arg(long)]
        template_name: Option<String>,
    },
    /// ビルド済みイメージの一覧
    Images,
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログは stderr に出し、stdout はコマンドの出力に使う
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Versionコマンドは設定ファイル不要
    if matches!(cli.command, Commands::Version) {
        println!("velariumd {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = velarium_config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Version => {}
        Commands::Serve { listen, ephemeral } => {
            let orchestrator = create_orchestrator(&config, ephemeral).await?;
            server::serve(listen.unwrap_or(config.listen), orchestrator).await?;
        }
        Commands::Build {
            template,
            version,
            tag,
            modpack_id,
            source,
            template_name,
        } => {
            let orchestrator = create_orchestrator(&config, false).await?;
            commands::build::handle(
                &orchestrator,
                commands::build::BuildArgs {
                    template,
                    version,
                    tag,
                    modpack_id,
                    source,
                    template_name,
                },
            )
            .await?;
        }
        Commands::Images => {
            let orchestrator = create_orchestrator(&config, true).await?;
            commands::images::handle(&orchestrator).await?;
        }
    }

    Ok(())
}

async fn create_orchestrator(
    config: &VelariumConfig,
    ephemeral: bool,
) -> anyhow::Result<Arc<BuildOrchestrator>> {
    let engine = DockerEngine::connect(config.docker_socket.as_deref())?;
    let fetcher = HttpContentFetcher::new(FetcherConfig {
        modrinth_api_base: config.modrinth_api_base.clone(),
        curseforge_api_base: config.curseforge_api_base.clone(),
        curseforge_api_key: config.curseforge_api_key.clone(),
    })?;

    let store: Arc<dyn MetadataStore> = if ephemeral {
        Arc::new(MemoryMetadataStore::new())
    } else {
        let store = FileMetadataStore::open(&config.metadata_path).await?;
        tracing::info!("Using build cache at {}", store.path().display());
        Arc::new(store)
    };

    Ok(Arc::new(BuildOrchestrator::new(
        Arc::new(engine),
        Arc::new(fetcher),
        store,
        Arc::new(BuildHistory::new()),
    )))
}
