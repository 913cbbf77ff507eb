use colored::Colorize;
use std::path::PathBuf;
use velarium_build::{BuildOrchestrator, BuildProgress, BuildRequest, ModpackRef};

pub struct BuildArgs {
    pub template: PathBuf,
    pub version: String,
    pub tag: String,
    pub modpack_id: Option<String>,
    pub source: Option<String>,
    pub template_name: Option<String>,
}

pub async fn handle(orchestrator: &BuildOrchestrator, args: BuildArgs) -> anyhow::Result<()> {
    let template = std::fs::read_to_string(&args.template).map_err(|e| {
        anyhow::anyhow!(
            "テンプレートを読み込めません: {}: {}",
            args.template.display(),
            e
        )
    })?;

    println!("{}", "イメージをビルド中...".blue());
    println!("  タグ: {}", args.tag.cyan());
    println!("  バージョン: {}", args.version.cyan());

    let mut request = BuildRequest::new(template, args.version, args.tag.clone());
    if let Some(name) = args.template_name {
        request = request.with_template_name(name);
    }
    if let (Some(id), Some(source)) = (args.modpack_id, args.source) {
        println!("  modpack: {} ({})", id.cyan(), source);
        request = request.with_modpack(ModpackRef::new(id, source));
    }
    println!();

    let progress = BuildProgress::new(&args.tag);
    match orchestrator.build(&request).await {
        Ok(outcome) if outcome.cached => {
            progress.finish_cached(&outcome.metadata.id);
            Ok(())
        }
        Ok(outcome) => {
            progress.print_log(&outcome.logs);
            progress.finish_success(&outcome.metadata.id);
            Ok(())
        }
        Err(err) => {
            progress.print_log(err.log());
            progress.finish_error(&err.to_string());
            eprintln!();
            eprintln!("{}", err.user_message().red());
            Err(err.into())
        }
    }
}
