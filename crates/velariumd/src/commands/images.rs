use colored::Colorize;
use velarium_build::BuildOrchestrator;

pub async fn handle(orchestrator: &BuildOrchestrator) -> anyhow::Result<()> {
    let images = orchestrator.list_images().await?;

    if images.is_empty() {
        println!("{}", "ビルド済みのイメージはありません".dimmed());
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "{:<40} {:<20} {:<15} {:<12}",
            "TAG", "TEMPLATE", "VERSION", "BUILT"
        )
        .bold()
    );
    println!("{}", "─".repeat(90).dimmed());

    for image in images {
        let tag = image.tag.as_deref().unwrap_or("<none>");
        let template = if image.template.is_empty() {
            "-".dimmed()
        } else {
            image.template.normal()
        };
        let built = image
            .built
            .parse::<i64>()
            .ok()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or(image.built);

        println!(
            "{:<40} {:<20} {:<15} {:<12}",
            tag.cyan(),
            template,
            image.version.green(),
            built
        );
    }

    Ok(())
}
