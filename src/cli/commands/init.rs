//! Initialize command.

use console::style;

use tablemark::config::Settings;

/// Initialize the data directory and database.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let ctx = settings.create_db_context();
    ctx.init_schema().await?;

    if settings.extraction.endpoint.is_none() || settings.extraction.api_key.is_none() {
        println!(
            "{} Document Intelligence is not configured",
            style("!").yellow()
        );
        println!("  Set AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT and AZURE_DOCUMENT_INTELLIGENCE_KEY to enable parsing");
    }

    println!(
        "{} Initialized tablemark in {}",
        style("✓").green(),
        settings.data_dir.display()
    );

    Ok(())
}
