//! Project commands.

use console::style;

use tablemark::config::Settings;

use super::helpers::truncate;

pub async fn cmd_project_create(settings: &Settings, org: i32, name: &str) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let ctx = settings.create_db_context();
    ctx.init_schema().await?;

    let project = ctx.projects().create(org, name).await?;
    println!(
        "{} Created project {} ({})",
        style("✓").green(),
        project.id,
        project.name
    );
    Ok(())
}

pub async fn cmd_project_list(settings: &Settings, org: i32) -> anyhow::Result<()> {
    let ctx = settings.create_db_context();
    ctx.init_schema().await?;

    let projects = ctx.projects().list(org).await?;
    if projects.is_empty() {
        println!(
            "{} No projects. Create one with 'tablemark project create <name>'.",
            style("!").yellow()
        );
        return Ok(());
    }

    println!("\n{}", style("Projects").bold());
    println!("{}", "-".repeat(50));
    println!("{:<6} {:<30} Created", "ID", "Name");
    println!("{}", "-".repeat(50));
    for project in projects {
        println!(
            "{:<6} {:<30} {}",
            project.id,
            truncate(&project.name, 29),
            project.created_at.format("%Y-%m-%d")
        );
    }
    Ok(())
}
