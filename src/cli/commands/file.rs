//! File commands.

use std::path::Path;

use console::style;

use tablemark::config::Settings;

use super::helpers::{format_bytes, format_time, truncate};
use super::start_app;

pub async fn cmd_file_upload(
    settings: &Settings,
    org: i32,
    project_id: i32,
    path: &Path,
    mime: Option<&str>,
    name: Option<&str>,
) -> anyhow::Result<()> {
    let content = tokio::fs::read(path).await?;
    let name = match name {
        Some(n) => n.to_string(),
        None => display_name(path),
    };

    let app = start_app(settings).await?;
    let result = app.files.upload(org, project_id, &name, &content, mime).await;
    app.shutdown().await;
    let (file, version) = result?;

    println!(
        "{} Uploaded {} as file {} (version {}, {}, {})",
        style("✓").green(),
        name,
        file.id,
        version.version_number,
        file.mime_type.as_deref().unwrap_or("unknown type"),
        format_bytes(file.size.max(0) as u64)
    );
    Ok(())
}

pub async fn cmd_file_replace(
    settings: &Settings,
    org: i32,
    file_id: i32,
    path: &Path,
    mime: Option<&str>,
) -> anyhow::Result<()> {
    let content = tokio::fs::read(path).await?;
    let name = display_name(path);

    let app = start_app(settings).await?;
    let result = app.files.replace(org, file_id, &name, &content, mime).await;
    app.shutdown().await;
    let version = result?;

    println!(
        "{} File {} now at version {} ({})",
        style("✓").green(),
        file_id,
        version.version_number,
        format_bytes(version.size.max(0) as u64)
    );
    Ok(())
}

pub async fn cmd_file_list(
    settings: &Settings,
    org: i32,
    project: Option<i32>,
) -> anyhow::Result<()> {
    let app = start_app(settings).await?;
    let result = app.files.list(org, project).await;
    app.shutdown().await;
    let files = result?;

    if files.is_empty() {
        println!("{} No files found", style("!").yellow());
        return Ok(());
    }

    println!("\n{}", style("Files").bold());
    println!("{}", "-".repeat(90));
    println!(
        "{:<6} {:<8} {:<32} {:<22} {:>10} Version",
        "ID", "Project", "Name", "Status", "Size"
    );
    println!("{}", "-".repeat(90));
    for file in files {
        println!(
            "{:<6} {:<8} {:<32} {:<22} {:>10} {}",
            file.id,
            file.project_id,
            truncate(&file.name, 31),
            file.status.as_str(),
            format_bytes(file.size.max(0) as u64),
            file.current_version
        );
    }
    Ok(())
}

pub async fn cmd_file_versions(settings: &Settings, org: i32, file_id: i32) -> anyhow::Result<()> {
    let app = start_app(settings).await?;
    let result = app.files.versions(org, file_id).await;
    app.shutdown().await;
    let versions = result?;

    println!("\n{} {}", style("Versions of file").bold(), file_id);
    println!("{}", "-".repeat(70));
    for version in versions {
        println!(
            "v{:<4} {:>10}  {}  {}",
            version.version_number,
            format_bytes(version.size.max(0) as u64),
            format_time(Some(version.created_at)),
            version
                .checksum
                .as_deref()
                .map(|c| truncate(c, 16))
                .unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}

pub async fn cmd_file_delete(settings: &Settings, org: i32, file_id: i32) -> anyhow::Result<()> {
    let app = start_app(settings).await?;
    let result = app.files.soft_delete(org, file_id).await;
    app.shutdown().await;
    result?;

    println!("{} Deleted file {}", style("✓").green(), file_id);
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string())
}
