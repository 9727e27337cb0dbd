//! Parse, status and table commands.

use std::time::Duration;

use console::style;

use tablemark::config::Settings;
use tablemark::models::{FileStatus, ParseTable};
use tablemark::parse::ParseStatus;

use super::helpers::{format_time, truncate};
use super::start_app;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Trigger a parse and wait for the worker to settle it.
pub async fn cmd_parse(settings: &Settings, org: i32, file_id: i32) -> anyhow::Result<()> {
    let app = start_app(settings).await?;

    let receipt = match app.parse.trigger_parse(org, file_id).await {
        Ok(receipt) => receipt,
        Err(e) => {
            app.shutdown().await;
            return Err(e.into());
        }
    };
    println!(
        "{} Parsing file {} (attempt {})...",
        style("→").cyan(),
        receipt.file_id,
        receipt.attempt
    );

    // Extraction has its own deadline; leave room for persistence.
    let wait = settings.extraction.timeout() + Duration::from_secs(30);
    let status = app
        .parse
        .wait_until_settled(org, file_id, POLL_INTERVAL, wait)
        .await;
    app.shutdown().await;
    let status = status?;

    match status.status {
        FileStatus::Completed => println!(
            "{} Found {} table(s) across {} page(s)",
            style("✓").green(),
            status.tables_found,
            status.page_count
        ),
        FileStatus::InProgress => println!(
            "{} Still parsing; check again with 'tablemark status {}'",
            style("!").yellow(),
            file_id
        ),
        _ => println!(
            "{} Parse failed: {}",
            style("✗").red(),
            status.last_error.as_deref().unwrap_or("unknown error")
        ),
    }
    Ok(())
}

pub async fn cmd_status(
    settings: &Settings,
    org: i32,
    file_id: i32,
    json: bool,
) -> anyhow::Result<()> {
    let app = start_app(settings).await?;
    let result = app.parse.get_status(org, file_id).await;
    app.shutdown().await;
    let status = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}

pub async fn cmd_tables(
    settings: &Settings,
    org: i32,
    file_id: i32,
    table: Option<i32>,
    json: bool,
) -> anyhow::Result<()> {
    let app = start_app(settings).await?;
    let result = match table {
        Some(table_id) => app
            .parse
            .get_table(org, file_id, table_id)
            .await
            .map(|t| vec![t]),
        None => app.parse.list_tables(org, file_id).await,
    };
    app.shutdown().await;
    let tables = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tables)?);
        return Ok(());
    }

    if tables.is_empty() {
        println!("{} No tables extracted for file {}", style("!").yellow(), file_id);
        return Ok(());
    }
    for t in &tables {
        print_table(t);
    }
    Ok(())
}

fn print_status(status: &ParseStatus) {
    println!("\n{} {}", style("File").bold(), status.file_id);
    println!("{}", "-".repeat(50));
    println!("{:<14} {}", "Name:", status.file_name);
    println!("{:<14} {}", "Status:", status.status);
    println!("{:<14} {}", "Tables:", status.tables_found);
    println!("{:<14} {}", "Pages:", status.page_count);
    println!("{:<14} {}", "Attempt:", status.attempt);
    println!("{:<14} {}", "Started:", format_time(status.started_at));
    println!("{:<14} {}", "Completed:", format_time(status.completed_at));
    if let Some(ref error) = status.last_error {
        let kind = status
            .failure
            .map(|k| k.as_str())
            .unwrap_or("unknown");
        println!("{:<14} [{}] {}", "Last error:", kind, style(error).red());
    }
}

fn print_table(table: &ParseTable) {
    println!(
        "\n{} {} (page {}, {}x{}{})",
        style("Table").bold(),
        table.id,
        table.page_number,
        table.row_count,
        table.column_count,
        table
            .confidence
            .map(|c| format!(", confidence {:.2}", c))
            .unwrap_or_default()
    );
    for row in &table.headers {
        println!("{}", style(format_row(row)).bold());
    }
    if !table.headers.is_empty() {
        println!("{}", "-".repeat(60));
    }
    for row in &table.rows {
        println!("{}", format_row(row));
    }
}

fn format_row(row: &[String]) -> String {
    row.iter()
        .map(|cell| format!("{:<16}", truncate(cell, 16)))
        .collect::<Vec<_>>()
        .join(" | ")
}
