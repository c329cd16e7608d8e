//! Terminal tables

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use finance_data::{CnbcArticle, CollectionReport, DataConfig, Record, SourceKind};
use finance_utils::{KeyReport, Settings};

/// Rows shown before a listing is elided
const PREVIEW_ROWS: usize = 10;

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

/// Headline, title or closing price: whatever best describes the record
fn describe(record: &Record) -> String {
    let row = record.to_row();
    if let Some(close) = row.close {
        return format!("close {close:.2}");
    }
    let title = row.title.unwrap_or_default();
    match row.form_type {
        Some(form) if title.is_empty() => form,
        Some(form) => format!("{form}: {title}"),
        None => title,
    }
}

pub fn print_records(records: &[Record]) {
    if records.is_empty() {
        println!("No records.");
        return;
    }

    let mut table = new_table(&["Timestamp", "Source", "Kind", "Detail"]);
    // Most recent last
    for record in &records[records.len().saturating_sub(PREVIEW_ROWS)..] {
        table.add_row(vec![
            record.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            record.source.to_string(),
            record.payload.kind().to_string(),
            truncate(&describe(record), 80),
        ]);
    }
    println!("{table}");

    if records.len() > PREVIEW_ROWS {
        println!("... {} more records", records.len() - PREVIEW_ROWS);
    }
}

pub fn print_outcomes(report: &CollectionReport) {
    let mut table = new_table(&["Source", "Status", "Records", "Cached", "Elapsed"]);
    for outcome in &report.outcomes {
        let status = match outcome.error() {
            None => "ok".to_string(),
            Some(error) => format!("failed: {}", truncate(error, 60)),
        };
        table.add_row(vec![
            outcome.source.to_string(),
            status,
            outcome.records.to_string(),
            if outcome.from_cache { "yes" } else { "no" }.to_string(),
            format!("{} ms", outcome.elapsed_ms),
        ]);
    }
    println!("{table}");
    println!(
        "{} {}..{}: {} merged records",
        report.symbol,
        report.range.start,
        report.range.end,
        report.records.len()
    );
}

pub fn print_articles(articles: &[CnbcArticle]) {
    if articles.is_empty() {
        println!("No articles.");
        return;
    }

    let mut table = new_table(&["Published", "Section", "Title"]);
    for article in articles.iter().take(PREVIEW_ROWS) {
        table.add_row(vec![
            article
                .published
                .map(|p| p.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
            article.section.clone().unwrap_or_default(),
            truncate(&article.title, 80),
        ]);
    }
    println!("{table}");

    if articles.len() > PREVIEW_ROWS {
        println!("... {} more articles", articles.len() - PREVIEW_ROWS);
    }
}

pub fn print_settings(settings: &Settings, config: &DataConfig) {
    let mut table = new_table(&["Setting", "Value"]);
    table.add_row(vec!["environment".to_string(), settings.environment.clone()]);
    table.add_row(vec!["debug".to_string(), settings.debug.to_string()]);
    table.add_row(vec!["log_level".to_string(), settings.effective_level()]);
    table.add_row(vec![
        "log_file".to_string(),
        settings
            .log_file
            .as_ref()
            .map_or_else(|| "(none)".to_string(), |p| p.display().to_string()),
    ]);
    table.add_row(vec![
        "data_dir".to_string(),
        settings.data_dir.display().to_string(),
    ]);
    for (key, value) in config.summary() {
        table.add_row(vec![key.to_string(), value]);
    }
    println!("{table}");
}

pub fn print_keys(keys: &KeyReport) {
    let mut table = new_table(&["Credential", "Present"]);
    for (key, present) in keys.entries() {
        table.add_row(vec![key.clone(), if *present { "yes" } else { "no" }.to_string()]);
    }
    println!("{table}");
}

pub fn print_sources(sources: &[(SourceKind, Option<String>)]) {
    let mut table = new_table(&["Source", "Records", "Usable"]);
    for (kind, problem) in sources {
        let usable = match problem {
            None => "yes".to_string(),
            Some(reason) => format!("no ({reason})"),
        };
        table.add_row(vec![kind.to_string(), kind.record_kind().to_string(), usable]);
    }
    println!("{table}");
}
