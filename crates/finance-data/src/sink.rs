//! File sinks for collected records
//!
//! - **CSV**: one [`RecordRow`] per record under a fixed header
//! - **JSON**: the records themselves, as an array
//!
//! Keyword news downloads are not tied to a symbol and are written as
//! [`CnbcArticle`] rows by [`write_articles`].

use crate::error::{FinanceError, Result};
use crate::model::{DateRange, Record, RecordRow, Symbol};
use crate::sources::CnbcArticle;
use serde::Serialize;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Output file format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(FinanceError::Config(format!("unknown output format: {other}"))),
        }
    }
}

/// What a sink wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkSummary {
    pub path: PathBuf,
    pub format: OutputFormat,
    pub records: usize,
}

/// Destination for a batch of records
pub trait RecordSink {
    fn write(&self, records: &[Record]) -> Result<SinkSummary>;
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Writes flattened rows as CSV
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSink for CsvSink {
    fn write(&self, records: &[Record]) -> Result<SinkSummary> {
        create_parent(&self.path)?;

        // Header is written explicitly so an empty batch still produces one
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&self.path)?;
        writer.write_record(RecordRow::COLUMNS)?;
        for record in records {
            writer.serialize(record.to_row())?;
        }
        writer.flush()?;

        info!(path = %self.path.display(), records = records.len(), "wrote CSV");
        Ok(SinkSummary {
            path: self.path.clone(),
            format: OutputFormat::Csv,
            records: records.len(),
        })
    }
}

/// Writes records as a JSON array
#[derive(Debug, Clone)]
pub struct JsonSink {
    path: PathBuf,
    pretty: bool,
}

impl JsonSink {
    /// Pretty-printed by default
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pretty: true,
        }
    }

    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }
}

impl RecordSink for JsonSink {
    fn write(&self, records: &[Record]) -> Result<SinkSummary> {
        create_parent(&self.path)?;

        let mut writer = BufWriter::new(File::create(&self.path)?);
        if self.pretty {
            serde_json::to_writer_pretty(&mut writer, records)?;
        } else {
            serde_json::to_writer(&mut writer, records)?;
        }
        writer.write_all(b"\n")?;
        writer.flush()?;

        info!(path = %self.path.display(), records = records.len(), "wrote JSON");
        Ok(SinkSummary {
            path: self.path.clone(),
            format: OutputFormat::Json,
            records: records.len(),
        })
    }
}

/// Sink for `format` writing to `path`
pub fn sink_for(format: OutputFormat, path: impl Into<PathBuf>) -> Box<dyn RecordSink> {
    match format {
        OutputFormat::Csv => Box::new(CsvSink::new(path)),
        OutputFormat::Json => Box::new(JsonSink::new(path)),
    }
}

/// Column order of article CSV files
pub const ARTICLE_COLUMNS: [&str; 5] = ["title", "description", "url", "published", "section"];

/// Write keyword-search articles in `format`
pub fn write_articles(
    path: impl Into<PathBuf>,
    format: OutputFormat,
    articles: &[CnbcArticle],
) -> Result<SinkSummary> {
    let path = path.into();
    create_parent(&path)?;

    match format {
        OutputFormat::Csv => {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_path(&path)?;
            writer.write_record(ARTICLE_COLUMNS)?;
            for article in articles {
                writer.serialize(article)?;
            }
            writer.flush()?;
        }
        OutputFormat::Json => {
            let mut writer = BufWriter::new(File::create(&path)?);
            serde_json::to_writer_pretty(&mut writer, articles)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
    }

    info!(path = %path.display(), articles = articles.len(), "wrote articles");
    Ok(SinkSummary {
        path,
        format,
        records: articles.len(),
    })
}

/// `{data_dir}/{symbol}_{label}_{start}_{end}.{ext}`
pub fn default_output_path(
    data_dir: &Path,
    symbol: &Symbol,
    label: &str,
    range: &DateRange,
    format: OutputFormat,
) -> PathBuf {
    data_dir.join(format!(
        "{}_{}_{}_{}.{}",
        symbol,
        label,
        range.start,
        range.end,
        format.extension()
    ))
}
