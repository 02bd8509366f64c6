//! Export command

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::path::{Path, PathBuf};

use crate::client::{ApiClient, Download};
use crate::output::print_success;

/// File format requested from the agent
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FileFormat {
    Csv,
    Json,
}

impl FileFormat {
    fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
        }
    }
}

/// What to export
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ExportKind {
    /// Metric samples in the selected window
    Samples,
    /// Breach events in the selected window
    Breaches,
}

impl ExportKind {
    fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Samples => "samples",
            ExportKind::Breaches => "breaches",
        }
    }
}

/// Where the download should be written
fn destination(output: &Path, download: &Download, format: FileFormat) -> PathBuf {
    if output.is_dir() {
        let name = download
            .filename
            .clone()
            .unwrap_or_else(|| format!("export.{}", format.as_str()));
        output.join(name)
    } else {
        output.to_path_buf()
    }
}

/// Download an export of the current selection
pub async fn export(
    client: &ApiClient,
    format: FileFormat,
    kind: ExportKind,
    output: Option<&str>,
) -> Result<()> {
    let path = format!(
        "api/v1/export?format={}&kind={}",
        format.as_str(),
        kind.as_str()
    );
    let download = client.download(&path).await?;

    match output {
        None => print!("{}", download.body),
        Some(output) => {
            let target = destination(Path::new(output), &download, format);
            std::fs::write(&target, &download.body)
                .with_context(|| format!("Failed to write {}", target.display()))?;
            print_success(&format!("Exported to {}", target.display()));
        }
    }

    Ok(())
}
