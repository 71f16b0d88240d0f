use serde::{Deserialize, Serialize};

use super::super::domain::Candidate;

pub const EXPORT_HEADERS: [&str; 7] = [
    "Name",
    "Email",
    "Phone",
    "Position",
    "Applied Date",
    "Stage",
    "Rating",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Csv,
    Tsv,
}

impl ExportFormat {
    pub const fn delimiter(self) -> u8 {
        match self {
            Self::Csv => b',',
            Self::Tsv => b'\t',
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Tsv => "tsv",
        }
    }

    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Tsv => "text/tab-separated-values",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write export row: {0}")]
    Write(#[from] csv::Error),
    #[error("failed to flush export buffer: {0}")]
    Flush(String),
    #[error("export produced invalid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Flat table with a header row and a fixed column order.
pub fn render(format: ExportFormat, candidates: &[&Candidate]) -> Result<ExportFile, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(format.delimiter())
        .from_writer(Vec::new());

    writer.write_record(EXPORT_HEADERS)?;
    for candidate in candidates {
        let applied = candidate.applied_on().format("%Y-%m-%d").to_string();
        let rating = format!("{:.1}", candidate.rating());
        writer.write_record([
            candidate.name.as_str(),
            candidate.email.as_str(),
            candidate.phone.as_str(),
            candidate.position.as_str(),
            applied.as_str(),
            candidate.stage.label(),
            rating.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Flush(err.to_string()))?;

    Ok(ExportFile {
        file_name: format!("candidates_export.{}", format.extension()),
        content_type: format.content_type(),
        body: String::from_utf8(bytes)?,
    })
}
