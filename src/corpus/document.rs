// Document ingestion — the single read of the document and event tables.
//
// Dates arrive as day/month/year strings. A row that fails to parse rejects
// the whole read with a Parse error naming the row; dates are never silently
// defaulted.

use std::path::Path;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PipelineError, Result};

/// A single blog article, immutable once ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Dense identifier assigned at ingestion, in file order.
    pub id: usize,
    pub organisation: String,
    pub title: String,
    pub date: NaiveDate,
    /// Day of year derived from `date` (1-366).
    pub day_of_year: u16,
    pub text: String,
}

/// One row of the companion event timeline, carried through to the
/// artifacts for downstream annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub date: NaiveDate,
    pub event: String,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    organisation: String,
    title: String,
    date: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    date: String,
    event: String,
}

const DATE_FORMAT: &str = "%d/%m/%Y";

fn parse_date(value: &str, row: usize) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|e| PipelineError::Parse {
        row,
        reason: format!("invalid date '{value}' (expected day/month/year): {e}"),
    })
}

/// Read the document table from a CSV file with columns
/// {organisation, title, date, text}.
pub fn read_documents(path: &Path) -> Result<Vec<Document>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut documents = Vec::new();

    for (i, record) in reader.deserialize::<RawDocument>().enumerate() {
        // Row numbers are 1-based and skip the header line.
        let row = i + 2;
        let raw = record.map_err(|e| PipelineError::Parse {
            row,
            reason: e.to_string(),
        })?;
        let date = parse_date(&raw.date, row)?;
        documents.push(Document {
            id: documents.len(),
            organisation: raw.organisation,
            title: raw.title,
            date,
            day_of_year: date.ordinal() as u16,
            text: raw.text,
        });
    }

    info!(documents = documents.len(), path = %path.display(), "Ingested document table");
    Ok(documents)
}

/// Read the event timeline table from a CSV file with columns {date, event}.
pub fn read_events(path: &Path) -> Result<Vec<TimelineEvent>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut events = Vec::new();

    for (i, record) in reader.deserialize::<RawEvent>().enumerate() {
        let row = i + 2;
        let raw = record.map_err(|e| PipelineError::Parse {
            row,
            reason: e.to_string(),
        })?;
        events.push(TimelineEvent {
            date: parse_date(&raw.date, row)?,
            event: raw.event,
        });
    }

    info!(events = events.len(), path = %path.display(), "Ingested event timeline");
    Ok(events)
}
