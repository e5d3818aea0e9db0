use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

use super::DecisionRecord;

#[derive(Debug, Serialize)]
struct ExportEntry {
    id: i64,
    timestamp: String,
    sink: String,
    validator: String,
    action: String,
    reason: String,
    detail: String,
    taint_tags: String,
}

impl From<&DecisionRecord> for ExportEntry {
    fn from(record: &DecisionRecord) -> Self {
        ExportEntry {
            id: record.id.unwrap_or(0),
            timestamp: record.timestamp.clone(),
            sink: record.sink.clone(),
            validator: record.validator.clone(),
            action: record.action.clone(),
            reason: record.reason.clone(),
            detail: record.detail.clone(),
            taint_tags: record.taint_tags.clone(),
        }
    }
}

/// Export all records as JSON string.
pub fn export_json(conn: &Connection) -> Result<String> {
    let records = super::query_recent(conn, usize::MAX)?;
    let entries: Vec<ExportEntry> = records.iter().map(ExportEntry::from).collect();
    let json = serde_json::to_string_pretty(&entries)?;
    Ok(json)
}

/// Export all records as CSV string.
pub fn export_csv(conn: &Connection) -> Result<String> {
    let records = super::query_recent(conn, usize::MAX)?;
    let mut output =
        String::from("id,timestamp,sink,validator,action,reason,detail,taint_tags\n");
    for record in &records {
        output.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            record.id.unwrap_or(0),
            csv_field(&record.timestamp),
            csv_field(&record.sink),
            csv_field(&record.validator),
            csv_field(&record.action),
            csv_field(&record.reason),
            csv_field(&record.detail),
            csv_field(&record.taint_tags),
        ));
    }
    Ok(output)
}

/// Quote a field if it contains a delimiter, quote, or line break
/// (RFC 4180: embedded quotes are doubled).
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
