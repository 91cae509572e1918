use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unterminated quoted field starting on line {line}")]
    UnterminatedQuote { line: usize },
    #[error("failed to serialize JSON: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Rewrites a CSV export as a JSON array of objects keyed by the header row.
pub fn csv_to_json(csv_path: &Path, json_path: &Path) -> Result<PathBuf, ConvertError> {
    let content = fs::read_to_string(csv_path).map_err(|source| ConvertError::Read {
        path: csv_path.to_path_buf(),
        source,
    })?;
    let rows = csv_rows_to_objects(&content)?;
    let rendered = serde_json::to_string_pretty(&Value::Array(rows))?;
    fs::write(json_path, rendered).map_err(|source| ConvertError::Write {
        path: json_path.to_path_buf(),
        source,
    })?;
    info!(path = %json_path.display(), "JSON report created");
    Ok(json_path.to_path_buf())
}

pub fn csv_rows_to_objects(content: &str) -> Result<Vec<Value>, ConvertError> {
    let mut records = parse_records(content.trim_start_matches('\u{feff}'))?.into_iter();
    let header = match records.next() {
        Some(header) => header,
        None => return Ok(Vec::new()),
    };

    let objects = records
        .filter(|record| !(record.len() == 1 && record[0].is_empty()))
        .map(|record| {
            let mut object = Map::new();
            for (index, column) in header.iter().enumerate() {
                let value = record.get(index).cloned().unwrap_or_default();
                object.insert(column.clone(), Value::String(value));
            }
            Value::Object(object)
        })
        .collect();
    Ok(objects)
}

/// RFC 4180 records: quoted fields may hold separators, doubled quotes and
/// line breaks.
fn parse_records(content: &str) -> Result<Vec<Vec<String>>, ConvertError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quote_line = 0;
    let mut line = 1;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => {
                in_quotes = true;
                quote_line = line;
            }
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                line += 1;
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(ConvertError::UnterminatedQuote { line: quote_line });
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}
