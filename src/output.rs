//! Output formatting and persistence for aggregated results.
//!
//! Supports JSON logging, fresh CSV writes, and CSV append.

use anyhow::Result;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{debug, info};

/// Logs a serializable result set as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes `rows` to a fresh CSV file at `path`, replacing any previous one.
pub fn write_records<T: Serialize>(path: &str, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    debug!(path, rows = rows.len(), "CSV written");
    Ok(())
}

/// Appends `rows` to a CSV file at `path`.
///
/// Creates the file with headers if it does not already exist.
pub fn append_records<T: Serialize>(path: &str, rows: &[T]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = rows.len(), "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traffic::LinkFlowRecord;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    fn row(link: &str) -> LinkFlowRecord {
        LinkFlowRecord {
            link_id: link.to_string(),
            time_span: "0_3600".to_string(),
            total_vehicle: 2,
            mean_speed: 8.5,
        }
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&vec![row("l1")]).unwrap();
    }

    #[test]
    fn test_write_records_replaces_file() {
        let path = temp_path("linkflow_test_write.csv");

        write_records(&path, &[row("l1"), row("l2")]).unwrap();
        write_records(&path, &[row("l3")]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        // header + single row from the second write
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("l3"));
        assert!(!content.contains("l1"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_records_writes_header_once() {
        let path = temp_path("linkflow_test_header.csv");
        let _ = fs::remove_file(&path);

        append_records(&path, &[row("l1")]).unwrap();
        append_records(&path, &[row("l2")]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.contains("link_id")).count();
        assert_eq!(header_count, 1);
        assert_eq!(content.lines().count(), 3);

        fs::remove_file(&path).unwrap();
    }
}
