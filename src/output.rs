use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::history::ProcessedRow;

/// CSV columns. Names and order match the serde names of `ProcessedRow`.
#[derive(Debug, Clone, Copy, Display, EnumIter)]
enum Column {
    #[strum(serialize = "Conversation ID")]
    ConversationId,
    #[strum(serialize = "Start Time")]
    StartTime,
    Date,
    Duration,
    Status,
    #[strum(serialize = "Last Skill")]
    LastSkill,
    #[strum(serialize = "Last Skill Name")]
    LastSkillName,
    #[strum(serialize = "Latest Agent Full Name")]
    LatestAgentFullName,
    #[strum(serialize = "Company Branch")]
    CompanyBranch,
    #[strum(serialize = "IMEI")]
    Imei,
    #[strum(serialize = "Last Delivery Status")]
    LastDeliveryStatus,
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {}", parent.display())),
        _ => Ok(()),
    }
}

/// Truncates (or creates) the CSV file and writes the header line.
pub fn write_csv_header(path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path)
        .with_context(|| format!("Failed to create CSV file {}", path.display()))?;

    let mut writer = csv::Writer::from_writer(file);
    writer
        .write_record(Column::iter().map(|column| column.to_string()))
        .context("Failed to write CSV header")?;
    writer.flush().context("Failed to flush CSV header")?;

    Ok(())
}

fn append_csv(path: &Path, rows: &[ProcessedRow]) -> Result<()> {
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    for row in rows {
        writer.serialize(row).context("Failed to write CSV row")?;
    }
    writer.flush().context("Failed to flush CSV rows")?;

    Ok(())
}

/// Appends `rows` in chunks of `batch_size`, pausing `delay` after each chunk.
/// Returns the number of batches written.
pub async fn append_csv_batches(
    path: &Path,
    rows: &[ProcessedRow],
    batch_size: usize,
    delay: Duration,
) -> Result<usize> {
    let mut batches = 0;

    for batch in rows.chunks(batch_size.max(1)) {
        append_csv(path, batch)?;
        batches += 1;
        tracing::debug!(rows = batch.len(), batch = batches, "Appended CSV batch");
        tokio::time::sleep(delay).await;
    }

    Ok(batches)
}

/// Writes every raw conversation as one JSON array, indented by four spaces.
pub fn write_json_snapshot(path: &Path, conversations: &[Value]) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path)
        .with_context(|| format!("Failed to create JSON file {}", path.display()))?;

    let mut writer = BufWriter::new(file);
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
    conversations
        .serialize(&mut serializer)
        .context("Failed to serialize conversations")?;
    writer.flush().context("Failed to flush JSON file")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn row(id: &str) -> ProcessedRow {
        ProcessedRow {
            conversation_id: id.to_owned(),
            start_time: "2024-07-21 09:15:00.000+0000".to_owned(),
            date: "2024-07-21".to_owned(),
            duration: "90000".to_owned(),
            status: "OPEN".to_owned(),
            skill_id: "4321".to_owned(),
            skill_name: "Support, Tier 1".to_owned(),
            agent_name: "Dana Agent".to_owned(),
            branch: "North".to_owned(),
            imei: "N/A".to_owned(),
            last_delivery_status: "ACCEPT".to_owned(),
        }
    }

    #[test]
    fn header_has_eleven_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Output").join("Conversations.csv");

        write_csv_header(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "Conversation ID,Start Time,Date,Duration,Status,Last Skill,Last Skill Name,\
             Latest Agent Full Name,Company Branch,IMEI,Last Delivery Status\n"
        );
    }

    #[test]
    fn header_lines_up_with_row_fields() {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(row("a")).unwrap();
        let serialized = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let field_names = serialized.lines().next().unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Conversations.csv");
        write_csv_header(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap().trim_end(), field_names);
    }

    #[test]
    fn header_truncates_previous_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Conversations.csv");
        std::fs::write(&path, "stale\n").unwrap();

        write_csv_header(&path).unwrap();

        assert!(!std::fs::read_to_string(&path).unwrap().contains("stale"));
    }

    #[tokio::test]
    async fn rows_are_appended_in_batches_after_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Conversations.csv");
        let rows: Vec<_> = ["a", "b", "c", "d", "e"].into_iter().map(row).collect();

        write_csv_header(&path).unwrap();
        let batches = append_csv_batches(&path, &rows, 2, Duration::ZERO).await.unwrap();

        assert_eq!(batches, 3);
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let ids: Vec<String> = reader
            .records()
            .map(|record| record.unwrap()[0].to_owned())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn commas_in_cells_are_quoted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Conversations.csv");

        write_csv_header(&path).unwrap();
        append_csv_batches(&path, &[row("a")], 100, Duration::ZERO).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"Support, Tier 1\""));
        let record = csv::Reader::from_path(&path).unwrap().records().next().unwrap().unwrap();
        assert_eq!(record.len(), 11);
        assert_eq!(&record[6], "Support, Tier 1");
    }

    #[tokio::test]
    async fn no_rows_means_no_batches() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Conversations.csv");

        write_csv_header(&path).unwrap();
        let batches = append_csv_batches(&path, &[], 100, Duration::ZERO).await.unwrap();

        assert_eq!(batches, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn json_snapshot_keeps_every_raw_conversation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Conversations.json");
        let conversations = vec![
            json!({ "info": { "conversationId": "a", "latestAgentFullName": "Zoë" } }),
            json!({ "info": { "conversationId": "b" }, "messageStatuses": [] }),
        ];

        write_json_snapshot(&path, &conversations).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Zoë"));
        assert!(content.contains("\n    {"));
        let parsed: Vec<Value> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, conversations);
    }
}
