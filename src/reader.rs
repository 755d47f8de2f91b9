use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::Sender;

use crate::error::Result;
use crate::schema::PatientInfo;

/// Stream patient requests from a JSONL file, one `PatientInfo` per line.
/// Blank and malformed lines are skipped with a warning. Returns the number
/// of requests sent.
pub async fn stream_patients(path: &str, sender: Sender<PatientInfo>) -> Result<usize> {
    let file = File::open(path).await?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();
    let mut sent = 0;
    let mut line_no = 0;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<PatientInfo>(&line) {
            Ok(patient) => {
                if sender.send(patient).await.is_err() {
                    tracing::warn!("Intake receiver dropped");
                    break;
                }
                sent += 1;
            }
            Err(err) => tracing::warn!(line = line_no, "Invalid patient request skipped: {}", err),
        }
    }

    Ok(sent)
}
