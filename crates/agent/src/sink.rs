//! Event output as JSON lines

use agent_lib::Event;
use anyhow::{Context, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

/// Write every received event as one JSON object per line
///
/// Returns the number of events written once the channel closes.
pub async fn write_events<W>(mut rx: mpsc::Receiver<Event>, mut out: W) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;

    while let Some(event) = rx.recv().await {
        let mut line = serde_json::to_vec(&event).context("Failed to serialize event")?;
        line.push(b'\n');
        out.write_all(&line)
            .await
            .context("Failed to write event")?;
        out.flush().await.context("Failed to flush events")?;
        written += 1;
    }

    debug!(written, "Event sink closed");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Map, Value};

    fn event(name: &str) -> Event {
        let mut data = Map::new();
        data.insert("metrics.resource.name".into(), Value::from(name));
        data.insert("metrics.cpu.usage".into(), Value::from(0.5));
        Event {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap(),
            data,
        }
    }

    #[tokio::test]
    async fn test_write_events_as_json_lines() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(event("web-0")).await.unwrap();
        tx.send(event("web-1")).await.unwrap();
        drop(tx);

        let mut out = Vec::new();
        let written = write_events(rx, &mut out).await.unwrap();
        assert_eq!(written, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            json!({
                "timestamp": "2024-01-10T09:00:00Z",
                "data": {"metrics.resource.name": "web-0", "metrics.cpu.usage": 0.5}
            })
        );
    }

    #[tokio::test]
    async fn test_closed_channel_writes_nothing() {
        let (tx, rx) = mpsc::channel::<Event>(1);
        drop(tx);

        let mut out = Vec::new();
        assert_eq!(write_events(rx, &mut out).await.unwrap(), 0);
        assert!(out.is_empty());
    }
}
