// modguard-server/src/transport.rs

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use modguard_common::models::ChatMessageEvent;
use modguard_core::Error;
use modguard_core::executors::OutboundMessage;

/// Parses one JSON line into a chat event. Blank lines yield `Ok(None)`.
pub fn parse_event_line(line: &str) -> Result<Option<ChatMessageEvent>, Error> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let event: ChatMessageEvent = serde_json::from_str(trimmed)?;
    if event.username.trim().is_empty() {
        return Err(Error::Parse("event has an empty username".to_string()));
    }
    Ok(Some(event))
}

/// Feeds JSON-lines chat events from `reader` into `tx` until EOF.
/// Malformed lines are logged and skipped. Returns how many events went through.
pub async fn read_events<R>(reader: R, tx: mpsc::Sender<ChatMessageEvent>) -> Result<usize, Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0usize;
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        match parse_event_line(&line) {
            Ok(Some(event)) => {
                tx.send(event).await?;
                forwarded += 1;
            }
            Ok(None) => {}
            Err(e) => warn!("transport: skipping input line {}: {}", line_no, e),
        }
    }

    info!("transport: input closed after {} line(s)", line_no);
    Ok(forwarded)
}

/// Writes every outbound message to `writer` as one JSON line, flushing each.
pub async fn write_actions<W>(mut writer: W, mut rx: mpsc::Receiver<OutboundMessage>) -> Result<usize, Error>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0usize;
    while let Some(msg) = rx.recv().await {
        let mut line = serde_json::to_string(&msg)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        debug!("transport: wrote {}", msg.id());
        written += 1;
    }
    Ok(written)
}
