//! Newline-delimited JSON feed from the gateway relay.
//!
//! ```text
//! {"type":"selection","actor":"42","posting":{...},"token":"🔥","kind":"add"}
//! {"type":"menu_published","menu":7,"message":"123"}
//! {"type":"menu_changed","posting":{"guild":"1","channel":"2","message":"3"}}
//! {"type":"menu_deleted","posting":{"guild":"1","channel":"2","message":"3"}}
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use rolesync_engine::MenuRegistry;
use rolesync_types::{MenuId, MessageId, PostingRef, SelectionEvent};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    Selection(SelectionEvent),
    MenuPublished { menu: MenuId, message: MessageId },
    MenuChanged { posting: PostingRef },
    MenuDeleted { posting: PostingRef },
}

/// Parse one feed line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Envelope>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .context("Malformed feed line")
}

/// Route envelopes until the input ends: selections go to the engine,
/// menu lifecycle notices update the registry directly.
pub async fn pump<R>(
    input: R,
    events: mpsc::Sender<SelectionEvent>,
    registry: Arc<MenuRegistry>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("Failed to read feed")? {
        let envelope = match parse_line(&line) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "Skipping feed line");
                continue;
            }
        };

        match envelope {
            Envelope::Selection(event) => {
                if events.send(event).await.is_err() {
                    tracing::warn!("Engine stopped; closing feed");
                    break;
                }
            }
            Envelope::MenuPublished { menu, message } => {
                if let Err(e) = registry.publish(menu, message).await {
                    tracing::warn!(menu = %menu, error = %e, "Publish failed");
                }
            }
            Envelope::MenuChanged { posting } | Envelope::MenuDeleted { posting } => {
                registry.invalidate(posting);
                tracing::debug!(posting = %posting, "Menu cache entry invalidated");
            }
        }
    }
    Ok(())
}
