//! Webhook message rendering.

use std::fmt::Write;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use super::RenderMode;
use crate::engine::{BatchItem, ItemKind, NotificationBatch};

/// Discord accepts at most this many embeds per message.
pub const MAX_EMBEDS_PER_MESSAGE: usize = 10;

/// Discord rejects message text longer than this.
pub const MAX_CONTENT_CHARS: usize = 2000;

/// Discord rejects embed titles longer than this.
const MAX_TITLE_CHARS: usize = 256;

const LIVE_COLOR: u32 = 0x00e7_4c3c; // Red
const UPCOMING_COLOR: u32 = 0x00f3_9c12; // Orange

/// One webhook POST body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookMessage {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    /// Streams this message announces. Not sent.
    #[serde(skip)]
    pub stream_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Thumbnail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thumbnail {
    pub url: String,
}

/// Render a batch into one or more webhook messages sharing the batch
/// identity.
#[must_use]
pub fn render_messages(
    batch: &NotificationBatch,
    mode: RenderMode,
    offset: FixedOffset,
) -> Vec<WebhookMessage> {
    let message = |content: Option<String>, embeds: Vec<Embed>, items: &[BatchItem]| {
        WebhookMessage {
            username: batch.identity.name.clone(),
            avatar_url: batch.identity.avatar_url.clone(),
            content,
            embeds,
            stream_ids: items.iter().map(|i| i.record.id.clone()).collect(),
        }
    };

    match mode {
        RenderMode::Embeds => batch
            .items
            .chunks(MAX_EMBEDS_PER_MESSAGE)
            .map(|chunk| {
                let embeds = chunk.iter().map(|i| embed(i, offset)).collect();
                message(None, embeds, chunk)
            })
            .collect(),
        RenderMode::Text => {
            let lines: Vec<String> = batch.items.iter().map(|i| text_line(i, offset)).collect();
            let mut start = 0;
            chunk_lines(&lines, MAX_CONTENT_CHARS)
                .into_iter()
                .map(|(content, count)| {
                    let items = &batch.items[start..start + count];
                    start += count;
                    message(Some(content), Vec::new(), items)
                })
                .collect()
        }
    }
}

/// Short headline for an item, e.g. "🔴 Pekora is live with Miko".
#[must_use]
pub fn headline(item: &BatchItem) -> String {
    let channel = item.record.channel.display_name();
    let mut line = if item.is_live() {
        format!("🔴 {channel} is live")
    } else {
        format!("⏰ {channel} starts soon")
    };
    if item.kind == ItemKind::Mentioned && !item.attributed_names.is_empty() {
        let _ = write!(line, " with {}", item.attributed_names.join(", "));
    }
    line
}

/// Rich card for an item.
#[must_use]
pub fn embed(item: &BatchItem, offset: FixedOffset) -> Embed {
    let record = &item.record;
    let mut description = String::new();
    if !record.title.is_empty() {
        let _ = writeln!(description, "**{}**", record.title);
    }
    description.push_str(&record.watch_url());
    if let Some(at) = record.start_time() {
        let verb = if item.is_live() { "Started" } else { "Starts" };
        let _ = write!(description, "\n{verb} at {}", local_time(at, offset));
    }

    Embed {
        title: truncate(&headline(item), MAX_TITLE_CHARS),
        description,
        color: if item.is_live() {
            LIVE_COLOR
        } else {
            UPCOMING_COLOR
        },
        url: Some(record.watch_url()),
        timestamp: record.start_time().map(|at| at.to_rfc3339()),
        thumbnail: record
            .channel
            .photo
            .clone()
            .map(|url| Thumbnail { url }),
    }
}

/// Single-line rendering for text mode and console output.
#[must_use]
pub fn text_line(item: &BatchItem, offset: FixedOffset) -> String {
    let record = &item.record;
    let mut line = headline(item);
    if !record.title.is_empty() {
        let _ = write!(line, ": {}", record.title);
    }
    if let Some(at) = record.start_time() {
        let _ = write!(line, " ({})", local_time(at, offset));
    }
    let _ = write!(line, " <{}>", record.watch_url());
    line
}

/// Format an instant in the display offset.
#[must_use]
pub fn local_time(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset)
        .format("%Y-%m-%d %H:%M %:z")
        .to_string()
}

/// Pack lines into messages no longer than `max_chars` characters, returning
/// each message with the number of lines it holds. A single oversized line is
/// truncated.
fn chunk_lines(lines: &[String], max_chars: usize) -> Vec<(String, usize)> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;
    let mut current_lines = 0;

    for line in lines {
        let line = truncate(line, max_chars);
        let line_chars = line.chars().count();
        let needed = if current.is_empty() {
            line_chars
        } else {
            current_chars + 1 + line_chars
        };

        if needed > max_chars && !current.is_empty() {
            chunks.push((std::mem::take(&mut current), current_lines));
            current_chars = 0;
            current_lines = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_chars += 1;
        }
        current.push_str(&line);
        current_chars += line_chars;
        current_lines += 1;
    }

    if !current.is_empty() {
        chunks.push((current, current_lines));
    }
    chunks
}

/// Truncate to `max` characters, respecting UTF-8 boundaries.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{truncated}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Identity;
    use crate::holodex::{ChannelRef, StreamRecord, StreamStatus};

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    fn item(id: &str, status: StreamStatus) -> BatchItem {
        let record = StreamRecord::new(
            id,
            ChannelRef::new("UC1", "Pekora").with_photo("https://img/pekora.png"),
            "Minecraft",
            status,
        )
        .scheduled_at("2026-10-19T12:00:00Z".parse().unwrap());
        BatchItem::direct(record)
    }

    fn batch(items: Vec<BatchItem>) -> NotificationBatch {
        NotificationBatch {
            items,
            identity: Identity::new("Pekora", Some("https://img/pekora.png".to_string())),
        }
    }

    #[test]
    fn test_local_time_uses_offset() {
        let at = "2026-10-19T12:00:00Z".parse().unwrap();
        assert_eq!(local_time(at, offset()), "2026-10-19 20:00 +08:00");
    }

    #[test]
    fn test_embed_for_upcoming() {
        let embed = embed(&item("vid1", StreamStatus::Upcoming), offset());
        assert_eq!(embed.title, "⏰ Pekora starts soon");
        assert_eq!(embed.color, UPCOMING_COLOR);
        assert!(embed.description.contains("**Minecraft**"));
        assert!(embed
            .description
            .contains("https://www.youtube.com/watch?v=vid1"));
        assert!(embed.description.contains("Starts at 2026-10-19 20:00 +08:00"));
        assert_eq!(
            embed.thumbnail.map(|t| t.url).as_deref(),
            Some("https://img/pekora.png")
        );
    }

    #[test]
    fn test_mentioned_headline_names_tracked_channels() {
        let mut mentioned = item("vid1", StreamStatus::Live);
        mentioned.kind = ItemKind::Mentioned;
        mentioned.attributed_ids = vec!["UC2".to_string(), "UC3".to_string()];
        mentioned.attributed_names = vec!["Miko".to_string(), "Suisei".to_string()];

        assert_eq!(headline(&mentioned), "🔴 Pekora is live with Miko, Suisei");
    }

    #[test]
    fn test_embeds_are_chunked() {
        let items = (0..23)
            .map(|i| item(&format!("v{i}"), StreamStatus::Live))
            .collect();
        let messages = render_messages(&batch(items), RenderMode::Embeds, offset());

        let sizes: Vec<_> = messages.iter().map(|m| m.embeds.len()).collect();
        assert_eq!(sizes, [10, 10, 3]);
        assert_eq!(messages[2].stream_ids, ["v20", "v21", "v22"]);
        assert!(messages.iter().all(|m| m.username == "Pekora"));
        assert!(messages.iter().all(|m| m.content.is_none()));
    }

    #[test]
    fn test_text_mode() {
        let messages = render_messages(
            &batch(vec![
                item("a", StreamStatus::Live),
                item("b", StreamStatus::Upcoming),
            ]),
            RenderMode::Text,
            offset(),
        );

        assert_eq!(messages.len(), 1);
        let content = messages[0].content.as_deref().unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.starts_with("🔴 Pekora is live: Minecraft"));
        assert!(messages[0].embeds.is_empty());
        assert_eq!(messages[0].stream_ids, ["a", "b"]);
    }

    #[test]
    fn test_chunk_lines_respects_limit() {
        let lines: Vec<String> = (0..5).map(|i| format!("{i}{}", "x".repeat(9))).collect();
        let chunks = chunk_lines(&lines, 25);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|(c, _)| c.chars().count() <= 25));
        let counts: Vec<_> = chunks.iter().map(|(_, n)| *n).collect();
        assert_eq!(counts, [2, 2, 1]);
    }

    #[test]
    fn test_payload_shape() {
        let messages = render_messages(
            &batch(vec![item("a", StreamStatus::Live)]),
            RenderMode::Embeds,
            offset(),
        );
        let json = serde_json::to_value(&messages[0]).unwrap();

        assert_eq!(json["username"], "Pekora");
        assert_eq!(json["avatar_url"], "https://img/pekora.png");
        assert!(json.get("content").is_none());
        assert!(json.get("stream_ids").is_none());
        assert_eq!(json["embeds"][0]["thumbnail"]["url"], "https://img/pekora.png");
    }
}
