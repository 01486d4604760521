//! Message fixtures for a fake chat history

use chrono::{TimeZone, Utc};
use chat_media_backup::{MediaItem, MediaKind, MessageRef, StableId};

/// Chat all fixtures live in
pub const CHAT_ID: i64 = -1_001_234_567_890;

/// One megabyte (binary)
pub const MB: u64 = 1024 * 1024;

fn message(id: i64, group_id: Option<i64>, media: Option<MediaItem>) -> MessageRef {
    MessageRef {
        message_id: id,
        chat_id: CHAT_ID,
        group_id,
        media,
        timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap(),
    }
}

/// Named document with an exact size
pub fn document_message(id: i64, group_id: Option<i64>, name: &str, size: u64) -> MessageRef {
    message(
        id,
        group_id,
        Some(MediaItem {
            stable_id: StableId::from(format!("doc-{id}")),
            platform_file_ref: format!("file-ref-{id}"),
            kind: MediaKind::Document,
            size_bytes: Some(size),
            suggested_name: Some(name.to_string()),
            mime_type: Some("application/octet-stream".to_string()),
        }),
    )
}

/// Photo without a reported size
pub fn photo_message(id: i64, group_id: Option<i64>) -> MessageRef {
    message(
        id,
        group_id,
        Some(MediaItem {
            stable_id: StableId::from(format!("photo-{id}")),
            platform_file_ref: format!("file-ref-{id}"),
            kind: MediaKind::Photo,
            size_bytes: None,
            suggested_name: None,
            mime_type: Some("image/jpeg".to_string()),
        }),
    )
}

/// Plain text message
pub fn text_message(id: i64, group_id: Option<i64>) -> MessageRef {
    message(id, group_id, None)
}
