//! Destination file names for downloaded media

use crate::types::{MediaItem, MediaKind, MessageRef};
use crate::utils::sanitize_file_name;

/// Timestamp layout used in generated names
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Name the file for `media` attached to `message`
///
/// - photos: `photo_{message_id}_{timestamp}.jpg`
/// - documents and videos with a sender-supplied name: `{message_id}_{name}`
/// - documents and videos without one: `document_{message_id}_{timestamp}{ext}`, the
///   extension derived from the MIME type
pub fn file_name_for(message: &MessageRef, media: &MediaItem) -> String {
    let timestamp = message.timestamp.format(TIMESTAMP_FORMAT);

    match media.kind {
        MediaKind::Photo => format!("photo_{}_{}.jpg", message.message_id, timestamp),
        MediaKind::Video | MediaKind::Document => {
            let original = media
                .suggested_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(sanitize_file_name);

            match original {
                Some(name) => format!("{}_{}", message.message_id, name),
                None => format!(
                    "document_{}_{}{}",
                    message.message_id,
                    timestamp,
                    extension_for_mime(media.mime_type.as_deref())
                ),
            }
        }
    }
}

/// File extension (with leading dot) for a declared MIME type
pub fn extension_for_mime(mime_type: Option<&str>) -> &'static str {
    let Some(mime) = mime_type else {
        return ".bin";
    };
    let mime = mime.to_ascii_lowercase();

    if mime.starts_with("video/") {
        ".mp4"
    } else if mime.starts_with("image/") {
        if mime.contains("gif") { ".gif" } else { ".jpg" }
    } else if mime.starts_with("audio/") {
        ".mp3"
    } else {
        ".bin"
    }
}
