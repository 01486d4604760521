//! Core types for chat-media-backup

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Platform-issued identifier unique to one piece of media content
///
/// Independent of which message referenced the media, so the same photo forwarded
/// into two chats carries the same id. Used as the record store key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StableId(pub String);

impl StableId {
    /// Create a new StableId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StableId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for StableId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i64> for StableId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for StableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for StableId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for StableId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for StableId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <String as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Kind of media attached to a message
///
/// This is the single point of dispatch for naming and sizing decisions; callers
/// match on it exhaustively instead of inspecting platform types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Compressed photo (no original file name, size often only estimated)
    Photo,
    /// Video sent as a document
    Video,
    /// Any other document (files, GIFs, audio, stickers)
    Document,
}

impl MediaKind {
    /// Classify a document by its MIME type
    ///
    /// Photos are never derived from a MIME type; the platform marks them explicitly.
    pub fn from_mime(mime_type: Option<&str>) -> Self {
        match mime_type {
            Some(mime) if mime.starts_with("video/") => MediaKind::Video,
            _ => MediaKind::Document,
        }
    }

    /// Name used in the record store
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
        }
    }

    /// Parse the record store name; unknown values fall back to `Document`
    pub fn from_db(value: &str) -> Self {
        match value {
            "photo" => MediaKind::Photo,
            "video" => MediaKind::Video,
            _ => MediaKind::Document,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl sqlx::Type<sqlx::Sqlite> for MediaKind {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for MediaKind {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.as_str().to_string(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for MediaKind {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let kind = <String as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self::from_db(&kind))
    }
}

/// One attachable file referenced by a message
///
/// Immutable once read from the source message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Content identifier, the record store key
    pub stable_id: StableId,
    /// Platform handle needed to fetch the bytes again (access hash, file id, ...)
    pub platform_file_ref: String,
    /// Photo, video or document
    pub kind: MediaKind,
    /// Exact size when the platform reports one
    pub size_bytes: Option<u64>,
    /// Original file name, if the sender's client supplied one
    pub suggested_name: Option<String>,
    /// Declared MIME type
    pub mime_type: Option<String>,
}

/// A message as seen by the ingestion core (read-only)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    /// Message id within its chat
    pub message_id: i64,
    /// Chat the message lives in
    pub chat_id: i64,
    /// Media-group (album) identifier
    pub group_id: Option<i64>,
    /// Attached media, if any
    pub media: Option<MediaItem>,
    /// When the message was sent
    pub timestamp: DateTime<Utc>,
}

impl MessageRef {
    /// Whether the message carries an attachment
    pub fn has_media(&self) -> bool {
        self.media.is_some()
    }
}

/// Photo/video/document counts of a media set
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCounts {
    /// Number of photos
    pub photos: usize,
    /// Number of videos
    pub videos: usize,
    /// Number of other documents
    pub documents: usize,
}

/// Ordered, deduplicated set of messages forming one backup unit
///
/// Every member carries media; messages without media are dropped on construction,
/// so an empty set means there is nothing to download.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediaSet {
    messages: Vec<MessageRef>,
}

impl MediaSet {
    /// Build a set, keeping the first occurrence of every message id and only messages with media
    pub fn from_messages(messages: impl IntoIterator<Item = MessageRef>) -> Self {
        let mut set = Self::default();
        set.extend(messages);
        set
    }

    /// Append messages that are not already members, preserving order
    pub fn extend(&mut self, messages: impl IntoIterator<Item = MessageRef>) {
        let mut seen: HashSet<i64> = self.messages.iter().map(|m| m.message_id).collect();
        for message in messages {
            if message.has_media() && seen.insert(message.message_id) {
                self.messages.push(message);
            }
        }
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when there is nothing to download
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Members in order
    pub fn messages(&self) -> &[MessageRef] {
        &self.messages
    }

    /// Iterate over members
    pub fn iter(&self) -> std::slice::Iter<'_, MessageRef> {
        self.messages.iter()
    }

    /// Member message ids in order
    pub fn message_ids(&self) -> Vec<i64> {
        self.messages.iter().map(|m| m.message_id).collect()
    }

    /// Count members by media kind
    pub fn kind_counts(&self) -> KindCounts {
        let mut counts = KindCounts::default();
        for media in self.messages.iter().filter_map(|m| m.media.as_ref()) {
            match media.kind {
                MediaKind::Photo => counts.photos += 1,
                MediaKind::Video => counts.videos += 1,
                MediaKind::Document => counts.documents += 1,
            }
        }
        counts
    }

    /// Consume the set
    pub fn into_messages(self) -> Vec<MessageRef> {
        self.messages
    }
}

impl<'a> IntoIterator for &'a MediaSet {
    type Item = &'a MessageRef;
    type IntoIter = std::slice::Iter<'a, MessageRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

/// Request to back up the unit a forwarded message belongs to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRequest {
    /// Chat the original message lives in
    pub chat_id: i64,
    /// Id of the original (trigger) message
    pub message_id: i64,
    /// Number of album members the user forwarded, when the forward arrived as an album
    pub expected_count: Option<usize>,
}

impl ResolveRequest {
    /// Request for a single forwarded message
    pub fn single(chat_id: i64, message_id: i64) -> Self {
        Self {
            chat_id,
            message_id,
            expected_count: None,
        }
    }

    /// Request for a forwarded album of `expected_count` messages
    pub fn album(chat_id: i64, message_id: i64, expected_count: usize) -> Self {
        Self {
            chat_id,
            message_id,
            expected_count: Some(expected_count),
        }
    }
}
