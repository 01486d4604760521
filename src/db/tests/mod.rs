
use crate::db::NewDownloadRecord;
use crate::types::{MediaKind, StableId};

/// Build a record pointing at `local_path`
pub(super) fn new_record(stable_id: &str, chat_id: i64, local_path: &str) -> NewDownloadRecord {
    NewDownloadRecord {
        stable_id: StableId::from(stable_id),
        platform_file_ref: format!("ref-{stable_id}"),
        message_id: 42,
        chat_id,
        file_name: format!("42_{stable_id}.bin"),
        original_name: None,
        local_path: local_path.to_string(),
        size_bytes: Some(1024),
        kind: MediaKind::Document,
        mime_type: Some("application/octet-stream".to_string()),
        source_timestamp: Some(1_700_000_000),
    }
}
