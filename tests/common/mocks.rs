//! In-memory stand-ins for the chat platform and the status sink

use async_trait::async_trait;
use chat_media_backup::engine::ProgressCallback;
use chat_media_backup::{
    Error, FetchError, MediaFetcher, MediaItem, MessageFilter, MessageLookup, MessageRef, Result,
    SinkError, StatusSink,
};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Chat history held in memory
#[derive(Default)]
pub struct FakeChat {
    messages: Vec<MessageRef>,
    replies: HashMap<i64, Vec<MessageRef>>,
}

impl FakeChat {
    pub fn new(messages: Vec<MessageRef>) -> Self {
        Self {
            messages,
            replies: HashMap::new(),
        }
    }

    pub fn with_replies(mut self, message_id: i64, replies: Vec<MessageRef>) -> Self {
        self.replies.insert(message_id, replies);
        self
    }
}

#[async_trait]
impl MessageLookup for FakeChat {
    async fn get_message(&self, chat_id: i64, message_id: i64) -> Result<Option<MessageRef>> {
        Ok(self
            .messages
            .iter()
            .find(|m| m.chat_id == chat_id && m.message_id == message_id)
            .cloned())
    }

    async fn iter_messages(&self, chat_id: i64, filter: &MessageFilter) -> Result<Vec<MessageRef>> {
        Ok(filter.apply(
            self.messages
                .iter()
                .filter(|m| m.chat_id == chat_id)
                .cloned(),
        ))
    }

    async fn get_replies(&self, chat_id: i64, message_id: i64) -> Result<Vec<MessageRef>> {
        if chat_id == 0 {
            return Err(Error::Lookup("private chat".into()));
        }
        Ok(self.replies.get(&message_id).cloned().unwrap_or_default())
    }
}

/// Fetcher that writes sparse files of the media's size
///
/// Photos without a size are written at `photo_size` bytes. Failures can be queued
/// per stable id and are played back before the item succeeds.
pub struct FakeFetcher {
    photo_size: u64,
    failures: Mutex<HashMap<String, VecDeque<FetchError>>>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn new(photo_size: u64) -> Self {
        Self {
            photo_size,
            failures: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_first(self, stable_id: &str, failures: Vec<FetchError>) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(stable_id.to_string(), VecDeque::from(failures));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn fetch(
        &self,
        item: &MediaItem,
        destination: &Path,
        on_progress: &ProgressCallback,
    ) -> std::result::Result<u64, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let queued = self
            .failures
            .lock()
            .unwrap()
            .get_mut(item.stable_id.as_str())
            .and_then(|queue| queue.pop_front());
        if let Some(error) = queued {
            return Err(error);
        }

        let size = item.size_bytes.unwrap_or(self.photo_size);
        let file = tokio::fs::File::create(destination).await?;
        file.set_len(size).await?;
        on_progress(size);
        Ok(size)
    }
}

/// Sink that remembers every text it was given
#[derive(Default)]
pub struct RecordingSink {
    texts: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.texts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl StatusSink for RecordingSink {
    async fn update(&self, text: &str) -> std::result::Result<(), SinkError> {
        let mut texts = self.texts.lock().unwrap();
        if texts.last().is_some_and(|last| last == text) {
            return Err(SinkError::NotModified);
        }
        texts.push(text.to_string());
        Ok(())
    }
}
