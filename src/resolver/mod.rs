//! Media-set resolver
//!
//! Turns one trigger message (the original behind a forward) into the complete,
//! ordered [`MediaSet`] that forms one backup unit: the trigger's album siblings, or
//! the trigger alone, plus every reply that carries media.
//!
//! ## Submodules
//!
//! - [`strategies`] - the ordered fallback chain used to find album siblings
//!
//! The chain runs until one strategy produces a non-empty set. Lookup failures inside
//! a strategy are logged and treated as "nothing found"; only an unreachable trigger
//! message fails the whole request.

use crate::config::ResolverConfig;
use crate::types::{MediaSet, MessageRef, ResolveRequest};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

pub mod strategies;

pub use strategies::{
    GroupBucket, NearbyGroup, RecentScan, ResolveStrategy, StrategyContext, TriggerOnly,
};

/// Read access to a chat's message history
///
/// Implemented by the chat-platform adapter. Errors are reported as
/// [`Error::Lookup`].
#[async_trait]
pub trait MessageLookup: Send + Sync {
    /// Fetch one message, `None` when it does not exist
    async fn get_message(&self, chat_id: i64, message_id: i64) -> Result<Option<MessageRef>>;

    /// Fetch messages matching `filter`, newest first
    async fn iter_messages(&self, chat_id: i64, filter: &MessageFilter) -> Result<Vec<MessageRef>>;

    /// Fetch the replies in the thread of a message
    async fn get_replies(&self, chat_id: i64, message_id: i64) -> Result<Vec<MessageRef>>;
}

/// Filter for [`MessageLookup::iter_messages`]
///
/// `min_id`/`max_id` are inclusive. `limit` bounds how many messages are scanned
/// (newest first) and `group_id` is applied to the scanned messages, so a limited
/// scan with a group filter can return fewer than `limit` results.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageFilter {
    /// Lowest message id to include
    pub min_id: Option<i64>,
    /// Highest message id to include
    pub max_id: Option<i64>,
    /// Maximum number of messages to scan
    pub limit: Option<usize>,
    /// Only keep members of this media group
    pub group_id: Option<i64>,
}

impl MessageFilter {
    /// Messages within `radius` ids of `center`, never below id 1
    pub fn window(center: i64, radius: i64) -> Self {
        Self {
            min_id: Some(center.saturating_sub(radius).max(1)),
            max_id: Some(center.saturating_add(radius)),
            ..Default::default()
        }
    }

    /// The `limit` most recent messages
    pub fn recent(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }

    /// Restrict to one media group
    pub fn with_group(mut self, group_id: i64) -> Self {
        self.group_id = Some(group_id);
        self
    }

    /// Whether a message falls inside the id range
    pub fn in_range(&self, message: &MessageRef) -> bool {
        self.min_id.is_none_or(|min| message.message_id >= min)
            && self.max_id.is_none_or(|max| message.message_id <= max)
    }

    /// Apply the filter to an in-memory history
    ///
    /// Adapters that hold messages locally (caches, tests) can use this to honour the
    /// filter semantics exactly.
    pub fn apply(&self, messages: impl IntoIterator<Item = MessageRef>) -> Vec<MessageRef> {
        let mut scanned: Vec<MessageRef> = messages
            .into_iter()
            .filter(|m| self.in_range(m))
            .collect();
        scanned.sort_by(|a, b| b.message_id.cmp(&a.message_id));
        if let Some(limit) = self.limit {
            scanned.truncate(limit);
        }
        if let Some(group_id) = self.group_id {
            scanned.retain(|m| m.group_id == Some(group_id));
        }
        scanned
    }
}

/// Resolves trigger messages into media sets
pub struct MediaSetResolver {
    lookup: Arc<dyn MessageLookup>,
    config: ResolverConfig,
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl MediaSetResolver {
    /// Resolver with the default strategy chain:
    /// nearby group → recent scan → group bucket → trigger only
    pub fn new(lookup: Arc<dyn MessageLookup>, config: ResolverConfig) -> Self {
        Self::with_strategies(lookup, config, default_strategies())
    }

    /// Resolver with a custom strategy chain, tried in order
    pub fn with_strategies(
        lookup: Arc<dyn MessageLookup>,
        config: ResolverConfig,
        strategies: Vec<Box<dyn ResolveStrategy>>,
    ) -> Self {
        Self {
            lookup,
            config,
            strategies,
        }
    }

    /// Names of the configured strategies in execution order
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Resolve the media set for a forwarded message
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lookup`] when the trigger message itself cannot be fetched.
    /// Every later lookup failure degrades to a smaller set instead.
    pub async fn resolve(&self, request: &ResolveRequest) -> Result<MediaSet> {
        let trigger = match self
            .lookup
            .get_message(request.chat_id, request.message_id)
            .await
        {
            Ok(Some(message)) => message,
            Ok(None) => {
                return Err(Error::Lookup(format!(
                    "message {} not found in chat {}",
                    request.message_id, request.chat_id
                )));
            }
            Err(e) => {
                return Err(Error::Lookup(format!(
                    "failed to fetch message {} in chat {}: {}",
                    request.message_id, request.chat_id, e
                )));
            }
        };

        let mut set = self.resolve_primary(&trigger, request.expected_count).await;

        match self
            .lookup
            .get_replies(request.chat_id, request.message_id)
            .await
        {
            Ok(replies) => {
                let before = set.len();
                set.extend(replies);
                if set.len() > before {
                    tracing::debug!(
                        message_id = request.message_id,
                        replies_with_media = set.len() - before,
                        "Added reply attachments"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    chat_id = request.chat_id,
                    message_id = request.message_id,
                    error = %e,
                    "Failed to fetch replies, continuing without them"
                );
            }
        }

        tracing::info!(
            chat_id = request.chat_id,
            message_id = request.message_id,
            size = set.len(),
            "Resolved media set"
        );
        Ok(set)
    }

    async fn resolve_primary(&self, trigger: &MessageRef, expected_count: Option<usize>) -> MediaSet {
        let ctx = StrategyContext {
            lookup: self.lookup.as_ref(),
            trigger,
            expected_count,
            config: &self.config,
        };

        for strategy in &self.strategies {
            match strategy.resolve(&ctx).await {
                Ok(Some(set)) if !set.is_empty() => {
                    tracing::debug!(
                        strategy = strategy.name(),
                        size = set.len(),
                        "Strategy produced media set"
                    );
                    return set;
                }
                Ok(_) => {
                    tracing::debug!(strategy = strategy.name(), "Strategy found nothing");
                }
                Err(e) => {
                    tracing::warn!(
                        strategy = strategy.name(),
                        message_id = trigger.message_id,
                        error = %e,
                        "Resolver step failed, falling through"
                    );
                }
            }
        }

        MediaSet::default()
    }
}

fn default_strategies() -> Vec<Box<dyn ResolveStrategy>> {
    vec![
        Box::new(NearbyGroup),
        Box::new(RecentScan),
        Box::new(GroupBucket),
        Box::new(TriggerOnly),
    ]
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
