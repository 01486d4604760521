//! Album-sibling strategies, tried in order until one finds something

use super::{MessageFilter, MessageLookup};
use crate::Result;
use crate::config::ResolverConfig;
use crate::types::{MediaSet, MessageRef};
use async_trait::async_trait;
use std::collections::HashMap;

/// Inputs shared by every strategy for one resolution
pub struct StrategyContext<'a> {
    /// Chat history access
    pub lookup: &'a dyn MessageLookup,
    /// The forwarded message being resolved
    pub trigger: &'a MessageRef,
    /// Album size the user forwarded, if known
    pub expected_count: Option<usize>,
    /// Search limits
    pub config: &'a ResolverConfig,
}

impl StrategyContext<'_> {
    fn window(&self) -> MessageFilter {
        MessageFilter::window(self.trigger.message_id, self.config.search_window)
    }

    /// Group id to search for, when the trigger carries media and a group
    fn trigger_group(&self) -> Option<i64> {
        if self.trigger.has_media() {
            self.trigger.group_id
        } else {
            None
        }
    }
}

/// One step of the fallback chain
///
/// `Ok(None)` (or an empty set) hands over to the next strategy. Errors are logged by
/// the resolver and also hand over.
#[async_trait]
pub trait ResolveStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the strategy does not apply or found nothing
    async fn resolve(&self, ctx: &StrategyContext<'_>) -> Result<Option<MediaSet>>;
}

/// Messages in the window around the trigger sharing its group id
pub struct NearbyGroup;

#[async_trait]
impl ResolveStrategy for NearbyGroup {
    fn name(&self) -> &'static str {
        "nearby_group"
    }

    async fn resolve(&self, ctx: &StrategyContext<'_>) -> Result<Option<MediaSet>> {
        let Some(group_id) = ctx.trigger_group() else {
            return Ok(None);
        };

        let filter = ctx.window().with_group(group_id);
        let found = sorted_with_media(
            ctx.lookup
                .iter_messages(ctx.trigger.chat_id, &filter)
                .await?
                .into_iter()
                .filter(|m| m.group_id == Some(group_id)),
        );
        if found.is_empty() {
            return Ok(None);
        }

        if ctx.expected_count == Some(found.len()) {
            tracing::info!(group_id, size = found.len(), "Found exact album match near trigger");
        } else {
            tracing::info!(
                group_id,
                size = found.len(),
                expected = ?ctx.expected_count,
                "Found album near trigger"
            );
        }
        Ok(Some(MediaSet::from_messages(found)))
    }
}

/// Flat scan of recent history for the trigger's group id
pub struct RecentScan;

#[async_trait]
impl ResolveStrategy for RecentScan {
    fn name(&self) -> &'static str {
        "recent_scan"
    }

    async fn resolve(&self, ctx: &StrategyContext<'_>) -> Result<Option<MediaSet>> {
        let Some(group_id) = ctx.trigger_group() else {
            return Ok(None);
        };

        let filter = MessageFilter::recent(ctx.config.recent_scan_limit).with_group(group_id);
        let found = sorted_with_media(
            ctx.lookup
                .iter_messages(ctx.trigger.chat_id, &filter)
                .await?
                .into_iter()
                .filter(|m| m.group_id == Some(group_id)),
        );
        if found.is_empty() {
            return Ok(None);
        }

        tracing::info!(group_id, size = found.len(), "Found album in recent history");
        Ok(Some(MediaSet::from_messages(found)))
    }
}

/// Any album in the window, chosen by size
///
/// Every message with a group id and media is bucketed by group. With an expected
/// count the bucket closest in size wins (an exact match is simply distance zero);
/// without one the largest bucket wins. Ties go to the bucket nearest the trigger.
///
/// Scans the window only when the trigger carries media and has a group id or an
/// expected count. A trigger with media but neither of those yields `None` without a
/// lookup, so a single forwarded file resolves to itself plus its replies.
pub struct GroupBucket;

#[async_trait]
impl ResolveStrategy for GroupBucket {
    fn name(&self) -> &'static str {
        "group_bucket"
    }

    async fn resolve(&self, ctx: &StrategyContext<'_>) -> Result<Option<MediaSet>> {
        if !ctx.trigger.has_media()
            || (ctx.trigger.group_id.is_none() && ctx.expected_count.is_none())
        {
            return Ok(None);
        }

        let mut buckets: HashMap<i64, Vec<MessageRef>> = HashMap::new();
        for message in ctx
            .lookup
            .iter_messages(ctx.trigger.chat_id, &ctx.window())
            .await?
        {
            if let Some(group_id) = message.group_id
                && message.has_media()
            {
                buckets.entry(group_id).or_default().push(message);
            }
        }
        if buckets.is_empty() {
            return Ok(None);
        }

        let trigger_id = ctx.trigger.message_id;
        let distance = |messages: &[MessageRef]| {
            messages
                .iter()
                .map(|m| m.message_id.abs_diff(trigger_id))
                .min()
                .unwrap_or(u64::MAX)
        };

        let chosen = match ctx.expected_count {
            Some(expected) => buckets.into_iter().min_by_key(|(group_id, messages)| {
                (
                    messages.len().abs_diff(expected),
                    distance(messages.as_slice()),
                    *group_id,
                )
            }),
            None => buckets.into_iter().min_by_key(|(group_id, messages)| {
                (
                    std::cmp::Reverse(messages.len()),
                    distance(messages.as_slice()),
                    *group_id,
                )
            }),
        };

        let Some((group_id, messages)) = chosen else {
            return Ok(None);
        };
        tracing::info!(
            group_id,
            size = messages.len(),
            expected = ?ctx.expected_count,
            "Picked album bucket from trigger window"
        );
        Ok(Some(MediaSet::from_messages(sorted_with_media(messages))))
    }
}

/// The trigger alone, when it carries media
pub struct TriggerOnly;

#[async_trait]
impl ResolveStrategy for TriggerOnly {
    fn name(&self) -> &'static str {
        "trigger_only"
    }

    async fn resolve(&self, ctx: &StrategyContext<'_>) -> Result<Option<MediaSet>> {
        if !ctx.trigger.has_media() {
            return Ok(None);
        }
        Ok(Some(MediaSet::from_messages([ctx.trigger.clone()])))
    }
}

fn sorted_with_media(messages: impl IntoIterator<Item = MessageRef>) -> Vec<MessageRef> {
    let mut found: Vec<MessageRef> = messages.into_iter().filter(|m| m.has_media()).collect();
    found.sort_by_key(|m| m.message_id);
    found
}
