//! Tests for the media-set resolver and its strategies.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};

use super::*;
use crate::types::{MediaItem, MediaKind, StableId};

const CHAT: i64 = -100_555;

// ===================================================================
// In-memory MessageLookup
// ===================================================================

#[derive(Default)]
struct InMemoryLookup {
    history: Vec<MessageRef>,
    replies: HashMap<i64, Vec<MessageRef>>,
    fail_iter: bool,
    fail_replies: bool,
    filters_seen: Mutex<Vec<MessageFilter>>,
}

impl InMemoryLookup {
    fn with_history(history: Vec<MessageRef>) -> Self {
        Self {
            history,
            ..Default::default()
        }
    }
}

#[async_trait]
impl MessageLookup for InMemoryLookup {
    async fn get_message(&self, chat_id: i64, message_id: i64) -> Result<Option<MessageRef>> {
        Ok(self
            .history
            .iter()
            .find(|m| m.chat_id == chat_id && m.message_id == message_id)
            .cloned())
    }

    async fn iter_messages(&self, chat_id: i64, filter: &MessageFilter) -> Result<Vec<MessageRef>> {
        self.filters_seen.lock().unwrap().push(filter.clone());
        if self.fail_iter {
            return Err(Error::Lookup("chat history unavailable".into()));
        }
        Ok(filter.apply(self.history.iter().filter(|m| m.chat_id == chat_id).cloned()))
    }

    async fn get_replies(&self, _chat_id: i64, message_id: i64) -> Result<Vec<MessageRef>> {
        if self.fail_replies {
            return Err(Error::Lookup("replies unavailable".into()));
        }
        Ok(self.replies.get(&message_id).cloned().unwrap_or_default())
    }
}

fn media(id: i64) -> MediaItem {
    MediaItem {
        stable_id: StableId::from(id * 1000),
        platform_file_ref: format!("ref-{id}"),
        kind: MediaKind::Photo,
        size_bytes: None,
        suggested_name: None,
        mime_type: None,
    }
}

fn msg(id: i64, group_id: Option<i64>, has_media: bool) -> MessageRef {
    MessageRef {
        message_id: id,
        chat_id: CHAT,
        group_id,
        media: has_media.then(|| media(id)),
        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    }
}

fn resolver(lookup: InMemoryLookup) -> (MediaSetResolver, Arc<InMemoryLookup>) {
    let lookup = Arc::new(lookup);
    let resolver = MediaSetResolver::new(lookup.clone(), ResolverConfig::default());
    (resolver, lookup)
}

// ===================================================================
// MessageFilter
// ===================================================================

#[test]
fn window_is_clamped_at_first_message() {
    let filter = MessageFilter::window(10, 50);
    assert_eq!(filter.min_id, Some(1));
    assert_eq!(filter.max_id, Some(60));
}

#[test]
fn filter_limit_counts_scanned_messages_before_group_filter() {
    let history = vec![
        msg(1, Some(7), true),
        msg(2, Some(7), true),
        msg(3, None, true),
        msg(4, None, true),
    ];

    let found = MessageFilter::recent(2).with_group(7).apply(history);
    assert!(found.is_empty(), "only ids 4 and 3 are scanned");

    let history = vec![msg(1, Some(7), true), msg(2, Some(7), true), msg(3, None, true)];
    let found = MessageFilter::recent(3).with_group(7).apply(history);
    let ids: Vec<i64> = found.iter().map(|m| m.message_id).collect();
    assert_eq!(ids, vec![2, 1], "newest first");
}

// ===================================================================
// Full resolution
// ===================================================================

#[tokio::test]
async fn exact_expected_album_is_returned_sorted() {
    // Album 900 spans 101..=104; unrelated album 800 and a loose photo sit nearby.
    let history = vec![
        msg(104, Some(900), true),
        msg(97, Some(800), true),
        msg(102, Some(900), true),
        msg(98, Some(800), true),
        msg(101, Some(900), true),
        msg(103, Some(900), true),
        msg(105, None, true),
        msg(100, Some(900), false),
    ];
    let (resolver, _) = resolver(InMemoryLookup::with_history(history));

    let set = resolver
        .resolve(&ResolveRequest::album(CHAT, 102, 4))
        .await
        .unwrap();

    assert_eq!(set.message_ids(), vec![101, 102, 103, 104]);
}

#[tokio::test]
async fn lone_media_message_resolves_to_itself() {
    let history = vec![
        msg(50, None, true),
        msg(48, Some(1), true),
        msg(49, Some(1), true),
    ];
    let (resolver, _) = resolver(InMemoryLookup::with_history(history));

    let set = resolver
        .resolve(&ResolveRequest::single(CHAT, 50))
        .await
        .unwrap();

    assert_eq!(
        set.message_ids(),
        vec![50],
        "neighbouring albums must not be pulled in"
    );
}

#[tokio::test]
async fn trigger_without_media_and_no_replies_is_empty() {
    let (resolver, _) = resolver(InMemoryLookup::with_history(vec![msg(10, Some(3), false)]));

    let set = resolver
        .resolve(&ResolveRequest::single(CHAT, 10))
        .await
        .unwrap();

    assert!(set.is_empty());
}

#[tokio::test]
async fn replies_with_media_are_appended_after_the_album() {
    let mut lookup = InMemoryLookup::with_history(vec![
        msg(20, Some(5), true),
        msg(21, Some(5), true),
    ]);
    lookup.replies.insert(
        20,
        vec![
            msg(30, None, true),
            msg(31, None, false),
            msg(21, Some(5), true), // already in the album
        ],
    );
    let (resolver, _) = resolver(lookup);

    let set = resolver
        .resolve(&ResolveRequest::single(CHAT, 20))
        .await
        .unwrap();

    assert_eq!(set.message_ids(), vec![20, 21, 30]);
}

#[tokio::test]
async fn replies_are_collected_even_when_trigger_has_no_media() {
    let mut lookup = InMemoryLookup::with_history(vec![msg(20, None, false)]);
    lookup.replies.insert(20, vec![msg(25, None, true)]);
    let (resolver, _) = resolver(lookup);

    let set = resolver
        .resolve(&ResolveRequest::single(CHAT, 20))
        .await
        .unwrap();

    assert_eq!(set.message_ids(), vec![25]);
}

#[tokio::test]
async fn missing_trigger_is_a_lookup_error() {
    let (resolver, _) = resolver(InMemoryLookup::default());

    let err = resolver
        .resolve(&ResolveRequest::single(CHAT, 1))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Lookup(_)));
}

#[tokio::test]
async fn history_failures_degrade_to_trigger_only() {
    let mut lookup = InMemoryLookup::with_history(vec![msg(40, Some(9), true), msg(41, Some(9), true)]);
    lookup.fail_iter = true;
    lookup.fail_replies = true;
    let (resolver, lookup) = resolver(lookup);

    let set = resolver
        .resolve(&ResolveRequest::album(CHAT, 40, 2))
        .await
        .unwrap();

    assert_eq!(set.message_ids(), vec![40]);
    assert_eq!(
        lookup.filters_seen.lock().unwrap().len(),
        3,
        "every history strategy was attempted"
    );
}

#[tokio::test]
async fn recent_scan_finds_album_outside_window() {
    let mut config = ResolverConfig::default();
    config.search_window = 2;

    // Trigger claims group 77 but the rest of the album sits far away
    let history = vec![msg(500, Some(77), true), msg(10, Some(77), true), msg(11, Some(77), true)];
    let lookup = Arc::new(InMemoryLookup::with_history(history));

    let ctx_trigger = msg(500, Some(77), true);
    let ctx = StrategyContext {
        lookup: lookup.as_ref(),
        trigger: &ctx_trigger,
        expected_count: None,
        config: &config,
    };

    let nearby = NearbyGroup.resolve(&ctx).await.unwrap().unwrap();
    assert_eq!(nearby.message_ids(), vec![500], "only the trigger is in the window");

    let recent = RecentScan.resolve(&ctx).await.unwrap().unwrap();
    assert_eq!(recent.message_ids(), vec![10, 11, 500]);
}

#[test]
fn default_chain_order() {
    let (resolver, _) = resolver(InMemoryLookup::default());
    assert_eq!(
        resolver.strategy_names(),
        vec!["nearby_group", "recent_scan", "group_bucket", "trigger_only"]
    );
}

// ===================================================================
// Individual strategies
// ===================================================================

fn ctx<'a>(
    lookup: &'a InMemoryLookup,
    trigger: &'a MessageRef,
    expected_count: Option<usize>,
    config: &'a ResolverConfig,
) -> StrategyContext<'a> {
    StrategyContext {
        lookup,
        trigger,
        expected_count,
        config,
    }
}

#[tokio::test]
async fn group_bucket_prefers_exact_expected_size() {
    let config = ResolverConfig::default();
    let lookup = InMemoryLookup::with_history(vec![
        msg(60, None, true),
        msg(61, Some(1), true),
        msg(62, Some(1), true),
        msg(63, Some(1), true),
        msg(70, Some(2), true),
        msg(71, Some(2), true),
    ]);
    let trigger = msg(60, None, true);

    let set = GroupBucket
        .resolve(&ctx(&lookup, &trigger, Some(2), &config))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(set.message_ids(), vec![70, 71]);
}

#[tokio::test]
async fn group_bucket_picks_closest_size_when_no_exact_match() {
    let config = ResolverConfig::default();
    let lookup = InMemoryLookup::with_history(vec![
        msg(60, None, true),
        msg(61, Some(1), true),
        msg(62, Some(1), true),
        msg(63, Some(1), true),
        msg(64, Some(1), true),
        msg(64 + 1, Some(1), true),
        msg(70, Some(2), true),
        msg(71, Some(2), true),
    ]);
    let trigger = msg(60, None, true);

    let set = GroupBucket
        .resolve(&ctx(&lookup, &trigger, Some(4), &config))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(set.len(), 5, "5 is closer to 4 than 2");
}

#[tokio::test]
async fn group_bucket_without_expected_count_picks_largest() {
    let config = ResolverConfig::default();
    let lookup = InMemoryLookup::with_history(vec![
        msg(60, Some(3), true),
        msg(61, Some(1), true),
        msg(62, Some(1), true),
        msg(63, Some(1), true),
    ]);
    // Trigger's own group is only known as a hint; bucket still runs
    let trigger = msg(60, Some(3), true);

    let set = GroupBucket
        .resolve(&ctx(&lookup, &trigger, None, &config))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(set.message_ids(), vec![61, 62, 63]);
}

#[tokio::test]
async fn group_bucket_ties_go_to_nearest_album() {
    let config = ResolverConfig::default();
    let lookup = InMemoryLookup::with_history(vec![
        msg(100, None, true),
        msg(60, Some(1), true),
        msg(61, Some(1), true),
        msg(98, Some(2), true),
        msg(99, Some(2), true),
    ]);
    let trigger = msg(100, None, true);

    let set = GroupBucket
        .resolve(&ctx(&lookup, &trigger, Some(2), &config))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(set.message_ids(), vec![98, 99]);
}

#[tokio::test]
async fn group_bucket_skips_lone_trigger_without_hints() {
    let config = ResolverConfig::default();
    let lookup = InMemoryLookup::with_history(vec![msg(61, Some(1), true), msg(62, Some(1), true)]);
    let trigger = msg(60, None, true);

    let result = GroupBucket
        .resolve(&ctx(&lookup, &trigger, None, &config))
        .await
        .unwrap();
    assert!(result.is_none());
    assert!(lookup.filters_seen.lock().unwrap().is_empty(), "no lookup issued");
}

#[tokio::test]
async fn trigger_only_requires_media() {
    let config = ResolverConfig::default();
    let lookup = InMemoryLookup::default();

    let with_media = msg(1, None, true);
    let set = TriggerOnly
        .resolve(&ctx(&lookup, &with_media, None, &config))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(set.message_ids(), vec![1]);

    let without_media = msg(2, None, false);
    assert!(
        TriggerOnly
            .resolve(&ctx(&lookup, &without_media, None, &config))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn custom_chain_runs_in_given_order() {
    let lookup = Arc::new(InMemoryLookup::with_history(vec![
        msg(5, Some(1), true),
        msg(6, Some(1), true),
    ]));
    let resolver = MediaSetResolver::with_strategies(
        lookup,
        ResolverConfig::default(),
        vec![Box::new(TriggerOnly), Box::new(NearbyGroup)],
    );

    let set = resolver
        .resolve(&ResolveRequest::single(CHAT, 5))
        .await
        .unwrap();
    assert_eq!(set.message_ids(), vec![5]);
}
