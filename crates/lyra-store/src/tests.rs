use std::sync::Arc;
use std::thread;

use lyra_contract::{ConversationMode, ConversationPriority, Origin, SenderRole, VipTier};

use crate::{
    ConversationFilters, ConversationStore, DraftFinalizeOutcome, NewMessage, NewPerformer,
};

fn test_store() -> ConversationStore {
    ConversationStore::open_in_memory().expect("in-memory store")
}

fn seed_performer(store: &ConversationStore) -> i64 {
    store
        .insert_performer(NewPerformer {
            label: "Vela Fox #1".to_string(),
            agent_id: "vela_fox_v1".to_string(),
            provider: "openai_compat".to_string(),
            model: "grok-3-latest".to_string(),
            system_prompt: None,
            temperature: 0.8,
            max_tokens: 200,
        })
        .expect("performer")
        .id
}

fn open_conversation(store: &ConversationStore, user_id: i64, performer_id: i64) -> i64 {
    store
        .find_or_create_active(user_id, performer_id, Origin::Marketplace, "fm_1", "vela_fox_v1")
        .expect("conversation")
        .id
}

fn user_message(conversation_id: i64, text: &str) -> NewMessage {
    NewMessage {
        conversation_id,
        sender: SenderRole::User,
        text: text.to_string(),
        channel: Origin::Marketplace.as_str().to_string(),
        is_draft: false,
        tokens_used: None,
        model_used: None,
    }
}

#[test]
fn identity_resolution_is_stable_and_collision_free() {
    let store = test_store();
    let first = store
        .resolve_or_create_identity(Origin::Marketplace, "fm_1")
        .expect("first");
    let again = store
        .resolve_or_create_identity(Origin::Marketplace, "fm_1")
        .expect("again");
    assert_eq!(first, again);

    let second = store
        .resolve_or_create_identity(Origin::Messenger, "tg_1")
        .expect("second");
    assert_ne!(first, second);
    assert!(second > first, "internal ids are issued sequentially");

    // Same external id on a different origin is a distinct actor.
    let third = store
        .resolve_or_create_identity(Origin::Messenger, "fm_1")
        .expect("third");
    assert_ne!(first, third);
}

#[test]
fn cached_stats_update_is_noop_without_mapping() {
    let store = test_store();
    store
        .update_cached_stats(Origin::Web, "web_missing", 100, Some("gold"), None)
        .expect("no-op update");
    assert!(store
        .identity_snapshot(Origin::Web, "web_missing")
        .expect("snapshot")
        .is_none());
}

#[test]
fn cached_stats_accumulate_spend_and_replace_tier() {
    let store = test_store();
    store
        .resolve_or_create_identity(Origin::Marketplace, "fm_9")
        .expect("identity");
    store
        .update_cached_stats(Origin::Marketplace, "fm_9", 120, Some("silver"), Some("Kaan"))
        .expect("first update");
    store
        .update_cached_stats(Origin::Marketplace, "fm_9", 80, Some("gold"), None)
        .expect("second update");

    let snapshot = store
        .identity_snapshot(Origin::Marketplace, "fm_9")
        .expect("snapshot")
        .expect("mapping");
    assert_eq!(snapshot.total_spend, 200);
    assert_eq!(snapshot.vip_tier, VipTier::Gold);
    assert_eq!(snapshot.display_name.as_deref(), Some("Kaan"));
}

#[test]
fn find_or_create_returns_existing_active_conversation() {
    let store = test_store();
    let performer_id = seed_performer(&store);
    let first = open_conversation(&store, 1, performer_id);
    let second = open_conversation(&store, 1, performer_id);
    assert_eq!(first, second);

    let conversation = store
        .get_conversation(first)
        .expect("read")
        .expect("present");
    assert_eq!(conversation.mode, ConversationMode::Autonomous);
    assert_eq!(conversation.priority, ConversationPriority::Normal);
    assert!(conversation.is_active);
}

#[test]
fn regression_single_active_conversation_survives_racing_creates() {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let path = tempdir.path().join("store.sqlite");
    let store = Arc::new(ConversationStore::open(&path).expect("store"));
    let performer_id = seed_performer(&store);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            store
                .find_or_create_active(7, performer_id, Origin::Web, "web_7", "vela_fox_v1")
                .expect("conversation")
                .id
        }));
    }
    let ids: Vec<i64> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread"))
        .collect();
    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn message_count_matches_stored_history() {
    let store = test_store();
    let performer_id = seed_performer(&store);
    let conversation_id = open_conversation(&store, 1, performer_id);

    for index in 0..5 {
        store
            .append_message(user_message(conversation_id, &format!("message {index}")))
            .expect("append");
    }
    let conversation = store
        .get_conversation(conversation_id)
        .expect("read")
        .expect("present");
    let messages = store
        .conversation_messages(conversation_id)
        .expect("messages");
    assert_eq!(conversation.message_count, 5);
    assert_eq!(messages.len(), 5);
    assert!(conversation.last_message_unix_ms.is_some());
}

#[test]
fn recent_history_is_bounded_and_oldest_first() {
    let store = test_store();
    let performer_id = seed_performer(&store);
    let conversation_id = open_conversation(&store, 1, performer_id);
    for index in 0..10 {
        store
            .append_message(user_message(conversation_id, &format!("m{index}")))
            .expect("append");
    }

    let history = store.recent_history(conversation_id, 3).expect("history");
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].text, "m7");
    assert_eq!(history[2].text, "m9");
}

#[test]
fn set_mode_reports_idempotent_writes() {
    let store = test_store();
    let performer_id = seed_performer(&store);
    let conversation_id = open_conversation(&store, 1, performer_id);

    let changed = store
        .set_mode(
            conversation_id,
            ConversationMode::HybridDraft,
            ConversationPriority::Vip,
            Some(1),
        )
        .expect("set mode");
    assert!(changed);

    let unchanged = store
        .set_mode(
            conversation_id,
            ConversationMode::HybridDraft,
            ConversationPriority::Vip,
            Some(1),
        )
        .expect("set mode again");
    assert!(!unchanged);
}

#[test]
fn regression_draft_finalize_happens_exactly_once() {
    let store = test_store();
    let performer_id = seed_performer(&store);
    let conversation_id = open_conversation(&store, 1, performer_id);
    let draft = store
        .append_message(NewMessage {
            conversation_id,
            sender: SenderRole::Agent,
            text: "draft text".to_string(),
            channel: Origin::Marketplace.as_str().to_string(),
            is_draft: true,
            tokens_used: Some(12),
            model_used: Some("grok-3-latest".to_string()),
        })
        .expect("draft");

    let outcome = store
        .finalize_draft(draft.id, "polished text", SenderRole::Agent)
        .expect("finalize");
    let DraftFinalizeOutcome::Finalized(finalized) = outcome else {
        panic!("expected finalized draft, got {outcome:?}");
    };
    assert_eq!(finalized.text, "polished text");
    assert_eq!(finalized.original_text.as_deref(), Some("draft text"));
    assert!(!finalized.is_draft);
    assert!(finalized.edited_by_operator);

    let second = store
        .finalize_draft(draft.id, "another edit", SenderRole::Operator)
        .expect("second finalize attempt");
    assert_eq!(second, DraftFinalizeOutcome::NotADraft);

    let missing = store
        .finalize_draft(9_999, "ghost", SenderRole::Operator)
        .expect("missing finalize attempt");
    assert_eq!(missing, DraftFinalizeOutcome::NotFound);
}

#[test]
fn conversation_list_applies_filters_and_previews() {
    let store = test_store();
    let performer_id = seed_performer(&store);
    let first = open_conversation(&store, 1, performer_id);
    let second = store
        .find_or_create_active(2, performer_id, Origin::Messenger, "tg_2", "vela_fox_v1")
        .expect("conversation")
        .id;
    store
        .append_message(user_message(first, "hello from the marketplace"))
        .expect("append");
    store
        .set_mode(
            second,
            ConversationMode::Human,
            ConversationPriority::Vip,
            None,
        )
        .expect("set mode");

    let all = store
        .list_conversations(&ConversationFilters {
            active_only: true,
            ..ConversationFilters::default()
        })
        .expect("list");
    assert_eq!(all.len(), 2);

    let human_only = store
        .list_conversations(&ConversationFilters {
            mode: Some(ConversationMode::Human),
            active_only: true,
            ..ConversationFilters::default()
        })
        .expect("filtered list");
    assert_eq!(human_only.len(), 1);
    assert_eq!(human_only[0].conversation.id, second);

    let marketplace = store
        .list_conversations(&ConversationFilters {
            origin: Some(Origin::Marketplace),
            active_only: true,
            ..ConversationFilters::default()
        })
        .expect("origin list");
    assert_eq!(marketplace.len(), 1);
    assert_eq!(
        marketplace[0].last_message_preview.as_deref(),
        Some("hello from the marketplace")
    );
    assert_eq!(marketplace[0].performer_label, "Vela Fox #1");
}

#[test]
fn conversation_spend_snapshot_is_replaced_not_accumulated() {
    let store = test_store();
    let performer_id = seed_performer(&store);
    let conversation_id = open_conversation(&store, 1, performer_id);

    store
        .update_conversation_spend(conversation_id, 150)
        .expect("first spend write");
    store
        .update_conversation_spend(conversation_id, 220)
        .expect("second spend write");

    let conversation = store
        .get_conversation(conversation_id)
        .expect("read conversation")
        .expect("conversation exists");
    assert_eq!(conversation.spend_total, 220);
}

#[test]
fn deactivation_frees_the_active_slot() {
    let store = test_store();
    let performer_id = seed_performer(&store);
    let first = open_conversation(&store, 1, performer_id);
    assert!(store.deactivate_conversation(first).expect("deactivate"));
    assert!(!store.deactivate_conversation(first).expect("repeat"));

    let replacement = open_conversation(&store, 1, performer_id);
    assert_ne!(first, replacement);
}

#[test]
fn operator_roster_reports_first_online() {
    let store = test_store();
    let alice = store.insert_operator("alice", 10).expect("operator");
    let bora = store.insert_operator("bora", 10).expect("operator");
    assert!(!store.any_operator_online().expect("none online"));

    store
        .set_operator_online(bora.id, true)
        .expect("set online");
    let online = store
        .first_online_operator()
        .expect("read")
        .expect("online operator");
    assert_eq!(online.id, bora.id);

    store
        .set_operator_online(alice.id, true)
        .expect("set online");
    let online = store
        .first_online_operator()
        .expect("read")
        .expect("online operator");
    assert_eq!(online.id, alice.id, "lowest id wins the single slot");
}
