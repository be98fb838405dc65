//! Storage guarantees of the Postgres backend. Every test is skipped unless `DATABASE_URL` is set.
#![allow(clippy::unwrap_used, clippy::panic, clippy::missing_panics_doc, clippy::must_use_candidate, missing_debug_implementations, unreachable_pub, clippy::similar_names)]
use parley_server::adapters::Backends;
use parley_server::adapters::database::PgStore;
use parley_server::adapters::storage::PublicUrlSigner;
use parley_server::adapters::store::{ConversationStore, MessageLog};
use parley_server::domain::conversation::{Conversation, LastMessage, NewDirectConversation, PairKey};
use parley_server::domain::message::{MessageType, NewMessage, OutgoingMessage};
use parley_server::domain::pagination::Page;
use parley_server::error::AppError;
use parley_server::services::conversation_resolver::ConversationResolver;
use parley_server::services::message_service::MessageService;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;
mod common;

/// A user id that no other test run shares.
fn user(name: &str) -> String {
    format!("{name}-{}", Uuid::now_v7())
}

fn snapshot(sender: &str, content: &str, timestamp: OffsetDateTime) -> LastMessage {
    LastMessage {
        content: content.to_string(),
        sender_id: sender.to_string(),
        timestamp,
        message_type: MessageType::Text,
    }
}

async fn direct(store: &PgStore, a: &str, b: &str) -> Conversation {
    store.insert_direct(NewDirectConversation::new(a, b)).await.unwrap()
}

async fn append(store: &PgStore, conversation: &Conversation, sender: &str, receiver: &str, content: &str) -> Uuid {
    let message = MessageLog::append(
        store,
        NewMessage {
            id: Uuid::now_v7(),
            conversation_id: conversation.id,
            sender_id: sender.to_string(),
            receiver_id: receiver.to_string(),
            content: content.to_string(),
            message_type: MessageType::Text,
            media_key: None,
            media_file_name: None,
            reply_to: None,
        },
    )
    .await
    .unwrap();
    store.record_message(conversation.id, &message.snapshot(), receiver).await.unwrap();
    message.id
}

async fn reload(store: &PgStore, id: Uuid) -> Conversation {
    ConversationStore::find(store, id).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_duplicate_pair_is_a_conflict() {
    let Some(pool) = common::get_test_pool().await else { return };
    let store = PgStore::new(pool);
    let (alice, bob) = (user("alice"), user("bob"));

    let created = direct(&store, &alice, &bob).await;
    assert_eq!(created.participants, vec![alice.clone(), bob.clone()]);
    assert_eq!(created.unread_for(&bob), 0);

    let duplicate = store.insert_direct(NewDirectConversation::new(&bob, &alice)).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))), "got {duplicate:?}");

    let found = store.find_direct(&PairKey::direct(&bob, &alice)).await.unwrap().unwrap();
    assert_eq!(found.id, created.id);
}

#[tokio::test]
async fn test_concurrent_resolution_yields_one_conversation() {
    let Some(pool) = common::get_test_pool().await else { return };
    let store = Arc::new(PgStore::new(pool));
    let resolver = ConversationResolver::new(Arc::clone(&store) as Arc<dyn ConversationStore>);
    let (alice, bob) = (user("alice"), user("bob"));

    let attempts = (0..10).map(|i| {
        let resolver = resolver.clone();
        let (a, b) = if i % 2 == 0 { (alice.clone(), bob.clone()) } else { (bob.clone(), alice.clone()) };
        tokio::spawn(async move { resolver.resolve_direct(&a, &b).await.unwrap().id })
    });
    let ids: Vec<Uuid> = futures::future::join_all(attempts).await.into_iter().map(Result::unwrap).collect();

    assert!(ids.iter().all(|id| *id == ids[0]), "ids diverged: {ids:?}");
    assert_eq!(store.count_for_participant(&alice).await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_record_message_counts_every_send() {
    let Some(pool) = common::get_test_pool().await else { return };
    let store = PgStore::new(pool);
    let (alice, bob) = (user("alice"), user("bob"));
    let conversation = direct(&store, &alice, &bob).await;

    let now = OffsetDateTime::now_utc();
    let snapshots: Vec<LastMessage> = (0..20).map(|i| snapshot(&alice, &format!("m{i}"), now)).collect();
    let results =
        futures::future::join_all(snapshots.iter().map(|s| store.record_message(conversation.id, s, &bob))).await;
    for result in results {
        result.unwrap();
    }

    let reloaded = reload(&store, conversation.id).await;
    assert_eq!(reloaded.unread_for(&bob), 20);
    assert_eq!(reloaded.unread_for(&alice), 0);
    assert_eq!(store.unread_total(&bob).await.unwrap(), 20);
}

#[tokio::test]
async fn test_older_snapshot_does_not_replace_newer() {
    let Some(pool) = common::get_test_pool().await else { return };
    let store = PgStore::new(pool);
    let (alice, bob) = (user("alice"), user("bob"));
    let conversation = direct(&store, &alice, &bob).await;

    let now = OffsetDateTime::now_utc();
    store.record_message(conversation.id, &snapshot(&bob, "newer", now), &alice).await.unwrap();
    store.record_message(conversation.id, &snapshot(&alice, "older", now - Duration::minutes(1)), &bob).await.unwrap();

    let reloaded = reload(&store, conversation.id).await;
    let last = reloaded.last_message.as_ref().unwrap();
    assert_eq!(last.content, "newer");
    assert_eq!(last.sender_id, bob);
    assert_eq!(reloaded.unread_for(&alice), 1);
    assert_eq!(reloaded.unread_for(&bob), 1);
}

#[tokio::test]
async fn test_record_message_for_unknown_conversation() {
    let Some(pool) = common::get_test_pool().await else { return };
    let store = PgStore::new(pool);

    let result = store.record_message(Uuid::now_v7(), &snapshot("a", "x", OffsetDateTime::now_utc()), "b").await;
    assert!(matches!(result, Err(AppError::NotFound(_))), "got {result:?}");
}

#[tokio::test]
async fn test_mark_read_zeroes_counter() {
    let Some(pool) = common::get_test_pool().await else { return };
    let store = PgStore::new(pool);
    let (alice, bob) = (user("alice"), user("bob"));
    let conversation = direct(&store, &alice, &bob).await;

    for i in 0..3 {
        append(&store, &conversation, &alice, &bob, &format!("m{i}")).await;
    }
    append(&store, &conversation, &bob, &alice, "reply").await;
    assert_eq!(reload(&store, conversation.id).await.unread_for(&bob), 3);

    let marked = store.mark_read(conversation.id, &bob, OffsetDateTime::now_utc()).await.unwrap();
    assert_eq!(marked, 3);

    let reloaded = reload(&store, conversation.id).await;
    assert_eq!(reloaded.unread_for(&bob), 0);
    assert_eq!(reloaded.unread_for(&alice), 1);
    assert_eq!(store.mark_read(conversation.id, &bob, OffsetDateTime::now_utc()).await.unwrap(), 0);

    let visible = store.list_visible(conversation.id, Page::new(None, None, 50, 100)).await.unwrap();
    let read: Vec<bool> = visible.iter().filter(|m| m.receiver_id == bob).map(|m| m.is_read).collect();
    assert_eq!(read, vec![true, true, true]);
}

#[tokio::test]
async fn test_recount_after_soft_delete() {
    let Some(pool) = common::get_test_pool().await else { return };
    let store = PgStore::new(pool);
    let (alice, bob) = (user("alice"), user("bob"));
    let conversation = direct(&store, &alice, &bob).await;

    let first = append(&store, &conversation, &alice, &bob, "one").await;
    append(&store, &conversation, &alice, &bob, "two").await;
    store.soft_delete(first, OffsetDateTime::now_utc()).await.unwrap();
    assert_eq!(reload(&store, conversation.id).await.unread_for(&bob), 2);

    let counts = store.recount_unread(conversation.id).await.unwrap();
    assert_eq!(counts.get(&bob), Some(&1));
    assert_eq!(counts.get(&alice), Some(&0));

    assert_eq!(reload(&store, conversation.id).await.unread_for(&bob), 1);
    assert_eq!(store.count_visible(conversation.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_listing_puts_silent_conversations_last() {
    let Some(pool) = common::get_test_pool().await else { return };
    let store = PgStore::new(pool);
    let (alice, bob, carol) = (user("alice"), user("bob"), user("carol"));

    let with_bob = direct(&store, &alice, &bob).await;
    let with_carol = direct(&store, &alice, &carol).await;
    append(&store, &with_bob, &bob, &alice, "ping").await;

    let listed = store.list_for_participant(&alice, Page::new(None, None, 20, 100)).await.unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![with_bob.id, with_carol.id]);
    assert!(listed[1].last_message.is_none());
    assert_eq!(store.count_for_participant(&alice).await.unwrap(), 2);

    let second = store.list_for_participant(&alice, Page::new(Some(2), Some(1), 20, 100)).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, with_carol.id);
}

#[tokio::test]
async fn test_send_and_read_through_service() {
    let Some(pool) = common::get_test_pool().await else { return };
    let (alice, bob) = (user("alice"), user("bob"));
    sqlx::query("INSERT INTO connections (requester, recipient, status) VALUES ($1, $2, 'accepted')")
        .bind(&alice)
        .bind(&bob)
        .execute(&pool)
        .await
        .unwrap();

    let backends =
        Backends::from_store(Arc::new(PgStore::new(pool)), Arc::new(PublicUrlSigner::new(common::MEDIA_BASE_URL)));
    let service = MessageService::new(&backends, common::get_test_config().messaging);

    let outgoing = |sender: &str, receiver: &str, content: &str| OutgoingMessage {
        sender_id: sender.to_string(),
        receiver_id: receiver.to_string(),
        content: content.to_string(),
        ..Default::default()
    };

    let sent = service.send_message(outgoing(&alice, &bob, "hello")).await.unwrap();
    service.send_message(outgoing(&bob, &alice, "hi back")).await.unwrap();
    assert_eq!(service.get_unread_count(&bob).await.unwrap(), 1);

    let conversation_id = sent.message.conversation_id;
    assert_eq!(service.mark_as_read(conversation_id, &bob).await.unwrap(), 1);
    assert_eq!(service.get_unread_count(&bob).await.unwrap(), 0);
    assert_eq!(service.get_unread_count(&alice).await.unwrap(), 1);

    let page = service.get_messages(conversation_id, &alice, None, None).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].message.content, "hello");
    assert!(page.items[0].message.is_read);
}
