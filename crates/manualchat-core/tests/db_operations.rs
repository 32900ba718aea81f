//! Integration tests for store operations.

use chrono::{DateTime, Duration, Utc};
use manualchat_core::models::{
    Conversation, Document, DocumentKind, ListConversations, Message, MessageRole, Suggestion,
    Visibility, VoteType,
};
use manualchat_core::{Database, Error};
use serde_json::json;
use uuid::Uuid;

async fn temp_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Database::open_sqlite(&dir.path().join("manualchat.db"))
        .await
        .expect("open db");
    (dir, db)
}

/// Fixed base instant with whole-millisecond precision, matching storage.
fn at(offset_secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_700_000_000_000).expect("timestamp")
        + Duration::seconds(offset_secs)
}

async fn seed_conversation(db: &Database, owner: Uuid, offset_secs: i64) -> Conversation {
    let conversation = Conversation {
        id: Uuid::new_v4(),
        user_id: owner,
        title: format!("Conversation {offset_secs}"),
        created_at: at(offset_secs),
        visibility: Visibility::Private,
    };
    db.conversations()
        .insert(&conversation)
        .await
        .expect("insert conversation");
    conversation
}

fn message(conversation_id: Uuid, role: MessageRole, text: &str, created_at: DateTime<Utc>) -> Message {
    Message {
        id: Uuid::new_v4(),
        conversation_id,
        role,
        content: json!({ "parts": [{ "type": "text", "text": text }] }),
        created_at,
    }
}

fn ids(conversations: &[Conversation]) -> Vec<Uuid> {
    conversations.iter().map(|c| c.id).collect()
}

// ============================================================================
// Conversations
// ============================================================================

#[tokio::test]
async fn create_and_get_conversation() {
    let (_dir, db) = temp_db().await;
    let owner = Uuid::new_v4();

    let created = db
        .conversations()
        .create(Uuid::new_v4(), owner, "Brake warning light")
        .await
        .expect("create");

    let fetched = db
        .conversations()
        .get(created.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.user_id, owner);
    assert_eq!(fetched.title, "Brake warning light");
    assert_eq!(fetched.visibility, Visibility::Private);
    assert_eq!(
        fetched.created_at.timestamp_millis(),
        created.created_at.timestamp_millis()
    );
}

#[tokio::test]
async fn get_missing_conversation_is_none() {
    let (_dir, db) = temp_db().await;
    assert!(db.conversations().get(Uuid::new_v4()).await.expect("get").is_none());
}

#[tokio::test]
async fn list_pages_newest_first() {
    let (_dir, db) = temp_db().await;
    let owner = Uuid::new_v4();
    let mut seeded = Vec::new();
    for offset in 0..5 {
        seeded.push(seed_conversation(&db, owner, offset).await);
    }
    seed_conversation(&db, Uuid::new_v4(), 10).await;

    let first = db
        .conversations()
        .list(&ListConversations::first_page(owner, 2))
        .await
        .expect("first page");
    assert_eq!(ids(&first.items), vec![seeded[4].id, seeded[3].id]);
    assert!(first.has_more);

    let second = db
        .conversations()
        .list(&ListConversations {
            ending_before: first.items.last().map(|c| c.id),
            ..ListConversations::first_page(owner, 2)
        })
        .await
        .expect("second page");
    assert_eq!(ids(&second.items), vec![seeded[2].id, seeded[1].id]);
    assert!(second.has_more);

    let last = db
        .conversations()
        .list(&ListConversations {
            ending_before: second.items.last().map(|c| c.id),
            ..ListConversations::first_page(owner, 2)
        })
        .await
        .expect("last page");
    assert_eq!(ids(&last.items), vec![seeded[0].id]);
    assert!(!last.has_more);
}

#[tokio::test]
async fn list_starting_after_returns_newer() {
    let (_dir, db) = temp_db().await;
    let owner = Uuid::new_v4();
    let mut seeded = Vec::new();
    for offset in 0..5 {
        seeded.push(seed_conversation(&db, owner, offset).await);
    }

    let all_newer = db
        .conversations()
        .list(&ListConversations {
            starting_after: Some(seeded[1].id),
            ..ListConversations::first_page(owner, 10)
        })
        .await
        .expect("list");
    assert_eq!(
        ids(&all_newer.items),
        vec![seeded[4].id, seeded[3].id, seeded[2].id]
    );
    assert!(!all_newer.has_more);

    let limited = db
        .conversations()
        .list(&ListConversations {
            starting_after: Some(seeded[1].id),
            ..ListConversations::first_page(owner, 2)
        })
        .await
        .expect("list");
    assert_eq!(ids(&limited.items), vec![seeded[4].id, seeded[3].id]);
    assert!(limited.has_more);
}

#[tokio::test]
async fn list_prefers_starting_after_when_both_cursors_set() {
    let (_dir, db) = temp_db().await;
    let owner = Uuid::new_v4();
    let mut seeded = Vec::new();
    for offset in 0..3 {
        seeded.push(seed_conversation(&db, owner, offset).await);
    }

    let page = db
        .conversations()
        .list(&ListConversations {
            starting_after: Some(seeded[1].id),
            ending_before: Some(seeded[1].id),
            ..ListConversations::first_page(owner, 10)
        })
        .await
        .expect("list");
    assert_eq!(ids(&page.items), vec![seeded[2].id]);
}

#[tokio::test]
async fn list_with_unknown_cursor_is_not_found() {
    let (_dir, db) = temp_db().await;
    let owner = Uuid::new_v4();
    seed_conversation(&db, owner, 0).await;

    let result = db
        .conversations()
        .list(&ListConversations {
            ending_before: Some(Uuid::new_v4()),
            ..ListConversations::first_page(owner, 10)
        })
        .await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn list_for_owner_without_conversations_is_empty() {
    let (_dir, db) = temp_db().await;
    seed_conversation(&db, Uuid::new_v4(), 0).await;

    let page = db
        .conversations()
        .list(&ListConversations::first_page(Uuid::new_v4(), 10))
        .await
        .expect("list");
    assert!(page.items.is_empty());
    assert!(!page.has_more);
}

#[tokio::test]
async fn delete_conversation_cascades_to_messages_and_votes() {
    let (_dir, db) = temp_db().await;
    let owner = Uuid::new_v4();
    let doomed = seed_conversation(&db, owner, 0).await;
    let kept = seed_conversation(&db, owner, 1).await;

    let question = message(doomed.id, MessageRole::User, "Where is the jack?", at(2));
    let answer = message(doomed.id, MessageRole::Assistant, "Under the floor panel.", at(3));
    let other = message(kept.id, MessageRole::User, "Tyre pressure?", at(4));
    db.messages()
        .save_all(&[question.clone(), answer.clone(), other.clone()])
        .await
        .expect("save messages");
    db.votes()
        .vote(doomed.id, answer.id, VoteType::Up)
        .await
        .expect("vote");
    db.votes()
        .vote(kept.id, other.id, VoteType::Down)
        .await
        .expect("vote");

    let deleted = db
        .conversations()
        .delete(doomed.id)
        .await
        .expect("delete")
        .expect("existed");
    assert_eq!(deleted, doomed);

    assert!(db.conversations().get(doomed.id).await.expect("get").is_none());
    assert!(db.messages().list(doomed.id).await.expect("list").is_empty());
    assert!(db.votes().list(doomed.id).await.expect("votes").is_empty());

    assert_eq!(db.messages().list(kept.id).await.expect("list").len(), 1);
    assert_eq!(db.votes().list(kept.id).await.expect("votes").len(), 1);

    assert!(db.conversations().delete(doomed.id).await.expect("delete").is_none());
}

#[tokio::test]
async fn set_visibility_and_count() {
    let (_dir, db) = temp_db().await;
    let conversation = seed_conversation(&db, Uuid::new_v4(), 0).await;
    seed_conversation(&db, Uuid::new_v4(), 1).await;

    db.conversations()
        .set_visibility(conversation.id, Visibility::Public)
        .await
        .expect("set visibility");
    let fetched = db
        .conversations()
        .get(conversation.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(fetched.visibility, Visibility::Public);
    assert_eq!(db.conversations().count().await.expect("count"), 2);
}

// ============================================================================
// Messages
// ============================================================================

#[tokio::test]
async fn messages_list_oldest_first_with_content_intact() {
    let (_dir, db) = temp_db().await;
    let conversation = seed_conversation(&db, Uuid::new_v4(), 0).await;

    let later = message(conversation.id, MessageRole::Assistant, "Second", at(20));
    let earlier = message(conversation.id, MessageRole::User, "First", at(10));
    db.messages()
        .save_all(&[later.clone(), earlier.clone()])
        .await
        .expect("save");

    let listed = db.messages().list(conversation.id).await.expect("list");
    assert_eq!(listed, vec![earlier.clone(), later]);

    let fetched = db.messages().get(earlier.id).await.expect("get").expect("exists");
    assert_eq!(fetched.content["parts"][0]["text"], "First");
    assert_eq!(db.messages().count().await.expect("count"), 2);
}

#[tokio::test]
async fn save_all_is_all_or_nothing() {
    let (_dir, db) = temp_db().await;
    let conversation = seed_conversation(&db, Uuid::new_v4(), 0).await;

    let first = message(conversation.id, MessageRole::User, "Hello", at(1));
    let mut duplicate = message(conversation.id, MessageRole::Assistant, "Hi", at(2));
    duplicate.id = first.id;

    let result = db.messages().save_all(&[first, duplicate]).await;
    assert!(matches!(result, Err(Error::Persistence(_))));
    assert!(db.messages().list(conversation.id).await.expect("list").is_empty());

    db.messages().save_all(&[]).await.expect("empty batch");
}

#[tokio::test]
async fn delete_after_rewinds_messages_and_their_votes() {
    let (_dir, db) = temp_db().await;
    let conversation = seed_conversation(&db, Uuid::new_v4(), 0).await;

    let messages: Vec<Message> = (0..4)
        .map(|i| message(conversation.id, MessageRole::User, &format!("m{i}"), at(10 + i)))
        .collect();
    db.messages().save_all(&messages).await.expect("save");
    for msg in [&messages[0], &messages[1], &messages[3]] {
        db.votes()
            .vote(conversation.id, msg.id, VoteType::Up)
            .await
            .expect("vote");
    }

    let removed = db
        .messages()
        .delete_after(conversation.id, messages[2].created_at)
        .await
        .expect("rewind");
    assert_eq!(removed, 2);

    let remaining = db.messages().list(conversation.id).await.expect("list");
    assert_eq!(remaining, messages[..2].to_vec());

    let mut voted: Vec<Uuid> = db
        .votes()
        .list(conversation.id)
        .await
        .expect("votes")
        .into_iter()
        .map(|v| v.message_id)
        .collect();
    voted.sort();
    let mut expected = vec![messages[0].id, messages[1].id];
    expected.sort();
    assert_eq!(voted, expected);

    let none = db
        .messages()
        .delete_after(conversation.id, at(1_000))
        .await
        .expect("rewind past end");
    assert_eq!(none, 0);
}

#[tokio::test]
async fn count_since_is_inclusive_and_scoped_to_owner() {
    let (_dir, db) = temp_db().await;
    let owner = Uuid::new_v4();
    let first = seed_conversation(&db, owner, 0).await;
    let second = seed_conversation(&db, owner, 1).await;
    let stranger = seed_conversation(&db, Uuid::new_v4(), 2).await;

    let cutoff = at(100);
    db.messages()
        .save_all(&[
            message(first.id, MessageRole::User, "too old", cutoff - Duration::milliseconds(1)),
            message(first.id, MessageRole::User, "boundary", cutoff),
            message(second.id, MessageRole::User, "recent", cutoff + Duration::seconds(5)),
            message(stranger.id, MessageRole::User, "not mine", cutoff + Duration::seconds(5)),
        ])
        .await
        .expect("save");

    assert_eq!(db.messages().count_since(owner, cutoff).await.expect("count"), 2);
    assert_eq!(
        db.messages()
            .count_since(Uuid::new_v4(), cutoff)
            .await
            .expect("count"),
        0
    );
}

#[tokio::test]
async fn count_recent_uses_trailing_window() {
    let (_dir, db) = temp_db().await;
    let owner = Uuid::new_v4();
    let conversation = db
        .conversations()
        .create(Uuid::new_v4(), owner, "Today")
        .await
        .expect("create");

    let now = Utc::now();
    db.messages()
        .save_all(&[
            message(conversation.id, MessageRole::User, "now", now),
            message(conversation.id, MessageRole::User, "yesterday", now - Duration::hours(30)),
        ])
        .await
        .expect("save");

    assert_eq!(db.messages().count_recent(owner, 24).await.expect("count"), 1);
    assert_eq!(db.messages().count_recent(owner, 48).await.expect("count"), 2);
}

// ============================================================================
// Votes
// ============================================================================

#[tokio::test]
async fn revoting_replaces_previous_vote() {
    let (_dir, db) = temp_db().await;
    let conversation = seed_conversation(&db, Uuid::new_v4(), 0).await;
    let answer = message(conversation.id, MessageRole::Assistant, "Check the fuse box.", at(1));
    db.messages().save_all(&[answer.clone()]).await.expect("save");

    for vote in [VoteType::Up, VoteType::Up, VoteType::Down] {
        db.votes()
            .vote(conversation.id, answer.id, vote)
            .await
            .expect("vote");
    }

    let votes = db.votes().list(conversation.id).await.expect("votes");
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].message_id, answer.id);
    assert!(!votes[0].is_upvoted);
}

#[tokio::test]
async fn vote_on_missing_message_fails() {
    let (_dir, db) = temp_db().await;
    let conversation = seed_conversation(&db, Uuid::new_v4(), 0).await;

    let result = db
        .votes()
        .vote(conversation.id, Uuid::new_v4(), VoteType::Up)
        .await;
    assert!(matches!(result, Err(Error::NotFound(_))));
    assert!(db.votes().list(conversation.id).await.expect("votes").is_empty());
}

#[tokio::test]
async fn vote_through_another_conversation_is_rejected() {
    let (_dir, db) = temp_db().await;
    let owner = Uuid::new_v4();
    let voter = seed_conversation(&db, owner, 0).await;
    let holder = seed_conversation(&db, owner, 1).await;
    let answer = message(holder.id, MessageRole::Assistant, "Rotate the tires.", at(2));
    db.messages().save_all(&[answer.clone()]).await.expect("save");

    let result = db.votes().vote(voter.id, answer.id, VoteType::Up).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
    assert!(db.votes().list(voter.id).await.expect("votes").is_empty());
    assert!(db.votes().list(holder.id).await.expect("votes").is_empty());

    // Nothing dangles, so the holder can still be rewound and deleted.
    assert_eq!(
        db.messages()
            .delete_after(holder.id, answer.created_at)
            .await
            .expect("rewind"),
        1
    );
    db.conversations()
        .delete(holder.id)
        .await
        .expect("delete")
        .expect("existed");
    assert!(db.conversations().get(voter.id).await.expect("get").is_some());
}

// ============================================================================
// Documents
// ============================================================================

fn document(id: Uuid, owner: Uuid, offset_secs: i64, content: Option<&str>) -> Document {
    Document {
        id,
        created_at: at(offset_secs),
        title: "Maintenance schedule".to_string(),
        kind: DocumentKind::Sheet,
        content: content.map(ToOwned::to_owned),
        user_id: owner,
    }
}

fn suggestion(doc: &Document, text: &str, offset_secs: i64) -> Suggestion {
    Suggestion {
        id: Uuid::new_v4(),
        document_id: doc.id,
        document_created_at: doc.created_at,
        original_text: text.to_string(),
        suggested_text: text.to_uppercase(),
        description: None,
        is_resolved: false,
        user_id: doc.user_id,
        created_at: at(offset_secs),
    }
}

#[tokio::test]
async fn document_versions_are_ordered_and_latest_wins() {
    let (_dir, db) = temp_db().await;
    let id = Uuid::new_v4();
    let owner = Uuid::new_v4();

    let v2 = db
        .documents()
        .insert(&document(id, owner, 20, Some("oil every 10k")))
        .await
        .expect("insert v2");
    let v1 = db
        .documents()
        .insert(&document(id, owner, 10, None))
        .await
        .expect("insert v1");
    assert!(v1.content.is_none());

    let versions = db.documents().versions(id).await.expect("versions");
    assert_eq!(versions, vec![v1, v2.clone()]);
    assert_eq!(db.documents().latest(id).await.expect("latest"), Some(v2));
    assert!(db.documents().latest(Uuid::new_v4()).await.expect("latest").is_none());
}

#[tokio::test]
async fn save_stamps_a_new_version() {
    let (_dir, db) = temp_db().await;
    let id = Uuid::new_v4();
    let owner = Uuid::new_v4();

    let saved = db
        .documents()
        .save(id, "Checklist", DocumentKind::Text, Some("wipers"), owner)
        .await
        .expect("save");
    assert_eq!(saved.kind, DocumentKind::Text);
    assert_eq!(saved.content.as_deref(), Some("wipers"));
    assert_eq!(db.documents().versions(id).await.expect("versions").len(), 1);
}

#[tokio::test]
async fn delete_versions_after_keeps_earlier_versions_and_their_suggestions() {
    let (_dir, db) = temp_db().await;
    let id = Uuid::new_v4();
    let owner = Uuid::new_v4();

    let mut versions = Vec::new();
    for offset in [0, 10, 20] {
        versions.push(
            db.documents()
                .insert(&document(id, owner, offset, Some("draft")))
                .await
                .expect("insert"),
        );
    }
    let kept = suggestion(&versions[0], "keep", 1);
    db.documents()
        .save_suggestions(&[
            kept.clone(),
            suggestion(&versions[1], "drop", 11),
            suggestion(&versions[2], "drop too", 21),
        ])
        .await
        .expect("save suggestions");

    let removed = db
        .documents()
        .delete_versions_after(id, versions[0].created_at)
        .await
        .expect("delete");
    assert_eq!(removed, versions[1..].to_vec());

    assert_eq!(
        db.documents().versions(id).await.expect("versions"),
        vec![versions[0].clone()]
    );
    assert_eq!(
        db.documents().suggestions_for(id).await.expect("suggestions"),
        vec![kept]
    );
}

#[tokio::test]
async fn suggestion_for_missing_version_is_rejected() {
    let (_dir, db) = temp_db().await;
    let orphan = document(Uuid::new_v4(), Uuid::new_v4(), 0, None);

    let result = db
        .documents()
        .save_suggestions(&[suggestion(&orphan, "nothing", 1)])
        .await;
    assert!(matches!(result, Err(Error::Persistence(_))));
}

// ============================================================================
// Users
// ============================================================================

#[tokio::test]
async fn create_user_stores_only_the_hash() {
    let (_dir, db) = temp_db().await;

    let user = db
        .users()
        .create("driver@example.com", "correct horse")
        .await
        .expect("create");
    let found = db
        .users()
        .get_by_email("driver@example.com")
        .await
        .expect("find");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, user.id);

    let hash = found[0].password_hash.as_deref().expect("hash");
    assert_ne!(hash, "correct horse");
    assert!(db.users().verify_password(&found[0], "correct horse").expect("verify"));
    assert!(!db.users().verify_password(&found[0], "wrong").expect("verify"));
}

#[tokio::test]
async fn unknown_email_yields_empty_list() {
    let (_dir, db) = temp_db().await;
    assert!(db
        .users()
        .get_by_email("nobody@example.com")
        .await
        .expect("find")
        .is_empty());
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let (_dir, db) = temp_db().await;
    db.users()
        .create("twice@example.com", "one")
        .await
        .expect("create");

    let result = db.users().create("twice@example.com", "two").await;
    assert!(matches!(result, Err(Error::Persistence(_))));
}

#[tokio::test]
async fn guest_owned_conversations_are_allowed() {
    let (_dir, db) = temp_db().await;
    let guest = db.users().create_guest();

    db.conversations()
        .create(Uuid::new_v4(), guest.id, "Guest question")
        .await
        .expect("create");
    let page = db
        .conversations()
        .list(&ListConversations::first_page(guest.id, 10))
        .await
        .expect("list");
    assert_eq!(page.items.len(), 1);
    assert!(db.users().get_by_email(&guest.email).await.expect("find").is_empty());
}
