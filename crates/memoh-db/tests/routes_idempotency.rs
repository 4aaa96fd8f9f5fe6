//! Requires `MEMOH_TEST_DATABASE_URL` pointing at a scratch Postgres
//! instance; skips (not fails) when unset so `cargo test` works offline.

use memoh_core::types::{ConversationId, UserId};

#[tokio::test]
async fn same_channel_thread_resolves_to_one_route() {
    let Some(pool) = memoh_db::test_support::scratch_pool().await else {
        eprintln!("skipping: MEMOH_TEST_DATABASE_URL not set");
        return;
    };
    let bot = memoh_db::bots::create(&pool, UserId::new(), memoh_core::types::BotType::Personal, "t", 16000)
    .await
    .unwrap();

    let r1 = memoh_db::routes::find_or_create(
        &pool,
        bot.id,
        &"telegram".to_string(),
        "chat-1",
        None,
        ConversationId::new(),
    )
    .await
    .unwrap();

    let r2 = memoh_db::routes::find_or_create(
        &pool,
        bot.id,
        &"telegram".to_string(),
        "chat-1",
        None,
        ConversationId::new(),
    )
    .await
    .unwrap();

    assert_eq!(r1.id, r2.id, "repeated find_or_create must reuse the route");
}

#[tokio::test]
async fn none_and_empty_thread_id_collide() {
    let Some(pool) = memoh_db::test_support::scratch_pool().await else {
        eprintln!("skipping: MEMOH_TEST_DATABASE_URL not set");
        return;
    };
    let bot = memoh_db::bots::create(&pool, UserId::new(), memoh_core::types::BotType::Personal, "t", 16000)
    .await
    .unwrap();

    let r1 = memoh_db::routes::find_or_create(
        &pool,
        bot.id,
        &"web".to_string(),
        "session-1",
        None,
        ConversationId::new(),
    )
    .await
    .unwrap();

    let r2 = memoh_db::routes::find_or_create(
        &pool,
        bot.id,
        &"web".to_string(),
        "session-1",
        Some(""),
        ConversationId::new(),
    )
    .await
    .unwrap();

    assert_eq!(
        r1.id, r2.id,
        "None and Some(\"\") thread_id must be the same lookup key"
    );
}

#[tokio::test]
async fn distinct_thread_ids_get_distinct_routes() {
    let Some(pool) = memoh_db::test_support::scratch_pool().await else {
        eprintln!("skipping: MEMOH_TEST_DATABASE_URL not set");
        return;
    };
    let bot = memoh_db::bots::create(&pool, UserId::new(), memoh_core::types::BotType::Personal, "t", 16000)
    .await
    .unwrap();

    let parent = memoh_db::routes::find_or_create(
        &pool,
        bot.id,
        &"telegram".to_string(),
        "chat-2",
        None,
        ConversationId::new(),
    )
    .await
    .unwrap();

    let thread = memoh_db::routes::find_or_create(
        &pool,
        bot.id,
        &"telegram".to_string(),
        "chat-2",
        Some("42"),
        ConversationId::new(),
    )
    .await
    .unwrap();

    assert_ne!(parent.id, thread.id);
}
