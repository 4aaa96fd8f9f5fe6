use memoh_core::types::{BotType, MessageRole, UserId};
use memoh_db::messages::NewMessage;

#[tokio::test]
async fn duplicate_external_message_id_reuses_row() {
    let Some(pool) = memoh_db::test_support::scratch_pool().await else {
        eprintln!("skipping: MEMOH_TEST_DATABASE_URL not set");
        return;
    };
    let bot = memoh_db::bots::create(&pool, UserId::new(), BotType::Personal, "t", 16000)
    .await
    .unwrap();

    let new = NewMessage {
        platform: Some("telegram".into()),
        external_message_id: Some("msg-123".into()),
        ..Default::default()
    };

    let m1 = memoh_db::messages::insert(
        &pool,
        bot.id,
        MessageRole::User,
        serde_json::json!({"text": "hi"}),
        serde_json::json!({}),
        new.clone(),
    )
    .await
    .unwrap();

    let m2 = memoh_db::messages::insert(
        &pool,
        bot.id,
        MessageRole::User,
        serde_json::json!({"text": "hi again, retried webhook"}),
        serde_json::json!({}),
        new,
    )
    .await
    .unwrap();

    assert_eq!(m1.id, m2.id, "retried webhook delivery must not duplicate the message");
}

#[tokio::test]
async fn missing_external_id_always_inserts_new_row() {
    let Some(pool) = memoh_db::test_support::scratch_pool().await else {
        eprintln!("skipping: MEMOH_TEST_DATABASE_URL not set");
        return;
    };
    let bot = memoh_db::bots::create(&pool, UserId::new(), BotType::Personal, "t", 16000)
    .await
    .unwrap();

    let new = NewMessage::default();

    let m1 = memoh_db::messages::insert(
        &pool,
        bot.id,
        MessageRole::User,
        serde_json::json!({"text": "a"}),
        serde_json::json!({}),
        new.clone(),
    )
    .await
    .unwrap();

    let m2 = memoh_db::messages::insert(
        &pool,
        bot.id,
        MessageRole::User,
        serde_json::json!({"text": "a"}),
        serde_json::json!({}),
        new,
    )
    .await
    .unwrap();

    assert_ne!(m1.id, m2.id, "without an external id there is nothing to dedupe against");
}
