use memoh_core::types::BotType;
use memoh_db::DbError;

#[tokio::test]
async fn version_numbers_are_monotone_and_survive_rollback() {
    let Some(pool) = memoh_db::test_support::scratch_pool().await else {
        eprintln!("skipping: MEMOH_TEST_DATABASE_URL not set");
        return;
    };
    let bot = memoh_db::bots::create(
        &pool,
        memoh_core::types::UserId::new(),
        BotType::Personal,
        "t",
        16000,
    )
    .await
    .unwrap();
    let container = memoh_db::containers::create(&pool, bot.id, "memoh/sandbox:latest", "/srv/memoh/containers/x")
    .await
    .unwrap();

    let snap_a = memoh_db::containers::create_snapshot(&pool, container.id, None, Some("a"), "s3://a")
    .await
    .unwrap();
    let v1 = memoh_db::containers::create_version(&pool, container.id, snap_a.id, None)
    .await
    .unwrap();
    assert_eq!(v1.version_number, 1);

    let snap_b = memoh_db::containers::create_snapshot(&pool, container.id, Some(snap_a.id), Some("b"), "s3://b")
    .await
    .unwrap();
    let v2 = memoh_db::containers::create_version(&pool, container.id, snap_b.id, None)
    .await
    .unwrap();
    assert_eq!(v2.version_number, 2);

    // Rollback to snap_a: a *new* version 3 is created pointing at the old
    // snapshot. version_number never goes backwards or gets reused.
    let v3 = memoh_db::containers::create_version(&pool, container.id, snap_a.id, Some("rollback"))
    .await
    .unwrap();
    assert_eq!(v3.version_number, 3);
    assert_eq!(v3.snapshot_id, snap_a.id);

    let latest = memoh_db::containers::latest_version(&pool, container.id)
    .await
    .unwrap()
    .unwrap();
    assert_eq!(latest.version_number, 3);
}

#[tokio::test]
async fn snapshot_referenced_by_version_cannot_be_deleted() {
    let Some(pool) = memoh_db::test_support::scratch_pool().await else {
        eprintln!("skipping: MEMOH_TEST_DATABASE_URL not set");
        return;
    };
    let bot = memoh_db::bots::create(
        &pool,
        memoh_core::types::UserId::new(),
        BotType::Personal,
        "t",
        16000,
    )
    .await
    .unwrap();
    let container = memoh_db::containers::create(&pool, bot.id, "memoh/sandbox:latest", "/srv/memoh/containers/y")
    .await
    .unwrap();
    let snap = memoh_db::containers::create_snapshot(&pool, container.id, None, None, "s3://snap")
    .await
    .unwrap();
    memoh_db::containers::create_version(&pool, container.id, snap.id, None)
    .await
    .unwrap();

    let err = memoh_db::containers::delete_snapshot(&pool, snap.id)
    .await
    .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));
}
