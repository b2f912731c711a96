//! PostgreSQL repository tests. They need a live database:
//! `DATABASE_URL=postgres://... cargo test -- --ignored`

use sqlx::PgPool;
use std::sync::Arc;
use verified_shortener::domain::entities::{NewClick, NewShortUrl, RedirectMode, Safety, Verdict};
use verified_shortener::domain::repositories::{ClickRepository, ShortUrlRepository};
use verified_shortener::infrastructure::persistence::{PgClickRepository, PgShortUrlRepository};

fn new_short_url(hash: &str, target: &str) -> NewShortUrl {
    NewShortUrl {
        hash: hash.to_string(),
        target: target.to_string(),
        mode: RedirectMode::Temporary,
        sponsor: Some("acme".to_string()),
        ip: Some("10.0.0.1".to_string()),
    }
}

#[sqlx::test]
#[ignore]
async fn test_insert_creates_unknown_record(pool: PgPool) {
    let repo = PgShortUrlRepository::new(Arc::new(pool));

    let outcome = repo
        .insert_if_absent(new_short_url("2a1b4024", "http://example.com/"))
        .await
        .unwrap();

    assert!(outcome.created);
    assert_eq!(outcome.record.safety, Safety::Unknown);
    assert_eq!(outcome.record.sponsor.as_deref(), Some("acme"));
    assert!(outcome.record.verified_at.is_none());
}

#[sqlx::test]
#[ignore]
async fn test_insert_is_idempotent(pool: PgPool) {
    let repo = PgShortUrlRepository::new(Arc::new(pool));

    repo.insert_if_absent(new_short_url("2a1b4024", "http://example.com/"))
        .await
        .unwrap();
    repo.update_safety("2a1b4024", Verdict::Safe).await.unwrap();

    let again = repo
        .insert_if_absent(new_short_url("2a1b4024", "http://example.com/"))
        .await
        .unwrap();

    assert!(!again.created);
    assert_eq!(again.record.safety, Safety::Safe);
}

#[sqlx::test]
#[ignore]
async fn test_update_safety(pool: PgPool) {
    let repo = PgShortUrlRepository::new(Arc::new(pool));
    repo.insert_if_absent(new_short_url("2a1b4024", "http://example.com/"))
        .await
        .unwrap();

    assert!(repo.update_safety("2a1b4024", Verdict::Unsafe).await.unwrap());
    assert!(!repo.update_safety("missing", Verdict::Safe).await.unwrap());

    let record = repo.find_by_hash("2a1b4024").await.unwrap().unwrap();
    assert_eq!(record.safety, Safety::Unsafe);
    assert!(record.verified_at.is_some());
}

#[sqlx::test]
#[ignore]
async fn test_pending_and_counts(pool: PgPool) {
    let repo = PgShortUrlRepository::new(Arc::new(pool));
    for (hash, target) in [
        ("aaaaaaaa", "http://a.example/"),
        ("bbbbbbbb", "http://b.example/"),
        ("cccccccc", "http://c.example/"),
    ] {
        repo.insert_if_absent(new_short_url(hash, target))
            .await
            .unwrap();
    }
    repo.update_safety("bbbbbbbb", Verdict::Safe).await.unwrap();

    let pending = repo.list_pending(10).await.unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|r| r.safety == Safety::Unknown));

    assert_eq!(repo.count_by_safety(Safety::Unknown).await.unwrap(), 2);
    assert_eq!(repo.count_by_safety(Safety::Safe).await.unwrap(), 1);
    assert_eq!(repo.count_by_safety(Safety::Unsafe).await.unwrap(), 0);
    assert!(repo.health_check().await);
}

#[sqlx::test]
#[ignore]
async fn test_clicks_round_trip(pool: PgPool) {
    let pool = Arc::new(pool);
    let short_urls = PgShortUrlRepository::new(pool.clone());
    let clicks = PgClickRepository::new(pool);

    short_urls
        .insert_if_absent(new_short_url("2a1b4024", "http://example.com/"))
        .await
        .unwrap();

    for browser in ["Firefox", "Chrome"] {
        clicks
            .record(NewClick {
                hash: "2a1b4024".to_string(),
                ip: Some("127.0.0.1".to_string()),
                browser: Some(browser.to_string()),
                platform: Some("Linux".to_string()),
                referrer: None,
            })
            .await
            .unwrap();
    }

    assert_eq!(clicks.count().await.unwrap(), 2);
    let listed = clicks.list_by_hash("2a1b4024", 1).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].hash, "2a1b4024");
}
