use superbox::db;
use superbox::repositories::{ServerRepository, SqliteServerRepository};
use superbox::test_utils::test_helpers::{create_test_db_file, sample_record, sqlite_url};

#[tokio::test]
async fn test_records_survive_reopening_the_database() {
    let (pool, temp_file) = create_test_db_file().await.unwrap();

    let repo = SqliteServerRepository::new(pool.clone(), "registry");
    repo.put("weather", &sample_record("weather")).await.unwrap();
    repo.put("news", &sample_record("news")).await.unwrap();
    repo.delete("news").await.unwrap();
    pool.close().await;

    let reopened = db::create_pool(&sqlite_url(&temp_file).unwrap())
        .await
        .unwrap();
    let repo = SqliteServerRepository::new(reopened, "registry");

    let all = repo.list().await.unwrap().unwrap();
    assert_eq!(all.keys().collect::<Vec<_>>(), vec!["weather"]);
    assert_eq!(all["weather"], sample_record("weather"));
}

#[tokio::test]
async fn test_buckets_are_isolated() {
    let (pool, _temp_file) = create_test_db_file().await.unwrap();

    let staging = SqliteServerRepository::new(pool.clone(), "staging");
    let production = SqliteServerRepository::new(pool, "production");

    staging.put("weather", &sample_record("weather")).await.unwrap();

    assert!(production.get("weather").await.unwrap().is_none());
    assert!(production.list().await.unwrap().unwrap().is_empty());
    assert!(staging.get("weather").await.unwrap().is_some());
}

#[tokio::test]
async fn test_malformed_rows_are_skipped_by_list() {
    let (pool, _temp_file) = create_test_db_file().await.unwrap();

    sqlx::query("INSERT INTO registry_entries (bucket, name, record) VALUES (?, ?, ?)")
        .bind("registry")
        .bind("broken")
        .bind("{\"name\": ")
        .execute(&pool)
        .await
        .unwrap();

    let repo = SqliteServerRepository::new(pool, "registry");
    repo.put("weather", &sample_record("weather")).await.unwrap();

    let all = repo.list().await.unwrap().unwrap();
    assert_eq!(all.len(), 1);
    assert!(repo.get("broken").await.is_err());
}
