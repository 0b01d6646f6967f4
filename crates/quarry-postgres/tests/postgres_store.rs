//! Live PostgreSQL checks; skipped unless `QUARRY_POSTGRES_URL` is set

use quarry_core::{
    record, Catalog, DataType, Db, FindOptions, GetOptions, RelationDef, Schema, Sort, Store, Value,
};
use quarry_postgres::{PostgresConfig, PostgresDb};
use std::sync::Arc;

async fn connect() -> Option<Arc<PostgresDb>> {
    let url = std::env::var("QUARRY_POSTGRES_URL").ok()?;
    Some(Arc::new(
        PostgresDb::connect(&PostgresConfig::new(url)).await.unwrap(),
    ))
}

fn suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

async fn stores(db: Arc<PostgresDb>) -> (Store, Store) {
    let s = suffix();
    let (users_name, posts_name) = (format!("users_{s}"), format!("posts_{s}"));
    let catalog = Catalog::with_db(db);

    let users = Schema::builder()
        .primary("id", DataType::U16)
        .field("name", DataType::String)
        .optional("balance", DataType::U128)
        .relation("posts", RelationDef::many(posts_name.clone(), "author_id"))
        .build(&users_name)
        .unwrap();
    let posts = Schema::builder()
        .primary("id", DataType::U64)
        .field("title", DataType::String)
        .field("author_id", DataType::U16)
        .build(&posts_name)
        .unwrap();

    let users = catalog.store(&users_name, users).unwrap();
    let posts = catalog.store(&posts_name, posts).unwrap();
    users.create_schema().await.unwrap();
    posts.create_schema().await.unwrap();
    (users, posts)
}

#[tokio::test]
async fn serial_and_numeric_keys() {
    let Some(db) = connect().await else { return };
    let (users, posts) = stores(db.clone()).await;

    let alice = users
        .insert(record! { "name" => "alice", "balance" => u128::MAX })
        .await
        .unwrap();
    assert_eq!(alice.get("id"), Some(&Value::UInt(1)));

    let first = posts
        .insert(record! { "title" => "a", "author_id" => 1u16 })
        .await
        .unwrap();
    let second = posts
        .insert(record! { "title" => "b", "author_id" => 1u16 })
        .await
        .unwrap();
    assert_eq!(first.get("id"), Some(&Value::UInt(1)));
    assert_eq!(second.get("id"), Some(&Value::UInt(2)));

    let back = users.get(1u16, GetOptions::default()).await.unwrap();
    assert_eq!(back.get("balance"), Some(&Value::UInt(u128::MAX)));

    users.delete_schema().await.unwrap();
    posts.delete_schema().await.unwrap();
    db.close().await.unwrap();
}

#[tokio::test]
async fn joined_relations_and_case_sensitive_sort() {
    let Some(db) = connect().await else { return };
    let (users, posts) = stores(db.clone()).await;

    for name in ["bob", "Alice", "alice"] {
        users.insert(record! { "name" => name }).await.unwrap();
    }
    posts
        .insert(record! { "title" => "hello", "author_id" => 2u16 })
        .await
        .unwrap();

    let rows = users
        .find(FindOptions::new().sort(Sort::new().asc("name")).with("posts"))
        .await
        .unwrap();
    let names: Vec<_> = rows
        .iter()
        .filter_map(|r| r.get("name").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(names, ["Alice", "alice", "bob"]);
    assert_eq!(
        rows[0].related("posts").and_then(|r| r.as_many()).map(<[_]>::len),
        Some(1)
    );

    let err = posts
        .insert(record! { "id" => 1u64, "title" => "dup", "author_id" => 1u16 })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "pk_duplicate");

    users.delete_schema().await.unwrap();
    posts.delete_schema().await.unwrap();
}
