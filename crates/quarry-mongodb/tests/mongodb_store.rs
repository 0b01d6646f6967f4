//! Live MongoDB checks; skipped unless `QUARRY_MONGODB_URL` is set

use quarry_core::{
    record, Catalog, Criteria, DataType, Db, FindOptions, Operator, RelationDef, RelationOptions,
    Schema, Sort, Store, Value,
};
use quarry_mongodb::{MongoConfig, MongoDb};
use std::sync::Arc;

async fn connect() -> Option<Arc<MongoDb>> {
    let uri = std::env::var("QUARRY_MONGODB_URL").ok()?;
    let database = format!("quarry_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
    Some(Arc::new(
        MongoDb::connect(&MongoConfig::new(uri, database)).await.unwrap(),
    ))
}

async fn stores(db: Arc<MongoDb>) -> (Store, Store) {
    let catalog = Catalog::with_db(db);
    let users = Schema::builder()
        .primary("id", DataType::U8)
        .field("name", DataType::String)
        .optional("age", DataType::U8)
        .relation("posts", RelationDef::many("posts", "author_id"))
        .build("users")
        .unwrap();
    let posts = Schema::builder()
        .primary("id", DataType::String)
        .field("title", DataType::String)
        .field("author_id", DataType::U8)
        .build("posts")
        .unwrap();
    let users = catalog.store("users", users).unwrap();
    let posts = catalog.store("posts", posts).unwrap();
    users.create_schema().await.unwrap();
    posts.create_schema().await.unwrap();
    (users, posts)
}

#[tokio::test]
async fn keys_nulls_and_ne() {
    let Some(db) = connect().await else { return };
    let (users, _) = stores(db.clone()).await;

    let first = users
        .insert(record! { "name" => "a", "age" => 30u8 })
        .await
        .unwrap();
    let second = users.insert(record! { "name" => "b" }).await.unwrap();
    assert_eq!(first.get("id"), Some(&Value::UInt(1)));
    assert_eq!(second.get("id"), Some(&Value::UInt(2)));

    let ne = users
        .count(Criteria::new().op("age", Operator::Ne, 31u8))
        .await
        .unwrap();
    assert_eq!(ne, 1);
    assert_eq!(users.count(Criteria::new().null("age")).await.unwrap(), 1);

    let err = users
        .insert(record! { "id" => 1u8, "name" => "dup" })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "pk_duplicate");
    db.close().await.unwrap();
}

#[tokio::test]
async fn per_parent_limit_in_memory() {
    let Some(db) = connect().await else { return };
    let (users, posts) = stores(db).await;

    users.insert(record! { "name" => "a" }).await.unwrap();
    users.insert(record! { "name" => "b" }).await.unwrap();
    for (title, author) in [("zebra", 1u8), ("apple", 1), ("mango", 2)] {
        posts
            .insert(record! { "title" => title, "author_id" => author })
            .await
            .unwrap();
    }

    let rows = users
        .find(
            FindOptions::new().sort(Sort::new().asc("id")).with_options(
                "posts",
                RelationOptions::new().sort(Sort::new().asc("title")).limit(1),
            ),
        )
        .await
        .unwrap();
    let titles: Vec<_> = rows
        .iter()
        .map(|r| {
            r.related("posts").and_then(|p| p.as_many()).unwrap()[0]
                .get("title")
                .and_then(Value::as_str)
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(titles, ["apple", "mango"]);
}
