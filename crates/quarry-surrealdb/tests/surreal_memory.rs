//! Store behaviour on an in-process SurrealDB

use chrono::{TimeZone, Utc};
use quarry_core::{
    record, Catalog, Changeset, Criteria, DataType, Db, FindOptions, GetOptions, Operator,
    RelationDef, RelationOptions, Schema, Sort, Store, Value,
};
use quarry_surrealdb::{SurrealConfig, SurrealDb};
use std::sync::Arc;

async fn stores() -> (Arc<SurrealDb>, Store, Store) {
    let db = Arc::new(SurrealDb::connect(&SurrealConfig::memory()).await.unwrap());
    let catalog = Catalog::with_db(db.clone());
    let users = Schema::builder()
        .primary("id", DataType::U16)
        .field("name", DataType::String)
        .optional("age", DataType::U8)
        .optional("balance", DataType::U64)
        .optional("seen", DataType::DateTime)
        .optional("avatar", DataType::Blob)
        .relation("posts", RelationDef::many("posts", "author_id"))
        .build("users")
        .unwrap();
    let posts = Schema::builder()
        .primary("id", DataType::String)
        .field("title", DataType::String)
        .field("author_id", DataType::U16)
        .relation("author", RelationDef::belongs_to("users", "author_id"))
        .build("posts")
        .unwrap();
    let users = catalog.store("users", users).unwrap();
    let posts = catalog.store("posts", posts).unwrap();
    users.create_schema().await.unwrap();
    posts.create_schema().await.unwrap();
    (db, users, posts)
}

#[tokio::test]
async fn keys_types_and_null_ordering() {
    let (db, users, _) = stores().await;
    assert_eq!(db.engine(), "surrealdb");

    let seen = Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap();
    let first = users
        .insert(record! {
            "name" => "Ada",
            "age" => 36u8,
            "balance" => u64::MAX,
            "seen" => seen,
            "avatar" => vec![0u8, 1, 2],
        })
        .await
        .unwrap();
    let second = users.insert(record! { "name" => "Bob" }).await.unwrap();
    assert_eq!(first.get("id"), Some(&Value::UInt(1)));
    assert_eq!(second.get("id"), Some(&Value::UInt(2)));

    let ada = users.get(1u16, GetOptions::default()).await.unwrap();
    assert_eq!(ada.get("balance"), Some(&Value::UInt(u64::MAX as u128)));
    assert_eq!(ada.get("seen"), Some(&Value::DateTime(seen)));
    assert_eq!(ada.get("avatar"), Some(&Value::Blob(vec![0, 1, 2])));

    let rows = users
        .find(FindOptions::new().sort(Sort::new().asc("age")).select(["name"]))
        .await
        .unwrap();
    let names: Vec<_> = rows.iter().filter_map(|r| r.get("name")).collect();
    assert_eq!(names, [&Value::from("Bob"), &Value::from("Ada")]);
    assert!(rows[0].get("id").is_none());

    let err = users
        .insert(record! { "id" => 2u16, "name" => "dup" })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "pk_duplicate");
}

#[tokio::test]
async fn operators_skip_missing_values() {
    let (_, users, _) = stores().await;
    for (name, age) in [("Donald", Some(30u8)), ("donna", Some(40)), ("Ryan", None)] {
        let mut record = record! { "name" => name };
        if let Some(age) = age {
            record.insert("age", age);
        }
        users.insert(record).await.unwrap();
    }

    let count = |criteria| users.count(criteria);
    assert_eq!(count(Criteria::new().op("age", Operator::Lt, 35u8)).await.unwrap(), 1);
    assert_eq!(count(Criteria::new().op("age", Operator::Ne, 30u8)).await.unwrap(), 1);
    assert_eq!(count(Criteria::new().op("name", Operator::Like, "Don%")).await.unwrap(), 1);
    assert_eq!(count(Criteria::new().op("name", Operator::ILike, "DON%")).await.unwrap(), 2);
    assert_eq!(count(Criteria::new().null("age")).await.unwrap(), 1);
    assert_eq!(count(Criteria::new().eq("name", "nobody")).await.unwrap(), 0);

    let changed = users
        .update_many(
            Criteria::new().op("age", Operator::Gte, 30u8),
            Changeset::new().unset("age"),
        )
        .await
        .unwrap();
    assert_eq!(changed, 2);
    assert_eq!(count(Criteria::new().null("age")).await.unwrap(), 3);

    let deleted = users
        .delete_many(Criteria::new().op("name", Operator::Like, "%n"))
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(users.count(Criteria::new()).await.unwrap(), 2);
}

#[tokio::test]
async fn relations_load_in_phases() {
    let (_, users, posts) = stores().await;
    users.insert(record! { "name" => "a" }).await.unwrap();
    users.insert(record! { "name" => "b" }).await.unwrap();
    users.insert(record! { "name" => "c" }).await.unwrap();
    for (title, author) in [("zebra", 1u16), ("apple", 1), ("mango", 2)] {
        posts
            .insert(record! { "title" => title, "author_id" => author })
            .await
            .unwrap();
    }

    let rows = users
        .find(
            FindOptions::new().sort(Sort::new().asc("id")).with_options(
                "posts",
                RelationOptions::new()
                    .sort(Sort::new().asc("title"))
                    .select(["title"])
                    .limit(1),
            ),
        )
        .await
        .unwrap();
    let first: Vec<_> = rows
        .iter()
        .map(|r| {
            r.related("posts")
                .and_then(|p| p.as_many())
                .and_then(|p| p.first())
                .and_then(|p| p.get("title"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .collect();
    assert_eq!(first, [Some("apple".to_string()), Some("mango".to_string()), None]);

    let post = posts
        .find(
            FindOptions::new()
                .filter(Criteria::new().eq("title", "mango"))
                .with("author"),
        )
        .await
        .unwrap();
    let author = post[0].related("author").and_then(|a| a.as_one()).unwrap();
    assert_eq!(author.get("name"), Some(&Value::from("b")));
}

#[tokio::test]
async fn schema_round_trip() {
    let (_, users, _) = stores().await;
    users.insert(record! { "name" => "a" }).await.unwrap();
    users.delete_schema().await.unwrap();
    users.delete_schema().await.unwrap();
    users.create_schema().await.unwrap();
    assert_eq!(users.count(Criteria::new()).await.unwrap(), 0);

    let again = users.insert(record! { "name" => "b" }).await.unwrap();
    assert_eq!(again.get("id"), Some(&Value::UInt(1)));
}
