//! Relation plans against a file-backed SQLite database

use quarry_core::{
    record, Catalog, Criteria, DataType, FindOptions, Operator, RelationDef, RelationOptions,
    Schema, Sort, Store,
};
use quarry_sqlite::{SqliteConfig, SqliteDb};
use std::sync::Arc;
use tempfile::TempDir;

async fn setup(dir: &TempDir) -> (Arc<SqliteDb>, Store, Store) {
    let db = Arc::new(SqliteDb::open(SqliteConfig::new(dir.path().join("quarry.db"))).unwrap());
    let catalog = Catalog::with_db(db.clone());

    let users = Schema::builder()
        .primary("id", DataType::String)
        .field("name", DataType::String)
        .relation("posts", RelationDef::many("posts", "author_id"))
        .build("users")
        .unwrap();
    let posts = Schema::builder()
        .primary("id", DataType::U32)
        .field("title", DataType::String)
        .field("author_id", DataType::String)
        .build("posts")
        .unwrap();

    let users = catalog.store("users", users).unwrap();
    let posts = catalog.store("posts", posts).unwrap();
    users.create_schema().await.unwrap();
    posts.create_schema().await.unwrap();

    for (id, name) in [("u1", "Donald"), ("u2", "Ryan"), ("u3", "Nobody")] {
        users
            .insert(record! { "id" => id, "name" => name })
            .await
            .unwrap();
    }
    for (title, author) in [("zebra", "u1"), ("apple", "u1"), ("mango", "u2")] {
        posts
            .insert(record! { "title" => title, "author_id" => author })
            .await
            .unwrap();
    }
    (db, users, posts)
}

#[tokio::test]
async fn plain_many_relation_joins() {
    let dir = TempDir::new().unwrap();
    let (db, users, _) = setup(&dir).await;

    let rows = users
        .find(FindOptions::new().sort(Sort::new().asc("id")).with("posts"))
        .await
        .unwrap();
    assert!(db.explain("users").unwrap().contains("LEFT JOIN"));

    assert_eq!(rows.len(), 3);
    let first = rows[0].related("posts").and_then(|r| r.as_many()).unwrap();
    assert_eq!(first.len(), 2);
    let third = rows[2].related("posts").and_then(|r| r.as_many()).unwrap();
    assert!(third.is_empty());
}

#[tokio::test]
async fn filtered_relation_goes_phased_with_same_result() {
    let dir = TempDir::new().unwrap();
    let (db, users, _) = setup(&dir).await;

    let joined = users
        .find(FindOptions::new().sort(Sort::new().asc("id")).with("posts"))
        .await
        .unwrap();
    let phased = users
        .find(
            FindOptions::new().sort(Sort::new().asc("id")).with_options(
                "posts",
                RelationOptions::new().filter(Criteria::new().op("title", Operator::Like, "%")),
            ),
        )
        .await
        .unwrap();
    assert!(db.explain("posts").unwrap().contains("IN ("));
    assert_eq!(joined, phased);
}

#[tokio::test]
async fn per_parent_limit_ranks_children() {
    let dir = TempDir::new().unwrap();
    let (db, users, _) = setup(&dir).await;

    let rows = users
        .find(
            FindOptions::new().sort(Sort::new().asc("id")).with_options(
                "posts",
                RelationOptions::new().sort(Sort::new().asc("title")).limit(1),
            ),
        )
        .await
        .unwrap();
    assert!(db.explain("posts").unwrap().contains("ROW_NUMBER()"));

    let first = rows[0].related("posts").and_then(|r| r.as_many()).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].get("title").and_then(|v| v.as_str()), Some("apple"));
}

#[tokio::test]
async fn joined_read_sorts_by_unselected_field() {
    let dir = TempDir::new().unwrap();
    let (db, users, _) = setup(&dir).await;

    let rows = users
        .find(
            FindOptions::new()
                .select(["id"])
                .sort(Sort::new().asc("name"))
                .with("posts"),
        )
        .await
        .unwrap();
    assert!(db.explain("users").unwrap().contains("LEFT JOIN"));

    let ids: Vec<_> = rows.iter().map(|r| r.get("id").unwrap().to_string()).collect();
    assert_eq!(ids, ["u1", "u3", "u2"]);
    assert!(!rows[0].contains("name"));
    let donald = rows[0].related("posts").and_then(|r| r.as_many()).unwrap();
    assert_eq!(donald.len(), 2);
}
