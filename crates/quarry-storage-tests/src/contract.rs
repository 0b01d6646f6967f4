//! Behaviour every [`Db`] must share
//!
//! Each check builds a fresh [`Fixture`], exercises one area of the
//! contract through the `Store` facade and drops its tables again.

use crate::fixtures::{column, Fixture};
use anyhow::{Context, Result};
use chrono::{Duration, TimeZone, Utc};
use quarry_core::{
    record, Changeset, Criteria, Db, FindOptions, GetOptions, Operator, Related, RelationOptions,
    Sort, Store, Value,
};
use std::sync::Arc;
use url::Url;

async fn seed_users(users: &Store, people: &[(&str, Option<u8>)]) -> Result<()> {
    for (name, age) in people {
        let mut record = record! { "name" => *name };
        if let Some(age) = age {
            record.insert("age", *age);
        }
        users.insert(record).await?;
    }
    Ok(())
}

// ============================================================================
// Keys
// ============================================================================

pub async fn generated_keys(db: Arc<dyn Db>) -> Result<()> {
    let fx = Fixture::new(db).await?;

    let first = fx.users.insert(record! { "name" => "a" }).await?;
    let second = fx.users.insert(record! { "name" => "b" }).await?;
    assert_eq!(first.get("id"), Some(&Value::UInt(1)));
    assert_eq!(second.get("id"), Some(&Value::UInt(2)));

    let post = fx
        .posts
        .insert(record! { "title" => "t", "author_id" => 1u32 })
        .await?;
    let id = post.get("id").and_then(Value::as_str).context("uuid key")?;
    assert_eq!(id.len(), 36);
    assert!(fx.posts.has(id.to_string()).await?);

    let err = fx
        .users
        .insert(record! { "id" => 2u32, "name" => "dup" })
        .await
        .err()
        .context("duplicate insert succeeded")?;
    assert_eq!(err.code(), "pk_duplicate");
    assert_eq!(fx.users.count(Criteria::new()).await?, 2);

    fx.values.insert(record! { "id" => u64::MAX }).await?;
    let err = fx
        .values
        .insert(record! { "tiny" => 1i8 })
        .await
        .err()
        .context("key past u64::MAX")?;
    assert_eq!(err.code(), "pk_exhausted");

    fx.teardown().await
}

// ============================================================================
// Criteria
// ============================================================================

pub async fn criteria(db: Arc<dyn Db>) -> Result<()> {
    let fx = Fixture::new(db).await?;
    seed_users(
        &fx.users,
        &[("Donald", Some(30)), ("donna", Some(40)), ("Ryan", None)],
    )
    .await?;
    let users = &fx.users;
    let count = |criteria: Criteria| users.count(criteria);

    assert_eq!(count(Criteria::new().eq("name", "Ryan")).await?, 1);
    assert_eq!(count(Criteria::new().null("age")).await?, 1);
    assert_eq!(count(Criteria::new().op("age", Operator::Gt, 30u8)).await?, 1);
    assert_eq!(count(Criteria::new().op("age", Operator::Gte, 30u8)).await?, 2);
    assert_eq!(count(Criteria::new().op("age", Operator::Lt, 40u8)).await?, 1);
    assert_eq!(count(Criteria::new().op("age", Operator::Lte, 40u8)).await?, 2);

    // Missing values never satisfy a comparison
    assert_eq!(count(Criteria::new().op("age", Operator::Ne, 30u8)).await?, 1);

    let range = Criteria::new()
        .op("age", Operator::Gte, 30u8)
        .op("age", Operator::Lt, 40u8);
    assert_eq!(count(range).await?, 1);

    assert_eq!(count(Criteria::new().op("name", Operator::Like, "Don%")).await?, 1);
    assert_eq!(count(Criteria::new().op("name", Operator::ILike, "DON%")).await?, 2);
    assert_eq!(count(Criteria::new().op("name", Operator::Like, "R_an")).await?, 1);
    assert_eq!(count(Criteria::new().op("name", Operator::Like, "%.%")).await?, 0);

    let both = Criteria::new()
        .op("name", Operator::ILike, "d%")
        .eq("age", 40u8);
    let rows = users.find(FindOptions::new().filter(both)).await?;
    assert_eq!(column(&rows, "name"), ["donna"]);

    fx.teardown().await
}

// ============================================================================
// Sort, limit and projection
// ============================================================================

pub async fn ordering(db: Arc<dyn Db>) -> Result<()> {
    let fx = Fixture::new(db).await?;
    seed_users(
        &fx.users,
        &[("A", Some(20)), ("B", None), ("C", Some(20)), ("D", Some(10))],
    )
    .await?;
    let find = |options: FindOptions| fx.users.find(options);

    let rows = find(FindOptions::new().sort(Sort::new().asc("age"))).await?;
    assert_eq!(column(&rows, "name"), ["B", "D", "A", "C"]);

    let rows = find(FindOptions::new().sort(Sort::new().desc("age"))).await?;
    assert_eq!(column(&rows, "name"), ["A", "C", "D", "B"]);

    let rows = find(FindOptions::new().sort(Sort::new().asc("age").desc("name"))).await?;
    assert_eq!(column(&rows, "name"), ["B", "D", "C", "A"]);

    let rows = find(FindOptions::new().sort(Sort::new().asc("age")).limit(2)).await?;
    assert_eq!(column(&rows, "name"), ["B", "D"]);

    let rows = find(
        FindOptions::new()
            .select(["name"])
            .sort(Sort::new().asc("id")),
    )
    .await?;
    assert_eq!(column(&rows, "name"), ["A", "B", "C", "D"]);
    assert!(rows.iter().all(|r| r.len() == 1));

    let c = fx.users.get(3u32, GetOptions::new().select(["age"])).await?;
    assert_eq!(c.get("age"), Some(&Value::UInt(20)));
    assert!(!c.contains("name"));

    fx.teardown().await
}

// ============================================================================
// Writes
// ============================================================================

pub async fn writes(db: Arc<dyn Db>) -> Result<()> {
    let fx = Fixture::new(db).await?;
    seed_users(
        &fx.users,
        &[("Donald", Some(30)), ("donna", Some(40)), ("Ryan", Some(50))],
    )
    .await?;
    let users = &fx.users;

    users.update(1u32, Changeset::new().set("name", "Don")).await?;
    let don = users.get(1u32, GetOptions::new()).await?;
    assert_eq!(don.get("name"), Some(&Value::from("Don")));
    assert_eq!(don.get("age"), Some(&Value::UInt(30)));

    users.update(1u32, Changeset::new().unset("age")).await?;
    assert_eq!(users.count(Criteria::new().null("age")).await?, 1);

    let err = users
        .update(99u32, Changeset::new().set("name", "x"))
        .await
        .err()
        .context("update of a missing key succeeded")?;
    assert!(err.is_not_found());

    let matched = users
        .update_many(
            Criteria::new().op("age", Operator::Gte, 40u8),
            Changeset::new().set("age", 50u8),
        )
        .await?;
    assert_eq!(matched, 2);
    assert_eq!(users.count(Criteria::new().eq("age", 50u8)).await?, 2);

    users.delete(2u32).await?;
    assert!(!users.has(2u32).await?);
    let deleted = users
        .delete_many(Criteria::new().op("name", Operator::Like, "%n"))
        .await?;
    assert_eq!(deleted, 2);
    assert_eq!(users.count(Criteria::new()).await?, 0);

    fx.teardown().await
}

// ============================================================================
// Relations
// ============================================================================

async fn seed_relations(fx: &Fixture) -> Result<()> {
    seed_users(&fx.users, &[("Donald", None), ("Ryan", None), ("Nobody", None)]).await?;
    let posts = [("zebra", 1u32, Some(5i64)), ("apple", 1, Some(9)), ("mango", 2, None)];
    for (title, author, score) in posts {
        let mut post = record! { "title" => title, "author_id" => author };
        if let Some(score) = score {
            post.insert("score", score);
        }
        fx.posts.insert(post).await?;
    }
    fx.profiles
        .insert(record! { "user_id" => 1u32, "bio" => "hi" })
        .await?;
    Ok(())
}

fn many<'a>(row: &'a quarry_core::Record, name: &str) -> &'a [quarry_core::Record] {
    row.related(name).and_then(Related::as_many).unwrap_or_default()
}

pub async fn relations(db: Arc<dyn Db>) -> Result<()> {
    let fx = Fixture::new(db).await?;
    seed_relations(&fx).await?;
    let by_id = || FindOptions::new().sort(Sort::new().asc("id"));

    let rows = fx
        .users
        .find(by_id().with_options(
            "posts",
            RelationOptions::new().sort(Sort::new().asc("title")),
        ))
        .await?;
    assert_eq!(column(many(&rows[0], "posts"), "title"), ["apple", "zebra"]);
    assert_eq!(column(many(&rows[1], "posts"), "title"), ["mango"]);
    assert!(many(&rows[2], "posts").is_empty());

    let rows = fx
        .users
        .find(by_id().with_options(
            "posts",
            RelationOptions::new().sort(Sort::new().desc("score")).limit(1),
        ))
        .await?;
    assert_eq!(column(many(&rows[0], "posts"), "title"), ["apple"]);
    assert_eq!(column(many(&rows[1], "posts"), "title"), ["mango"]);
    assert!(many(&rows[2], "posts").is_empty());

    let rows = fx
        .users
        .find(by_id().with_options(
            "posts",
            RelationOptions::new()
                .filter(Criteria::new().op("score", Operator::Gt, 6i64))
                .select(["title"]),
        ))
        .await?;
    let donald = many(&rows[0], "posts");
    assert_eq!(column(donald, "title"), ["apple"]);
    assert!(!donald[0].contains("score"));
    assert!(many(&rows[1], "posts").is_empty());

    let rows = fx
        .users
        .find(
            FindOptions::new()
                .select(["id"])
                .sort(Sort::new().asc("name"))
                .with("posts"),
        )
        .await?;
    assert_eq!(column(&rows, "id"), ["1", "3", "2"]);
    assert!(!rows[0].contains("name"));
    assert_eq!(column(many(&rows[0], "posts"), "title"), ["zebra", "apple"]);
    assert!(many(&rows[1], "posts").is_empty());
    assert_eq!(column(many(&rows[2], "posts"), "title"), ["mango"]);

    let rows = fx.users.find(by_id().select(["name"]).with("profile")).await?;
    assert!(!rows[0].contains("id"));
    let profile = rows[0].related("profile").and_then(Related::as_one);
    assert_eq!(profile.and_then(|p| p.get("bio")), Some(&Value::from("hi")));
    assert_eq!(rows[1].related("profile"), Some(&Related::One(None)));

    let rows = fx
        .posts
        .find(
            FindOptions::new()
                .filter(Criteria::new().eq("title", "mango"))
                .select(["title"])
                .with("author"),
        )
        .await?;
    assert!(!rows[0].contains("author_id"));
    let author = rows[0].related("author").and_then(Related::as_one);
    assert_eq!(author.and_then(|a| a.get("name")), Some(&Value::from("Ryan")));

    fx.teardown().await
}

// ============================================================================
// Datatypes
// ============================================================================

pub async fn datatypes(db: Arc<dyn Db>) -> Result<()> {
    let fx = Fixture::new(db).await?;
    let at = Utc
        .with_ymd_and_hms(2021, 6, 1, 12, 30, 15)
        .single()
        .context("fixed timestamp")?
        + Duration::milliseconds(123);
    let link = Url::parse("https://example.com/a?b=c")?;

    let low = record! {
        "id" => 1u64,
        "tiny" => i8::MIN,
        "wide" => u128::MAX,
        "signed" => i128::MIN,
        "ratio" => 0.5f64,
        "flag" => true,
        "at" => at,
        "link" => link.clone(),
        "data" => vec![0u8, 255, 10],
    };
    let high = record! {
        "id" => u64::MAX,
        "tiny" => i8::MAX,
        "wide" => 0u128,
        "signed" => i128::MAX,
        "ratio" => -1.25f64,
        "flag" => false,
        "at" => at + Duration::days(1),
    };
    fx.values.insert(low.clone()).await?;
    fx.values.insert(high).await?;

    let stored = fx.values.get(1u64, GetOptions::new()).await?;
    assert_eq!(stored, low);

    let values = &fx.values;
    let ids = |options: FindOptions| async move {
        let rows = values.find(options).await?;
        anyhow::Ok(column(&rows, "id"))
    };
    let max = u64::MAX.to_string();

    let rows = ids(FindOptions::new().sort(Sort::new().desc("id"))).await?;
    assert_eq!(rows, [max.as_str(), "1"]);
    let rows = ids(FindOptions::new().sort(Sort::new().asc("signed"))).await?;
    assert_eq!(rows, ["1", max.as_str()]);
    let rows = ids(FindOptions::new().sort(Sort::new().asc("tiny"))).await?;
    assert_eq!(rows, ["1", max.as_str()]);

    let wide = Criteria::new().op("wide", Operator::Gt, 1u64);
    assert_eq!(ids(FindOptions::new().filter(wide)).await?, ["1"]);
    let signed = Criteria::new().op("signed", Operator::Lt, 0i8);
    assert_eq!(ids(FindOptions::new().filter(signed)).await?, ["1"]);
    let after = Criteria::new().op("at", Operator::After, at);
    assert_eq!(ids(FindOptions::new().filter(after)).await?, [max.as_str()]);
    let ratio = Criteria::new().op("ratio", Operator::Lt, 0.0f64);
    assert_eq!(ids(FindOptions::new().filter(ratio)).await?, [max.as_str()]);
    assert_eq!(values.count(Criteria::new().eq("flag", false)).await?, 1);
    assert_eq!(values.count(Criteria::new().eq("link", link)).await?, 1);
    assert_eq!(values.count(Criteria::new().null("data")).await?, 1);

    fx.teardown().await
}

// ============================================================================
// Schema lifecycle
// ============================================================================

pub async fn schema_lifecycle(db: Arc<dyn Db>) -> Result<()> {
    let fx = Fixture::new(db).await?;
    fx.users.create_schema().await?;
    fx.users.insert(record! { "name" => "kept" }).await?;
    fx.users.create_schema().await?;
    assert_eq!(fx.users.count(Criteria::new()).await?, 1);

    fx.users.delete_schema().await?;
    fx.users.delete_schema().await?;
    fx.users.create_schema().await?;
    assert_eq!(fx.users.count(Criteria::new()).await?, 0);

    fx.teardown().await
}
