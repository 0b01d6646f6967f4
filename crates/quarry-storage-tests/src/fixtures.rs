//! Stores shared by the contract checks
//!
//! Every fixture gets its own table names, so runs against a shared
//! server never see each other's rows.

use anyhow::Result;
use quarry_core::{Catalog, DataType, Db, Record, RelationDef, Schema, Store, Value};
use std::sync::Arc;
use tracing::debug;

pub struct Fixture {
    pub users: Store,
    pub posts: Store,
    pub profiles: Store,
    pub values: Store,
}

impl Fixture {
    /// Register and create every store on `db`
    pub async fn new(db: Arc<dyn Db>) -> Result<Self> {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let name = |base: &str| format!("{base}_{}", &suffix[..8]);
        let (users, posts, profiles, values) =
            (name("users"), name("posts"), name("profiles"), name("vals"));

        debug!(engine = db.engine(), %suffix, "creating fixture tables");
        let catalog = Catalog::with_db(db);
        let users_schema = Schema::builder()
            .primary("id", DataType::U32)
            .field("name", DataType::String)
            .optional("age", DataType::U8)
            .relation("posts", RelationDef::many(&posts, "author_id"))
            .relation("profile", RelationDef::one(&profiles, "user_id"))
            .build(&users)?;
        let posts_schema = Schema::builder()
            .primary("id", DataType::String)
            .field("title", DataType::String)
            .field("author_id", DataType::U32)
            .optional("score", DataType::I64)
            .relation("author", RelationDef::belongs_to(&users, "author_id"))
            .build(&posts)?;
        let profiles_schema = Schema::builder()
            .primary("id", DataType::U16)
            .field("user_id", DataType::U32)
            .field("bio", DataType::String)
            .build(&profiles)?;
        let values_schema = Schema::builder()
            .primary("id", DataType::U64)
            .optional("tiny", DataType::I8)
            .optional("wide", DataType::U128)
            .optional("signed", DataType::I128)
            .optional("ratio", DataType::F64)
            .optional("flag", DataType::Boolean)
            .optional("at", DataType::DateTime)
            .optional("link", DataType::Url)
            .optional("data", DataType::Blob)
            .build(&values)?;

        let fixture = Self {
            users: catalog.store(&users, users_schema)?,
            posts: catalog.store(&posts, posts_schema)?,
            profiles: catalog.store(&profiles, profiles_schema)?,
            values: catalog.store(&values, values_schema)?,
        };
        for store in fixture.stores() {
            store.create_schema().await?;
        }
        Ok(fixture)
    }

    fn stores(&self) -> [&Store; 4] {
        [&self.users, &self.posts, &self.profiles, &self.values]
    }

    /// Drop every table
    pub async fn teardown(self) -> Result<()> {
        for store in self.stores() {
            store.delete_schema().await?;
        }
        Ok(())
    }
}

/// `field` of every row, as text
pub fn column(rows: &[Record], field: &str) -> Vec<String> {
    rows.iter()
        .map(|r| r.get(field).map_or_else(|| "-".to_string(), Value::to_string))
        .collect()
}
