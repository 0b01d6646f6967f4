//! MongoDB implementation of [`Db`]
//!
//! One collection per store. Relations always load in phases: the base
//! documents, then one `$in` query per relation, ranked per parent in
//! memory.

use crate::config::MongoConfig;
use crate::error::MongoError;
use crate::query::{self, SEQ};
use crate::typemap::MongoTypes;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, Bson, Document};
use mongodb::{Client, Collection, Database, IndexModel};
use quarry_core::relation::{self, Phase};
use quarry_core::{
    sortable, As, Changeset, Criteria, DataType, Db, QuarryError, ReadArgs, ReadMode,
    ReadResult, Record, Result, Sort, TypeMap, Value,
};
use quarry_query::keys::{self, KeyPlan};
use tracing::{debug, info, warn};
use uuid::Uuid;

const ENGINE: &str = "mongodb";

/// MongoDB adapter
#[derive(Clone)]
pub struct MongoDb {
    client: Client,
    database: Database,
    types: MongoTypes,
}

impl MongoDb {
    pub fn new(client: Client, database: &str) -> Self {
        Self {
            database: client.database(database),
            client,
            types: MongoTypes,
        }
    }

    /// Connect and ping the server
    pub async fn connect(config: &MongoConfig) -> Result<Self> {
        info!(engine = ENGINE, database = %config.database, "connecting");
        let client = Client::with_uri_str(&config.uri)
            .await
            .map_err(MongoError::from)?;
        let db = Self::new(client, &config.database);
        db.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(MongoError::from)?;
        Ok(db)
    }

    fn collection(&self, name: &str) -> Result<Collection<Document>> {
        let name = quarry_core::ident::validate(name)?;
        Ok(self.database.collection(name))
    }

    fn decode(&self, target: &As, fields: &[String], mut document: Document) -> Result<Record> {
        let mut record = Record::new();
        for field in fields {
            let Some(datatype) = target.datatype(field) else {
                continue;
            };
            let wire = document
                .remove(query::path(target, field))
                .unwrap_or(Bson::Null);
            let value = self.types.unbind(datatype, wire)?;
            if !value.is_null() {
                record.insert(field.clone(), value);
            }
        }
        Ok(record)
    }

    async fn select(
        &self,
        target: &As,
        filter: Document,
        fields: Option<&[String]>,
        sort: Option<&Sort>,
        limit: Option<u64>,
    ) -> Result<Vec<Record>> {
        let sort = query::sort(target, sort)?;
        debug!(engine = ENGINE, collection = %target.name, filter = %filter, sort = %sort, "find");

        let collection = self.collection(&target.name)?;
        let mut find = collection.find(filter).sort(sort);
        if let Some(projection) = query::projection(target, fields) {
            find = find.projection(projection);
        }
        if let Some(limit) = limit {
            find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        let documents: Vec<Document> = find
            .await
            .map_err(MongoError::from)?
            .try_collect()
            .await
            .map_err(MongoError::from)?;

        let fields = target.resolve_fields(fields);
        documents
            .into_iter()
            .map(|document| self.decode(target, &fields, document))
            .collect()
    }

    async fn max_key(&self, target: &As, pk: &str, datatype: DataType) -> Result<Value> {
        let document = self
            .collection(&target.name)?
            .find_one(Document::new())
            .sort(doc! { "_id": -1 })
            .projection(doc! { "_id": 1 })
            .await
            .map_err(MongoError::from)?;
        let max = document
            .map(|d| self.decode(target, &[pk.to_string()], d))
            .transpose()?;
        sortable::next_key(&target.name, datatype, max.as_ref().and_then(|r| r.get(pk)))
    }

    async fn read_rows(&self, target: &As, args: ReadArgs) -> Result<Vec<Record>> {
        let filter = query::filter(&self.types, target, &args.criteria)?;
        let fields = relation::expand(target, args.fields.as_deref(), &args.with);
        let rows = self
            .select(target, filter, fields.as_deref(), args.sort.as_ref(), args.limit)
            .await?;

        let mut out: Vec<Record> = rows
            .iter()
            .cloned()
            .map(|row| relation::project(row, args.fields.as_deref()))
            .collect();

        for (name, relation) in &args.with {
            let phase = Phase::plan(target, name, relation)?;
            let keys = phase.keys(&rows);
            if keys.is_empty() {
                phase.attach_empty(&mut out);
                continue;
            }
            let related_target = &relation.target;
            let filter = query::and(
                query::filter(&self.types, related_target, &relation.criteria)?,
                query::within(&self.types, related_target, phase.by, &keys)?,
            );
            let related = self
                .select(
                    related_target,
                    filter,
                    phase.fields().as_deref(),
                    relation.sort.as_ref(),
                    None,
                )
                .await?;
            phase.attach(&rows, &mut out, related);
        }
        Ok(out)
    }
}

/// Dropping is idempotent; failures are logged, never raised
fn settle_drop(name: &str, dropped: std::result::Result<(), MongoError>) {
    match dropped {
        Ok(()) => debug!(engine = ENGINE, collection = name, "collection dropped"),
        Err(e) if e.is_namespace_not_found() => {}
        Err(e) => warn!(engine = ENGINE, collection = name, error = %e, "drop failed, ignoring"),
    }
}

#[async_trait]
impl Db for MongoDb {
    fn engine(&self) -> &'static str {
        ENGINE
    }

    async fn create_schema(&self, target: &As) -> Result<()> {
        let name = quarry_core::ident::validate(&target.name)?;
        if let Err(e) = self.database.create_collection(name).await {
            let e = MongoError::from(e);
            if !e.is_namespace_exists() {
                return Err(e.into());
            }
        }
        let mut keys = Document::new();
        keys.insert(SEQ, 1);
        self.collection(name)?
            .create_index(IndexModel::builder().keys(keys).build())
            .await
            .map_err(MongoError::from)?;
        debug!(engine = ENGINE, collection = name, "collection ready");
        Ok(())
    }

    async fn delete_schema(&self, name: &str) -> Result<()> {
        let dropped = self.collection(name)?.drop().await.map_err(MongoError::from);
        settle_drop(name, dropped);
        Ok(())
    }

    async fn create(&self, target: &As, mut record: Record) -> Result<Record> {
        record.retain(|_, v| !v.is_null());
        if let (Some(pk), Some(datatype)) = (target.pk.as_deref(), target.pk_type()) {
            match keys::plan(target, &record)? {
                KeyPlan::Uuid => {
                    record.insert(pk, Uuid::new_v4().to_string());
                }
                KeyPlan::Auto | KeyPlan::Max => {
                    let next = self.max_key(target, pk, datatype).await?;
                    record.insert(pk, next);
                }
                KeyPlan::None | KeyPlan::Given => {}
            }
        }

        let mut document = Document::new();
        for (field, value) in record.fields() {
            let datatype = target.datatype(field).ok_or_else(|| QuarryError::FieldUnknown {
                field: field.clone(),
                context: quarry_core::FieldContext::Insert,
            })?;
            document.insert(query::path(target, field), self.types.bind(datatype, value)?);
        }
        document.insert(SEQ, ObjectId::new());

        debug!(engine = ENGINE, collection = %target.name, "insert");
        if let Err(e) = self.collection(&target.name)?.insert_one(document).await {
            let e = MongoError::from(e);
            return Err(if e.is_duplicate_key() {
                QuarryError::PkDuplicate {
                    store: target.name.clone(),
                    value: target
                        .pk
                        .as_deref()
                        .and_then(|pk| record.get(pk))
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                }
            } else {
                e.into()
            });
        }
        Ok(record)
    }

    async fn read(&self, target: &As, mode: ReadMode) -> Result<ReadResult> {
        match mode {
            ReadMode::Count(criteria) => {
                let filter = query::filter(&self.types, target, &criteria)?;
                let n = self
                    .collection(&target.name)?
                    .count_documents(filter)
                    .await
                    .map_err(MongoError::from)?;
                Ok(ReadResult::Count(n))
            }
            ReadMode::Rows(args) => Ok(ReadResult::Rows(self.read_rows(target, args).await?)),
        }
    }

    async fn update(&self, target: &As, criteria: &Criteria, changeset: &Changeset) -> Result<u64> {
        let filter = query::filter(&self.types, target, criteria)?;
        let update = query::update(&self.types, target, changeset)?;
        let done = self
            .collection(&target.name)?
            .update_many(filter, update)
            .await
            .map_err(MongoError::from)?;
        Ok(done.matched_count)
    }

    async fn delete(&self, target: &As, criteria: &Criteria) -> Result<u64> {
        let filter = query::filter(&self.types, target, criteria)?;
        let done = self
            .collection(&target.name)?
            .delete_many(filter)
            .await
            .map_err(MongoError::from)?;
        Ok(done.deleted_count)
    }

    async fn close(&self) -> Result<()> {
        info!(engine = ENGINE, "closing client");
        self.client.clone().shutdown().await;
        Ok(())
    }
}
