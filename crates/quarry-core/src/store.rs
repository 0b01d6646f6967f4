//! The typed Store facade
//!
//! A [`Store`] binds a [`Schema`] to a name and a [`Db`]. It is the single
//! validation gate: every field, operator, value and relation option is
//! checked here before an adapter sees it.
//!
//! Relation targets are resolved through a [`Catalog`], an explicit
//! name → schema registry owned by the application.

use crate::criteria::{Changeset, Condition, Criteria, Operator, Sort};
use crate::datatype::DataType;
use crate::db::{As, Db, ReadArgs, ReadMode};
use crate::error::{FieldContext, QuarryError, RelationSide, Result};
use crate::ident;
use crate::relation::{Relation, With};
use crate::schema::Schema;
use crate::value::{Record, Value};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

// ============================================================================
// Options
// ============================================================================

/// Options for loading one relation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationOptions {
    pub filter: Criteria,
    pub select: Option<Vec<String>>,
    pub sort: Option<Sort>,
    pub limit: Option<u64>,
}

impl RelationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, criteria: Criteria) -> Self {
        self.filter = criteria;
        self
    }

    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Options for [`Store::find`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub filter: Criteria,
    pub select: Option<Vec<String>>,
    pub sort: Option<Sort>,
    pub limit: Option<u64>,
    pub with: IndexMap<String, RelationOptions>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, criteria: Criteria) -> Self {
        self.filter = criteria;
        self
    }

    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Load a relation with all fields and no filter
    #[must_use]
    pub fn with(self, relation: impl Into<String>) -> Self {
        self.with_options(relation, RelationOptions::default())
    }

    #[must_use]
    pub fn with_options(mut self, relation: impl Into<String>, options: RelationOptions) -> Self {
        self.with.insert(relation.into(), options);
        self
    }
}

/// Options for [`Store::get`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetOptions {
    pub select: Option<Vec<String>>,
    pub with: IndexMap<String, RelationOptions>,
}

impl GetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with(self, relation: impl Into<String>) -> Self {
        self.with_options(relation, RelationOptions::default())
    }

    #[must_use]
    pub fn with_options(mut self, relation: impl Into<String>, options: RelationOptions) -> Self {
        self.with.insert(relation.into(), options);
        self
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Registry of the stores of one application
///
/// Holds the name → schema map used to resolve relation targets, and an
/// optional default database that stores without their own fall back to.
/// The database may be bound after stores are declared.
#[derive(Default)]
pub struct Catalog {
    db: RwLock<Option<Arc<dyn Db>>>,
    schemas: RwLock<IndexMap<String, Arc<Schema>>>,
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("db", &self.db.read().as_ref().map(|db| db.engine()))
            .field("stores", &self.schemas.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Catalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_db(db: Arc<dyn Db>) -> Arc<Self> {
        let catalog = Self::default();
        *catalog.db.write() = Some(db);
        Arc::new(catalog)
    }

    /// Bind (or rebind) the default database
    pub fn bind(&self, db: Arc<dyn Db>) {
        *self.db.write() = Some(db);
    }

    pub fn db(&self) -> Option<Arc<dyn Db>> {
        self.db.read().clone()
    }

    /// Register `schema` under `name` and return its store
    pub fn store(self: &Arc<Self>, name: &str, schema: Schema) -> Result<Store> {
        ident::validate(name)?;
        let schema = Arc::new(schema);
        self.schemas
            .write()
            .insert(name.to_string(), Arc::clone(&schema));
        Ok(Store {
            name: Some(name.to_string()),
            schema,
            db: None,
            catalog: Some(Arc::clone(self)),
            generate_pk: true,
        })
    }

    pub fn schema(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.read().get(name).cloned()
    }

    /// A store for an already registered schema
    pub fn get(self: &Arc<Self>, name: &str) -> Option<Store> {
        let schema = self.schema(name)?;
        Some(Store {
            name: Some(name.to_string()),
            schema,
            db: None,
            catalog: Some(Arc::clone(self)),
            generate_pk: true,
        })
    }
}

// ============================================================================
// Store
// ============================================================================

/// Typed access to one table or collection
#[derive(Clone)]
pub struct Store {
    name: Option<String>,
    schema: Arc<Schema>,
    db: Option<Arc<dyn Db>>,
    catalog: Option<Arc<Catalog>>,
    generate_pk: bool,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("db", &self.db.as_ref().map(|db| db.engine()))
            .field("generate_pk", &self.generate_pk)
            .finish()
    }
}

impl Store {
    /// An unbound store; name it and give it a database before use
    pub fn new(schema: Schema) -> Self {
        Self {
            name: None,
            schema: Arc::new(schema),
            db: None,
            catalog: None,
            generate_pk: true,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Use `db` instead of the catalog's default database
    #[must_use]
    pub fn bind(mut self, db: Arc<dyn Db>) -> Self {
        self.db = Some(db);
        self
    }

    /// Whether missing primary keys are generated on insert
    #[must_use]
    pub fn generate_pk(mut self, generate: bool) -> Self {
        self.generate_pk = generate;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn name(&self) -> Result<&str> {
        let name = self.name.as_deref().ok_or(QuarryError::StoreNameRequired)?;
        ident::validate(name)
    }

    fn db(&self) -> Result<Arc<dyn Db>> {
        self.db
            .clone()
            .or_else(|| self.catalog.as_ref().and_then(|c| c.db()))
            .ok_or(QuarryError::DbMissing)
    }

    fn context(&self) -> Result<As> {
        Ok(As::new(self.name()?, &self.schema, self.generate_pk))
    }

    fn pk(&self) -> Result<(&str, DataType)> {
        let undefined = || QuarryError::PkUndefined {
            store: self.name.clone().unwrap_or_default(),
        };
        let pk = self.schema.pk().ok_or_else(undefined)?;
        let field = self.schema.field(pk).ok_or_else(undefined)?;
        Ok((pk, field.datatype))
    }

    fn by_key(&self, key: Value) -> Result<(Criteria, String, Value)> {
        let (pk, datatype) = self.pk()?;
        let key = key.conform(pk, datatype)?;
        if key.is_null() {
            return Err(QuarryError::NullNotAllowed {
                field: pk.to_string(),
            });
        }
        Ok((Criteria::new().eq(pk, key.clone()), pk.to_string(), key))
    }

    // ------------------------------------------------------------------------
    // Schema lifecycle
    // ------------------------------------------------------------------------

    /// Create the backing table or collection if it does not exist
    pub async fn create_schema(&self) -> Result<()> {
        let target = self.context()?;
        self.db()?.create_schema(&target).await
    }

    /// Drop the backing table or collection if it exists
    pub async fn delete_schema(&self) -> Result<()> {
        let name = self.name()?;
        self.db()?.delete_schema(name).await
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub async fn count(&self, criteria: Criteria) -> Result<u64> {
        let target = self.context()?;
        let db = self.db()?;
        let criteria = check_where(&self.schema, criteria)?;
        db.read(&target, ReadMode::Count(criteria)).await?.into_count()
    }

    /// Whether a record with primary key `key` exists
    pub async fn has(&self, key: impl Into<Value>) -> Result<bool> {
        let (criteria, _, _) = self.by_key(key.into())?;
        Ok(self.count(criteria).await? == 1)
    }

    /// The record with primary key `key`, or `record_not_found`
    pub async fn get(&self, key: impl Into<Value>, options: GetOptions) -> Result<Record> {
        let (criteria, field, key) = self.by_key(key.into())?;
        let mut rows = self
            .find(FindOptions {
                filter: criteria,
                select: options.select,
                sort: None,
                limit: Some(1),
                with: options.with,
            })
            .await?;
        if rows.is_empty() {
            return Err(QuarryError::RecordNotFound {
                field,
                value: key.to_string(),
            });
        }
        Ok(rows.swap_remove(0))
    }

    /// Like [`get`](Self::get), with a missing record as `None`
    pub async fn try_get(
        &self,
        key: impl Into<Value>,
        options: GetOptions,
    ) -> Result<Option<Record>> {
        match self.get(key, options).await {
            Ok(record) => Ok(Some(record)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    #[instrument(skip(self, options), fields(store = ?self.name))]
    pub async fn find(&self, options: FindOptions) -> Result<Vec<Record>> {
        let target = self.context()?;
        let db = self.db()?;

        let criteria = check_where(&self.schema, options.filter)?;
        if let Some(select) = &options.select {
            check_select(&self.schema, select)?;
        }
        if let Some(sort) = &options.sort {
            check_sort(&self.schema, sort)?;
        }
        check_limit(options.limit)?;
        let with = self.resolve_with(&target, options.with)?;

        debug!(relations = with.len(), "find");
        let args = ReadArgs {
            criteria,
            fields: options.select,
            sort: options.sort,
            limit: options.limit,
            with,
        };
        db.read(&target, ReadMode::Rows(args)).await?.into_rows()
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Validate and insert `record`, returning it as stored
    #[instrument(skip(self, record), fields(store = ?self.name))]
    pub async fn insert(&self, record: Record) -> Result<Record> {
        let target = self.context()?;
        let db = self.db()?;
        let pk = self.schema.pk();

        let mut checked = Record::new();
        for (field, value) in record {
            let declared = self
                .schema
                .field(&field)
                .ok_or_else(|| QuarryError::unknown_field(&field, FieldContext::Insert))?;
            if value.is_null() {
                if declared.nullable || Some(field.as_str()) == pk {
                    continue;
                }
                return Err(QuarryError::NullNotAllowed { field });
            }
            let value = value.conform(&field, declared.datatype)?;
            checked.insert(field, value);
        }

        for (field, declared) in self.schema.fields() {
            if !declared.nullable && !declared.primary && !checked.contains(field) {
                return Err(QuarryError::FieldRequired {
                    field: field.clone(),
                });
            }
        }

        if let Some(pk) = pk {
            if !checked.contains(pk) && !self.generate_pk {
                return Err(QuarryError::PkRequired {
                    store: target.name.clone(),
                });
            }
        }

        db.create(&target, checked).await
    }

    /// Update the record with primary key `key`; exactly one row must match
    pub async fn update(&self, key: impl Into<Value>, changeset: Changeset) -> Result<()> {
        let (criteria, field, key) = self.by_key(key.into())?;
        let n = self.update_checked(criteria, changeset).await?;
        self.expect_one(n, field, key)
    }

    /// Update every record matching `criteria`, returning the match count
    pub async fn update_many(&self, criteria: Criteria, changeset: Changeset) -> Result<u64> {
        if criteria.is_empty() {
            return Err(QuarryError::WhereRequired);
        }
        self.update_checked(criteria, changeset).await
    }

    async fn update_checked(&self, criteria: Criteria, changeset: Changeset) -> Result<u64> {
        let target = self.context()?;
        let db = self.db()?;
        let criteria = check_where(&self.schema, criteria)?;
        let changeset = check_set(&self.schema, changeset)?;
        db.update(&target, &criteria, &changeset).await
    }

    /// Delete the record with primary key `key`; exactly one row must match
    pub async fn delete(&self, key: impl Into<Value>) -> Result<()> {
        let (criteria, field, key) = self.by_key(key.into())?;
        let n = self.delete_checked(criteria).await?;
        self.expect_one(n, field, key)
    }

    /// Delete every record matching `criteria`, returning the count
    pub async fn delete_many(&self, criteria: Criteria) -> Result<u64> {
        if criteria.is_empty() {
            return Err(QuarryError::WhereRequired);
        }
        self.delete_checked(criteria).await
    }

    async fn delete_checked(&self, criteria: Criteria) -> Result<u64> {
        let target = self.context()?;
        let db = self.db()?;
        let criteria = check_where(&self.schema, criteria)?;
        db.delete(&target, &criteria).await
    }

    /// Single-key writes must touch exactly one row
    fn expect_one(&self, n: u64, field: String, key: Value) -> Result<()> {
        if n == 1 {
            return Ok(());
        }
        debug!(store = ?self.name, affected = n, "single-key write did not touch one row");
        Err(QuarryError::RecordNotFound {
            field,
            value: key.to_string(),
        })
    }

    // ------------------------------------------------------------------------
    // Relations
    // ------------------------------------------------------------------------

    fn resolve_with(
        &self,
        parent: &As,
        with: IndexMap<String, RelationOptions>,
    ) -> Result<With> {
        let mut resolved = With::new();
        for (name, options) in with {
            let def = self
                .schema
                .relation(&name)
                .ok_or_else(|| QuarryError::RelationUnknown {
                    store: parent.name.clone(),
                    relation: name.clone(),
                })?;
            let target_schema = self
                .catalog
                .as_ref()
                .and_then(|c| c.schema(&def.target))
                .ok_or_else(|| QuarryError::UnregisteredSchema(def.target.clone()))?;

            if def.reverse {
                if target_schema.pk().is_none() {
                    return Err(QuarryError::RelationRequiresPk(RelationSide::Target));
                }
                if self.schema.field(&def.fk).is_none() {
                    return Err(missing_fk(&name, &def.fk, &parent.name));
                }
            } else {
                if parent.pk.is_none() {
                    return Err(QuarryError::RelationRequiresPk(RelationSide::Parent));
                }
                if target_schema.field(&def.fk).is_none() {
                    return Err(missing_fk(&name, &def.fk, &def.target));
                }
            }

            let criteria = check_where(&target_schema, options.filter)?;
            if let Some(select) = &options.select {
                check_select(&target_schema, select)?;
            }
            if let Some(sort) = &options.sort {
                check_sort(&target_schema, sort)?;
            }
            check_limit(options.limit)?;

            resolved.insert(
                name,
                Relation {
                    target: As::new(def.target.clone(), &target_schema, true),
                    kind: def.kind,
                    fk: def.fk.clone(),
                    reverse: def.reverse,
                    criteria,
                    fields: options.select,
                    sort: options.sort,
                    limit: options.limit,
                },
            );
        }
        Ok(resolved)
    }
}

fn missing_fk(relation: &str, fk: &str, store: &str) -> QuarryError {
    QuarryError::RelationInvalid {
        relation: relation.to_string(),
        reason: format!("foreign key {fk} is not a field of {store}"),
    }
}

// ============================================================================
// Validation
// ============================================================================

fn datatype_of(schema: &Schema, field: &str, context: FieldContext) -> Result<DataType> {
    schema
        .field(field)
        .map(|f| f.datatype)
        .ok_or_else(|| QuarryError::unknown_field(field, context))
}

fn check_operand(field: &str, datatype: DataType, op: Operator, operand: Value) -> Result<Value> {
    let expected = match op {
        Operator::Like | Operator::ILike => DataType::String,
        Operator::Before | Operator::After => DataType::DateTime,
        _ => datatype,
    };
    let got = operand.kind();
    if operand.is_null() {
        return Err(QuarryError::OperatorType {
            field: field.to_string(),
            op: op.key().to_string(),
            expected: expected.name().to_string(),
            got: got.to_string(),
        });
    }
    operand
        .conform(field, expected)
        .map_err(|_| QuarryError::OperatorType {
            field: field.to_string(),
            op: op.key().to_string(),
            expected: expected.name().to_string(),
            got: got.to_string(),
        })
}

/// Validate criteria against `schema`, returning conformed values
pub fn check_where(schema: &Schema, mut criteria: Criteria) -> Result<Criteria> {
    for (field, condition) in criteria.conditions_mut() {
        let datatype = datatype_of(schema, field, FieldContext::Where)?;
        match condition {
            Condition::Null => {}
            Condition::Eq(value) => {
                *value = std::mem::replace(value, Value::Null).conform(field, datatype)?;
            }
            Condition::Ops(ops) => {
                if ops.is_empty() {
                    return Err(QuarryError::OperatorEmpty {
                        field: field.clone(),
                    });
                }
                let mut checked = BTreeMap::new();
                for (op, operand) in std::mem::take(ops) {
                    if !datatype.accepts(op) {
                        return Err(QuarryError::OperatorUnknown {
                            field: field.clone(),
                            op: op.key().to_string(),
                        });
                    }
                    checked.insert(op, check_operand(field, datatype, op, operand)?);
                }
                *ops = checked;
            }
        }
    }
    Ok(criteria)
}

/// Validate a projection: non-empty, known and without duplicates
pub fn check_select(schema: &Schema, select: &[String]) -> Result<()> {
    if select.is_empty() {
        return Err(QuarryError::SelectEmpty);
    }
    let mut seen = HashSet::new();
    for field in select {
        datatype_of(schema, field, FieldContext::Select)?;
        if !seen.insert(field.as_str()) {
            return Err(QuarryError::FieldDuplicate {
                field: field.clone(),
                context: FieldContext::Select,
            });
        }
    }
    Ok(())
}

pub fn check_sort(schema: &Schema, sort: &Sort) -> Result<()> {
    if sort.is_empty() {
        return Err(QuarryError::SortEmpty);
    }
    for field in sort.keys() {
        datatype_of(schema, field, FieldContext::Sort)?;
    }
    Ok(())
}

fn check_limit(limit: Option<u64>) -> Result<()> {
    match limit {
        Some(0) => Err(QuarryError::LimitInvalid(0)),
        _ => Ok(()),
    }
}

/// Validate a changeset: non-empty, no primary key, known fields, nulls
/// only on nullable fields
pub fn check_set(schema: &Schema, mut changeset: Changeset) -> Result<Changeset> {
    if changeset.is_empty() {
        return Err(QuarryError::SetEmpty);
    }
    for (field, value) in changeset.values_mut() {
        let declared = schema
            .field(field)
            .ok_or_else(|| QuarryError::unknown_field(field, FieldContext::Set))?;
        if declared.primary {
            return Err(QuarryError::PkImmutable {
                field: field.clone(),
            });
        }
        if value.is_null() {
            if !declared.nullable {
                return Err(QuarryError::NullNotAllowed {
                    field: field.clone(),
                });
            }
            continue;
        }
        *value = std::mem::replace(value, Value::Null).conform(field, declared.datatype)?;
    }
    Ok(changeset)
}
