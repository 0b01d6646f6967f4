//! SurrealQL statement builder
//!
//! Statements reference values only through `$name` parameters. A field
//! called `id` is stored as `_id`, since `id` is the record id. Absent
//! fields are `NONE`, which SurrealDB orders before every other value, so
//! comparisons are guarded with `!= NONE` to keep missing values out.

use crate::typemap::SurrealTypes;
use quarry_core::memory::like_to_regex;
use quarry_core::{
    ident, As, Changeset, Condition, Criteria, DataType, Direction, FieldContext, Operator,
    QuarryError, Record, Result, Sort, TypeMap, Value,
};
use serde_json::Value as Json;
use std::collections::HashSet;

/// Hidden insertion-order field
pub const SEQ: &str = "__seq";

/// Per-table insertion counters
pub const COUNTERS: &str = "__quarry_seq";

/// A statement and its parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<(String, Json)>,
}

#[derive(Default)]
struct Params {
    params: Vec<(String, Json)>,
    keys: HashSet<String>,
}

impl Params {
    /// Add a parameter and return its reference
    ///
    /// Names are prefixed so fields like `value` or `before` never shadow
    /// the engine's protected parameters.
    fn bind(&mut self, key: &str, value: Json) -> String {
        let base = format!("v_{key}");
        let mut unique = base.clone();
        let mut n = 1;
        while !self.keys.insert(unique.clone()) {
            unique = format!("{base}_{n}");
            n += 1;
        }
        self.params.push((unique.clone(), value));
        format!("${unique}")
    }

    fn value(&mut self, key: &str, datatype: DataType, value: Json) -> String {
        let reference = self.bind(key, value);
        if datatype == DataType::DateTime {
            format!("<datetime> {reference}")
        } else {
            reference
        }
    }
}

/// Escaped column name for `field`
pub fn column(field: &str) -> Result<String> {
    let field = ident::validate(field)?;
    Ok(if field == "id" {
        "`_id`".to_string()
    } else {
        format!("`{field}`")
    })
}

/// Stored name of `field`, unescaped
pub fn stored(field: &str) -> &str {
    if field == "id" {
        "_id"
    } else {
        field
    }
}

fn table(name: &str) -> Result<String> {
    Ok(format!("`{}`", ident::validate(name)?))
}

fn datatype(target: &As, field: &str, context: FieldContext) -> Result<DataType> {
    target
        .datatype(field)
        .ok_or_else(|| QuarryError::FieldUnknown {
            field: field.to_string(),
            context,
        })
}

/// Builds statements for one store
pub struct Builder<'a> {
    types: &'a SurrealTypes,
    target: &'a As,
}

impl<'a> Builder<'a> {
    pub fn new(types: &'a SurrealTypes, target: &'a As) -> Self {
        Self { types, target }
    }

    fn conditions(&self, params: &mut Params, criteria: &Criteria) -> Result<Vec<String>> {
        let mut parts = Vec::new();
        for (field, condition) in criteria.iter() {
            let datatype = datatype(self.target, field, FieldContext::Where)?;
            let col = column(field)?;
            match condition {
                Condition::Null => parts.push(format!("{col} = NONE")),
                Condition::Eq(value) => {
                    let p = params.value(field, datatype, self.types.bind(datatype, value)?);
                    parts.push(format!("{col} = {p}"));
                }
                Condition::Ops(ops) => {
                    for (op, operand) in ops {
                        let key = quarry_core::bind_key(field, *op);
                        let test = match op {
                            Operator::Like | Operator::ILike => {
                                let pattern = operand.as_str().ok_or_else(|| {
                                    QuarryError::OperatorType {
                                        field: field.clone(),
                                        op: op.key().to_string(),
                                        expected: DataType::String.name().to_string(),
                                        got: operand.kind().to_string(),
                                    }
                                })?;
                                let regex = like_to_regex(pattern, *op == Operator::ILike);
                                let p = params.bind(&key, Json::String(regex));
                                format!("string::matches({col}, {p})")
                            }
                            _ => {
                                let symbol = op.symbol().unwrap_or("=");
                                let bound = self.types.bind(datatype, operand)?;
                                let p = params.value(&key, datatype, bound);
                                format!("{col} {symbol} {p}")
                            }
                        };
                        parts.push(format!("({col} != NONE AND {test})"));
                    }
                }
            }
        }
        Ok(parts)
    }

    fn where_clause(parts: &[String]) -> String {
        if parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", parts.join(" AND "))
        }
    }

    fn order(&self, sort: Option<&Sort>) -> Result<String> {
        let mut terms = Vec::new();
        for (field, direction) in sort.into_iter().flat_map(Sort::iter) {
            datatype(self.target, field, FieldContext::Sort)?;
            terms.push(format!("{} {}", column(field)?, direction.as_sql()));
        }
        terms.push(format!("`{SEQ}` {}", Direction::Asc.as_sql()));
        Ok(terms.join(", "))
    }

    /// Every declared column plus the sequence
    ///
    /// Sort keys must be in the projection, so reads always fetch whole
    /// records and project afterwards.
    fn projection(&self) -> Result<String> {
        let mut columns = self
            .target
            .types
            .keys()
            .map(|field| column(field))
            .collect::<Result<Vec<_>>>()?;
        columns.push(format!("`{SEQ}`"));
        Ok(columns.join(", "))
    }

    // ------------------------------------------------------------------------
    // Schema
    // ------------------------------------------------------------------------

    /// Schemafull table, typed fields and a unique primary key index
    pub fn define(&self) -> Result<String> {
        let name = table(&self.target.name)?;
        let mut sql = format!("DEFINE TABLE IF NOT EXISTS {name} SCHEMAFULL;");
        for (field, datatype) in &self.target.types {
            let kind = self.types.column(*datatype);
            let kind = if self.target.pk.as_deref() == Some(field.as_str()) {
                kind.to_string()
            } else {
                format!("option<{kind}>")
            };
            sql.push_str(&format!(
                " DEFINE FIELD IF NOT EXISTS {} ON {name} TYPE {kind};",
                column(field)?
            ));
        }
        sql.push_str(&format!(" DEFINE FIELD IF NOT EXISTS `{SEQ}` ON {name} TYPE int;"));
        if let Some(pk) = &self.target.pk {
            sql.push_str(&format!(
                " DEFINE INDEX IF NOT EXISTS `{}_pk` ON {name} FIELDS {} UNIQUE;",
                self.target.name,
                column(pk)?
            ));
        }
        Ok(sql)
    }

    /// Drop the table and its insertion counter
    pub fn remove(name: &str) -> Result<Statement> {
        let mut params = Params::default();
        let tb = params.bind("tb", Json::String(ident::validate(name)?.to_string()));
        Ok(Statement {
            sql: format!(
                "REMOVE TABLE IF EXISTS {}; DELETE type::thing('{COUNTERS}', {tb});",
                table(name)?
            ),
            params: params.params,
        })
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub fn count(&self, criteria: &Criteria) -> Result<Statement> {
        let mut params = Params::default();
        let parts = self.conditions(&mut params, criteria)?;
        Ok(Statement {
            sql: format!(
                "SELECT count() AS n FROM {}{} GROUP ALL",
                table(&self.target.name)?,
                Self::where_clause(&parts)
            ),
            params: params.params,
        })
    }

    /// Rows matching `criteria`, and whose `by` is one of `keys` when given
    pub fn select(
        &self,
        criteria: &Criteria,
        within: Option<(&str, &[Value])>,
        sort: Option<&Sort>,
        limit: Option<u64>,
    ) -> Result<Statement> {
        let mut params = Params::default();
        let mut parts = self.conditions(&mut params, criteria)?;
        if let Some((by, keys)) = within {
            let datatype = datatype(self.target, by, FieldContext::Where)?;
            let values = keys
                .iter()
                .filter_map(|k| k.clone().conform(by, datatype).ok())
                .map(|k| self.types.bind(datatype, &k))
                .collect::<Result<Vec<_>>>()?;
            let p = params.bind(&format!("{by}__in"), Json::Array(values));
            parts.push(format!("{} INSIDE {p}", column(by)?));
        }

        let mut sql = format!(
            "SELECT {} FROM {}{} ORDER BY {}",
            self.projection()?,
            table(&self.target.name)?,
            Self::where_clause(&parts),
            self.order(sort)?
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        Ok(Statement {
            sql,
            params: params.params,
        })
    }

    /// Largest primary key
    pub fn max_key(&self) -> Result<Statement> {
        let pk = self.target.pk.as_deref().ok_or_else(|| QuarryError::PkUndefined {
            store: self.target.name.clone(),
        })?;
        let col = column(pk)?;
        Ok(Statement {
            sql: format!(
                "SELECT {col} FROM {} ORDER BY {col} DESC LIMIT 1",
                table(&self.target.name)?
            ),
            params: Vec::new(),
        })
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Take the next sequence number, then create the record with it
    pub fn create(&self, record: &Record) -> Result<Statement> {
        let mut params = Params::default();
        let tb = params.bind("tb", Json::String(self.target.name.clone()));
        let mut sets = Vec::with_capacity(record.len() + 1);
        for (field, value) in record.fields().filter(|(_, v)| !v.is_null()) {
            let datatype = datatype(self.target, field, FieldContext::Insert)?;
            let p = params.value(field, datatype, self.types.bind(datatype, value)?);
            sets.push(format!("{} = {p}", column(field)?));
        }
        sets.push(format!("`{SEQ}` = $seq"));
        Ok(Statement {
            sql: format!(
                "LET $seq = (UPSERT type::thing('{COUNTERS}', {tb}) SET n += 1 RETURN VALUE n)[0]; \
                 CREATE {} SET {} RETURN NONE;",
                table(&self.target.name)?,
                sets.join(", ")
            ),
            params: params.params,
        })
    }

    /// `UPDATE`, returning the matched records
    pub fn update(&self, criteria: &Criteria, changeset: &Changeset) -> Result<Statement> {
        if changeset.is_empty() {
            return Err(QuarryError::SetEmpty);
        }
        let mut params = Params::default();
        let mut sets = Vec::with_capacity(changeset.len());
        for (field, value) in changeset.iter() {
            let datatype = datatype(self.target, field, FieldContext::Set)?;
            let col = column(field)?;
            if value.is_null() {
                sets.push(format!("{col} = NONE"));
            } else {
                let bound = self.types.bind(datatype, value)?;
                let p = params.value(&format!("set__{field}"), datatype, bound);
                sets.push(format!("{col} = {p}"));
            }
        }
        let parts = self.conditions(&mut params, criteria)?;
        Ok(Statement {
            sql: format!(
                "UPDATE {} SET {}{} RETURN BEFORE",
                table(&self.target.name)?,
                sets.join(", "),
                Self::where_clause(&parts)
            ),
            params: params.params,
        })
    }

    /// `DELETE`, returning the removed records
    pub fn delete(&self, criteria: &Criteria) -> Result<Statement> {
        let mut params = Params::default();
        let parts = self.conditions(&mut params, criteria)?;
        Ok(Statement {
            sql: format!(
                "DELETE {}{} RETURN BEFORE",
                table(&self.target.name)?,
                Self::where_clause(&parts)
            ),
            params: params.params,
        })
    }
}
