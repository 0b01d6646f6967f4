//! Statement compiler
//!
//! Turns validated criteria, projections and relations into SQL text plus an
//! ordered parameter list. Identifiers are quoted through the dialect, which
//! rejects anything that is not a plain identifier; values never appear in
//! the SQL text.
//!
//! Every row-returning statement ends its `ORDER BY` with the table's
//! insertion sequence, so rows tied on the requested sort come back in
//! insertion order.

use crate::render::{Column, Dialect, Param, Rendered, Sequence, SEQ};
use quarry_core::relation::{self, JoinAliases, Phase, Relation};
use quarry_core::{
    bind_key, As, Changeset, Condition, Criteria, DataType, FieldContext, Operator,
    QuarryError, ReadArgs, Record, Result, Sort, TypeMap, Value,
};
use std::collections::HashSet;

const RANKED: &str = "ranked";
const RANK: &str = "__rank";

// ============================================================================
// Parameters
// ============================================================================

struct Params<'d, D: Dialect + ?Sized> {
    dialect: &'d D,
    params: Vec<Param>,
    keys: HashSet<String>,
}

impl<'d, D: Dialect + ?Sized> Params<'d, D> {
    fn new(dialect: &'d D) -> Self {
        Self {
            dialect,
            params: Vec::new(),
            keys: HashSet::new(),
        }
    }

    /// Add a parameter and return its placeholder
    fn bind(&mut self, key: &str, datatype: DataType, value: Value) -> String {
        let mut unique = key.to_string();
        let mut n = 1;
        while !self.keys.insert(unique.clone()) {
            unique = format!("{key}_{n}");
            n += 1;
        }
        let placeholder = self
            .dialect
            .placeholder(&unique, self.params.len() + 1, datatype);
        self.params.push(Param {
            key: unique,
            datatype,
            value,
        });
        placeholder
    }
}

fn datatype(target: &As, field: &str, context: FieldContext) -> Result<DataType> {
    target
        .datatype(field)
        .ok_or_else(|| QuarryError::FieldUnknown {
            field: field.to_string(),
            context,
        })
}

fn parent_pk(target: &As) -> Result<&str> {
    target.pk.as_deref().ok_or_else(|| QuarryError::PkUndefined {
        store: target.name.clone(),
    })
}

// ============================================================================
// Compiler
// ============================================================================

/// Compiles statements for one dialect
pub struct Compiler<'d, D: Dialect + ?Sized> {
    dialect: &'d D,
}

impl<'d, D: Dialect + ?Sized> Compiler<'d, D> {
    pub fn new(dialect: &'d D) -> Self {
        Self { dialect }
    }

    fn column(&self, alias: Option<&str>, field: &str) -> Result<String> {
        let field = self.dialect.quote(field)?;
        Ok(match alias {
            Some(alias) => format!("{}.{field}", self.dialect.quote(alias)?),
            None => field,
        })
    }

    /// Insertion-order expression for `target`, optionally under `alias`
    fn sequence(&self, target: &As, alias: Option<&str>) -> Result<String> {
        match self.dialect.sequence(target) {
            Sequence::RowId => Ok(match alias {
                Some(alias) => format!("{}.rowid", self.dialect.quote(alias)?),
                None => "rowid".to_string(),
            }),
            Sequence::Hidden(_) => self.column(alias, SEQ),
            Sequence::Primary => self.column(alias, parent_pk(target)?),
        }
    }

    fn conditions(
        &self,
        params: &mut Params<'_, D>,
        target: &As,
        criteria: &Criteria,
        alias: Option<&str>,
    ) -> Result<Vec<String>> {
        let mut parts = Vec::new();
        for (field, condition) in criteria.iter() {
            let datatype = datatype(target, field, FieldContext::Where)?;
            let column = self.column(alias, field)?;
            match condition {
                Condition::Null => parts.push(format!("{column} IS NULL")),
                Condition::Eq(value) => {
                    let p = params.bind(field, datatype, value.clone());
                    parts.push(format!("{column} = {p}"));
                }
                Condition::Ops(ops) => {
                    if ops.is_empty() {
                        return Err(QuarryError::OperatorEmpty {
                            field: field.clone(),
                        });
                    }
                    for (op, operand) in ops {
                        let p = params.bind(&bind_key(field, *op), datatype, operand.clone());
                        parts.push(match (op, op.symbol()) {
                            (_, Some(symbol)) => format!("{column} {symbol} {p}"),
                            (Operator::ILike, None) => self.dialect.ilike(&column, &p),
                            (_, None) => self.dialect.like(&column, &p),
                        });
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

    fn order_terms(
        &self,
        target: &As,
        sort: Option<&Sort>,
        alias: Option<&str>,
    ) -> Result<Vec<String>> {
        let mut terms = Vec::new();
        if let Some(sort) = sort {
            for (field, direction) in sort.iter() {
                let datatype = datatype(target, field, FieldContext::Sort)?;
                let column = self.column(alias, field)?;
                terms.push(self.dialect.order(&column, datatype, direction));
            }
        }
        Ok(terms)
    }

    /// Projection items reading `fields` under `alias`, each renamed by
    /// `rename` when given
    fn projection(
        &self,
        target: &As,
        fields: &[String],
        alias: Option<&str>,
        rename: Option<&dyn Fn(&str) -> String>,
    ) -> Result<(Vec<String>, Vec<Column>)> {
        let mut items = Vec::with_capacity(fields.len());
        let mut columns = Vec::with_capacity(fields.len());
        for field in fields {
            let datatype = datatype(target, field, FieldContext::Select)?;
            let read = self
                .dialect
                .read_column(&self.column(alias, field)?, datatype);
            let name = match rename {
                Some(rename) => {
                    let name = rename(field);
                    items.push(format!("{read} AS {}", self.dialect.quote(&name)?));
                    name
                }
                None => {
                    items.push(read);
                    field.clone()
                }
            };
            columns.push(Column { name, datatype });
        }
        Ok((items, columns))
    }

    // ------------------------------------------------------------------------
    // Schema
    // ------------------------------------------------------------------------

    /// `CREATE TABLE IF NOT EXISTS` with columns typed through `typemap`
    pub fn create_table<T: TypeMap>(&self, target: &As, typemap: &T) -> Result<String> {
        let mut columns = Vec::with_capacity(target.types.len() + 1);
        for (field, datatype) in &target.types {
            let column_type = typemap.column(*datatype);
            let definition = if target.pk.as_deref() == Some(field.as_str()) {
                self.dialect.primary_column(column_type, *datatype)
            } else {
                column_type.to_string()
            };
            columns.push(format!("{} {definition}", self.dialect.quote(field)?));
        }
        if let Sequence::Hidden(definition) = self.dialect.sequence(target) {
            columns.push(format!("{} {definition}", self.dialect.quote(SEQ)?));
        }
        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.dialect.quote(&target.name)?,
            columns.join(", ")
        ))
    }

    pub fn drop_table(&self, name: &str) -> Result<String> {
        Ok(format!("DROP TABLE IF EXISTS {}", self.dialect.quote(name)?))
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub fn count(&self, target: &As, criteria: &Criteria) -> Result<Rendered> {
        let mut params = Params::new(self.dialect);
        let parts = self.conditions(&mut params, target, criteria, None)?;
        Ok(Rendered {
            sql: format!(
                "SELECT COUNT(*) FROM {}{}",
                self.dialect.quote(&target.name)?,
                Self::where_clause(&parts)
            ),
            params: params.params,
            columns: Vec::new(),
        })
    }

    /// Plain read of `fields` (every field when `None`)
    pub fn select(
        &self,
        target: &As,
        criteria: &Criteria,
        fields: Option<&[String]>,
        sort: Option<&Sort>,
        limit: Option<u64>,
    ) -> Result<Rendered> {
        let fields = target.resolve_fields(fields);
        let (items, columns) = self.projection(target, &fields, None, None)?;

        let mut params = Params::new(self.dialect);
        let parts = self.conditions(&mut params, target, criteria, None)?;
        let mut order = self.order_terms(target, sort, None)?;
        order.push(format!("{} ASC", self.sequence(target, None)?));

        let mut sql = format!(
            "SELECT {} FROM {}{} ORDER BY {}",
            items.join(", "),
            self.dialect.quote(&target.name)?,
            Self::where_clause(&parts),
            order.join(", ")
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        Ok(Rendered {
            sql,
            params: params.params,
            columns,
        })
    }

    /// Largest primary key, for `MAX + 1` generation
    pub fn max_key(&self, target: &As) -> Result<Rendered> {
        let pk = parent_pk(target)?;
        let datatype = datatype(target, pk, FieldContext::Select)?;
        let max = format!("MAX({})", self.dialect.quote(pk)?);
        Ok(Rendered {
            sql: format!(
                "SELECT {} FROM {}",
                self.dialect.read_column(&max, datatype),
                self.dialect.quote(&target.name)?
            ),
            params: Vec::new(),
            columns: vec![Column {
                name: pk.to_string(),
                datatype,
            }],
        })
    }

    /// One `LEFT JOIN` loading `relation` onto the rows `args` selects
    ///
    /// Output columns are named `{alias}_{field}`; regroup them with
    /// [`relation::nest`].
    pub fn joined(
        &self,
        parent: &As,
        args: &ReadArgs,
        relation: &Relation,
    ) -> Result<(Rendered, JoinAliases)> {
        let target = &relation.target;
        let pk = parent_pk(parent)?;
        let target_pk = parent_pk(target)?;
        let aliases = JoinAliases::new(&parent.name, &target.name);
        let (pa, ta) = (aliases.parent.as_str(), aliases.target.as_str());

        let parent_fields = relation::expand(parent, args.fields.as_deref(), &args.with)
            .unwrap_or_else(|| parent.field_names());
        let mut target_fields = target.resolve_fields(relation.fields.as_deref());
        if !target_fields.iter().any(|f| f == target_pk) {
            target_fields.push(target_pk.to_string());
        }

        // Base rows, filtered and limited before the join multiplies them
        let mut params = Params::new(self.dialect);
        let mut inner_items = parent_fields
            .iter()
            .map(|f| self.dialect.quote(f))
            .collect::<Result<Vec<_>>>()?;
        // The outer ORDER BY reads sort fields through the subquery alias
        if let Some(sort) = &args.sort {
            for (field, _) in sort.iter() {
                if !parent_fields.iter().any(|f| f == field) {
                    inner_items.push(self.dialect.quote(field)?);
                }
            }
        }
        inner_items.push(format!(
            "{} AS {}",
            self.sequence(parent, None)?,
            self.dialect.quote(SEQ)?
        ));
        let parts = self.conditions(&mut params, parent, &args.criteria, None)?;
        let mut inner = format!(
            "SELECT {} FROM {}{}",
            inner_items.join(", "),
            self.dialect.quote(&parent.name)?,
            Self::where_clause(&parts)
        );
        if let Some(limit) = args.limit {
            let mut order = self.order_terms(parent, args.sort.as_ref(), None)?;
            order.push(format!("{} ASC", self.sequence(parent, None)?));
            inner.push_str(&format!(" ORDER BY {} LIMIT {limit}", order.join(", ")));
        }

        let rename_parent = |f: &str| JoinAliases::column(pa, f);
        let rename_target = |f: &str| JoinAliases::column(ta, f);
        let (mut items, mut columns) = self.projection(
            parent,
            &parent_fields,
            Some(pa),
            Some(&rename_parent as &dyn Fn(&str) -> String),
        )?;
        let (target_items, target_columns) = self.projection(
            target,
            &target_fields,
            Some(ta),
            Some(&rename_target as &dyn Fn(&str) -> String),
        )?;
        items.extend(target_items);
        columns.extend(target_columns);

        let mut order = self.order_terms(parent, args.sort.as_ref(), Some(pa))?;
        order.push(format!("{} ASC", self.column(Some(pa), SEQ)?));
        order.push(format!("{} ASC", self.sequence(target, Some(ta))?));

        let sql = format!(
            "SELECT {} FROM ({inner}) AS {} LEFT JOIN {} AS {} ON {} = {} ORDER BY {}",
            items.join(", "),
            self.dialect.quote(pa)?,
            self.dialect.quote(&target.name)?,
            self.dialect.quote(ta)?,
            self.column(Some(ta), &relation.fk)?,
            self.column(Some(pa), pk)?,
            order.join(", ")
        );
        Ok((
            Rendered {
                sql,
                params: params.params,
                columns,
            },
            aliases,
        ))
    }

    /// Related rows of one phased relation for the parent `keys`
    ///
    /// With a per-parent cap the rows are ranked inside each parent group
    /// with `ROW_NUMBER()` and cut at the cap.
    pub fn related(&self, phase: &Phase<'_>, keys: &[Value]) -> Result<Rendered> {
        let relation = phase.relation;
        let target = &relation.target;
        let fields = phase.fields().unwrap_or_else(|| target.field_names());
        let by_type = datatype(target, phase.by, FieldContext::Where)?;

        let mut params = Params::new(self.dialect);
        let mut parts = self.conditions(&mut params, target, &relation.criteria, None)?;
        let in_key = format!("{}__in", phase.by);
        let placeholders: Vec<String> = keys
            .iter()
            .filter_map(|key| key.clone().conform(phase.by, by_type).ok())
            .map(|key| params.bind(&in_key, by_type, key))
            .collect();
        if placeholders.is_empty() {
            parts.push("1 = 0".to_string());
        } else {
            parts.push(format!(
                "{} IN ({})",
                self.dialect.quote(phase.by)?,
                placeholders.join(", ")
            ));
        }

        let mut order = self.order_terms(target, relation.sort.as_ref(), None)?;
        order.push(format!("{} ASC", self.sequence(target, None)?));
        let table = self.dialect.quote(&target.name)?;

        let Some(cap) = relation.per_parent() else {
            let (items, columns) = self.projection(target, &fields, None, None)?;
            return Ok(Rendered {
                sql: format!(
                    "SELECT {} FROM {table}{} ORDER BY {}",
                    items.join(", "),
                    Self::where_clause(&parts),
                    order.join(", ")
                ),
                params: params.params,
                columns,
            });
        };

        let raw = fields
            .iter()
            .map(|f| self.dialect.quote(f))
            .collect::<Result<Vec<_>>>()?;
        let (items, columns) = self.projection(target, &fields, Some(RANKED), None)?;
        let rank = self.column(Some(RANKED), RANK)?;
        let sql = format!(
            "WITH {ranked} AS (SELECT {}, ROW_NUMBER() OVER (PARTITION BY {} ORDER BY {}) AS {} \
             FROM {table}{}) SELECT {} FROM {ranked} WHERE {rank} <= {cap} ORDER BY {rank} ASC",
            raw.join(", "),
            self.dialect.quote(phase.by)?,
            order.join(", "),
            self.dialect.quote(RANK)?,
            Self::where_clause(&parts),
            items.join(", "),
            ranked = self.dialect.quote(RANKED)?,
        );
        Ok(Rendered {
            sql,
            params: params.params,
            columns,
        })
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// `INSERT` of every field in `record`; nulls are left out
    ///
    /// On dialects with `RETURNING`, the primary key is returned.
    pub fn insert(&self, target: &As, record: &Record) -> Result<Rendered> {
        let mut params = Params::new(self.dialect);
        let mut names = Vec::new();
        let mut values = Vec::new();
        for (field, value) in record.fields().filter(|(_, v)| !v.is_null()) {
            let datatype = datatype(target, field, FieldContext::Insert)?;
            names.push(self.dialect.quote(field)?);
            values.push(params.bind(field, datatype, value.clone()));
        }

        let table = self.dialect.quote(&target.name)?;
        let mut sql = if names.is_empty() {
            format!("INSERT INTO {table} {}", self.dialect.default_values())
        } else {
            format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                names.join(", "),
                values.join(", ")
            )
        };

        let mut columns = Vec::new();
        if let (true, Some(pk)) = (self.dialect.returning(), target.pk.as_deref()) {
            let datatype = datatype(target, pk, FieldContext::Select)?;
            let read = self.dialect.read_column(&self.dialect.quote(pk)?, datatype);
            sql.push_str(&format!(" RETURNING {read}"));
            columns.push(Column {
                name: pk.to_string(),
                datatype,
            });
        }
        Ok(Rendered {
            sql,
            params: params.params,
            columns,
        })
    }

    /// `UPDATE`; `Null` values unset their column
    pub fn update(
        &self,
        target: &As,
        criteria: &Criteria,
        changeset: &Changeset,
    ) -> Result<Rendered> {
        if changeset.is_empty() {
            return Err(QuarryError::SetEmpty);
        }
        let mut params = Params::new(self.dialect);
        let mut sets = Vec::with_capacity(changeset.len());
        for (field, value) in changeset.iter() {
            let datatype = datatype(target, field, FieldContext::Set)?;
            let column = self.dialect.quote(field)?;
            if value.is_null() {
                sets.push(format!("{column} = NULL"));
            } else {
                // Distinct from where keys on the same field
                let p = params.bind(&format!("set__{field}"), datatype, value.clone());
                sets.push(format!("{column} = {p}"));
            }
        }
        let parts = self.conditions(&mut params, target, criteria, None)?;
        Ok(Rendered {
            sql: format!(
                "UPDATE {} SET {}{}",
                self.dialect.quote(&target.name)?,
                sets.join(", "),
                Self::where_clause(&parts)
            ),
            params: params.params,
            columns: Vec::new(),
        })
    }

    pub fn delete(&self, target: &As, criteria: &Criteria) -> Result<Rendered> {
        let mut params = Params::new(self.dialect);
        let parts = self.conditions(&mut params, target, criteria, None)?;
        Ok(Rendered {
            sql: format!(
                "DELETE FROM {}{}",
                self.dialect.quote(&target.name)?,
                Self::where_clause(&parts)
            ),
            params: params.params,
            columns: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{MySql, Postgres, Sqlite};
    use quarry_core::{record, Kind, RelationDef, Schema, With};
    use test_case::test_case;

    fn users() -> As {
        let schema = Schema::builder()
            .primary("id", DataType::String)
            .field("name", DataType::String)
            .optional("age", DataType::U8)
            .optional("balance", DataType::U128)
            .relation("posts", RelationDef::many("posts", "author_id"))
            .build("users")
            .unwrap();
        As::new("users", &schema, true)
    }

    fn posts() -> As {
        let schema = Schema::builder()
            .primary("id", DataType::U32)
            .field("title", DataType::String)
            .field("author_id", DataType::String)
            .build("posts")
            .unwrap();
        As::new("posts", &schema, true)
    }

    fn posts_relation(limit: Option<u64>) -> Relation {
        Relation {
            target: posts(),
            kind: Kind::Many,
            fk: "author_id".into(),
            reverse: false,
            criteria: Criteria::new(),
            fields: None,
            sort: Some(Sort::new().asc("title")),
            limit,
        }
    }

    fn sqlite() -> Compiler<'static, Sqlite> {
        Compiler::new(&Sqlite)
    }

    #[test]
    fn select_with_operators() {
        let criteria = Criteria::new().op("age", Operator::Gt, 30u8);
        let sort = Sort::new().asc("name");
        let fields = vec!["name".to_string(), "age".to_string()];
        let rendered = sqlite()
            .select(&users(), &criteria, Some(&fields), Some(&sort), Some(5))
            .unwrap();
        assert_eq!(
            rendered.sql,
            "SELECT `name`, `age` FROM `users` WHERE `age` > $age__gt \
             ORDER BY `name` ASC, rowid ASC LIMIT 5"
        );
        assert_eq!(rendered.params.len(), 1);
        assert_eq!(rendered.params[0].key, "age__gt");
        assert_eq!(rendered.params[0].value, Value::UInt(30));
        assert_eq!(rendered.columns.len(), 2);
    }

    #[test_case(Criteria::new().null("age"), "`age` IS NULL" ; "null")]
    #[test_case(Criteria::new().eq("name", "x"), "`name` = $name" ; "equality")]
    #[test_case(Criteria::new().op("name", Operator::Like, "x%"), "`name` LIKE $name__like" ; "like")]
    #[test_case(
        Criteria::new().op("name", Operator::ILike, "x%"),
        "LOWER(`name`) LIKE LOWER($name__ilike)" ;
        "ilike"
    )]
    #[test_case(Criteria::new().op("age", Operator::Ne, 3u8), "`age` != $age__ne" ; "not equal")]
    fn sqlite_conditions(criteria: Criteria, expected: &str) {
        let rendered = sqlite().count(&users(), &criteria).unwrap();
        assert_eq!(rendered.sql, format!("SELECT COUNT(*) FROM `users` WHERE {expected}"));
    }

    #[test]
    fn range_binds_both_ends() {
        let criteria = Criteria::new()
            .op("age", Operator::Gte, 18u8)
            .op("age", Operator::Lt, 65u8);
        let rendered = sqlite().count(&users(), &criteria).unwrap();
        assert_eq!(
            rendered.sql,
            "SELECT COUNT(*) FROM `users` WHERE `age` >= $age__gte AND `age` < $age__lt"
        );
    }

    #[test]
    fn postgres_numbers_placeholders_and_casts() {
        let criteria = Criteria::new()
            .eq("name", "x")
            .op("balance", Operator::Gt, 10u128);
        let rendered = Compiler::new(&Postgres)
            .select(&users(), &criteria, None, None, None)
            .unwrap();
        assert_eq!(
            rendered.sql,
            "SELECT \"id\", \"name\", \"age\", \"balance\"::text FROM \"users\" \
             WHERE \"name\" = $1 AND \"balance\" > $2::numeric ORDER BY \"__seq\" ASC"
        );
    }

    #[test]
    fn mysql_binds_in_text_order() {
        let rendered = Compiler::new(&MySql)
            .update(
                &users(),
                &Criteria::new().eq("age", 30u8),
                &Changeset::new().set("age", 31u8).unset("balance"),
            )
            .unwrap();
        assert_eq!(
            rendered.sql,
            "UPDATE `users` SET `age` = ?, `balance` = NULL WHERE `age` = ?"
        );
        let values: Vec<_> = rendered.params.iter().map(|p| p.value.clone()).collect();
        assert_eq!(values, [Value::UInt(31), Value::UInt(30)]);
    }

    #[test]
    fn repeated_keys_stay_unique() {
        let relation = posts_relation(None);
        let parent = users();
        let phase = Phase::plan(&parent, "posts", &relation).unwrap();
        let keys = [Value::from("a"), Value::from("b")];
        let rendered = sqlite().related(&phase, &keys).unwrap();
        let names: Vec<_> = rendered.params.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(names, ["author_id__in", "author_id__in_1"]);
        assert_eq!(
            rendered.sql,
            "SELECT `id`, `title`, `author_id` FROM `posts` \
             WHERE `author_id` IN ($author_id__in, $author_id__in_1) \
             ORDER BY `title` ASC, rowid ASC"
        );
    }

    #[test]
    fn per_parent_limit_ranks_in_a_cte() {
        let relation = posts_relation(Some(1));
        let parent = users();
        let phase = Phase::plan(&parent, "posts", &relation).unwrap();
        let rendered = sqlite().related(&phase, &[Value::from("a")]).unwrap();
        assert_eq!(
            rendered.sql,
            "WITH `ranked` AS (SELECT `id`, `title`, `author_id`, ROW_NUMBER() OVER \
             (PARTITION BY `author_id` ORDER BY `title` ASC, rowid ASC) AS `__rank` \
             FROM `posts` WHERE `author_id` IN ($author_id__in)) \
             SELECT `ranked`.`id`, `ranked`.`title`, `ranked`.`author_id` FROM `ranked` \
             WHERE `ranked`.`__rank` <= 1 ORDER BY `ranked`.`__rank` ASC"
        );
    }

    #[test]
    fn joined_read() {
        let mut relation = posts_relation(None);
        relation.sort = None;
        let with = With::from([("posts".to_string(), relation.clone())]);
        let args = ReadArgs {
            criteria: Criteria::new().eq("name", "Donald"),
            fields: Some(vec!["name".to_string()]),
            sort: None,
            limit: Some(2),
            with,
        };
        let (rendered, aliases) = sqlite().joined(&users(), &args, &relation).unwrap();
        assert_eq!(aliases.parent, "u0");
        assert_eq!(aliases.target, "p0");
        assert_eq!(
            rendered.sql,
            "SELECT `u0`.`name` AS `u0_name`, `u0`.`id` AS `u0_id`, \
             `p0`.`id` AS `p0_id`, `p0`.`title` AS `p0_title`, `p0`.`author_id` AS `p0_author_id` \
             FROM (SELECT `name`, `id`, rowid AS `__seq` FROM `users` WHERE `name` = $name \
             ORDER BY rowid ASC LIMIT 2) AS `u0` \
             LEFT JOIN `posts` AS `p0` ON `p0`.`author_id` = `u0`.`id` \
             ORDER BY `u0`.`__seq` ASC, `p0`.rowid ASC"
        );
    }

    #[test]
    fn joined_read_carries_unselected_sort_fields() {
        let mut relation = posts_relation(None);
        relation.sort = None;
        let with = With::from([("posts".to_string(), relation.clone())]);
        let args = ReadArgs {
            criteria: Criteria::new(),
            fields: Some(vec!["id".to_string()]),
            sort: Some(Sort::new().asc("name")),
            limit: None,
            with,
        };
        let (rendered, _) = sqlite().joined(&users(), &args, &relation).unwrap();
        assert_eq!(
            rendered.sql,
            "SELECT `u0`.`id` AS `u0_id`, \
             `p0`.`id` AS `p0_id`, `p0`.`title` AS `p0_title`, `p0`.`author_id` AS `p0_author_id` \
             FROM (SELECT `id`, `name`, rowid AS `__seq` FROM `users`) AS `u0` \
             LEFT JOIN `posts` AS `p0` ON `p0`.`author_id` = `u0`.`id` \
             ORDER BY `u0`.`name` ASC, `u0`.`__seq` ASC, `p0`.rowid ASC"
        );
        assert_eq!(rendered.columns.len(), 4);
    }

    #[test]
    fn insert_and_returning() {
        let record = record! { "name" => "Donald", "age" => Value::Null };
        let rendered = sqlite().insert(&users(), &record).unwrap();
        assert_eq!(rendered.sql, "INSERT INTO `users` (`name`) VALUES ($name)");

        let rendered = Compiler::new(&Postgres).insert(&posts(), &Record::new()).unwrap();
        assert_eq!(rendered.sql, "INSERT INTO \"posts\" DEFAULT VALUES RETURNING \"id\"");

        let rendered = Compiler::new(&MySql).insert(&posts(), &Record::new()).unwrap();
        assert_eq!(rendered.sql, "INSERT INTO `posts` () VALUES ()");
    }

    #[test]
    fn create_table_adds_sequence_where_needed() {
        struct Columns;
        impl TypeMap for Columns {
            type Wire = ();
            fn engine(&self) -> &'static str {
                "test"
            }
            fn column(&self, datatype: DataType) -> &'static str {
                match datatype {
                    DataType::String => "TEXT",
                    _ => "INTEGER",
                }
            }
            fn bind(&self, _: DataType, _: &Value) -> Result<()> {
                Ok(())
            }
            fn unbind(&self, _: DataType, _: ()) -> Result<Value> {
                Ok(Value::Null)
            }
        }

        let sql = sqlite().create_table(&posts(), &Columns).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS `posts` (`id` INTEGER PRIMARY KEY AUTOINCREMENT, \
             `title` TEXT, `author_id` TEXT)"
        );

        let sql = Compiler::new(&Postgres).create_table(&posts(), &Columns).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"posts\" (\"id\" BIGSERIAL PRIMARY KEY, \
             \"title\" TEXT, \"author_id\" TEXT, \"__seq\" BIGSERIAL)"
        );

        let sql = Compiler::new(&MySql).create_table(&posts(), &Columns).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS `posts` (`id` INTEGER NOT NULL AUTO_INCREMENT PRIMARY KEY, \
             `title` TEXT, `author_id` TEXT)"
        );
    }

    #[test]
    fn max_key_reads_wire_form() {
        let schema = Schema::builder()
            .primary("id", DataType::U64)
            .build("events")
            .unwrap();
        let events = As::new("events", &schema, true);
        let rendered = Compiler::new(&Postgres).max_key(&events).unwrap();
        assert_eq!(rendered.sql, "SELECT MAX(\"id\")::text FROM \"events\"");
    }

    #[test]
    fn unknown_fields_never_render() {
        let criteria = Criteria::new().eq("name; DROP TABLE users", "x");
        let err = sqlite().count(&users(), &criteria).unwrap_err();
        assert_eq!(err.code(), "field_unknown");
    }
}
