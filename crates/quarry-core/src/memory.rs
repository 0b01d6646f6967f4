//! In-memory adapter
//!
//! The reference engine: every networked adapter must observe exactly what
//! this one does. Rows live in insertion order, sorting is stable, and
//! relation loading is always phased.

use crate::criteria::{Changeset, Condition, Criteria, Direction, Operator, Sort};
use crate::db::{As, Db, ReadArgs, ReadMode, ReadResult};
use crate::error::{QuarryError, Result};
use crate::relation::{self, Phase};
use crate::sortable;
use crate::value::{Record, Value};
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const ENGINE: &str = "memory";

/// Translate a SQL LIKE pattern into an anchored regex
///
/// `%` matches any run of characters and `_` exactly one, newlines
/// included. Everything else is matched literally.
pub fn like_to_regex(pattern: &str, case_insensitive: bool) -> String {
    let mut out = String::from(if case_insensitive { "(?is)^" } else { "(?s)^" });
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            c => out.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
    out.push('$');
    out
}

fn like(pattern: &Value, value: &Value, case_insensitive: bool) -> bool {
    let (Some(pattern), Some(value)) = (pattern.as_str(), value.as_str()) else {
        return false;
    };
    Regex::new(&like_to_regex(pattern, case_insensitive)).is_ok_and(|re| re.is_match(value))
}

fn satisfies(value: &Value, op: Operator, operand: &Value) -> bool {
    if value.is_null() {
        return false;
    }
    match op {
        Operator::Like => like(operand, value, false),
        Operator::ILike => like(operand, value, true),
        Operator::Ne => value.compare(operand).is_some_and(|o| o != Ordering::Equal),
        Operator::Gt | Operator::After => value.compare(operand) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            value.compare(operand),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lt | Operator::Before => value.compare(operand) == Some(Ordering::Less),
        Operator::Lte => matches!(
            value.compare(operand),
            Some(Ordering::Less | Ordering::Equal)
        ),
    }
}

/// Whether `row` satisfies every condition in `criteria`
pub fn matches(row: &Record, criteria: &Criteria) -> bool {
    criteria.iter().all(|(field, condition)| {
        let value = row.get(field).unwrap_or(&Value::Null);
        match condition {
            Condition::Null => value.is_null(),
            Condition::Eq(expected) => value.same(expected),
            Condition::Ops(ops) => ops.iter().all(|(op, operand)| satisfies(value, *op, operand)),
        }
    })
}

/// Stable multi-key sort; nulls order before values
pub fn sort_rows(rows: &mut [Record], sort: Option<&Sort>) {
    let Some(sort) = sort.filter(|s| !s.is_empty()) else {
        return;
    };
    rows.sort_by(|a, b| {
        for (field, direction) in sort.iter() {
            let left = a.get(field).unwrap_or(&Value::Null);
            let right = b.get(field).unwrap_or(&Value::Null);
            let ordering = match (left.is_null(), right.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => left.compare(right).unwrap_or(Ordering::Equal),
            };
            let ordering = match direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn apply_limit(rows: &mut Vec<Record>, limit: Option<u64>) {
    if let Some(limit) = limit {
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    }
}

fn strip_nulls(mut record: Record) -> Record {
    record.retain(|_, v| !v.is_null());
    record
}

/// In-memory tables keyed by store name
#[derive(Debug, Clone, Default)]
pub struct MemoryDb {
    tables: Arc<Mutex<HashMap<String, Vec<Record>>>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn select(&self, table: &str, criteria: &Criteria, sort: Option<&Sort>) -> Vec<Record> {
        let tables = self.tables.lock();
        let mut rows: Vec<Record> = tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| matches(r, criteria)).cloned().collect())
            .unwrap_or_default();
        drop(tables);
        sort_rows(&mut rows, sort);
        rows
    }

    fn next_pk(&self, target: &As, rows: &[Record]) -> Result<Value> {
        let pk = target.pk.as_deref().ok_or_else(|| QuarryError::PkUndefined {
            store: target.name.clone(),
        })?;
        let datatype = target.pk_type().ok_or_else(|| QuarryError::PkUndefined {
            store: target.name.clone(),
        })?;
        if datatype == crate::DataType::String {
            return Ok(Value::String(Uuid::new_v4().to_string()));
        }
        let max = rows
            .iter()
            .filter_map(|row| row.get(pk))
            .max_by(|a, b| a.compare(b).unwrap_or(Ordering::Equal));
        sortable::next_key(&target.name, datatype, max)
    }

    fn read_rows(&self, target: &As, args: ReadArgs) -> Result<Vec<Record>> {
        let mut rows = self.select(&target.name, &args.criteria, args.sort.as_ref());
        apply_limit(&mut rows, args.limit);

        if args.with.is_empty() {
            return Ok(rows
                .into_iter()
                .map(|row| relation::project(row, args.fields.as_deref()))
                .collect());
        }

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
            let related: Vec<Record> = self
                .select(
                    &relation.target.name,
                    &relation.criteria,
                    relation.sort.as_ref(),
                )
                .into_iter()
                .filter(|row| {
                    row.get(phase.by)
                        .is_some_and(|v| keys.iter().any(|k| k.same(v)))
                })
                .collect();
            phase.attach(&rows, &mut out, related);
        }
        Ok(out)
    }
}

#[async_trait]
impl Db for MemoryDb {
    fn engine(&self) -> &'static str {
        ENGINE
    }

    async fn create_schema(&self, target: &As) -> Result<()> {
        self.tables.lock().entry(target.name.clone()).or_default();
        Ok(())
    }

    async fn delete_schema(&self, name: &str) -> Result<()> {
        self.tables.lock().remove(name);
        Ok(())
    }

    async fn create(&self, target: &As, record: Record) -> Result<Record> {
        let mut record = strip_nulls(record);
        let mut tables = self.tables.lock();
        let rows = tables.entry(target.name.clone()).or_default();

        if let Some(pk) = target.pk.as_deref() {
            match record.get(pk) {
                Some(value) => {
                    if rows.iter().any(|r| r.get(pk).is_some_and(|v| v.same(value))) {
                        return Err(QuarryError::PkDuplicate {
                            store: target.name.clone(),
                            value: value.to_string(),
                        });
                    }
                }
                None if !target.generate_pk => {
                    return Err(QuarryError::PkRequired {
                        store: target.name.clone(),
                    });
                }
                None => {
                    let value = self.next_pk(target, rows)?;
                    record.insert(pk, value);
                }
            }
        }

        debug!(engine = ENGINE, table = %target.name, "insert");
        rows.push(record.clone());
        Ok(record)
    }

    async fn read(&self, target: &As, mode: ReadMode) -> Result<ReadResult> {
        match mode {
            ReadMode::Count(criteria) => {
                let n = self.select(&target.name, &criteria, None).len();
                Ok(ReadResult::Count(n as u64))
            }
            ReadMode::Rows(args) => self.read_rows(target, args).map(ReadResult::Rows),
        }
    }

    async fn update(
        &self,
        target: &As,
        criteria: &Criteria,
        changeset: &Changeset,
    ) -> Result<u64> {
        let mut tables = self.tables.lock();
        let Some(rows) = tables.get_mut(&target.name) else {
            return Ok(0);
        };
        let mut n = 0;
        for row in rows.iter_mut().filter(|r| matches(r, criteria)) {
            for (field, value) in changeset.iter() {
                if value.is_null() {
                    row.remove(field);
                } else {
                    row.insert(field.clone(), value.clone());
                }
            }
            n += 1;
        }
        debug!(engine = ENGINE, table = %target.name, updated = n, "update");
        Ok(n)
    }

    async fn delete(&self, target: &As, criteria: &Criteria) -> Result<u64> {
        let mut tables = self.tables.lock();
        let Some(rows) = tables.get_mut(&target.name) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !matches(r, criteria));
        let n = (before - rows.len()) as u64;
        debug!(engine = ENGINE, table = %target.name, deleted = n, "delete");
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use crate::schema::Schema;
    use crate::DataType;
    use test_case::test_case;

    #[test_case("Don%", "Donald", true)]
    #[test_case("Don%", "donald", false)]
    #[test_case("D_nald", "Donald", true)]
    #[test_case("%.%", "a.b", true)]
    #[test_case("%.%", "ab", false)]
    #[test_case("a+b", "aab", false)]
    #[test_case("a+b", "a+b", true)]
    #[test_case("line%", "line\nbreak", true)]
    fn like_patterns(pattern: &str, input: &str, expected: bool) {
        assert_eq!(like(&Value::from(pattern), &Value::from(input), false), expected);
    }

    #[test]
    fn ilike_ignores_case() {
        assert!(like(&Value::from("don%"), &Value::from("DONALD"), true));
    }

    #[test]
    fn operators_never_match_missing_values() {
        let row = record! { "name" => "x" };
        let gt = Criteria::new().op("age", Operator::Gt, 1u8);
        let ne = Criteria::new().op("age", Operator::Ne, 1u8);
        assert!(!matches(&row, &gt));
        assert!(!matches(&row, &ne));
        assert!(matches(&row, &Criteria::new().null("age")));
    }

    #[test]
    fn sort_is_stable() {
        let mut rows = vec![
            record! { "n" => "a", "k" => 1u8 },
            record! { "n" => "b", "k" => 0u8 },
            record! { "n" => "c", "k" => 1u8 },
        ];
        sort_rows(&mut rows, Some(&Sort::new().desc("k")));
        let order: Vec<_> = rows.iter().map(|r| r.get("n").unwrap().to_string()).collect();
        assert_eq!(order, vec!["a", "c", "b"]);
    }

    fn counters() -> As {
        let schema = Schema::builder()
            .primary("id", DataType::U64)
            .field("label", DataType::String)
            .build("counters")
            .unwrap();
        As::new("counters", &schema, true)
    }

    #[tokio::test]
    async fn generates_sequential_integer_keys() {
        let db = MemoryDb::new();
        let target = counters();
        db.create_schema(&target).await.unwrap();
        let a = db.create(&target, record! { "label" => "a" }).await.unwrap();
        let b = db.create(&target, record! { "label" => "b" }).await.unwrap();
        assert_eq!(a.get("id"), Some(&Value::UInt(1)));
        assert_eq!(b.get("id"), Some(&Value::UInt(2)));
    }

    #[tokio::test]
    async fn rejects_duplicate_keys() {
        let db = MemoryDb::new();
        let target = counters();
        db.create(&target, record! { "id" => 7u64, "label" => "a" })
            .await
            .unwrap();
        let err = db
            .create(&target, record! { "id" => 7u64, "label" => "b" })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "pk_duplicate");
    }

    #[tokio::test]
    async fn empty_criteria_match_every_row() {
        let db = MemoryDb::new();
        let target = counters();
        db.create_schema(&target).await.unwrap();
        for label in ["a", "b"] {
            db.create(&target, record! { "label" => label }).await.unwrap();
        }
        let n = db
            .update(&target, &Criteria::new(), &Changeset::new().set("label", "c"))
            .await
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(db.delete(&target, &Criteria::new()).await.unwrap(), 2);
        let left = db.read(&target, ReadMode::Count(Criteria::new())).await.unwrap();
        assert_eq!(left.into_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn update_unsets_nulls() {
        let db = MemoryDb::new();
        let target = counters();
        db.create(&target, record! { "id" => 1u64, "label" => "a" })
            .await
            .unwrap();
        let n = db
            .update(
                &target,
                &Criteria::new().eq("id", 1u64),
                &Changeset::new().unset("label"),
            )
            .await
            .unwrap();
        assert_eq!(n, 1);
        let rows = db
            .read(&target, ReadMode::Rows(ReadArgs::default()))
            .await
            .unwrap()
            .into_rows()
            .unwrap();
        assert!(!rows[0].contains("label"));
    }
}
