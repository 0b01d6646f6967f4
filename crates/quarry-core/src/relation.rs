//! Relation planning
//!
//! A read with relations runs either as one joined query or in phases: the
//! base rows first, then one `IN (...)` query per relation whose rows are
//! grouped back onto their parents. Phased reads are always correct;
//! [`joinable`] only admits the shape a single `LEFT JOIN` reproduces
//! exactly.

use crate::criteria::{Criteria, Sort};
use crate::db::As;
use crate::error::{QuarryError, RelationSide, Result};
pub use crate::schema::Kind;
use crate::value::{Record, Related, Value};
use indexmap::IndexMap;
use std::collections::HashMap;

/// A relation resolved for one read
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub target: As,
    pub kind: Kind,
    pub fk: String,
    pub reverse: bool,
    pub criteria: Criteria,
    pub fields: Option<Vec<String>>,
    pub sort: Option<Sort>,
    pub limit: Option<u64>,
}

impl Relation {
    pub fn is_many(&self) -> bool {
        self.kind == Kind::Many
    }

    /// Rows to keep per parent; `None` keeps all
    pub fn per_parent(&self) -> Option<u64> {
        match self.kind {
            Kind::One => Some(1),
            Kind::Many => self.limit,
        }
    }

    /// The empty value attached when a parent has no related rows
    pub fn empty(&self) -> Related {
        match self.kind {
            Kind::One => Related::One(None),
            Kind::Many => Related::Many(Vec::new()),
        }
    }
}

/// Relations to load, by name
pub type With = IndexMap<String, Relation>;

/// Whether `with` can be loaded with a single `LEFT JOIN`
///
/// Only a lone, unfiltered, unsorted, unlimited `many` relation from a
/// keyed parent to a keyed target qualifies; anything else needs per-parent
/// ranking or filtering and goes phased.
pub fn joinable(parent: &As, with: &With) -> bool {
    if with.len() != 1 || parent.pk.is_none() {
        return false;
    }
    with.values().all(|relation| {
        !relation.reverse
            && relation.kind == Kind::Many
            && relation.limit.is_none()
            && relation.sort.as_ref().map_or(true, Sort::is_empty)
            && relation.criteria.is_empty()
            && relation.target.pk.is_some()
    })
}

/// Widen a projection with the keys relation loading needs
///
/// Adds the parent primary key and the foreign keys of reverse relations.
/// `None` (all fields) stays `None`.
pub fn expand(parent: &As, fields: Option<&[String]>, with: &With) -> Option<Vec<String>> {
    let fields = fields?;
    let mut out: Vec<String> = fields.to_vec();
    let mut push = |field: &str| {
        if !out.iter().any(|f| f == field) {
            out.push(field.to_string());
        }
    };
    if let Some(pk) = &parent.pk {
        push(pk);
    }
    for relation in with.values().filter(|r| r.reverse) {
        push(&relation.fk);
    }
    Some(out)
}

/// Keep only `fields` of `record` (all when `None`)
pub fn project(mut record: Record, fields: Option<&[String]>) -> Record {
    if let Some(fields) = fields {
        record.retain(|name, _| fields.iter().any(|f| f == name));
    }
    record
}

/// Hashable identity of a join value; integers compare across signedness
pub fn group_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Int(_) | Value::UInt(_) => Some(format!("int:{value}")),
        other => Some(format!("{}:{other}", other.kind())),
    }
}

/// Distinct non-null values of `field`, in first-seen order
pub fn distinct(rows: &[Record], field: &str) -> Vec<Value> {
    let mut seen = HashMap::new();
    let mut out = Vec::new();
    for value in rows.iter().filter_map(|row| row.get(field)) {
        if let Some(key) = group_key(value) {
            if seen.insert(key, ()).is_none() {
                out.push(value.clone());
            }
        }
    }
    out
}

// ============================================================================
// Phased loading
// ============================================================================

/// One relation of a phased read
#[derive(Debug)]
pub struct Phase<'a> {
    pub name: &'a str,
    pub relation: &'a Relation,
    /// Column on the related rows to match
    pub by: &'a str,
    /// Column on the parent rows holding the join value
    pub parent_by: &'a str,
}

impl<'a> Phase<'a> {
    /// Resolve join columns, failing when a needed primary key is missing
    pub fn plan(parent: &'a As, name: &'a str, relation: &'a Relation) -> Result<Self> {
        let by = if relation.reverse {
            relation
                .target
                .pk
                .as_deref()
                .ok_or(QuarryError::RelationRequiresPk(RelationSide::Target))?
        } else {
            relation.fk.as_str()
        };
        let parent_by = if relation.reverse {
            relation.fk.as_str()
        } else {
            parent
                .pk
                .as_deref()
                .ok_or(QuarryError::RelationRequiresPk(RelationSide::Parent))?
        };
        Ok(Self {
            name,
            relation,
            by,
            parent_by,
        })
    }

    /// Distinct join values found on the parent rows
    pub fn keys(&self, rows: &[Record]) -> Vec<Value> {
        distinct(rows, self.parent_by)
    }

    /// Projection for the related query: the requested fields plus `by`
    pub fn fields(&self) -> Option<Vec<String>> {
        self.relation.fields.as_ref().map(|fields| {
            let mut fields = fields.clone();
            if !fields.iter().any(|f| f == self.by) {
                fields.push(self.by.to_string());
            }
            fields
        })
    }

    /// Attach the empty relation value to every output row
    pub fn attach_empty(&self, out: &mut [Record]) {
        for row in out {
            row.set_related(self.name, self.relation.empty());
        }
    }

    /// Group `related` by join value and attach each group to its parent
    ///
    /// `related` must already be ordered by the relation's sort. Groups are
    /// truncated to the per-parent cap here, so engines that cannot rank in
    /// the query get the same result as those that do.
    pub fn attach(&self, rows: &[Record], out: &mut [Record], related: Vec<Record>) {
        let cap = self.relation.per_parent().map(|n| n as usize);
        let mut grouped: HashMap<String, Vec<Record>> = HashMap::new();
        for row in related {
            let Some(key) = row.get(self.by).and_then(group_key) else {
                continue;
            };
            let group = grouped.entry(key).or_default();
            if cap.map_or(true, |cap| group.len() < cap) {
                group.push(project(row, self.relation.fields.as_deref()));
            }
        }

        for (row, out_row) in rows.iter().zip(out.iter_mut()) {
            let group = row
                .get(self.parent_by)
                .and_then(group_key)
                .and_then(|key| grouped.get(&key).cloned())
                .unwrap_or_default();
            let related = match self.relation.kind {
                Kind::Many => Related::Many(group),
                Kind::One => Related::One(group.into_iter().next().map(Box::new)),
            };
            out_row.set_related(self.name, related);
        }
    }
}

// ============================================================================
// Joined loading
// ============================================================================

/// Table aliases for a joined read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinAliases {
    pub parent: String,
    pub target: String,
}

impl JoinAliases {
    /// First letter of each table plus a per-letter counter (`u0`, `p0`)
    pub fn new(parent: &str, target: &str) -> Self {
        let mut counts: HashMap<char, usize> = HashMap::new();
        let mut alias = |table: &str| {
            let letter = table
                .chars()
                .next()
                .map_or('t', |c| c.to_ascii_lowercase());
            let n = counts.entry(letter).or_insert(0);
            let alias = format!("{letter}{n}");
            *n += 1;
            alias
        };
        let parent = alias(parent);
        let target = alias(target);
        Self { parent, target }
    }

    pub fn column(alias: &str, field: &str) -> String {
        format!("{alias}_{field}")
    }
}

/// Regroup flat joined rows into parents with nested children
///
/// Each input row holds `{parent alias}_{field}` and `{target alias}_{field}`
/// columns, already unbound. Parents keep first-seen order; a row whose
/// target primary key is null is a parent without children.
pub fn nest(
    parent: &As,
    fields: Option<&[String]>,
    name: &str,
    relation: &Relation,
    aliases: &JoinAliases,
    rows: Vec<Record>,
) -> Result<Vec<Record>> {
    let pk = parent
        .pk
        .as_deref()
        .ok_or(QuarryError::RelationRequiresPk(RelationSide::Parent))?;
    let target_pk = relation
        .target
        .pk
        .as_deref()
        .ok_or(QuarryError::RelationRequiresPk(RelationSide::Target))?;

    let parent_fields = parent.resolve_fields(fields);
    let target_fields = relation.target.resolve_fields(relation.fields.as_deref());
    let pk_column = JoinAliases::column(&aliases.parent, pk);
    let target_pk_column = JoinAliases::column(&aliases.target, target_pk);

    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, (Record, Vec<Record>)> = HashMap::new();

    for row in rows {
        let Some(key) = row.get(&pk_column).and_then(group_key) else {
            continue;
        };
        let entry = grouped.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            let mut out = Record::new();
            for field in &parent_fields {
                match row.get(&JoinAliases::column(&aliases.parent, field)) {
                    Some(value) if !value.is_null() => {
                        out.insert(field.clone(), value.clone());
                    }
                    _ => {}
                }
            }
            (out, Vec::new())
        });

        if row.get(&target_pk_column).map_or(true, Value::is_null) {
            continue;
        }
        let mut child = Record::new();
        for field in &target_fields {
            match row.get(&JoinAliases::column(&aliases.target, field)) {
                Some(value) if !value.is_null() => {
                    child.insert(field.clone(), value.clone());
                }
                _ => {}
            }
        }
        entry.1.push(child);
    }

    Ok(order
        .into_iter()
        .filter_map(|key| grouped.remove(&key))
        .map(|(mut parent_row, children)| {
            let related = match relation.kind {
                Kind::Many => Related::Many(children),
                Kind::One => Related::One(children.into_iter().next().map(Box::new)),
            };
            parent_row.set_related(name, related);
            parent_row
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::DataType;
    use crate::record;
    use crate::schema::{RelationDef, Schema};

    fn users() -> As {
        let schema = Schema::builder()
            .primary("id", DataType::U32)
            .field("name", DataType::String)
            .relation("posts", RelationDef::many("posts", "author_id"))
            .build("users")
            .unwrap();
        As::new("users", &schema, true)
    }

    fn posts() -> As {
        let schema = Schema::builder()
            .primary("id", DataType::U32)
            .field("title", DataType::String)
            .field("author_id", DataType::U32)
            .build("posts")
            .unwrap();
        As::new("posts", &schema, true)
    }

    fn many() -> Relation {
        Relation {
            target: posts(),
            kind: Kind::Many,
            fk: "author_id".into(),
            reverse: false,
            criteria: Criteria::new(),
            fields: None,
            sort: None,
            limit: None,
        }
    }

    #[test]
    fn plain_many_is_joinable() {
        let with = With::from([("posts".to_string(), many())]);
        assert!(joinable(&users(), &with));
    }

    #[test]
    fn limits_filters_and_sorts_force_phases() {
        let limited = Relation {
            limit: Some(1),
            ..many()
        };
        let filtered = Relation {
            criteria: Criteria::new().eq("title", "x"),
            ..many()
        };
        let sorted = Relation {
            sort: Some(Sort::new().asc("title")),
            ..many()
        };
        let one = Relation {
            kind: Kind::One,
            ..many()
        };
        for relation in [limited, filtered, sorted, one] {
            let with = With::from([("posts".to_string(), relation)]);
            assert!(!joinable(&users(), &with));
        }

        let two = With::from([("a".to_string(), many()), ("b".to_string(), many())]);
        assert!(!joinable(&users(), &two));
    }

    #[test]
    fn expand_adds_parent_pk_and_reverse_keys() {
        let author = Relation {
            target: users(),
            kind: Kind::One,
            fk: "author_id".into(),
            reverse: true,
            criteria: Criteria::new(),
            fields: None,
            sort: None,
            limit: None,
        };
        let with = With::from([("author".to_string(), author)]);
        let fields = vec!["title".to_string()];
        assert_eq!(
            expand(&posts(), Some(&fields), &with).unwrap(),
            vec!["title", "id", "author_id"]
        );
        assert_eq!(expand(&posts(), None, &with), None);
    }

    #[test]
    fn phase_requires_primary_keys() {
        let mut parent = users();
        parent.pk = None;
        let relation = many();
        let err = Phase::plan(&parent, "posts", &relation).unwrap_err();
        assert_eq!(err.to_string(), "relation loading requires parent primary key");
    }

    #[test]
    fn attach_groups_and_caps() {
        let relation = Relation {
            limit: Some(1),
            fields: Some(vec!["title".into()]),
            ..many()
        };
        let parent = users();
        let phase = Phase::plan(&parent, "posts", &relation).unwrap();
        let rows = vec![
            record! { "id" => 1u32, "name" => "Donald" },
            record! { "id" => 2u32, "name" => "Ryan" },
        ];
        let mut out = rows.clone();
        let related = vec![
            record! { "title" => "a", "author_id" => 1u32 },
            record! { "title" => "b", "author_id" => 1u32 },
        ];
        phase.attach(&rows, &mut out, related);

        let first = out[0].related("posts").and_then(Related::as_many).unwrap();
        assert_eq!(first, &[record! { "title" => "a" }]);
        let second = out[1].related("posts").and_then(Related::as_many).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn nest_regroups_join_rows() {
        let aliases = JoinAliases::new("users", "posts");
        assert_eq!(aliases.parent, "u0");
        assert_eq!(aliases.target, "p0");

        let rows = vec![
            record! { "u0_id" => 1u32, "u0_name" => "Donald", "p0_id" => 10u32, "p0_title" => "a", "p0_author_id" => 1u32 },
            record! { "u0_id" => 1u32, "u0_name" => "Donald", "p0_id" => 11u32, "p0_title" => "b", "p0_author_id" => 1u32 },
            record! { "u0_id" => 2u32, "u0_name" => "Ryan", "p0_id" => Value::Null, "p0_title" => Value::Null, "p0_author_id" => Value::Null },
        ];
        let nested = nest(&users(), None, "posts", &many(), &aliases, rows).unwrap();
        assert_eq!(nested.len(), 2);
        assert_eq!(
            nested[0].related("posts").and_then(Related::as_many).map(<[Record]>::len),
            Some(2)
        );
        assert_eq!(
            nested[1].related("posts").and_then(Related::as_many).map(<[Record]>::len),
            Some(0)
        );
    }

    #[test]
    fn same_letter_tables_get_distinct_aliases() {
        let aliases = JoinAliases::new("people", "posts");
        assert_eq!(aliases.parent, "p0");
        assert_eq!(aliases.target, "p1");
    }
}
