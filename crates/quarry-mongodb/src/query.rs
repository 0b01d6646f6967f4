//! Criteria, sorts and changesets as MongoDB documents
//!
//! The primary key lives in `_id`. Every document also carries a hidden
//! [`SEQ`] object id assigned on insert; sorts end with it so ties come
//! back in insertion order.

use crate::typemap::MongoTypes;
use mongodb::bson::{doc, Bson, Document};
use quarry_core::memory::like_to_regex;
use quarry_core::{
    As, Changeset, Condition, Criteria, DataType, Direction, FieldContext, Operator,
    QuarryError, Result, Sort, TypeMap, Value,
};

/// Hidden insertion-order field
pub const SEQ: &str = "__seq";

/// Document key holding `field`
pub fn path<'a>(target: &As, field: &'a str) -> &'a str {
    if target.pk.as_deref() == Some(field) {
        "_id"
    } else {
        field
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

/// Anchored regex for a LIKE pattern
///
/// `$` in PCRE also matches before a trailing newline, so the end anchor
/// is `\z`.
pub fn like_regex(pattern: &str, case_insensitive: bool) -> String {
    let mut regex = like_to_regex(pattern, case_insensitive);
    regex.pop();
    regex.push_str("\\z");
    regex
}

fn single(key: &str, value: impl Into<Bson>) -> Document {
    let mut out = Document::new();
    out.insert(key, value);
    out
}

fn operator(
    types: &MongoTypes,
    field: &str,
    datatype: DataType,
    op: Operator,
    operand: &Value,
) -> Result<Document> {
    let bound = || types.bind(datatype, operand);
    Ok(match op {
        Operator::Like | Operator::ILike => {
            let pattern = operand.as_str().ok_or_else(|| QuarryError::OperatorType {
                field: field.to_string(),
                op: op.key().to_string(),
                expected: DataType::String.name().to_string(),
                got: operand.kind().to_string(),
            })?;
            doc! { "$regex": like_regex(pattern, op == Operator::ILike) }
        }
        // `$ne` alone would match missing fields
        Operator::Ne => doc! { "$nin": [bound()?, Bson::Null] },
        Operator::Gt | Operator::After => doc! { "$gt": bound()? },
        Operator::Gte => doc! { "$gte": bound()? },
        Operator::Lt | Operator::Before => doc! { "$lt": bound()? },
        Operator::Lte => doc! { "$lte": bound()? },
    })
}

/// Filter document for `criteria`
///
/// Each condition becomes one clause of a top-level `$and`, so two pattern
/// operators on the same field never collide.
pub fn filter(types: &MongoTypes, target: &As, criteria: &Criteria) -> Result<Document> {
    let mut clauses = Vec::new();
    for (field, condition) in criteria.iter() {
        let datatype = datatype(target, field, FieldContext::Where)?;
        let key = path(target, field);
        match condition {
            Condition::Null => clauses.push(single(key, Bson::Null)),
            Condition::Eq(value) => clauses.push(single(key, types.bind(datatype, value)?)),
            Condition::Ops(ops) => {
                for (op, operand) in ops {
                    let test = operator(types, field, datatype, *op, operand)?;
                    clauses.push(single(key, test));
                }
            }
        }
    }
    Ok(match clauses.len() {
        0 => Document::new(),
        1 => clauses.remove(0),
        _ => doc! { "$and": clauses },
    })
}

/// `field` is one of `values`
pub fn within(types: &MongoTypes, target: &As, field: &str, values: &[Value]) -> Result<Document> {
    let datatype = datatype(target, field, FieldContext::Where)?;
    let values = values
        .iter()
        .filter_map(|v| v.clone().conform(field, datatype).ok())
        .map(|v| types.bind(datatype, &v))
        .collect::<Result<Vec<_>>>()?;
    Ok(single(path(target, field), doc! { "$in": values }))
}

/// Both filters
pub fn and(left: Document, right: Document) -> Document {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right,
        (_, true) => left,
        _ => doc! { "$and": [left, right] },
    }
}

/// Sort document, ending with the insertion sequence
pub fn sort(target: &As, sort: Option<&Sort>) -> Result<Document> {
    let mut out = Document::new();
    for (field, direction) in sort.into_iter().flat_map(Sort::iter) {
        datatype(target, field, FieldContext::Sort)?;
        let order = match direction {
            Direction::Asc => 1,
            Direction::Desc => -1,
        };
        out.insert(path(target, field), order);
    }
    out.insert(SEQ, 1);
    Ok(out)
}

/// Projection of `fields`; `None` when every field is wanted
pub fn projection(target: &As, fields: Option<&[String]>) -> Option<Document> {
    let fields = fields?;
    let mut out = Document::new();
    if !fields.iter().any(|f| target.pk.as_deref() == Some(f.as_str())) {
        out.insert("_id", 0);
    }
    for field in fields {
        out.insert(path(target, field), 1);
    }
    Some(out)
}

/// `$set` / `$unset` update; `Null` values unset
pub fn update(types: &MongoTypes, target: &As, changeset: &Changeset) -> Result<Document> {
    if changeset.is_empty() {
        return Err(QuarryError::SetEmpty);
    }
    let mut set = Document::new();
    let mut unset = Document::new();
    for (field, value) in changeset.iter() {
        let datatype = datatype(target, field, FieldContext::Set)?;
        if value.is_null() {
            unset.insert(path(target, field), "");
        } else {
            set.insert(path(target, field), types.bind(datatype, value)?);
        }
    }
    let mut out = Document::new();
    if !set.is_empty() {
        out.insert("$set", set);
    }
    if !unset.is_empty() {
        out.insert("$unset", unset);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::Schema;

    fn users() -> As {
        let schema = Schema::builder()
            .primary("id", DataType::String)
            .field("name", DataType::String)
            .optional("age", DataType::U8)
            .optional("score", DataType::U64)
            .build("users")
            .unwrap();
        As::new("users", &schema, true)
    }

    #[test]
    fn primary_key_maps_to_id() {
        let filter = filter(&MongoTypes, &users(), &Criteria::new().eq("id", "u1")).unwrap();
        assert_eq!(filter, doc! { "_id": "u1" });
    }

    #[test]
    fn ne_excludes_missing_values() {
        let filter = filter(
            &MongoTypes,
            &users(),
            &Criteria::new().op("age", Operator::Ne, 30u8),
        )
        .unwrap();
        assert_eq!(filter, doc! { "age": { "$nin": [30, Bson::Null] } });
    }

    #[test]
    fn conditions_combine_under_and() {
        let criteria = Criteria::new()
            .null("age")
            .op("name", Operator::Like, "Do%")
            .op("name", Operator::ILike, "%ALD");
        let filter = filter(&MongoTypes, &users(), &criteria).unwrap();
        let clauses = filter.get_array("$and").unwrap();
        assert_eq!(clauses.len(), 3);
        assert_eq!(clauses[0], Bson::Document(doc! { "age": Bson::Null }));
    }

    #[test]
    fn wide_integers_compare_as_sortable_text() {
        let filter = filter(
            &MongoTypes,
            &users(),
            &Criteria::new().op("score", Operator::Gt, 9u64),
        )
        .unwrap();
        assert_eq!(filter, doc! { "score": { "$gt": "00000000000000000009" } });
    }

    #[test]
    fn like_anchors_at_the_very_end() {
        assert_eq!(like_regex("a%", false), "(?s)^a.*\\z");
        assert_eq!(like_regex("a.b", true), "(?is)^a\\.b\\z");
    }

    #[test]
    fn sort_ends_with_sequence() {
        let sort = sort(&users(), Some(&Sort::new().desc("age").asc("id"))).unwrap();
        assert_eq!(sort, doc! { "age": -1, "_id": 1, "__seq": 1 });
    }

    #[test]
    fn projection_hides_id_unless_requested() {
        let fields = vec!["name".to_string()];
        assert_eq!(
            projection(&users(), Some(&fields)),
            Some(doc! { "_id": 0, "name": 1 })
        );
        assert_eq!(projection(&users(), None), None);
    }

    #[test]
    fn update_splits_set_and_unset() {
        let changeset = Changeset::new().set("name", "x").unset("age");
        let update = update(&MongoTypes, &users(), &changeset).unwrap();
        assert_eq!(update, doc! { "$set": { "name": "x" }, "$unset": { "age": "" } });
    }
}
