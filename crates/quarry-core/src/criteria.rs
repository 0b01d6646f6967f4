//! Criteria, sort and changeset types
//!
//! Operators form a closed set decoded once, at construction, from their
//! `$`-prefixed string keys. Adapters match on [`Operator`] and never see
//! raw operator strings.

use crate::error::{QuarryError, Result};
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Operators
// ============================================================================

/// Criteria operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operator {
    Like,
    ILike,
    Gt,
    Gte,
    Lt,
    Lte,
    Ne,
    Before,
    After,
}

impl Operator {
    pub const ALL: [Operator; 9] = [
        Self::Like,
        Self::ILike,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::Ne,
        Self::Before,
        Self::After,
    ];

    /// The `$`-prefixed key used in the criteria vocabulary
    pub fn key(self) -> &'static str {
        match self {
            Self::Like => "$like",
            Self::ILike => "$ilike",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::Ne => "$ne",
            Self::Before => "$before",
            Self::After => "$after",
        }
    }

    /// Suffix for parameter names, e.g. `age__gt`
    pub fn suffix(self) -> &'static str {
        &self.key()[1..]
    }

    /// SQL comparison symbol; `None` for pattern operators
    pub fn symbol(self) -> Option<&'static str> {
        match self {
            Self::Gt | Self::After => Some(">"),
            Self::Gte => Some(">="),
            Self::Lt | Self::Before => Some("<"),
            Self::Lte => Some("<="),
            Self::Ne => Some("!="),
            Self::Like | Self::ILike => None,
        }
    }

    pub fn is_pattern(self) -> bool {
        matches!(self, Self::Like | Self::ILike)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.key() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Parameter name for `field` under `op`
pub fn bind_key(field: &str, op: Operator) -> String {
    format!("{field}__{}", op.suffix())
}

// ============================================================================
// Conditions
// ============================================================================

/// What a single criteria entry asks of its field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field is null or absent
    Null,
    /// Field equals the value
    Eq(Value),
    /// Field satisfies every operator
    Ops(BTreeMap<Operator, Value>),
}

impl Condition {
    /// Build an operator condition from `$`-keyed pairs
    ///
    /// Fails with `operator_unknown` on a key outside the vocabulary and
    /// `operator_empty` when no pairs are given.
    pub fn parse_ops<K, V, I>(field: &str, ops: I) -> Result<Self>
    where
        K: AsRef<str>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut parsed = BTreeMap::new();
        for (key, value) in ops {
            let op = key
                .as_ref()
                .parse::<Operator>()
                .map_err(|op| QuarryError::OperatorUnknown {
                    field: field.to_string(),
                    op,
                })?;
            parsed.insert(op, value.into());
        }
        if parsed.is_empty() {
            return Err(QuarryError::OperatorEmpty {
                field: field.to_string(),
            });
        }
        Ok(Self::Ops(parsed))
    }
}

impl<T: Into<Value>> From<T> for Condition {
    fn from(value: T) -> Self {
        match value.into() {
            Value::Null => Self::Null,
            v => Self::Eq(v),
        }
    }
}

/// Field → condition map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria(IndexMap<String, Condition>);

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field equals `value` (`null` → IS NULL)
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), Condition::from(value.into()));
        self
    }

    #[must_use]
    pub fn null(mut self, field: impl Into<String>) -> Self {
        self.0.insert(field.into(), Condition::Null);
        self
    }

    /// Add `op` to the field's operator set
    ///
    /// Replaces an equality or null condition previously set on the field.
    #[must_use]
    pub fn op(mut self, field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        match self.0.get_mut(&field) {
            Some(Condition::Ops(ops)) => {
                ops.insert(op, value);
            }
            _ => {
                self.0
                    .insert(field, Condition::Ops(BTreeMap::from([(op, value)])));
            }
        }
        self
    }

    #[must_use]
    pub fn condition(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.0.insert(field.into(), condition);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Condition> {
        self.0.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Condition)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn conditions_mut(&mut self) -> impl Iterator<Item = (&String, &mut Condition)> {
        self.0.iter_mut()
    }
}

impl<K: Into<String>, C: Into<Condition>> FromIterator<(K, C)> for Criteria {
    fn from_iter<I: IntoIterator<Item = (K, C)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, c)| (k.into(), c.into())).collect())
    }
}

// ============================================================================
// Sorting
// ============================================================================

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    /// Case-insensitive `asc` / `desc`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(s.to_string()),
        }
    }
}

/// Ordered sort keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sort(IndexMap<String, Direction>);

impl Sort {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.0.insert(field.into(), direction);
        self
    }

    #[must_use]
    pub fn asc(self, field: impl Into<String>) -> Self {
        self.by(field, Direction::Asc)
    }

    #[must_use]
    pub fn desc(self, field: impl Into<String>) -> Self {
        self.by(field, Direction::Desc)
    }

    /// Parse `(field, "asc"|"desc")` pairs, case-insensitively
    pub fn parse<K, D, I>(pairs: I) -> Result<Self>
    where
        K: Into<String>,
        D: AsRef<str>,
        I: IntoIterator<Item = (K, D)>,
    {
        let mut sort = Self::new();
        for (field, direction) in pairs {
            let field = field.into();
            let direction =
                direction
                    .as_ref()
                    .parse()
                    .map_err(|value| QuarryError::SortInvalidValue {
                        field: field.clone(),
                        value,
                    })?;
            sort.0.insert(field, direction);
        }
        Ok(sort)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, Direction)> {
        self.0.iter().map(|(k, d)| (k, *d))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// Changesets
// ============================================================================

/// Field updates: a value sets the field, `Null` unsets it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changeset(IndexMap<String, Value>);

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    #[must_use]
    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.0.insert(field.into(), Value::Null);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = (&String, &mut Value)> {
        self.0.iter_mut()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Changeset {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_vocabulary_round_trips() {
        for op in Operator::ALL {
            assert_eq!(op.key().parse::<Operator>().unwrap(), op);
        }
        assert!("$regex".parse::<Operator>().is_err());
    }

    #[test]
    fn bind_keys_use_double_underscore() {
        assert_eq!(bind_key("age", Operator::Gt), "age__gt");
        assert_eq!(bind_key("born", Operator::Before), "born__before");
    }

    #[test]
    fn parse_ops_rejects_unknown_and_empty() {
        let err = Condition::parse_ops("age", [("$between", 1u8)]).unwrap_err();
        assert_eq!(err.code(), "operator_unknown");
        assert_eq!(err.to_string(), "age: unknown operator $between");

        let none: Vec<(&str, u8)> = vec![];
        let err = Condition::parse_ops("age", none).unwrap_err();
        assert_eq!(err.code(), "operator_empty");
    }

    #[test]
    fn ops_accumulate_per_field() {
        let c = Criteria::new()
            .op("age", Operator::Gte, 18u8)
            .op("age", Operator::Lt, 65u8);
        let Some(Condition::Ops(ops)) = c.get("age") else {
            panic!("expected operator condition");
        };
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn null_value_becomes_null_condition() {
        let c = Criteria::new().eq("age", Value::Null);
        assert_eq!(c.get("age"), Some(&Condition::Null));
    }

    #[test]
    fn sort_direction_is_case_insensitive() {
        let sort = Sort::parse([("age", "DESC"), ("name", "Asc")]).unwrap();
        let dirs: Vec<_> = sort.iter().map(|(_, d)| d).collect();
        assert_eq!(dirs, vec![Direction::Desc, Direction::Asc]);

        let err = Sort::parse([("age", "up")]).unwrap_err();
        assert_eq!(err.code(), "sort_invalid_value");
    }
}
