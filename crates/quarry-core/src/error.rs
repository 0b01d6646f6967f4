//! Error types for Quarry
//!
//! Every validation failure carries a stable code (see [`QuarryError::code`])
//! so callers can branch on the kind of failure without matching messages.
//! Validation happens in the Store and the compilers before any adapter I/O;
//! engine failures are wrapped in [`QuarryError::Backend`] untouched.

use std::fmt;
use thiserror::Error;

/// Common result type for Quarry operations
pub type Result<T> = std::result::Result<T, QuarryError>;

/// Where an unknown or duplicate field was referenced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldContext {
    Select,
    Where,
    Sort,
    Insert,
    Set,
}

impl fmt::Display for FieldContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Select => "select",
            Self::Where => "where",
            Self::Sort => "sort",
            Self::Insert => "insert",
            Self::Set => "set",
        };
        f.write_str(name)
    }
}

/// Which side of a relation lacks the primary key it needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationSide {
    Parent,
    Target,
}

impl fmt::Display for RelationSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parent => f.write_str("parent"),
            Self::Target => f.write_str("target"),
        }
    }
}

/// Quarry error type
#[derive(Error, Debug)]
pub enum QuarryError {
    // ========================================================================
    // Store binding
    // ========================================================================
    #[error("store has no database bound")]
    DbMissing,

    #[error("store name required")]
    StoreNameRequired,

    #[error("{0}: schema is not registered in the catalog")]
    UnregisteredSchema(String),

    #[error("no record with {field} = {value}")]
    RecordNotFound { field: String, value: String },

    // ========================================================================
    // Primary key
    // ========================================================================
    #[error("{store}: store has no primary key")]
    PkUndefined { store: String },

    #[error("{field}: primary key cannot be updated")]
    PkImmutable { field: String },

    #[error("{store}: duplicate primary key {value}")]
    PkDuplicate { store: String, value: String },

    #[error("{field}: invalid primary key type {datatype}")]
    PkInvalid { field: String, datatype: String },

    #[error("{store}: primary key required")]
    PkRequired { store: String },

    #[error("{store}: multiple primary keys ({first}, {second})")]
    PkMultiple {
        store: String,
        first: String,
        second: String,
    },

    #[error("{store}: primary key space exhausted")]
    PkExhausted { store: String },

    // ========================================================================
    // Fields and values
    // ========================================================================
    #[error("{field}: unknown field on {context}")]
    FieldUnknown { field: String, context: FieldContext },

    #[error("{field}: duplicate field on {context}")]
    FieldDuplicate { field: String, context: FieldContext },

    #[error("{field}: field required")]
    FieldRequired { field: String },

    #[error("{field}: null not allowed")]
    NullNotAllowed { field: String },

    #[error("{field}: expected {datatype}, got {got}")]
    ValueInvalid {
        field: String,
        datatype: String,
        got: String,
    },

    // ========================================================================
    // Operators
    // ========================================================================
    #[error("{field}: unknown operator {op}")]
    OperatorUnknown { field: String, op: String },

    #[error("{field}: empty operator object")]
    OperatorEmpty { field: String },

    #[error("{field}: {op} requires {expected}, got {got}")]
    OperatorType {
        field: String,
        op: String,
        expected: String,
        got: String,
    },

    // ========================================================================
    // Query options
    // ========================================================================
    #[error("empty sort")]
    SortEmpty,

    #[error("{field}: invalid sort direction {value}")]
    SortInvalidValue { field: String, value: String },

    #[error("empty select")]
    SelectEmpty,

    #[error("where required")]
    WhereRequired,

    #[error("empty set")]
    SetEmpty,

    #[error("invalid limit {0}")]
    LimitInvalid(u64),

    // ========================================================================
    // Relations
    // ========================================================================
    #[error("{relation}: unknown relation on {store}")]
    RelationUnknown { store: String, relation: String },

    #[error("{relation}: {reason}")]
    RelationInvalid { relation: String, reason: String },

    #[error("relation loading requires {0} primary key")]
    RelationRequiresPk(RelationSide),

    // ========================================================================
    // Identifiers
    // ========================================================================
    #[error("invalid identifier {0}")]
    IdentifierInvalid(String),

    // ========================================================================
    // Engine
    // ========================================================================
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("{engine}: cannot decode {field}: {message}")]
    Decode {
        engine: &'static str,
        field: String,
        message: String,
    },

    #[error("{engine} error: {source}")]
    Backend {
        engine: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl QuarryError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::DbMissing => "db_missing",
            Self::StoreNameRequired => "store_name_required",
            Self::UnregisteredSchema(_) => "unregistered_schema",
            Self::RecordNotFound { .. } => "record_not_found",
            Self::PkUndefined { .. } => "pk_undefined",
            Self::PkImmutable { .. } => "pk_immutable",
            Self::PkDuplicate { .. } => "pk_duplicate",
            Self::PkInvalid { .. } => "pk_invalid",
            Self::PkRequired { .. } => "pk_required",
            Self::PkMultiple { .. } => "pk_multiple",
            Self::PkExhausted { .. } => "pk_exhausted",
            Self::FieldUnknown { .. } => "field_unknown",
            Self::FieldDuplicate { .. } => "field_duplicate",
            Self::FieldRequired { .. } => "field_required",
            Self::NullNotAllowed { .. } => "null_not_allowed",
            Self::ValueInvalid { .. } => "value_invalid",
            Self::OperatorUnknown { .. } => "operator_unknown",
            Self::OperatorEmpty { .. } => "operator_empty",
            Self::OperatorType { .. } => "operator_type",
            Self::SortEmpty => "sort_empty",
            Self::SortInvalidValue { .. } => "sort_invalid_value",
            Self::SelectEmpty => "select_empty",
            Self::WhereRequired => "where_required",
            Self::SetEmpty => "set_empty",
            Self::LimitInvalid(_) => "limit_invalid",
            Self::RelationUnknown { .. } => "relation_unknown",
            Self::RelationInvalid { .. } => "relation_invalid",
            Self::RelationRequiresPk(_) => "relation_requires_pk",
            Self::IdentifierInvalid(_) => "identifier_invalid",
            Self::Connection(_) => "connection",
            Self::Decode { .. } => "decode",
            Self::Backend { .. } => "backend",
        }
    }

    /// True only for a missing record looked up by primary key
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }

    /// Wrap a driver error without altering it
    pub fn backend<E>(engine: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            engine,
            source: Box::new(source),
        }
    }

    pub(crate) fn unknown_field(field: impl Into<String>, context: FieldContext) -> Self {
        Self::FieldUnknown {
            field: field.into(),
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(QuarryError::SetEmpty.code(), "set_empty");
        assert_eq!(
            QuarryError::RelationRequiresPk(RelationSide::Target).code(),
            "relation_requires_pk"
        );
        assert_eq!(
            QuarryError::unknown_field("bogus", FieldContext::Sort).code(),
            "field_unknown"
        );
    }

    #[test]
    fn messages_name_the_offender() {
        let err = QuarryError::OperatorUnknown {
            field: "age".into(),
            op: "$like".into(),
        };
        assert_eq!(err.to_string(), "age: unknown operator $like");

        let err = QuarryError::RelationRequiresPk(RelationSide::Parent);
        assert_eq!(err.to_string(), "relation loading requires parent primary key");
    }

    #[test]
    fn only_record_not_found_is_flagged() {
        let missing = QuarryError::RecordNotFound {
            field: "id".into(),
            value: "7".into(),
        };
        assert!(missing.is_not_found());
        assert!(!QuarryError::DbMissing.is_not_found());
    }
}
