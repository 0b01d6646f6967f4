//! Record schemas
//!
//! A [`Schema`] is an ordered field map with at most one primary key, plus
//! the relations its records can load. Relations name their target by the
//! store name it is registered under in a [`Catalog`](crate::store::Catalog).

use crate::datatype::DataType;
use crate::error::{QuarryError, Result};
use crate::ident;
use indexmap::IndexMap;
use tracing::warn;

/// A declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub datatype: DataType,
    pub nullable: bool,
    pub primary: bool,
}

impl Field {
    pub fn required(datatype: DataType) -> Self {
        Self {
            datatype,
            nullable: false,
            primary: false,
        }
    }

    pub fn optional(datatype: DataType) -> Self {
        Self {
            datatype,
            nullable: true,
            primary: false,
        }
    }

    pub fn primary(datatype: DataType) -> Self {
        Self {
            datatype,
            nullable: false,
            primary: true,
        }
    }
}

/// Relation cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    One,
    Many,
}

/// A relation declared on a schema
///
/// Without `reverse`, `fk` lives on the target and points at this record's
/// primary key. With `reverse`, `fk` lives on this record and points at the
/// target's primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    pub kind: Kind,
    pub target: String,
    pub fk: String,
    pub reverse: bool,
}

impl RelationDef {
    /// Target rows carry `fk` pointing back here
    pub fn many(target: impl Into<String>, fk: impl Into<String>) -> Self {
        Self {
            kind: Kind::Many,
            target: target.into(),
            fk: fk.into(),
            reverse: false,
        }
    }

    /// A single target row carries `fk` pointing back here
    pub fn one(target: impl Into<String>, fk: impl Into<String>) -> Self {
        Self {
            kind: Kind::One,
            target: target.into(),
            fk: fk.into(),
            reverse: false,
        }
    }

    /// This record carries `fk` pointing at the target
    pub fn belongs_to(target: impl Into<String>, fk: impl Into<String>) -> Self {
        Self {
            kind: Kind::One,
            target: target.into(),
            fk: fk.into(),
            reverse: true,
        }
    }
}

/// Field set of a store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: IndexMap<String, Field>,
    relations: IndexMap<String, RelationDef>,
    pk: Option<String>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Field)> {
        self.fields.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn pk(&self) -> Option<&str> {
        self.pk.as_deref()
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.get(name)
    }

    pub fn relations(&self) -> impl Iterator<Item = (&String, &RelationDef)> {
        self.relations.iter()
    }

    /// Field name → datatype, in declaration order
    pub fn types(&self) -> IndexMap<String, DataType> {
        self.fields
            .iter()
            .map(|(name, field)| (name.clone(), field.datatype))
            .collect()
    }
}

/// Builder for [`Schema`]
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: Vec<(String, Field)>,
    relations: Vec<(String, RelationDef)>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn primary(mut self, name: impl Into<String>, datatype: DataType) -> Self {
        self.fields.push((name.into(), Field::primary(datatype)));
        self
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, datatype: DataType) -> Self {
        self.fields.push((name.into(), Field::required(datatype)));
        self
    }

    #[must_use]
    pub fn optional(mut self, name: impl Into<String>, datatype: DataType) -> Self {
        self.fields.push((name.into(), Field::optional(datatype)));
        self
    }

    #[must_use]
    pub fn relation(mut self, name: impl Into<String>, relation: RelationDef) -> Self {
        self.relations.push((name.into(), relation));
        self
    }

    /// Validate names and the primary key, producing the schema
    ///
    /// `name` is the store name, used in error messages.
    pub fn build(self, name: &str) -> Result<Schema> {
        let mut schema = Schema::default();

        for (field, declared) in self.fields {
            ident::validate(&field)?;
            if declared.primary {
                if let Some(first) = &schema.pk {
                    return Err(QuarryError::PkMultiple {
                        store: name.to_string(),
                        first: first.clone(),
                        second: field,
                    });
                }
                if !declared.datatype.is_generatable_pk() {
                    return Err(QuarryError::PkInvalid {
                        field,
                        datatype: declared.datatype.name().to_string(),
                    });
                }
                if !declared.datatype.is_recommended_pk() {
                    warn!(
                        store = name,
                        field = %field,
                        datatype = %declared.datatype,
                        "primary key should be string, u16, u32, u64 or u128"
                    );
                }
                schema.pk = Some(field.clone());
            }
            if schema.fields.insert(field.clone(), declared).is_some() {
                return Err(QuarryError::FieldDuplicate {
                    field,
                    context: crate::error::FieldContext::Insert,
                });
            }
        }

        for (relation_name, relation) in self.relations {
            ident::validate(&relation_name)?;
            ident::validate(&relation.target)?;
            ident::validate(&relation.fk)?;
            if schema.fields.contains_key(&relation_name) {
                return Err(QuarryError::FieldDuplicate {
                    field: relation_name,
                    context: crate::error::FieldContext::Select,
                });
            }
            if relation.reverse && relation.kind == Kind::Many {
                return Err(QuarryError::RelationInvalid {
                    relation: relation_name,
                    reason: "many relations cannot be reversed".to_string(),
                });
            }
            schema.relations.insert(relation_name, relation);
        }

        Ok(schema)
    }
}
