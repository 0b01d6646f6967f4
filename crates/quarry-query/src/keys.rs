//! Primary key assignment on insert

use crate::compile::Compiler;
use crate::execute::Executor;
use crate::render::{is_auto_increment, Dialect};
use quarry_core::{sortable, As, DataType, QuarryError, Record, Result, Value};
use uuid::Uuid;

/// How an insert gets its primary key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPlan {
    /// The store has no primary key
    None,
    /// The record carries one
    Given,
    /// Random UUID string
    Uuid,
    /// The engine assigns it; read it back after the insert
    Auto,
    /// `MAX(pk) + 1`, computed by a separate query
    Max,
}

/// Decide how `record` gets its key in `target`
///
/// Fails with `pk_required` when the key is missing and generation is off.
pub fn plan(target: &As, record: &Record) -> Result<KeyPlan> {
    let Some(pk) = target.pk.as_deref() else {
        return Ok(KeyPlan::None);
    };
    if record.get(pk).is_some_and(|v| !v.is_null()) {
        return Ok(KeyPlan::Given);
    }
    if !target.generate_pk {
        return Err(QuarryError::PkRequired {
            store: target.name.clone(),
        });
    }
    match target.pk_type() {
        Some(DataType::String) => Ok(KeyPlan::Uuid),
        Some(t) if is_auto_increment(t) => Ok(KeyPlan::Auto),
        Some(t) if t.is_integer() => Ok(KeyPlan::Max),
        Some(t) => Err(QuarryError::PkInvalid {
            field: pk.to_string(),
            datatype: t.name().to_string(),
        }),
        None => Err(QuarryError::PkUndefined {
            store: target.name.clone(),
        }),
    }
}

/// Fill in the key of `record` when it is generated before the insert
///
/// Returns the plan; for [`KeyPlan::Auto`] the caller reads the key back
/// from the engine after inserting.
pub async fn assign<D, E>(
    dialect: &D,
    executor: &E,
    target: &As,
    record: &mut Record,
) -> Result<KeyPlan>
where
    D: Dialect + ?Sized,
    E: Executor + ?Sized,
{
    let plan = plan(target, record)?;
    let (Some(pk), Some(datatype)) = (target.pk.as_deref(), target.pk_type()) else {
        return Ok(plan);
    };
    match plan {
        KeyPlan::Uuid => {
            record.insert(pk, Uuid::new_v4().to_string());
        }
        KeyPlan::Max => {
            let rendered = Compiler::new(dialect).max_key(target)?;
            let rows = executor.fetch(&target.name, rendered).await?;
            let max = rows.first().and_then(|row| row.get(pk));
            let next = sortable::next_key(&target.name, datatype, max)?;
            record.insert(pk, next);
        }
        KeyPlan::None | KeyPlan::Given | KeyPlan::Auto => {}
    }
    Ok(plan)
}

/// Conform an engine-assigned key to the key datatype
pub fn assigned(target: &As, id: i64) -> Result<Value> {
    let pk = target.pk.as_deref().unwrap_or_default();
    let datatype = target.pk_type().ok_or_else(|| QuarryError::PkUndefined {
        store: target.name.clone(),
    })?;
    Value::Int(i128::from(id)).conform(pk, datatype)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::{record, Schema};
    use test_case::test_case;

    fn target(datatype: DataType, generate_pk: bool) -> As {
        let schema = Schema::builder()
            .primary("id", datatype)
            .field("name", DataType::String)
            .build("items")
            .unwrap();
        As::new("items", &schema, generate_pk)
    }

    #[test_case(DataType::String, KeyPlan::Uuid)]
    #[test_case(DataType::U8, KeyPlan::Auto)]
    #[test_case(DataType::I32, KeyPlan::Auto)]
    #[test_case(DataType::U64, KeyPlan::Max)]
    #[test_case(DataType::I128, KeyPlan::Max)]
    fn missing_keys(datatype: DataType, expected: KeyPlan) {
        let plan = plan(&target(datatype, true), &record! { "name" => "x" }).unwrap();
        assert_eq!(plan, expected);
    }

    #[test]
    fn given_keys_win() {
        let record = record! { "id" => 7u64, "name" => "x" };
        assert_eq!(plan(&target(DataType::U64, false), &record).unwrap(), KeyPlan::Given);
    }

    #[test]
    fn generation_can_be_disabled() {
        let err = plan(&target(DataType::U8, false), &record! { "name" => "x" }).unwrap_err();
        assert_eq!(err.code(), "pk_required");
    }
}
