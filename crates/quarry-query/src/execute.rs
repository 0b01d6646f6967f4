//! Relation-aware reads over any SQL executor
//!
//! SQL adapters implement [`Executor`] for their driver; [`read_rows`]
//! then picks the joined or phased plan and assembles nested records the
//! same way for every engine.

use crate::compile::Compiler;
use crate::render::{Dialect, Rendered};
use async_trait::async_trait;
use quarry_core::relation::{self, Phase};
use quarry_core::{As, ReadArgs, Record, Result};
use tracing::debug;

/// Statement execution for one SQL engine
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run a row-returning statement, decoding rows by `rendered.columns`
    async fn fetch(&self, table: &str, rendered: Rendered) -> Result<Vec<Record>>;

    /// Run a `COUNT(*)` statement
    async fn count(&self, table: &str, rendered: Rendered) -> Result<u64>;

    /// Run a statement, returning affected rows
    async fn execute(&self, table: &str, rendered: Rendered) -> Result<u64>;
}

/// Read `args` from `target`, loading relations joined or phased
pub async fn read_rows<D, E>(
    dialect: &D,
    executor: &E,
    target: &As,
    args: ReadArgs,
) -> Result<Vec<Record>>
where
    D: Dialect + ?Sized,
    E: Executor + ?Sized,
{
    let compiler = Compiler::new(dialect);

    if args.with.is_empty() {
        let rendered = compiler.select(
            target,
            &args.criteria,
            args.fields.as_deref(),
            args.sort.as_ref(),
            args.limit,
        )?;
        return executor.fetch(&target.name, rendered).await;
    }

    if relation::joinable(target, &args.with) {
        if let Some((name, relation)) = args.with.first() {
            debug!(engine = dialect.name(), table = %target.name, relation = %name, "joined read");
            let (rendered, aliases) = compiler.joined(target, &args, relation)?;
            let rows = executor.fetch(&target.name, rendered).await?;
            return relation::nest(
                target,
                args.fields.as_deref(),
                name,
                relation,
                &aliases,
                rows,
            );
        }
    }

    debug!(
        engine = dialect.name(),
        table = %target.name,
        relations = args.with.len(),
        "phased read"
    );
    let fields = relation::expand(target, args.fields.as_deref(), &args.with);
    let base = compiler.select(
        target,
        &args.criteria,
        fields.as_deref(),
        args.sort.as_ref(),
        args.limit,
    )?;
    let rows = executor.fetch(&target.name, base).await?;
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
        let rendered = compiler.related(&phase, &keys)?;
        let related = executor.fetch(&relation.target.name, rendered).await?;
        phase.attach(&rows, &mut out, related);
    }
    Ok(out)
}
