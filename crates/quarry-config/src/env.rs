//! `{env:VAR}` references
//!
//! A string value that is exactly `{env:VAR}` is replaced by the value of
//! `VAR`. References are resolved everywhere in the document, inside
//! arrays and tables too. Every unset variable is reported, not just the
//! first.

use crate::error::ConfigError;
use tracing::{debug, warn};

const ENV_REF_PREFIX: &str = "{env:";
const ENV_REF_SUFFIX: &str = "}";

/// Variable named by `s`, if it is an env reference
fn env_var(s: &str) -> Option<&str> {
    s.strip_prefix(ENV_REF_PREFIX)?
        .strip_suffix(ENV_REF_SUFFIX)
        .filter(|name| !name.is_empty())
}

/// Replace every env reference in `value`
pub fn resolve(value: &mut toml::Value) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    resolve_into(value, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn resolve_into(value: &mut toml::Value, errors: &mut Vec<ConfigError>) {
    match value {
        toml::Value::String(s) => {
            let Some(var) = env_var(s) else { return };
            debug!(var, "resolving env reference");
            match std::env::var(var) {
                Ok(resolved) => *value = toml::Value::String(resolved),
                Err(_) => {
                    warn!(var, "environment variable not found");
                    errors.push(ConfigError::EnvVarNotFound {
                        var: var.to_string(),
                    });
                }
            }
        }
        toml::Value::Array(items) => {
            for item in items {
                resolve_into(item, errors);
            }
        }
        toml::Value::Table(table) => {
            for (_, item) in table.iter_mut() {
                resolve_into(item, errors);
            }
        }
        _ => {}
    }
}
