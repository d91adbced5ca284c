//! Environment variable interpolation for config files.
//!
//! Credentials are never written into the YAML itself; the config references
//! them and they are resolved here, once, at load time:
//! - `$VAR` or `${VAR}` - substitute with env var value, error if missing
//! - `${VAR:-default}` - use default if VAR is unset OR empty
//! - `${VAR-default}` - use default only if VAR is unset (empty is OK)
//! - `$$` - escape sequence for literal `$`

use regex::{Captures, Regex};
use std::env;
use std::sync::LazyLock;

use crate::error::ConfigError;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$                           # escaped dollar
        |
        \$\{
            ([A-Za-z_][A-Za-z0-9_]*)   # 1: braced name
            (?:(:?-)([^}]*))?          # 2: default operator, 3: default value
        \}
        |
        \$([A-Za-z_][A-Za-z0-9_]*)     # 4: bare name
        ",
    )
    .expect("interpolation pattern is valid")
});

/// How a `${VAR...}` reference falls back when the variable is not usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fallback<'a> {
    None,
    /// `${VAR-default}`
    IfUnset(&'a str),
    /// `${VAR:-default}`
    IfUnsetOrEmpty(&'a str),
}

fn resolve(name: &str, fallback: Fallback<'_>) -> Result<String, String> {
    match (env::var(name), fallback) {
        (Ok(value), _) if value.contains(['\n', '\r']) => Err(format!(
            "environment variable '{name}' contains newlines, which is not allowed"
        )),
        (Ok(value), Fallback::IfUnsetOrEmpty(default)) if value.is_empty() => {
            Ok(default.to_string())
        }
        (Ok(value), _) => Ok(value),
        (Err(_), Fallback::IfUnset(default) | Fallback::IfUnsetOrEmpty(default)) => {
            Ok(default.to_string())
        }
        (Err(_), Fallback::None) => Err(format!("environment variable '{name}' is not set")),
    }
}

/// Interpolate environment variables in the given text.
///
/// All failures are collected so the user sees every missing variable at once.
pub fn interpolate(input: &str) -> Result<String, ConfigError> {
    let mut errors = Vec::new();

    let text = ENV_VAR_PATTERN.replace_all(input, |caps: &Captures| {
        let full_match = &caps[0];
        if full_match == "$$" {
            return "$".to_string();
        }

        let name = caps
            .get(1)
            .or_else(|| caps.get(4))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let default = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
        let fallback = match caps.get(2).map(|m| m.as_str()) {
            Some(":-") => Fallback::IfUnsetOrEmpty(default),
            Some(_) => Fallback::IfUnset(default),
            None => Fallback::None,
        };

        resolve(name, fallback).unwrap_or_else(|message| {
            errors.push(message);
            full_match.to_string()
        })
    });

    if errors.is_empty() {
        Ok(text.into_owned())
    } else {
        Err(ConfigError::EnvInterpolation {
            message: errors.join("\n"),
        })
    }
}
