//! `${VAR}` expansion for string settings.
//!
//! `${VAR}` must be set; `${VAR:-fallback}` falls back when it isn't.
//! A bare `$VAR` is left alone so URLs containing `$` survive untouched.

use crate::ConfigError;

/// Lookup failure carrying the offending variable name.
struct UnsetVar {
    name: String,
}

/// Expand environment variable references in `value`.
///
/// `field` is the dotted config key, used only for the error message.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    let lookup = |name: &str| -> Result<Option<String>, UnsetVar> {
        std::env::var(name).map(Some).map_err(|_| UnsetVar {
            name: name.to_owned(),
        })
    };

    shellexpand::env_with_context(value, lookup)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{}}} not set", e.cause.name),
        })
}
