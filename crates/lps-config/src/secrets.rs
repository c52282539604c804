//! Runtime secret resolution.
//!
//! Config YAML stores only env var NAMES. Callers invoke [`resolve_secrets`]
//! once at startup and pass the result into constructors. Error messages
//! name the variable, never its value.

use anyhow::{bail, Result};
use serde_json::Value;

use crate::publish::DEFAULT_PRIVATE_KEY_ENV;

/// Secrets resolved from the environment. Redacted in `Debug` output.
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Env var the key was read from.
    pub private_key_var: String,
    /// Hex ed25519 private key. `None` if the env var was absent or empty.
    pub private_key: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("private_key_var", &self.private_key_var)
            .field("private_key", &self.private_key.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Resolve the signing key named by `/keys_env/private_key`.
///
/// `require_key` is set by commands that sign; a missing key is then an
/// error naming the env var.
pub fn resolve_secrets(config_json: &Value, require_key: bool) -> Result<ResolvedSecrets> {
    let private_key_var = read_str_at(config_json, "/keys_env/private_key")
        .unwrap_or_else(|| DEFAULT_PRIVATE_KEY_ENV.to_string());
    let private_key = resolve_env(&private_key_var);

    if require_key && private_key.is_none() {
        bail!(
            "SECRETS_MISSING: required env var '{}' (ed25519 private key) is not set or empty",
            private_key_var
        );
    }

    Ok(ResolvedSecrets {
        private_key_var,
        private_key,
    })
}
