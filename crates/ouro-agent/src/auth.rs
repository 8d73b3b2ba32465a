//! Authentication for the generation provider
//!
//! The key is resolved once per session, in priority order:
//! 1. An explicit key handed over by the front end
//! 2. The environment variable named in `cascade.api_key_env`
//! 3. `GOOGLE_API_KEY`

use ouro_core::{OuroError, Result};
use std::env;

/// Fallback variable checked after the configured one
pub const FALLBACK_API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Resolve the provider API key
pub fn get_auth_token(explicit: Option<&str>, api_key_env: &str) -> Result<String> {
    if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        tracing::info!("Using API key supplied on the command line");
        return Ok(key.to_string());
    }

    for var in [api_key_env, FALLBACK_API_KEY_ENV] {
        if let Ok(key) = env::var(var) {
            if !key.trim().is_empty() {
                tracing::info!("Using API key from {}", var);
                return Ok(key.trim().to_string());
            }
        }
    }

    Err(OuroError::Auth(format!(
        "No API key found. Pass --api-key or set one of:\n\
         - {}=...\n\
         - {}=...",
        api_key_env, FALLBACK_API_KEY_ENV
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to prevent concurrent env var modifications
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env_vars<F, R>(vars: &[(&str, Option<&str>)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_LOCK.lock().unwrap();

        let originals: Vec<_> = vars.iter().map(|(k, _)| (*k, env::var(k).ok())).collect();

        for (key, value) in vars {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }

        let result = f();

        for (key, original) in originals {
            match original {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }

        result
    }

    #[test]
    fn test_explicit_key_wins() {
        with_env_vars(&[("OURO_TEST_KEY", Some("from-env"))], || {
            let token = get_auth_token(Some("from-flag"), "OURO_TEST_KEY").unwrap();
            assert_eq!(token, "from-flag");
        });
    }

    #[test]
    fn test_configured_env_var() {
        with_env_vars(
            &[
                ("OURO_TEST_KEY", Some("from-env")),
                (FALLBACK_API_KEY_ENV, Some("fallback")),
            ],
            || {
                let token = get_auth_token(None, "OURO_TEST_KEY").unwrap();
                assert_eq!(token, "from-env");
            },
        );
    }

    #[test]
    fn test_fallback_env_var() {
        with_env_vars(
            &[
                ("OURO_TEST_KEY", None),
                (FALLBACK_API_KEY_ENV, Some("fallback")),
            ],
            || {
                let token = get_auth_token(Some("   "), "OURO_TEST_KEY").unwrap();
                assert_eq!(token, "fallback");
            },
        );
    }

    #[test]
    fn test_no_auth() {
        with_env_vars(
            &[("OURO_TEST_KEY", None), (FALLBACK_API_KEY_ENV, None)],
            || {
                let result = get_auth_token(None, "OURO_TEST_KEY");
                assert!(matches!(result, Err(OuroError::Auth(_))));
            },
        );
    }
}
