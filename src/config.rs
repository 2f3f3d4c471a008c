//! Runtime configuration read from the environment.
//!
//! - `POLYTENSOR_BACKEND` — default backend name (`numpy`, `jax`, ...).
//! - `POLYTENSOR_SEED` — initial RNG seed for host backends.
//!
//! Values that fail to parse are logged and ignored.

use crate::backend::{set_default_backend, BackendId};
use std::sync::OnceLock;

/// Environment variable naming the default backend.
pub const BACKEND_VAR: &str = "POLYTENSOR_BACKEND";

/// Environment variable holding the initial RNG seed.
pub const SEED_VAR: &str = "POLYTENSOR_SEED";

/// Settings that can be supplied from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
    /// Backend used when inference has nothing else to go on.
    pub default_backend: Option<BackendId>,
    /// Seed for the RNG state of newly loaded host backends.
    pub seed: Option<u64>,
}

impl Config {
    /// Reads both variables from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup, e.g. a map in tests.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default_backend = lookup(BACKEND_VAR).and_then(|raw| {
            raw.trim()
                .parse::<BackendId>()
                .map_err(|e| tracing::warn!("ignoring {}: {}", BACKEND_VAR, e))
                .ok()
        });
        let seed = lookup(SEED_VAR).and_then(|raw| {
            raw.trim()
                .parse::<u64>()
                .map_err(|e| tracing::warn!("ignoring {}='{}': {}", SEED_VAR, raw, e))
                .ok()
        });
        Self {
            default_backend,
            seed,
        }
    }

    /// Installs the configured default backend, if any.
    ///
    /// The seed is not applied here; host adapters pick it up when they load.
    pub fn apply(&self) {
        if let Some(b) = self.default_backend {
            set_default_backend(b);
        }
    }
}

fn env_config() -> &'static Config {
    static ENV: OnceLock<Config> = OnceLock::new();
    ENV.get_or_init(Config::from_env)
}

/// Default backend named by the environment, read once per process.
pub(crate) fn env_default_backend() -> Option<BackendId> {
    env_config().default_backend
}

/// Seed named by the environment, read once per process.
pub(crate) fn env_seed() -> Option<u64> {
    env_config().seed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parses_backend_and_seed() {
        let cfg = Config::from_lookup(lookup(&[(BACKEND_VAR, " jax "), (SEED_VAR, "42")]));
        assert_eq!(cfg.default_backend, Some(BackendId::Jax));
        assert_eq!(cfg.seed, Some(42));
    }

    #[test]
    fn garbage_is_ignored() {
        let cfg = Config::from_lookup(lookup(&[(BACKEND_VAR, "theano"), (SEED_VAR, "-1")]));
        assert_eq!(cfg, Config::default());
    }
}
