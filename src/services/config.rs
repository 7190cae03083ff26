// App configuration
// Where the store snapshot lives and how logging is filtered

use std::path::PathBuf;

use super::test_store::STORE_KEY;

pub const STORE_PATH_ENV: &str = "QUIZFORGE_STORE_PATH";
pub const DEFAULT_LOG_FILTER: &str = "quizforge=info";
const APP_DIR: &str = "quizforge";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub store_path: PathBuf,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let store_path = lookup(STORE_PATH_ENV)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_store_path);

        let log_filter = lookup("RUST_LOG")
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Self {
            store_path,
            log_filter,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// `<data dir>/quizforge/tests-store.json`, relative to the working
/// directory when the platform has no data dir.
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(format!("{}.json", STORE_KEY))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[]));
        assert_eq!(config, AppConfig::default());
        assert!(config.store_path.ends_with("quizforge/tests-store.json"));
        assert_eq!(config.log_filter, "quizforge=info");
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("QUIZFORGE_STORE_PATH", "/tmp/store.json"),
            ("RUST_LOG", "quizforge=debug"),
        ]));
        assert_eq!(config.store_path, PathBuf::from("/tmp/store.json"));
        assert_eq!(config.log_filter, "quizforge=debug");
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = AppConfig::from_lookup(lookup(&[("QUIZFORGE_STORE_PATH", "  "), ("RUST_LOG", "")]));
        assert_eq!(config, AppConfig::default());
    }
}
