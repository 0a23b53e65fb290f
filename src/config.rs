//! Environment configuration, loaded once at process start.
//!
//! Variables may also come from a `.env` file in the working directory or
//! any parent; values already present in the environment win.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use chat_provider_api::{DEFAULT_BASE_URL, DEFAULT_MODEL};

pub const API_KEY_VAR: &str = "API_KEY";
pub const BASE_URL_VAR: &str = "BASE_URL";
pub const MODEL_VAR: &str = "DEFAULT_MODEL";
pub const TIMEOUT_VAR: &str = "AG_TIMEOUT_SECS";
pub const HOME_VAR: &str = "AG_HOME";
pub const EDITOR_VAR: &str = "EDITOR";
pub const SELECTOR_VAR: &str = "AG_SELECTOR";
pub const PROVIDER_VAR: &str = "AG_PROVIDER";
pub const LOG_VAR: &str = "AG_LOG";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_EDITOR: &str = "vi";
pub const DEFAULT_SELECTOR: &str = "fzf";
pub const DEFAULT_PROVIDER: &str = "api";
pub const DEFAULT_LOG_FILTER: &str = "warn";
const HOME_DIR_NAME: &str = ".ag";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    /// Bearer credential; `None` surfaces as a configuration error on first request.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    /// Store root holding `chats/`, `insn/` and the default-session pointer.
    pub home: PathBuf,
    pub editor: String,
    pub selector: String,
    pub provider: String,
    pub log_filter: String,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env_string_opt(API_KEY_VAR),
            base_url: env_string_opt(BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: env_string_opt(MODEL_VAR).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_secs(env_timeout_secs(TIMEOUT_VAR)),
            home: env_string_opt(HOME_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(default_home),
            editor: env_string_opt(EDITOR_VAR).unwrap_or_else(|| DEFAULT_EDITOR.to_string()),
            selector: env_string_opt(SELECTOR_VAR).unwrap_or_else(|| DEFAULT_SELECTOR.to_string()),
            provider: env_string_opt(PROVIDER_VAR).unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            log_filter: log_filter_from_env(),
        }
    }
}

/// Filter directive from `AG_LOG`. Read on its own so logging can be
/// installed before the rest of the configuration is parsed.
pub fn log_filter_from_env() -> String {
    env_string_opt(LOG_VAR).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

/// Loads the nearest `.env` file into the process environment. A missing
/// file is not an error.
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    absent_ok(dotenvy::dotenv())
}

pub fn load_dotenv_from(path: &Path) -> Result<Option<PathBuf>, dotenvy::Error> {
    absent_ok(dotenvy::from_path(path).map(|()| path.to_path_buf()))
}

fn absent_ok(loaded: Result<PathBuf, dotenvy::Error>) -> Result<Option<PathBuf>, dotenvy::Error> {
    match loaded {
        Ok(path) => Ok(Some(path)),
        Err(error) if error.not_found() => Ok(None),
        Err(error) => Err(error),
    }
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(HOME_DIR_NAME)
}

fn env_timeout_secs(key: &str) -> u64 {
    let Some(raw) = env_string_opt(key) else {
        return DEFAULT_TIMEOUT_SECS;
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => secs,
        _ => {
            tracing::warn!(
                value = %raw,
                default = DEFAULT_TIMEOUT_SECS,
                "ignoring invalid {key}"
            );
            DEFAULT_TIMEOUT_SECS
        }
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex, OnceLock};

    const ALL_VARS: [&str; 9] = [
        API_KEY_VAR,
        BASE_URL_VAR,
        MODEL_VAR,
        TIMEOUT_VAR,
        HOME_VAR,
        EDITOR_VAR,
        SELECTOR_VAR,
        PROVIDER_VAR,
        LOG_VAR,
    ];

    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.previous {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .expect("env lock poisoned")
    }

    fn set_env_guard(key: &'static str, value: Option<&str>) -> EnvGuard {
        let previous = env::var(key).ok();
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
        EnvGuard { key, previous }
    }

    fn clear_all() -> Vec<EnvGuard> {
        ALL_VARS
            .iter()
            .map(|key| set_env_guard(key, None))
            .collect()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let _lock = env_lock();
        let _guards = clear_all();

        let config = EnvConfig::from_env();
        assert_eq!(config.api_key, None);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(config.home.ends_with(HOME_DIR_NAME));
        assert_eq!(config.editor, DEFAULT_EDITOR);
        assert_eq!(config.selector, DEFAULT_SELECTOR);
        assert_eq!(config.provider, DEFAULT_PROVIDER);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let _lock = env_lock();
        let _guards = clear_all();
        let _g1 = set_env_guard(API_KEY_VAR, Some("sk-test"));
        let _g2 = set_env_guard(BASE_URL_VAR, Some("http://localhost:8080/v1"));
        let _g3 = set_env_guard(MODEL_VAR, Some("gpt-4o-mini"));
        let _g4 = set_env_guard(TIMEOUT_VAR, Some("5"));
        let _g5 = set_env_guard(HOME_VAR, Some("/tmp/ag-home"));
        let _g6 = set_env_guard(EDITOR_VAR, Some("nano"));

        let config = EnvConfig::from_env();
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.home, PathBuf::from("/tmp/ag-home"));
        assert_eq!(config.editor, "nano");
    }

    #[test]
    fn blank_values_count_as_unset() {
        let _lock = env_lock();
        let _guards = clear_all();
        let _g1 = set_env_guard(API_KEY_VAR, Some("   "));
        let _g2 = set_env_guard(MODEL_VAR, Some(""));

        let config = EnvConfig::from_env();
        assert_eq!(config.api_key, None);
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn invalid_timeout_falls_back_to_default() {
        let _lock = env_lock();
        let _guards = clear_all();

        for raw in ["zero", "0", "-3"] {
            let _g = set_env_guard(TIMEOUT_VAR, Some(raw));
            let config = EnvConfig::from_env();
            assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        }
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl CapturedLog {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("log buffer lock")).into_owned()
        }
    }

    impl io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("log buffer lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn invalid_timeout_warning_reaches_an_installed_subscriber() {
        let _lock = env_lock();
        let _guards = clear_all();
        let _g = set_env_guard(TIMEOUT_VAR, Some("zero"));

        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::with_default(subscriber, EnvConfig::from_env);

        let text = log.text();
        assert!(text.contains("ignoring invalid AG_TIMEOUT_SECS"), "{text}");
        assert!(text.contains("zero"), "{text}");
    }

    #[test]
    fn log_filter_is_readable_before_the_full_config() {
        let _lock = env_lock();
        let _guards = clear_all();
        assert_eq!(log_filter_from_env(), DEFAULT_LOG_FILTER);

        let _g = set_env_guard(LOG_VAR, Some(" session_store=debug "));
        assert_eq!(log_filter_from_env(), "session_store=debug");
        assert_eq!(EnvConfig::from_env().log_filter, "session_store=debug");
    }

    #[test]
    fn dotenv_file_fills_unset_variables_only() {
        let _lock = env_lock();
        let _guards = clear_all();
        let _g = set_env_guard(MODEL_VAR, Some("from-shell"));
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".env");
        std::fs::write(&path, "API_KEY=sk-from-file\nDEFAULT_MODEL=from-file\n").expect("write .env");

        let loaded = load_dotenv_from(&path).expect("load .env");

        assert_eq!(loaded.as_deref(), Some(path.as_path()));
        let config = EnvConfig::from_env();
        assert_eq!(config.api_key.as_deref(), Some("sk-from-file"));
        assert_eq!(config.model, "from-shell");
    }

    #[test]
    fn missing_dotenv_file_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loaded = load_dotenv_from(&dir.path().join(".env")).expect("absent file is fine");
        assert_eq!(loaded, None);
    }
}
