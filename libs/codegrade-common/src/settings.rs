// Runtime settings shared by the API and the CLI.
// Every value has a default and can be overridden from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_LANGUAGES_PATH: &str = "config/languages.json";

#[derive(Debug, Clone)]
pub struct Settings {
    pub languages_path: PathBuf,
    pub default_timeout: Duration,
    pub max_timeout: Duration,
    pub compile_timeout: Duration,
    pub work_root: PathBuf,
    pub max_source_bytes: usize,
    pub max_output_bytes: usize,
    pub max_concurrent_jobs: usize,
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            languages_path: PathBuf::from(DEFAULT_LANGUAGES_PATH),
            default_timeout: Duration::from_secs(5),
            max_timeout: Duration::from_secs(30),
            compile_timeout: Duration::from_secs(30),
            work_root: std::env::temp_dir(),
            max_source_bytes: 1024 * 1024,
            max_output_bytes: 8 * 1024 * 1024,
            max_concurrent_jobs: 4,
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Settings {
    /// Build settings from `CODEGRADE_*` environment variables.
    /// Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |name: &str, fallback: Duration| {
            env_parse::<u64>(name)
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };

        let (default_timeout, max_timeout) = bounded_timeouts(
            secs("CODEGRADE_DEFAULT_TIMEOUT_SECS", defaults.default_timeout),
            secs("CODEGRADE_MAX_TIMEOUT_SECS", defaults.max_timeout),
        );

        Self {
            languages_path: std::env::var("CODEGRADE_LANGUAGES")
                .map(PathBuf::from)
                .unwrap_or(defaults.languages_path),
            default_timeout,
            max_timeout,
            compile_timeout: secs("CODEGRADE_COMPILE_TIMEOUT_SECS", defaults.compile_timeout),
            work_root: std::env::var("CODEGRADE_WORK_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_root),
            max_source_bytes: env_parse("CODEGRADE_MAX_SOURCE_BYTES")
                .unwrap_or(defaults.max_source_bytes),
            max_output_bytes: env_parse("CODEGRADE_MAX_OUTPUT_BYTES")
                .unwrap_or(defaults.max_output_bytes),
            max_concurrent_jobs: env_parse("CODEGRADE_MAX_CONCURRENT_JOBS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
        }
    }
}

/// The fallback timeout must sit below the maximum; a pair that breaks this
/// is replaced by the built-in pair.
fn bounded_timeouts(default_timeout: Duration, max_timeout: Duration) -> (Duration, Duration) {
    if default_timeout < max_timeout {
        return (default_timeout, max_timeout);
    }

    let defaults = Settings::default();
    warn!(
        default_timeout_secs = default_timeout.as_secs(),
        max_timeout_secs = max_timeout.as_secs(),
        "Default timeout is not below the maximum; using built-in timeouts"
    );
    (defaults.default_timeout, defaults.max_timeout)
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
