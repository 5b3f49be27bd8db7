use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_TIMEOUT_SECS: u64 = 15;

/// Connection settings for the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

/// Process configuration, read once at startup and handed to constructors.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    /// `None` keeps tasks in process memory.
    pub redis_url: Option<String>,
    /// `None` disables the AI parser.
    pub gemini: Option<GeminiConfig>,
    /// Enables the demo login.
    pub dev_mode: bool,
    pub static_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let gemini = get("GEMINI_API_KEY").map(|api_key| {
            let timeout = match get("GEMINI_TIMEOUT_SECS") {
                Some(raw) => raw.parse().unwrap_or_else(|_| {
                    warn!("Invalid GEMINI_TIMEOUT_SECS '{}', using default", raw);
                    DEFAULT_GEMINI_TIMEOUT_SECS
                }),
                None => DEFAULT_GEMINI_TIMEOUT_SECS,
            };
            GeminiConfig {
                api_key,
                model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                base_url: get("GEMINI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
                timeout: Duration::from_secs(timeout),
            }
        });

        let dev_mode = get("GOOGLE_CLIENT_ID").is_none()
            || get("APP_ENV").is_some_and(|env| env == "development");

        Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            redis_url: get("REDIS_URL"),
            gemini,
            dev_mode,
            static_dir: get("STATIC_DIR").map(PathBuf::from),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
