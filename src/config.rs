use std::env;
use std::str::FromStr;
use std::time::Duration;

use log::{info, warn};

/// Variables the application needs for a fully working deployment.
pub const REQUIRED_VARS: [&str; 4] = [
    "SESSION_SECRET",
    "GOOGLE_CLIENT_ID",
    "GOOGLE_CLIENT_SECRET",
    "OPENAI_API_KEY",
];

/// Whether the `/chat` route guard redirects unauthenticated visitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardMode {
    Enforce,
    Off,
}

impl FromStr for GuardMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enforce" | "on" | "true" => Ok(GuardMode::Enforce),
            "off" | "false" | "disabled" => Ok(GuardMode::Off),
            other => Err(format!("unknown guard mode '{}'", other)),
        }
    }
}

/// Process configuration, read once at startup and handed to every component
/// that needs it.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub base_url: String,
    pub session_secret: Option<String>,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub model_name: String,
    /// Skips the session check on the chat endpoint and the `/chat` guard.
    /// Local development only.
    pub permissive_mode: bool,
    pub chat_guard: GuardMode,
    pub max_duration: Duration,
    pub templates_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            session_secret: None,
            google_client_id: None,
            google_client_secret: None,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com".to_string(),
            model_name: "gpt-4o".to_string(),
            permissive_mode: false,
            chat_guard: GuardMode::Enforce,
            max_duration: Duration::from_secs(30),
            templates_dir: "templates".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. `from_env` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let base_url = get("BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);
        info!("Using base URL: {}", base_url);

        let permissive_mode = parse_or(get("PERMISSIVE_MODE"), "PERMISSIVE_MODE", false);
        if permissive_mode {
            warn!("Permissive mode enabled: chat requests are accepted without a session");
        }

        Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_or(get("PORT"), "PORT", defaults.port),
            base_url,
            session_secret: get("SESSION_SECRET"),
            google_client_id: get("GOOGLE_CLIENT_ID"),
            google_client_secret: get("GOOGLE_CLIENT_SECRET"),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.openai_base_url),
            model_name: get("OPENAI_MODEL").unwrap_or(defaults.model_name),
            permissive_mode,
            chat_guard: parse_or(get("CHAT_GUARD"), "CHAT_GUARD", defaults.chat_guard),
            max_duration: Duration::from_secs(parse_or(
                get("MAX_DURATION_SECS"),
                "MAX_DURATION_SECS",
                defaults.max_duration.as_secs(),
            )),
            templates_dir: get("TEMPLATES_DIR").unwrap_or(defaults.templates_dir),
        }
    }

    /// Names of required variables that are not set.
    pub fn missing(&self) -> Vec<&'static str> {
        REQUIRED_VARS
            .iter()
            .copied()
            .filter(|name| !self.is_set(name))
            .collect()
    }

    pub fn is_set(&self, name: &str) -> bool {
        match name {
            "SESSION_SECRET" => self.session_secret.is_some(),
            "GOOGLE_CLIENT_ID" => self.google_client_id.is_some(),
            "GOOGLE_CLIENT_SECRET" => self.google_client_secret.is_some(),
            "OPENAI_API_KEY" => self.openai_api_key.is_some(),
            "BASE_URL" => true,
            _ => false,
        }
    }

    pub fn oauth_redirect_uri(&self) -> String {
        format!("{}/api/auth/callback/google", self.base_url)
    }

    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> T {
    match value {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!("Invalid {} value '{}', using default", key, raw);
                default
            }
        },
        None => default,
    }
}
