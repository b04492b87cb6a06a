use std::env;
use std::time::Duration;

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub templates_dir: String,
    pub listen_addr: String,
    pub watch_templates: bool,
    pub reload_debounce: Duration,
    pub load_timeout: Duration,
    pub admin_token: String,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Self {
        Self {
            templates_dir: get_env("TEMPLATES_DIR", "/opt/unetlab/html/templates"),
            listen_addr: get_env("LISTEN_ADDR", "0.0.0.0:8080"),
            watch_templates: parse_bool(&get_env("WATCH_TEMPLATES", "true")).unwrap_or(true),
            reload_debounce: Duration::from_millis(
                get_env("RELOAD_DEBOUNCE_MS", "500").parse().unwrap_or(500),
            ),
            load_timeout: Duration::from_secs(
                get_env("LOAD_TIMEOUT_SECS", "10").parse().unwrap_or(10),
            ),
            admin_token: get_env("ADMIN_TOKEN", ""),
        }
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
