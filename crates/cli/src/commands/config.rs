use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use deskline_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", &["DESKLINE_DATABASE_URL"]),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", &["DESKLINE_DATABASE_MAX_CONNECTIONS"]),
    ));

    lines.push(render_line(
        "llm.base_url",
        &config.llm.base_url,
        source("llm.base_url", &["DESKLINE_LLM_BASE_URL"]),
    ));
    lines.push(render_line("llm.model", &config.llm.model, source("llm.model", &["DESKLINE_LLM_MODEL"])));
    let llm_api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line(
        "llm.api_key",
        llm_api_key,
        source("llm.api_key", &["DESKLINE_LLM_API_KEY", "OPENAI_API_KEY"]),
    ));
    lines.push(render_line(
        "llm.timeout_secs",
        &config.llm.timeout_secs.to_string(),
        source("llm.timeout_secs", &["DESKLINE_LLM_TIMEOUT_SECS"]),
    ));

    lines.push(render_line(
        "cache.ttl_seconds",
        &config.cache.ttl_seconds.to_string(),
        source("cache.ttl_seconds", &["DESKLINE_CACHE_TTL_SECONDS"]),
    ));
    lines.push(render_line(
        "cache.maxsize",
        &config.cache.maxsize.to_string(),
        source("cache.maxsize", &["DESKLINE_CACHE_MAXSIZE"]),
    ));

    lines.push(render_line(
        "limiter.rpm",
        &config.limiter.rpm.to_string(),
        source("limiter.rpm", &["DESKLINE_LIMITER_RPM"]),
    ));
    lines.push(render_line(
        "limiter.burst",
        &config.limiter.burst.map(|burst| burst.to_string()).unwrap_or_else(|| "<rpm>".to_string()),
        source("limiter.burst", &["DESKLINE_LIMITER_BURST"]),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", &["DESKLINE_SERVER_BIND_ADDRESS"]),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", &["DESKLINE_SERVER_PORT"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["DESKLINE_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["DESKLINE_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("deskline.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/deskline.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    for env_key in env_keys {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
