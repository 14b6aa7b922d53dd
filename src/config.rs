use std::{collections::HashMap, fs, path::{Path, PathBuf}};

use serde::{Deserialize, Serialize};
use toml::Value;

use crate::controller::StalePolicy;

pub const API_URL_ENV: &str = "HOUSE_PREDICTOR_API_URL";
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    pub api_url: String,
    pub window_size_startup: [f32; 2],
    pub start_in_fullscreen: bool,
    pub discard_stale_responses: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            window_size_startup: [1100.0, 760.0],
            start_in_fullscreen: false,
            discard_stale_responses: false,
        }
    }
}

impl Config {
    pub fn stale_policy(&self) -> StalePolicy {
        if self.discard_stale_responses {
            StalePolicy::LatestRequestWins
        } else {
            StalePolicy::LastResolvedWins
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("predictor_data").join("userconfig.toml")
}

/// Reads a TOML config file and flattens every scalar and array into strings.
/// If parsing fails, falls back to line-by-line `key = value` extraction.
fn read_config(path: &Path) -> HashMap<String, String> {
    let contents = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            log::info!("no readable config at {} ({}), using defaults", path.display(), e);
            String::new()
        }
    };
    let mut config = HashMap::new();

    match contents.parse::<toml::Table>() {
        Ok(table) => {
            fn extract_values(value: &Value, prefix: &str, config: &mut HashMap<String, String>) {
                match value {
                    Value::Table(table) => {
                        for (k, v) in table {
                            let new_prefix = if prefix.is_empty() { k.clone() } else { format!("{}.{}", prefix, k) };
                            extract_values(v, &new_prefix, config);
                        }
                    }
                    Value::Array(arr) => {
                        let items: Vec<String> = arr
                            .iter()
                            .filter_map(|item| match item {
                                Value::Integer(i) => Some(i.to_string()),
                                Value::Float(f) => Some(f.to_string()),
                                _ => None,
                            })
                            .collect();
                        config.insert(prefix.to_string(), format!("[{}]", items.join(", ")));
                    }
                    Value::String(s) => { config.insert(prefix.to_string(), s.clone()); }
                    Value::Integer(i) => { config.insert(prefix.to_string(), i.to_string()); }
                    Value::Float(f) => { config.insert(prefix.to_string(), f.to_string()); }
                    Value::Boolean(b) => { config.insert(prefix.to_string(), b.to_string()); }
                    Value::Datetime(_) => {}
                }
            }

            for (k, v) in &table {
                extract_values(v, k, &mut config);
            }
        }
        Err(e) => {
            log::warn!("config at {} is not valid TOML ({}), salvaging line by line", path.display(), e);

            for line in contents.lines() {
                let line = strip_comment(line).trim();
                let Some((key, value)) = line.split_once('=') else { continue };
                let (key, value) = (key.trim(), value.trim());

                let parsed_value = if value.len() > 1
                    && ((value.starts_with('"') && value.ends_with('"'))
                        || (value.starts_with('\'') && value.ends_with('\'')))
                {
                    value[1..value.len() - 1].to_string()
                } else if value.parse::<f64>().is_ok() || value.parse::<bool>().is_ok() {
                    value.to_string()
                } else if value.starts_with('[') && value.ends_with(']') {
                    value.to_string()
                } else {
                    continue;
                };

                config.insert(key.to_string(), parsed_value);
            }
        }
    }

    config
}

/// Cuts a trailing `#` comment, leaving `#` inside quoted strings alone.
fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    for (idx, ch) in line.char_indices() {
        match (quote, ch) {
            (None, '"' | '\'') => quote = Some(ch),
            (Some(open), _) if ch == open => quote = None,
            (None, '#') => return &line[..idx],
            _ => {}
        }
    }
    line
}

fn parse_pair(text: &str) -> Option<[f32; 2]> {
    let nums = text
        .trim_matches(|c| c == '[' || c == ']')
        .split(',')
        .map(|s| s.trim().parse::<f32>().ok())
        .collect::<Option<Vec<_>>>()?;

    match nums.as_slice() {
        [w, h] => Some([*w, *h]),
        _ => None,
    }
}

/// Builds the config from the file at `path` and an optional env override
/// for the base URL. Keys that are missing or unusable fall back to defaults.
pub fn resolve_config(path: &Path, env_api_url: Option<String>) -> Config {
    let extracted = read_config(path);
    let defaults = Config::default();

    let file_api_url = extracted
        .get("api_url")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let api_url = match env_api_url.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        Some(url) => {
            log::info!("using {} from {}", url, API_URL_ENV);
            url
        }
        None => file_api_url.unwrap_or(defaults.api_url),
    };

    Config {
        api_url,
        window_size_startup: extracted
            .get("window_size_startup")
            .and_then(|v| parse_pair(v))
            .filter(|v| !v.iter().any(|x| x < &200.0))
            .unwrap_or(defaults.window_size_startup),
        start_in_fullscreen: extracted
            .get("start_in_fullscreen")
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(defaults.start_in_fullscreen),
        discard_stale_responses: extracted
            .get("discard_stale_responses")
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(defaults.discard_stale_responses),
    }
}

/// Reads the user config once at startup and writes back a normalized copy
/// so every key is present for the user to edit. The env override is not
/// written back.
pub fn get_check_and_set_config(path: &Path) -> Config {
    let config = resolve_config(path, std::env::var(API_URL_ENV).ok());
    let persisted = resolve_config(path, None);

    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    match toml::to_string(&persisted) {
        Ok(toml_string) => {
            if let Err(e) = fs::write(path, toml_string) {
                log::warn!("could not write config to {}: {}", path.display(), e);
            }
        }
        Err(e) => log::warn!("could not serialize config: {}", e),
    }

    config
}
