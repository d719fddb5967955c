use std::{fs, path::Path};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "planner.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub database_url: String,
    pub log_filter: String,
    /// Name of the list created when a user has none.
    pub default_list_name: String,
    pub board_title: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/planner.db".into(),
            log_filter: "info".into(),
            default_list_name: "My Tasks".into(),
            board_title: "My To-Do List".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    database_url: Option<String>,
    log_filter: Option<String>,
    default_list_name: Option<String>,
    board_title: Option<String>,
}

pub fn load_config() -> anyhow::Result<ClientConfig> {
    load_config_from(Path::new(DEFAULT_CONFIG_FILE), |key| std::env::var(key).ok())
}

/// File values override defaults; environment overrides both. A missing file is fine.
pub fn load_config_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig::default();

    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let file_cfg: FileConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
        if let Some(v) = file_cfg.database_url {
            config.database_url = v;
        }
        if let Some(v) = file_cfg.log_filter {
            config.log_filter = v;
        }
        if let Some(v) = file_cfg.default_list_name {
            config.default_list_name = v;
        }
        if let Some(v) = file_cfg.board_title {
            config.board_title = v;
        }
    }

    if let Some(v) = env("DATABASE_URL") {
        config.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        config.database_url = v;
    }
    if let Some(v) = env("APP__LOG") {
        config.log_filter = v;
    }
    if let Some(v) = env("APP__DEFAULT_LIST_NAME") {
        if !v.trim().is_empty() {
            config.default_list_name = v;
        }
    }

    config.database_url = normalize_database_url(&config.database_url);
    Ok(config)
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return ClientConfig::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite:{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let dir = env::temp_dir().join(format!("planner_config_{tag}_{suffix}"));
        fs::create_dir_all(&dir).expect("temp dir");
        dir
    }

    #[test]
    fn normalizes_plain_file_path_to_sqlite_url() {
        assert_eq!(
            normalize_database_url("./data/test.db"),
            "sqlite://./data/test.db"
        );
    }

    #[test]
    fn keeps_windows_absolute_path_with_single_sqlite_colon() {
        assert_eq!(
            normalize_database_url("sqlite:C:\\Users\\alice\\test.db"),
            "sqlite:C:/Users/alice/test.db"
        );
    }

    #[test]
    fn blank_url_falls_back_to_default() {
        assert_eq!(
            normalize_database_url("   "),
            ClientConfig::default().database_url
        );
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = temp_dir("missing");
        let config = load_config_from(&dir.join("planner.toml"), |_| None).expect("config");
        assert_eq!(config, ClientConfig::default());
        fs::remove_dir_all(dir).expect("cleanup");
    }

    #[test]
    fn environment_overrides_file_values() {
        let dir = temp_dir("override");
        let path = dir.join("planner.toml");
        fs::write(
            &path,
            "database_url = \"./from-file.db\"\ndefault_list_name = \"Inbox\"\nlog_filter = \"debug\"\n",
        )
        .expect("write config");

        let env_vars: HashMap<&str, &str> = HashMap::from([("APP__DATABASE_URL", "sqlite::memory:")]);
        let config = load_config_from(&path, |key| env_vars.get(key).map(|v| v.to_string()))
            .expect("config");

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.default_list_name, "Inbox");
        assert_eq!(config.log_filter, "debug");
        fs::remove_dir_all(dir).expect("cleanup");
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = temp_dir("malformed");
        let path = dir.join("planner.toml");
        fs::write(&path, "database_url = [").expect("write config");
        assert!(load_config_from(&path, |_| None).is_err());
        fs::remove_dir_all(dir).expect("cleanup");
    }
}
