//! Load `ServerConfig` from a TOML file and apply `SLICER_*` / `DATABASE_URL` overrides.

use crate::config::ServerConfig;
use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Looked up in the working directory when no config path is given.
pub const DEFAULT_CONFIG_FILE: &str = "slicer.toml";

impl ServerConfig {
    pub fn from_toml_str(source: &str, path: &str) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Apply overrides from a variable lookup (the process environment in `load_config`).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.db.url = Some(url);
        }
        if let Some(path) = lookup("SLICER_MODEL") {
            self.model.path = Some(PathBuf::from(path));
        }
        if let Some(host) = lookup("SLICER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SLICER_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "SLICER_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(reload) = lookup("SLICER_RELOAD") {
            self.server.reload = parse_bool(&reload)
                .ok_or(ConfigError::InvalidValue { key: "SLICER_RELOAD", value: reload.clone() })?;
        }
        Ok(())
    }
}

/// Read the config file (explicit path, else `slicer.toml` if present, else defaults),
/// then apply env overrides.
pub async fn load_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let mut config = match path {
        Some(p) => read_config_file(p).await?,
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if tokio::fs::try_exists(fallback).await.unwrap_or(false) {
                read_config_file(fallback).await?
            } else {
                tracing::debug!("no config file, using defaults");
                ServerConfig::default()
            }
        }
    };
    config.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

async fn read_config_file(path: &Path) -> Result<ServerConfig, ConfigError> {
    let shown = path.display().to_string();
    let source = tokio::fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
        path: shown.clone(),
        source,
    })?;
    tracing::debug!(path = %shown, "config file loaded");
    ServerConfig::from_toml_str(&source, &shown)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_HOST, DEFAULT_PORT};
    use std::collections::HashMap;

    #[test]
    fn empty_file_uses_defaults() {
        let config = ServerConfig::from_toml_str("", "slicer.toml").unwrap();
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert!(!config.server.reload);
        assert!(config.db.url.is_none());
        assert!(config.model.path.is_none());
    }

    #[test]
    fn sections_are_read() {
        let source = r#"
            [db]
            url = "postgres://localhost/olap"

            [model]
            path = "models/sales.json"

            [server]
            host = "0.0.0.0"
            port = 8080
            reload = true
        "#;
        let config = ServerConfig::from_toml_str(source, "slicer.toml").unwrap();
        assert_eq!(config.db.url.as_deref(), Some("postgres://localhost/olap"));
        assert_eq!(config.model.path, Some(PathBuf::from("models/sales.json")));
        assert_eq!(config.server.addr(), "0.0.0.0:8080");
        assert!(config.server.reload);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = ServerConfig::from_toml_str("[server]\nprot = 1\n", "slicer.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn overrides_win_over_file() {
        let mut config =
            ServerConfig::from_toml_str("[server]\nport = 8080\n", "slicer.toml").unwrap();
        let env: HashMap<&str, &str> = [
            ("SLICER_PORT", "9000"),
            ("SLICER_RELOAD", "yes"),
            ("DATABASE_URL", "postgres://db/x"),
        ]
        .into_iter()
        .collect();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.server.port, 9000);
        assert!(config.server.reload);
        assert_eq!(config.db.url.as_deref(), Some("postgres://db/x"));
    }

    #[test]
    fn bad_port_override_fails() {
        let mut config = ServerConfig::default();
        let err = config
            .apply_overrides(|k| (k == "SLICER_PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "SLICER_PORT", .. }));
    }

    #[tokio::test]
    async fn config_file_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slicer.toml");
        std::fs::write(&path, "[server]\nport = 7000\n").unwrap();
        let config = read_config_file(&path).await.unwrap();
        assert_eq!(config.server.port, 7000);
    }

    #[tokio::test]
    async fn missing_config_file_names_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        match read_config_file(&path).await.unwrap_err() {
            ConfigError::Io { path: shown, .. } => assert!(shown.ends_with("absent.toml")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
