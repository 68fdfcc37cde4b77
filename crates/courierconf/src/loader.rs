//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, CourierConfig, PollingConfig, ServerConfig, TelemetryConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided it replaces the local override and is returned
/// even when missing, so loading it reports `ConfigError::FileRead`. Returns
/// paths in load order (system, user, local/cli). Discovered files are only
/// returned when they exist.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/courier/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("courier/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from("courier.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load config from a TOML file.
pub fn load_from_file(path: &Path) -> Result<CourierConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

fn parse_toml(contents: &str, path: &Path) -> Result<CourierConfig, ConfigError> {
    toml::from_str(contents).map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Merge two configs, with non-default values in `overlay` taking precedence.
pub fn merge_configs(base: CourierConfig, overlay: CourierConfig) -> CourierConfig {
    let server = ServerConfig::default();
    let polling = PollingConfig::default();
    let telemetry = TelemetryConfig::default();

    CourierConfig {
        server: ServerConfig {
            url: if overlay.server.url != server.url {
                overlay.server.url
            } else {
                base.server.url
            },
            timeout_ms: if overlay.server.timeout_ms != server.timeout_ms {
                overlay.server.timeout_ms
            } else {
                base.server.timeout_ms
            },
        },
        polling: PollingConfig {
            period_ms: if overlay.polling.period_ms != polling.period_ms {
                overlay.polling.period_ms
            } else {
                base.polling.period_ms
            },
            topics: if !overlay.polling.topics.is_empty() {
                overlay.polling.topics
            } else {
                base.polling.topics
            },
        },
        telemetry: TelemetryConfig {
            log_level: if overlay.telemetry.log_level != telemetry.log_level {
                overlay.telemetry.log_level
            } else {
                base.telemetry.log_level
            },
        },
    }
}

/// Apply `COURIER_*` environment variable overrides to config.
pub fn apply_env_overrides(config: &mut CourierConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |name| env::var(name).ok());
}

pub(crate) fn apply_overrides_from(
    config: &mut CourierConfig,
    sources: &mut ConfigSources,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = lookup("COURIER_URL") {
        config.server.url = v;
        sources.env_overrides.push("COURIER_URL".to_string());
    }
    if let Some(v) = lookup("COURIER_TIMEOUT_MS") {
        if let Ok(ms) = v.parse() {
            config.server.timeout_ms = ms;
            sources.env_overrides.push("COURIER_TIMEOUT_MS".to_string());
        }
    }
    if let Some(v) = lookup("COURIER_POLL_MS") {
        if let Ok(ms) = v.parse() {
            config.polling.period_ms = ms;
            sources.env_overrides.push("COURIER_POLL_MS".to_string());
        }
    }
    if let Some(v) = lookup("COURIER_TOPICS") {
        config.polling.topics = v
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();
        sources.env_overrides.push("COURIER_TOPICS".to_string());
    }
    if let Some(v) = lookup("COURIER_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("COURIER_LOG".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
[server]
url = "http://broker:7070"
"#;
        let config = parse_toml(toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.server.url, "http://broker:7070");
        assert_eq!(config.server.timeout_ms, 30_000);
        assert_eq!(config.polling.period_ms, 30);
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = parse_toml("[server\nurl = 1", Path::new("broken.toml")).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_merge_prefers_non_default_overlay() {
        let mut base = CourierConfig::default();
        base.server.url = "http://system:7070".into();
        base.polling.period_ms = 100;

        let mut overlay = CourierConfig::default();
        overlay.polling.period_ms = 50;
        overlay.polling.topics = vec!["orders".into()];

        let merged = merge_configs(base, overlay);
        assert_eq!(merged.server.url, "http://system:7070");
        assert_eq!(merged.polling.period_ms, 50);
        assert_eq!(merged.polling.topics, vec!["orders".to_string()]);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("COURIER_URL", "http://env:9000"),
            ("COURIER_POLL_MS", "250"),
            ("COURIER_TIMEOUT_MS", "not-a-number"),
            ("COURIER_TOPICS", "orders, payments,"),
        ]
        .into_iter()
        .collect();

        let mut config = CourierConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(&mut config, &mut sources, |name| {
            env.get(name).map(|v| v.to_string())
        });

        assert_eq!(config.server.url, "http://env:9000");
        assert_eq!(config.polling.period_ms, 250);
        assert_eq!(config.server.timeout_ms, 30_000);
        assert_eq!(config.polling.topics, vec!["orders", "payments"]);
        assert_eq!(
            sources.env_overrides,
            vec!["COURIER_URL", "COURIER_POLL_MS", "COURIER_TOPICS"]
        );
    }

    #[test]
    fn test_cli_path_replaces_local_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[polling]\nperiod_ms = 75").unwrap();

        let files = discover_config_files_with_override(Some(file.path()));
        assert_eq!(files.last().map(PathBuf::as_path), Some(file.path()));

        let config = load_from_file(file.path()).unwrap();
        assert_eq!(config.polling.period_ms, 75);
    }

    #[test]
    fn test_missing_cli_path_is_still_listed() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");

        let files = discover_config_files_with_override(Some(&missing));
        assert_eq!(files.last(), Some(&missing));
        assert!(!files.iter().any(|f| f == Path::new("courier.toml")));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = load_from_file(Path::new("/nonexistent/courier.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
