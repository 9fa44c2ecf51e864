//! Configuration management

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::mpd::DEFAULT_PORT;
use crate::picker::cache::DEFAULT_MIN_CACHE_ITEMS;
use crate::picker::projector::DEFAULT_TAGS;
use crate::picker::query::{EntityKind, UnknownEntity};
use crate::picker::template::Template;

/// Directory name used under the platform config root
const CONFIG_DIR_NAME: &str = "mpd-picker";

const DEFAULT_TIMEOUT_SECS: f64 = 2.0;

#[derive(Debug, Clone, Deserialize)]
pub struct PickerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Listings with at least this many candidates are cached
    #[serde(default = "default_min_cache_files")]
    pub min_cache_files: usize,

    /// Budget for connecting and for the first read of every query
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    /// Entity listed when none is requested
    #[serde(default = "default_view")]
    pub default_view: String,

    /// Tags carried on every candidate
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,

    /// Per-entity template overrides; an empty string disables the template
    #[serde(default)]
    pub formats: BTreeMap<String, String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_min_cache_files() -> usize {
    DEFAULT_MIN_CACHE_ITEMS
}

fn default_timeout_secs() -> f64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_view() -> String {
    EntityKind::Artist.as_str().to_string()
}

fn default_tags() -> Vec<String> {
    DEFAULT_TAGS.iter().map(|t| t.to_string()).collect()
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            min_cache_files: default_min_cache_files(),
            timeout_secs: default_timeout_secs(),
            default_view: default_view(),
            tags: default_tags(),
            formats: BTreeMap::new(),
        }
    }
}

impl PickerConfig {
    /// Connect/read budget; nonsensical values fall back to the default
    pub fn timeout(&self) -> Duration {
        if self.timeout_secs.is_finite() && self.timeout_secs > 0.0 {
            Duration::from_secs_f64(self.timeout_secs)
        } else {
            Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS)
        }
    }

    pub fn default_entity(&self) -> Result<EntityKind, UnknownEntity> {
        self.default_view.parse()
    }

    /// Template for `entity`: the configured override if any, else the built-in one
    pub fn template_for(&self, entity: EntityKind) -> Option<Template> {
        match self.formats.get(entity.as_str()) {
            Some(source) if source.is_empty() => None,
            Some(source) => Some(Template::parse(source)),
            None => Some(Template::parse(entity.default_template())),
        }
    }
}

/// Get config directory (XDG_CONFIG_HOME or platform default)
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MPD_PICKER_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library/Application Support")
                .join(CONFIG_DIR_NAME);
        }
    }

    #[cfg(not(target_os = "macos"))]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join(CONFIG_DIR_NAME);
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config").join(CONFIG_DIR_NAME);
        }
    }

    // Fallback to current directory
    PathBuf::from(".")
}

pub fn load_config() -> Result<PickerConfig> {
    let config_dir = get_config_dir();

    let mut builder = ::config::Config::builder()
        .set_default("host", default_host())?
        .set_default("port", DEFAULT_PORT as i64)?
        // Load from config file if it exists (config.toml, config.json, ...)
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy()).required(false),
        )
        // Override with environment variables (MPD_PICKER_TIMEOUT_SECS, MPD_PICKER_FORMATS__TITLE, etc.)
        .add_source(
            ::config::Environment::with_prefix("MPD_PICKER")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("tags")
                .try_parsing(true),
        );

    // The variables every MPD client honours win over everything else
    if let Ok(host) = std::env::var("MPD_HOST") {
        if !host.is_empty() {
            builder = builder.set_override("host", host)?;
        }
    }
    if let Ok(port) = std::env::var("MPD_PORT") {
        match port.parse::<u16>() {
            Ok(port_num) => builder = builder.set_override("port", port_num as i64)?,
            Err(_) => tracing::warn!("Ignoring invalid MPD_PORT: {:?}", port),
        }
    }

    let config: PickerConfig = builder.build()?.try_deserialize()?;
    config
        .default_entity()
        .context("invalid default_view in configuration")?;
    for entity in config.formats.keys() {
        entity
            .parse::<EntityKind>()
            .with_context(|| format!("invalid entity in formats: {}", entity))?;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ENV_VARS: &[&str] = &[
        "MPD_HOST",
        "MPD_PORT",
        "MPD_PICKER_CONFIG_DIR",
        "MPD_PICKER_HOST",
        "MPD_PICKER_PORT",
        "MPD_PICKER_TIMEOUT_SECS",
        "MPD_PICKER_TAGS",
        "MPD_PICKER_FORMATS__TITLE",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_file_or_env() {
        clear_env();
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        env::set_var("MPD_PICKER_CONFIG_DIR", temp_dir.path());

        let config = load_config().expect("config should load");
        clear_env();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 6600);
        assert_eq!(config.min_cache_files, 5000);
        assert_eq!(config.timeout(), Duration::from_secs(2));
        assert_eq!(config.default_entity(), Ok(EntityKind::Artist));
        assert_eq!(config.tags.len(), 8);
        assert!(config.formats.is_empty());
    }

    #[test]
    #[serial]
    fn test_mpd_host_and_port_env() {
        clear_env();
        env::set_var("MPD_PICKER_CONFIG_DIR", "/tmp/mpd-picker-test-nonexistent");
        env::set_var("MPD_HOST", "music.lan");
        env::set_var("MPD_PORT", "6601");

        let config = load_config().expect("config should load");
        clear_env();

        assert_eq!(config.host, "music.lan");
        assert_eq!(config.port, 6601);
    }

    #[test]
    #[serial]
    fn test_mpd_host_wins_over_prefixed_env() {
        clear_env();
        env::set_var("MPD_PICKER_CONFIG_DIR", "/tmp/mpd-picker-test-nonexistent");
        env::set_var("MPD_PICKER_HOST", "from-prefixed");
        env::set_var("MPD_HOST", "from-mpd-host");

        let config = load_config().expect("config should load");
        clear_env();

        assert_eq!(config.host, "from-mpd-host");
    }

    #[test]
    #[serial]
    fn test_prefixed_host_without_mpd_host() {
        clear_env();
        env::set_var("MPD_PICKER_CONFIG_DIR", "/tmp/mpd-picker-test-nonexistent");
        env::set_var("MPD_PICKER_HOST", "from-prefixed");
        env::set_var("MPD_PICKER_PORT", "6601");

        let config = load_config().expect("config should load");
        clear_env();

        assert_eq!(config.host, "from-prefixed");
        assert_eq!(config.port, 6601);
    }

    #[test]
    #[serial]
    fn test_invalid_mpd_port_uses_default() {
        clear_env();
        env::set_var("MPD_PICKER_CONFIG_DIR", "/tmp/mpd-picker-test-nonexistent");
        env::set_var("MPD_PORT", "not-a-port");

        let config = load_config().expect("config should load");
        clear_env();

        assert_eq!(config.port, 6600);
    }

    #[test]
    #[serial]
    fn test_prefixed_env_overrides() {
        clear_env();
        env::set_var("MPD_PICKER_CONFIG_DIR", "/tmp/mpd-picker-test-nonexistent");
        env::set_var("MPD_PICKER_TIMEOUT_SECS", "0.5");
        env::set_var("MPD_PICKER_TAGS", "artist,title");
        env::set_var("MPD_PICKER_FORMATS__TITLE", "{title}");

        let config = load_config().expect("config should load");
        clear_env();

        assert_eq!(config.timeout(), Duration::from_millis(500));
        assert_eq!(config.tags, vec!["artist".to_string(), "title".to_string()]);
        assert_eq!(
            config.template_for(EntityKind::Title).map(|t| t.source().to_string()),
            Some("{title}".to_string())
        );
    }

    #[test]
    #[serial]
    fn test_config_file_is_read() {
        clear_env();
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(
            temp_dir.path().join("config.toml"),
            "host = \"10.0.0.5\"\nmin_cache_files = 10\ndefault_view = \"album\"\n\n[formats]\nartist = \"\"\n",
        )
        .expect("write config");
        env::set_var("MPD_PICKER_CONFIG_DIR", temp_dir.path());

        let config = load_config().expect("config should load");
        clear_env();

        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.min_cache_files, 10);
        assert_eq!(config.default_entity(), Ok(EntityKind::Album));
        assert!(config.template_for(EntityKind::Artist).is_none());
        assert_eq!(
            config.template_for(EntityKind::Album).map(|t| t.source().to_string()),
            Some(EntityKind::Album.default_template().to_string())
        );
    }

    #[test]
    #[serial]
    fn test_unknown_default_view_is_rejected() {
        clear_env();
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(
            temp_dir.path().join("config.toml"),
            "default_view = \"composer\"\n",
        )
        .expect("write config");
        env::set_var("MPD_PICKER_CONFIG_DIR", temp_dir.path());

        let result = load_config();
        clear_env();

        assert!(result.is_err());
    }

    #[test]
    fn test_timeout_falls_back_on_nonsense() {
        let config = PickerConfig {
            timeout_secs: -1.0,
            ..PickerConfig::default()
        };
        assert_eq!(config.timeout(), Duration::from_secs(2));
    }

    #[test]
    #[serial]
    fn test_config_dir_prefers_override() {
        clear_env();
        env::set_var("MPD_PICKER_CONFIG_DIR", "/custom/dir");
        let dir = get_config_dir();
        clear_env();
        assert_eq!(dir, PathBuf::from("/custom/dir"));
    }
}
