use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::error::ConfigError;

const DEFAULT_CONFIG_FILE: &str = "blog.toml";

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    /// Class set on the root `<html>` element.
    pub fn html_class(self) -> &'static str {
        match self {
            Theme::Light => "",
            Theme::Dark => "dark",
        }
    }

    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(ConfigError::InvalidValue {
                key: "theme",
                value: value.to_string(),
            }),
        }
    }
}

/// Optional `blog.toml` contents.
#[derive(Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    site_title: Option<String>,
    content_dir: Option<PathBuf>,
    source: Option<String>,
    theme: Option<Theme>,
    cache_ttl_secs: Option<u64>,
}

/// Process-wide configuration, loaded once at startup and read-only after.
#[derive(Debug, Clone)]
pub struct Config {
    pub is_development: bool,
    pub port: u16,
    pub site_title: String,
    /// Templates (`layout.html`, ...) and `static/` live here.
    pub content_dir: PathBuf,
    /// Base location of `index.json` and `<slug>.md`: a directory or an
    /// `http(s)://` URL.
    pub source: String,
    pub theme: Theme,
    pub cache_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            is_development: false,
            port: 8080,
            site_title: "My Blog".to_string(),
            content_dir: PathBuf::from("content"),
            source: "content/blogs".to_string(),
            theme: Theme::Light,
            cache_ttl: Duration::from_secs(3600),
        }
    }
}

impl Config {
    /// Reads `BLOG_CONFIG` (default `blog.toml`, optional) and applies the
    /// `RUST_ENV`, `PORT`, `BLOG_SOURCE` and `BLOG_THEME` overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("BLOG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        let file = if path.exists() {
            info!(path = %path.display(), "loading config file");
            Some(read_file_config(&path)?)
        } else {
            None
        };
        Self::from_parts(file, |key| std::env::var(key).ok())
    }

    #[cfg(test)]
    fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let file = parse_file_config(contents, Path::new("<inline>"))?;
        Self::from_parts(Some(file), |_| None)
    }

    fn from_parts(file: Option<FileConfig>, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(file) = file {
            if let Some(title) = file.site_title {
                config.site_title = title;
            }
            if let Some(dir) = file.content_dir {
                config.content_dir = dir;
            }
            if let Some(source) = file.source {
                config.source = source;
            }
            if let Some(theme) = file.theme {
                config.theme = theme;
            }
            if let Some(secs) = file.cache_ttl_secs {
                config.cache_ttl = Duration::from_secs(secs);
            }
        }

        config.is_development = env("RUST_ENV").map(|v| v == "development").unwrap_or(false);
        if let Some(port) = env("PORT") {
            config.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: port.clone(),
            })?;
        }
        if let Some(source) = env("BLOG_SOURCE") {
            config.source = source;
        }
        if let Some(theme) = env("BLOG_THEME") {
            config.theme = Theme::parse(&theme)?;
        }

        Ok(config)
    }

    /// Revalidation window of the index cache. Development always refetches.
    pub fn index_cache_ttl(&self) -> Option<Duration> {
        if self.is_development || self.cache_ttl.is_zero() {
            None
        } else {
            Some(self.cache_ttl)
        }
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    parse_file_config(&contents, path)
}

fn parse_file_config(contents: &str, path: &Path) -> Result<FileConfig, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::Invalid {
        path: path.to_path_buf(),
        source,
    })
}
