//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::{DEFAULT_MEMORY_STORE_LIMIT, DEFAULT_READ_TIMEOUT_MS, DEFAULT_WRITE_TIMEOUT_MS};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "fragcache";

/// Command-line arguments for the fragcache binary.
#[derive(Debug, Parser)]
#[command(name = "fragcache", version, about = "Fragment render cache")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FRAGCACHE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Render a component tree through the cache one or more times.
    Render(RenderArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub overrides: RenderOverrides,

    /// TOML file describing the component tree.
    #[arg(value_name = "TREE", value_hint = ValueHint::FilePath)]
    pub tree: PathBuf,

    /// Number of passes over the tree; later passes are served from the cache.
    #[arg(long, default_value = "1", value_name = "COUNT")]
    pub passes: NonZeroU32,

    /// Dependency to invalidate after the first pass. May be repeated.
    #[arg(long = "invalidate", value_name = "DEPENDENCY")]
    pub invalidate: Vec<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Toggle the render cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Toggle the visible cache-miss marker.
    #[arg(
        long = "diagnostic",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub diagnostic_mode: Option<bool>,

    /// Override the cache read timeout.
    #[arg(long = "cache-read-timeout-ms", value_name = "MILLIS")]
    pub read_timeout_ms: Option<u64>,

    /// Override the cache write timeout.
    #[arg(long = "cache-write-timeout-ms", value_name = "MILLIS")]
    pub write_timeout_ms: Option<u64>,

    /// Override the in-memory store capacity.
    #[arg(long = "memory-store-limit", value_name = "COUNT")]
    pub memory_store_limit: Option<usize>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub diagnostic_mode: bool,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub memory_store_limit: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("FRAGCACHE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match &cli.command {
        Command::Render(args) => raw.apply_render_overrides(&args.overrides),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_render_overrides(&mut self, overrides: &RenderOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(diagnostic) = overrides.diagnostic_mode {
            self.cache.diagnostic_mode = Some(diagnostic);
        }
        if let Some(millis) = overrides.read_timeout_ms {
            self.cache.read_timeout_ms = Some(millis);
        }
        if let Some(millis) = overrides.write_timeout_ms {
            self.cache.write_timeout_ms = Some(millis);
        }
        if let Some(limit) = overrides.memory_store_limit {
            self.cache.memory_store_limit = Some(limit);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings { logging, cache } = raw;

        let logging = build_logging_settings(logging)?;
        let cache = build_cache_settings(cache)?;

        Ok(Self { logging, cache })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let read_timeout = positive_millis(
        cache.read_timeout_ms.unwrap_or(DEFAULT_READ_TIMEOUT_MS),
        "cache.read_timeout_ms",
    )?;
    let write_timeout = positive_millis(
        cache.write_timeout_ms.unwrap_or(DEFAULT_WRITE_TIMEOUT_MS),
        "cache.write_timeout_ms",
    )?;

    let limit = cache
        .memory_store_limit
        .unwrap_or(DEFAULT_MEMORY_STORE_LIMIT);
    let memory_store_limit = NonZeroUsize::new(limit).ok_or_else(|| {
        LoadError::invalid("cache.memory_store_limit", "must be greater than zero")
    })?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        diagnostic_mode: cache.diagnostic_mode.unwrap_or(false),
        read_timeout,
        write_timeout,
        memory_store_limit,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    diagnostic_mode: Option<bool>,
    read_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    memory_store_limit: Option<usize>,
}

fn positive_millis(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_millis(value))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
