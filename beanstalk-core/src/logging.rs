use std::str::FromStr;

use serde::Deserialize;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ContainerError, ContainerResult};

/// 容器专用的日志过滤环境变量，优先于 `RUST_LOG`
pub const LOG_ENV: &str = "BEANSTALK_LOG";

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 紧凑格式（默认）
    Compact,
    /// 完整格式
    Full,
    /// JSON 格式
    Json,
    /// 美化格式（适合开发）
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "full" => Ok(LogFormat::Full),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别（默认：Info）
    pub level: LogLevel,

    /// 日志格式（默认：Compact）
    pub format: LogFormat,

    /// 是否显示目标（模块路径）（默认：false）
    pub show_target: bool,

    /// 是否显示线程 ID（默认：false）
    pub show_thread_ids: bool,

    /// 是否显示线程名（默认：false）
    pub show_thread_names: bool,

    /// 自定义过滤器，例如 "beanstalk_core=trace,beanstalk_aop=debug"
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            show_target: false,
            show_thread_ids: false,
            show_thread_names: false,
            filter: None,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn show_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    pub fn show_thread_ids(mut self, show: bool) -> Self {
        self.show_thread_ids = show;
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// 从环境变量读取配置
    ///
    /// 过滤器依次取 `BEANSTALK_LOG`、`RUST_LOG`；格式取 `BEANSTALK_LOG_FORMAT`。
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(filter) = std::env::var(LOG_ENV).or_else(|_| std::env::var("RUST_LOG")) {
            config.filter = Some(filter);
        }

        if let Ok(format_str) = std::env::var("BEANSTALK_LOG_FORMAT") {
            if let Ok(format) = format_str.parse() {
                config.format = format;
            }
        }

        config
    }

    fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.level.to_string());
        match &self.filter {
            Some(filter) => EnvFilter::try_new(filter).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_env(LOG_ENV)
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| fallback()),
        }
    }

    /// 初始化全局日志订阅者
    ///
    /// 重复初始化返回 `ContainerError::LoggingInit`。
    pub fn init(self) -> ContainerResult<()> {
        let env_filter = self.env_filter();
        let init_err = |e: Box<dyn std::error::Error + Send + Sync>| {
            ContainerError::LoggingInit(e.to_string())
        };

        match self.format {
            LogFormat::Compact => fmt()
                .with_env_filter(env_filter)
                .compact()
                .with_target(self.show_target)
                .with_thread_ids(self.show_thread_ids)
                .with_thread_names(self.show_thread_names)
                .try_init()
                .map_err(init_err)?,
            LogFormat::Full => fmt()
                .with_env_filter(env_filter)
                .with_target(self.show_target)
                .with_thread_ids(self.show_thread_ids)
                .with_thread_names(self.show_thread_names)
                .try_init()
                .map_err(init_err)?,
            LogFormat::Json => fmt()
                .with_env_filter(env_filter)
                .json()
                .with_target(self.show_target)
                .try_init()
                .map_err(init_err)?,
            LogFormat::Pretty => fmt()
                .with_env_filter(env_filter)
                .pretty()
                .with_target(self.show_target)
                .try_init()
                .map_err(init_err)?,
        }

        Ok(())
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Compact => write!(f, "compact"),
            LogFormat::Full => write!(f, "full"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}
