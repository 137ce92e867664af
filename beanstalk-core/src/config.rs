//! 容器配置
//!
//! 支持从 TOML 加载，未出现的键使用默认值，未知的表（例如 `[aop]`）留给其他模块解析。
//!
//! ```toml
//! allow_circular_references = true
//! allow_definition_overriding = false
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ContainerError, ContainerResult};
use crate::logging::LoggingConfig;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "BEANSTALK_";

/// 容器配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 是否允许通过提前暴露解决单例之间的循环依赖（默认：true）
    pub allow_circular_references: bool,

    /// 是否允许同名定义覆盖（默认：false）
    pub allow_definition_overriding: bool,

    /// 日志配置
    pub logging: LoggingConfig,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            allow_circular_references: true,
            allow_definition_overriding: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl ContainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_circular_references(mut self, allow: bool) -> Self {
        self.allow_circular_references = allow;
        self
    }

    pub fn allow_definition_overriding(mut self, allow: bool) -> Self {
        self.allow_definition_overriding = allow;
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// 从 TOML 字符串加载
    pub fn from_toml_str(content: &str) -> ContainerResult<Self> {
        toml::from_str(content).map_err(|e| ContainerError::Config(e.to_string()))
    }

    /// 从 TOML 文件加载
    pub fn from_file(path: impl AsRef<Path>) -> ContainerResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ContainerError::Config(format!("failed to read '{}': {}", path.display(), e))
        })?;
        tracing::debug!("Loading container configuration from '{}'", path.display());
        Self::from_toml_str(&content)
    }

    /// 使用环境变量覆盖布尔开关
    ///
    /// `BEANSTALK_ALLOW_CIRCULAR_REFERENCES`、`BEANSTALK_ALLOW_DEFINITION_OVERRIDING`
    pub fn with_env_overrides(mut self) -> ContainerResult<Self> {
        if let Some(value) = env_bool("ALLOW_CIRCULAR_REFERENCES")? {
            self.allow_circular_references = value;
        }
        if let Some(value) = env_bool("ALLOW_DEFINITION_OVERRIDING")? {
            self.allow_definition_overriding = value;
        }
        Ok(self)
    }
}

fn env_bool(key: &str) -> ContainerResult<Option<bool>> {
    let var = format!("{}{}", ENV_PREFIX, key);
    match std::env::var(&var) {
        Ok(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| ContainerError::Config(format!("{} must be a boolean, got '{}'", var, raw))),
        Err(_) => Ok(None),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogFormat, LogLevel};

    #[test]
    fn test_defaults() {
        let config = ContainerConfig::default();
        assert!(config.allow_circular_references);
        assert!(!config.allow_definition_overriding);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_from_toml_str() {
        let config = ContainerConfig::from_toml_str(
            r#"
            allow_circular_references = false

            [logging]
            level = "debug"
            format = "json"

            [aop]
            expose_proxy = true
            "#,
        )
        .unwrap();

        assert!(!config.allow_circular_references);
        assert!(!config.allow_definition_overriding);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_toml() {
        let result = ContainerConfig::from_toml_str("allow_circular_references = \"maybe\"");
        assert!(matches!(result, Err(ContainerError::Config(_))));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
