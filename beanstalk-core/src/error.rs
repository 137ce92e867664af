//! 容器错误类型
//!
//! 所有创建期错误只会中止当前请求的 Bean 及其正在创建中的依赖方，
//! 不会污染其他 Bean 的缓存状态。

use thiserror::Error;

/// 容器统一的 Result 类型
pub type ContainerResult<T> = std::result::Result<T, ContainerError>;

/// 容器错误
#[derive(Debug, Error)]
pub enum ContainerError {
    /// 找不到匹配的 Bean 定义
    #[error("No bean definition found for '{0}'")]
    DefinitionNotFound(String),

    /// Bean 定义已存在（且未允许覆盖）
    #[error("Bean definition '{0}' already exists")]
    DefinitionAlreadyExists(String),

    /// 容器已冻结，不再接受结构性修改
    #[error("Cannot {0}: configuration is frozen")]
    ConfigurationFrozen(&'static str),

    /// 按类型注入时存在多个候选且无法区分
    #[error("Ambiguous dependency of type '{type_name}': candidates {candidates:?}, none marked primary")]
    AmbiguousDependency {
        type_name: String,
        candidates: Vec<String>,
    },

    /// 无法通过提前暴露打破的循环依赖
    #[error("Circular dependency detected: {}", chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    /// 提前暴露的引用与最终对象不一致
    #[error(
        "Bean '{name}' was injected into other beans in an early (raw or wrapped) form, \
         but post-processing produced a different instance"
    )]
    WrappingMismatch { name: String },

    /// 构造函数或工厂函数失败
    #[error("Failed to instantiate bean '{name}'")]
    InstantiationFailure {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// 属性注入失败
    #[error("Failed to inject property '{property}' of bean '{name}'")]
    PopulationFailure {
        name: String,
        property: String,
        #[source]
        source: anyhow::Error,
    },

    /// 用户初始化回调失败
    #[error("Initialization callback of bean '{name}' failed")]
    InitializationFailure {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// BeanPostProcessor 处理失败
    #[error("Post-processor '{processor}' failed on bean '{name}'")]
    PostProcessingFailed {
        name: String,
        processor: String,
        #[source]
        source: anyhow::Error,
    },

    /// Bean 实例无法转换为请求的类型
    #[error("Bean '{name}' is not of required type '{expected}'")]
    TypeMismatch { name: String, expected: String },

    /// 使用了未注册的自定义作用域
    #[error("No scope registered for scope name '{0}'")]
    ScopeNotRegistered(String),

    /// 配置加载失败
    #[error("Invalid container configuration: {0}")]
    Config(String),

    /// 日志系统初始化失败
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),
}

impl ContainerError {
    /// 是否为循环依赖错误
    pub fn is_circular_dependency(&self) -> bool {
        matches!(self, ContainerError::CircularDependency { .. })
    }

    /// 将 anyhow 错误还原为容器错误（若其本身就是容器错误）
    ///
    /// 用户回调内部再次向容器请求 Bean 时，原始错误会被包进 anyhow，
    /// 这里把它取出来，避免循环依赖等错误被包装成 InstantiationFailure。
    pub(crate) fn unwrap_nested(err: anyhow::Error) -> Result<ContainerError, anyhow::Error> {
        err.downcast::<ContainerError>()
    }
}
