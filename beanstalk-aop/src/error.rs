//! AOP 错误类型

use beanstalk_core::ContainerError;
use thiserror::Error;

pub type AopResult<T> = std::result::Result<T, AopError>;

#[derive(Debug, Error)]
pub enum AopError {
    /// 通知既不是拦截器形态，也没有适配器能够转换
    #[error("Advice of kind '{advice}' in advisor '{advisor}' is not supported: no adapter converts it into a method interceptor")]
    UnsupportedAdviceType { advisor: String, advice: String },

    /// 接口代理不暴露该方法
    #[error("Method '{method}' is not exposed by the proxy of '{target}'")]
    MethodNotExposed { target: String, method: String },

    /// 目标对象没有该方法
    #[error("Target '{target}' has no method '{method}'")]
    NoSuchMethod { target: String, method: String },

    /// 代理无法提供该接口视图
    #[error("Proxy of '{target}' cannot be viewed as '{view}'")]
    ViewNotSupported { target: String, view: String },

    /// 当前线程没有可用的代理
    #[error("Cannot find current proxy: set 'expose_proxy' to true to make it available")]
    NoCurrentProxy,

    /// 调用参数与方法签名不符
    #[error("Argument {index} of '{method}' is not of type '{expected}'")]
    ArgumentMismatch {
        method: String,
        index: usize,
        expected: &'static str,
    },

    /// 返回值类型不符
    #[error("Return value of '{method}' is not of type '{expected}'")]
    ReturnTypeMismatch {
        method: String,
        expected: &'static str,
    },

    /// 切点表达式无效
    #[error("Invalid pointcut expression '{expression}': {reason}")]
    InvalidPointcut { expression: String, reason: String },

    /// 配置加载失败
    #[error("Invalid AOP configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Container(#[from] ContainerError),
}
