//! Beanstalk AOP - 面向切面编程支持
//!
//! 提供：
//! - 切点表达式（类型、方法、execution、正则、运行时匹配）
//! - 多种通知（环绕、前置、返回后、异常、最终），经适配器统一为方法拦截器
//! - 按顺序稳定排列的拦截器链，链在首次调用时构建并缓存
//! - 接口代理与目标类型代理
//! - 通过 BeanPostProcessor 自动为容器中的 Bean 创建代理，并正确参与循环依赖

pub mod adapter;
pub mod advice;
pub mod advisor;
pub mod aspect;
pub mod auto_proxy;
pub mod chain;
pub mod context;
pub mod error;
pub mod joinpoint;
pub mod pointcut;
pub mod proxy;

// 重新导出核心类型
pub use adapter::{AdvisorAdapter, AdvisorAdapterRegistry};
pub use advice::{
    Advice, AfterAdvice, AfterReturningAdvice, BeforeAdvice, MethodInterceptor, ThrowsAdvice,
};
pub use advisor::{
    Advisor, AdvisorKind, AdvisorRegistry, DefaultIntroductionAdvisor, DefaultPointcutAdvisor,
    DelegatingIntroductionInterceptor, LOWEST_PRECEDENCE,
};
pub use aspect::{
    Aspect, AspectAdvisor, ExceptionHandlingAspect, JoinPoint, LoggingAspect, PerformanceAspect,
};
pub use auto_proxy::{AutoProxyCreator, ProxyViewResolver, AUTO_PROXY_ORDER};
pub use chain::{AdvisorChainFactory, ChainEntry};
pub use context::AopContext;
pub use error::{AopError, AopResult};
pub use joinpoint::{Args, Invocable, InvocationResult, Method, MethodInvocation, ReturnValue};
pub use pointcut::{ClassFilter, MethodMatcher, Pattern, Pointcut, PointcutExpression, TargetClass};
pub use proxy::{AopProxy, InterfaceStubs, ProxyConfig, ProxyFactory, ProxyKind};

/// 预导入模块
pub mod prelude {
    pub use crate::adapter::*;
    pub use crate::advice::*;
    pub use crate::advisor::*;
    pub use crate::aspect::*;
    pub use crate::auto_proxy::AutoProxyCreator;
    pub use crate::chain::{AdvisorChainFactory, ChainEntry};
    pub use crate::context::AopContext;
    pub use crate::error::{AopError, AopResult};
    pub use crate::joinpoint::*;
    pub use crate::pointcut::*;
    pub use crate::proxy::*;
    pub use crate::{args, proxy_invoke};
}

/// 通过代理调用接口方法并取得类型化的返回值
///
/// 用于编写接口桩：
/// ```ignore
/// struct GreeterStub(Arc<AopProxy>);
///
/// impl Greeter for GreeterStub {
///     fn greet(&self, name: &str) -> anyhow::Result<String> {
///         proxy_invoke!(self.0, dyn Greeter, greet, name.to_string())
///     }
/// }
/// ```
#[macro_export]
macro_rules! proxy_invoke {
    ($proxy:expr, $owner:ty, $method:ident $(, $arg:expr)* $(,)?) => {
        $proxy.invoke_as(
            &$crate::Method::of::<$owner>(stringify!($method)),
            $crate::args![$($arg),*],
        )
    };
}
