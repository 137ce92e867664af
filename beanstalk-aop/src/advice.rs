//! 通知（Advice）类型定义
//!
//! 只有 [`MethodInterceptor`] 能直接放进拦截器链，
//! 其他形态的通知需要经过 [`AdvisorAdapter`](crate::adapter::AdvisorAdapter) 转换。

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::joinpoint::{Args, InvocationResult, Method, MethodInvocation, ReturnValue};
use crate::pointcut::TargetClass;

/// 方法拦截器（环绕通知）
///
/// 调用 `invocation.proceed()` 执行链上剩余部分；不调用则短路目标方法。
pub trait MethodInterceptor: Send + Sync {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// 前置通知，返回错误时目标方法不会执行
pub trait BeforeAdvice: Send + Sync {
    fn before(&self, method: &Method, args: &mut Args, target: &TargetClass) -> anyhow::Result<()>;
}

/// 返回后通知，只在目标方法成功返回时执行
pub trait AfterReturningAdvice: Send + Sync {
    fn after_returning(
        &self,
        value: &ReturnValue,
        method: &Method,
        args: &Args,
        target: &TargetClass,
    ) -> anyhow::Result<()>;
}

/// 异常通知
///
/// 不能吞掉错误：返回 `Ok(())` 时原错误继续向上传播，返回 `Err` 时以新错误替换。
pub trait ThrowsAdvice: Send + Sync {
    fn after_throwing(
        &self,
        error: &anyhow::Error,
        method: &Method,
        args: &Args,
        target: &TargetClass,
    ) -> anyhow::Result<()>;
}

/// 最终通知，无论成功与否都会执行
pub trait AfterAdvice: Send + Sync {
    fn after(&self, method: &Method, args: &Args, target: &TargetClass);
}

/// 通知
#[derive(Clone)]
pub enum Advice {
    Interceptor(Arc<dyn MethodInterceptor>),
    Before(Arc<dyn BeforeAdvice>),
    AfterReturning(Arc<dyn AfterReturningAdvice>),
    Throws(Arc<dyn ThrowsAdvice>),
    After(Arc<dyn AfterAdvice>),
    /// 需要自定义适配器才能使用的通知
    Custom {
        kind: &'static str,
        advice: Arc<dyn Any + Send + Sync>,
    },
}

impl Advice {
    pub fn interceptor(interceptor: impl MethodInterceptor + 'static) -> Self {
        Self::Interceptor(Arc::new(interceptor))
    }

    pub fn before(advice: impl BeforeAdvice + 'static) -> Self {
        Self::Before(Arc::new(advice))
    }

    pub fn after_returning(advice: impl AfterReturningAdvice + 'static) -> Self {
        Self::AfterReturning(Arc::new(advice))
    }

    pub fn throws(advice: impl ThrowsAdvice + 'static) -> Self {
        Self::Throws(Arc::new(advice))
    }

    pub fn after(advice: impl AfterAdvice + 'static) -> Self {
        Self::After(Arc::new(advice))
    }

    pub fn custom<A: Any + Send + Sync>(kind: &'static str, advice: A) -> Self {
        Self::Custom {
            kind,
            advice: Arc::new(advice),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Interceptor(_) => "interceptor",
            Self::Before(_) => "before",
            Self::AfterReturning(_) => "after-returning",
            Self::Throws(_) => "throws",
            Self::After(_) => "after",
            Self::Custom { kind, .. } => kind,
        }
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Advice({})", self.kind())
    }
}

/// 前置通知的拦截器形态
pub struct BeforeAdviceInterceptor {
    advice: Arc<dyn BeforeAdvice>,
}

impl BeforeAdviceInterceptor {
    pub fn new(advice: Arc<dyn BeforeAdvice>) -> Self {
        Self { advice }
    }
}

impl MethodInterceptor for BeforeAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult {
        let method = *invocation.method();
        let target = invocation.target_class().clone();
        self.advice.before(&method, invocation.args_mut(), &target)?;
        invocation.proceed()
    }

    fn name(&self) -> &str {
        "BeforeAdviceInterceptor"
    }
}

/// 返回后通知的拦截器形态
pub struct AfterReturningAdviceInterceptor {
    advice: Arc<dyn AfterReturningAdvice>,
}

impl AfterReturningAdviceInterceptor {
    pub fn new(advice: Arc<dyn AfterReturningAdvice>) -> Self {
        Self { advice }
    }
}

impl MethodInterceptor for AfterReturningAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult {
        let value = invocation.proceed()?;
        self.advice.after_returning(
            &value,
            invocation.method(),
            invocation.args(),
            invocation.target_class(),
        )?;
        Ok(value)
    }

    fn name(&self) -> &str {
        "AfterReturningAdviceInterceptor"
    }
}

/// 异常通知的拦截器形态
pub struct ThrowsAdviceInterceptor {
    advice: Arc<dyn ThrowsAdvice>,
}

impl ThrowsAdviceInterceptor {
    pub fn new(advice: Arc<dyn ThrowsAdvice>) -> Self {
        Self { advice }
    }
}

impl MethodInterceptor for ThrowsAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult {
        match invocation.proceed() {
            Ok(value) => Ok(value),
            Err(error) => {
                self.advice.after_throwing(
                    &error,
                    invocation.method(),
                    invocation.args(),
                    invocation.target_class(),
                )?;
                Err(error)
            }
        }
    }

    fn name(&self) -> &str {
        "ThrowsAdviceInterceptor"
    }
}

/// 最终通知的拦截器形态
pub struct AfterAdviceInterceptor {
    advice: Arc<dyn AfterAdvice>,
}

impl AfterAdviceInterceptor {
    pub fn new(advice: Arc<dyn AfterAdvice>) -> Self {
        Self { advice }
    }
}

impl MethodInterceptor for AfterAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult {
        let result = invocation.proceed();
        self.advice
            .after(invocation.method(), invocation.args(), invocation.target_class());
        result
    }

    fn name(&self) -> &str {
        "AfterAdviceInterceptor"
    }
}
