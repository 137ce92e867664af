//! 切面（Aspect）定义
//!
//! 切面是横切关注点的模块化：一个切点加上一组可选的前置、后置、返回后、异常钩子。
//! [`AspectAdvisor`] 把切面包装成普通的通知器，钩子由一个环绕拦截器依次调用。

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::advice::{Advice, MethodInterceptor};
use crate::advisor::{Advisor, AdvisorKind, LOWEST_PRECEDENCE};
use crate::joinpoint::{Args, InvocationResult, Method, MethodInvocation};
use crate::pointcut::{PointcutExpression, TargetClass};

/// 切面钩子看到的连接点
pub struct JoinPoint<'a> {
    pub method: &'a Method,
    pub target: &'a TargetClass,
    pub args: &'a Args,
    started: Instant,
}

impl<'a> JoinPoint<'a> {
    /// 例如 `userService.get_user`
    pub fn signature(&self) -> String {
        format!("{}.{}", self.target.bean_name(), self.method.name())
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// 切面 Trait
pub trait Aspect: Send + Sync {
    fn name(&self) -> &str;

    fn pointcut(&self) -> &PointcutExpression;

    /// 返回错误时目标方法不会执行
    fn before(&self, _join_point: &JoinPoint<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// 无论成功与否都会调用
    fn after(&self, _join_point: &JoinPoint<'_>) {}

    fn after_returning(&self, _join_point: &JoinPoint<'_>) {}

    fn after_throwing(&self, _join_point: &JoinPoint<'_>, _error: &anyhow::Error) {}
}

/// 依次调用切面钩子的环绕拦截器
struct AspectInterceptor {
    aspect: Arc<dyn Aspect>,
}

impl MethodInterceptor for AspectInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult {
        let method = *invocation.method();
        let target = invocation.target_class().clone();
        let started = Instant::now();

        {
            let join_point = JoinPoint {
                method: &method,
                target: &target,
                args: invocation.args(),
                started,
            };
            self.aspect.before(&join_point)?;
        }

        let result = invocation.proceed();

        let join_point = JoinPoint {
            method: &method,
            target: &target,
            args: invocation.args(),
            started,
        };
        match &result {
            Ok(_) => self.aspect.after_returning(&join_point),
            Err(e) => self.aspect.after_throwing(&join_point, e),
        }
        self.aspect.after(&join_point);
        result
    }

    fn name(&self) -> &str {
        self.aspect.name()
    }
}

/// 切面通知器
pub struct AspectAdvisor {
    aspect: Arc<dyn Aspect>,
    pointcut: Arc<PointcutExpression>,
    order: i32,
}

impl AspectAdvisor {
    pub fn new(aspect: impl Aspect + 'static) -> Self {
        let pointcut = Arc::new(aspect.pointcut().clone());
        Self {
            aspect: Arc::new(aspect),
            pointcut,
            order: LOWEST_PRECEDENCE,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

impl Advisor for AspectAdvisor {
    fn name(&self) -> &str {
        self.aspect.name()
    }

    fn advice(&self) -> Advice {
        Advice::Interceptor(Arc::new(AspectInterceptor {
            aspect: self.aspect.clone(),
        }))
    }

    fn kind(&self) -> AdvisorKind {
        AdvisorKind::Pointcut {
            class_filter: self.pointcut.clone(),
            method_matcher: self.pointcut.clone(),
        }
    }

    fn order(&self) -> i32 {
        self.order
    }
}

// ============================================================================
// 预定义的常用切面
// ============================================================================

/// 日志切面 - 记录方法调用
pub struct LoggingAspect {
    log_args: bool,
    pointcut: PointcutExpression,
}

impl LoggingAspect {
    pub fn new(pointcut: PointcutExpression) -> Self {
        Self {
            log_args: false,
            pointcut,
        }
    }

    pub fn with_args(mut self) -> Self {
        self.log_args = true;
        self
    }
}

impl Aspect for LoggingAspect {
    fn name(&self) -> &str {
        "LoggingAspect"
    }

    fn pointcut(&self) -> &PointcutExpression {
        &self.pointcut
    }

    fn before(&self, join_point: &JoinPoint<'_>) -> anyhow::Result<()> {
        if self.log_args {
            tracing::info!(
                "→ Entering: {} ({} argument(s))",
                join_point.signature(),
                join_point.args.len()
            );
        } else {
            tracing::info!("→ Entering: {}", join_point.signature());
        }
        Ok(())
    }

    fn after(&self, join_point: &JoinPoint<'_>) {
        tracing::info!(
            "← Exiting: {} (took {:?})",
            join_point.signature(),
            join_point.elapsed()
        );
    }
}

/// 性能监控切面
pub struct PerformanceAspect {
    threshold: Duration,
    pointcut: PointcutExpression,
}

impl PerformanceAspect {
    pub fn new(threshold: Duration, pointcut: PointcutExpression) -> Self {
        Self {
            threshold,
            pointcut,
        }
    }
}

impl Aspect for PerformanceAspect {
    fn name(&self) -> &str {
        "PerformanceAspect"
    }

    fn pointcut(&self) -> &PointcutExpression {
        &self.pointcut
    }

    fn after(&self, join_point: &JoinPoint<'_>) {
        let elapsed = join_point.elapsed();
        if elapsed > self.threshold {
            tracing::warn!(
                "Slow method detected: {} took {:?} (threshold: {:?})",
                join_point.signature(),
                elapsed,
                self.threshold
            );
        }
    }
}

/// 异常处理切面
pub struct ExceptionHandlingAspect {
    pointcut: PointcutExpression,
}

impl ExceptionHandlingAspect {
    pub fn new(pointcut: PointcutExpression) -> Self {
        Self { pointcut }
    }
}

impl Aspect for ExceptionHandlingAspect {
    fn name(&self) -> &str {
        "ExceptionHandlingAspect"
    }

    fn pointcut(&self) -> &PointcutExpression {
        &self.pointcut
    }

    fn after_throwing(&self, join_point: &JoinPoint<'_>, error: &anyhow::Error) {
        tracing::error!("Exception in {}: {:#}", join_point.signature(), error);
    }
}
