//! 通知器（Advisor）
//!
//! 通知器把一段通知和它的适用范围绑定在一起：
//! 切点通知器按类型和方法筛选，引介通知器为目标类型增加新的接口。

use std::sync::Arc;

use beanstalk_core::TypeKey;

use crate::advice::{Advice, MethodInterceptor};
use crate::joinpoint::{Args, Invocable, InvocationResult, MethodInvocation};
use crate::pointcut::{ClassFilter, MethodMatcher, Pointcut, PointcutExpression, TargetClass};

/// 未指定顺序的通知器排在最后
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

/// 通知器的适用范围
#[derive(Clone)]
pub enum AdvisorKind {
    Pointcut {
        class_filter: Arc<dyn ClassFilter>,
        method_matcher: Arc<dyn MethodMatcher>,
    },
    Introduction {
        class_filter: Arc<dyn ClassFilter>,
        interfaces: Vec<TypeKey>,
    },
}

impl AdvisorKind {
    pub fn class_filter(&self) -> &Arc<dyn ClassFilter> {
        match self {
            Self::Pointcut { class_filter, .. } | Self::Introduction { class_filter, .. } => {
                class_filter
            }
        }
    }
}

/// 通知器
pub trait Advisor: Send + Sync {
    fn name(&self) -> &str;

    fn advice(&self) -> Advice;

    fn kind(&self) -> AdvisorKind;

    /// 数值越小越靠外层；相同顺序按注册顺序排列
    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }
}

/// 基于切点的通知器
pub struct DefaultPointcutAdvisor {
    name: String,
    class_filter: Arc<dyn ClassFilter>,
    method_matcher: Arc<dyn MethodMatcher>,
    advice: Advice,
    order: i32,
}

impl DefaultPointcutAdvisor {
    pub fn new(name: impl Into<String>, expression: PointcutExpression, advice: Advice) -> Self {
        Self::with_pointcut(name, &expression.into_pointcut(), advice)
    }

    pub fn with_pointcut(name: impl Into<String>, pointcut: &dyn Pointcut, advice: Advice) -> Self {
        Self {
            name: name.into(),
            class_filter: pointcut.class_filter(),
            method_matcher: pointcut.method_matcher(),
            advice,
            order: LOWEST_PRECEDENCE,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

impl Advisor for DefaultPointcutAdvisor {
    fn name(&self) -> &str {
        &self.name
    }

    fn advice(&self) -> Advice {
        self.advice.clone()
    }

    fn kind(&self) -> AdvisorKind {
        AdvisorKind::Pointcut {
            class_filter: self.class_filter.clone(),
            method_matcher: self.method_matcher.clone(),
        }
    }

    fn order(&self) -> i32 {
        self.order
    }
}

/// 引介拦截器：引介接口上的方法交给委托对象处理，其余方法继续执行链
pub struct DelegatingIntroductionInterceptor {
    interfaces: Vec<TypeKey>,
    delegate: Arc<dyn Invocable>,
}

impl DelegatingIntroductionInterceptor {
    pub fn new(delegate: Arc<dyn Invocable>) -> Self {
        Self {
            interfaces: Vec::new(),
            delegate,
        }
    }

    pub fn introduce<I: ?Sized + 'static>(mut self) -> Self {
        let key = TypeKey::of::<I>();
        if !self.interfaces.contains(&key) {
            self.interfaces.push(key);
        }
        self
    }

    pub fn interfaces(&self) -> &[TypeKey] {
        &self.interfaces
    }

    fn is_introduced(&self, owner: TypeKey) -> bool {
        self.interfaces.contains(&owner)
    }
}

impl MethodInterceptor for DelegatingIntroductionInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult {
        let method = *invocation.method();
        if self.is_introduced(method.owner()) {
            tracing::trace!(
                "Delegating introduced method {} on '{}'",
                method,
                invocation.target_class().bean_name()
            );
            let args: &mut Args = invocation.args_mut();
            return self.delegate.invoke_method(&method, args);
        }
        invocation.proceed()
    }

    fn name(&self) -> &str {
        "DelegatingIntroductionInterceptor"
    }
}

/// 引介通知器
pub struct DefaultIntroductionAdvisor {
    name: String,
    interceptor: Arc<DelegatingIntroductionInterceptor>,
    class_filter: Arc<dyn ClassFilter>,
    order: i32,
}

impl DefaultIntroductionAdvisor {
    /// 默认对所有目标类型生效
    pub fn new(name: impl Into<String>, interceptor: DelegatingIntroductionInterceptor) -> Self {
        Self {
            name: name.into(),
            interceptor: Arc::new(interceptor),
            class_filter: Arc::new(PointcutExpression::All),
            order: LOWEST_PRECEDENCE,
        }
    }

    pub fn with_class_filter(mut self, expression: PointcutExpression) -> Self {
        self.class_filter = Arc::new(expression);
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

impl Advisor for DefaultIntroductionAdvisor {
    fn name(&self) -> &str {
        &self.name
    }

    fn advice(&self) -> Advice {
        Advice::Interceptor(self.interceptor.clone())
    }

    fn kind(&self) -> AdvisorKind {
        AdvisorKind::Introduction {
            class_filter: self.class_filter.clone(),
            interfaces: self.interceptor.interfaces().to_vec(),
        }
    }

    fn order(&self) -> i32 {
        self.order
    }
}

/// 有序的通知器列表
///
/// 顺序完全由显式传入的配置决定：先按 `order` 排序，相同时保持注册顺序。
#[derive(Clone, Default)]
pub struct AdvisorRegistry {
    advisors: Vec<Arc<dyn Advisor>>,
}

impl AdvisorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, advisor: Arc<dyn Advisor>) {
        tracing::debug!("Registered advisor '{}' (order {})", advisor.name(), advisor.order());
        self.advisors.push(advisor);
    }

    pub fn with(mut self, advisor: impl Advisor + 'static) -> Self {
        self.add(Arc::new(advisor));
        self
    }

    pub fn len(&self) -> usize {
        self.advisors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.advisors.is_empty()
    }

    /// 排序后的通知器
    pub fn sorted(&self) -> Vec<Arc<dyn Advisor>> {
        let mut advisors = self.advisors.clone();
        advisors.sort_by_key(|a| a.order());
        advisors
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn Advisor>> {
        self.advisors.iter().find(|a| a.name() == name).cloned()
    }

    /// 至少有一个通知器适用于该目标类型
    pub fn applies_to(&self, target: &TargetClass) -> bool {
        self.advisors
            .iter()
            .any(|a| a.kind().class_filter().matches(target))
    }
}

impl Extend<Arc<dyn Advisor>> for AdvisorRegistry {
    fn extend<T: IntoIterator<Item = Arc<dyn Advisor>>>(&mut self, iter: T) {
        for advisor in iter {
            self.add(advisor);
        }
    }
}
