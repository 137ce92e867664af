//! 拦截器链构建
//!
//! 通知器在创建链工厂时一次性转换为拦截器，之后对同一 (目标类型, 方法)
//! 构建的链总是相同的。

use std::fmt;
use std::sync::Arc;

use beanstalk_core::TypeKey;

use crate::adapter::AdvisorAdapterRegistry;
use crate::advice::MethodInterceptor;
use crate::advisor::{Advisor, AdvisorKind};
use crate::error::AopResult;
use crate::joinpoint::Method;
use crate::pointcut::{MethodMatcher, TargetClass};

/// 链上的一个条目
#[derive(Clone)]
pub enum ChainEntry {
    /// 静态匹配已确定，直接执行
    Unconditional {
        advisor: String,
        interceptor: Arc<dyn MethodInterceptor>,
    },
    /// 每次调用前根据参数检查
    Guarded {
        advisor: String,
        interceptor: Arc<dyn MethodInterceptor>,
        matcher: Arc<dyn MethodMatcher>,
    },
}

impl ChainEntry {
    pub fn advisor_name(&self) -> &str {
        match self {
            Self::Unconditional { advisor, .. } | Self::Guarded { advisor, .. } => advisor,
        }
    }

    pub fn interceptor(&self) -> &Arc<dyn MethodInterceptor> {
        match self {
            Self::Unconditional { interceptor, .. } | Self::Guarded { interceptor, .. } => {
                interceptor
            }
        }
    }

    pub fn is_guarded(&self) -> bool {
        matches!(self, Self::Guarded { .. })
    }
}

impl PartialEq for ChainEntry {
    /// 同一通知器的同一拦截器实例
    fn eq(&self, other: &Self) -> bool {
        self.advisor_name() == other.advisor_name()
            && self.is_guarded() == other.is_guarded()
            && std::ptr::eq(
                Arc::as_ptr(self.interceptor()) as *const (),
                Arc::as_ptr(other.interceptor()) as *const (),
            )
    }
}

impl fmt::Debug for ChainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_guarded() { "Guarded" } else { "Unconditional" };
        write!(f, "{}({})", kind, self.advisor_name())
    }
}

struct ResolvedAdvisor {
    name: String,
    kind: AdvisorKind,
    interceptor: Arc<dyn MethodInterceptor>,
}

/// 拦截器链工厂
pub struct AdvisorChainFactory {
    advisors: Vec<ResolvedAdvisor>,
}

impl AdvisorChainFactory {
    /// 按 `order` 稳定排序，并把每个通知转换为拦截器
    ///
    /// 任何一个通知无法转换都会失败，而不是在调用时才发现。
    pub fn new(
        advisors: &[Arc<dyn Advisor>],
        adapters: &AdvisorAdapterRegistry,
    ) -> AopResult<Self> {
        let mut sorted = advisors.to_vec();
        sorted.sort_by_key(|a| a.order());

        let advisors = sorted
            .iter()
            .map(|advisor| {
                let interceptor = adapters.get_interceptor(advisor.name(), &advisor.advice())?;
                Ok(ResolvedAdvisor {
                    name: advisor.name().to_string(),
                    kind: advisor.kind(),
                    interceptor,
                })
            })
            .collect::<AopResult<Vec<_>>>()?;

        Ok(Self { advisors })
    }

    pub fn len(&self) -> usize {
        self.advisors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.advisors.is_empty()
    }

    /// 构建 `method` 在 `target` 上的拦截器链
    pub fn build_chain(&self, target: &TargetClass, method: &Method) -> Vec<ChainEntry> {
        let mut chain = Vec::new();
        for advisor in &self.advisors {
            match &advisor.kind {
                AdvisorKind::Introduction { class_filter, .. } => {
                    if class_filter.matches(target) {
                        chain.push(ChainEntry::Unconditional {
                            advisor: advisor.name.clone(),
                            interceptor: advisor.interceptor.clone(),
                        });
                    }
                }
                AdvisorKind::Pointcut {
                    class_filter,
                    method_matcher,
                } => {
                    if !class_filter.matches(target) || !method_matcher.matches(method, target) {
                        continue;
                    }
                    let entry = if method_matcher.is_runtime() {
                        ChainEntry::Guarded {
                            advisor: advisor.name.clone(),
                            interceptor: advisor.interceptor.clone(),
                            matcher: method_matcher.clone(),
                        }
                    } else {
                        ChainEntry::Unconditional {
                            advisor: advisor.name.clone(),
                            interceptor: advisor.interceptor.clone(),
                        }
                    };
                    chain.push(entry);
                }
            }
        }

        tracing::trace!(
            "Built chain for {} on '{}': {:?}",
            method,
            target.bean_name(),
            chain
        );
        chain
    }

    /// 是否有通知器适用于 `target` 的任一方法
    pub fn can_apply(&self, target: &TargetClass, methods: &[Method]) -> bool {
        self.advisors.iter().any(|advisor| match &advisor.kind {
            AdvisorKind::Introduction { class_filter, .. } => class_filter.matches(target),
            AdvisorKind::Pointcut {
                class_filter,
                method_matcher,
            } => {
                class_filter.matches(target)
                    && methods.iter().any(|m| method_matcher.matches(m, target))
            }
        })
    }

    /// 适用于 `target` 的引介接口
    pub fn introduced_interfaces(&self, target: &TargetClass) -> Vec<TypeKey> {
        let mut result = Vec::new();
        for advisor in &self.advisors {
            if let AdvisorKind::Introduction {
                class_filter,
                interfaces,
            } = &advisor.kind
            {
                if class_filter.matches(target) {
                    for key in interfaces {
                        if !result.contains(key) {
                            result.push(*key);
                        }
                    }
                }
            }
        }
        result
    }
}

impl fmt::Debug for AdvisorChainFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.advisors.iter().map(|a| &a.name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::Advice;
    use crate::advisor::DefaultPointcutAdvisor;
    use crate::joinpoint::{InvocationResult, MethodInvocation};
    use crate::pointcut::PointcutExpression;

    struct PassThrough;

    impl MethodInterceptor for PassThrough {
        fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult {
            invocation.proceed()
        }
    }

    struct UserService;
    struct OrderRepository;

    fn advisor(name: &str, expr: PointcutExpression, order: i32) -> Arc<dyn Advisor> {
        Arc::new(
            DefaultPointcutAdvisor::new(name, expr, Advice::interceptor(PassThrough))
                .with_order(order),
        )
    }

    fn names(chain: &[ChainEntry]) -> Vec<&str> {
        chain.iter().map(|e| e.advisor_name()).collect()
    }

    #[test]
    fn test_chain_order_and_filtering() {
        let advisors = vec![
            advisor("tx", PointcutExpression::type_pattern("*Service"), 20),
            advisor("security", PointcutExpression::All, 10),
            advisor("repo", PointcutExpression::type_pattern("*Repository"), 0),
            advisor("getters", PointcutExpression::method_pattern("get_*"), 20),
        ];
        let factory = AdvisorChainFactory::new(&advisors, &AdvisorAdapterRegistry::new()).unwrap();
        let target = TargetClass::of::<UserService>("userService");

        let chain = factory.build_chain(&target, &Method::of::<UserService>("get_user"));
        assert_eq!(names(&chain), vec!["security", "tx", "getters"]);

        let chain = factory.build_chain(&target, &Method::of::<UserService>("save"));
        assert_eq!(names(&chain), vec!["security", "tx"]);
    }

    #[test]
    fn test_chain_is_deterministic() {
        let advisors = vec![
            advisor("a", PointcutExpression::All, 5),
            advisor("b", PointcutExpression::All, 5),
            advisor("c", PointcutExpression::All, 1),
        ];
        let factory = AdvisorChainFactory::new(&advisors, &AdvisorAdapterRegistry::new()).unwrap();
        let target = TargetClass::of::<UserService>("userService");
        let method = Method::of::<UserService>("get_user");

        let first = factory.build_chain(&target, &method);
        for _ in 0..10 {
            assert_eq!(factory.build_chain(&target, &method), first);
        }
        assert_eq!(names(&first), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_runtime_matchers_are_guarded() {
        let advisors = vec![
            advisor("static", PointcutExpression::All, 0),
            advisor(
                "dynamic",
                PointcutExpression::runtime(|_, _, args| !args.is_empty()),
                1,
            ),
        ];
        let factory = AdvisorChainFactory::new(&advisors, &AdvisorAdapterRegistry::new()).unwrap();
        let chain = factory.build_chain(
            &TargetClass::of::<UserService>("userService"),
            &Method::of::<UserService>("get_user"),
        );
        assert!(!chain[0].is_guarded());
        assert!(chain[1].is_guarded());
    }

    #[test]
    fn test_can_apply() {
        let advisors = vec![advisor("svc", PointcutExpression::type_pattern("*Service"), 0)];
        let factory = AdvisorChainFactory::new(&advisors, &AdvisorAdapterRegistry::new()).unwrap();
        let methods = vec![Method::of::<UserService>("get_user")];

        assert!(factory.can_apply(&TargetClass::of::<UserService>("u"), &methods));
        assert!(!factory.can_apply(&TargetClass::of::<OrderRepository>("o"), &methods));
        assert!(!factory.can_apply(&TargetClass::of::<UserService>("u"), &[]));
    }
}
