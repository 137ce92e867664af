//! 通知适配器
//!
//! 把非拦截器形态的通知转换为 [`MethodInterceptor`]。
//! 适配器注册表是显式传入的值，不存在全局默认实例。

use std::sync::Arc;

use crate::advice::{
    Advice, AfterAdviceInterceptor, AfterReturningAdviceInterceptor, BeforeAdviceInterceptor,
    MethodInterceptor, ThrowsAdviceInterceptor,
};
use crate::error::{AopError, AopResult};

/// 通知适配器
pub trait AdvisorAdapter: Send + Sync {
    fn supports_advice(&self, advice: &Advice) -> bool;

    /// 仅在 `supports_advice` 返回 true 时调用
    fn get_interceptor(&self, advice: &Advice) -> Option<Arc<dyn MethodInterceptor>>;
}

pub struct BeforeAdviceAdapter;

impl AdvisorAdapter for BeforeAdviceAdapter {
    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::Before(_))
    }

    fn get_interceptor(&self, advice: &Advice) -> Option<Arc<dyn MethodInterceptor>> {
        match advice {
            Advice::Before(a) => Some(Arc::new(BeforeAdviceInterceptor::new(a.clone()))),
            _ => None,
        }
    }
}

pub struct AfterReturningAdviceAdapter;

impl AdvisorAdapter for AfterReturningAdviceAdapter {
    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::AfterReturning(_))
    }

    fn get_interceptor(&self, advice: &Advice) -> Option<Arc<dyn MethodInterceptor>> {
        match advice {
            Advice::AfterReturning(a) => {
                Some(Arc::new(AfterReturningAdviceInterceptor::new(a.clone())))
            }
            _ => None,
        }
    }
}

pub struct ThrowsAdviceAdapter;

impl AdvisorAdapter for ThrowsAdviceAdapter {
    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::Throws(_))
    }

    fn get_interceptor(&self, advice: &Advice) -> Option<Arc<dyn MethodInterceptor>> {
        match advice {
            Advice::Throws(a) => Some(Arc::new(ThrowsAdviceInterceptor::new(a.clone()))),
            _ => None,
        }
    }
}

pub struct AfterAdviceAdapter;

impl AdvisorAdapter for AfterAdviceAdapter {
    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::After(_))
    }

    fn get_interceptor(&self, advice: &Advice) -> Option<Arc<dyn MethodInterceptor>> {
        match advice {
            Advice::After(a) => Some(Arc::new(AfterAdviceInterceptor::new(a.clone()))),
            _ => None,
        }
    }
}

/// 适配器注册表
#[derive(Clone)]
pub struct AdvisorAdapterRegistry {
    adapters: Vec<Arc<dyn AdvisorAdapter>>,
}

impl Default for AdvisorAdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdvisorAdapterRegistry {
    /// 包含内置的前置、返回后、异常、最终通知适配器
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_adapter(BeforeAdviceAdapter);
        registry.register_adapter(AfterReturningAdviceAdapter);
        registry.register_adapter(ThrowsAdviceAdapter);
        registry.register_adapter(AfterAdviceAdapter);
        registry
    }

    /// 不含任何适配器，只接受拦截器形态的通知
    pub fn empty() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    pub fn register_adapter(&mut self, adapter: impl AdvisorAdapter + 'static) {
        self.adapters.push(Arc::new(adapter));
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// 将通知转换为拦截器
    pub fn get_interceptor(
        &self,
        advisor: &str,
        advice: &Advice,
    ) -> AopResult<Arc<dyn MethodInterceptor>> {
        if let Advice::Interceptor(interceptor) = advice {
            return Ok(interceptor.clone());
        }

        self.adapters
            .iter()
            .filter(|adapter| adapter.supports_advice(advice))
            .find_map(|adapter| adapter.get_interceptor(advice))
            .ok_or_else(|| AopError::UnsupportedAdviceType {
                advisor: advisor.to_string(),
                advice: advice.kind().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::BeforeAdvice;
    use crate::joinpoint::{Args, InvocationResult, Method, MethodInvocation};
    use crate::pointcut::TargetClass;

    struct Noop;

    impl BeforeAdvice for Noop {
        fn before(&self, _: &Method, _: &mut Args, _: &TargetClass) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct PassThrough;

    impl MethodInterceptor for PassThrough {
        fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult {
            invocation.proceed()
        }
    }

    /// 把 `Custom { kind: "noop" }` 适配为直通拦截器
    struct NoopAdapter;

    impl AdvisorAdapter for NoopAdapter {
        fn supports_advice(&self, advice: &Advice) -> bool {
            advice.kind() == "noop"
        }

        fn get_interceptor(&self, _: &Advice) -> Option<Arc<dyn MethodInterceptor>> {
            Some(Arc::new(PassThrough))
        }
    }

    #[test]
    fn test_default_registry_adapts_builtin_advice() {
        let registry = AdvisorAdapterRegistry::new();
        assert_eq!(registry.len(), 4);
        let interceptor = registry.get_interceptor("a", &Advice::before(Noop)).unwrap();
        assert_eq!(interceptor.name(), "BeforeAdviceInterceptor");
    }

    #[test]
    fn test_empty_registry_rejects_before_advice() {
        let registry = AdvisorAdapterRegistry::empty();
        let err = registry
            .get_interceptor("auditAdvisor", &Advice::before(Noop))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AopError::UnsupportedAdviceType { ref advisor, ref advice }
                if advisor == "auditAdvisor" && advice == "before"
        ));

        // 拦截器形态不需要适配器
        assert!(registry
            .get_interceptor("a", &Advice::interceptor(PassThrough))
            .is_ok());
    }

    #[test]
    fn test_custom_adapter() {
        let mut registry = AdvisorAdapterRegistry::new();
        let advice = Advice::custom("noop", ());
        assert!(registry.get_interceptor("a", &advice).is_err());

        registry.register_adapter(NoopAdapter);
        assert!(registry.get_interceptor("a", &advice).is_ok());
    }
}
