//! 自动代理创建器
//!
//! 作为 BeanPostProcessor 接入容器：为匹配到通知器的 Bean 创建代理。
//! 通知器来自两处：显式传入的列表，以及容器中声明实现了 `dyn Advisor` 的 Bean。

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use beanstalk_core::{
    same_instance, BeanPostProcessor, BeanRef, ContainerResult, DefaultListableBeanFactory,
    ListableBeanFactory, ProcessingContext, TypeKey, ViewResolver,
};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::adapter::AdvisorAdapterRegistry;
use crate::advisor::{Advisor, AdvisorRegistry};
use crate::chain::AdvisorChainFactory;
use crate::joinpoint::Invocable;
use crate::pointcut::TargetClass;
use crate::proxy::{AopProxy, InterfaceStubs, ProxyConfig, ProxyFactory};

/// 自动代理创建器的执行顺序，排在普通后置处理器之后
pub const AUTO_PROXY_ORDER: i32 = 2000;

/// 提前暴露的代理
///
/// 只持有弱引用：创建失败时半成品被丢弃，记录随之失效。
struct EarlyProxy {
    target: Weak<dyn Any + Send + Sync>,
    proxy: Weak<dyn Any + Send + Sync>,
}

impl EarlyProxy {
    fn is_live(&self) -> bool {
        self.proxy.strong_count() > 0
    }

    /// `bean` 仍是提前暴露时的目标时返回当时的代理
    fn proxy_for(&self, bean: &BeanRef) -> Option<BeanRef> {
        let target = self.target.upgrade()?;
        if same_instance(&target, bean) {
            self.proxy.upgrade()
        } else {
            None
        }
    }
}

/// 自动代理创建器
pub struct AutoProxyCreator {
    config: ProxyConfig,
    advisors: AdvisorRegistry,
    adapters: AdvisorAdapterRegistry,
    stubs: Arc<InterfaceStubs>,
    /// 容器中通知器 Bean 的名称，首次使用时确定
    advisor_bean_names: OnceCell<Vec<String>>,
    /// 提前暴露时创建的代理，初始化完成后必须返回同一个
    early_proxies: Mutex<HashMap<String, EarlyProxy>>,
}

impl AutoProxyCreator {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            advisors: AdvisorRegistry::new(),
            adapters: AdvisorAdapterRegistry::new(),
            stubs: Arc::new(InterfaceStubs::new()),
            advisor_bean_names: OnceCell::new(),
            early_proxies: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_advisor(mut self, advisor: impl Advisor + 'static) -> Self {
        self.advisors.add(Arc::new(advisor));
        self
    }

    pub fn with_advisors(mut self, advisors: AdvisorRegistry) -> Self {
        self.advisors = advisors;
        self
    }

    pub fn with_adapters(mut self, adapters: AdvisorAdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn with_stubs(mut self, stubs: InterfaceStubs) -> Self {
        self.stubs = Arc::new(stubs);
        self
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// 已提前暴露、尚未完成初始化的代理数量
    pub fn pending_early_proxies(&self) -> usize {
        let mut early = self.early_proxies.lock();
        early.retain(|_, entry| entry.is_live());
        early.len()
    }

    /// 注册为后置处理器和视图解析器
    pub fn install(self, factory: &DefaultListableBeanFactory) -> ContainerResult<Arc<Self>> {
        let creator = Arc::new(self);
        factory.add_bean_post_processor(creator.clone())?;
        factory.add_view_resolver(Arc::new(ProxyViewResolver))?;
        tracing::info!(
            "AutoProxyCreator installed with {} explicit advisor(s)",
            creator.advisors.len()
        );
        Ok(creator)
    }

    /// 当前可用的通知器
    ///
    /// 正在创建中的通知器 Bean 会被跳过，避免通知器依赖被代理的 Bean 时无限递归。
    fn candidate_advisors(
        &self,
        ctx: &ProcessingContext<'_>,
    ) -> anyhow::Result<Vec<Arc<dyn Advisor>>> {
        let names = self
            .advisor_bean_names
            .get_or_init(|| ctx.factory.bean_names_for_type(TypeKey::of::<dyn Advisor>()));

        let mut advisors = self.advisors.sorted();
        for name in names {
            if ctx.factory.is_currently_in_creation(name) {
                tracing::debug!(
                    "Skipping advisor bean '{}' while it is in creation (requested by '{}')",
                    name,
                    ctx.bean_name()
                );
                continue;
            }
            advisors.push(ctx.factory.get_bean_as::<dyn Advisor>(name)?);
        }
        Ok(advisors)
    }

    fn wrap_if_necessary(
        &self,
        bean: BeanRef,
        ctx: &ProcessingContext<'_>,
    ) -> anyhow::Result<BeanRef> {
        let definition = ctx.definition;
        if definition.is_assignable_to(TypeKey::of::<dyn Advisor>()) {
            return Ok(bean);
        }

        let Some(invocable) = definition
            .cast_view(&bean, TypeKey::of::<dyn Invocable>())
            .and_then(|boxed| boxed.downcast::<Arc<dyn Invocable>>().ok())
            .map(|boxed| *boxed)
        else {
            tracing::trace!("Bean '{}' is not invocable, not proxied", ctx.bean_name());
            return Ok(bean);
        };

        let advisors = self.candidate_advisors(ctx)?;
        if advisors.is_empty() {
            return Ok(bean);
        }

        let target_class = TargetClass::new(ctx.bean_name(), definition.bean_type())
            .with_interfaces(definition.interfaces());
        let chain_factory = AdvisorChainFactory::new(&advisors, &self.adapters)?;
        if !chain_factory.can_apply(&target_class, &invocable.methods()) {
            tracing::trace!("No advisor applies to bean '{}'", ctx.bean_name());
            return Ok(bean);
        }

        let factory = ProxyFactory::new(
            self.config.clone(),
            Arc::new(chain_factory),
            self.stubs.clone(),
        );
        let proxy: BeanRef = factory.get_proxy(bean, invocable, target_class);
        tracing::debug!("Created proxy for bean '{}'", ctx.bean_name());
        Ok(proxy)
    }
}

impl BeanPostProcessor for AutoProxyCreator {
    fn get_early_bean_reference(
        &self,
        bean: BeanRef,
        ctx: &ProcessingContext<'_>,
    ) -> anyhow::Result<BeanRef> {
        let exposed = self.wrap_if_necessary(bean.clone(), ctx)?;
        if !same_instance(&exposed, &bean) {
            let mut early = self.early_proxies.lock();
            early.retain(|_, entry| entry.is_live());
            early.insert(
                ctx.bean_name().to_string(),
                EarlyProxy {
                    target: Arc::downgrade(&bean),
                    proxy: Arc::downgrade(&exposed),
                },
            );
        }
        Ok(exposed)
    }

    fn post_process_after_initialization(
        &self,
        bean: BeanRef,
        ctx: &ProcessingContext<'_>,
    ) -> anyhow::Result<BeanRef> {
        let early = self
            .early_proxies
            .lock()
            .remove(ctx.bean_name())
            .and_then(|early| early.proxy_for(&bean));
        match early {
            Some(proxy) => {
                tracing::trace!("Reusing early proxy for bean '{}'", ctx.bean_name());
                Ok(proxy)
            }
            None => self.wrap_if_necessary(bean, ctx),
        }
    }

    fn name(&self) -> &str {
        "AutoProxyCreator"
    }

    fn order(&self) -> i32 {
        AUTO_PROXY_ORDER
    }
}

/// 为代理提供接口视图
pub struct ProxyViewResolver;

impl ViewResolver for ProxyViewResolver {
    fn resolve_view(&self, bean: &BeanRef, key: TypeKey) -> Option<Box<dyn Any + Send + Sync>> {
        let proxy = bean.clone().downcast::<AopProxy>().ok()?;
        proxy.view_boxed(key)
    }
}
