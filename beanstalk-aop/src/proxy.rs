//! AOP 代理
//!
//! 代理持有目标对象和拦截器链工厂。每个方法的链在第一次调用时构建并缓存，
//! 之后的调用直接复用。

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use beanstalk_core::{BeanRef, TypeKey};
use parking_lot::RwLock;
use serde::Deserialize;

use crate::chain::{AdvisorChainFactory, ChainEntry};
use crate::context::AopContext;
use crate::error::{AopError, AopResult};
use crate::joinpoint::{Args, Invocable, InvocationResult, Method, MethodInvocation};
use crate::pointcut::TargetClass;

/// 代理配置，对应配置文件中的 `[aop]` 表
///
/// ```toml
/// [aop]
/// proxy_target_class = false
/// expose_proxy = true
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProxyConfig {
    /// 总是代理目标类型本身，而不是它的接口
    pub proxy_target_class: bool,

    /// 调用期间通过 [`AopContext::current_proxy`] 暴露代理
    pub expose_proxy: bool,

    /// 显式指定的代理接口；为空时使用目标声明的接口
    #[serde(skip)]
    pub interfaces: Vec<TypeKey>,
}

#[derive(Deserialize, Default)]
struct AopSection {
    #[serde(default)]
    aop: ProxyConfig,
}

impl ProxyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn proxy_target_class(mut self, value: bool) -> Self {
        self.proxy_target_class = value;
        self
    }

    pub fn expose_proxy(mut self, value: bool) -> Self {
        self.expose_proxy = value;
        self
    }

    pub fn interface<I: ?Sized + 'static>(mut self) -> Self {
        self.interfaces.push(TypeKey::of::<I>());
        self
    }

    /// 从完整配置文件内容中读取 `[aop]` 表，其他表忽略
    pub fn from_toml_str(content: &str) -> AopResult<Self> {
        toml::from_str::<AopSection>(content)
            .map(|section| section.aop)
            .map_err(|e| AopError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> AopResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| AopError::Config(format!("failed to read '{}': {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }
}

/// 代理方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyKind {
    /// 只暴露给定接口上的方法
    Interface(Vec<TypeKey>),
    /// 暴露目标的全部方法
    Subclass(TypeKey),
}

type StubFn = Arc<dyn Fn(Arc<AopProxy>) -> Box<dyn Any + Send + Sync> + Send + Sync>;

/// 接口桩注册表
///
/// 桩把对 `dyn Trait` 方法的调用转交给代理，使代理可以作为 `Arc<dyn Trait>` 使用。
#[derive(Clone, Default)]
pub struct InterfaceStubs {
    stubs: HashMap<TypeKey, StubFn>,
}

impl InterfaceStubs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<I>(&mut self, stub: fn(Arc<AopProxy>) -> Arc<I>)
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let erased: StubFn = Arc::new(move |proxy| Box::new(stub(proxy)) as Box<dyn Any + Send + Sync>);
        self.stubs.insert(TypeKey::of::<I>(), erased);
    }

    pub fn with<I>(mut self, stub: fn(Arc<AopProxy>) -> Arc<I>) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.register(stub);
        self
    }

    pub fn contains(&self, key: TypeKey) -> bool {
        self.stubs.contains_key(&key)
    }

    fn create(&self, key: TypeKey, proxy: Arc<AopProxy>) -> Option<Box<dyn Any + Send + Sync>> {
        self.stubs.get(&key).map(|stub| stub(proxy))
    }
}

impl fmt::Debug for InterfaceStubs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.stubs.keys()).finish()
    }
}

/// AOP 代理
pub struct AopProxy {
    target: BeanRef,
    invocable: Arc<dyn Invocable>,
    target_class: TargetClass,
    kind: ProxyKind,
    introduced: Vec<TypeKey>,
    chain_factory: Arc<AdvisorChainFactory>,
    chain_cache: RwLock<HashMap<Method, Arc<[ChainEntry]>>>,
    expose_proxy: bool,
    stubs: Arc<InterfaceStubs>,
}

impl AopProxy {
    pub fn target(&self) -> &BeanRef {
        &self.target
    }

    /// 以具体类型访问目标对象（绕过所有通知）
    pub fn target_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.target.clone().downcast::<T>().ok()
    }

    pub fn target_class(&self) -> &TargetClass {
        &self.target_class
    }

    pub fn kind(&self) -> &ProxyKind {
        &self.kind
    }

    pub fn introduced_interfaces(&self) -> &[TypeKey] {
        &self.introduced
    }

    /// 代理是否暴露该接口
    pub fn exposes(&self, key: TypeKey) -> bool {
        if self.introduced.contains(&key) {
            return true;
        }
        match &self.kind {
            ProxyKind::Interface(keys) => keys.contains(&key),
            ProxyKind::Subclass(type_key) => {
                *type_key == key || self.target_class.is_assignable_to(key)
            }
        }
    }

    /// 通过代理调用方法
    pub fn invoke(self: &Arc<Self>, method: &Method, mut args: Args) -> InvocationResult {
        if !self.exposes(method.owner()) {
            return Err(AopError::MethodNotExposed {
                target: self.target_class.bean_name().to_string(),
                method: method.signature(),
            }
            .into());
        }

        let chain = self.chain_for(method);
        let _scope = self.expose_proxy.then(|| AopContext::enter(self.clone()));

        let mut invocation = MethodInvocation::new(
            method,
            &mut args,
            &self.invocable,
            &self.target_class,
            &chain,
        );
        invocation.proceed()
    }

    /// 调用并把返回值转换为 `R`
    pub fn invoke_as<R: Any>(self: &Arc<Self>, method: &Method, args: Args) -> anyhow::Result<R> {
        let value = self.invoke(method, args)?;
        value.downcast::<R>().map(|boxed| *boxed).map_err(|_| {
            AopError::ReturnTypeMismatch {
                method: method.signature(),
                expected: std::any::type_name::<R>(),
            }
            .into()
        })
    }

    /// 以接口视图使用代理
    pub fn view<I: ?Sized + 'static>(self: &Arc<Self>) -> AopResult<Arc<I>> {
        let key = TypeKey::of::<I>();
        self.view_boxed(key)
            .and_then(|boxed| boxed.downcast::<Arc<I>>().ok())
            .map(|boxed| *boxed)
            .ok_or_else(|| AopError::ViewNotSupported {
                target: self.target_class.bean_name().to_string(),
                view: key.short_name(),
            })
    }

    pub(crate) fn view_boxed(self: &Arc<Self>, key: TypeKey) -> Option<Box<dyn Any + Send + Sync>> {
        if !self.exposes(key) {
            return None;
        }
        self.stubs.create(key, self.clone())
    }

    /// 方法对应的拦截器链（已缓存）
    pub fn chain_for(&self, method: &Method) -> Arc<[ChainEntry]> {
        if let Some(chain) = self.chain_cache.read().get(method) {
            return chain.clone();
        }
        let chain: Arc<[ChainEntry]> = self
            .chain_factory
            .build_chain(&self.target_class, method)
            .into();
        self.chain_cache
            .write()
            .entry(*method)
            .or_insert(chain)
            .clone()
    }
}

impl fmt::Debug for AopProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AopProxy")
            .field("target", &self.target_class.bean_name())
            .field("kind", &self.kind)
            .field("advisors", &self.chain_factory)
            .finish()
    }
}

/// 代理工厂
pub struct ProxyFactory {
    config: ProxyConfig,
    chain_factory: Arc<AdvisorChainFactory>,
    stubs: Arc<InterfaceStubs>,
}

impl ProxyFactory {
    pub fn new(config: ProxyConfig, chain_factory: Arc<AdvisorChainFactory>, stubs: Arc<InterfaceStubs>) -> Self {
        Self {
            config,
            chain_factory,
            stubs,
        }
    }

    /// 决定代理方式：有可用接口时使用接口代理，否则代理目标类型本身
    pub fn determine_kind(&self, target: &TargetClass) -> ProxyKind {
        if self.config.proxy_target_class {
            return ProxyKind::Subclass(target.type_key());
        }

        let invocable = TypeKey::of::<dyn Invocable>();
        let mut interfaces: Vec<TypeKey> = if self.config.interfaces.is_empty() {
            target
                .interfaces()
                .iter()
                .copied()
                .filter(|key| *key != invocable)
                .collect()
        } else {
            self.config.interfaces.clone()
        };

        for key in self.chain_factory.introduced_interfaces(target) {
            if !interfaces.contains(&key) {
                interfaces.push(key);
            }
        }

        if interfaces.is_empty() {
            ProxyKind::Subclass(target.type_key())
        } else {
            ProxyKind::Interface(interfaces)
        }
    }

    pub fn get_proxy(
        &self,
        target: BeanRef,
        invocable: Arc<dyn Invocable>,
        target_class: TargetClass,
    ) -> Arc<AopProxy> {
        let kind = self.determine_kind(&target_class);
        let introduced = self.chain_factory.introduced_interfaces(&target_class);
        tracing::debug!(
            "Creating {:?} proxy for bean '{}'",
            kind,
            target_class.bean_name()
        );

        Arc::new(AopProxy {
            target,
            invocable,
            target_class,
            kind,
            introduced,
            chain_factory: self.chain_factory.clone(),
            chain_cache: RwLock::new(HashMap::new()),
            expose_proxy: self.config.expose_proxy,
            stubs: self.stubs.clone(),
        })
    }
}
