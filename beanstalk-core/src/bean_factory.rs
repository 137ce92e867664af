//! Bean Factory - 核心容器
//!
//! 创建流程：实例化 → 提前暴露（仅单例）→ 属性填充 → 初始化前钩子 → 初始化回调 →
//! 初始化后钩子 → 一致性检查 → 登记销毁回调。

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use anyhow::anyhow;
use parking_lot::{ReentrantMutex, RwLock};

use crate::bean::{
    resolve_view, same_instance, BeanDefinition, BeanRef, ConstructorCandidate, DependencyRef,
    Injected, ResolvedArgs, TypeKey,
};
use crate::config::ContainerConfig;
use crate::destruction::DisposableBeanRegistry;
use crate::error::{ContainerError, ContainerResult};
use crate::lifecycle::{BeanPostProcessor, ProcessingContext, ViewResolver};
use crate::registry::DefinitionRegistry;
use crate::scope::{CustomScope, Scope};
use crate::session::CreationSession;
use crate::singleton::{EarlyReferenceFn, SingletonRegistry};
use crate::utils::dependency::{validate_dependency_graph, DependencyValidationError};

/// BeanFactory - 最基础的容器接口
///
/// 此 trait 不包含泛型方法，可以作为 trait object 使用
pub trait BeanFactory: Send + Sync {
    /// 通过名称（或别名）获取 Bean
    fn get_bean(&self, name: &str) -> ContainerResult<BeanRef>;

    /// 检查是否包含指定名称的 Bean
    fn contains_bean(&self, name: &str) -> bool;

    fn is_singleton(&self, name: &str) -> ContainerResult<bool>;

    fn is_prototype(&self, name: &str) -> ContainerResult<bool>;
}

/// BeanFactory 的泛型扩展
pub trait BeanFactoryExt: BeanFactory {
    /// 通过名称获取 Bean 并转换为具体类型
    fn get_bean_typed<T: Any + Send + Sync>(&self, name: &str) -> ContainerResult<Arc<T>> {
        self.get_bean(name)?
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>().to_string(),
            })
    }

    /// 通过类型获取唯一的 Bean
    fn get_bean_by_type<T: Any + Send + Sync>(&self) -> ContainerResult<Arc<T>>;
}

/// 可列举的 Bean 工厂
pub trait ListableBeanFactory: BeanFactory {
    /// 所有 Bean 名称（注册顺序）
    fn bean_names(&self) -> Vec<String>;

    /// 可赋值给 `key` 的 Bean 名称（注册顺序）
    fn bean_names_for_type(&self, key: TypeKey) -> Vec<String>;

    fn bean_definition_count(&self) -> usize;
}

/// 默认的 Bean 工厂实现
///
/// 始终以 `Arc` 持有：提前暴露的延迟函数需要弱引用回到工厂。
pub struct DefaultListableBeanFactory {
    self_ref: Weak<DefaultListableBeanFactory>,

    config: ContainerConfig,

    /// Bean 定义存储
    registry: DefinitionRegistry,

    /// 单例三级缓存
    singletons: SingletonRegistry,

    /// 销毁回调与依赖关系
    disposables: DisposableBeanRegistry,

    /// 当前线程正在创建的 Bean
    session: CreationSession,

    /// 单例创建锁，同一时间只有一个线程在创建单例
    creation_lock: ReentrantMutex<()>,

    /// 后置处理器（按 order 稳定排序）
    post_processors: RwLock<Vec<Arc<dyn BeanPostProcessor>>>,

    view_resolvers: RwLock<Arc<[Arc<dyn ViewResolver>]>>,

    scopes: RwLock<HashMap<String, Arc<dyn CustomScope>>>,
}

impl DefaultListableBeanFactory {
    /// 使用默认配置创建
    pub fn new() -> Arc<Self> {
        Self::with_config(ContainerConfig::default())
    }

    pub fn with_config(config: ContainerConfig) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            registry: DefinitionRegistry::new(config.allow_definition_overriding),
            config,
            singletons: SingletonRegistry::new(),
            disposables: DisposableBeanRegistry::new(),
            session: CreationSession::new(),
            creation_lock: ReentrantMutex::new(()),
            post_processors: RwLock::new(Vec::new()),
            view_resolvers: RwLock::new(Arc::from(Vec::new())),
            scopes: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    // ---------------------------------------------------------------
    // 注册
    // ---------------------------------------------------------------

    /// 注册 Bean 定义
    pub fn register_bean_definition(&self, definition: BeanDefinition) -> ContainerResult<()> {
        self.registry.register(definition).map(|_| ())
    }

    /// 注册一个已经存在的实例作为单例
    pub fn register_singleton<T: Any + Send + Sync>(
        &self,
        name: impl Into<String>,
        instance: Arc<T>,
    ) -> ContainerResult<()> {
        self.register_bean_definition(BeanDefinition::instance(name, instance))
    }

    pub fn register_alias(&self, alias: impl Into<String>, name: &str) -> ContainerResult<()> {
        self.registry.register_alias(alias, name)
    }

    /// 注册自定义作用域
    pub fn register_scope(
        &self,
        name: impl Into<String>,
        scope: Arc<dyn CustomScope>,
    ) -> ContainerResult<()> {
        self.ensure_not_sealed("register scope")?;
        let name = name.into();
        if name == "singleton" || name == "prototype" {
            return Err(ContainerError::Config(format!(
                "cannot replace built-in scope '{}'",
                name
            )));
        }
        tracing::debug!("Registered custom scope '{}'", name);
        self.scopes.write().insert(name, scope);
        Ok(())
    }

    /// 添加后置处理器
    pub fn add_bean_post_processor(
        &self,
        processor: Arc<dyn BeanPostProcessor>,
    ) -> ContainerResult<()> {
        self.ensure_not_sealed("add bean post processor")?;
        let mut processors = self.post_processors.write();
        tracing::debug!(
            "Added BeanPostProcessor '{}' with order {}",
            processor.name(),
            processor.order()
        );
        processors.push(processor);
        processors.sort_by_key(|p| p.order());
        Ok(())
    }

    pub fn bean_post_processors(&self) -> Vec<Arc<dyn BeanPostProcessor>> {
        self.post_processors.read().clone()
    }

    /// 添加接口视图解析器
    pub fn add_view_resolver(&self, resolver: Arc<dyn ViewResolver>) -> ContainerResult<()> {
        self.ensure_not_sealed("add view resolver")?;
        let mut resolvers = self.view_resolvers.write();
        let mut updated: Vec<_> = resolvers.iter().cloned().collect();
        updated.push(resolver);
        *resolvers = Arc::from(updated);
        Ok(())
    }

    fn ensure_not_sealed(&self, action: &'static str) -> ContainerResult<()> {
        if self.registry.is_sealed() {
            Err(ContainerError::ConfigurationFrozen(action))
        } else {
            Ok(())
        }
    }

    /// 冻结配置，之后不再接受注册
    pub fn freeze_configuration(&self) {
        self.registry.seal();
    }

    pub fn is_configuration_frozen(&self) -> bool {
        self.registry.is_sealed()
    }

    // ---------------------------------------------------------------
    // 查询
    // ---------------------------------------------------------------

    pub fn get_bean_definition(&self, name: &str) -> ContainerResult<Arc<BeanDefinition>> {
        self.registry.get(name)
    }

    pub fn contains_bean_definition(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn aliases(&self, name: &str) -> Vec<String> {
        self.registry.aliases_of(&self.registry.canonical_name(name))
    }

    /// 当前线程是否正在创建 `name`
    pub fn is_currently_in_creation(&self, name: &str) -> bool {
        self.session.contains(&self.registry.canonical_name(name))
    }

    /// 已完成的单例（不会触发创建）
    pub fn get_singleton_if_present(&self, name: &str) -> Option<BeanRef> {
        self.singletons
            .get_completed(&self.registry.canonical_name(name))
    }

    pub fn singleton_count(&self) -> usize {
        self.singletons.len()
    }

    /// 获取 Bean 的接口视图
    ///
    /// 被代理的 Bean 通过视图解析器转换，普通 Bean 使用定义中声明的接口转换。
    pub fn get_bean_as<I: ?Sized + 'static>(&self, name: &str) -> ContainerResult<Arc<I>> {
        let definition = self.registry.get(name)?;
        let bean = self.get_bean(name)?;
        self.view_of::<I>(&bean, &definition)
    }

    /// 获取实现了接口 `I` 的唯一 Bean
    pub fn get_bean_by_interface<I: ?Sized + 'static>(&self) -> ContainerResult<Arc<I>> {
        let dependency = DependencyRef::by_type::<I>();
        let injected = self
            .resolve_dependency(&dependency, None)?
            .ok_or_else(|| ContainerError::DefinitionNotFound(dependency.describe()))?;
        self.view_of::<I>(injected.bean(), injected.definition())
    }

    /// 所有可赋值给 `key` 的 Bean（注册顺序）
    pub fn get_beans_of_type(&self, key: TypeKey) -> ContainerResult<Vec<(String, BeanRef)>> {
        self.registry
            .names_for_type(key)
            .into_iter()
            .map(|name| {
                let bean = self.get_bean(&name)?;
                Ok((name, bean))
            })
            .collect()
    }

    /// 所有实现了接口 `I` 的 Bean 视图（注册顺序）
    pub fn get_beans_of_interface<I: ?Sized + 'static>(
        &self,
    ) -> ContainerResult<Vec<(String, Arc<I>)>> {
        self.registry
            .definitions_for_type(TypeKey::of::<I>())
            .into_iter()
            .map(|definition| {
                let bean = self.get_bean(definition.name())?;
                let view = self.view_of::<I>(&bean, &definition)?;
                Ok((definition.name().to_string(), view))
            })
            .collect()
    }

    fn view_of<I: ?Sized + 'static>(
        &self,
        bean: &BeanRef,
        definition: &BeanDefinition,
    ) -> ContainerResult<Arc<I>> {
        let resolvers = self.view_resolvers.read().clone();
        resolve_view(bean, definition, &resolvers, TypeKey::of::<I>())
            .and_then(|boxed| boxed.downcast::<Arc<I>>().ok())
            .map(|view| *view)
            .ok_or_else(|| ContainerError::TypeMismatch {
                name: definition.name().to_string(),
                expected: std::any::type_name::<I>().to_string(),
            })
    }

    // ---------------------------------------------------------------
    // 获取与创建
    // ---------------------------------------------------------------

    fn do_get_bean(&self, name: &str) -> ContainerResult<BeanRef> {
        tracing::trace!("Requesting bean: '{}'", name);
        self.registry.seal();

        let name = self.registry.canonical_name(name);
        if let Some(bean) = self.singletons.get_completed(&name) {
            tracing::trace!("Returning cached instance of singleton bean '{}'", name);
            return Ok(bean);
        }

        let definition = self.registry.get(&name).map_err(|e| {
            tracing::debug!("Bean '{}' not found in container", name);
            e
        })?;

        match definition.scope() {
            Scope::Singleton => self.get_singleton(&definition),
            Scope::Prototype => self.get_prototype(&definition),
            Scope::Custom(scope_name) => self.get_scoped(scope_name, &definition),
        }
    }

    fn get_singleton(&self, definition: &Arc<BeanDefinition>) -> ContainerResult<BeanRef> {
        let name = definition.name();

        // 本线程重入：只能返回提前暴露的引用
        if self.session.contains(name) {
            return match self.singletons.early_reference(name)? {
                Some(early) => Ok(early),
                None => Err(self.circular_dependency(name)),
            };
        }

        let _lock = self.creation_lock.lock();
        if let Some(bean) = self.singletons.get_completed(name) {
            tracing::trace!("Singleton bean '{}' was created by another caller", name);
            return Ok(bean);
        }

        tracing::info!("Creating shared instance of singleton bean '{}'", name);
        let result = {
            let _guard = self.session.enter(name, definition.scope());
            self.create_bean(definition)
        };

        match result {
            Ok(bean) => {
                self.singletons.add_completed(name, bean.clone());
                self.disposables.mark_active(name);
                tracing::debug!("Singleton bean '{}' created and cached", name);
                Ok(bean)
            }
            Err(e) => {
                tracing::debug!("Creation of singleton bean '{}' failed: {}", name, e);
                self.discard_failed_singleton(name);
                Err(e)
            }
        }
    }

    fn get_prototype(&self, definition: &Arc<BeanDefinition>) -> ContainerResult<BeanRef> {
        let name = definition.name();
        if self.session.contains(name) {
            return Err(self.circular_dependency(name));
        }

        tracing::debug!("Creating new instance of prototype bean '{}'", name);
        let _guard = self.session.enter(name, definition.scope());
        self.create_bean(definition)
    }

    fn get_scoped(
        &self,
        scope_name: &str,
        definition: &Arc<BeanDefinition>,
    ) -> ContainerResult<BeanRef> {
        let name = definition.name();
        let scope = self
            .scopes
            .read()
            .get(scope_name)
            .cloned()
            .ok_or_else(|| ContainerError::ScopeNotRegistered(scope_name.to_string()))?;

        if self.session.contains(name) {
            return Err(self.circular_dependency(name));
        }

        scope.get(name, &|| {
            tracing::debug!(
                "Creating instance of bean '{}' in scope '{}'",
                name,
                scope.scope_name()
            );
            let _guard = self.session.enter(name, definition.scope());
            self.create_bean(definition)
        })
    }

    fn circular_dependency(&self, name: &str) -> ContainerError {
        let chain = self.session.cycle_chain(name);
        tracing::debug!("Unresolvable circular reference: {}", chain.join(" -> "));
        ContainerError::CircularDependency { chain }
    }

    /// 丢弃失败单例的半成品，并移除已经拿到半成品引用的单例
    fn discard_failed_singleton(&self, name: &str) {
        self.singletons.discard_partial(name);
        for dependent in self.disposables.forget_failed(name) {
            if self.singletons.contains_completed(&dependent) {
                tracing::warn!(
                    "Removing singleton '{}': it holds a reference to '{}' whose creation failed",
                    dependent,
                    name
                );
                self.destroy_singleton(&dependent);
            }
        }
    }

    fn create_bean(&self, definition: &Arc<BeanDefinition>) -> ContainerResult<BeanRef> {
        let name = definition.name();

        for dependency in definition.depends_on() {
            let dependency = self.registry.canonical_name(dependency);
            tracing::trace!("Bean '{}' depends on '{}'", name, dependency);
            let dependency_def = self.registry.get(&dependency)?;
            if definition.is_singleton() && dependency_def.is_singleton() {
                self.disposables.register_dependent(&dependency, name);
            }
            self.do_get_bean(&dependency)?;
        }

        // 1. 实例化
        let raw = self.instantiate(definition)?;

        // 2. 提前暴露
        if definition.is_singleton() && self.config.allow_circular_references {
            tracing::trace!("Eagerly caching bean '{}' to allow circular references", name);
            self.singletons
                .add_factory(name, self.early_reference_factory(definition, raw.clone()));
        }

        // 3. 属性填充
        self.populate(definition, &raw)?;

        // 4. 初始化
        let ctx = ProcessingContext {
            definition,
            factory: self,
        };
        let exposed = self.apply_before_initialization(raw.clone(), &ctx)?;
        self.invoke_init(definition, &raw)?;
        let exposed = self.apply_after_initialization(exposed, &ctx)?;

        // 5. 提前暴露的引用必须与最终对象一致
        if definition.is_singleton() {
            if let Some(early) = self.singletons.peek_early(name) {
                if !same_instance(&early, &exposed) {
                    tracing::error!(
                        "Bean '{}' was exposed early but post-processing returned a different object",
                        name
                    );
                    return Err(ContainerError::WrappingMismatch {
                        name: name.to_string(),
                    });
                }
            }

            if let Some(callback) = &definition.destroy_callback {
                self.disposables
                    .register_disposable(name, raw, callback.clone());
            }
        }

        Ok(exposed)
    }

    fn early_reference_factory(
        &self,
        definition: &Arc<BeanDefinition>,
        raw: BeanRef,
    ) -> EarlyReferenceFn {
        let factory = self.self_ref.clone();
        let definition = definition.clone();
        Arc::new(move || {
            let factory = factory.upgrade().ok_or_else(|| ContainerError::InstantiationFailure {
                name: definition.name().to_string(),
                source: anyhow!("bean factory has been dropped"),
            })?;
            factory.apply_early_bean_reference(&definition, raw.clone())
        })
    }

    fn instantiate(&self, definition: &Arc<BeanDefinition>) -> ContainerResult<BeanRef> {
        let name = definition.name();
        let candidate = self.select_constructor(definition)?;
        tracing::trace!(
            "Instantiating bean '{}' with {} argument(s)",
            name,
            candidate.args().len()
        );

        let args = candidate
            .args()
            .iter()
            .map(|dependency| self.resolve_for(definition, dependency))
            .collect::<ContainerResult<Vec<_>>>()?;

        (candidate.build)(&ResolvedArgs::new(args)).map_err(|e| {
            match ContainerError::unwrap_nested(e) {
                Ok(nested) => nested,
                Err(source) => ContainerError::InstantiationFailure {
                    name: name.to_string(),
                    source,
                },
            }
        })
    }

    /// 工厂函数 > 首选构造函数 > 参数最多且全部可解析的构造函数
    fn select_constructor<'d>(
        &self,
        definition: &'d BeanDefinition,
    ) -> ContainerResult<&'d ConstructorCandidate> {
        if let Some(factory) = definition.factory() {
            return Ok(factory);
        }

        let constructors = definition.constructors();
        if let Some(preferred) = constructors.iter().find(|c| c.is_preferred()) {
            return Ok(preferred);
        }

        let mut by_arity: Vec<&ConstructorCandidate> = constructors.iter().collect();
        by_arity.sort_by_key(|c| std::cmp::Reverse(c.args().len()));

        // 缺少依赖的构造函数被跳过；都不满足时报告第一个缺失的依赖
        let mut first_missing = None;
        for candidate in by_arity {
            match self.check_arguments(candidate, definition.name()) {
                Ok(()) => return Ok(candidate),
                Err(e @ ContainerError::AmbiguousDependency { .. }) => return Err(e),
                Err(e) => {
                    first_missing.get_or_insert(e);
                }
            }
        }

        Err(first_missing.unwrap_or_else(|| ContainerError::InstantiationFailure {
            name: definition.name().to_string(),
            source: anyhow!("no constructor declared"),
        }))
    }

    fn check_arguments(
        &self,
        candidate: &ConstructorCandidate,
        requesting: &str,
    ) -> ContainerResult<()> {
        for dependency in candidate.args() {
            let found = self.determine_candidate(dependency, Some(requesting))?;
            if found.is_none() && !dependency.is_optional() {
                return Err(ContainerError::DefinitionNotFound(dependency.describe()));
            }
        }
        Ok(())
    }

    fn populate(&self, definition: &Arc<BeanDefinition>, raw: &BeanRef) -> ContainerResult<()> {
        let name = definition.name();
        for property in definition.properties() {
            let Some(value) = self.resolve_for(definition, property.dependency())? else {
                tracing::trace!(
                    "Skipping optional property '{}' of bean '{}'",
                    property.property(),
                    name
                );
                continue;
            };

            tracing::trace!(
                "Injecting '{}' into property '{}' of bean '{}'",
                value.name(),
                property.property(),
                name
            );
            (property.inject)(&**raw, &value).map_err(|source| {
                ContainerError::PopulationFailure {
                    name: name.to_string(),
                    property: property.property().to_string(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    fn resolve_for(
        &self,
        definition: &BeanDefinition,
        dependency: &DependencyRef,
    ) -> ContainerResult<Option<Injected>> {
        let value = self.resolve_dependency(dependency, Some(definition.name()))?;
        if let Some(value) = &value {
            if definition.is_singleton() && value.definition().is_singleton() {
                self.disposables
                    .register_dependent(value.name(), definition.name());
            }
        }
        Ok(value)
    }

    /// 解析一个依赖
    ///
    /// 可选依赖找不到候选时返回 `None`。
    pub fn resolve_dependency(
        &self,
        dependency: &DependencyRef,
        requesting: Option<&str>,
    ) -> ContainerResult<Option<Injected>> {
        let definition = match self.determine_candidate(dependency, requesting)? {
            Some(definition) => definition,
            None if dependency.is_optional() => return Ok(None),
            None => return Err(ContainerError::DefinitionNotFound(dependency.describe())),
        };

        let bean = self.do_get_bean(definition.name())?;
        let resolvers = self.view_resolvers.read().clone();
        Ok(Some(Injected::new(bean, definition, resolvers)))
    }

    /// 按类型注入的候选选择
    ///
    /// 候选按注册顺序；多个时依次使用 qualifier、primary、priority 区分。
    fn determine_candidate(
        &self,
        dependency: &DependencyRef,
        requesting: Option<&str>,
    ) -> ContainerResult<Option<Arc<BeanDefinition>>> {
        let (key, qualifier) = match dependency {
            DependencyRef::ByName(name) => return self.registry.get(name).map(Some),
            DependencyRef::ByType { key, qualifier, .. } => (*key, qualifier),
        };

        let mut candidates = self.registry.definitions_for_type(key);
        // 自身不作为候选，除非只剩自身
        if candidates.len() > 1 {
            if let Some(requesting) = requesting {
                candidates.retain(|c| c.name() != requesting);
            }
        }

        if let Some(qualifier) = qualifier {
            let matched = candidates.into_iter().find(|c| {
                c.name() == qualifier
                    || self.registry.aliases_of(c.name()).iter().any(|a| a == qualifier)
            });
            return Ok(matched);
        }

        match candidates.len() {
            0 => return Ok(None),
            1 => return Ok(candidates.pop()),
            _ => {}
        }

        let primaries: Vec<_> = candidates.iter().filter(|c| c.is_primary()).collect();
        if primaries.len() == 1 {
            return Ok(Some(primaries[0].clone()));
        }
        if primaries.len() > 1 {
            return Err(ambiguous(key, primaries.into_iter()));
        }

        let best = candidates.iter().filter_map(|c| c.priority()).min();
        if let Some(best) = best {
            let top: Vec<_> = candidates
                .iter()
                .filter(|c| c.priority() == Some(best))
                .collect();
            if top.len() == 1 {
                return Ok(Some(top[0].clone()));
            }
        }

        Err(ambiguous(key, candidates.iter()))
    }

    // ---------------------------------------------------------------
    // 钩子
    // ---------------------------------------------------------------

    fn apply_before_initialization(
        &self,
        bean: BeanRef,
        ctx: &ProcessingContext<'_>,
    ) -> ContainerResult<BeanRef> {
        let mut current = bean;
        for processor in self.bean_post_processors() {
            current = processor
                .post_process_before_initialization(current, ctx)
                .map_err(|e| hook_error(ctx, processor.as_ref(), e))?;
        }
        Ok(current)
    }

    fn apply_after_initialization(
        &self,
        bean: BeanRef,
        ctx: &ProcessingContext<'_>,
    ) -> ContainerResult<BeanRef> {
        let mut current = bean;
        for processor in self.bean_post_processors() {
            current = processor
                .post_process_after_initialization(current, ctx)
                .map_err(|e| hook_error(ctx, processor.as_ref(), e))?;
        }
        Ok(current)
    }

    fn apply_early_bean_reference(
        &self,
        definition: &Arc<BeanDefinition>,
        raw: BeanRef,
    ) -> ContainerResult<BeanRef> {
        let ctx = ProcessingContext {
            definition,
            factory: self,
        };
        let mut current = raw;
        for processor in self.bean_post_processors() {
            current = processor
                .get_early_bean_reference(current, &ctx)
                .map_err(|e| hook_error(&ctx, processor.as_ref(), e))?;
        }
        Ok(current)
    }

    fn invoke_init(&self, definition: &BeanDefinition, raw: &BeanRef) -> ContainerResult<()> {
        if let Some(init) = &definition.init_callback {
            tracing::debug!("Invoking init callback on bean '{}'", definition.name());
            init(&**raw).map_err(|source| ContainerError::InitializationFailure {
                name: definition.name().to_string(),
                source,
            })?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // 启动与关闭
    // ---------------------------------------------------------------

    /// 预实例化所有非懒加载的单例（注册顺序）
    pub fn preinstantiate_singletons(&self) -> ContainerResult<()> {
        self.registry.seal();
        let names = self.registry.names();
        tracing::debug!("Pre-instantiating singletons in {} definition(s)", names.len());

        for name in names {
            let definition = self.registry.get(&name)?;
            if definition.is_singleton() && !definition.is_lazy() {
                self.get_bean(&name)?;
            }
        }
        Ok(())
    }

    /// 静态校验依赖图
    ///
    /// 报告缺失的按名称依赖，以及无法通过提前暴露打破的循环。
    pub fn validate_dependencies(&self) -> ContainerResult<()> {
        let (order, mut graph) = self.registry.dependency_graph();
        if !self.config.allow_circular_references {
            for edge in graph.values_mut().flatten() {
                edge.hard = true;
            }
        }

        validate_dependency_graph(&order, &graph).map_err(|e| {
            tracing::error!("Dependency validation failed: {}", e);
            match e {
                DependencyValidationError::CircularDependency { cycle } => {
                    ContainerError::CircularDependency { chain: cycle }
                }
                DependencyValidationError::MissingDependency { missing, .. } => {
                    ContainerError::DefinitionNotFound(missing)
                }
            }
        })
    }

    /// 销毁单个单例（先销毁依赖它的单例）
    pub fn destroy_singleton(&self, name: &str) {
        let name = self.registry.canonical_name(name);
        self.disposables.destroy_singleton(&name, &|n: &str| {
            self.singletons.remove(n);
        });
    }

    /// 按依赖关系逆序销毁所有单例
    pub fn destroy_singletons(&self) {
        let _lock = self.creation_lock.lock();
        let completed = self.singletons.completed_names();
        tracing::info!("Destroying {} singleton bean(s)", completed.len());

        self.disposables.destroy_all(&completed, &|n: &str| {
            self.singletons.remove(n);
        });
        self.singletons.clear();

        tracing::info!("Singleton beans destruction completed");
    }
}

fn ambiguous<'a>(
    key: TypeKey,
    candidates: impl Iterator<Item = &'a Arc<BeanDefinition>>,
) -> ContainerError {
    ContainerError::AmbiguousDependency {
        type_name: key.name().to_string(),
        candidates: candidates.map(|c| c.name().to_string()).collect(),
    }
}

fn hook_error(
    ctx: &ProcessingContext<'_>,
    processor: &dyn BeanPostProcessor,
    err: anyhow::Error,
) -> ContainerError {
    match ContainerError::unwrap_nested(err) {
        Ok(nested) => nested,
        Err(source) => ContainerError::PostProcessingFailed {
            name: ctx.bean_name().to_string(),
            processor: processor.name().to_string(),
            source,
        },
    }
}

impl BeanFactory for DefaultListableBeanFactory {
    fn get_bean(&self, name: &str) -> ContainerResult<BeanRef> {
        self.do_get_bean(name)
    }

    fn contains_bean(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    fn is_singleton(&self, name: &str) -> ContainerResult<bool> {
        Ok(self.registry.get(name)?.is_singleton())
    }

    fn is_prototype(&self, name: &str) -> ContainerResult<bool> {
        Ok(self.registry.get(name)?.scope().is_prototype())
    }
}

impl BeanFactoryExt for DefaultListableBeanFactory {
    fn get_bean_by_type<T: Any + Send + Sync>(&self) -> ContainerResult<Arc<T>> {
        let dependency = DependencyRef::by_type::<T>();
        let injected = self
            .resolve_dependency(&dependency, None)?
            .ok_or_else(|| ContainerError::DefinitionNotFound(dependency.describe()))?;
        injected.get::<T>().map_err(|_| ContainerError::TypeMismatch {
            name: injected.name().to_string(),
            expected: std::any::type_name::<T>().to_string(),
        })
    }
}

impl ListableBeanFactory for DefaultListableBeanFactory {
    fn bean_names(&self) -> Vec<String> {
        self.registry.names()
    }

    fn bean_names_for_type(&self, key: TypeKey) -> Vec<String> {
        self.registry.names_for_type(key)
    }

    fn bean_definition_count(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::Autowired;
    use crate::scope::ThreadScope;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Repository {
        url: String,
    }

    struct Service {
        repository: Arc<Repository>,
    }

    trait Notifier: Send + Sync {
        fn channel(&self) -> &'static str;
    }

    struct EmailNotifier;
    struct SmsNotifier;

    impl Notifier for EmailNotifier {
        fn channel(&self) -> &'static str {
            "email"
        }
    }

    impl Notifier for SmsNotifier {
        fn channel(&self) -> &'static str {
            "sms"
        }
    }

    fn repository_def() -> BeanDefinition {
        BeanDefinition::builder::<Repository>("repository")
            .no_args(|| {
                Ok(Repository {
                    url: "mem://".to_string(),
                })
            })
            .build()
    }

    fn service_def() -> BeanDefinition {
        BeanDefinition::builder::<Service>("service")
            .constructor(vec![DependencyRef::by_name("repository")], |args| {
                Ok(Service {
                    repository: args.get::<Repository>(0)?,
                })
            })
            .build()
    }

    #[test]
    fn test_constructor_injection_and_singleton_identity() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_definition(repository_def()).unwrap();
        factory.register_bean_definition(service_def()).unwrap();

        let service = factory.get_bean_typed::<Service>("service").unwrap();
        let repository = factory.get_bean_typed::<Repository>("repository").unwrap();
        assert!(Arc::ptr_eq(&service.repository, &repository));
        assert_eq!(service.repository.url, "mem://");

        let again = factory.get_bean_typed::<Service>("service").unwrap();
        assert!(Arc::ptr_eq(&service, &again));
    }

    #[test]
    fn test_prototype_creates_new_instances() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                BeanDefinition::builder::<Repository>("repository")
                    .no_args(|| Ok(Repository { url: String::new() }))
                    .prototype()
                    .build(),
            )
            .unwrap();

        let a = factory.get_bean("repository").unwrap();
        let b = factory.get_bean("repository").unwrap();
        assert!(!same_instance(&a, &b));
        assert!(factory.is_prototype("repository").unwrap());
    }

    #[test]
    fn test_registration_sealed_after_first_get() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_definition(repository_def()).unwrap();
        factory.get_bean("repository").unwrap();

        assert!(matches!(
            factory.register_bean_definition(service_def()),
            Err(ContainerError::ConfigurationFrozen(_))
        ));
        assert!(factory.is_configuration_frozen());
    }

    #[test]
    fn test_missing_definition() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_definition(service_def()).unwrap();
        assert!(matches!(
            factory.get_bean("service"),
            Err(ContainerError::DefinitionNotFound(name)) if name == "repository"
        ));
        assert!(matches!(
            factory.get_bean("nothing"),
            Err(ContainerError::DefinitionNotFound(_))
        ));
    }

    #[test]
    fn test_by_type_resolution_uses_qualifier_primary_and_priority() {
        let build = |primary: bool, priority: Option<i32>| {
            let email = BeanDefinition::builder::<EmailNotifier>("email")
                .no_args(|| Ok(EmailNotifier))
                .implements::<dyn Notifier>(|n| n);
            let sms = BeanDefinition::builder::<SmsNotifier>("sms")
                .no_args(|| Ok(SmsNotifier))
                .implements::<dyn Notifier>(|n| n);
            let sms = if primary { sms.primary() } else { sms };
            let sms = match priority {
                Some(p) => sms.priority(p),
                None => sms,
            };
            let factory = DefaultListableBeanFactory::new();
            factory.register_bean_definition(email.build()).unwrap();
            factory.register_bean_definition(sms.build()).unwrap();
            factory
        };

        let ambiguous = build(false, None);
        match ambiguous.get_bean_by_interface::<dyn Notifier>() {
            Err(ContainerError::AmbiguousDependency { candidates, .. }) => {
                assert_eq!(candidates, vec!["email".to_string(), "sms".to_string()]);
            }
            other => panic!("expected AmbiguousDependency, got {:?}", other.map(|_| ())),
        }

        let qualified = DependencyRef::by_type::<dyn Notifier>().qualified("email");
        let value = ambiguous.resolve_dependency(&qualified, None).unwrap().unwrap();
        assert_eq!(value.view::<dyn Notifier>().unwrap().channel(), "email");

        let primary = build(true, None);
        assert_eq!(
            primary.get_bean_by_interface::<dyn Notifier>().unwrap().channel(),
            "sms"
        );

        let prioritized = build(false, Some(1));
        assert_eq!(
            prioritized
                .get_bean_by_interface::<dyn Notifier>()
                .unwrap()
                .channel(),
            "sms"
        );

        let optional = DependencyRef::by_type::<Repository>().optional();
        assert!(prioritized.resolve_dependency(&optional, None).unwrap().is_none());
    }

    #[test]
    fn test_greediest_satisfiable_constructor() {
        struct Report {
            sources: usize,
        }

        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_definition(repository_def()).unwrap();
        factory
            .register_bean_definition(
                BeanDefinition::builder::<Report>("report")
                    .no_args(|| Ok(Report { sources: 0 }))
                    .constructor(vec![DependencyRef::by_name("repository")], |_| {
                        Ok(Report { sources: 1 })
                    })
                    .constructor(
                        vec![
                            DependencyRef::by_name("repository"),
                            DependencyRef::by_name("archive"),
                        ],
                        |_| Ok(Report { sources: 2 }),
                    )
                    .build(),
            )
            .unwrap();

        let report = factory.get_bean_typed::<Report>("report").unwrap();
        assert_eq!(report.sources, 1);
    }

    #[test]
    fn test_ambiguous_constructor_argument() {
        struct Alerts {
            notifier: Arc<dyn Notifier>,
        }

        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                BeanDefinition::builder::<EmailNotifier>("email")
                    .no_args(|| Ok(EmailNotifier))
                    .implements::<dyn Notifier>(|n| n)
                    .build(),
            )
            .unwrap();
        factory
            .register_bean_definition(
                BeanDefinition::builder::<SmsNotifier>("sms")
                    .no_args(|| Ok(SmsNotifier))
                    .implements::<dyn Notifier>(|n| n)
                    .build(),
            )
            .unwrap();
        factory
            .register_bean_definition(
                BeanDefinition::builder::<Alerts>("alerts")
                    .no_args(|| Ok(Alerts { notifier: Arc::new(EmailNotifier) }))
                    .constructor(vec![DependencyRef::by_type::<dyn Notifier>()], |args| {
                        Ok(Alerts {
                            notifier: args.view::<dyn Notifier>(0)?,
                        })
                    })
                    .build(),
            )
            .unwrap();

        match factory.get_bean("alerts") {
            Err(ContainerError::AmbiguousDependency { candidates, .. }) => {
                assert_eq!(candidates, vec!["email".to_string(), "sms".to_string()]);
            }
            other => panic!("expected AmbiguousDependency, got {:?}", other.map(|_| ())),
        }
        assert!(factory.get_singleton_if_present("alerts").is_none());
    }

    #[test]
    fn test_single_constructor_reports_missing_dependency() {
        struct Orphan;

        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                BeanDefinition::builder::<Orphan>("orphan")
                    .constructor(vec![DependencyRef::by_name("nowhere")], |_| Ok(Orphan))
                    .build(),
            )
            .unwrap();

        assert!(matches!(
            factory.get_bean("orphan"),
            Err(ContainerError::DefinitionNotFound(name)) if name == "nowhere"
        ));
    }

    struct NodeA {
        b: Autowired<NodeB>,
    }

    struct NodeB {
        a: Autowired<NodeA>,
    }

    fn register_cycle(factory: &DefaultListableBeanFactory) {
        factory
            .register_bean_definition(
                BeanDefinition::builder::<NodeA>("a")
                    .no_args(|| Ok(NodeA { b: Autowired::new() }))
                    .property("b", DependencyRef::by_name("b"), |a, dep| a.b.inject(dep))
                    .build(),
            )
            .unwrap();
        factory
            .register_bean_definition(
                BeanDefinition::builder::<NodeB>("b")
                    .no_args(|| Ok(NodeB { a: Autowired::new() }))
                    .property("a", DependencyRef::by_name("a"), |b, dep| b.a.inject(dep))
                    .build(),
            )
            .unwrap();
    }

    #[test]
    fn test_singleton_property_cycle_is_resolved() {
        let factory = DefaultListableBeanFactory::new();
        register_cycle(&factory);

        let a = factory.get_bean_typed::<NodeA>("a").unwrap();
        let b = factory.get_bean_typed::<NodeB>("b").unwrap();
        assert!(Arc::ptr_eq(&a.b.try_get().unwrap(), &b));
        assert!(Arc::ptr_eq(&b.a.try_get().unwrap(), &a));
        assert!(factory.validate_dependencies().is_ok());
    }

    #[test]
    fn test_cycle_rejected_when_circular_references_disabled() {
        let factory = DefaultListableBeanFactory::with_config(
            ContainerConfig::default().allow_circular_references(false),
        );
        register_cycle(&factory);

        match factory.get_bean("a") {
            Err(ContainerError::CircularDependency { chain }) => {
                assert_eq!(chain, vec!["a".to_string(), "b".to_string(), "a".to_string()]);
            }
            other => panic!("expected CircularDependency, got {:?}", other.map(|_| ())),
        }
        assert!(factory.get_singleton_if_present("b").is_none());
        assert!(factory.validate_dependencies().is_err());
    }

    #[test]
    fn test_prototype_cycle_fails_fast() {
        struct P;
        struct Q;

        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                BeanDefinition::builder::<P>("p")
                    .constructor(vec![DependencyRef::by_name("q")], |_| Ok(P))
                    .prototype()
                    .build(),
            )
            .unwrap();
        factory
            .register_bean_definition(
                BeanDefinition::builder::<Q>("q")
                    .constructor(vec![DependencyRef::by_name("p")], |_| Ok(Q))
                    .prototype()
                    .build(),
            )
            .unwrap();

        let err = factory.get_bean("p").err().unwrap();
        assert!(err.is_circular_dependency());
        assert_eq!(err.to_string(), "Circular dependency detected: p -> q -> p");
    }

    #[test]
    fn test_concurrent_requests_create_once() {
        let created = Arc::new(AtomicUsize::new(0));
        let factory = DefaultListableBeanFactory::new();
        let counter = created.clone();
        factory
            .register_bean_definition(
                BeanDefinition::builder::<Repository>("repository")
                    .no_args(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(20));
                        Ok(Repository { url: String::new() })
                    })
                    .build(),
            )
            .unwrap();

        let results: Vec<BeanRef> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| factory.get_bean("repository").unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|b| same_instance(b, &results[0])));
    }

    #[test]
    fn test_init_failure_is_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let factory = DefaultListableBeanFactory::new();
        let counter = attempts.clone();
        factory
            .register_bean_definition(
                BeanDefinition::builder::<Repository>("repository")
                    .no_args(|| Ok(Repository { url: String::new() }))
                    .init(move |_| {
                        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                            anyhow::bail!("connection refused");
                        }
                        Ok(())
                    })
                    .build(),
            )
            .unwrap();

        assert!(matches!(
            factory.get_bean("repository"),
            Err(ContainerError::InitializationFailure { .. })
        ));
        assert_eq!(factory.singleton_count(), 0);
        assert!(factory.get_bean("repository").is_ok());
    }

    struct Wrapper {
        inner: BeanRef,
    }

    struct WrappingProcessor;

    impl BeanPostProcessor for WrappingProcessor {
        fn post_process_after_initialization(
            &self,
            bean: BeanRef,
            ctx: &ProcessingContext<'_>,
        ) -> anyhow::Result<BeanRef> {
            if ctx.bean_name() == "a" {
                Ok(Arc::new(Wrapper { inner: bean }))
            } else {
                Ok(bean)
            }
        }

        fn name(&self) -> &str {
            "WrappingProcessor"
        }
    }

    #[test]
    fn test_wrapping_after_early_exposure_is_rejected() {
        let factory = DefaultListableBeanFactory::new();
        register_cycle(&factory);
        factory
            .add_bean_post_processor(Arc::new(WrappingProcessor))
            .unwrap();

        assert!(matches!(
            factory.get_bean("a"),
            Err(ContainerError::WrappingMismatch { .. })
        ));
        // b 拿到了 a 的半成品，必须一并移除
        assert!(factory.get_singleton_if_present("b").is_none());
    }

    #[test]
    fn test_wrapping_without_cycle_is_allowed() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                BeanDefinition::builder::<Repository>("a")
                    .no_args(|| Ok(Repository { url: "wrapped".to_string() }))
                    .build(),
            )
            .unwrap();
        factory
            .add_bean_post_processor(Arc::new(WrappingProcessor))
            .unwrap();

        let bean = factory.get_bean("a").unwrap();
        let wrapper = bean.downcast::<Wrapper>().unwrap();
        assert!(wrapper.inner.clone().downcast::<Repository>().is_ok());
        assert!(matches!(
            factory.get_bean_typed::<Repository>("a"),
            Err(ContainerError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_destroy_order_follows_dependencies() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let factory = DefaultListableBeanFactory::new();

        let repo_log = log.clone();
        factory
            .register_bean_definition(
                BeanDefinition::builder::<Repository>("repository")
                    .no_args(|| Ok(Repository { url: String::new() }))
                    .destroy(move |_| {
                        repo_log.lock().push("repository");
                        Ok(())
                    })
                    .build(),
            )
            .unwrap();

        let service_log = log.clone();
        factory
            .register_bean_definition(
                BeanDefinition::builder::<Service>("service")
                    .constructor(vec![DependencyRef::by_name("repository")], |args| {
                        Ok(Service {
                            repository: args.get::<Repository>(0)?,
                        })
                    })
                    .destroy(move |_| {
                        service_log.lock().push("service");
                        anyhow::bail!("close failed")
                    })
                    .build(),
            )
            .unwrap();

        factory.preinstantiate_singletons().unwrap();
        factory.destroy_singletons();

        assert_eq!(*log.lock(), vec!["service", "repository"]);
        assert_eq!(factory.singleton_count(), 0);
    }

    #[test]
    fn test_singleton_removed_before_destroy_callback() {
        let factory = DefaultListableBeanFactory::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for name in ["repository", "service"] {
            let weak = Arc::downgrade(&factory);
            let seen = seen.clone();
            let builder = BeanDefinition::builder::<Repository>(name)
                .no_args(|| Ok(Repository { url: String::new() }))
                .destroy(move |_| {
                    let factory = weak.upgrade().ok_or_else(|| anyhow!("factory dropped"))?;
                    seen.lock().push((
                        name,
                        factory.get_singleton_if_present(name).is_some(),
                        factory.get_singleton_if_present("repository").is_some(),
                    ));
                    Ok(())
                });
            factory.register_bean_definition(builder.build()).unwrap();
        }

        factory.preinstantiate_singletons().unwrap();
        factory.destroy_singletons();

        assert_eq!(
            *seen.lock(),
            vec![("service", false, true), ("repository", false, false)]
        );
    }

    #[test]
    fn test_depends_on_orders_creation() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let factory = DefaultListableBeanFactory::new();

        let l = log.clone();
        factory
            .register_bean_definition(
                BeanDefinition::builder::<Service>("late")
                    .no_args(move || {
                        l.lock().push("late");
                        Ok(Service {
                            repository: Arc::new(Repository { url: String::new() }),
                        })
                    })
                    .depends_on("early")
                    .build(),
            )
            .unwrap();
        let l = log.clone();
        factory
            .register_bean_definition(
                BeanDefinition::builder::<Repository>("early")
                    .no_args(move || {
                        l.lock().push("early");
                        Ok(Repository { url: String::new() })
                    })
                    .lazy()
                    .build(),
            )
            .unwrap();

        factory.preinstantiate_singletons().unwrap();
        assert_eq!(*log.lock(), vec!["early", "late"]);
    }

    #[test]
    fn test_custom_scope() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_scope(ThreadScope::NAME, Arc::new(ThreadScope::new()))
            .unwrap();
        factory
            .register_bean_definition(
                BeanDefinition::builder::<Repository>("perThread")
                    .no_args(|| Ok(Repository { url: String::new() }))
                    .scope(Scope::Custom(ThreadScope::NAME.to_string()))
                    .build(),
            )
            .unwrap();
        factory
            .register_bean_definition(
                BeanDefinition::builder::<Repository>("unknown")
                    .no_args(|| Ok(Repository { url: String::new() }))
                    .scope(Scope::Custom("session".to_string()))
                    .build(),
            )
            .unwrap();

        let a = factory.get_bean("perThread").unwrap();
        let b = factory.get_bean("perThread").unwrap();
        assert!(same_instance(&a, &b));

        let other = std::thread::scope(|s| s.spawn(|| factory.get_bean("perThread").unwrap()).join().unwrap());
        assert!(!same_instance(&a, &other));

        assert!(matches!(
            factory.get_bean("unknown"),
            Err(ContainerError::ScopeNotRegistered(_))
        ));
    }

    #[test]
    fn test_alias_and_listing() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_definition(repository_def()).unwrap();
        factory.register_alias("repo", "repository").unwrap();

        let by_alias = factory.get_bean("repo").unwrap();
        let by_name = factory.get_bean("repository").unwrap();
        assert!(same_instance(&by_alias, &by_name));
        assert_eq!(factory.aliases("repo"), vec!["repo".to_string()]);
        assert_eq!(
            factory.bean_names_for_type(TypeKey::of::<Repository>()),
            vec!["repository".to_string()]
        );
        assert_eq!(factory.bean_definition_count(), 1);
        assert!(factory.get_bean_by_type::<Repository>().is_ok());
    }
}
