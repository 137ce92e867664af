//! Bean 定义 - 描述如何创建和管理 Bean
//!
//! 定义在注册后不可变，由 [`DefinitionRegistry`](crate::registry::DefinitionRegistry)
//! 以 `Arc<BeanDefinition>` 的形式持有，容器只读地使用它们。

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::anyhow;
use once_cell::sync::OnceCell;

use crate::lifecycle::ViewResolver;
use crate::scope::Scope;
use crate::utils::naming::to_camel_case;

/// 容器内部流转的 Bean 引用（类型擦除）
pub type BeanRef = Arc<dyn Any + Send + Sync>;

/// 判断两个 Bean 引用是否指向同一个对象
///
/// 只比较数据指针，不比较 vtable。
pub fn same_instance(a: &BeanRef, b: &BeanRef) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// 类型标识，可以是具体类型，也可以是 `dyn Trait`
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// 完整类型名，例如 `my_app::service::UserService`
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 去掉模块路径的类型名，例如 `UserService` 或 `dyn Greeter`
    pub fn short_name(&self) -> String {
        let (prefix, path) = match self.name.strip_prefix("dyn ") {
            Some(rest) => ("dyn ", rest),
            None => ("", self.name),
        };
        let base = path.split('<').next().unwrap_or(path);
        let short = base.rsplit("::").next().unwrap_or(base);
        format!("{}{}", prefix, short)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 依赖引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyRef {
    /// 按名称（或别名）引用
    ByName(String),

    /// 按类型引用，多个候选时依次使用 qualifier、primary、priority 区分
    ByType {
        key: TypeKey,
        qualifier: Option<String>,
        optional: bool,
    },
}

impl DependencyRef {
    pub fn by_name(name: impl Into<String>) -> Self {
        DependencyRef::ByName(name.into())
    }

    pub fn by_type<T: ?Sized + 'static>() -> Self {
        DependencyRef::ByType {
            key: TypeKey::of::<T>(),
            qualifier: None,
            optional: false,
        }
    }

    /// 指定 qualifier（候选 Bean 的名称或别名）
    pub fn qualified(self, qualifier: impl Into<String>) -> Self {
        match self {
            DependencyRef::ByType { key, optional, .. } => DependencyRef::ByType {
                key,
                qualifier: Some(qualifier.into()),
                optional,
            },
            by_name => by_name,
        }
    }

    /// 标记为可选依赖：找不到候选时跳过注入
    pub fn optional(self) -> Self {
        match self {
            DependencyRef::ByType { key, qualifier, .. } => DependencyRef::ByType {
                key,
                qualifier,
                optional: true,
            },
            by_name => by_name,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, DependencyRef::ByType { optional: true, .. })
    }

    /// 用于日志和错误信息的描述
    pub fn describe(&self) -> String {
        match self {
            DependencyRef::ByName(name) => format!("'{}'", name),
            DependencyRef::ByType { key, qualifier: Some(q), .. } => {
                format!("type '{}' qualified '{}'", key.name(), q)
            }
            DependencyRef::ByType { key, .. } => format!("type '{}'", key.name()),
        }
    }
}

/// 已解析的依赖值
///
/// 同时携带依赖的定义与视图解析器，可以按具体类型取值，也可以取接口视图。
#[derive(Clone)]
pub struct Injected {
    bean: BeanRef,
    definition: Arc<BeanDefinition>,
    resolvers: Arc<[Arc<dyn ViewResolver>]>,
}

impl Injected {
    pub(crate) fn new(
        bean: BeanRef,
        definition: Arc<BeanDefinition>,
        resolvers: Arc<[Arc<dyn ViewResolver>]>,
    ) -> Self {
        Self {
            bean,
            definition,
            resolvers,
        }
    }

    /// 依赖的 Bean 名称
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn bean(&self) -> &BeanRef {
        &self.bean
    }

    pub fn definition(&self) -> &Arc<BeanDefinition> {
        &self.definition
    }

    /// 按具体类型取值（被代理的 Bean 无法以具体类型获取）
    pub fn get<T: Any + Send + Sync>(&self) -> anyhow::Result<Arc<T>> {
        self.bean.clone().downcast::<T>().map_err(|_| {
            anyhow!(
                "dependency '{}' is not of type '{}'",
                self.name(),
                std::any::type_name::<T>()
            )
        })
    }

    /// 按接口取视图
    pub fn view<I: ?Sized + 'static>(&self) -> anyhow::Result<Arc<I>> {
        resolve_view(&self.bean, &self.definition, &self.resolvers, TypeKey::of::<I>())
            .and_then(|boxed| boxed.downcast::<Arc<I>>().ok())
            .map(|view| *view)
            .ok_or_else(|| {
                anyhow!(
                    "dependency '{}' cannot be viewed as '{}'",
                    self.name(),
                    std::any::type_name::<I>()
                )
            })
    }
}

impl fmt::Debug for Injected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injected").field("name", &self.name()).finish()
    }
}

/// 计算 `bean` 在 `key` 下的视图，先询问解析器，再使用定义声明的接口转换
pub(crate) fn resolve_view(
    bean: &BeanRef,
    definition: &BeanDefinition,
    resolvers: &[Arc<dyn ViewResolver>],
    key: TypeKey,
) -> Option<Box<dyn Any + Send + Sync>> {
    resolvers
        .iter()
        .find_map(|resolver| resolver.resolve_view(bean, key))
        .or_else(|| definition.cast_view(bean, key))
}

/// 已解析的构造参数
///
/// 可选依赖未找到时对应位置为空。
pub struct ResolvedArgs {
    values: Vec<Option<Injected>>,
}

impl ResolvedArgs {
    pub(crate) fn new(values: Vec<Option<Injected>>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 第 `index` 个参数（可选依赖缺失时为 `None`）
    pub fn injected(&self, index: usize) -> Option<&Injected> {
        self.values.get(index).and_then(Option::as_ref)
    }

    fn required(&self, index: usize) -> anyhow::Result<&Injected> {
        self.injected(index)
            .ok_or_else(|| anyhow!("constructor argument {} is missing", index))
    }

    /// 获取第 `index` 个参数的原始引用
    pub fn raw(&self, index: usize) -> anyhow::Result<BeanRef> {
        self.required(index).map(|value| value.bean().clone())
    }

    /// 获取第 `index` 个参数并转换为具体类型
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> anyhow::Result<Arc<T>> {
        self.required(index)?.get::<T>()
    }

    /// 获取第 `index` 个参数的接口视图
    pub fn view<I: ?Sized + 'static>(&self, index: usize) -> anyhow::Result<Arc<I>> {
        self.required(index)?.view::<I>()
    }

    /// 可选参数，缺失时返回 `None`
    pub fn optional<T: Any + Send + Sync>(&self, index: usize) -> anyhow::Result<Option<Arc<T>>> {
        self.injected(index).map(Injected::get::<T>).transpose()
    }
}

pub(crate) type BuildFn = Arc<dyn Fn(&ResolvedArgs) -> anyhow::Result<BeanRef> + Send + Sync>;
pub(crate) type InjectFn = Arc<dyn Fn(&(dyn Any + Send + Sync), &Injected) -> anyhow::Result<()> + Send + Sync>;
pub(crate) type CallbackFn = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> anyhow::Result<()> + Send + Sync>;
pub(crate) type ViewCaster = Arc<dyn Fn(&BeanRef) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// 构造函数候选
///
/// 容器按以下顺序选择：工厂函数 > 唯一的 preferred 候选 > 参数最多且全部可解析的候选。
#[derive(Clone)]
pub struct ConstructorCandidate {
    pub(crate) args: Vec<DependencyRef>,
    pub(crate) preferred: bool,
    pub(crate) build: BuildFn,
}

impl ConstructorCandidate {
    pub fn args(&self) -> &[DependencyRef] {
        &self.args
    }

    pub fn is_preferred(&self) -> bool {
        self.preferred
    }
}

impl fmt::Debug for ConstructorCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorCandidate")
            .field("args", &self.args)
            .field("preferred", &self.preferred)
            .finish()
    }
}

/// 属性注入点
#[derive(Clone)]
pub struct PropertyInjection {
    pub(crate) property: String,
    pub(crate) dependency: DependencyRef,
    pub(crate) inject: InjectFn,
}

impl PropertyInjection {
    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn dependency(&self) -> &DependencyRef {
        &self.dependency
    }
}

impl fmt::Debug for PropertyInjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyInjection")
            .field("property", &self.property)
            .field("dependency", &self.dependency)
            .finish()
    }
}

/// Bean 定义
pub struct BeanDefinition {
    pub(crate) name: String,
    pub(crate) bean_type: TypeKey,
    pub(crate) scope: Scope,
    pub(crate) constructors: Vec<ConstructorCandidate>,
    pub(crate) factory: Option<ConstructorCandidate>,
    pub(crate) properties: Vec<PropertyInjection>,
    pub(crate) depends_on: Vec<String>,
    pub(crate) init_callback: Option<CallbackFn>,
    pub(crate) destroy_callback: Option<CallbackFn>,
    pub(crate) interfaces: Vec<(TypeKey, ViewCaster)>,
    pub(crate) primary: bool,
    pub(crate) priority: Option<i32>,
    pub(crate) lazy: bool,
    pub(crate) attributes: HashMap<String, String>,
}

impl BeanDefinition {
    /// 为类型 `T` 创建定义构建器
    pub fn builder<T: Any + Send + Sync>(name: impl Into<String>) -> BeanDefinitionBuilder<T> {
        BeanDefinitionBuilder::new(name.into())
    }

    /// 使用默认名称（类型名的 camelCase）创建构建器
    pub fn builder_for<T: Any + Send + Sync>() -> BeanDefinitionBuilder<T> {
        let name = to_camel_case(&TypeKey::of::<T>().short_name());
        BeanDefinitionBuilder::new(name)
    }

    /// 以一个已经存在的实例创建单例定义
    pub fn instance<T: Any + Send + Sync>(name: impl Into<String>, value: Arc<T>) -> Self {
        let shared: BeanRef = value;
        BeanDefinitionBuilder::<T>::new(name.into())
            .raw_constructor(Vec::new(), false, Arc::new(move |_: &ResolvedArgs| Ok(shared.clone())))
            .build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bean_type(&self) -> TypeKey {
        self.bean_type
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn is_singleton(&self) -> bool {
        self.scope.is_singleton()
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn priority(&self) -> Option<i32> {
        self.priority
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// 自由格式的附加属性，容器本身不解释
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn has_destroy_callback(&self) -> bool {
        self.destroy_callback.is_some()
    }

    pub fn constructors(&self) -> &[ConstructorCandidate] {
        &self.constructors
    }

    pub fn factory(&self) -> Option<&ConstructorCandidate> {
        self.factory.as_ref()
    }

    pub fn properties(&self) -> &[PropertyInjection] {
        &self.properties
    }

    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    /// 声明实现的接口（不含具体类型本身）
    pub fn interfaces(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.interfaces.iter().map(|(key, _)| *key)
    }

    /// 是否可以赋值给 `key`（具体类型相同或声明了该接口）
    pub fn is_assignable_to(&self, key: TypeKey) -> bool {
        self.bean_type == key || self.interfaces.iter().any(|(k, _)| *k == key)
    }

    /// 将本定义创建的原始实例转换为接口视图
    ///
    /// 返回的 Box 中装的是 `Arc<dyn Trait>`。
    pub fn cast_view(&self, bean: &BeanRef, key: TypeKey) -> Option<Box<dyn Any + Send + Sync>> {
        self.interfaces
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, caster)| caster(bean))
    }

    /// 按名称声明的依赖，`bool` 表示是否为构造参数（无法通过提前暴露打破）
    pub fn named_dependencies(&self) -> Vec<(String, bool)> {
        let mut deps = Vec::new();
        let ctor_args = self
            .factory
            .iter()
            .chain(self.constructors.iter())
            .flat_map(|c| c.args.iter());
        for dep in ctor_args {
            if let DependencyRef::ByName(name) = dep {
                deps.push((name.clone(), true));
            }
        }
        for prop in &self.properties {
            if let DependencyRef::ByName(name) = &prop.dependency {
                deps.push((name.clone(), false));
            }
        }
        for name in &self.depends_on {
            deps.push((name.clone(), true));
        }
        deps
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("name", &self.name)
            .field("type_name", &self.bean_type.name())
            .field("scope", &self.scope)
            .field("primary", &self.primary)
            .field("priority", &self.priority)
            .field("lazy", &self.lazy)
            .field("constructors", &self.constructors.len())
            .field("properties", &self.properties)
            .field("depends_on", &self.depends_on)
            .finish()
    }
}

/// 类型化的定义构建器
///
/// 回调都以 `&T` 接收 Bean，内部统一擦除为 `dyn Any`。
pub struct BeanDefinitionBuilder<T> {
    definition: BeanDefinition,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> BeanDefinitionBuilder<T> {
    fn new(name: String) -> Self {
        Self {
            definition: BeanDefinition {
                name,
                bean_type: TypeKey::of::<T>(),
                scope: Scope::default(),
                constructors: Vec::new(),
                factory: None,
                properties: Vec::new(),
                depends_on: Vec::new(),
                init_callback: None,
                destroy_callback: None,
                interfaces: Vec::new(),
                primary: false,
                priority: None,
                lazy: false,
                attributes: HashMap::new(),
            },
            _marker: PhantomData,
        }
    }

    fn raw_constructor(mut self, args: Vec<DependencyRef>, preferred: bool, build: BuildFn) -> Self {
        self.definition.constructors.push(ConstructorCandidate {
            args,
            preferred,
            build,
        });
        self
    }

    fn typed_build<F>(build: F) -> BuildFn
    where
        F: Fn(&ResolvedArgs) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Arc::new(move |args: &ResolvedArgs| {
            let value = build(args)?;
            let bean: BeanRef = Arc::new(value);
            Ok(bean)
        })
    }

    /// 添加一个构造函数候选
    pub fn constructor<F>(self, args: Vec<DependencyRef>, build: F) -> Self
    where
        F: Fn(&ResolvedArgs) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.raw_constructor(args, false, Self::typed_build(build))
    }

    /// 添加一个首选构造函数候选
    pub fn preferred_constructor<F>(self, args: Vec<DependencyRef>, build: F) -> Self
    where
        F: Fn(&ResolvedArgs) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.raw_constructor(args, true, Self::typed_build(build))
    }

    /// 添加无参构造函数
    pub fn no_args<F>(self, build: F) -> Self
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.constructor(Vec::new(), move |_| build())
    }

    /// 设置工厂函数（优先于所有构造函数）
    pub fn factory<F>(mut self, args: Vec<DependencyRef>, build: F) -> Self
    where
        F: Fn(&ResolvedArgs) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.definition.factory = Some(ConstructorCandidate {
            args,
            preferred: true,
            build: Self::typed_build(build),
        });
        self
    }

    /// 添加属性注入点，注入顺序即声明顺序
    pub fn property<F>(mut self, property: impl Into<String>, dependency: DependencyRef, inject: F) -> Self
    where
        F: Fn(&T, &Injected) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let property = property.into();
        let prop_name = property.clone();
        let inject: InjectFn = Arc::new(move |bean: &(dyn Any + Send + Sync), dep: &Injected| {
            let bean = bean.downcast_ref::<T>().ok_or_else(|| {
                anyhow!(
                    "cannot inject '{}': bean is not a '{}'",
                    prop_name,
                    std::any::type_name::<T>()
                )
            })?;
            inject(bean, dep)
        });
        self.definition.properties.push(PropertyInjection {
            property,
            dependency,
            inject,
        });
        self
    }

    /// 显式声明依赖（不注入，只保证创建顺序与销毁顺序）
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.definition.depends_on.push(name.into());
        self
    }

    /// 初始化回调（@PostConstruct）
    pub fn init<F>(mut self, init_fn: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.definition.init_callback = Some(Self::erase_callback(init_fn));
        self
    }

    /// 销毁回调（@PreDestroy）
    pub fn destroy<F>(mut self, destroy_fn: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.definition.destroy_callback = Some(Self::erase_callback(destroy_fn));
        self
    }

    fn erase_callback<F>(callback: F) -> CallbackFn
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Arc::new(move |bean: &(dyn Any + Send + Sync)| {
            let bean = bean
                .downcast_ref::<T>()
                .ok_or_else(|| anyhow!("bean is not a '{}'", std::any::type_name::<T>()))?;
            callback(bean)
        })
    }

    /// 声明实现的接口，并提供 `Arc<T> -> Arc<I>` 的转换
    pub fn implements<I>(mut self, cast: fn(Arc<T>) -> Arc<I>) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let caster: ViewCaster = Arc::new(move |bean: &BeanRef| {
            let concrete = bean.clone().downcast::<T>().ok()?;
            let view: Arc<I> = cast(concrete);
            Some(Box::new(view) as Box<dyn Any + Send + Sync>)
        });
        self.definition.interfaces.push((TypeKey::of::<I>(), caster));
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.definition.scope = scope;
        self
    }

    pub fn prototype(self) -> Self {
        self.scope(Scope::Prototype)
    }

    pub fn primary(mut self) -> Self {
        self.definition.primary = true;
        self
    }

    /// 优先级，数值越小优先级越高
    pub fn priority(mut self, priority: i32) -> Self {
        self.definition.priority = Some(priority);
        self
    }

    pub fn lazy(mut self) -> Self {
        self.definition.lazy = true;
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.definition.attributes.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> BeanDefinition {
        self.definition
    }
}

/// 注入槽，配合属性注入使用
///
/// Bean 在实例化之后才被注入依赖，因此字段需要内部可变性。
pub struct Autowired<T: ?Sized> {
    cell: OnceCell<Arc<T>>,
}

impl<T: ?Sized> Autowired<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// 写入依赖，重复注入会报错
    pub fn set(&self, value: Arc<T>) -> anyhow::Result<()> {
        self.cell
            .set(value)
            .map_err(|_| anyhow!("dependency already injected"))
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    pub fn try_get(&self) -> anyhow::Result<Arc<T>> {
        self.get().ok_or_else(|| anyhow!("dependency has not been injected yet"))
    }

    pub fn is_injected(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T: Any + Send + Sync> Autowired<T> {
    /// 按具体类型注入
    pub fn inject(&self, value: &Injected) -> anyhow::Result<()> {
        self.set(value.get::<T>()?)
    }
}

impl<T: ?Sized + 'static> Autowired<T> {
    /// 按接口视图注入（依赖可能是代理）
    pub fn inject_view(&self, value: &Injected) -> anyhow::Result<()> {
        self.set(value.view::<T>()?)
    }
}

impl<T: ?Sized> Default for Autowired<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Autowired<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Autowired")
            .field("injected", &self.is_injected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    #[test]
    fn test_type_key_short_name() {
        assert_eq!(TypeKey::of::<English>().short_name(), "English");
        assert_eq!(TypeKey::of::<dyn Greeter>().short_name(), "dyn Greeter");
        assert_eq!(TypeKey::of::<Vec<u8>>().short_name(), "Vec");
        assert_eq!(TypeKey::of::<English>(), TypeKey::of::<English>());
        assert_ne!(TypeKey::of::<English>(), TypeKey::of::<dyn Greeter>());
    }

    #[test]
    fn test_builder_for_uses_camel_case_name() {
        let def = BeanDefinition::builder_for::<English>()
            .no_args(|| Ok(English))
            .attribute("role", "infrastructure")
            .build();
        assert_eq!(def.name(), "english");
        assert_eq!(def.attribute("role"), Some("infrastructure"));
        assert!(def.is_singleton());
    }

    #[test]
    fn test_implements_and_cast_view() {
        let def = BeanDefinition::builder::<English>("english")
            .no_args(|| Ok(English))
            .implements::<dyn Greeter>(|e| e)
            .build();

        assert!(def.is_assignable_to(TypeKey::of::<English>()));
        assert!(def.is_assignable_to(TypeKey::of::<dyn Greeter>()));
        assert!(!def.is_assignable_to(TypeKey::of::<String>()));

        let bean: BeanRef = Arc::new(English);
        let view = def
            .cast_view(&bean, TypeKey::of::<dyn Greeter>())
            .unwrap()
            .downcast::<Arc<dyn Greeter>>()
            .unwrap();
        assert_eq!(view.greet(), "hello");

        // 非本类型的实例无法转换
        let other: BeanRef = Arc::new(1u8);
        assert!(def.cast_view(&other, TypeKey::of::<dyn Greeter>()).is_none());
    }

    #[test]
    fn test_dependency_ref_modifiers() {
        let dep = DependencyRef::by_type::<English>().qualified("english").optional();
        assert!(dep.is_optional());
        assert_eq!(
            dep.describe(),
            format!("type '{}' qualified 'english'", std::any::type_name::<English>())
        );

        let named = DependencyRef::by_name("a").optional();
        assert!(!named.is_optional());
    }

    #[test]
    fn test_named_dependencies_marks_constructor_edges() {
        struct Holder {
            other: Autowired<English>,
        }

        let def = BeanDefinition::builder::<Holder>("holder")
            .constructor(vec![DependencyRef::by_name("a")], |_| {
                Ok(Holder { other: Autowired::new() })
            })
            .property("other", DependencyRef::by_name("b"), |h, dep| h.other.inject(dep))
            .depends_on("c")
            .build();

        let deps = def.named_dependencies();
        assert_eq!(
            deps,
            vec![
                ("a".to_string(), true),
                ("b".to_string(), false),
                ("c".to_string(), true),
            ]
        );
    }

    #[test]
    fn test_autowired_slot() {
        let slot: Autowired<English> = Autowired::new();
        assert!(slot.try_get().is_err());
        slot.set(Arc::new(English)).unwrap();
        assert!(slot.is_injected());
        assert!(slot.set(Arc::new(English)).is_err());
    }

    #[test]
    fn test_injected_value_and_view() {
        let def = Arc::new(
            BeanDefinition::builder::<English>("english")
                .no_args(|| Ok(English))
                .implements::<dyn Greeter>(|e| e)
                .build(),
        );
        let value = Injected::new(Arc::new(English), def, Arc::from(Vec::new()));

        assert_eq!(value.name(), "english");
        assert!(value.get::<English>().is_ok());
        assert!(value.get::<u8>().is_err());
        assert_eq!(value.view::<dyn Greeter>().unwrap().greet(), "hello");

        let slot: Autowired<dyn Greeter> = Autowired::new();
        slot.inject_view(&value).unwrap();
        assert_eq!(slot.try_get().unwrap().greet(), "hello");

        let args = ResolvedArgs::new(vec![Some(value), None]);
        assert!(args.get::<English>(0).is_ok());
        assert!(args.optional::<English>(1).unwrap().is_none());
        assert!(args.raw(1).is_err());
        assert!(args.raw(5).is_err());
    }

    #[test]
    fn test_same_instance() {
        let a: BeanRef = Arc::new(English);
        let b = a.clone();
        let c: BeanRef = Arc::new(English);
        assert!(same_instance(&a, &b));
        assert!(!same_instance(&a, &c));
    }
}
