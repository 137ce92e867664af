//! Bean 定义存储
//!
//! 保持注册顺序，按类型查询时返回的候选顺序即注册顺序。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::bean::{BeanDefinition, TypeKey};
use crate::error::{ContainerError, ContainerResult};
use crate::utils::dependency::Edge;

#[derive(Default)]
struct Definitions {
    by_name: HashMap<String, Arc<BeanDefinition>>,
    order: Vec<String>,
    aliases: HashMap<String, String>,
}

/// 定义存储
///
/// 第一次获取 Bean 时被冻结（seal），之后拒绝任何结构性修改。
pub struct DefinitionRegistry {
    inner: RwLock<Definitions>,
    sealed: AtomicBool,
    allow_overriding: bool,
}

impl DefinitionRegistry {
    pub fn new(allow_overriding: bool) -> Self {
        Self {
            inner: RwLock::new(Definitions::default()),
            sealed: AtomicBool::new(false),
            allow_overriding,
        }
    }

    /// 注册定义
    pub fn register(&self, definition: BeanDefinition) -> ContainerResult<Arc<BeanDefinition>> {
        if self.is_sealed() {
            return Err(ContainerError::ConfigurationFrozen("register bean definition"));
        }

        let name = definition.name().to_string();
        let mut inner = self.inner.write();
        // 冻结在持有写锁时完成，这里再检查一次
        if self.is_sealed() {
            return Err(ContainerError::ConfigurationFrozen("register bean definition"));
        }

        if inner.aliases.contains_key(&name) {
            return Err(ContainerError::DefinitionAlreadyExists(name));
        }

        let definition = Arc::new(definition);
        match inner.by_name.get(&name) {
            Some(_) if !self.allow_overriding => {
                tracing::warn!("Bean '{}' already exists, registration failed", name);
                return Err(ContainerError::DefinitionAlreadyExists(name));
            }
            Some(previous) => {
                tracing::info!(
                    "Overriding bean definition '{}': replacing {:?} with {:?}",
                    name,
                    previous.bean_type().name(),
                    definition.bean_type().name()
                );
            }
            None => inner.order.push(name.clone()),
        }

        tracing::debug!(
            "Registered bean definition: name='{}', type='{}', scope={}",
            name,
            definition.bean_type().name(),
            definition.scope()
        );
        inner.by_name.insert(name, definition.clone());
        Ok(definition)
    }

    /// 为已存在的定义注册别名
    pub fn register_alias(&self, alias: impl Into<String>, name: &str) -> ContainerResult<()> {
        if self.is_sealed() {
            return Err(ContainerError::ConfigurationFrozen("register alias"));
        }

        let alias = alias.into();
        let mut inner = self.inner.write();
        if self.is_sealed() {
            return Err(ContainerError::ConfigurationFrozen("register alias"));
        }
        if !inner.by_name.contains_key(name) {
            return Err(ContainerError::DefinitionNotFound(name.to_string()));
        }
        if inner.by_name.contains_key(&alias) || inner.aliases.contains_key(&alias) {
            return Err(ContainerError::DefinitionAlreadyExists(alias));
        }
        tracing::debug!("Registered alias '{}' for bean '{}'", alias, name);
        inner.aliases.insert(alias, name.to_string());
        Ok(())
    }

    /// 将别名解析为规范名称
    pub fn canonical_name(&self, name: &str) -> String {
        let inner = self.inner.read();
        inner
            .aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    pub fn get(&self, name: &str) -> ContainerResult<Arc<BeanDefinition>> {
        let inner = self.inner.read();
        let canonical = inner.aliases.get(name).map(String::as_str).unwrap_or(name);
        inner
            .by_name
            .get(canonical)
            .cloned()
            .ok_or_else(|| ContainerError::DefinitionNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        let inner = self.inner.read();
        inner.by_name.contains_key(name) || inner.aliases.contains_key(name)
    }

    /// 所有定义名称（注册顺序）
    pub fn names(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    /// 某个定义的所有别名
    pub fn aliases_of(&self, name: &str) -> Vec<String> {
        let inner = self.inner.read();
        let mut aliases: Vec<String> = inner
            .aliases
            .iter()
            .filter(|(_, target)| target.as_str() == name)
            .map(|(alias, _)| alias.clone())
            .collect();
        aliases.sort();
        aliases
    }

    /// 所有可赋值给 `key` 的定义（注册顺序）
    pub fn definitions_for_type(&self, key: TypeKey) -> Vec<Arc<BeanDefinition>> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|name| inner.by_name.get(name))
            .filter(|def| def.is_assignable_to(key))
            .cloned()
            .collect()
    }

    pub fn names_for_type(&self, key: TypeKey) -> Vec<String> {
        self.definitions_for_type(key)
            .iter()
            .map(|def| def.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 冻结存储，返回是否为本次调用完成的冻结
    ///
    /// 与注册互斥：返回后不会再有定义或别名被加入。
    pub fn seal(&self) -> bool {
        if self.is_sealed() {
            return false;
        }
        let inner = self.inner.write();
        let first = !self.sealed.swap(true, Ordering::AcqRel);
        if first {
            tracing::debug!(
                "Definition registry sealed with {} definition(s)",
                inner.order.len()
            );
        }
        first
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// 构建用于静态校验的依赖图（仅包含按名称声明的依赖）
    pub fn dependency_graph(&self) -> (Vec<String>, HashMap<String, Vec<Edge>>) {
        let inner = self.inner.read();
        let canonical = |n: &str| inner.aliases.get(n).cloned().unwrap_or_else(|| n.to_string());

        let mut graph = HashMap::new();
        for name in &inner.order {
            let Some(def) = inner.by_name.get(name) else { continue };
            let edges = def
                .named_dependencies()
                .into_iter()
                .map(|(to, ctor)| {
                    let to = canonical(&to);
                    let target_singleton = inner
                        .by_name
                        .get(&to)
                        .map(|d| d.is_singleton())
                        .unwrap_or(true);
                    let hard = ctor || !def.is_singleton() || !target_singleton;
                    Edge { to, hard }
                })
                .collect();
            graph.insert(name.clone(), edges);
        }
        (inner.order.clone(), graph)
    }
}

impl Default for DefinitionRegistry {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Repo;
    struct Cache;

    trait Store: Send + Sync {}
    impl Store for Repo {}
    impl Store for Cache {}

    fn repo(name: &str) -> BeanDefinition {
        BeanDefinition::builder::<Repo>(name)
            .no_args(|| Ok(Repo))
            .implements::<dyn Store>(|r| r)
            .build()
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = DefinitionRegistry::default();
        registry.register(repo("repo")).unwrap();
        registry.register_alias("repository", "repo").unwrap();

        assert!(registry.contains("repo"));
        assert!(registry.contains("repository"));
        assert_eq!(registry.get("repository").unwrap().name(), "repo");
        assert_eq!(registry.canonical_name("repository"), "repo");
        assert_eq!(registry.aliases_of("repo"), vec!["repository".to_string()]);
        assert!(matches!(
            registry.get("missing"),
            Err(ContainerError::DefinitionNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_registration() {
        let registry = DefinitionRegistry::default();
        registry.register(repo("repo")).unwrap();
        assert!(matches!(
            registry.register(repo("repo")),
            Err(ContainerError::DefinitionAlreadyExists(_))
        ));

        let overriding = DefinitionRegistry::new(true);
        overriding.register(repo("repo")).unwrap();
        overriding.register(repo("repo")).unwrap();
        assert_eq!(overriding.names(), vec!["repo".to_string()]);
    }

    #[test]
    fn test_sealed_registry_rejects_changes() {
        let registry = DefinitionRegistry::default();
        registry.register(repo("repo")).unwrap();
        assert!(registry.seal());
        assert!(!registry.seal());

        assert!(matches!(
            registry.register(repo("other")),
            Err(ContainerError::ConfigurationFrozen(_))
        ));
        assert!(matches!(
            registry.register_alias("alias", "repo"),
            Err(ContainerError::ConfigurationFrozen(_))
        ));
    }

    #[test]
    fn test_no_registration_lands_after_seal() {
        let registry = DefinitionRegistry::default();
        let sealed_with = std::thread::scope(|s| {
            let registrar = s.spawn(|| {
                for i in 0.. {
                    if registry.register(repo(&format!("repo{}", i))).is_err() {
                        break;
                    }
                }
            });
            while registry.len() < 8 {
                std::thread::yield_now();
            }
            assert!(registry.seal());
            let sealed_with = registry.len();
            registrar.join().unwrap();
            sealed_with
        });

        assert_eq!(registry.len(), sealed_with);
        assert_eq!(registry.names().len(), sealed_with);
    }

    #[test]
    fn test_definitions_for_type_keep_registration_order() {
        let registry = DefinitionRegistry::default();
        registry
            .register(
                BeanDefinition::builder::<Cache>("cache")
                    .no_args(|| Ok(Cache))
                    .implements::<dyn Store>(|c| c)
                    .build(),
            )
            .unwrap();
        registry.register(repo("repo")).unwrap();

        let names: Vec<String> = registry
            .definitions_for_type(TypeKey::of::<dyn Store>())
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(names, vec!["cache".to_string(), "repo".to_string()]);

        assert_eq!(registry.definitions_for_type(TypeKey::of::<Repo>()).len(), 1);
    }
}
