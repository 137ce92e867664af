use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use crate::bean::BeanRef;
use crate::error::ContainerResult;

/// Bean 的作用域
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// 单例模式 - 容器中只有一个实例
    #[default]
    Singleton,

    /// 原型模式 - 每次请求都创建新实例
    Prototype,

    /// 自定义作用域 - 由注册到容器的 [`CustomScope`] 管理
    Custom(String),
}

impl Scope {
    pub fn is_singleton(&self) -> bool {
        matches!(self, Scope::Singleton)
    }

    pub fn is_prototype(&self) -> bool {
        matches!(self, Scope::Prototype)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Singleton => write!(f, "singleton"),
            Scope::Prototype => write!(f, "prototype"),
            Scope::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// 自定义作用域
///
/// 作用域只负责"在哪里缓存"，创建过程仍由容器完成。
/// 自定义作用域没有三级缓存，循环依赖与原型一样直接失败。
pub trait CustomScope: Send + Sync {
    /// 获取（必要时通过 `object_factory` 创建）指定名称的对象
    fn get(
        &self,
        name: &str,
        object_factory: &dyn Fn() -> ContainerResult<BeanRef>,
    ) -> ContainerResult<BeanRef>;

    /// 从作用域中移除对象
    fn remove(&self, name: &str) -> Option<BeanRef>;

    /// 作用域名称（用于日志）
    fn scope_name(&self) -> &str;
}

thread_local! {
    static THREAD_SCOPED: RefCell<HashMap<String, BeanRef>> = RefCell::new(HashMap::new());
}

/// 线程作用域 - 每个线程持有各自的实例
#[derive(Debug, Default)]
pub struct ThreadScope;

impl ThreadScope {
    /// 推荐的作用域注册名
    pub const NAME: &'static str = "thread";

    pub fn new() -> Self {
        Self
    }
}

impl CustomScope for ThreadScope {
    fn get(
        &self,
        name: &str,
        object_factory: &dyn Fn() -> ContainerResult<BeanRef>,
    ) -> ContainerResult<BeanRef> {
        if let Some(existing) = THREAD_SCOPED.with(|m| m.borrow().get(name).cloned()) {
            return Ok(existing);
        }

        // 创建期间不能持有 borrow，工厂可能再次进入本作用域
        let created = object_factory()?;
        THREAD_SCOPED.with(|m| {
            m.borrow_mut().insert(name.to_string(), created.clone());
        });
        Ok(created)
    }

    fn remove(&self, name: &str) -> Option<BeanRef> {
        THREAD_SCOPED.with(|m| m.borrow_mut().remove(name))
    }

    fn scope_name(&self) -> &str {
        Self::NAME
    }
}
