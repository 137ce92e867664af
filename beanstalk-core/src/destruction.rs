//! 销毁协调
//!
//! 依赖方总是先于被依赖方销毁，每个销毁回调最多执行一次。
//! 单个 Bean 的销毁失败只记录日志，不影响其他 Bean。

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::bean::{BeanRef, CallbackFn};

struct Disposable {
    target: BeanRef,
    callback: CallbackFn,
}

#[derive(Default)]
struct Inner {
    disposables: HashMap<String, Disposable>,
    /// dependency -> dependents（按注册顺序）
    dependents: HashMap<String, Vec<String>>,
    destroyed: HashSet<String>,
}

/// 可销毁 Bean 注册表
#[derive(Default)]
pub struct DisposableBeanRegistry {
    inner: Mutex<Inner>,
}

impl DisposableBeanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记销毁回调，`target` 为未经包装的原始实例
    pub(crate) fn register_disposable(&self, name: &str, target: BeanRef, callback: CallbackFn) {
        let mut inner = self.inner.lock();
        inner.destroyed.remove(name);
        inner
            .disposables
            .insert(name.to_string(), Disposable { target, callback });
    }

    /// 单例重新创建后清除其销毁标记
    pub(crate) fn mark_active(&self, name: &str) {
        self.inner.lock().destroyed.remove(name);
    }

    /// 记录 `dependent` 依赖于 `dependency`
    pub fn register_dependent(&self, dependency: &str, dependent: &str) {
        if dependency == dependent {
            return;
        }
        let mut inner = self.inner.lock();
        let list = inner.dependents.entry(dependency.to_string()).or_default();
        if !list.iter().any(|d| d == dependent) {
            list.push(dependent.to_string());
        }
    }

    /// 依赖于 `name` 的 Bean 名称
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.inner
            .lock()
            .dependents
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_disposable(&self, name: &str) -> bool {
        self.inner.lock().disposables.contains_key(name)
    }

    /// 销毁单个单例
    ///
    /// 先递归销毁依赖方，再调用 `remove` 将其移出一级缓存，最后执行回调。
    pub fn destroy_singleton(&self, name: &str, remove: &dyn Fn(&str)) {
        let dependents = {
            let mut inner = self.inner.lock();
            if !inner.destroyed.insert(name.to_string()) {
                return;
            }
            inner.dependents.remove(name).unwrap_or_default()
        };

        for dependent in dependents.iter().rev() {
            tracing::trace!("Destroying dependent '{}' before '{}'", dependent, name);
            self.destroy_singleton(dependent, remove);
        }

        remove(name);

        let disposable = self.inner.lock().disposables.remove(name);
        if let Some(disposable) = disposable {
            tracing::debug!("Invoking destroy callback on bean '{}'", name);
            match (disposable.callback)(&*disposable.target) {
                Ok(()) => tracing::debug!("Bean '{}' destroyed successfully", name),
                Err(e) => tracing::warn!("Failed to destroy bean '{}': {:#}", name, e),
            }
        }
    }

    /// 按完成顺序的逆序销毁所有单例
    pub fn destroy_all(&self, completed: &[String], remove: &dyn Fn(&str)) {
        for name in completed.iter().rev() {
            self.destroy_singleton(name, remove);
        }

        let mut inner = self.inner.lock();
        if !inner.disposables.is_empty() {
            tracing::warn!(
                "{} disposable bean(s) were never completed and are dropped without callback",
                inner.disposables.len()
            );
        }
        inner.disposables.clear();
        inner.dependents.clear();
        inner.destroyed.clear();
    }

    /// 创建失败后清理记录
    ///
    /// 返回已经拿到半成品引用的依赖方，调用者需要将它们一并销毁。
    pub(crate) fn forget_failed(&self, name: &str) -> Vec<String> {
        let mut inner = self.inner.lock();
        inner.disposables.remove(name);
        inner.dependents.remove(name).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::sync::Arc;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> CallbackFn {
        let log = log.clone();
        Arc::new(move |_: &(dyn Any + Send + Sync)| {
            log.lock().push(name.to_string());
            Ok(())
        })
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_dependents_destroyed_first() {
        let registry = DisposableBeanRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let removed = Arc::new(Mutex::new(Vec::new()));

        registry.register_disposable("b", Arc::new(()), recorder(&log, "b"));
        registry.register_disposable("a", Arc::new(()), recorder(&log, "a"));
        registry.register_dependent("b", "a");

        // a 先完成也必须先销毁
        let remove = {
            let removed = removed.clone();
            move |n: &str| removed.lock().push(n.to_string())
        };
        registry.destroy_all(&names(&["a", "b"]), &remove);

        assert_eq!(*log.lock(), names(&["a", "b"]));
        assert_eq!(*removed.lock(), names(&["a", "b"]));
    }

    #[test]
    fn test_callback_runs_once_even_with_cycles() {
        let registry = DisposableBeanRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.register_disposable("a", Arc::new(()), recorder(&log, "a"));
        registry.register_disposable("b", Arc::new(()), recorder(&log, "b"));
        registry.register_dependent("a", "b");
        registry.register_dependent("b", "a");

        registry.destroy_all(&names(&["a", "b"]), &|_: &str| {});
        let log = log.lock();
        assert_eq!(log.len(), 2);
        assert!(log.contains(&"a".to_string()));
        assert!(log.contains(&"b".to_string()));
    }

    #[test]
    fn test_failing_callback_is_isolated() {
        let registry = DisposableBeanRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.register_disposable("ok", Arc::new(()), recorder(&log, "ok"));
        registry.register_disposable(
            "broken",
            Arc::new(()),
            Arc::new(|_: &(dyn Any + Send + Sync)| Err(anyhow::anyhow!("boom"))),
        );

        registry.destroy_all(&names(&["ok", "broken"]), &|_: &str| {});
        assert_eq!(*log.lock(), names(&["ok"]));
        assert!(!registry.has_disposable("ok"));
    }

    #[test]
    fn test_forget_failed_returns_dependents() {
        let registry = DisposableBeanRegistry::new();
        registry.register_dependent("a", "b");
        registry.register_dependent("a", "b");
        assert_eq!(registry.dependents_of("a"), names(&["b"]));
        assert_eq!(registry.forget_failed("a"), names(&["b"]));
        assert!(registry.dependents_of("a").is_empty());
    }
}
