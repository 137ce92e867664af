//! 单例三级缓存
//!
//! - 一级 `completed`：完整初始化的单例，外部只会观察到这一层
//! - 二级 `early`：已实例化（可能已被代理）但尚未完成填充与初始化的引用
//! - 三级 `factories`：生成二级引用的延迟函数，第一次读取时被移除并提升到二级
//!
//! 同一名称任意时刻最多只存在于一层。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bean::BeanRef;
use crate::error::ContainerResult;

/// 三级缓存中的延迟函数
pub type EarlyReferenceFn = Arc<dyn Fn() -> ContainerResult<BeanRef> + Send + Sync>;

#[derive(Default)]
struct Tiers {
    completed: HashMap<String, BeanRef>,
    early: HashMap<String, BeanRef>,
    factories: HashMap<String, EarlyReferenceFn>,
    completion_order: Vec<String>,
}

/// 单例注册表
#[derive(Default)]
pub struct SingletonRegistry {
    tiers: Mutex<Tiers>,
}

impl SingletonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 一级缓存查询
    pub fn get_completed(&self, name: &str) -> Option<BeanRef> {
        self.tiers.lock().completed.get(name).cloned()
    }

    pub fn contains_completed(&self, name: &str) -> bool {
        self.tiers.lock().completed.contains_key(name)
    }

    /// 获取提前暴露的引用
    ///
    /// 优先读二级缓存；否则取出三级缓存中的函数，在锁外执行后写入二级缓存。
    /// 都不存在时返回 `None`。
    pub fn early_reference(&self, name: &str) -> ContainerResult<Option<BeanRef>> {
        let factory = {
            let mut tiers = self.tiers.lock();
            if let Some(bean) = tiers.completed.get(name) {
                return Ok(Some(bean.clone()));
            }
            if let Some(bean) = tiers.early.get(name) {
                tracing::trace!("Returning early reference of '{}' from tier 2", name);
                return Ok(Some(bean.clone()));
            }
            match tiers.factories.remove(name) {
                Some(factory) => factory,
                None => return Ok(None),
            }
        };

        // 函数会调用后置处理器，可能再次进入容器，因此不能持锁执行
        tracing::debug!("Promoting early reference of '{}' from tier 3 to tier 2", name);
        let bean = factory()?;

        let mut tiers = self.tiers.lock();
        let bean = tiers.early.entry(name.to_string()).or_insert(bean).clone();
        Ok(Some(bean))
    }

    /// 只读二级缓存
    pub fn peek_early(&self, name: &str) -> Option<BeanRef> {
        self.tiers.lock().early.get(name).cloned()
    }

    /// 注册三级缓存函数（已完成的单例忽略）
    pub fn add_factory(&self, name: &str, factory: EarlyReferenceFn) {
        let mut tiers = self.tiers.lock();
        if tiers.completed.contains_key(name) {
            return;
        }
        tiers.early.remove(name);
        tiers.factories.insert(name.to_string(), factory);
        tracing::trace!("Registered early reference factory for '{}'", name);
    }

    /// 写入一级缓存，并清理二、三级缓存
    pub fn add_completed(&self, name: &str, bean: BeanRef) {
        let mut tiers = self.tiers.lock();
        tiers.early.remove(name);
        tiers.factories.remove(name);
        if tiers.completed.insert(name.to_string(), bean).is_none() {
            tiers.completion_order.push(name.to_string());
        }
    }

    /// 从所有层中移除，返回一级缓存中的值
    pub fn remove(&self, name: &str) -> Option<BeanRef> {
        let mut tiers = self.tiers.lock();
        tiers.early.remove(name);
        tiers.factories.remove(name);
        let removed = tiers.completed.remove(name);
        if removed.is_some() {
            tiers.completion_order.retain(|n| n != name);
        }
        removed
    }

    /// 创建失败后丢弃半成品引用
    pub fn discard_partial(&self, name: &str) {
        let mut tiers = self.tiers.lock();
        let had_early = tiers.early.remove(name).is_some();
        let had_factory = tiers.factories.remove(name).is_some();
        if had_early || had_factory {
            tracing::debug!("Discarded partially created singleton '{}'", name);
        }
    }

    /// 已完成单例的名称（按完成顺序）
    pub fn completed_names(&self) -> Vec<String> {
        self.tiers.lock().completion_order.clone()
    }

    pub fn len(&self) -> usize {
        self.tiers.lock().completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut tiers = self.tiers.lock();
        tiers.completed.clear();
        tiers.early.clear();
        tiers.factories.clear();
        tiers.completion_order.clear();
    }

    #[cfg(test)]
    fn tier_of(&self, name: &str) -> Option<u8> {
        let tiers = self.tiers.lock();
        if tiers.completed.contains_key(name) {
            Some(1)
        } else if tiers.early.contains_key(name) {
            Some(2)
        } else if tiers.factories.contains_key(name) {
            Some(3)
        } else {
            None
        }
    }
}
