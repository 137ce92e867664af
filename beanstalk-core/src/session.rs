//! 创建会话 - 记录当前线程正在创建的 Bean
//!
//! 会话是线程私有的：其他线程等待同一个单例时不会被误判为循环依赖。

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::scope::Scope;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static IN_CREATION: RefCell<HashMap<u64, Vec<(String, Scope)>>> = RefCell::new(HashMap::new());
}

/// 每个工厂一份的创建会话句柄
#[derive(Debug)]
pub(crate) struct CreationSession {
    id: u64,
}

impl CreationSession {
    pub(crate) fn new() -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// 当前线程是否正在创建 `name`
    pub(crate) fn contains(&self, name: &str) -> bool {
        IN_CREATION.with(|m| {
            m.borrow()
                .get(&self.id)
                .map(|stack| stack.iter().any(|(n, _)| n == name))
                .unwrap_or(false)
        })
    }

    /// 标记开始创建，返回的守卫在析构时移除标记
    pub(crate) fn enter(&self, name: &str, scope: &Scope) -> SessionGuard {
        IN_CREATION.with(|m| {
            m.borrow_mut()
                .entry(self.id)
                .or_default()
                .push((name.to_string(), scope.clone()));
        });
        tracing::trace!("Entering creation of '{}' ({})", name, scope);
        SessionGuard {
            id: self.id,
            name: name.to_string(),
        }
    }

    /// 从第一次出现的 `name` 到栈顶的创建链，末尾再补上 `name`
    pub(crate) fn cycle_chain(&self, name: &str) -> Vec<String> {
        IN_CREATION.with(|m| {
            let map = m.borrow();
            let stack = map.get(&self.id).map(Vec::as_slice).unwrap_or(&[]);
            let start = stack.iter().position(|(n, _)| n == name).unwrap_or(stack.len());
            stack[start..]
                .iter()
                .map(|(n, _)| n.clone())
                .chain(std::iter::once(name.to_string()))
                .collect()
        })
    }

    /// 当前线程正在创建的名称（由外到内）
    pub(crate) fn current(&self) -> Vec<String> {
        IN_CREATION.with(|m| {
            m.borrow()
                .get(&self.id)
                .map(|stack| stack.iter().map(|(n, _)| n.clone()).collect())
                .unwrap_or_default()
        })
    }
}

/// 创建标记守卫
///
/// 无论成功、失败还是 panic 都会移除对应标记。
pub(crate) struct SessionGuard {
    id: u64,
    name: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let removed = IN_CREATION
            .try_with(|m| {
                let mut map = m.borrow_mut();
                let Some(stack) = map.get_mut(&self.id) else {
                    return false;
                };
                let found = match stack.iter().rposition(|(n, _)| n == &self.name) {
                    Some(pos) => {
                        stack.remove(pos);
                        true
                    }
                    None => false,
                };
                if stack.is_empty() {
                    map.remove(&self.id);
                }
                found
            })
            .unwrap_or(false);

        if !removed {
            tracing::error!("Failed to clear creation marker for '{}'", self.name);
        }
    }
}
