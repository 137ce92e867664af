//! 当前代理上下文
//!
//! 只有开启 `expose_proxy` 时，代理才会在调用期间把自己放进当前线程，
//! 目标对象可以借此通过代理调用自身方法，让通知对内部调用同样生效。

use std::cell::RefCell;
use std::sync::Arc;

use crate::error::{AopError, AopResult};
use crate::proxy::AopProxy;

thread_local! {
    static CURRENT_PROXY: RefCell<Option<Arc<AopProxy>>> = const { RefCell::new(None) };
}

pub struct AopContext;

impl AopContext {
    /// 当前线程正在执行的代理
    pub fn current_proxy() -> AopResult<Arc<AopProxy>> {
        CURRENT_PROXY
            .with(|current| current.borrow().clone())
            .ok_or(AopError::NoCurrentProxy)
    }

    pub(crate) fn enter(proxy: Arc<AopProxy>) -> ProxyScope {
        let previous = CURRENT_PROXY.with(|current| current.replace(Some(proxy)));
        ProxyScope { previous }
    }
}

/// 离开作用域时恢复上一个代理，嵌套调用因此互不干扰
pub(crate) struct ProxyScope {
    previous: Option<Arc<AopProxy>>,
}

impl Drop for ProxyScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        let _ = CURRENT_PROXY.try_with(|current| current.replace(previous));
    }
}
