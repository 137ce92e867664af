//! 连接点（JoinPoint）定义
//!
//! 连接点是一次方法调用：方法标识、参数、目标对象，以及尚未执行的拦截器链。

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use beanstalk_core::TypeKey;

use crate::chain::ChainEntry;
use crate::error::{AopError, AopResult};
use crate::pointcut::TargetClass;

/// 方法返回值（类型擦除）
pub type ReturnValue = Box<dyn Any + Send + Sync>;

/// 一次调用的结果
pub type InvocationResult = anyhow::Result<ReturnValue>;

/// 方法标识
///
/// `owner` 是声明该方法的类型，通常是一个 `dyn Trait`。
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Method {
    owner: TypeKey,
    name: &'static str,
}

impl Method {
    pub fn new(owner: TypeKey, name: &'static str) -> Self {
        Self { owner, name }
    }

    /// 声明在 `T` 上的方法
    pub fn of<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self::new(TypeKey::of::<T>(), name)
    }

    pub fn owner(&self) -> TypeKey {
        self.owner
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 例如 `dyn Greeter::greet`
    pub fn signature(&self) -> String {
        format!("{}::{}", self.owner.short_name(), self.name)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Method({})", self.signature())
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

/// 方法参数
#[derive(Default)]
pub struct Args {
    values: Vec<Box<dyn Any + Send + Sync>>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加参数（构建器形式）
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.push(value);
        self
    }

    pub fn push<T: Any + Send + Sync>(&mut self, value: T) {
        self.values.push(Box::new(value));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get<T: Any>(&self, index: usize) -> AopResult<&T> {
        self.values
            .get(index)
            .and_then(|v| v.downcast_ref::<T>())
            .ok_or_else(|| mismatch::<T>(index))
    }

    pub fn get_mut<T: Any>(&mut self, index: usize) -> AopResult<&mut T> {
        self.values
            .get_mut(index)
            .and_then(|v| v.downcast_mut::<T>())
            .ok_or_else(|| mismatch::<T>(index))
    }

    /// 替换第 `index` 个参数
    pub fn set<T: Any + Send + Sync>(&mut self, index: usize, value: T) -> AopResult<()> {
        let slot = self.values.get_mut(index).ok_or_else(|| mismatch::<T>(index))?;
        *slot = Box::new(value);
        Ok(())
    }
}

fn mismatch<T>(index: usize) -> AopError {
    AopError::ArgumentMismatch {
        method: "<invocation>".to_string(),
        index,
        expected: std::any::type_name::<T>(),
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args").field("len", &self.values.len()).finish()
    }
}

/// 构造 [`Args`]
///
/// ```
/// use beanstalk_aop::args;
///
/// let args = args!["alice".to_string(), 42u32];
/// assert_eq!(*args.get::<u32>(1).unwrap(), 42);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::Args::new()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::Args::new()$(.with($value))+
    };
}

/// 可被代理的目标对象
///
/// 目标对象以方法标识分派调用，这样代理无需知道目标的具体类型。
pub trait Invocable: Send + Sync {
    /// 目标对象暴露的方法
    fn methods(&self) -> Vec<Method>;

    /// 调用目标方法
    fn invoke_method(&self, method: &Method, args: &mut Args) -> InvocationResult;
}

/// 一次方法调用的执行上下文
///
/// 拦截器通过 `proceed` 继续执行链上的下一个拦截器，链尾调用目标方法。
pub struct MethodInvocation<'a> {
    method: &'a Method,
    args: &'a mut Args,
    target: &'a Arc<dyn Invocable>,
    target_class: &'a TargetClass,
    chain: &'a [ChainEntry],
    index: usize,
}

impl<'a> MethodInvocation<'a> {
    pub(crate) fn new(
        method: &'a Method,
        args: &'a mut Args,
        target: &'a Arc<dyn Invocable>,
        target_class: &'a TargetClass,
        chain: &'a [ChainEntry],
    ) -> Self {
        Self {
            method,
            args,
            target,
            target_class,
            chain,
            index: 0,
        }
    }

    pub fn method(&self) -> &Method {
        self.method
    }

    pub fn args(&self) -> &Args {
        &*self.args
    }

    pub fn args_mut(&mut self) -> &mut Args {
        &mut *self.args
    }

    pub fn target(&self) -> &Arc<dyn Invocable> {
        self.target
    }

    pub fn target_class(&self) -> &TargetClass {
        self.target_class
    }

    /// 执行下一个拦截器；守卫条目在运行时不匹配时被跳过
    pub fn proceed(&mut self) -> InvocationResult {
        let chain = self.chain;
        while let Some(entry) = chain.get(self.index) {
            self.index += 1;
            match entry {
                ChainEntry::Unconditional { interceptor, .. } => {
                    return interceptor.invoke(self);
                }
                ChainEntry::Guarded {
                    advisor,
                    interceptor,
                    matcher,
                } => {
                    if matcher.matches_invocation(self.method, self.target_class, &*self.args) {
                        return interceptor.invoke(self);
                    }
                    tracing::trace!(
                        "Skipping advisor '{}' for {}: runtime check failed",
                        advisor,
                        self.method
                    );
                }
            }
        }

        self.target.invoke_method(self.method, &mut *self.args)
    }
}

impl fmt::Debug for MethodInvocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInvocation")
            .field("method", &self.method)
            .field("target", &self.target_class.bean_name())
            .field("position", &self.index)
            .field("chain_len", &self.chain.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Calculator: Send + Sync {}

    #[test]
    fn test_method_signature() {
        let method = Method::of::<dyn Calculator>("add");
        assert_eq!(method.signature(), "dyn Calculator::add");
        assert_eq!(method, Method::of::<dyn Calculator>("add"));
        assert_ne!(method, Method::of::<dyn Calculator>("sub"));
    }

    #[test]
    fn test_args_access() {
        let mut args = args![1u32, "x".to_string()];
        assert_eq!(args.len(), 2);
        assert_eq!(*args.get::<u32>(0).unwrap(), 1);
        assert!(matches!(
            args.get::<u64>(0),
            Err(AopError::ArgumentMismatch { index: 0, .. })
        ));

        *args.get_mut::<u32>(0).unwrap() += 1;
        args.set(1, "y".to_string()).unwrap();
        assert_eq!(*args.get::<u32>(0).unwrap(), 2);
        assert_eq!(args.get::<String>(1).unwrap(), "y");
        assert!(args.set(5, 0u8).is_err());
        assert!(args![].is_empty());
    }
}
