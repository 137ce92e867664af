//! 切点（Pointcut）表达式系统
//!
//! 切点由两部分组成：类过滤器决定哪些目标类型参与代理，方法匹配器决定哪些方法被拦截。
//! 静态匹配在构建拦截器链时进行；依赖参数的匹配器在每次调用时再检查一次。

use std::fmt;
use std::sync::Arc;

use beanstalk_core::TypeKey;
use regex::Regex;

use crate::error::{AopError, AopResult};
use crate::joinpoint::{Args, Method};

/// 被代理的目标类型
#[derive(Debug, Clone)]
pub struct TargetClass {
    bean_name: String,
    type_key: TypeKey,
    interfaces: Vec<TypeKey>,
}

impl TargetClass {
    pub fn new(bean_name: impl Into<String>, type_key: TypeKey) -> Self {
        Self {
            bean_name: bean_name.into(),
            type_key,
            interfaces: Vec::new(),
        }
    }

    pub fn of<T: ?Sized + 'static>(bean_name: impl Into<String>) -> Self {
        Self::new(bean_name, TypeKey::of::<T>())
    }

    pub fn with_interfaces(mut self, interfaces: impl IntoIterator<Item = TypeKey>) -> Self {
        for key in interfaces {
            if !self.interfaces.contains(&key) {
                self.interfaces.push(key);
            }
        }
        self
    }

    pub fn bean_name(&self) -> &str {
        &self.bean_name
    }

    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    pub fn interfaces(&self) -> &[TypeKey] {
        &self.interfaces
    }

    /// 具体类型相同，或声明了该接口
    pub fn is_assignable_to(&self, key: TypeKey) -> bool {
        self.type_key == key || self.interfaces.contains(&key)
    }
}

/// 类过滤器
pub trait ClassFilter: Send + Sync {
    fn matches(&self, target: &TargetClass) -> bool;
}

/// 方法匹配器
pub trait MethodMatcher: Send + Sync {
    /// 静态匹配；对运行时匹配器而言返回 `false` 表示一定不匹配
    fn matches(&self, method: &Method, target: &TargetClass) -> bool;

    /// 是否需要在每次调用时根据参数再次检查
    fn is_runtime(&self) -> bool {
        false
    }

    /// 运行时匹配，只对静态匹配通过的方法调用
    fn matches_invocation(&self, method: &Method, target: &TargetClass, _args: &Args) -> bool {
        self.matches(method, target)
    }
}

/// 切点
pub trait Pointcut: Send + Sync {
    fn class_filter(&self) -> Arc<dyn ClassFilter>;

    fn method_matcher(&self) -> Arc<dyn MethodMatcher>;
}

type StaticFn = Arc<dyn Fn(&Method, &TargetClass) -> bool + Send + Sync>;
type RuntimeFn = Arc<dyn Fn(&Method, &TargetClass, &Args) -> bool + Send + Sync>;

/// 通配符模式（支持 `*`）
///
/// - `*` 匹配任意字符串
/// - `User*` 以 User 开头
/// - `*Service` 以 Service 结尾
/// - `*Service*` 包含 Service
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Option<Regex>,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let regex = if source.contains('*') && source != "*" {
            let body = source
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*");
            Regex::new(&format!("^{}$", body)).ok()
        } else {
            None
        };
        Self { source, regex }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, candidate: &str) -> bool {
        if self.source == "*" {
            return true;
        }
        match &self.regex {
            Some(regex) => regex.is_match(candidate),
            None => self.source == candidate,
        }
    }

    /// 匹配类型名：包含 `::` 的模式匹配完整路径，否则匹配短名称
    fn matches_type(&self, key: TypeKey) -> bool {
        if self.source.contains("::") {
            self.matches(key.name())
        } else {
            self.matches(&key.short_name())
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// 静态求值结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tri {
    Yes,
    No,
    /// 需要方法或参数信息才能确定
    Maybe,
}

impl Tri {
    fn from_bool(value: bool) -> Self {
        if value {
            Tri::Yes
        } else {
            Tri::No
        }
    }

    fn and(self, other: Tri) -> Tri {
        match (self, other) {
            (Tri::No, _) | (_, Tri::No) => Tri::No,
            (Tri::Yes, Tri::Yes) => Tri::Yes,
            _ => Tri::Maybe,
        }
    }

    fn or(self, other: Tri) -> Tri {
        match (self, other) {
            (Tri::Yes, _) | (_, Tri::Yes) => Tri::Yes,
            (Tri::No, Tri::No) => Tri::No,
            _ => Tri::Maybe,
        }
    }

    fn not(self) -> Tri {
        match self {
            Tri::Yes => Tri::No,
            Tri::No => Tri::Yes,
            Tri::Maybe => Tri::Maybe,
        }
    }
}

/// 切点表达式
#[derive(Clone)]
pub enum PointcutExpression {
    /// 匹配所有方法
    All,

    /// 匹配类型名，例如 `TypePattern("*Service")`
    TypePattern(Pattern),

    /// 匹配方法名，例如 `MethodPattern("get_*")`
    MethodPattern(Pattern),

    /// 匹配特定类型的特定方法，例如 `execution(* UserService.get_user(..))`
    Execution {
        type_pattern: Pattern,
        method_pattern: Pattern,
    },

    /// 目标类型是 `key` 或声明实现了 `key`
    Within(TypeKey),

    /// 方法声明在 `key` 上
    DeclaredBy(TypeKey),

    /// 使用正则表达式匹配类型短名称
    TypeRegex(Regex),

    /// 使用正则表达式匹配方法名
    MethodRegex(Regex),

    /// 自定义静态匹配
    Custom(StaticFn),

    /// 依赖调用参数的匹配，每次调用都会执行
    Runtime(RuntimeFn),

    And(Box<PointcutExpression>, Box<PointcutExpression>),

    Or(Box<PointcutExpression>, Box<PointcutExpression>),

    Not(Box<PointcutExpression>),
}

impl PointcutExpression {
    pub fn type_pattern(pattern: &str) -> Self {
        Self::TypePattern(Pattern::new(pattern))
    }

    pub fn method_pattern(pattern: &str) -> Self {
        Self::MethodPattern(Pattern::new(pattern))
    }

    pub fn within<T: ?Sized + 'static>() -> Self {
        Self::Within(TypeKey::of::<T>())
    }

    pub fn declared_by<T: ?Sized + 'static>() -> Self {
        Self::DeclaredBy(TypeKey::of::<T>())
    }

    pub fn type_regex(regex: &str) -> AopResult<Self> {
        Ok(Self::TypeRegex(compile(regex)?))
    }

    pub fn method_regex(regex: &str) -> AopResult<Self> {
        Ok(Self::MethodRegex(compile(regex)?))
    }

    pub fn custom<F>(matcher: F) -> Self
    where
        F: Fn(&Method, &TargetClass) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(matcher))
    }

    pub fn runtime<F>(matcher: F) -> Self
    where
        F: Fn(&Method, &TargetClass, &Args) -> bool + Send + Sync + 'static,
    {
        Self::Runtime(Arc::new(matcher))
    }

    /// 解析 execution 表达式
    ///
    /// 格式：`返回类型 类型名.方法名(参数)`，只使用类型名与方法名部分。
    /// 例如 `* UserService.get_*(..)` 或 `* find_all(..)`
    pub fn execution(expression: &str) -> AopResult<Self> {
        let invalid = |reason: &str| AopError::InvalidPointcut {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = expression.split_whitespace();
        let (Some(_return_type), Some(signature), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid("expected '<return> <type>.<method>(..)'"));
        };

        let signature = match signature.find('(') {
            Some(open) if signature.ends_with(')') => &signature[..open],
            Some(_) => return Err(invalid("unbalanced parameter list")),
            None => signature,
        };
        if signature.is_empty() {
            return Err(invalid("missing method name"));
        }

        match signature.rsplit_once('.') {
            Some((type_pattern, method_pattern))
                if !type_pattern.is_empty() && !method_pattern.is_empty() =>
            {
                Ok(Self::Execution {
                    type_pattern: Pattern::new(type_pattern),
                    method_pattern: Pattern::new(method_pattern),
                })
            }
            Some(_) => Err(invalid("empty type or method name")),
            None => Ok(Self::method_pattern(signature)),
        }
    }

    pub fn and(self, other: PointcutExpression) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: PointcutExpression) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// 是否包含依赖参数的匹配
    pub fn is_runtime(&self) -> bool {
        match self {
            Self::Runtime(_) => true,
            Self::And(l, r) | Self::Or(l, r) => l.is_runtime() || r.is_runtime(),
            Self::Not(e) => e.is_runtime(),
            _ => false,
        }
    }

    /// `method` 为 `None` 时只检查类型部分
    fn evaluate(&self, target: &TargetClass, method: Option<&Method>, args: Option<&Args>) -> Tri {
        match self {
            Self::All => Tri::Yes,
            Self::TypePattern(p) => Tri::from_bool(p.matches_type(target.type_key())),
            Self::MethodPattern(p) => by_method(method, |m| p.matches(m.name())),
            Self::Execution {
                type_pattern,
                method_pattern,
            } => Tri::from_bool(type_pattern.matches_type(target.type_key()))
                .and(by_method(method, |m| method_pattern.matches(m.name()))),
            Self::Within(key) => Tri::from_bool(target.is_assignable_to(*key)),
            Self::DeclaredBy(key) => by_method(method, |m| m.owner() == *key),
            Self::TypeRegex(regex) => Tri::from_bool(regex.is_match(&target.type_key().short_name())),
            Self::MethodRegex(regex) => by_method(method, |m| regex.is_match(m.name())),
            Self::Custom(f) => by_method(method, |m| f(m, target)),
            Self::Runtime(f) => match (method, args) {
                (Some(m), Some(a)) => Tri::from_bool(f(m, target, a)),
                _ => Tri::Maybe,
            },
            Self::And(l, r) => l.evaluate(target, method, args).and(r.evaluate(target, method, args)),
            Self::Or(l, r) => l.evaluate(target, method, args).or(r.evaluate(target, method, args)),
            Self::Not(e) => e.evaluate(target, method, args).not(),
        }
    }

    pub fn into_pointcut(self) -> Arc<PointcutExpression> {
        Arc::new(self)
    }
}

fn by_method(method: Option<&Method>, check: impl FnOnce(&Method) -> bool) -> Tri {
    match method {
        Some(m) => Tri::from_bool(check(m)),
        None => Tri::Maybe,
    }
}

fn compile(regex: &str) -> AopResult<Regex> {
    Regex::new(regex).map_err(|e| AopError::InvalidPointcut {
        expression: regex.to_string(),
        reason: e.to_string(),
    })
}

impl ClassFilter for PointcutExpression {
    fn matches(&self, target: &TargetClass) -> bool {
        self.evaluate(target, None, None) != Tri::No
    }
}

impl MethodMatcher for PointcutExpression {
    fn matches(&self, method: &Method, target: &TargetClass) -> bool {
        self.evaluate(target, Some(method), None) != Tri::No
    }

    fn is_runtime(&self) -> bool {
        PointcutExpression::is_runtime(self)
    }

    fn matches_invocation(&self, method: &Method, target: &TargetClass, args: &Args) -> bool {
        self.evaluate(target, Some(method), Some(args)) == Tri::Yes
    }
}

impl Pointcut for Arc<PointcutExpression> {
    fn class_filter(&self) -> Arc<dyn ClassFilter> {
        self.clone()
    }

    fn method_matcher(&self) -> Arc<dyn MethodMatcher> {
        self.clone()
    }
}

impl fmt::Debug for PointcutExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "All"),
            Self::TypePattern(p) => write!(f, "TypePattern({:?})", p),
            Self::MethodPattern(p) => write!(f, "MethodPattern({:?})", p),
            Self::Execution {
                type_pattern,
                method_pattern,
            } => write!(f, "Execution({:?}.{:?})", type_pattern, method_pattern),
            Self::Within(key) => write!(f, "Within({})", key.short_name()),
            Self::DeclaredBy(key) => write!(f, "DeclaredBy({})", key.short_name()),
            Self::TypeRegex(r) => write!(f, "TypeRegex({})", r.as_str()),
            Self::MethodRegex(r) => write!(f, "MethodRegex({})", r.as_str()),
            Self::Custom(_) => write!(f, "Custom(...)"),
            Self::Runtime(_) => write!(f, "Runtime(...)"),
            Self::And(l, r) => write!(f, "And({:?}, {:?})", l, r),
            Self::Or(l, r) => write!(f, "Or({:?}, {:?})", l, r),
            Self::Not(e) => write!(f, "Not({:?})", e),
        }
    }
}
