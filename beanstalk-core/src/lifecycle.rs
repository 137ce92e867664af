//! BeanPostProcessor - Bean 工厂扩展机制
//!
//! 在 Bean 初始化前后以及提前暴露时提供钩子，AOP 代理就是通过这些钩子创建的。

use std::any::Any;
use std::sync::Arc;

use crate::bean::{BeanDefinition, BeanRef, TypeKey};
use crate::bean_factory::DefaultListableBeanFactory;

/// 钩子的调用上下文
pub struct ProcessingContext<'a> {
    pub definition: &'a Arc<BeanDefinition>,
    pub factory: &'a DefaultListableBeanFactory,
}

impl<'a> ProcessingContext<'a> {
    pub fn bean_name(&self) -> &str {
        self.definition.name()
    }
}

/// BeanPostProcessor trait
///
/// 使用场景：
/// - AOP 代理创建
/// - Bean 包装
/// - 验证等
///
/// 返回的引用会替换当前引用继续流转。初始化回调始终作用在原始实例上。
pub trait BeanPostProcessor: Send + Sync {
    /// 在初始化回调之前调用
    fn post_process_before_initialization(
        &self,
        bean: BeanRef,
        _ctx: &ProcessingContext<'_>,
    ) -> anyhow::Result<BeanRef> {
        Ok(bean)
    }

    /// 在初始化回调之后调用
    ///
    /// 没有发生提前暴露时，这里是创建代理的时机。
    fn post_process_after_initialization(
        &self,
        bean: BeanRef,
        _ctx: &ProcessingContext<'_>,
    ) -> anyhow::Result<BeanRef> {
        Ok(bean)
    }

    /// 循环依赖中的对端需要提前引用时调用
    ///
    /// 若在这里返回了包装对象，`post_process_after_initialization` 必须返回同一个对象。
    fn get_early_bean_reference(
        &self,
        bean: BeanRef,
        _ctx: &ProcessingContext<'_>,
    ) -> anyhow::Result<BeanRef> {
        Ok(bean)
    }

    /// 处理器名称（用于日志和错误信息）
    fn name(&self) -> &str {
        "BeanPostProcessor"
    }

    /// 优先级（数字越小越先执行），默认为 1000
    fn order(&self) -> i32 {
        1000
    }
}

/// 接口视图解析器
///
/// 当容器中的对象不是定义声明的具体类型（例如代理）时，由解析器提供 `Arc<dyn Trait>` 视图。
/// 返回的 Box 中装的是 `Arc<dyn Trait>`。
pub trait ViewResolver: Send + Sync {
    fn resolve_view(&self, bean: &BeanRef, key: TypeKey) -> Option<Box<dyn Any + Send + Sync>>;
}
