// beanstalk-core: 托管对象容器
//
// 提供：
// - 单例、原型与自定义作用域
// - 构造函数注入与属性注入（按名称或按类型）
// - 三级缓存解决单例之间的循环依赖
// - BeanPostProcessor 扩展点（AOP 代理在这里接入）
// - 按依赖关系逆序销毁

pub mod bean;
pub mod bean_factory;
pub mod config;
pub mod destruction;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod registry;
pub mod scope;
mod session;
pub mod singleton;
pub mod utils;

// 重新导出常用类型
pub use bean::{
    same_instance, Autowired, BeanDefinition, BeanDefinitionBuilder, BeanRef, DependencyRef,
    Injected, ResolvedArgs, TypeKey,
};
pub use bean_factory::{BeanFactory, BeanFactoryExt, DefaultListableBeanFactory, ListableBeanFactory};
pub use config::ContainerConfig;
pub use error::{ContainerError, ContainerResult};
pub use lifecycle::{BeanPostProcessor, ProcessingContext, ViewResolver};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use scope::{CustomScope, Scope, ThreadScope};

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::bean::{
        same_instance, Autowired, BeanDefinition, BeanRef, DependencyRef, Injected, ResolvedArgs,
        TypeKey,
    };
    pub use crate::bean_factory::{
        BeanFactory, BeanFactoryExt, DefaultListableBeanFactory, ListableBeanFactory,
    };
    pub use crate::config::ContainerConfig;
    pub use crate::error::{ContainerError, ContainerResult};
    pub use crate::lifecycle::{BeanPostProcessor, ProcessingContext, ViewResolver};
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use crate::scope::{CustomScope, Scope, ThreadScope};
    pub use crate::utils;
    // Re-export anyhow for convenience
    pub use anyhow::{anyhow, Context};
}
