//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义组件定义、注册表、扩展钩子与组件查找的核心接口。
//!
//! ## 核心接口
//!
//! - [`ComponentDefinition`] - 组件定义
//! - [`DefinitionRegistry`] - 组件定义注册表接口
//! - [`ComponentPostProcessor`] - 组件创建扩展钩子
//! - [`ComponentLookup`] - 组件查找接口
//! - [`ResolveContext`] - 解析上下文

pub mod container;
pub mod definition;
pub mod hooks;
pub mod registry;
pub mod resolver;

pub use container::*;
pub use definition::*;
pub use hooks::*;
pub use registry::*;
pub use resolver::*;
