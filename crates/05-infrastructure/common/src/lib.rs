//! # Infrastructure Common
//!
//! 这个 crate 提供了 Lorn ADSP 受管组件容器的公共类型。
//!
//! ## 核心组件
//!
//! - [`Managed`] - 受管组件 trait
//! - [`Settable`] / [`Constructible`] - 属性注入与构造能力
//! - [`ExecutionContext`] - 显式传递的逻辑执行上下文
//! - [`ContainerConfig`] - 容器配置
//! - [`ContainerError`] - 容器错误
//!
//! ## 设计原则
//!
//! - 不依赖运行时反射，能力通过 trait 在编译期声明
//! - 组件引用以 `Arc<dyn Managed>` 在容器、钩子与代理间共享

pub mod component;
pub mod configuration;
pub mod context;
pub mod errors;
pub mod lifecycle;
pub mod metadata;

pub use component::*;
pub use configuration::*;
pub use context::*;
pub use errors::*;
pub use lifecycle::*;
pub use metadata::*;
