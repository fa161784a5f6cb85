//! # 受管组件容器实现
//!
//! 提供组件定义注册表、单例实例缓存、扩展钩子链、创建引擎与容器门面的具体实现。
//!
//! ```ignore
//! let container = ManagedContainer::new(ContainerConfig::default());
//! container.register_definition(
//!     ComponentDefinition::of::<AccountDao>("accountDao").with_init_method("open"),
//! )?;
//! container.register_definition(
//!     ComponentDefinition::of::<AccountService>("accountService")
//!         .with_property_ref("dao", "accountDao"),
//! )?;
//! let service = container.get_typed::<AccountService>("accountService")?;
//! ```

pub mod cache;
pub mod container;
pub mod engine;
pub mod hooks;
pub mod registry;

pub use cache::*;
pub use container::*;
pub use engine::*;
pub use hooks::*;
pub use registry::*;
