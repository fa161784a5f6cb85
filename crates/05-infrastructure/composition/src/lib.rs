//! # 基础设施组合层
//!
//! 将容器配置、日志、受管组件容器、自动代理与声明式事务组合为一个可运行的
//! [`ApplicationContext`]。
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use infrastructure_composition::{ApplicationContext, LoggingConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = ApplicationContext::builder()
//!         .with_logging(LoggingConfig::development())
//!         .build()?;
//!
//!     // 注册定义、获取组件...
//!
//!     context.close();
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod context;
pub mod errors;
pub mod logging;

pub use builder::*;
pub use context::*;
pub use errors::*;
pub use logging::*;
