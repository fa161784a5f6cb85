//! # Component Macros
//!
//! 为受管组件生成属性注入代码，替代运行时反射。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use component_macros::Settable;
//! use infrastructure_common::{ComponentCell, PropertyCell};
//!
//! #[derive(Default, Settable)]
//! #[property(rename_all = "camelCase")]
//! pub struct AccountService {
//!     #[property]
//!     account_dao: ComponentCell,
//!     #[property(name = "limit")]
//!     max_amount: PropertyCell<i64>,
//! }
//! ```
//!
//! 标注 `#[property]` 的字段必须实现 `infrastructure_common::PropertyTarget`
//! （`PropertyCell<T>`、`ComponentCell`、`ComponentListCell`）。

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod settable;
mod utils;

/// 属性注入派生宏
///
/// 为结构体实现 `Settable`，按属性名把已解析的值分派到对应字段，并生成
/// `PROPERTY_NAMES` 常量。
///
/// # 参数
///
/// - 结构体 `#[property(rename_all = "camelCase")]` - 属性名命名规则
/// - 字段 `#[property]` - 以字段名作为属性名
/// - 字段 `#[property(name = "x")]` - 自定义属性名
#[proc_macro_derive(Settable, attributes(property))]
pub fn derive_settable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    settable::derive_settable_impl(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
