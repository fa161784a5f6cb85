//! 宏工具函数

use syn::{Attribute, Expr, Field, Fields, Ident, Lit, Meta, Result};

/// 属性名称的命名规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenameRule {
    /// 保持字段名
    #[default]
    None,
    /// 蛇形转驼峰
    CamelCase,
}

impl RenameRule {
    /// 解析命名规则
    pub fn parse(value: &str, span: proc_macro2::Span) -> Result<Self> {
        match value {
            "camelCase" => Ok(Self::CamelCase),
            "snake_case" => Ok(Self::None),
            other => Err(syn::Error::new(
                span,
                format!("不支持的命名规则: {}，可选 camelCase 或 snake_case", other),
            )),
        }
    }

    /// 应用到字段名
    pub fn apply(self, field_name: &str) -> String {
        match self {
            Self::None => field_name.to_string(),
            Self::CamelCase => to_camel_case(field_name),
        }
    }
}

/// 结构体级 `#[property(...)]` 参数
#[derive(Debug, Default)]
pub struct ContainerArgs {
    /// 命名规则
    pub rename_all: RenameRule,
}

/// 字段级 `#[property(...)]` 参数
#[derive(Debug, Default)]
pub struct FieldArgs {
    /// 自定义属性名
    pub name: Option<String>,
}

/// 注入属性描述
pub struct PropertyField<'a> {
    /// 字段标识符
    pub ident: &'a Ident,
    /// 对外的属性名
    pub name: String,
}

/// 读取字符串字面值
fn string_value(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            Lit::Str(lit_str) => Some(lit_str.value()),
            _ => None,
        },
        _ => None,
    }
}

/// 是否为 `#[property]` 属性
fn is_property_attr(attr: &Attribute) -> bool {
    attr.path().is_ident("property")
}

/// 解析结构体级参数
pub fn parse_container_args(attrs: &[Attribute]) -> Result<ContainerArgs> {
    let mut args = ContainerArgs::default();
    for attr in attrs.iter().filter(|attr| is_property_attr(attr)) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                let value: syn::LitStr = meta.value()?.parse()?;
                args.rename_all = RenameRule::parse(&value.value(), value.span())?;
                Ok(())
            } else {
                Err(meta.error("结构体上的 #[property] 只支持 rename_all"))
            }
        })?;
    }
    Ok(args)
}

/// 解析字段级参数，字段未标注 `#[property]` 时返回 `None`
pub fn parse_field_args(field: &Field) -> Result<Option<FieldArgs>> {
    let mut result = None;
    for attr in field.attrs.iter().filter(|attr| is_property_attr(attr)) {
        let args = result.get_or_insert_with(FieldArgs::default);
        if let Meta::Path(_) = attr.meta {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value = meta.value()?;
                let expr: Expr = value.parse()?;
                args.name = Some(
                    string_value(&expr)
                        .ok_or_else(|| syn::Error::new_spanned(&expr, "name 必须是字符串字面值"))?,
                );
                Ok(())
            } else {
                Err(meta.error("字段上的 #[property] 只支持 name"))
            }
        })?;
    }
    Ok(result)
}

/// 收集标注了 `#[property]` 的具名字段
pub fn collect_property_fields<'a>(
    fields: &'a Fields,
    rename_all: RenameRule,
) -> Result<Vec<PropertyField<'a>>> {
    let Fields::Named(named) = fields else {
        return Err(syn::Error::new_spanned(
            fields,
            "Settable 只能派生于具名字段的结构体",
        ));
    };

    let mut properties = Vec::new();
    for field in &named.named {
        let Some(args) = parse_field_args(field)? else {
            continue;
        };
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let name = args
            .name
            .unwrap_or_else(|| rename_all.apply(&ident.to_string()));
        if properties
            .iter()
            .any(|existing: &PropertyField<'_>| existing.name == name)
        {
            return Err(syn::Error::new_spanned(
                field,
                format!("属性名重复: {}", name),
            ));
        }
        properties.push(PropertyField { ident, name });
    }
    Ok(properties)
}

/// 将蛇形命名转换为驼峰命名
pub fn to_camel_case(s: &str) -> String {
    let mut result = String::new();
    let mut capitalize_next = false;

    for ch in s.chars() {
        if ch == '_' {
            capitalize_next = !result.is_empty();
        } else if capitalize_next {
            result.extend(ch.to_uppercase());
            capitalize_next = false;
        } else {
            result.push(ch);
        }
    }

    result
}
