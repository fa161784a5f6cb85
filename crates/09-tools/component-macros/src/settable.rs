//! `Settable` 派生宏实现

use crate::utils::{collect_property_fields, parse_container_args};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Result};

/// 生成 `Settable` 实现与属性名称常量
pub fn derive_settable_impl(input: &DeriveInput) -> Result<TokenStream> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Settable 只能派生于结构体",
        ));
    };

    let args = parse_container_args(&input.attrs)?;
    let properties = collect_property_fields(&data.fields, args.rename_all)?;

    let struct_name = &input.ident;
    let type_name = struct_name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let names: Vec<&str> = properties.iter().map(|field| field.name.as_str()).collect();
    let arms = properties.iter().map(|field| {
        let ident = field.ident;
        let name = &field.name;
        quote! {
            #name => ::infrastructure_common::PropertyTarget::assign(&self.#ident, name, value),
        }
    });

    Ok(quote! {
        impl #impl_generics #struct_name #ty_generics #where_clause {
            /// 可注入的属性名称
            pub const PROPERTY_NAMES: &'static [&'static str] = &[#(#names),*];
        }

        impl #impl_generics ::infrastructure_common::Settable for #struct_name #ty_generics #where_clause {
            fn set_property(
                &self,
                name: &str,
                value: ::infrastructure_common::ResolvedValue,
            ) -> ::core::result::Result<(), ::infrastructure_common::PropertyError> {
                let _ = &value;
                match name {
                    #(#arms)*
                    _ => ::core::result::Result::Err(
                        ::infrastructure_common::PropertyError::unknown(#type_name, name),
                    ),
                }
            }
        }
    })
}
