//! 默认组件定义注册表

use di_abstractions::{ComponentDefinition, DefinitionRegistry, Names};
use infrastructure_common::{ContainerError, ContainerResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// 基于哈希表与注册顺序列表的定义注册表
#[derive(Debug, Default)]
pub struct DefaultDefinitionRegistry {
    definitions: HashMap<String, Arc<ComponentDefinition>>,
    order: Vec<String>,
    allow_overriding: bool,
}

impl DefaultDefinitionRegistry {
    /// 创建新的注册表
    pub fn new(allow_overriding: bool) -> Self {
        Self {
            definitions: HashMap::new(),
            order: Vec::new(),
            allow_overriding,
        }
    }

    /// 是否允许同名定义覆盖
    pub const fn allows_overriding(&self) -> bool {
        self.allow_overriding
    }
}

impl DefinitionRegistry for DefaultDefinitionRegistry {
    fn register(&mut self, definition: ComponentDefinition) -> ContainerResult<()> {
        let name = definition.name().to_string();
        if name.is_empty() {
            return Err(ContainerError::InvalidDefinition {
                name,
                message: "组件名称不能为空".to_string(),
            });
        }

        if self.definitions.contains_key(&name) {
            if !self.allow_overriding {
                return Err(ContainerError::DuplicateDefinition { name });
            }
            warn!("覆盖组件定义: {} ({})", name, definition.type_info());
        } else {
            self.order.push(name.clone());
        }

        debug!(
            "注册组件定义: {} ({}, {})",
            name,
            definition.type_info(),
            definition.scope()
        );
        self.definitions.insert(name, Arc::new(definition));
        Ok(())
    }

    fn get(&self, name: &str) -> ContainerResult<Arc<ComponentDefinition>> {
        self.definitions
            .get(name)
            .cloned()
            .ok_or_else(|| ContainerError::UnknownComponent {
                name: name.to_string(),
            })
    }

    fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    fn remove(&mut self, name: &str) -> ContainerResult<Arc<ComponentDefinition>> {
        let definition =
            self.definitions
                .remove(name)
                .ok_or_else(|| ContainerError::UnknownComponent {
                    name: name.to_string(),
                })?;
        self.order.retain(|existing| existing != name);
        debug!("移除组件定义: {}", name);
        Ok(definition)
    }

    fn names(&self) -> Names<'_> {
        Names::new(&self.order)
    }

    fn len(&self) -> usize {
        self.definitions.len()
    }
}
