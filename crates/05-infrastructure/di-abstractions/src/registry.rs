//! 组件定义注册表抽象接口

use crate::definition::ComponentDefinition;
use infrastructure_common::{ContainerError, ContainerResult, TypeInfo};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// 组件定义注册表 trait
///
/// 单写多读：写操作需要 `&mut self`，调用方以读写锁保护共享的注册表。
pub trait DefinitionRegistry: Send + Sync {
    /// 注册组件定义，名称冲突且不允许覆盖时返回 `DuplicateDefinition`
    fn register(&mut self, definition: ComponentDefinition) -> ContainerResult<()>;

    /// 获取组件定义
    fn get(&self, name: &str) -> ContainerResult<Arc<ComponentDefinition>>;

    /// 是否存在组件定义
    fn contains(&self, name: &str) -> bool;

    /// 移除组件定义
    fn remove(&mut self, name: &str) -> ContainerResult<Arc<ComponentDefinition>>;

    /// 按注册顺序遍历组件名称；被覆盖的定义保持原位置
    fn names(&self) -> Names<'_>;

    /// 已注册定义数量
    fn len(&self) -> usize;

    /// 是否没有任何定义
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 声明类型或暴露接口与给定类型匹配的组件名称（注册顺序）
    fn names_for_type(&self, type_info: &TypeInfo) -> Vec<String> {
        self.names()
            .filter(|name| {
                self.get(name)
                    .map(|definition| definition.matches_type(type_info))
                    .unwrap_or(false)
            })
            .map(str::to_string)
            .collect()
    }
}

/// 组件名称的惰性序列，可克隆以重新开始遍历
#[derive(Debug, Clone)]
pub struct Names<'a> {
    inner: std::slice::Iter<'a, String>,
}

impl<'a> Names<'a> {
    /// 基于名称切片创建序列
    pub fn new(names: &'a [String]) -> Self {
        Self {
            inner: names.iter(),
        }
    }
}

impl<'a> Iterator for Names<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(String::as_str)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Names<'_> {}

/// 依赖图节点
#[derive(Debug, Clone)]
pub struct DependencyGraphNode {
    /// 组件名称
    pub name: String,
    /// 依赖的组件名称
    pub dependencies: Vec<String>,
}

/// 循环依赖检测器
pub trait CircularDependencyDetector: Send + Sync {
    /// 检测循环依赖，返回第一个发现的环路（首尾为同一名称）
    fn detect_circular_dependencies(&self, graph: &[DependencyGraphNode]) -> ContainerResult<()>;

    /// 从注册表构建依赖图，`edges` 决定每个定义参与图的依赖边
    fn build_dependency_graph(
        &self,
        registry: &dyn DefinitionRegistry,
        edges: &dyn Fn(&ComponentDefinition) -> Vec<String>,
    ) -> Vec<DependencyGraphNode> {
        registry
            .names()
            .filter_map(|name| registry.get(name).ok())
            .map(|definition| DependencyGraphNode {
                name: definition.name().to_string(),
                dependencies: edges(&definition),
            })
            .collect()
    }
}

/// 默认循环依赖检测器
#[derive(Debug, Default)]
pub struct DefaultCircularDependencyDetector;

impl CircularDependencyDetector for DefaultCircularDependencyDetector {
    fn detect_circular_dependencies(&self, graph: &[DependencyGraphNode]) -> ContainerResult<()> {
        // 使用深度优先搜索检测循环依赖
        let index: HashMap<&str, &DependencyGraphNode> =
            graph.iter().map(|node| (node.name.as_str(), node)).collect();
        let mut visited = HashSet::new();
        let mut visiting = Vec::new();

        for node in graph {
            if !visited.contains(node.name.as_str()) {
                Self::dfs_check(&node.name, &index, &mut visited, &mut visiting)?;
            }
        }

        Ok(())
    }
}

impl DefaultCircularDependencyDetector {
    fn dfs_check<'a>(
        current: &'a str,
        index: &HashMap<&'a str, &'a DependencyGraphNode>,
        visited: &mut HashSet<&'a str>,
        visiting: &mut Vec<&'a str>,
    ) -> ContainerResult<()> {
        if let Some(start) = visiting.iter().position(|name| *name == current) {
            // 检测到循环依赖
            let mut chain: Vec<String> = visiting[start..].iter().map(|s| s.to_string()).collect();
            chain.push(current.to_string());
            return Err(ContainerError::CircularDependency { chain });
        }

        if visited.contains(current) {
            return Ok(());
        }

        visiting.push(current);

        // 不在图中的依赖（如未注册的名称）由调用方单独校验
        if let Some(node) = index.get(current).copied() {
            for dep in &node.dependencies {
                Self::dfs_check(dep, index, visited, visiting)?;
            }
        }

        visiting.pop();
        visited.insert(current);

        Ok(())
    }
}
