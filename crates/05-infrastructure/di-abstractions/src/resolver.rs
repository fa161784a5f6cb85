//! 解析上下文
//!
//! 记录一次顶层查找过程中的解析链，用于原型循环检测、深度限制与错误报告。

use thiserror::Error;

/// 解析深度超过上限
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("解析深度超过上限 {max_depth}: {}", .chain.join(" -> "))]
pub struct DepthExceeded {
    /// 深度上限
    pub max_depth: usize,
    /// 超限时的解析链
    pub chain: Vec<String>,
}

/// 解析上下文
#[derive(Debug, Clone)]
pub struct ResolveContext {
    /// 当前解析链
    resolution_chain: Vec<String>,
    /// 最大递归深度
    max_depth: usize,
}

impl ResolveContext {
    /// 创建新的解析上下文
    pub fn new(max_depth: usize) -> Self {
        Self {
            resolution_chain: Vec::new(),
            max_depth,
        }
    }

    /// 进入组件解析
    pub fn enter(&mut self, name: &str) -> Result<(), DepthExceeded> {
        if self.resolution_chain.len() >= self.max_depth {
            return Err(DepthExceeded {
                max_depth: self.max_depth,
                chain: self.chain_with(name),
            });
        }
        self.resolution_chain.push(name.to_string());
        Ok(())
    }

    /// 退出当前组件解析
    pub fn exit(&mut self) {
        self.resolution_chain.pop();
    }

    /// 组件是否已在解析链中
    pub fn contains(&self, name: &str) -> bool {
        self.resolution_chain.iter().any(|entry| entry == name)
    }

    /// 当前解析链
    pub fn chain(&self) -> &[String] {
        &self.resolution_chain
    }

    /// 当前解析链追加一个名称后的副本
    pub fn chain_with(&self, name: &str) -> Vec<String> {
        let mut chain = self.resolution_chain.clone();
        chain.push(name.to_string());
        chain
    }

    /// 以指定名称结尾的解析链，名称已在链尾时不重复追加
    pub fn chain_ending_with(&self, name: &str) -> Vec<String> {
        if self.resolution_chain.last().map(String::as_str) == Some(name) {
            self.resolution_chain.clone()
        } else {
            self.chain_with(name)
        }
    }

    /// 当前深度
    pub fn depth(&self) -> usize {
        self.resolution_chain.len()
    }
}

impl Default for ResolveContext {
    fn default() -> Self {
        Self::new(100)
    }
}
