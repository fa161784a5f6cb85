//! 单例实例缓存
//!
//! 完全初始化的单例存放在并发哈希表中，查找无需创建锁；
//! 创建中标记、早期引用提供函数与已暴露的早期引用在互斥锁保护的内部状态中。

use dashmap::DashMap;
use infrastructure_common::{BoxError, ComponentRef, InstanceState};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// 早期引用提供函数：在实例刚构造完成时注册，最多被消费一次
pub type EarlyReferenceThunk = Box<dyn FnOnce() -> Result<ComponentRef, BoxError> + Send>;

#[derive(Default)]
struct CacheInner {
    in_creation: HashSet<String>,
    early_factories: HashMap<String, EarlyReferenceThunk>,
    early_instances: HashMap<String, ComponentRef>,
    creation_order: Vec<String>,
    destroyed: HashSet<String>,
    dependents: HashMap<String, HashSet<String>>,
}

/// 单例实例缓存
#[derive(Default)]
pub struct InstanceCache {
    singletons: DashMap<String, ComponentRef>,
    inner: Mutex<CacheInner>,
}

impl InstanceCache {
    /// 创建空缓存
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取完全初始化的单例
    pub fn get_if_present(&self, name: &str) -> Option<ComponentRef> {
        self.singletons
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// 获取创建中单例的早期引用
    ///
    /// 第一次获取时消费提供函数并记录结果，此后返回同一引用。
    /// 尚未注册提供函数（如构造参数循环）时返回 `None`。
    pub fn get_early_reference(&self, name: &str) -> Result<Option<ComponentRef>, BoxError> {
        let thunk = {
            let mut inner = self.inner.lock();
            if let Some(early) = inner.early_instances.get(name) {
                return Ok(Some(Arc::clone(early)));
            }
            match inner.early_factories.remove(name) {
                Some(thunk) => thunk,
                None => return Ok(None),
            }
        };

        // 提供函数可能调用钩子，不能持有内部锁
        let early = thunk()?;
        trace!("暴露早期引用: {}", name);
        self.inner
            .lock()
            .early_instances
            .insert(name.to_string(), Arc::clone(&early));
        Ok(Some(early))
    }

    /// 注册早期引用提供函数
    pub fn register_early_reference(&self, name: &str, thunk: EarlyReferenceThunk) {
        let mut inner = self.inner.lock();
        if inner.in_creation.contains(name) {
            inner.early_factories.insert(name.to_string(), thunk);
        }
    }

    /// 已暴露给其他组件的早期引用
    pub fn exposed_early_reference(&self, name: &str) -> Option<ComponentRef> {
        self.inner.lock().early_instances.get(name).cloned()
    }

    /// 标记为创建中，已处于创建中时返回 `false`
    pub fn mark_in_creation(&self, name: &str) -> bool {
        let mut inner = self.inner.lock();
        inner.destroyed.remove(name);
        inner.in_creation.insert(name.to_string())
    }

    /// 是否处于创建中
    pub fn is_in_creation(&self, name: &str) -> bool {
        self.inner.lock().in_creation.contains(name)
    }

    /// 记录完全初始化的单例
    pub fn mark_created(&self, name: &str, instance: ComponentRef) {
        let mut inner = self.inner.lock();
        inner.in_creation.remove(name);
        inner.early_factories.remove(name);
        inner.early_instances.remove(name);
        inner.creation_order.push(name.to_string());
        self.singletons.insert(name.to_string(), instance);
    }

    /// 创建失败时回滚到未开始状态，不缓存任何内容
    pub fn rollback(&self, name: &str) {
        let mut inner = self.inner.lock();
        inner.in_creation.remove(name);
        inner.early_factories.remove(name);
        inner.early_instances.remove(name);
    }

    /// 记录 `dependent` 持有 `target` 的引用
    pub fn register_dependent(&self, target: &str, dependent: &str) {
        if target == dependent {
            return;
        }
        self.inner
            .lock()
            .dependents
            .entry(target.to_string())
            .or_default()
            .insert(dependent.to_string());
    }

    /// 直接依赖 `name` 的组件
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        let inner = self.inner.lock();
        let mut dependents: Vec<String> = inner
            .dependents
            .get(name)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        dependents.sort();
        dependents
    }

    /// 创建失败后移出所有（传递地）持有 `name` 引用的已缓存单例
    ///
    /// 返回被移出的单例，按创建顺序的逆序排列。被移出的单例回到未开始状态，
    /// 下次查找时重新创建。
    pub fn evict_dependents(&self, name: &str) -> Vec<(String, ComponentRef)> {
        let mut inner = self.inner.lock();
        let mut pending = vec![name.to_string()];
        let mut visited = HashSet::new();
        let mut evicted = Vec::new();

        while let Some(current) = pending.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let Some(dependents) = inner.dependents.remove(&current) else {
                continue;
            };
            for dependent in dependents {
                if let Some((_, instance)) = self.singletons.remove(&dependent) {
                    evicted.push((dependent.clone(), instance));
                }
                pending.push(dependent);
            }
        }

        evicted.sort_by_key(|(name, _)| {
            std::cmp::Reverse(inner.creation_order.iter().position(|existing| existing == name))
        });
        let evicted_names: HashSet<&str> = evicted.iter().map(|(name, _)| name.as_str()).collect();
        inner
            .creation_order
            .retain(|existing| !evicted_names.contains(existing.as_str()));
        evicted
    }

    /// 标记为已销毁并移出缓存
    pub fn mark_destroyed(&self, name: &str) {
        let mut inner = self.inner.lock();
        inner.creation_order.retain(|existing| existing != name);
        inner.destroyed.insert(name.to_string());
        inner.dependents.remove(name);
        self.singletons.remove(name);
    }

    /// 单例状态
    pub fn state(&self, name: &str) -> InstanceState {
        if self.singletons.contains_key(name) {
            return InstanceState::FullyInitialized;
        }
        let inner = self.inner.lock();
        if inner.in_creation.contains(name) {
            InstanceState::InCreation
        } else if inner.destroyed.contains(name) {
            InstanceState::Destroyed
        } else {
            InstanceState::NotStarted
        }
    }

    /// 成功创建的顺序
    pub fn creation_order(&self) -> Vec<String> {
        self.inner.lock().creation_order.clone()
    }

    /// 完全初始化的单例数量
    pub fn singleton_count(&self) -> usize {
        self.singletons.len()
    }
}

impl fmt::Debug for InstanceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("InstanceCache")
            .field("singletons", &self.singletons.len())
            .field("in_creation", &inner.in_creation)
            .field("creation_order", &inner.creation_order)
            .finish()
    }
}
