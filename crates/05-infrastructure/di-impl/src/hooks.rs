//! 扩展钩子链
//!
//! 前置阶段按 (优先级, 注册顺序) 升序执行；后置阶段按优先级降序执行，
//! 同优先级仍保持注册顺序。

use di_abstractions::{ComponentDefinition, ComponentPostProcessor, HookPhase, PropertyValues};
use infrastructure_common::{BoxError, ComponentRef};
use parking_lot::RwLock;
use std::cmp::Reverse;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

/// 钩子执行失败
#[derive(Error, Debug)]
#[error("扩展钩子 {hook} 在 {phase} 阶段失败: {source}")]
pub struct HookError {
    /// 钩子名称
    pub hook: String,
    /// 失败阶段
    pub phase: HookPhase,
    /// 原因
    pub source: BoxError,
}

struct HookEntry {
    hook: Arc<dyn ComponentPostProcessor>,
    priority: i32,
    seq: usize,
}

/// 有序的扩展钩子链
#[derive(Default)]
pub struct HookChain {
    entries: RwLock<Vec<HookEntry>>,
}

impl HookChain {
    /// 创建空钩子链
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加钩子，优先级数值越小越先执行前置阶段
    pub fn add(&self, hook: Arc<dyn ComponentPostProcessor>, priority: i32) {
        let mut entries = self.entries.write();
        let seq = entries.len();
        trace!("注册扩展钩子: {} (优先级 {})", hook.name(), priority);
        entries.push(HookEntry {
            hook,
            priority,
            seq,
        });
    }

    /// 钩子数量
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// 是否没有钩子
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// 指定阶段的执行顺序快照
    ///
    /// 返回快照而非持有读锁，钩子执行期间可以递归创建组件。
    pub fn ordered(&self, phase: HookPhase) -> Vec<Arc<dyn ComponentPostProcessor>> {
        let entries = self.entries.read();
        let mut ordered: Vec<&HookEntry> = entries.iter().collect();
        if phase.is_before() {
            ordered.sort_by_key(|entry| (entry.priority, entry.seq));
        } else {
            ordered.sort_by_key(|entry| (Reverse(entry.priority), entry.seq));
        }
        ordered
            .into_iter()
            .map(|entry| Arc::clone(&entry.hook))
            .collect()
    }

    fn failure(hook: &dyn ComponentPostProcessor, phase: HookPhase, source: BoxError) -> HookError {
        HookError {
            hook: hook.name().to_string(),
            phase,
            source,
        }
    }

    /// 第一个返回替代实例的钩子生效
    pub fn apply_before_instantiation(
        &self,
        definition: &ComponentDefinition,
    ) -> Result<Option<ComponentRef>, HookError> {
        let phase = HookPhase::BeforeInstantiation;
        for hook in self.ordered(phase) {
            let substitute = hook
                .before_instantiation(definition)
                .map_err(|e| Self::failure(hook.as_ref(), phase, e))?;
            if substitute.is_some() {
                trace!("钩子 {} 替代了组件 {} 的实例化", hook.name(), definition.name());
                return Ok(substitute);
            }
        }
        Ok(None)
    }

    /// 第一个返回 `false` 的钩子终止后续钩子并跳过属性注入
    pub fn apply_after_instantiation(
        &self,
        instance: &ComponentRef,
        definition: &ComponentDefinition,
    ) -> Result<bool, HookError> {
        let phase = HookPhase::AfterInstantiation;
        for hook in self.ordered(phase) {
            let proceed = hook
                .after_instantiation(instance, definition)
                .map_err(|e| Self::failure(hook.as_ref(), phase, e))?;
            if !proceed {
                trace!("钩子 {} 跳过了组件 {} 的属性注入", hook.name(), definition.name());
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// 依次改写属性集合
    pub fn apply_property_values(
        &self,
        values: PropertyValues,
        instance: &ComponentRef,
        definition: &ComponentDefinition,
    ) -> Result<PropertyValues, HookError> {
        let phase = HookPhase::PropertyValues;
        self.ordered(phase)
            .into_iter()
            .try_fold(values, |values, hook| {
                hook.property_values(values, instance, definition)
                    .map_err(|e| Self::failure(hook.as_ref(), phase, e))
            })
    }

    /// 依次处理早期引用
    pub fn apply_early_reference(
        &self,
        instance: ComponentRef,
        definition: &ComponentDefinition,
    ) -> Result<ComponentRef, HookError> {
        let phase = HookPhase::EarlyReference;
        self.ordered(phase)
            .into_iter()
            .try_fold(instance, |instance, hook| {
                hook.early_reference(instance, definition)
                    .map_err(|e| Self::failure(hook.as_ref(), phase, e))
            })
    }

    /// 依次处理初始化后的实例，前一个结果传递给下一个钩子
    pub fn apply_after_initialization(
        &self,
        instance: ComponentRef,
        definition: &ComponentDefinition,
    ) -> Result<ComponentRef, HookError> {
        let phase = HookPhase::AfterInitialization;
        self.ordered(phase)
            .into_iter()
            .try_fold(instance, |instance, hook| {
                hook.after_initialization(instance, definition)
                    .map_err(|e| Self::failure(hook.as_ref(), phase, e))
            })
    }
}

impl std::fmt::Debug for HookChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read();
        let hooks: Vec<(&str, i32)> = entries
            .iter()
            .map(|entry| (entry.hook.name(), entry.priority))
            .collect();
        f.debug_struct("HookChain").field("hooks", &hooks).finish()
    }
}
