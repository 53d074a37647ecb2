use super::{RenderObjectType, RenderStage, RenderStageIndex, RenderStageMask};
use fnv::FnvHashMap;
use std::sync::Arc;

/// Names the shader/effect variant family an object uses when it enters a stage
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EffectSelector {
    effect_name: Arc<str>,
}

impl EffectSelector {
    pub fn new(effect_name: &str) -> Self {
        EffectSelector {
            effect_name: Arc::from(effect_name),
        }
    }

    pub fn effect_name(&self) -> &str {
        &self.effect_name
    }
}

/// Whether a stage is active for an object (or object type) and with which effect. Active if and
/// only if there is an effect selector.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActiveRenderStage {
    pub effect_selector: Option<EffectSelector>,
}

impl ActiveRenderStage {
    pub fn new(effect_selector: EffectSelector) -> Self {
        ActiveRenderStage {
            effect_selector: Some(effect_selector),
        }
    }

    pub fn inactive() -> Self {
        ActiveRenderStage {
            effect_selector: None,
        }
    }

    #[inline(always)]
    pub fn is_active(&self) -> bool {
        self.effect_selector.is_some()
    }

    pub fn activate(
        &mut self,
        effect_selector: EffectSelector,
    ) {
        self.effect_selector = Some(effect_selector);
    }
}

/// Per object type, one `ActiveRenderStage` per stage index. Written while selectors are
/// registered or removed (setup time) and only read while frames are collected.
#[derive(Default)]
pub struct ActivationTable {
    entries: FnvHashMap<RenderObjectType, Vec<ActiveRenderStage>>,
}

impl ActivationTable {
    pub fn get(
        &self,
        object_type: RenderObjectType,
        render_stage_index: RenderStageIndex,
    ) -> Option<&ActiveRenderStage> {
        self.entries
            .get(&object_type)
            .and_then(|stages| stages.get(render_stage_index as usize))
            .filter(|active| active.is_active())
    }

    pub fn set(
        &mut self,
        object_type: RenderObjectType,
        render_stage: &RenderStage,
        effect_selector: EffectSelector,
    ) {
        let stages = self.entries.entry(object_type).or_default();
        let index = render_stage.index() as usize;
        if stages.len() <= index {
            stages.resize(index + 1, ActiveRenderStage::inactive());
        }

        stages[index].activate(effect_selector);
    }

    pub fn clear_type(
        &mut self,
        object_type: RenderObjectType,
    ) {
        self.entries.remove(&object_type);
    }

    pub fn clear_stage(
        &mut self,
        render_stage_index: RenderStageIndex,
    ) {
        for stages in self.entries.values_mut() {
            if let Some(active) = stages.get_mut(render_stage_index as usize) {
                *active = ActiveRenderStage::inactive();
            }
        }
    }

    /// Every stage an object of this type may be activated in
    pub fn stage_mask(
        &self,
        object_type: RenderObjectType,
    ) -> RenderStageMask {
        let mut mask = RenderStageMask::empty();
        if let Some(stages) = self.entries.get(&object_type) {
            for (index, active) in stages.iter().enumerate() {
                if active.is_active() {
                    mask.insert_index(index as RenderStageIndex);
                }
            }
        }

        mask
    }
}
